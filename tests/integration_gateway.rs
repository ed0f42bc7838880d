use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatforge::facade::{ChatService, AI_APOLOGY};
use chatforge::settings::GatewayConfigPatch;
use chatforge::store::{Bundle, ChatDraft, ImportMode};
use chatforge::ChatForgeError;

fn create_service() -> (ChatService, tempfile::TempDir) {
    let dir = tempdir().expect("tempdir");
    let db = chatforge::store::open_db_at(dir.path().join("chatforge.db")).expect("open db");
    (ChatService::new(db), dir)
}

fn configure(service: &ChatService, endpoint: &str) {
    service
        .settings()
        .save(GatewayConfigPatch {
            endpoint: Some(endpoint.to_string()),
            ..Default::default()
        })
        .expect("save settings");
}

/// End-to-end send through an OpenAI-style backend: the user turn and
/// the generated reply both land in the transcript, and the chat's
/// bookkeeping reflects the reply without touching the unread counter.
#[tokio::test]
async fn test_send_round_trip_against_chat_completions_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello back"}}]
        })))
        .mount(&server)
        .await;

    let (service, _dir) = create_service();
    configure(&service, &server.uri());

    let chat = service
        .create_chat(ChatDraft {
            is_ai: true,
            ..Default::default()
        })
        .expect("create chat");

    let outcome = service
        .send_user_message(&chat.id, "Hi")
        .await
        .expect("send");
    assert_eq!(outcome.user_message.body, "Hi");
    assert_eq!(outcome.ai_message.expect("reply").body, "Hello back");
    assert!(outcome.ai_error.is_none());

    let messages = service.store().list_messages(&chat.id).expect("list");
    assert_eq!(messages.len(), 2);
    assert!(messages[0].is_from_user());
    assert!(messages[1].is_from_ai());

    let reloaded = service.store().get_chat(&chat.id).expect("get chat");
    assert_eq!(reloaded.last_message.as_deref(), Some("Hello back"));
    assert_eq!(reloaded.unread_count, 0);
}

/// An Ollama-style endpoint is routed to the prompt-completion wire
/// format purely from the URL.
#[tokio::test]
async fn test_ollama_endpoint_uses_generate_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ollama/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "Generated locally"
        })))
        .mount(&server)
        .await;

    let (service, _dir) = create_service();
    // The substring "11434" in the mock URI is not guaranteed, so tag
    // the endpoint path with "ollama" to exercise the selection rule.
    configure(&service, &format!("{}/ollama", server.uri()));

    let chat = service
        .create_chat(ChatDraft {
            is_ai: true,
            ..Default::default()
        })
        .expect("create chat");

    let outcome = service
        .send_user_message(&chat.id, "Hi")
        .await
        .expect("send");
    assert_eq!(outcome.ai_message.expect("reply").body, "Generated locally");
}

/// When the backend is unreachable, the transcript gets the apology and
/// the caller gets the transport-classed error.
#[tokio::test]
async fn test_unreachable_backend_leaves_apology_in_transcript() {
    let (service, _dir) = create_service();
    configure(&service, "http://127.0.0.1:1");

    let chat = service
        .create_chat(ChatDraft {
            is_ai: true,
            ..Default::default()
        })
        .expect("create chat");

    let outcome = service
        .send_user_message(&chat.id, "Hi")
        .await
        .expect("send");
    assert_eq!(outcome.ai_message.expect("apology").body, AI_APOLOGY);
    let error = outcome.ai_error.expect("error");
    assert!(matches!(
        error.downcast_ref::<ChatForgeError>(),
        Some(ChatForgeError::Transport(_))
    ));
}

/// Connection probe reports failure without creating any records.
#[tokio::test]
async fn test_connection_probe_is_side_effect_free() {
    let (service, _dir) = create_service();
    configure(&service, "http://127.0.0.1:1");

    let report = service.test_connection().await;
    assert!(!report.ok);
    assert!(report.error.is_some());
    assert!(service.list_chats().expect("list").is_empty());
}

/// Export to JSON and import into a second, empty database: counts and
/// bodies survive, ids are freshly minted.
#[tokio::test]
async fn test_export_import_across_databases() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "noted"}}]
        })))
        .mount(&server)
        .await;

    let (source, _src_dir) = create_service();
    configure(&source, &server.uri());
    let chat = source
        .create_chat(ChatDraft {
            name: Some("Travel plans".to_string()),
            is_ai: true,
            ..Default::default()
        })
        .expect("create chat");
    source
        .send_user_message(&chat.id, "Book the tickets")
        .await
        .expect("send");

    let json = source
        .store()
        .export_all()
        .expect("export")
        .to_json()
        .expect("to json");

    let (target, _tgt_dir) = create_service();
    let bundle = Bundle::from_json(&json).expect("parse bundle");
    let report = target
        .store()
        .import_bundle(&bundle, ImportMode::Merge)
        .expect("import");
    assert_eq!(report.imported_chats, 1);

    let chats = target.list_chats().expect("list");
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].name, "Travel plans");
    assert_ne!(chats[0].id, chat.id);

    let messages = target.store().list_messages(&chats[0].id).expect("list");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].body, "Book the tickets");
    assert_eq!(messages[1].body, "noted");
}
