use std::sync::Arc;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use voice_bridge::handlers::ws_handler::WsConnection;
use voice_bridge::routes;
use crate::support::{app_state, FakeFactory, FakeMessenger, RecordingTranscriber, VecSink};

#[actix_web::test]
async fn test_data_endpoints_require_a_messenger() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(
        dir.path(),
        FakeFactory::default().with("slack", FakeMessenger::chat("Slack")),
        Arc::new(RecordingTranscriber::replying("")),
    );
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await;

    for uri in ["/api/contacts", "/api/messages/bob", "/api/folders", "/api/folders/INBOX/messages"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status().as_u16(), 400, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "No messenger selected" }));
    }

    let req = test::TestRequest::get().uri("/api/available-messengers").to_request();
    let names: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names, vec!["slack".to_string()]);

    let req = test::TestRequest::get().uri("/api/last-recipient").to_request();
    let last: Value = test::call_and_read_body_json(&app, req).await;
    assert!(last.is_null());
}

#[actix_web::test]
async fn test_chat_messenger_data_and_folder_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(
        dir.path(),
        FakeFactory::default().with("slack", FakeMessenger::chat("Slack")),
        Arc::new(RecordingTranscriber::replying("")),
    );
    let mut conn = WsConnection::new(state.clone());
    conn.handle_text(r#"{"type":"select-messenger","name":"slack"}"#, &mut VecSink::default())
        .await
        .unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/contacts").to_request();
    let contacts: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(contacts[0]["name"], "Bob");
    assert_eq!(contacts[1]["isUser"], true);

    let req = test::TestRequest::get().uri("/api/messages/general").to_request();
    let messages: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(messages.as_array().map(Vec::len), Some(4));
    assert_eq!(messages[0]["senderName"], "Bob");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/folders").to_request()).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Messenger does not support folders");
}

#[actix_web::test]
async fn test_folder_messenger_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(
        dir.path(),
        FakeFactory::default().with("gmail", FakeMessenger::mail("Gmail")),
        Arc::new(RecordingTranscriber::replying("")),
    );
    let mut conn = WsConnection::new(state.clone());
    conn.handle_text(r#"{"type":"select-messenger","name":"gmail"}"#, &mut VecSink::default())
        .await
        .unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/folders").to_request();
    let folders: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(folders, json!([{ "id": "INBOX", "name": "Inbox", "unreadCount": 2 }]));

    let req = test::TestRequest::get()
        .uri("/api/folders/INBOX/messages?limit=2")
        .to_request();
    let messages: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(messages.as_array().map(Vec::len), Some(2));
    assert_eq!(messages[0]["fromAddress"], "ann@example.com");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/folders/INBOX/messages/%3Cmissing%40mail%3E")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Failed to fetch message" }));
}

#[actix_web::test]
async fn test_folder_messages_route_decodes_folder_and_defaults_limit() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(
        dir.path(),
        FakeFactory::default().with("gmail", FakeMessenger::mail("Gmail")),
        Arc::new(RecordingTranscriber::replying("")),
    );
    let mut conn = WsConnection::new(state.clone());
    conn.handle_text(r#"{"type":"select-messenger","name":"gmail"}"#, &mut VecSink::default())
        .await
        .unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/folders/%5BGmail%5D%2FSent%20Mail/messages")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    let messages: Value = test::read_body_json(resp).await;
    assert_eq!(messages.as_array().map(Vec::len), Some(3));
    assert_eq!(messages[0]["id"], "<[Gmail]/Sent Mail-0@mail>");

    let req = test::TestRequest::get()
        .uri("/api/folders/INBOX/messages?limit=abc")
        .to_request();
    let messages: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(messages.as_array().map(Vec::len), Some(3));
}

#[actix_web::test]
async fn test_last_recipient_follows_active_messenger() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(
        dir.path(),
        FakeFactory::default().with("slack", FakeMessenger::chat("Slack")),
        Arc::new(RecordingTranscriber::replying("")),
    );
    let mut conn = WsConnection::new(state.clone());
    let mut sink = VecSink::default();
    conn.handle_text(r#"{"type":"select-messenger","name":"slack"}"#, &mut sink)
        .await
        .unwrap();
    conn.handle_text(
        r#"{"type":"send","text":"hi","recipient":"alice","recipientId":"2","recipientName":"Alice","recipientUsername":"alice"}"#,
        &mut sink,
    )
    .await
    .unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/last-recipient").to_request();
    let last: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(last, json!({ "id": "2", "name": "Alice", "username": "alice" }));
}
