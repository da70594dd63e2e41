use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use voice_bridge::handlers::ws_handler::WsConnection;
use voice_bridge::models::ws_frame::ServerFrame;
use voice_bridge::services::transcription_service::pcm_duration_secs;
use crate::support::{app_state, FakeFactory, FakeMessenger, RecordingTranscriber, VecSink};

fn error(text: &str) -> ServerFrame {
    ServerFrame::error(text)
}

#[tokio::test]
async fn test_stop_transcribes_concatenated_chunks_once() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying("hello there"));
    let state = app_state(dir.path(), FakeFactory::default(), transcriber.clone());
    let mut conn = WsConnection::new(state);
    let mut sink = VecSink::default();

    let chunks = [vec![1u8; 10_000], vec![2u8; 12_000], vec![3u8; 10_000]];
    for chunk in &chunks {
        conn.push_audio(Bytes::from(chunk.clone()));
    }
    assert_eq!(conn.buffered_bytes(), 32_000);

    conn.handle_text(r#"{"type":"stop"}"#, &mut sink).await.unwrap();

    let calls = transcriber.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], chunks.concat());
    assert!((pcm_duration_secs(calls[0].len()) - 1.0).abs() < f64::EPSILON);
    assert_eq!(
        sink.frames,
        vec![
            ServerFrame::status("Transcribing..."),
            ServerFrame::Preview {
                text: "hello there".to_string()
            },
        ]
    );
    assert_eq!(conn.buffered_bytes(), 0);
}

#[tokio::test]
async fn test_stop_without_audio_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying("unused"));
    let mut conn = WsConnection::new(app_state(dir.path(), FakeFactory::default(), transcriber.clone()));
    let mut sink = VecSink::default();

    conn.handle_text("stop", &mut sink).await.unwrap();

    assert_eq!(sink.frames, vec![error("No audio recorded")]);
    assert!(transcriber.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_transcription_is_no_speech() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying("   "));
    let mut conn = WsConnection::new(app_state(dir.path(), FakeFactory::default(), transcriber));
    let mut sink = VecSink::default();

    conn.push_audio(Bytes::from(vec![0u8; 3200]));
    conn.handle_text("stop", &mut sink).await.unwrap();

    assert_eq!(sink.frames.last(), Some(&error("No speech detected")));
}

#[tokio::test]
async fn test_send_without_messenger_is_rejected_before_validation() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying(""));
    let mut conn = WsConnection::new(app_state(dir.path(), FakeFactory::default(), transcriber));
    let mut sink = VecSink::default();

    conn.handle_text(r#"{"type":"send","text":"","recipient":""}"#, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.frames, vec![error("No messenger selected")]);
}

#[tokio::test]
async fn test_select_then_send_records_last_recipient() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying(""));
    let slack = FakeMessenger::chat("Slack");
    let factory = FakeFactory::default().with("slack", slack);
    let messenger = factory.messengers["slack"].clone();
    let state = app_state(dir.path(), factory, transcriber);
    let mut conn = WsConnection::new(state.clone());
    let mut sink = VecSink::default();

    conn.handle_text(r#"{"type":"select-messenger","name":"slack"}"#, &mut sink)
        .await
        .unwrap();
    assert_eq!(
        sink.frames,
        vec![
            ServerFrame::status("Connecting to Slack..."),
            ServerFrame::MessengerSelected {
                name: "Slack".to_string(),
                has_folders: false,
            },
        ]
    );

    conn.handle_text(
        r#"{"type":"send","text":"on my way","recipient":"general","recipientId":"2","recipientName":"Alice"}"#,
        &mut sink,
    )
    .await
    .unwrap();

    assert_eq!(
        sink.frames.last(),
        Some(&ServerFrame::Sent {
            text: "on my way".to_string()
        })
    );
    assert_eq!(
        messenger.sent.lock().unwrap().as_slice(),
        &[("on my way".to_string(), "general".to_string())]
    );
    let saved = state.last_recipients.load("slack").unwrap();
    assert_eq!(saved.id, "2");
    assert_eq!(saved.name, "Alice");
}

#[tokio::test]
async fn test_send_with_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying(""));
    let factory = FakeFactory::default().with("slack", FakeMessenger::chat("Slack"));
    let mut conn = WsConnection::new(app_state(dir.path(), factory, transcriber));
    let mut sink = VecSink::default();

    conn.handle_text(r#"{"type":"select-messenger","name":"slack"}"#, &mut sink)
        .await
        .unwrap();
    conn.handle_text(r#"{"type":"send","text":"hi"}"#, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.frames.last(), Some(&error("Missing text or recipient")));
}

#[tokio::test]
async fn test_reply_goes_to_folder_messenger() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying(""));
    let factory = FakeFactory::default()
        .with("gmail", FakeMessenger::mail("Gmail"))
        .with("slack", FakeMessenger::chat("Slack"));
    let gmail = factory.messengers["gmail"].clone();
    let mut conn = WsConnection::new(app_state(dir.path(), factory, transcriber));
    let mut sink = VecSink::default();

    conn.handle_text(r#"{"type":"reply","text":"thanks"}"#, &mut sink)
        .await
        .unwrap();
    assert_eq!(sink.frames.last(), Some(&error("Missing text or messageId")));

    conn.handle_text(r#"{"type":"select-messenger","name":"slack"}"#, &mut sink)
        .await
        .unwrap();
    conn.handle_text(r#"{"type":"reply","text":"thanks","messageId":"<a@b>"}"#, &mut sink)
        .await
        .unwrap();
    assert_eq!(sink.frames.last(), Some(&error("Messenger does not support replies")));

    conn.handle_text(r#"{"type":"select-messenger","name":"gmail"}"#, &mut sink)
        .await
        .unwrap();
    assert_eq!(
        sink.frames.last(),
        Some(&ServerFrame::MessengerSelected {
            name: "Gmail".to_string(),
            has_folders: true,
        })
    );
    conn.handle_text(r#"{"type":"reply","text":"thanks","messageId":"<a@b>"}"#, &mut sink)
        .await
        .unwrap();
    assert_eq!(
        sink.frames.last(),
        Some(&ServerFrame::Sent {
            text: "thanks".to_string()
        })
    );
    assert_eq!(
        gmail.replies.lock().unwrap().as_slice(),
        &[("<a@b>".to_string(), "thanks".to_string())]
    );
}

#[tokio::test]
async fn test_unknown_messenger_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying(""));
    let state = app_state(dir.path(), FakeFactory::default(), transcriber);
    let mut conn = WsConnection::new(state.clone());
    let mut sink = VecSink::default();

    conn.handle_text(r#"{"type":"select-messenger","name":"whatsapp"}"#, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.frames, vec![error("Failed to connect to Whatsapp")]);
    assert!(state.active.current().is_none());
}

#[tokio::test]
async fn test_later_selection_wins_over_slow_init() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying(""));
    let factory = FakeFactory::default()
        .with("telegram", FakeMessenger::chat("Telegram").slow(Duration::from_millis(200)))
        .with("slack", FakeMessenger::chat("Slack"));
    let state = app_state(dir.path(), factory, transcriber);

    let mut first = WsConnection::new(state.clone());
    let mut second = WsConnection::new(state.clone());
    let mut first_sink = VecSink::default();
    let mut second_sink = VecSink::default();

    let slow = first.handle_text(r#"{"type":"select-messenger","name":"telegram"}"#, &mut first_sink);
    let fast = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        second
            .handle_text(r#"{"type":"select-messenger","name":"slack"}"#, &mut second_sink)
            .await
    };
    let (a, b) = tokio::join!(slow, fast);
    a.unwrap();
    b.unwrap();

    assert_eq!(state.active.current_name().as_deref(), Some("Slack"));
    assert_eq!(first_sink.frames.last(), Some(&error("Messenger selection superseded")));
    assert_eq!(
        second_sink.frames.last(),
        Some(&ServerFrame::MessengerSelected {
            name: "Slack".to_string(),
            has_folders: false,
        })
    );
}

#[tokio::test]
async fn test_failed_init_leaves_previous_messenger() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(RecordingTranscriber::replying(""));
    let mut broken = FakeMessenger::chat("Telegram");
    broken.fail_init = true;
    let factory = FakeFactory::default()
        .with("slack", FakeMessenger::chat("Slack"))
        .with("telegram", broken);
    let state = app_state(dir.path(), factory, transcriber);
    let mut conn = WsConnection::new(state.clone());
    let mut sink = VecSink::default();

    conn.handle_text(r#"{"type":"select-messenger","name":"slack"}"#, &mut sink)
        .await
        .unwrap();
    conn.handle_text(r#"{"type":"select-messenger","name":"telegram"}"#, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.frames.last(), Some(&error("Failed to connect to Telegram")));
    assert_eq!(state.active.current_name().as_deref(), Some("Slack"));
}
