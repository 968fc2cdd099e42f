//! Chat Broker Flow Tests
//!
//! Drive registered connections through the broker the way the socket
//! handler does and inspect what each connection receives.

use pretty_assertions::assert_eq;
use serde_json::json;

use clinic_chat::domain::MessageType;
use clinic_chat::presentation::websocket::messages::MessagePayload;
use clinic_chat::presentation::websocket::{ClientEvent, ServerEvent};

use crate::common::{sentence, TestApp, TestClient, CHAT_ID, DOCTOR_ID, PATIENT_ID};

fn event(value: serde_json::Value) -> ClientEvent {
    serde_json::from_value(value).unwrap()
}

async fn send(app: &TestApp, client: &TestClient, value: serde_json::Value) {
    app.state.broker.handle_event(&client.session, event(value)).await;
}

async fn join(app: &TestApp, client: &mut TestClient, chat_id: i64) {
    send(app, client, json!({"event": "join_chat", "data": {"chatId": chat_id}})).await;
    client.events();
}

fn received(events: &[ServerEvent]) -> Vec<&MessagePayload> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::ReceiveMessage(m) => Some(m),
            _ => None,
        })
        .collect()
}

fn error_code(events: &[ServerEvent]) -> Option<&'static str> {
    match events {
        [ServerEvent::Error(e)] => Some(e.code),
        _ => None,
    }
}

#[tokio::test]
async fn test_send_message_dual_emit() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut patient, CHAT_ID).await;
    join(&app, &mut doctor, CHAT_ID).await;
    patient.events();

    send(
        &app,
        &patient,
        json!({"event": "send_message", "data": {"chatId": CHAT_ID, "message": "hello"}}),
    )
    .await;

    let patient_events = patient.events();
    let doctor_events = doctor.events();
    let own = received(&patient_events);
    let other = received(&doctor_events);

    assert_eq!(own.len(), 1);
    assert_eq!(other.len(), 1);
    assert!(own[0].is_own_message);
    assert!(!other[0].is_own_message);
    assert_eq!(own[0].id, other[0].id);
    assert_eq!(own[0].content.as_deref(), Some("hello"));

    let stored = app.messages.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sender_id, PATIENT_ID);
    assert_eq!(stored[0].chat_id, CHAT_ID);
    assert_eq!(stored[0].message_type, MessageType::Text);
    assert_eq!(app.state.stats.snapshot().total_messages, 1);
}

#[tokio::test]
async fn test_sender_id_in_payload_is_ignored() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    join(&app, &mut patient, CHAT_ID).await;

    send(
        &app,
        &patient,
        json!({"event": "send_message", "data": {"chatId": CHAT_ID, "senderId": DOCTOR_ID, "message": "hi"}}),
    )
    .await;

    assert_eq!(app.messages.all()[0].sender_id, PATIENT_ID);
}

#[tokio::test]
async fn test_oversize_message_persists_nothing() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut patient, CHAT_ID).await;
    join(&app, &mut doctor, CHAT_ID).await;
    patient.events();

    let huge = "a".repeat(10 * 1024 * 1024 + 1);
    send(
        &app,
        &patient,
        json!({"event": "send_message", "data": {"chatId": CHAT_ID, "message": huge}}),
    )
    .await;

    let events = patient.events();
    match events.as_slice() {
        [ServerEvent::Error(e)] => {
            assert_eq!(e.code, "PAYLOAD_TOO_LARGE");
            assert_eq!(e.limit, Some(10 * 1024 * 1024));
            assert!(e.size.unwrap() > 10 * 1024 * 1024);
        }
        other => panic!("unexpected events {:?}", other),
    }
    assert!(doctor.events().is_empty());
    assert_eq!(app.messages.create_count(), 0);
}

#[tokio::test]
async fn test_oversize_upload_persists_nothing() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    join(&app, &mut patient, CHAT_ID).await;

    send(
        &app,
        &patient,
        json!({"event": "upload_file", "data": {
            "chatId": CHAT_ID,
            "fileName": "mri.png",
            "fileSize": 11 * 1024 * 1024
        }}),
    )
    .await;

    assert_eq!(error_code(&patient.events()), Some("PAYLOAD_TOO_LARGE"));
    assert_eq!(app.messages.create_count(), 0);
}

#[tokio::test]
async fn test_room_actions_require_join() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let seeded = app.messages.seed(CHAT_ID, DOCTOR_ID, "seeded");

    let actions = [
        json!({"event": "send_message", "data": {"chatId": CHAT_ID, "message": sentence()}}),
        json!({"event": "upload_file", "data": {"chatId": CHAT_ID, "fileName": "scan.png"}}),
        json!({"event": "mark_as_read", "data": {"chatId": CHAT_ID, "messageId": seeded.id}}),
        json!({"event": "get_messages", "data": {"chatId": CHAT_ID}}),
    ];

    for action in actions {
        send(&app, &patient, action).await;
        assert_eq!(error_code(&patient.events()), Some("JOIN_REQUIRED"));
    }

    assert_eq!(app.messages.create_count(), 0);
    assert_eq!(app.messages.read_update_count(), 0);
}

#[tokio::test]
async fn test_join_unknown_chat_reports_not_found() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);

    send(&app, &patient, json!({"event": "join_chat", "data": {"chatId": 999}})).await;

    assert_eq!(error_code(&patient.events()), Some("NOT_FOUND"));
    assert!(!app.state.gateway.is_member(patient.session.id, 999));
}

#[tokio::test]
async fn test_join_notifies_other_members() {
    let app = TestApp::new();
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut doctor, CHAT_ID).await;
    let mut patient = app.connect(PATIENT_ID);

    send(&app, &patient, json!({"event": "join_chat", "data": {"chatId": CHAT_ID}})).await;

    assert!(patient.events().is_empty());
    match doctor.events().as_slice() {
        [ServerEvent::UserJoined(e)] => {
            assert_eq!(e.user_id, PATIENT_ID);
            assert_eq!(e.chat_id, CHAT_ID);
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[tokio::test]
async fn test_leave_never_joined_is_silent() {
    let app = TestApp::new();
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut doctor, CHAT_ID).await;
    let mut patient = app.connect(PATIENT_ID);

    send(&app, &patient, json!({"event": "leave_chat", "data": {"chatId": CHAT_ID}})).await;

    assert!(patient.events().is_empty());
    assert!(doctor.events().is_empty());
}

#[tokio::test]
async fn test_leave_notifies_remaining_members() {
    let app = TestApp::new();
    let mut doctor = app.connect(DOCTOR_ID);
    let mut patient = app.connect(PATIENT_ID);
    join(&app, &mut doctor, CHAT_ID).await;
    join(&app, &mut patient, CHAT_ID).await;
    doctor.events();

    send(&app, &patient, json!({"event": "leave_chat", "data": {"chatId": CHAT_ID}})).await;

    assert!(matches!(doctor.events().as_slice(), [ServerEvent::UserLeft(e)] if e.user_id == PATIENT_ID));
    assert!(!app.state.gateway.is_member(patient.session.id, CHAT_ID));
}

#[tokio::test]
async fn test_mark_own_message_is_acknowledged_without_update() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut patient, CHAT_ID).await;
    join(&app, &mut doctor, CHAT_ID).await;
    patient.events();
    let own = app.messages.seed(CHAT_ID, PATIENT_ID, "my note");

    send(
        &app,
        &patient,
        json!({"event": "mark_as_read", "data": {"chatId": CHAT_ID, "messageId": own.id}}),
    )
    .await;

    match patient.events().as_slice() {
        [ServerEvent::MessageReadAck(ack)] => {
            assert!(ack.self_message);
            assert_eq!(ack.message_id, own.id);
            assert_eq!(ack.read_at, None);
        }
        other => panic!("unexpected events {:?}", other),
    }
    assert!(doctor.events().is_empty());
    assert_eq!(app.messages.read_update_count(), 0);
    assert_eq!(app.messages.get(own.id).unwrap().read_at, None);
}

#[tokio::test]
async fn test_mark_other_message_broadcasts_to_room() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut patient, CHAT_ID).await;
    join(&app, &mut doctor, CHAT_ID).await;
    patient.events();
    let from_doctor = app.messages.seed(CHAT_ID, DOCTOR_ID, "take twice daily");

    send(
        &app,
        &patient,
        json!({"event": "mark_as_read", "data": {"chatId": CHAT_ID, "messageId": from_doctor.id}}),
    )
    .await;

    let stored = app.messages.get(from_doctor.id).unwrap();
    assert!(stored.read_at.is_some());

    for events in [patient.events(), doctor.events()] {
        match events.as_slice() {
            [ServerEvent::MessageRead(read)] => {
                assert_eq!(read.message_id, from_doctor.id);
                assert_eq!(read.read_by, PATIENT_ID);
                assert_eq!(read.read_at, stored.read_at);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_mark_message_from_other_chat_is_not_found() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    join(&app, &mut patient, CHAT_ID).await;
    let elsewhere = app.messages.seed(CHAT_ID + 1, DOCTOR_ID, "other chat");

    send(
        &app,
        &patient,
        json!({"event": "mark_as_read", "data": {"chatId": CHAT_ID, "messageId": elsewhere.id}}),
    )
    .await;

    assert_eq!(error_code(&patient.events()), Some("NOT_FOUND"));
    assert_eq!(app.messages.read_update_count(), 0);
}

#[tokio::test]
async fn test_typing_reaches_others_only() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut patient, CHAT_ID).await;
    join(&app, &mut doctor, CHAT_ID).await;
    patient.events();

    send(
        &app,
        &patient,
        json!({"event": "typing", "data": {"chatId": CHAT_ID, "isTyping": true}}),
    )
    .await;

    assert!(patient.events().is_empty());
    assert!(matches!(
        doctor.events().as_slice(),
        [ServerEvent::UserTyping(t)] if t.user_id == PATIENT_ID && t.is_typing
    ));
}

#[tokio::test]
async fn test_typing_failures_are_silent() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);

    send(&app, &patient, json!({"event": "typing", "data": {"chatId": 999, "isTyping": true}})).await;
    send(&app, &patient, json!({"event": "typing", "data": {"chatId": CHAT_ID, "isTyping": true}})).await;

    assert!(patient.events().is_empty());
    assert_eq!(app.state.stats.snapshot().total_errors, 0);
}

#[tokio::test]
async fn test_get_messages_pages_history_for_caller_only() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut patient, CHAT_ID).await;
    join(&app, &mut doctor, CHAT_ID).await;
    patient.events();

    for i in 0..55 {
        let sender = if i % 2 == 0 { PATIENT_ID } else { DOCTOR_ID };
        app.messages.seed(CHAT_ID, sender, &sentence());
    }

    send(&app, &patient, json!({"event": "get_messages", "data": {"chatId": CHAT_ID}})).await;
    match patient.events().as_slice() {
        [ServerEvent::MessagesLoaded(loaded)] => {
            assert_eq!(loaded.page, 1);
            assert_eq!(loaded.messages.len(), 50);
            // Newest 50 of 55, oldest first: seeds 5..55
            assert_eq!(loaded.messages[0].id, 6);
            assert_eq!(loaded.messages[49].id, 55);
            assert!(!loaded.messages[0].is_own_message);
            assert!(loaded.messages[1].is_own_message);
        }
        other => panic!("unexpected events {:?}", other),
    }

    send(&app, &patient, json!({"event": "get_messages", "data": {"chatId": CHAT_ID, "page": 2}})).await;
    match patient.events().as_slice() {
        [ServerEvent::MessagesLoaded(loaded)] => {
            assert_eq!(loaded.page, 2);
            assert_eq!(
                loaded.messages.iter().map(|m| m.id).collect::<Vec<_>>(),
                vec![1, 2, 3, 4, 5]
            );
        }
        other => panic!("unexpected events {:?}", other),
    }

    assert!(doctor.events().is_empty());
}

#[tokio::test]
async fn test_upload_file_emits_and_acknowledges() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    let mut doctor = app.connect(DOCTOR_ID);
    join(&app, &mut patient, CHAT_ID).await;
    join(&app, &mut doctor, CHAT_ID).await;
    patient.events();

    send(
        &app,
        &patient,
        json!({"event": "upload_file", "data": {
            "chatId": CHAT_ID,
            "fileName": "xray.png",
            "fileType": "image/png",
            "fileData": "iVBORw0KGgo="
        }}),
    )
    .await;

    let patient_events = patient.events();
    assert_eq!(
        patient_events.iter().map(ServerEvent::name).collect::<Vec<_>>(),
        vec!["receive_message", "file_uploaded"]
    );
    match &patient_events[1] {
        ServerEvent::FileUploaded(ack) => {
            assert_eq!(ack.file_url.as_deref(), Some("/uploads/chat/xray.png"));
            assert_eq!(ack.file_size, "iVBORw0KGgo=".len());
        }
        other => panic!("unexpected event {:?}", other),
    }

    let doctor_events = doctor.events();
    let other = received(&doctor_events);
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].message_type, MessageType::Image);
    assert!(!other[0].is_own_message);

    let activity = patient.session.activity();
    assert_eq!(activity.files_uploaded, 1);
}

#[tokio::test]
async fn test_sender_other_socket_sees_own_message() {
    let app = TestApp::new();
    let mut phone = app.connect(PATIENT_ID);
    let mut laptop = app.connect(PATIENT_ID);
    join(&app, &mut phone, CHAT_ID).await;
    join(&app, &mut laptop, CHAT_ID).await;
    phone.events();

    send(
        &app,
        &phone,
        json!({"event": "send_message", "data": {"chatId": CHAT_ID, "textContent": "from phone"}}),
    )
    .await;

    let laptop_events = laptop.events();
    let copy = received(&laptop_events);
    assert_eq!(copy.len(), 1);
    assert!(copy[0].is_own_message);
}

#[tokio::test]
async fn test_invalid_media_message_is_rejected() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);
    join(&app, &mut patient, CHAT_ID).await;

    send(
        &app,
        &patient,
        json!({"event": "send_message", "data": {"chatId": CHAT_ID, "messageType": "video"}}),
    )
    .await;

    assert_eq!(error_code(&patient.events()), Some("INVALID_PAYLOAD"));
    assert_eq!(app.messages.create_count(), 0);
}

#[tokio::test]
async fn test_malformed_frame_is_reported() {
    let app = TestApp::new();
    let mut patient = app.connect(PATIENT_ID);

    app.state.broker.reject_frame(&patient.session, "expected value at line 1 column 1");

    assert_eq!(error_code(&patient.events()), Some("INVALID_PAYLOAD"));
    assert_eq!(app.state.stats.snapshot().total_errors, 1);
}
