use std::time::Duration;
use voice_bridge::client::state::{
    reduce, ClientState, Effect, Event, FetchPurpose, Gesture, NavTarget, Request, Response, Screen, Session,
};
use voice_bridge::models::conversation::{Contact, Folder, FolderMessage, Message, MessageId};
use voice_bridge::models::last_recipient::LastRecipient;
use voice_bridge::models::ws_frame::{ClientFrame, ServerFrame};

fn contact(id: &str, name: &str) -> Contact {
    Contact {
        id: id.to_string(),
        name: name.to_string(),
        username: None,
        is_user: true,
        is_group: false,
        is_channel: false,
    }
}

fn apply(state: &ClientState, event: Event) -> (ClientState, Vec<Effect>) {
    reduce(state, event)
}

fn ok(state: &ClientState, purpose: FetchPurpose, response: Response) -> (ClientState, Vec<Effect>) {
    apply(
        state,
        Event::FetchOk {
            nav: state.nav,
            purpose,
            response,
        },
    )
}

fn fetches(effects: &[Effect]) -> Vec<(Request, u32, Duration)> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Fetch {
                request,
                attempt,
                delay,
                ..
            } => Some((request.clone(), *attempt, *delay)),
            _ => None,
        })
        .collect()
}

/// Messenger list loaded, `name` selected and confirmed by the server.
fn selected(name: &str, has_folders: bool) -> ClientState {
    let (s, _) = apply(&ClientState::default(), Event::Started);
    let (s, _) = ok(
        &s,
        FetchPurpose::Load,
        Response::AvailableMessengers(vec![name.to_string()]),
    );
    let (s, _) = apply(&s, Event::Gesture(Gesture::Tap));
    let (s, _) = apply(
        &s,
        Event::Server(ServerFrame::MessengerSelected {
            name: name.to_string(),
            has_folders,
        }),
    );
    s
}

fn in_conversation_with_bob() -> ClientState {
    let s = selected("telegram", false);
    let (s, _) = ok(
        &s,
        FetchPurpose::Load,
        Response::Contacts {
            contacts: vec![contact("1", "Bob"), contact("2", "Alice")],
            last_recipient: None,
        },
    );
    let (s, _) = apply(&s, Event::Gesture(Gesture::ListSelect(0)));
    let (s, _) = ok(&s, FetchPurpose::Load, Response::Messages(Vec::new()));
    s
}

fn message(id: i64, text: &str) -> Message {
    Message {
        id: MessageId::Number(id),
        text: text.to_string(),
        out: false,
        date: id,
        sender_name: "Bob".to_string(),
    }
}

#[test]
fn test_contacts_put_last_recipient_first() {
    let s = selected("telegram", false);
    assert_eq!(s.screen, Screen::Contacts);

    let (s, _) = ok(
        &s,
        FetchPurpose::Load,
        Response::Contacts {
            contacts: vec![contact("1", "Bob"), contact("2", "Alice")],
            last_recipient: Some(LastRecipient {
                id: "2".to_string(),
                name: "Alice".to_string(),
                username: None,
            }),
        },
    );

    let names: Vec<&str> = s.chat().unwrap().contacts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob"]);
    assert_eq!(s.status.text, "Select a contact");
}

#[test]
fn test_messenger_selection_follows_folder_capability() {
    let s = selected("gmail", true);
    assert_eq!(s.screen, Screen::FolderSelect);
    assert!(matches!(s.session, Some(Session::Folder(_))));
    assert_eq!(s.loading, Some(Request::Folders));
}

#[test]
fn test_poll_results_from_a_left_screen_are_dropped() {
    let s = in_conversation_with_bob();
    let conversation_nav = s.nav;

    let (s, effects) = apply(&s, Event::PollTick { nav: conversation_nav });
    assert_eq!(
        fetches(&effects),
        vec![(
            Request::Messages {
                entity_id: "1".to_string()
            },
            1,
            Duration::ZERO
        )]
    );

    let (left, _) = apply(&s, Event::Back);
    assert_eq!(left.screen, Screen::Contacts);

    let (after, effects) = apply(
        &left,
        Event::FetchOk {
            nav: conversation_nav,
            purpose: FetchPurpose::Poll,
            response: Response::Messages(vec![message(9, "late")]),
        },
    );
    assert_eq!(after, left);
    assert!(effects.is_empty());

    let (after, effects) = apply(&left, Event::PollTick { nav: conversation_nav });
    assert_eq!(after, left);
    assert!(effects.is_empty());
}

#[test]
fn test_poll_updates_current_conversation() {
    let s = in_conversation_with_bob();
    let (s, _) = ok(&s, FetchPurpose::Poll, Response::Messages(vec![message(1, "new")]));
    assert_eq!(s.chat().unwrap().conversation.len(), 1);
    assert_eq!(s.screen, Screen::Conversation);
}

#[test]
fn test_failed_loads_retry_then_fall_back() {
    let s = in_conversation_with_bob();
    let (s, _) = apply(&s, Event::Back);
    let (s, _) = ok(
        &s,
        FetchPurpose::Load,
        Response::Contacts {
            contacts: vec![contact("1", "Bob")],
            last_recipient: None,
        },
    );
    let (mut s, _) = apply(&s, Event::OpenContact(0));
    let request = Request::Messages {
        entity_id: "1".to_string(),
    };

    for attempt in 1..=3 {
        let (next, effects) = apply(
            &s,
            Event::FetchFailed {
                nav: s.nav,
                purpose: FetchPurpose::Load,
                request: request.clone(),
                attempt,
                error: "timeout".to_string(),
            },
        );
        assert_eq!(
            fetches(&effects),
            vec![(request.clone(), attempt + 1, Duration::from_secs(5))]
        );
        assert_eq!(next.status.text, format!("Retrying ({}/3)...", attempt));
        s = next;
    }

    let (s, effects) = apply(
        &s,
        Event::FetchFailed {
            nav: s.nav,
            purpose: FetchPurpose::Load,
            request,
            attempt: 4,
            error: "timeout".to_string(),
        },
    );
    assert!(s.status.is_error);
    assert_eq!(s.status.text, "Connection failed");
    let navigate = effects.iter().find_map(|e| match e {
        Effect::Schedule { delay, event } => Some((*delay, event.clone())),
        _ => None,
    });
    assert_eq!(
        navigate,
        Some((
            Duration::from_secs(3),
            Event::Navigate {
                nav: s.nav,
                target: NavTarget::Contacts
            }
        ))
    );

    let (s, effects) = apply(
        &s,
        Event::Navigate {
            nav: s.nav,
            target: NavTarget::Contacts,
        },
    );
    assert_eq!(s.screen, Screen::Contacts);
    assert_eq!(fetches(&effects)[0].0, Request::Contacts);
}

#[test]
fn test_record_preview_send_saves_history_and_refreshes() {
    let s = in_conversation_with_bob();

    let (s, effects) = apply(&s, Event::Gesture(Gesture::DoubleTap));
    assert_eq!(s.screen, Screen::Recording);
    assert!(s.recording);
    assert_eq!(s.status.text, "Recording for Bob...");
    assert!(effects.contains(&Effect::StartCapture));

    let (s, effects) = apply(&s, Event::Gesture(Gesture::Tap));
    assert_eq!(s.screen, Screen::Processing);
    assert!(effects.contains(&Effect::Send(ClientFrame::Stop)));

    let (s, _) = apply(
        &s,
        Event::Server(ServerFrame::Preview {
            text: "running late".to_string(),
        }),
    );
    assert_eq!(s.screen, Screen::Preview);

    let (s, effects) = apply(&s, Event::Gesture(Gesture::Tap));
    assert_eq!(
        effects[0],
        Effect::Send(ClientFrame::Send {
            text: Some("running late".to_string()),
            recipient: Some("1".to_string()),
            recipient_id: Some("1".to_string()),
            recipient_name: Some("Bob".to_string()),
            recipient_username: None,
        })
    );

    let (s, effects) = apply(
        &s,
        Event::Server(ServerFrame::Sent {
            text: "running late".to_string(),
        }),
    );
    assert_eq!(
        effects[0],
        Effect::SaveHistory {
            text: "running late".to_string(),
            contact: "Bob".to_string()
        }
    );
    assert_eq!(s.screen, Screen::Conversation);
    assert!(s.pending_text.is_empty());
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::Fetch { purpose: FetchPurpose::Refresh, .. })));
}

#[test]
fn test_cancelled_preview_returns_to_conversation() {
    let s = in_conversation_with_bob();
    let (s, _) = apply(&s, Event::ToggleRecording);
    let (s, _) = apply(&s, Event::ToggleRecording);
    let (s, _) = apply(
        &s,
        Event::Server(ServerFrame::Preview {
            text: "never mind".to_string(),
        }),
    );
    let (s, _) = apply(&s, Event::Gesture(Gesture::ScrollDown));
    assert_eq!(s.screen, Screen::Conversation);
    assert!(s.pending_text.is_empty());
}

#[test]
fn test_error_frame_recovers_unless_user_moved() {
    let s = in_conversation_with_bob();
    let (s, effects) = apply(&s, Event::Server(ServerFrame::error("Error sending message")));
    assert!(s.status.is_error);
    let recover = effects
        .iter()
        .find_map(|e| match e {
            Effect::Schedule { event, .. } => Some(event.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        recover,
        Event::Navigate {
            nav: s.nav,
            target: NavTarget::Conversation
        }
    );

    let (moved, _) = apply(&s, Event::Back);
    let (after, effects) = apply(&moved, recover.clone());
    assert_eq!(after, moved);
    assert!(effects.is_empty());

    let (recovered, _) = apply(&s, recover);
    assert_eq!(recovered.screen, Screen::Conversation);
    assert!(!recovered.status.is_error);
}

#[test]
fn test_folder_reply_flow() {
    let s = selected("gmail", true);
    let (s, _) = ok(
        &s,
        FetchPurpose::Load,
        Response::Folders(vec![Folder {
            id: "INBOX".to_string(),
            name: "Inbox".to_string(),
            unread_count: 1,
        }]),
    );
    let (s, effects) = apply(&s, Event::Gesture(Gesture::ListSelect(0)));
    assert_eq!(s.screen, Screen::MessageList);
    assert_eq!(
        fetches(&effects)[0].0,
        Request::FolderMessages {
            folder_id: "INBOX".to_string()
        }
    );

    let mail = FolderMessage {
        id: "<m1@mail>".to_string(),
        subject: "Lunch?".to_string(),
        snippet: "Are you free".to_string(),
        body: "Are you free at noon?".to_string(),
        from: "Ann".to_string(),
        from_address: "ann@example.com".to_string(),
        date: 0,
        is_read: false,
    };
    let (s, _) = ok(&s, FetchPurpose::Load, Response::FolderMessages(vec![mail.clone()]));
    assert_eq!(s.status.text, "Inbox (1)");

    let (s, _) = apply(&s, Event::OpenMessage(0));
    let (s, _) = ok(
        &s,
        FetchPurpose::Load,
        Response::FolderMessage(FolderMessage {
            is_read: true,
            ..mail
        }),
    );
    assert_eq!(s.screen, Screen::MessageView);
    assert!(s.folder().unwrap().messages[0].is_read);

    let (s, _) = apply(&s, Event::Gesture(Gesture::DoubleTap));
    assert_eq!(s.status.text, "Recording for Ann...");
    let (s, _) = apply(&s, Event::Gesture(Gesture::Tap));
    let (s, _) = apply(
        &s,
        Event::Server(ServerFrame::Preview {
            text: "Sure".to_string(),
        }),
    );
    let (s, effects) = apply(&s, Event::SendPending);
    assert_eq!(
        effects[0],
        Effect::Send(ClientFrame::Reply {
            text: Some("Sure".to_string()),
            message_id: Some("<m1@mail>".to_string()),
        })
    );

    let (s, effects) = apply(&s, Event::Server(ServerFrame::Sent { text: "Sure".to_string() }));
    assert_eq!(s.screen, Screen::MessageView);
    assert_eq!(
        effects[0],
        Effect::SaveHistory {
            text: "Sure".to_string(),
            contact: "Ann".to_string()
        }
    );
}

#[test]
fn test_waking_up_reissues_pending_load() {
    let s = selected("telegram", false);
    let (hidden, effects) = apply(&s, Event::Hidden);
    assert_eq!(effects, vec![Effect::AbortFetches]);

    let (awake, effects) = apply(&hidden, Event::Visible);
    assert!(!awake.hidden);
    assert!(effects.contains(&Effect::Reconnect));
    assert_eq!(fetches(&effects), vec![(Request::Contacts, 1, Duration::ZERO)]);
}

#[test]
fn test_messenger_cursor_moves_within_list() {
    let (s, _) = apply(&ClientState::default(), Event::Started);
    let (s, _) = ok(
        &s,
        FetchPurpose::Load,
        Response::AvailableMessengers(vec!["telegram".to_string(), "slack".to_string()]),
    );
    let (s, _) = apply(&s, Event::Gesture(Gesture::ScrollDown));
    let (s, _) = apply(&s, Event::Gesture(Gesture::ScrollDown));
    assert_eq!(s.cursor, 1);
    let (s, effects) = apply(&s, Event::Gesture(Gesture::Tap));
    assert_eq!(s.status.text, "Connecting to Slack...");
    assert_eq!(
        effects[0],
        Effect::Send(ClientFrame::SelectMessenger {
            name: "slack".to_string()
        })
    );
}
