use async_trait::async_trait;
use notekey_core::coordinator::{spawn, Coordinator, DEFAULT_QUEUE_CAPACITY};
use notekey_core::repo::note_repo::{ACTIVE_NOTE_KEY, NOTES_KEY};
use notekey_core::{
    DebounceWindows, ExplainError, ExplanationClient, KvNoteRepository, ManualClock,
    MemoryKvStore, Note, NoteRepository, Notification, NotificationHub, Request, Response,
    Subscription,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Harness {
    coordinator: Coordinator<KvNoteRepository<MemoryKvStore>>,
    store: MemoryKvStore,
    clock: ManualClock,
    events: Subscription,
}

fn harness() -> Harness {
    let store = MemoryKvStore::new();
    let clock = ManualClock::new(1_000_000);
    let hub = NotificationHub::new();
    let events = hub.subscribe();
    let mut coordinator = Coordinator::new(
        KvNoteRepository::new(store.clone()),
        hub,
        Arc::new(clock.clone()),
        DebounceWindows::default(),
    );
    coordinator.initialize().unwrap();
    Harness {
        coordinator,
        store,
        clock,
        events,
    }
}

fn drain(events: &mut Subscription) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(notification) = events.try_recv() {
        seen.push(notification);
    }
    seen
}

fn kinds(events: &mut Subscription) -> Vec<&'static str> {
    drain(events).iter().map(Notification::kind).collect()
}

fn active_note(harness: &Harness) -> Note {
    harness.coordinator.notes().active_note().unwrap().unwrap()
}

async fn create(harness: &mut Harness) -> Note {
    harness.clock.advance_ms(2_000);
    let response = harness.coordinator.dispatch(Request::CreateNote).await;
    assert!(response.success, "{:?}", response.error);
    response.note.unwrap()
}

struct FixedExplainer {
    answer: Result<String, ExplainError>,
    calls: AtomicUsize,
}

impl FixedExplainer {
    fn new(answer: Result<String, ExplainError>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ExplanationClient for FixedExplainer {
    async fn explain(&self, _text: &str) -> Result<String, ExplainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

#[tokio::test]
async fn initialize_seeds_first_note_as_active() {
    let harness = harness();
    let notes = harness.coordinator.notes().list_notes().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "My First Note");
    assert_eq!(active_note(&harness).id, notes[0].id);
}

#[tokio::test]
async fn initialize_repairs_dangling_active_pointer() {
    let store = MemoryKvStore::new();
    let mut repo = KvNoteRepository::new(store.clone());
    repo.insert_note(&Note::with_id("a", "A", 1)).unwrap();
    repo.set_active_note_id("gone").unwrap();

    let mut coordinator = Coordinator::new(
        repo,
        NotificationHub::new(),
        Arc::new(ManualClock::new(5)),
        DebounceWindows::default(),
    );
    coordinator.initialize().unwrap();
    assert_eq!(store.snapshot(ACTIVE_NOTE_KEY), Some(json!("a")));
}

#[tokio::test]
async fn hello_is_appended_as_first_bullet() {
    let mut harness = harness();
    drain(&mut harness.events);

    let response = harness
        .coordinator
        .dispatch(Request::Add {
            text: "hello".to_string(),
        })
        .await;

    assert!(response.success);
    assert_eq!(response.note.unwrap().content, "<ul><li>hello</li></ul>");
    assert_eq!(
        kinds(&mut harness.events),
        vec!["noteUpdated", "clearHighlightedText"]
    );
}

#[tokio::test]
async fn add_escapes_html_and_splices_into_existing_list() {
    let mut harness = harness();
    harness
        .coordinator
        .dispatch(Request::Add {
            text: "first".to_string(),
        })
        .await;
    let response = harness
        .coordinator
        .dispatch(Request::Add {
            text: "<b>\"x\" & 'y'</b>".to_string(),
        })
        .await;

    assert_eq!(
        response.note.unwrap().content,
        "<ul><li>first</li><li>&lt;b&gt;&quot;x&quot; &amp; &#039;y&#039;&lt;/b&gt;</li></ul>"
    );
}

#[tokio::test]
async fn duplicate_add_within_window_is_rejected_without_touching_note() {
    let mut harness = harness();
    let add = Request::Add {
        text: "cell".to_string(),
    };
    let first = harness.coordinator.dispatch(add.clone()).await;
    let stored_before = harness.store.snapshot(NOTES_KEY);

    harness.clock.advance_ms(1_000);
    let second = harness.coordinator.dispatch(add).await;

    assert!(first.success);
    assert_eq!(second, Response::failure("Duplicate request"));
    assert_eq!(harness.store.snapshot(NOTES_KEY), stored_before);
    assert_eq!(
        active_note(&harness).last_modified,
        first.note.unwrap().last_modified
    );
}

#[tokio::test]
async fn add_after_window_appends_twice() {
    let mut harness = harness();
    let add = Request::Add {
        text: "cell".to_string(),
    };
    assert!(harness.coordinator.dispatch(add.clone()).await.success);
    harness.clock.advance_ms(1_500);
    let second = harness.coordinator.dispatch(add).await;

    assert!(second.success);
    assert_eq!(
        second.note.unwrap().content,
        "<ul><li>cell</li><li>cell</li></ul>"
    );
}

#[tokio::test]
async fn different_text_is_not_a_duplicate() {
    let mut harness = harness();
    let first = Request::Add {
        text: "a".to_string(),
    };
    let second = Request::Add {
        text: "b".to_string(),
    };
    assert!(harness.coordinator.dispatch(first).await.success);
    assert!(harness.coordinator.dispatch(second).await.success);
}

#[tokio::test]
async fn create_twice_within_window_is_rejected() {
    let mut harness = harness();
    let first = harness.coordinator.dispatch(Request::CreateNote).await;
    harness.clock.advance_ms(500);
    let second = harness.coordinator.dispatch(Request::CreateNote).await;

    assert!(first.success);
    assert_eq!(
        second,
        Response::failure("Please wait before creating another note")
    );
    assert_eq!(harness.coordinator.notes().list_notes().unwrap().len(), 2);
}

#[tokio::test]
async fn create_after_window_yields_distinct_active_notes() {
    let mut harness = harness();
    let first = create(&mut harness).await;
    let second = create(&mut harness).await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.title, "Untitled Note");
    assert!(first.content.is_empty());
    assert_eq!(active_note(&harness).id, second.id);
}

#[tokio::test]
async fn deleting_the_last_note_is_refused_and_store_unchanged() {
    let mut harness = harness();
    let only = active_note(&harness);
    let notes_before = harness.store.snapshot(NOTES_KEY);
    let active_before = harness.store.snapshot(ACTIVE_NOTE_KEY);

    let response = harness
        .coordinator
        .dispatch(Request::DeleteNote { note_id: only.id })
        .await;

    assert_eq!(response, Response::failure("Cannot delete the last note"));
    assert_eq!(harness.store.snapshot(NOTES_KEY), notes_before);
    assert_eq!(harness.store.snapshot(ACTIVE_NOTE_KEY), active_before);
}

#[tokio::test]
async fn deleting_the_active_note_reassigns_pointer() {
    let mut harness = harness();
    let first = active_note(&harness);
    let second = create(&mut harness).await;
    drain(&mut harness.events);

    let response = harness
        .coordinator
        .dispatch(Request::DeleteNote {
            note_id: second.id.clone(),
        })
        .await;

    assert!(response.success);
    let remaining = harness.coordinator.notes().list_notes().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(active_note(&harness).id, first.id);
    assert_eq!(kinds(&mut harness.events), vec!["noteDeleted", "noteSwitched"]);
}

#[tokio::test]
async fn deleting_an_inactive_note_keeps_pointer() {
    let mut harness = harness();
    let first = active_note(&harness);
    let second = create(&mut harness).await;
    drain(&mut harness.events);

    harness
        .coordinator
        .dispatch(Request::DeleteNote { note_id: first.id })
        .await;

    assert_eq!(active_note(&harness).id, second.id);
    assert_eq!(kinds(&mut harness.events), vec!["noteDeleted"]);
}

#[tokio::test]
async fn unknown_ids_fail_with_not_found() {
    let mut harness = harness();
    for request in [
        Request::DeleteNote {
            note_id: "missing".to_string(),
        },
        Request::RenameNote {
            note_id: "missing".to_string(),
            new_title: "x".to_string(),
        },
        Request::UpdateNote {
            note_id: "missing".to_string(),
            content: "x".to_string(),
        },
        Request::SwitchNote {
            note_id: "missing".to_string(),
        },
    ] {
        let response = harness.coordinator.dispatch(request).await;
        assert_eq!(response, Response::failure("Note not found: missing"));
    }
}

#[tokio::test]
async fn update_content_round_trips_with_monotonic_timestamp() {
    let mut harness = harness();
    let note = active_note(&harness);
    harness.clock.advance_ms(10);

    let response = harness
        .coordinator
        .dispatch(Request::UpdateNote {
            note_id: note.id.clone(),
            content: "<p>raw <b>html</b></p>".to_string(),
        })
        .await;
    let updated = response.note.unwrap();

    assert_eq!(updated.content, "<p>raw <b>html</b></p>");
    assert!(updated.last_modified >= note.last_modified);
    let stored = harness.coordinator.notes().get_note(&note.id).unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn rename_and_switch_broadcast_their_notes() {
    let mut harness = harness();
    let first = active_note(&harness);
    create(&mut harness).await;
    drain(&mut harness.events);
    harness.clock.advance_ms(5_000);

    let renamed = harness
        .coordinator
        .dispatch(Request::RenameNote {
            note_id: first.id.clone(),
            new_title: "  Biology  ".to_string(),
        })
        .await;
    let switched = harness
        .coordinator
        .dispatch(Request::SwitchNote {
            note_id: first.id.clone(),
        })
        .await;

    let renamed = renamed.note.unwrap();
    assert_eq!(renamed.title, "Biology");
    assert!(renamed.last_modified > first.last_modified);
    assert_eq!(switched.note.unwrap().id, first.id);
    assert_eq!(active_note(&harness).id, first.id);
    assert_eq!(kinds(&mut harness.events), vec!["noteRenamed", "noteSwitched"]);
}

#[tokio::test]
async fn configured_explain_appends_one_bullet_with_verbatim_explanation() {
    let explainer = FixedExplainer::new(Ok("Powerhouse of the cell.".to_string()));
    let mut harness = harness();
    harness.coordinator = harness.coordinator.with_explainer(explainer.clone());
    drain(&mut harness.events);

    let response = harness
        .coordinator
        .dispatch(Request::Explain {
            text: "mitochondria".to_string(),
        })
        .await;

    assert!(response.success);
    assert_eq!(
        response.explanation.as_deref(),
        Some("Powerhouse of the cell.")
    );
    assert_eq!(
        response.note.unwrap().content,
        "<ul><li><strong>Text:</strong> mitochondria | <strong>Explanation:</strong> Powerhouse of the cell.</li></ul>"
    );
    assert_eq!(explainer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        kinds(&mut harness.events),
        vec![
            "explanationLoading",
            "explanationComplete",
            "clearHighlightedText"
        ]
    );
}

#[tokio::test]
async fn duplicate_explain_does_not_call_client_twice() {
    let explainer = FixedExplainer::new(Ok("x".to_string()));
    let mut harness = harness();
    harness.coordinator = harness.coordinator.with_explainer(explainer.clone());
    let explain = Request::Explain {
        text: "osmosis".to_string(),
    };

    assert!(harness.coordinator.dispatch(explain.clone()).await.success);
    harness.clock.advance_ms(1_999);
    let second = harness.coordinator.dispatch(explain).await;

    assert_eq!(second, Response::failure("Duplicate request"));
    assert_eq!(explainer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unconfigured_explain_fails_without_mutating_store() {
    let mut harness = harness();
    let notes_before = harness.store.snapshot(NOTES_KEY);
    drain(&mut harness.events);

    let response = harness
        .coordinator
        .dispatch(Request::Explain {
            text: "osmosis".to_string(),
        })
        .await;

    assert_eq!(
        response,
        Response::failure("API key not configured. Please add your Gemini API key.")
    );
    assert_eq!(harness.store.snapshot(NOTES_KEY), notes_before);
    assert_eq!(
        drain(&mut harness.events),
        vec![Notification::Error {
            error: "API key not configured. Please add your Gemini API key.".to_string()
        }]
    );
}

#[tokio::test]
async fn explain_failure_is_mapped_and_broadcast() {
    let explainer = FixedExplainer::new(Err(ExplainError::RateLimited));
    let mut harness = harness();
    harness.coordinator = harness.coordinator.with_explainer(explainer);
    let notes_before = harness.store.snapshot(NOTES_KEY);
    drain(&mut harness.events);

    let response = harness
        .coordinator
        .dispatch(Request::Explain {
            text: "osmosis".to_string(),
        })
        .await;

    assert_eq!(
        response.error.as_deref(),
        Some("Too many requests. Please wait a moment and try again.")
    );
    assert_eq!(harness.store.snapshot(NOTES_KEY), notes_before);
    assert_eq!(kinds(&mut harness.events), vec!["explanationLoading", "error"]);
}

#[tokio::test]
async fn storage_failure_is_generic_and_leaves_store_untouched() {
    let mut harness = harness();
    let notes_before = harness.store.snapshot(NOTES_KEY);
    harness.store.set_fail_writes(true);
    drain(&mut harness.events);

    let response = harness
        .coordinator
        .dispatch(Request::Add {
            text: "cell".to_string(),
        })
        .await;

    assert!(!response.success);
    assert_eq!(
        response.error.as_deref(),
        Some("Could not save changes. Please try again.")
    );
    assert_eq!(harness.store.snapshot(NOTES_KEY), notes_before);
    assert!(drain(&mut harness.events).is_empty());
}

#[tokio::test]
async fn settings_merge_and_broadcast() {
    let mut harness = harness();
    let defaults = harness.coordinator.dispatch(Request::GetSettings).await;
    assert_eq!(defaults.settings.unwrap().default_font(), "Lexend");

    let update = serde_json::from_value(json!({ "defaultFont": "Inter" })).unwrap();
    let merged = harness
        .coordinator
        .dispatch(Request::UpdateSettings { settings: update })
        .await
        .settings
        .unwrap();

    assert_eq!(merged.default_font(), "Inter");
    assert_eq!(merged.get("panelWidth"), Some(&json!(400)));
    assert_eq!(
        drain(&mut harness.events).last().map(Notification::kind),
        Some("settingsUpdated")
    );
}

#[tokio::test]
async fn relay_requests_only_broadcast() {
    let mut harness = harness();
    drain(&mut harness.events);
    let notes_before = harness.store.snapshot(NOTES_KEY);

    assert!(harness.coordinator.dispatch(Request::OpenSidePanel).await.success);
    assert!(
        harness
            .coordinator
            .dispatch(Request::SetHighlightedText {
                text: "selected".to_string()
            })
            .await
            .success
    );

    assert_eq!(harness.store.snapshot(NOTES_KEY), notes_before);
    assert_eq!(
        drain(&mut harness.events),
        vec![
            Notification::ShowPanel,
            Notification::SetHighlightedText {
                text: "selected".to_string()
            }
        ]
    );
}

#[tokio::test]
async fn unknown_json_action_is_a_failure_value() {
    let mut harness = harness();
    let response = harness
        .coordinator
        .dispatch_json(r#"{"action":"formatDisk"}"#)
        .await;
    assert_eq!(response, Response::failure("Unknown action"));

    let all = harness
        .coordinator
        .dispatch_json(r#"{"action":"getAllNotes"}"#)
        .await;
    assert_eq!(all.notes.unwrap().len(), 1);
}

#[tokio::test]
async fn handle_serializes_requests_from_many_callers() {
    let harness = harness();
    let (handle, task) = spawn(harness.coordinator, DEFAULT_QUEUE_CAPACITY);

    let mut joins = Vec::new();
    for index in 0..8 {
        let handle = handle.clone();
        joins.push(tokio::spawn(async move {
            handle
                .send(Request::Add {
                    text: format!("item {index}"),
                })
                .await
        }));
    }
    for join in joins {
        assert!(join.await.unwrap().success);
    }

    let active = handle.send(Request::GetActiveNote).await.note.unwrap();
    assert_eq!(active.content.matches("<li>").count(), 8);
    assert_eq!(active.content.matches("<ul>").count(), 1);

    drop(handle);
    task.await.unwrap();
}

#[tokio::test]
async fn stopped_coordinator_answers_with_failure() {
    let harness = harness();
    let (handle, task) = spawn(harness.coordinator, 1);
    task.abort();
    let _ = task.await;

    let response = handle.send(Request::GetAllNotes).await;
    assert!(!response.success);
}
