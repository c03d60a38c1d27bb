use super::*;
use crate::llm::{Conversation, FragmentStream, Provider};
use crate::prompts::{ActionParams, PromptError};
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/* ---------- fakes ---------- */

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Loading,
    Begun,
    Text(String),
    Ended,
    Withdrawn,
}

#[derive(Default)]
struct Recorder {
    events: Vec<Shown>,
}

impl Presenter for Recorder {
    fn show_loading(&mut self) {
        self.events.push(Shown::Loading);
    }
    fn begin_stream(&mut self) {
        self.events.push(Shown::Begun);
    }
    fn append(&mut self, fragment: &str) {
        self.events.push(Shown::Text(fragment.to_string()));
    }
    fn end_stream(&mut self) {
        self.events.push(Shown::Ended);
    }
    fn withdraw(&mut self) {
        self.events.push(Shown::Withdrawn);
    }
}

/// Yields a fixed script, optionally panicking at `panic_at`.
struct Scripted {
    fragments: Vec<&'static str>,
    panic_at: Option<usize>,
    seen: Mutex<Vec<Conversation>>,
}

impl Scripted {
    fn new(fragments: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            fragments,
            panic_at: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn panicking_at(fragments: Vec<&'static str>, panic_at: usize) -> Arc<Self> {
        Arc::new(Self {
            fragments,
            panic_at: Some(panic_at),
            seen: Mutex::new(Vec::new()),
        })
    }
}

impl Provider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, conversation: Conversation) -> FragmentStream {
        self.seen.lock().unwrap().push(conversation);
        let panic_at = self.panic_at;
        let fragments: Vec<String> = self.fragments.iter().map(|f| f.to_string()).collect();
        stream::iter(fragments.into_iter().enumerate())
            .map(move |(i, fragment)| {
                if Some(i) == panic_at {
                    panic!("provider blew up mid-stream");
                }
                fragment
            })
            .boxed()
    }
}

/// Streams whatever the test feeds through the returned sender.
struct Gated {
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    calls: Mutex<usize>,
}

impl Gated {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            calls: Mutex::new(0),
        });
        (provider, tx)
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Provider for Gated {
    fn name(&self) -> &str {
        "gated"
    }

    fn generate(&self, _conversation: Conversation) -> FragmentStream {
        *self.calls.lock().unwrap() += 1;
        match self.rx.lock().unwrap().take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|fragment| (fragment, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}

fn polish() -> ActionParams {
    ActionParams::default()
}

/// Drains until the coordinator goes idle.
async fn drain_until_idle(coordinator: &mut TaskCoordinator, presenter: &mut Recorder) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            coordinator.drain(presenter);
            if !coordinator.is_busy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("coordinator never went idle");
}

/// Drains until `n` stale messages have been thrown away.
async fn drain_discarding(coordinator: &mut TaskCoordinator, presenter: &mut Recorder, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        let mut discarded = 0;
        while discarded < n {
            discarded += coordinator.drain(presenter).discarded;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stale messages never arrived");
}

/* ---------- ordering ---------- */

#[tokio::test]
async fn fragments_arrive_in_order_between_sentinels() {
    let provider = Scripted::new(vec!["one ", "two ", "three ", "four"]);
    let mut coordinator = TaskCoordinator::new(Some(provider));
    let mut shown = Recorder::default();

    let outcome = coordinator
        .start_task("polish_text", "some text", &polish(), &mut shown)
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started(GenerationId(1)));
    assert!(coordinator.is_busy());

    drain_until_idle(&mut coordinator, &mut shown).await;

    assert_eq!(
        shown.events,
        vec![
            Shown::Loading,
            Shown::Begun,
            Shown::Text("one ".into()),
            Shown::Text("two ".into()),
            Shown::Text("three ".into()),
            Shown::Text("four".into()),
            Shown::Ended,
        ]
    );
}

#[tokio::test]
async fn translate_round_trip() {
    let provider = Scripted::new(vec!["你好", "！"]);
    let mut coordinator = TaskCoordinator::new(Some(provider.clone()));
    let mut shown = Recorder::default();

    coordinator
        .start_task(
            "translate",
            "Hello",
            &ActionParams::translate_to("Simplified Chinese"),
            &mut shown,
        )
        .unwrap();
    drain_until_idle(&mut coordinator, &mut shown).await;

    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].system().contains("Simplified Chinese"));
    assert!(seen[0].user().contains("Hello"));

    assert_eq!(
        shown.events,
        vec![
            Shown::Loading,
            Shown::Begun,
            Shown::Text("你好".into()),
            Shown::Text("！".into()),
            Shown::Ended,
        ]
    );
    assert!(!coordinator.is_busy());
}

/* ---------- stream-ended on every exit path ---------- */

#[tokio::test]
async fn empty_stream_still_ends() {
    let mut coordinator = TaskCoordinator::new(Some(Scripted::new(vec![])));
    let mut shown = Recorder::default();

    coordinator
        .start_task("summarize_points", "text", &polish(), &mut shown)
        .unwrap();
    drain_until_idle(&mut coordinator, &mut shown).await;

    assert_eq!(shown.events, vec![Shown::Loading, Shown::Ended]);
}

#[tokio::test]
async fn provider_panic_still_ends_stream() {
    let provider = Scripted::panicking_at(vec!["partial", "never"], 1);
    let mut coordinator = TaskCoordinator::new(Some(provider));
    let mut shown = Recorder::default();

    coordinator
        .start_task("polish_text", "text", &polish(), &mut shown)
        .unwrap();
    drain_until_idle(&mut coordinator, &mut shown).await;

    assert_eq!(
        shown.events,
        vec![
            Shown::Loading,
            Shown::Begun,
            Shown::Text("partial".into()),
            Shown::Ended,
        ]
    );
}

#[tokio::test]
async fn each_task_ends_exactly_once() {
    let mut coordinator = TaskCoordinator::new(Some(Scripted::new(vec!["a", "b"])));
    let mut shown = Recorder::default();

    for _ in 0..3 {
        coordinator
            .start_task("polish_text", "text", &polish(), &mut shown)
            .unwrap();
        drain_until_idle(&mut coordinator, &mut shown).await;
    }
    // Nothing left behind once every task has ended.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(coordinator.drain(&mut shown).is_empty());

    let ended = shown.events.iter().filter(|e| **e == Shown::Ended).count();
    assert_eq!(ended, 3);
    assert_eq!(coordinator.active_generation(), None);
}

/// Queues another fragment for `generation` every time one is shown.
struct Refilling {
    tx: mpsc::UnboundedSender<RelayMessage>,
    generation: GenerationId,
    shown: usize,
}

impl Presenter for Refilling {
    fn show_loading(&mut self) {}
    fn begin_stream(&mut self) {}
    fn append(&mut self, _fragment: &str) {
        self.shown += 1;
        let _ = self.tx.send(RelayMessage {
            generation: self.generation,
            event: RelayEvent::Fragment("more".into()),
        });
    }
    fn end_stream(&mut self) {}
    fn withdraw(&mut self) {}
}

#[tokio::test]
async fn one_pass_stops_at_what_was_queued() {
    let (provider, feed) = Gated::new();
    let mut coordinator = TaskCoordinator::new(Some(provider));
    let mut sink = Recorder::default();
    let outcome = coordinator
        .start_task("polish_text", "text", &polish(), &mut sink)
        .unwrap();
    let StartOutcome::Started(generation) = outcome else {
        panic!("task was not admitted");
    };

    let tx = coordinator.relay_sender();
    for _ in 0..3 {
        tx.send(RelayMessage {
            generation,
            event: RelayEvent::Fragment("queued".into()),
        })
        .unwrap();
    }
    let mut refilling = Refilling {
        tx,
        generation,
        shown: 0,
    };

    // Each append queues a replacement, so an unbounded pass never returns.
    let first = coordinator.drain(&mut refilling);
    assert_eq!(first.forwarded, 3);
    assert_eq!(refilling.shown, 3);

    let second = coordinator.drain(&mut refilling);
    assert_eq!(second.forwarded, 3);
    assert!(coordinator.is_busy());

    drop(feed);
}

/* ---------- admission ---------- */

#[tokio::test]
async fn second_start_while_busy_is_ignored() {
    let (provider, feed) = Gated::new();
    let mut coordinator = TaskCoordinator::new(Some(provider.clone()));
    let mut shown = Recorder::default();

    let first = coordinator
        .start_task("polish_text", "A", &polish(), &mut shown)
        .unwrap();
    let second = coordinator
        .start_task("summarize_points", "B", &polish(), &mut shown)
        .unwrap();

    assert_eq!(first, StartOutcome::Started(GenerationId(1)));
    assert_eq!(second, StartOutcome::Busy);
    assert_eq!(coordinator.active_generation(), Some(GenerationId(1)));

    feed.send("from A".to_string()).unwrap();
    drop(feed);
    drain_until_idle(&mut coordinator, &mut shown).await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(
        shown.events,
        vec![
            Shown::Loading,
            Shown::Begun,
            Shown::Text("from A".into()),
            Shown::Ended,
        ]
    );
}

#[tokio::test]
async fn missing_provider_has_no_side_effects() {
    let mut coordinator = TaskCoordinator::new(None);
    let mut shown = Recorder::default();

    let err = coordinator
        .start_task("polish_text", "text", &polish(), &mut shown)
        .unwrap_err();

    assert_eq!(err, CoordinatorError::ProviderUnavailable);
    assert!(!coordinator.is_busy());
    assert!(shown.events.is_empty());
}

#[tokio::test]
async fn prompt_failures_never_go_in_flight() {
    let provider = Scripted::new(vec!["unused"]);
    let mut coordinator = TaskCoordinator::new(Some(provider.clone()));
    let mut shown = Recorder::default();

    let unknown = coordinator
        .start_task("rewrite_as_haiku", "text", &polish(), &mut shown)
        .unwrap_err();
    assert_eq!(
        unknown,
        CoordinatorError::Prompt(PromptError::UnknownAction {
            action: "rewrite_as_haiku".into()
        })
    );

    let no_language = coordinator
        .start_task("translate", "text", &ActionParams::default(), &mut shown)
        .unwrap_err();
    assert_eq!(
        no_language,
        CoordinatorError::Prompt(PromptError::MissingTargetLanguage)
    );

    assert!(!coordinator.is_busy());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(coordinator.drain(&mut shown).is_empty());
    assert!(shown.events.is_empty());
    assert!(provider.seen.lock().unwrap().is_empty());
}

/* ---------- cancellation ---------- */

#[tokio::test]
async fn cancel_mid_stream_discards_late_messages() {
    let (provider, feed) = Gated::new();
    let mut coordinator = TaskCoordinator::new(Some(provider));
    let mut shown = Recorder::default();

    coordinator
        .start_task("polish_text", "text", &polish(), &mut shown)
        .unwrap();
    feed.send("early".to_string()).unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while !shown.events.contains(&Shown::Text("early".into())) {
            coordinator.drain(&mut shown);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    coordinator.cancel(&mut shown);
    assert!(!coordinator.is_busy());

    feed.send("late".to_string()).unwrap();
    drop(feed);
    // "late" and the final StreamEnded both belong to the cancelled task.
    drain_discarding(&mut coordinator, &mut shown, 2).await;

    assert_eq!(
        shown.events,
        vec![
            Shown::Loading,
            Shown::Begun,
            Shown::Text("early".into()),
            Shown::Withdrawn,
        ]
    );
}

#[tokio::test]
async fn new_task_after_cancel_ignores_old_output() {
    let (slow, feed) = Gated::new();
    let mut coordinator = TaskCoordinator::new(Some(slow));
    let mut shown = Recorder::default();

    coordinator
        .start_task("polish_text", "old", &polish(), &mut shown)
        .unwrap();
    coordinator.cancel(&mut shown);

    coordinator.set_provider(Some(Scripted::new(vec!["fresh"])));
    let outcome = coordinator
        .start_task("polish_text", "new", &polish(), &mut shown)
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started(GenerationId(2)));

    // The cancelled worker finishes while the new one is active.
    feed.send("stale".to_string()).unwrap();
    drop(feed);
    drain_until_idle(&mut coordinator, &mut shown).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.drain(&mut shown);

    assert!(!shown.events.contains(&Shown::Text("stale".into())));
    assert_eq!(
        shown.events,
        vec![
            Shown::Loading,
            Shown::Withdrawn,
            Shown::Loading,
            Shown::Begun,
            Shown::Text("fresh".into()),
            Shown::Ended,
        ]
    );
}

#[tokio::test]
async fn cancel_when_idle_only_withdraws() {
    let mut coordinator = TaskCoordinator::new(Some(Scripted::new(vec![])));
    let mut shown = Recorder::default();

    coordinator.cancel(&mut shown);

    assert!(!coordinator.is_busy());
    assert_eq!(shown.events, vec![Shown::Withdrawn]);
}
