//! End-to-end: journal file → companion → inbox

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use starlog_core::classifier::{DEFAULT_ALLOW_LIST, DEFAULT_URGENT};
use starlog_core::generation::{CallbackPolicy, DEFAULT_SYSTEM_PROMPT};
use starlog_core::{
    AudioConfig, ClassifierConfig, Collaborators, Companion, CompanionConfig, GenerationConfig,
    Inbox, JournalConfig, Notification, NullSink, PipelineStatus, ScriptedGenerator,
    ToneSynthesizer,
};

fn config(dir: &Path, raw_text: bool) -> CompanionConfig {
    CompanionConfig {
        journal: JournalConfig {
            dir: dir.to_path_buf(),
            bootstrap: true,
            rotation_poll_ms: 50,
        },
        classifier: ClassifierConfig {
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
            urgent: DEFAULT_URGENT.iter().map(|s| s.to_string()).collect(),
        },
        generation: GenerationConfig {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            policy: CallbackPolicy::PerRequest,
            poll_interval_ms: 20,
        },
        audio: AudioConfig {
            voice: "alba".into(),
            poll_interval_ms: 20,
        },
        raw_text,
        lookup_timeout_ms: 1_000,
    }
}

fn companion(dir: &Path, raw_text: bool) -> Companion {
    Companion::new(
        config(dir, raw_text),
        Collaborators {
            generator: Arc::new(ScriptedGenerator::new()),
            synthesizer: Arc::new(ToneSynthesizer::new()),
            sink: Arc::new(NullSink::new()),
            lookup: None,
        },
    )
}

fn journal(dir: &Path, lines: &[&str]) -> PathBuf {
    let path = dir.join("Journal.2024-05-01T120000.01.log");
    let mut f = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    path
}

fn append(path: &Path, line: &str) {
    let mut f = OpenOptions::new().append(true).open(path).unwrap();
    writeln!(f, "{line}").unwrap();
}

/// Wait for the first notification matching `pred`, skipping others.
async fn expect(inbox: &mut Inbox, pred: impl Fn(&Notification) -> bool) -> Notification {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match inbox.recv().await {
                Some(n) if pred(&n) => return n,
                Some(_) => continue,
                None => panic!("inbox closed"),
            }
        }
    })
    .await
    .expect("notification not received in time")
}

fn response_starting(prefix: &'static str) -> impl Fn(&Notification) -> bool {
    move |n| matches!(n, Notification::Response(text) if text.starts_with(prefix))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bootstrap_then_live_arrival_then_chat() {
    let dir = tempfile::tempdir().unwrap();
    let path = journal(
        dir.path(),
        &[
            r#"{"timestamp":"2024-05-01T12:00:00Z","type":"SessionStart","commander":"Jameson","system":"Sol","ship":"Cobra MkIII","ship_name":"Starlight"}"#,
            r#"{"timestamp":"2024-05-01T12:01:00Z","type":"Music","track":"NoTrack"}"#,
        ],
    );

    let companion = companion(dir.path(), false);
    let mut inbox = companion.subscribe();
    companion.start().await.unwrap();
    assert!(companion.is_running());

    let replayed = expect(&mut inbox, |n| matches!(n, Notification::Event(_))).await;
    assert_eq!(
        replayed,
        Notification::Event(
            "[2024-05-01T12:00:00Z] Welcome back, Commander Jameson. Systems online. Aboard the Cobra MkIII. (state loaded)"
                .into()
        )
    );
    let loaded = expect(&mut inbox, response_starting("[STATE LOADED] ")).await;
    assert!(matches!(loaded, Notification::Response(t) if t.contains("Currently in Sol")));
    assert_eq!(companion.state().current_system(), "Sol");

    append(
        &path,
        r#"{"timestamp":"2024-05-01T12:05:00Z","type":"Arrival","system":"Sol","body":"Earth"}"#,
    );
    let event = expect(&mut inbox, |n| matches!(n, Notification::Event(_))).await;
    assert_eq!(
        event,
        Notification::Event("[2024-05-01T12:05:00Z] Arrived in Sol. Near Earth.".into())
    );
    let reply = expect(&mut inbox, response_starting("[Arrival] ")).await;
    assert_eq!(
        reply,
        Notification::Response(
            "[Arrival] Jump complete. Welcome to the system, Commander.".into()
        )
    );

    companion.submit_chat_message("   ");
    companion.submit_chat_message("Where are we?");
    let chat = expect(&mut inbox, response_starting("[CHAT] ")).await;
    assert_eq!(chat, Notification::Response("[CHAT] Acknowledged, Commander.".into()));

    companion.stop().await;
    expect(&mut inbox, |n| *n == Notification::Status(PipelineStatus::Stopped)).await;
    assert!(!companion.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raw_text_mode_and_urgent_canned_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = journal(dir.path(), &[r#"{"type":"SessionStart","system":"Lave"}"#]);

    let companion = companion(dir.path(), true);
    let mut inbox = companion.subscribe();
    companion.start().await.unwrap();
    expect(&mut inbox, response_starting("[STATE LOADED] ")).await;

    append(&path, r#"{"type":"Bounty","reward":2500,"target":"Kurt Vonnegut"}"#);
    let bounty = expect(&mut inbox, |n| matches!(n, Notification::Response(_))).await;
    assert_eq!(
        bounty,
        Notification::Response("[Bounty] Bounty claimed: 2500 credits for Kurt Vonnegut.".into())
    );

    append(&path, r#"{"type":"FuelCritical"}"#);
    let urgent = expect(&mut inbox, |n| matches!(n, Notification::Response(_))).await;
    assert!(matches!(urgent, Notification::Response(t) if t.starts_with("[URGENT] ")));

    companion.submit_chat_message("status?");
    let raw = expect(&mut inbox, response_starting("[RAW DATA] ")).await;
    assert!(matches!(raw, Notification::Response(t) if t.contains("Currently in Lave")));

    companion.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_until_a_journal_appears() {
    let dir = tempfile::tempdir().unwrap();
    let companion = companion(dir.path(), true);
    let mut inbox = companion.subscribe();

    companion.submit_chat_message("hello?");
    let refused = expect(&mut inbox, |n| matches!(n, Notification::Status(_))).await;
    assert!(matches!(
        refused,
        Notification::Status(PipelineStatus::Error(_))
    ));

    companion.start().await.unwrap();
    let idle = expect(&mut inbox, |n| matches!(n, Notification::Status(_))).await;
    assert!(matches!(idle, Notification::Status(PipelineStatus::Idle(_))));

    // Appears complete, as the game's own rotation would leave it.
    let staged = dir.path().join("staged.tmp");
    std::fs::write(&staged, "{\"type\":\"SessionStart\",\"system\":\"Diaso\"}\n").unwrap();
    std::fs::rename(&staged, dir.path().join("Journal.2024-05-02T080000.01.log")).unwrap();

    // The watcher or the poll task may attach first, so the two arrive in either order.
    let (mut running, mut loaded) = (false, None);
    while !running || loaded.is_none() {
        match expect(&mut inbox, |_| true).await {
            Notification::Status(PipelineStatus::Running) => running = true,
            Notification::Response(t) if t.starts_with("[STATE LOADED] ") => loaded = Some(t),
            _ => {}
        }
    }
    assert!(loaded.unwrap().contains("Currently in Diaso"));

    companion.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nothing_replayed_announces_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = journal(dir.path(), &[r#"{"type":"Music","track":"MainMenu"}"#]);

    let companion = companion(dir.path(), true);
    let mut inbox = companion.subscribe();
    companion.start().await.unwrap();
    expect(&mut inbox, |n| *n == Notification::Status(PipelineStatus::Running)).await;

    append(&path, r#"{"timestamp":"t1","type":"Docked","station":"Jameson Memorial"}"#);
    let mut seen = Vec::new();
    loop {
        let n = expect(&mut inbox, |_| true).await;
        let done = matches!(&n, Notification::Response(t) if t.starts_with("[Docked] "));
        seen.push(n);
        if done {
            break;
        }
    }
    assert!(!seen
        .iter()
        .any(|n| matches!(n, Notification::Response(t) if t.starts_with("[STATE LOADED]"))));
    assert_eq!(
        seen[0],
        Notification::Event("[t1] Docked at Jameson Memorial.".into())
    );

    companion.stop().await;
}
