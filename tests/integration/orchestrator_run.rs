//! Integration tests for multi-thread runs: validation, persistence, progress, cancellation

use super::test_utils::*;
use async_trait::async_trait;
use mailweave::error::EngineError;
use mailweave::generation::ThreadGenerator;
use mailweave::model::{EmailThread, Storyline};
use mailweave::orchestrator::{plan_storylines, GenerationOrchestrator, Persistence};
use mailweave::progress::ChannelProgressSink;
use mailweave::sink::{JsonFileSink, MessageSink};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn orchestrator(client: Arc<ScriptedClient>, seed: u64) -> GenerationOrchestrator {
    let generator: ThreadGenerator = generator(client, settings(seed));
    GenerationOrchestrator::new(Arc::new(generator))
}

fn three_threads() -> Vec<Storyline> {
    vec![storyline(
        "s1",
        &[("b1", &[("t-a", 3), ("t-b", 4)]), ("b2", &[("t-c", 2)])],
    )]
}

#[tokio::test]
async fn beat_count_mismatch_aborts_before_any_generation() {
    let client = Arc::new(ScriptedClient::always_valid());
    let mut storylines = three_threads();
    storylines[0].beats[0].email_count = 9;

    let err = orchestrator(client.clone(), 1)
        .run(&mut storylines, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_contract_violation());
    assert!(client.calls().is_empty());
    assert_eq!(storylines[0].beats[0].threads.len(), 2);
}

#[tokio::test]
async fn zero_email_thread_aborts_before_its_siblings_generate() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::always_valid());
    let orchestrator = orchestrator(client.clone(), 1).with_persistence(Persistence {
        sink: Arc::new(JsonFileSink::new()),
        output: temp.path().to_path_buf(),
    });
    let mut storylines = vec![storyline("s1", &[("b1", &[("t-a", 3), ("t-z", 0)])])];

    let err = orchestrator
        .run(&mut storylines, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_contract_violation());
    assert!(client.calls().is_empty());
    assert_eq!(storylines[0].beats[0].threads[0].committed_count(), 0);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn thread_ids_sharing_an_output_directory_are_contract_violations() {
    let client = Arc::new(ScriptedClient::always_valid());
    let mut storylines = vec![storyline("s1", &[("b1", &[("ops/q3", 2), ("ops_q3", 2)])])];

    let err = orchestrator(client.clone(), 1)
        .run(&mut storylines, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_contract_violation());
    assert!(err.to_string().contains("same output directory"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn duplicate_thread_ids_are_contract_violations() {
    let storylines = vec![storyline("s1", &[("b1", &[("t-a", 2)]), ("b2", &[("t-a", 2)])])];
    let err = plan_storylines(&settings(1), &storylines).unwrap_err();
    assert!(err.is_contract_violation());
}

#[tokio::test]
async fn run_persists_every_thread_and_reports_progress() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::always_valid());
    let (progress, receiver) = ChannelProgressSink::new_pair();
    let orchestrator = orchestrator(client, 4)
        .with_max_parallel_threads(3)
        .with_persistence(Persistence {
            sink: Arc::new(JsonFileSink::new()),
            output: temp.path().to_path_buf(),
        })
        .with_progress(Arc::new(progress));
    let mut storylines = three_threads();

    let report = orchestrator
        .run(&mut storylines, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.emails_planned, 9);
    assert_eq!(report.emails_generated, 9);
    assert_eq!(report.emails_failed, 0);
    assert!(report.is_clean());
    assert_eq!(report.threads.len(), 3);
    assert!(report.threads.iter().all(|t| t.saved));

    // Threads go back to their beats in their original order
    let ids: Vec<&str> = storylines[0].beats[0]
        .threads
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["t-a", "t-b"]);
    assert_eq!(storylines[0].beats[1].threads[0].committed_count(), 2);

    for (thread_id, count) in [("t-a", 3), ("t-b", 4), ("t-c", 2)] {
        let dir = JsonFileSink::thread_dir(temp.path(), thread_id);
        let written = std::fs::read_dir(&dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().map(|x| x == "json").unwrap_or(false))
            .count();
        assert_eq!(written, count);
    }

    let snapshots: Vec<_> = receiver.try_iter().collect();
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|s| s.total == 9));
    assert_eq!(snapshots.iter().map(|s| s.completed).max(), Some(9));
}

#[tokio::test]
async fn parallel_and_serial_runs_make_the_same_structural_choices() {
    let mut serial = three_threads();
    let mut parallel = three_threads();

    orchestrator(Arc::new(ScriptedClient::always_valid()), 99)
        .with_max_parallel_threads(1)
        .run(&mut serial, &CancellationToken::new())
        .await
        .unwrap();
    orchestrator(Arc::new(ScriptedClient::always_valid()), 99)
        .with_max_parallel_threads(4)
        .run(&mut parallel, &CancellationToken::new())
        .await
        .unwrap();

    let threads = |s: &[Storyline]| -> Vec<EmailThread> {
        s.iter()
            .flat_map(|st| st.beats.iter())
            .flat_map(|b| b.threads.iter().cloned())
            .collect()
    };
    for (a, b) in threads(&serial).iter().zip(threads(&parallel).iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(addressing(a), addressing(b));
    }
}

#[tokio::test]
async fn cancelled_run_propagates_and_keeps_threads_in_place() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::always_valid());
    let orchestrator = orchestrator(client.clone(), 2).with_persistence(Persistence {
        sink: Arc::new(JsonFileSink::new()),
        output: temp.path().to_path_buf(),
    });
    let mut storylines = three_threads();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator.run(&mut storylines, &cancel).await.unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
    assert!(client.calls().is_empty());
    assert_eq!(storylines[0].beats[0].threads.len(), 2);
    assert_eq!(storylines[0].beats[1].threads.len(), 1);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

struct FailingSink;

#[async_trait]
impl MessageSink for FailingSink {
    async fn save_thread(&self, thread: &EmailThread, _output: &Path) -> Result<usize, EngineError> {
        Err(EngineError::SinkError(format!("disk full while saving {}", thread.id)))
    }
}

#[tokio::test]
async fn sink_failures_are_listed_without_stopping_the_run() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::always_valid());
    let orchestrator = orchestrator(client, 6).with_persistence(Persistence {
        sink: Arc::new(FailingSink),
        output: temp.path().to_path_buf(),
    });
    let mut storylines = three_threads();

    let report = orchestrator
        .run(&mut storylines, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.emails_generated, 9);
    assert_eq!(report.errors.len(), 3);
    assert!(report.errors.iter().all(|e| e.message.contains("disk full")));
    assert!(report.threads.iter().all(|t| !t.saved));
}

#[tokio::test]
async fn failed_slots_are_counted_in_the_report() {
    let client = Arc::new(ScriptedClient::never_valid());
    let mut storylines = three_threads();

    let report = orchestrator(client, 3)
        .run(&mut storylines, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.emails_generated, 0);
    assert_eq!(report.emails_failed, 9);
    assert!(!report.is_clean());
    assert!(report.attachments.is_fully_resolved());
}
