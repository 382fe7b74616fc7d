//! Concurrency and progress orchestration.
//!
//! Threads run concurrently up to `max_parallel_threads`; slots inside a thread stay
//! sequential. Persistence is serialized behind a single-permit semaphore, and progress
//! counters, the error list and the saved-thread set share one coarse lock.

use crate::carryover::AttachmentLedger;
use crate::error::EngineError;
use crate::config::GenerationSettings;
use crate::generation::{plan_thread, StoryContext, ThreadGenerator, ThreadOutcome, ThreadWindow};
use crate::model::{EmailThread, Storyline};
use crate::planning::{ThreadPlan, ThreadStructurePlanner};
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::sink::{sanitize, MessageSink};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// An error recorded during a run without stopping it.
#[derive(Debug, Clone, Serialize)]
pub struct RunError {
    pub thread_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub storyline_id: String,
    pub beat_id: String,
    pub thread_id: String,
    pub emails: usize,
    pub failed: usize,
    pub topic: Option<String>,
    pub attachments: AttachmentLedger,
    pub saved: bool,
}

/// Partial results plus every error encountered.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub threads: Vec<ThreadSummary>,
    pub emails_planned: usize,
    pub emails_generated: usize,
    pub emails_failed: usize,
    pub attachments: AttachmentLedger,
    pub errors: Vec<RunError>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.emails_failed == 0
    }
}

/// Where finished threads are persisted.
#[derive(Clone)]
pub struct Persistence {
    pub sink: Arc<dyn MessageSink>,
    pub output: PathBuf,
}

#[derive(Default)]
struct RunState {
    /// Set on the first contract violation; jobs not yet started are skipped
    halted: bool,
    completed_emails: usize,
    saved: HashSet<String>,
    report: RunReport,
}

/// Slot plans for every thread, without any completion requests.
pub fn plan_storylines(
    settings: &GenerationSettings,
    storylines: &[Storyline],
) -> Result<Vec<ThreadPlan>, EngineError> {
    GenerationOrchestrator::validate(storylines)?;
    let planner =
        ThreadStructurePlanner::new(settings.planner.clone(), settings.attachments.clone());
    let mut plans = Vec::new();
    for storyline in storylines {
        for beat in &storyline.beats {
            let window = ThreadWindow {
                start: beat.start,
                end: beat.end,
            };
            for thread in &beat.threads {
                plans.push(plan_thread(&planner, settings.seed, thread, window)?);
            }
        }
    }
    Ok(plans)
}

struct ThreadJob {
    storyline: usize,
    beat: usize,
    position: usize,
    storyline_id: String,
    beat_id: String,
    story: StoryContext,
    window: ThreadWindow,
    thread: EmailThread,
}

pub struct GenerationOrchestrator {
    generator: Arc<ThreadGenerator>,
    persistence: Option<Persistence>,
    progress: Option<Arc<dyn ProgressSink>>,
    max_parallel_threads: usize,
    persist_permit: Arc<Semaphore>,
}

impl GenerationOrchestrator {
    pub fn new(generator: Arc<ThreadGenerator>) -> Self {
        let max_parallel_threads = generator.settings().max_parallel_threads.max(1);
        Self {
            generator,
            persistence: None,
            progress: None,
            max_parallel_threads,
            persist_permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_max_parallel_threads(mut self, max: usize) -> Self {
        self.max_parallel_threads = max.max(1);
        self
    }

    /// Check every beat's contract. Any violation aborts before generation starts.
    ///
    /// Thread ids must stay distinct once made file-safe, since each thread is persisted
    /// under a directory named after it.
    pub fn validate(storylines: &[Storyline]) -> Result<(), EngineError> {
        let mut thread_ids: HashMap<String, &str> = HashMap::new();
        for storyline in storylines {
            storyline.validate()?;
            for beat in &storyline.beats {
                for thread in &beat.threads {
                    if let Some(previous) = thread_ids.insert(sanitize(&thread.id), &thread.id) {
                        return Err(EngineError::ContractViolation(if previous == thread.id {
                            format!("Thread id '{}' appears more than once", thread.id)
                        } else {
                            format!(
                                "Thread ids '{}' and '{}' map to the same output directory",
                                previous, thread.id
                            )
                        }));
                    }
                }
            }
        }
        Ok(())
    }

    /// Generate every thread of every beat in place.
    ///
    /// Returns the run report with partial results and the error list. Contract violations
    /// and cancellation are returned as errors; threads generated so far stay in place.
    pub async fn run(
        &self,
        storylines: &mut [Storyline],
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        // Planning every thread surfaces contract violations before any completion request
        plan_storylines(self.generator.settings(), storylines)?;

        let mut jobs = Vec::new();
        for (s, storyline) in storylines.iter_mut().enumerate() {
            for (b, beat) in storyline.beats.iter_mut().enumerate() {
                let story = StoryContext {
                    storyline_title: storyline.title.clone(),
                    storyline_summary: storyline.summary.clone(),
                    beat_name: beat.name.clone(),
                    beat_plot: beat.plot.clone(),
                };
                let window = ThreadWindow {
                    start: beat.start,
                    end: beat.end,
                };
                for (position, thread) in std::mem::take(&mut beat.threads).into_iter().enumerate() {
                    jobs.push(ThreadJob {
                        storyline: s,
                        beat: b,
                        position,
                        storyline_id: storyline.id.clone(),
                        beat_id: beat.id.clone(),
                        story: story.clone(),
                        window,
                        thread,
                    });
                }
            }
        }

        let total_emails: usize = jobs.iter().map(|j| j.thread.email_count()).sum();
        let total_threads = jobs.len();
        let state = Mutex::new(RunState {
            report: RunReport {
                emails_planned: total_emails,
                ..Default::default()
            },
            ..Default::default()
        });

        info!(
            threads = total_threads,
            emails = total_emails,
            parallel = self.max_parallel_threads,
            "Starting generation run"
        );

        let finished: Vec<(ThreadJob, Result<(), EngineError>)> = stream::iter(jobs)
            .map(|mut job| {
                let state = &state;
                async move {
                    let result = self.run_job(&mut job, state, total_emails, cancel).await;
                    (job, result)
                }
            })
            .buffer_unordered(self.max_parallel_threads)
            .collect()
            .await;

        let mut fatal: Option<EngineError> = None;
        let mut finished = finished;
        finished.sort_by_key(|(job, _)| (job.storyline, job.beat, job.position));
        for (job, result) in finished {
            if let Err(e) = result {
                if e.is_cancelled() || e.is_contract_violation() {
                    // Cancellation wins over any contract violation seen on the way out
                    if fatal.as_ref().map(|f| !f.is_cancelled()).unwrap_or(true) {
                        fatal = Some(e);
                    }
                }
            }
            storylines[job.storyline].beats[job.beat].threads.push(job.thread);
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let mut report = state.into_inner().report;
        report.threads.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
        info!(
            threads = report.threads.len(),
            generated = report.emails_generated,
            failed = report.emails_failed,
            errors = report.errors.len(),
            "Generation run finished"
        );
        Ok(report)
    }

    async fn run_job(
        &self,
        job: &mut ThreadJob,
        state: &Mutex<RunState>,
        total_emails: usize,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if state.lock().halted {
            return Ok(());
        }

        let outcome = match self
            .generator
            .generate(&mut job.thread, &job.story, job.window, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) if e.is_contract_violation() => {
                error!(thread_id = %job.thread.id, error = %e, "Contract violation; halting run");
                state.lock().halted = true;
                return Err(e);
            }
            Err(e) => {
                error!(thread_id = %job.thread.id, error = %e, "Thread generation failed");
                state.lock().report.errors.push(RunError {
                    thread_id: Some(job.thread.id.clone()),
                    message: e.to_string(),
                });
                return Ok(());
            }
        };

        let saved = self.persist(&job.thread, state, cancel).await?;
        self.record(job, outcome, saved, state, total_emails);
        Ok(())
    }

    /// Save a thread through the sink, one thread at a time across the whole run.
    async fn persist(
        &self,
        thread: &EmailThread,
        state: &Mutex<RunState>,
        cancel: &CancellationToken,
    ) -> Result<bool, EngineError> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        if state.lock().saved.contains(&thread.id) {
            return Ok(true);
        }

        let _permit = tokio::select! {
            permit = self.persist_permit.acquire() => permit.map_err(|e| {
                EngineError::SinkError(format!("Persistence semaphore closed: {}", e))
            })?,
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        };

        match persistence.sink.save_thread(thread, &persistence.output).await {
            Ok(_) => {
                state.lock().saved.insert(thread.id.clone());
                Ok(true)
            }
            Err(e) => {
                warn!(thread_id = %thread.id, error = %e, "Failed to save thread");
                state.lock().report.errors.push(RunError {
                    thread_id: Some(thread.id.clone()),
                    message: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    fn record(
        &self,
        job: &ThreadJob,
        outcome: ThreadOutcome,
        saved: bool,
        state: &Mutex<RunState>,
        total_emails: usize,
    ) {
        let snapshot = {
            let mut state = state.lock();
            state.completed_emails += job.thread.email_count();
            let report = &mut state.report;
            report.emails_generated += outcome.committed - outcome.failed;
            report.emails_failed += outcome.failed;
            report.attachments.absorb(&outcome.ledger);
            for e in &outcome.errors {
                report.errors.push(RunError {
                    thread_id: Some(outcome.thread_id.clone()),
                    message: e.to_string(),
                });
            }
            report.threads.push(ThreadSummary {
                storyline_id: job.storyline_id.clone(),
                beat_id: job.beat_id.clone(),
                thread_id: outcome.thread_id.clone(),
                emails: outcome.committed,
                failed: outcome.failed,
                topic: outcome.topic.clone(),
                attachments: outcome.ledger,
                saved,
            });
            ProgressSnapshot::with_now(state.completed_emails, total_emails, outcome.thread_id)
        };
        // Reported outside the lock; sinks may be slow
        if let Some(progress) = &self.progress {
            progress.report(snapshot);
        }
    }
}
