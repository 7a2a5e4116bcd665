//! Bounded-concurrency job runner for one phase.
//!
//! Jobs fan out onto at most `max_parallelism` workers and fan back in to the
//! caller's task. A failing job never cancels its siblings; a fatal
//! (configuration) error stops dispatch of jobs that have not started yet.
//! Workers only return results: the `on_terminal` callback runs on the
//! caller's task, which is the single writer of deployment state.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::{Job, JobId, JobKind, NodeSpec, Phase};
use crate::error::{Error, InfraError, Result};

/// Worker count when none is configured.
pub const DEFAULT_MAX_PARALLELISM: usize = 4;

/// Receives every job status transition.
pub trait JobObserver: Send + Sync {
    fn on_transition(&self, job: &Job);
}

/// Shared handle to a job owned by the executor.
#[derive(Clone)]
pub struct JobHandle {
    job: Arc<Mutex<Job>>,
    observer: Option<Arc<dyn JobObserver>>,
}

impl JobHandle {
    fn new(job: Job, observer: Option<Arc<dyn JobObserver>>) -> Self {
        Self {
            job: Arc::new(Mutex::new(job)),
            observer,
        }
    }

    pub fn id(&self) -> JobId {
        self.job.lock().id
    }

    pub fn kind(&self) -> JobKind {
        self.job.lock().kind
    }

    pub fn target(&self) -> NodeSpec {
        self.job.lock().target.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.job.lock().attempts
    }

    pub fn snapshot(&self) -> Job {
        self.job.lock().clone()
    }

    /// Record the start of another attempt. `false` once the budget is spent.
    pub fn begin_attempt(&self) -> bool {
        let snapshot = {
            let mut job = self.job.lock();
            if !job.begin_attempt() {
                return false;
            }
            job.clone()
        };
        self.notify(&snapshot);
        true
    }

    fn finish(&self, succeeded: bool) -> Job {
        let snapshot = {
            let mut job = self.job.lock();
            job.finish(succeeded);
            job.clone()
        };
        self.notify(&snapshot);
        snapshot
    }

    fn notify(&self, job: &Job) {
        if let Some(observer) = &self.observer {
            observer.on_transition(job);
        }
    }
}

/// Terminal job plus what it produced.
#[derive(Debug)]
pub struct JobOutcome<T> {
    pub job: Job,
    pub result: Result<T>,
}

/// Every job of a phase, once all are terminal.
#[derive(Debug)]
pub struct PhaseReport<T> {
    pub phase: Phase,
    pub outcomes: Vec<JobOutcome<T>>,
}

impl<T> PhaseReport<T> {
    /// A phase fails when any of its jobs failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.result.is_err())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Job, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|err| (&outcome.job, err)))
    }

    pub fn successes(&self) -> impl Iterator<Item = (&Job, &T)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().map(|value| (&outcome.job, value)))
    }

    /// Split out the first fatal error, if any job hit one.
    pub fn take_fatal(&mut self) -> Option<Error> {
        let index = self.outcomes.iter().position(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .is_some_and(Error::is_fatal)
        })?;
        let outcome = self.outcomes.remove(index);
        outcome.result.err()
    }
}

/// Runs the jobs of one phase on a bounded worker pool.
#[derive(Clone)]
pub struct ParallelExecutor {
    max_parallelism: usize,
    cancel: Option<watch::Receiver<bool>>,
    observer: Option<Arc<dyn JobObserver>>,
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLELISM)
    }
}

impl ParallelExecutor {
    #[must_use]
    pub fn new(max_parallelism: usize) -> Self {
        Self {
            max_parallelism: max_parallelism.max(1),
            cancel: None,
            observer: None,
        }
    }

    /// Stop dispatching new jobs once `cancel` reads `true`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run `jobs` to completion.
    ///
    /// Returns only after every job is terminal. `on_terminal` is called once
    /// per job, in completion order, on the caller's task.
    pub async fn run<T, F, Fut, C>(
        &self,
        phase: Phase,
        jobs: Vec<Job>,
        work: F,
        mut on_terminal: C,
    ) -> PhaseReport<T>
    where
        T: Send + 'static,
        F: Fn(JobHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        C: FnMut(&Job, &Result<T>),
    {
        let total = jobs.len();
        info!(
            phase = %phase,
            jobs = total,
            max_parallelism = self.max_parallelism,
            "Phase starting"
        );

        let work = Arc::new(work);
        let slots = Arc::new(Semaphore::new(self.max_parallelism));
        let halt = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let handle = JobHandle::new(job, self.observer.clone());
            let work = Arc::clone(&work);
            let slots = Arc::clone(&slots);
            let halt = Arc::clone(&halt);
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let permit = slots.acquire_owned().await;
                let stopped = halt.load(Ordering::SeqCst)
                    || cancel.as_ref().is_some_and(|rx| *rx.borrow());
                if permit.is_err() || stopped || !handle.begin_attempt() {
                    return (handle.finish(false), Err(Error::Infra(InfraError::Cancelled)));
                }

                // Run the work on its own task so a panic surfaces as a job
                // failure instead of losing the job.
                let result = match tokio::spawn(work(handle.clone())).await {
                    Ok(result) => result,
                    Err(join_error) => Err(Error::Infra(InfraError::WorkerFailed(
                        join_error.to_string(),
                    ))),
                };
                let job = handle.finish(result.is_ok());
                // Set before the slot frees so the next queued job sees it.
                if result.as_ref().err().is_some_and(Error::is_fatal) {
                    halt.store(true, Ordering::SeqCst);
                }
                drop(permit);
                (job, result)
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut fatal_logged = false;
        while let Some(joined) = tasks.join_next().await {
            let (job, result) = match joined {
                Ok(pair) => pair,
                Err(join_error) => {
                    error!(phase = %phase, error = %join_error, "Executor task lost");
                    continue;
                }
            };

            match &result {
                Ok(_) => debug!(
                    phase = %phase,
                    node = %job.target.name,
                    attempts = job.attempts,
                    "Job succeeded"
                ),
                Err(err) if err.is_fatal() => {
                    if !fatal_logged {
                        fatal_logged = true;
                        error!(
                            phase = %phase,
                            node = %job.target.name,
                            error = %err,
                            "Fatal error, halting dispatch"
                        );
                    }
                }
                Err(err) => warn!(
                    phase = %phase,
                    node = %job.target.name,
                    attempts = job.attempts,
                    error = %err,
                    "Job failed"
                ),
            }

            on_terminal(&job, &result);
            outcomes.push(JobOutcome { job, result });
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            phase = %phase,
            succeeded = outcomes.len() - failed,
            failed,
            "Phase complete"
        );

        PhaseReport { phase, outcomes }
    }
}
