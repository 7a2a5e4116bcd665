//! Job observers for measuring executor behavior.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::application::executor::JobObserver;
use crate::domain::{Job, JobId, JobStatus};

#[derive(Default)]
struct Inner {
    active: HashSet<JobId>,
    peak: usize,
    transitions: Vec<(String, JobStatus)>,
}

/// Tracks how many jobs are running at once.
#[derive(Default)]
pub struct ConcurrencyProbe {
    inner: Mutex<Inner>,
}

impl ConcurrencyProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most jobs ever active at the same time.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.inner.lock().peak
    }

    /// Every `(node, status)` transition seen, in order.
    #[must_use]
    pub fn transitions(&self) -> Vec<(String, JobStatus)> {
        self.inner.lock().transitions.clone()
    }
}

impl JobObserver for ConcurrencyProbe {
    fn on_transition(&self, job: &Job) {
        let mut inner = self.inner.lock();
        if job.status.is_active() {
            inner.active.insert(job.id);
        } else {
            inner.active.remove(&job.id);
        }
        inner.peak = inner.peak.max(inner.active.len());
        inner.transitions.push((job.target.name.clone(), job.status));
    }
}
