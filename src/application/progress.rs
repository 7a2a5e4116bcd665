//! Progress aggregation.
//!
//! Phase percentages flow one way, from the orchestrator to whatever renders
//! them. Nothing reads them back.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::progress::percent;
use crate::domain::{Phase, ProgressEvent};

/// Emits a [`ProgressEvent`] whenever a phase's integer percentage changes.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    last: Arc<Mutex<Option<(Phase, u8)>>>,
}

impl ProgressReporter {
    /// Reporter plus the receiving end for a renderer task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self {
            tx: Some(tx),
            last: Arc::new(Mutex::new(None)),
        };
        (reporter, rx)
    }

    /// Reporter that drops every event.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Report `done` of `total` for `phase`.
    pub fn report(&self, phase: Phase, done: usize, total: usize) {
        let value = percent(done, total);
        {
            let mut last = self.last.lock();
            if *last == Some((phase, value)) {
                return;
            }
            *last = Some((phase, value));
        }

        if let Some(tx) = &self.tx {
            // A closed renderer only loses presentation.
            let _ = tx.send(ProgressEvent::new(phase, value));
        }
    }

    /// Mark the start of `phase`.
    pub fn begin(&self, phase: Phase) {
        self.report(phase, 0, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<(Phase, u8)> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((event.phase, event.percent));
        }
        events
    }

    #[test]
    fn emits_only_on_percentage_change() {
        let (reporter, mut rx) = ProgressReporter::channel();

        reporter.begin(Phase::Provision);
        reporter.report(Phase::Provision, 0, 300);
        reporter.report(Phase::Provision, 1, 300);
        reporter.report(Phase::Provision, 3, 300);
        reporter.report(Phase::Provision, 300, 300);

        assert_eq!(
            drain(&mut rx),
            vec![(Phase::Provision, 0), (Phase::Provision, 1), (Phase::Provision, 100)]
        );
    }

    #[test]
    fn new_phase_restarts_at_zero() {
        let (reporter, mut rx) = ProgressReporter::channel();

        reporter.report(Phase::Provision, 2, 2);
        reporter.begin(Phase::Join);
        reporter.report(Phase::Join, 1, 1);

        assert_eq!(
            drain(&mut rx),
            vec![(Phase::Provision, 100), (Phase::Join, 0), (Phase::Join, 100)]
        );
    }

    #[test]
    fn disabled_reporter_is_silent() {
        let reporter = ProgressReporter::disabled();
        reporter.report(Phase::Verify, 1, 2);
    }
}
