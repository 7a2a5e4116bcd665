//! Health monitoring.
//!
//! Polls every recorded node's readiness, classifies it and aggregates the
//! fleet under the worker quorum. Polling is bounded by the verify timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use super::progress::ProgressReporter;
use crate::domain::{
    ClusterHealth, DeploymentState, HealthReport, NodeHealth, NodeHealthCheck, Phase,
};
use crate::port::outbound::remote::RemoteNode;
use crate::port::outbound::runtime::ClusterRuntime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSettings {
    pub poll_interval: Duration,
    /// Bound on the whole verify phase.
    pub timeout: Duration,
    /// Bound on one node's readiness check.
    pub check_timeout: Duration,
    /// Share of workers that must be healthy, in `(0, 1]`.
    pub worker_quorum: f64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
            check_timeout: Duration::from_secs(10),
            worker_quorum: 1.0,
        }
    }
}

/// Final result of a verify phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    pub report: HealthReport,
    pub health: ClusterHealth,
    pub polls: u32,
}

pub struct HealthMonitor {
    runtime: Arc<dyn ClusterRuntime>,
    settings: HealthSettings,
}

impl HealthMonitor {
    pub fn new(runtime: Arc<dyn ClusterRuntime>, settings: HealthSettings) -> Self {
        Self { runtime, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    pub fn aggregate(&self, report: &HealthReport) -> ClusterHealth {
        report.aggregate(self.settings.worker_quorum)
    }

    /// Check every recorded node once. Never fails: a node whose check errors
    /// or times out is unreachable.
    pub async fn check_once(&self, state: &DeploymentState) -> HealthReport {
        let mut checks = JoinSet::new();
        for (name, record) in &state.nodes {
            let node = RemoteNode::from_record(name, record);
            let runtime = Arc::clone(&self.runtime);
            let bound = self.settings.check_timeout;
            checks.spawn(async move {
                match timeout(bound, runtime.ready(&node)).await {
                    Ok(Ok(health)) => NodeHealthCheck::new(node.name, node.role, health),
                    Ok(Err(err)) => {
                        NodeHealthCheck::new(node.name, node.role, NodeHealth::Unreachable)
                            .with_detail(err.to_string())
                    }
                    Err(_) => NodeHealthCheck::new(node.name, node.role, NodeHealth::Unreachable)
                        .with_detail(format!("no answer within {}s", bound.as_secs())),
                }
            });
        }

        let mut results = Vec::with_capacity(state.nodes.len());
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(check) => results.push(check),
                Err(err) => warn!(error = %err, "Health check task failed"),
            }
        }
        results.sort_by(|a, b| a.name().cmp(b.name()));

        for check in &results {
            debug!(node = check.name(), health = %check.health(), "Node checked");
        }
        HealthReport::new(results)
    }

    /// Write a poll's observations onto the records.
    pub fn apply(state: &mut DeploymentState, report: &HealthReport) {
        let at = Utc::now();
        for check in report.checks() {
            if let Some(record) = state.record_mut(check.name()) {
                record.observe(check.health().status(), at);
            }
        }
    }

    /// Poll until the fleet is healthy or the verify timeout passes.
    pub async fn wait_converged(
        &self,
        state: &mut DeploymentState,
        progress: &ProgressReporter,
    ) -> Convergence {
        let started = Instant::now();
        let bound = self.settings.timeout;
        let total = state.nodes.len();
        let mut polls = 0;
        progress.begin(Phase::Verify);

        loop {
            let report = self.check_once(state).await;
            Self::apply(state, &report);
            polls += 1;

            let healthy = report.checks().iter().filter(|c| c.is_healthy()).count();
            progress.report(Phase::Verify, healthy, total);
            let health = self.aggregate(&report);

            let elapsed = started.elapsed();
            if health == ClusterHealth::Healthy || elapsed >= bound {
                info!(
                    health = %health,
                    healthy,
                    total,
                    polls,
                    elapsed_secs = elapsed.as_secs(),
                    "Verification finished"
                );
                return Convergence {
                    report,
                    health,
                    polls,
                };
            }

            debug!(health = %health, healthy, total, "Fleet not yet healthy");
            sleep(self.settings.poll_interval.min(bound - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NodeStatus, Role};
    use crate::testkit::config::node_record;
    use crate::testkit::runtime::FakeRuntime;

    fn fleet_state() -> DeploymentState {
        let mut state = DeploymentState::empty();
        state.upsert("cp-1", node_record("vm-100", Role::ControlPlane, "10.0.0.10"));
        state.upsert("w-1", node_record("vm-101", Role::Worker, "10.0.0.11"));
        state.upsert("w-2", node_record("vm-102", Role::Worker, "10.0.0.12"));
        state
    }

    fn monitor(runtime: &Arc<FakeRuntime>) -> HealthMonitor {
        HealthMonitor::new(runtime.clone(), HealthSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_fleet_converges_on_first_poll() {
        let runtime = Arc::new(FakeRuntime::new().with_members(["cp-1", "w-1", "w-2"]));
        let mut state = fleet_state();

        let result = monitor(&runtime)
            .wait_converged(&mut state, &ProgressReporter::disabled())
            .await;

        assert_eq!(result.health, ClusterHealth::Healthy);
        assert_eq!(result.polls, 1);
        assert!(state
            .nodes
            .values()
            .all(|record| record.last_status == NodeStatus::Healthy));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_worker_degrades_after_timeout() {
        let runtime = Arc::new(FakeRuntime::new().with_members(["cp-1", "w-1", "w-2"]));
        runtime.unreachable("w-2");
        let mut state = fleet_state();
        let started = Instant::now();

        let result = monitor(&runtime)
            .wait_converged(&mut state, &ProgressReporter::disabled())
            .await;

        assert_eq!(result.health, ClusterHealth::Degraded);
        assert_eq!(result.report.check("cp-1").unwrap().health(), NodeHealth::Healthy);
        assert_eq!(state.record("w-2").unwrap().last_status, NodeStatus::Unreachable);
        assert!(started.elapsed() >= Duration::from_secs(300));
        assert!(started.elapsed() < Duration::from_secs(310));
    }

    #[tokio::test(start_paused = true)]
    async fn quorum_below_one_tolerates_a_worker() {
        let runtime = Arc::new(FakeRuntime::new().with_members(["cp-1", "w-1", "w-2"]));
        runtime.unreachable("w-2");
        let monitor = HealthMonitor::new(
            runtime.clone(),
            HealthSettings {
                worker_quorum: 0.5,
                ..HealthSettings::default()
            },
        );

        let report = monitor.check_once(&fleet_state()).await;

        assert_eq!(monitor.aggregate(&report), ClusterHealth::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn control_plane_not_ready_is_unhealthy() {
        let runtime = Arc::new(FakeRuntime::new().with_members(["w-1", "w-2"]));
        let report = monitor(&runtime).check_once(&fleet_state()).await;

        assert_eq!(report.check("cp-1").unwrap().health(), NodeHealth::Degraded);
        assert_eq!(monitor(&runtime).aggregate(&report), ClusterHealth::Unhealthy);
    }
}
