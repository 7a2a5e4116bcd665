//! Platform-agnostic deployment domain.

pub mod fleet;
pub mod formation;
pub mod health;
pub mod id;
pub mod job;
pub mod node;
pub mod progress;
pub mod reconcile;
pub mod resource;
pub mod retry;
pub mod state;
pub mod token;

pub use fleet::FleetSpec;
pub use formation::FormationState;
pub use health::{ClusterHealth, HealthReport, NodeHealth, NodeHealthCheck};
pub use id::{JobId, ResourceId};
pub use job::{Job, JobKind, JobStatus, Phase};
pub use node::{NodeRecord, NodeSpec, NodeStatus, ResourceRequest, Role};
pub use progress::ProgressEvent;
pub use reconcile::{reconcile, Action, LiveProbe};
pub use resource::{ResourceInfo, ResourcePatch, ResourceState};
pub use retry::RetryPolicy;
pub use state::{DeploymentPhase, DeploymentState};
pub use token::ClusterToken;
