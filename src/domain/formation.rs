//! Cluster formation state machine.
//!
//! ```text
//! Uninitialized -> ControlPlaneBootstrapping -> ControlPlaneReady -> WorkersJoining -> ClusterFormed
//!       \_____________________________________________/
//!                 (existing membership evidence)
//! ```

use super::token::ClusterToken;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormationState {
    #[default]
    Uninitialized,
    ControlPlaneBootstrapping,
    /// Control plane is up. The token is `None` when membership evidence was
    /// found but no token file exists locally.
    ControlPlaneReady(Option<ClusterToken>),
    WorkersJoining,
    ClusterFormed,
}

impl FormationState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::ControlPlaneBootstrapping => "control-plane-bootstrapping",
            Self::ControlPlaneReady(_) => "control-plane-ready",
            Self::WorkersJoining => "workers-joining",
            Self::ClusterFormed => "cluster-formed",
        }
    }

    #[must_use]
    pub fn is_control_plane_ready(&self) -> bool {
        matches!(
            self,
            Self::ControlPlaneReady(_) | Self::WorkersJoining | Self::ClusterFormed
        )
    }

    fn illegal(&self, to: &'static str) -> Error {
        Error::IllegalTransition {
            from: self.name(),
            to,
        }
    }

    /// `Uninitialized -> ControlPlaneBootstrapping`.
    pub fn begin_bootstrap(&mut self) -> Result<()> {
        match self {
            Self::Uninitialized => {
                *self = Self::ControlPlaneBootstrapping;
                Ok(())
            }
            _ => Err(self.illegal("control-plane-bootstrapping")),
        }
    }

    /// Enter `ControlPlaneReady`, either after bootstrapping or directly from
    /// `Uninitialized` when the cluster already exists.
    pub fn control_plane_ready(&mut self, token: Option<ClusterToken>) -> Result<()> {
        match self {
            Self::Uninitialized | Self::ControlPlaneBootstrapping => {
                *self = Self::ControlPlaneReady(token);
                Ok(())
            }
            _ => Err(self.illegal("control-plane-ready")),
        }
    }

    /// `ControlPlaneReady -> WorkersJoining`.
    pub fn begin_joining(&mut self) -> Result<()> {
        match self {
            Self::ControlPlaneReady(_) => {
                *self = Self::WorkersJoining;
                Ok(())
            }
            _ => Err(self.illegal("workers-joining")),
        }
    }

    /// `WorkersJoining -> ClusterFormed`.
    pub fn formed(&mut self) -> Result<()> {
        match self {
            Self::WorkersJoining => {
                *self = Self::ClusterFormed;
                Ok(())
            }
            _ => Err(self.illegal("cluster-formed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_bootstrap_path() {
        let mut state = FormationState::default();
        state.begin_bootstrap().unwrap();
        state
            .control_plane_ready(Some(ClusterToken::new("abcdef.0123456789abcdef", "https://cp:6443")))
            .unwrap();
        assert!(state.is_control_plane_ready());
        state.begin_joining().unwrap();
        state.formed().unwrap();
        assert_eq!(state, FormationState::ClusterFormed);
    }

    #[test]
    fn existing_cluster_skips_bootstrapping() {
        let mut state = FormationState::default();
        state.control_plane_ready(None).unwrap();
        assert_eq!(state, FormationState::ControlPlaneReady(None));
    }

    #[test]
    fn workers_cannot_join_before_control_plane_ready() {
        let mut state = FormationState::default();
        let err = state.begin_joining().unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalTransition {
                from: "uninitialized",
                to: "workers-joining"
            }
        ));
        assert_eq!(state, FormationState::Uninitialized);
    }

    #[test]
    fn bootstrap_cannot_restart_once_ready() {
        let mut state = FormationState::default();
        state.control_plane_ready(None).unwrap();
        assert!(state.begin_bootstrap().is_err());
    }
}
