//! Placement state machine.
//!
//! Decides when the active model is visible and where it sits. Marker
//! updates only move the model while the awaiting-pose gate is open; once
//! a pose is applied the placement is sticky until a reposition request
//! reopens the gate, so tracker jitter never drags a settled model around.
//!
//! ```text
//!            load_model                 valid triple
//!   Idle ───────────────▶ WaitingForAnchors ───────────▶ PoseApplied
//!                          ▲   │  pose error (stay)          │
//!                          │   └──────────┘                  │
//!                          └─────── request_reposition ──────┘
//! ```

use tracing::{debug, info, warn};

use super::pose::{PoseError, PoseEstimator};
use crate::adapters::ModelHandle;
use crate::domain::{MarkerRoles, MarkerSample, PlacementSnapshot, PlacementState, Pose};

/// What a marker update did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerOutcome {
    /// Gate closed or no model; the update was not looked at
    Ignored,
    /// At least one role marker is not tracked yet
    Incomplete,
    /// A pose was computed and applied
    Applied(Pose),
    /// The triple was unusable; the model stays hidden
    Rejected(PoseError),
}

/// Owns the placement state and the active model handle
#[derive(Debug)]
pub struct PlacementEngine {
    estimator: PoseEstimator,
    roles: MarkerRoles,
    state: PlacementState,
    awaiting_pose: bool,
    model: Option<Box<dyn ModelHandle>>,
    last_pose: Option<Pose>,
    status: String,
    last_error: Option<String>,
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self::new(PoseEstimator::default(), MarkerRoles::default())
    }
}

impl PlacementEngine {
    pub fn new(estimator: PoseEstimator, roles: MarkerRoles) -> Self {
        Self {
            estimator,
            roles,
            state: PlacementState::Idle,
            awaiting_pose: false,
            model: None,
            last_pose: None,
            status: "Select a model to place".to_string(),
            last_error: None,
        }
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn is_awaiting_pose(&self) -> bool {
        self.awaiting_pose
    }

    pub fn is_visible(&self) -> bool {
        self.model.is_some() && self.state == PlacementState::PoseApplied
    }

    pub fn last_pose(&self) -> Option<Pose> {
        self.last_pose
    }

    pub fn roles(&self) -> &MarkerRoles {
        &self.roles
    }

    pub fn snapshot(&self) -> PlacementSnapshot {
        PlacementSnapshot {
            state: self.state,
            visible: self.is_visible(),
            last_pose: self.last_pose,
            status: self.status.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Swap in a freshly loaded model, hidden until the next valid pose
    pub fn load_model(&mut self, mut model: Box<dyn ModelHandle>) {
        if let Some(mut previous) = self.model.take() {
            previous.set_enabled(false);
        }

        model.set_enabled(false);
        self.model = Some(model);
        self.awaiting_pose = true;
        self.last_pose = None;
        self.last_error = None;
        self.transition(PlacementState::WaitingForAnchors);
        self.status = "Place all three markers to position the model".to_string();
    }

    /// Hide the model and wait for a new pose. No-op without a model.
    pub fn request_reposition(&mut self) -> bool {
        let Some(model) = self.model.as_mut() else {
            return false;
        };

        model.set_enabled(false);
        self.awaiting_pose = true;
        self.transition(PlacementState::WaitingForAnchors);
        self.status = "Align the three markers to reposition the model".to_string();
        true
    }

    /// Feed the current marker sample through the awaiting-pose gate
    pub fn on_markers_updated(&mut self, sample: &MarkerSample) -> MarkerOutcome {
        if !self.awaiting_pose || self.model.is_none() {
            return MarkerOutcome::Ignored;
        }

        let Some((p0, p1, p2)) = self.roles.select(sample) else {
            return MarkerOutcome::Incomplete;
        };

        match self.estimator.compute_pose(p0, p1, p2) {
            Ok(pose) => {
                self.apply_pose(pose);
                MarkerOutcome::Applied(pose)
            }
            Err(e) => {
                warn!("Pose rejected: {}", e);
                if let Some(model) = self.model.as_mut() {
                    model.set_enabled(false);
                }
                self.awaiting_pose = true;
                self.last_error = Some(e.to_string());
                self.status = "Waiting for the markers to settle".to_string();
                MarkerOutcome::Rejected(e)
            }
        }
    }

    /// The loader could not produce a model; whatever was active stays as is
    pub fn report_load_failure(&mut self, error: &anyhow::Error) {
        warn!("Model load failed: {:#}", error);
        self.last_error = Some(format!("{:#}", error));
        self.status = "Failed to load the model".to_string();
    }

    /// The tracker could not start; surfaced verbatim, never retried here
    pub fn report_tracking_failure(&mut self, message: &str) {
        warn!("Tracking failed: {}", message);
        self.last_error = Some(message.to_string());
        self.status = "Marker tracking is unavailable".to_string();
    }

    fn apply_pose(&mut self, pose: Pose) {
        if let Some(model) = self.model.as_mut() {
            model.set_transform(&pose);
            model.set_enabled(true);
        }
        self.awaiting_pose = false;
        self.last_pose = Some(pose);
        self.last_error = None;
        self.transition(PlacementState::PoseApplied);
        self.status = "Model placed".to_string();
    }

    fn transition(&mut self, next: PlacementState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Placement state changed");
        } else {
            debug!(state = %next, "Placement state re-entered");
        }
        self.state = next;
    }
}
