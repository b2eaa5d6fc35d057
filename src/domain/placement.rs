//! Placement state observed by the renderer.

use serde::{Deserialize, Serialize};

use super::geometry::Pose;

/// Lifecycle of the active model's placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementState {
    /// No model loaded
    #[default]
    Idle,

    /// Model loaded but hidden until a valid marker triple arrives
    WaitingForAnchors,

    /// Model visible at the last applied pose
    PoseApplied,
}

impl std::fmt::Display for PlacementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementState::Idle => write!(f, "idle"),
            PlacementState::WaitingForAnchors => write!(f, "waiting_for_anchors"),
            PlacementState::PoseApplied => write!(f, "pose_applied"),
        }
    }
}

/// Read-only view of the placement published to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementSnapshot {
    pub state: PlacementState,

    /// Whether the model should currently be drawn
    pub visible: bool,

    /// Pose most recently applied to the model anchor
    pub last_pose: Option<Pose>,

    /// Human-readable status line
    pub status: String,

    /// Most recent error surfaced by pose, loader, or tracker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
