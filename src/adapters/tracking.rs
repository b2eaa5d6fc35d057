//! Tracker feed folding.
//!
//! Image trackers report per-anchor add/update/remove events. The
//! placement engine wants the whole current picture, so [`MarkerBoard`]
//! keeps the latest position of every tracked marker and yields a full
//! [`MarkerSample`] after each event.

use serde::{Deserialize, Serialize};

use crate::domain::{MarkerSample, Vec3};

/// One event from the marker tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnchorUpdate {
    Added { marker: String, position: Vec3 },
    Updated { marker: String, position: Vec3 },
    Removed { marker: String },
}

/// Latest known position of every tracked marker
#[derive(Debug, Clone, Default)]
pub struct MarkerBoard {
    current: MarkerSample,
}

impl MarkerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one tracker event and return the resulting sample
    pub fn apply(&mut self, update: AnchorUpdate) -> &MarkerSample {
        match update {
            AnchorUpdate::Added { marker, position } | AnchorUpdate::Updated { marker, position } => {
                self.current.insert(marker, position);
            }
            AnchorUpdate::Removed { marker } => {
                self.current.remove(&marker);
            }
        }
        &self.current
    }

    pub fn sample(&self) -> &MarkerSample {
        &self.current
    }

    /// Forget every marker, e.g. when tracking stops
    pub fn clear(&mut self) {
        self.current = MarkerSample::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_marker_disappears() {
        let mut board = MarkerBoard::new();
        board.apply(AnchorUpdate::Added {
            marker: "MarkerA".into(),
            position: Vec3::zero(),
        });
        board.apply(AnchorUpdate::Added {
            marker: "MarkerB".into(),
            position: Vec3::new(0.0, 0.1, 0.0),
        });
        assert_eq!(board.sample().len(), 2);

        let sample = board.apply(AnchorUpdate::Removed {
            marker: "MarkerA".into(),
        });
        assert!(sample.get("MarkerA").is_none());
        assert_eq!(sample.len(), 1);
    }

    #[test]
    fn test_update_overwrites_position() {
        let mut board = MarkerBoard::new();
        board.apply(AnchorUpdate::Added {
            marker: "MarkerA".into(),
            position: Vec3::zero(),
        });
        let sample = board.apply(AnchorUpdate::Updated {
            marker: "MarkerA".into(),
            position: Vec3::new(1.0, 1.0, 1.0),
        });
        assert_eq!(sample.get("MarkerA"), Some(Vec3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_update_json_shape() {
        let line = r#"{"event":"added","marker":"MarkerC","position":[0.0,0.0,0.12]}"#;
        let update: AnchorUpdate = serde_json::from_str(line).unwrap();
        assert_eq!(
            update,
            AnchorUpdate::Added {
                marker: "MarkerC".into(),
                position: Vec3::new(0.0, 0.0, 0.12),
            }
        );
    }
}
