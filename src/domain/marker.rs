//! Marker samples and marker role assignment.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::geometry::Vec3;

/// Momentary set of tracked marker positions keyed by marker name.
///
/// Produced whole on every tracker update; a marker that is no longer
/// tracked is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerSample(HashMap<String, Vec3>);

impl MarkerSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and replay files.
    pub fn with(mut self, marker: impl Into<String>, position: Vec3) -> Self {
        self.0.insert(marker.into(), position);
        self
    }

    pub fn insert(&mut self, marker: impl Into<String>, position: Vec3) {
        self.0.insert(marker.into(), position);
    }

    pub fn remove(&mut self, marker: &str) -> Option<Vec3> {
        self.0.remove(marker)
    }

    pub fn get(&self, marker: &str) -> Option<Vec3> {
        self.0.get(marker).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which physical marker plays which role in the triangulation.
///
/// `reference` is p0 (the corner), `up` is p1 (the +Y neighbour) and
/// `plane` is p2. Swapping roles changes the physical alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRoles {
    pub reference: String,
    pub up: String,
    pub plane: String,
}

impl Default for MarkerRoles {
    fn default() -> Self {
        Self {
            reference: "MarkerA".to_string(),
            up: "MarkerB".to_string(),
            plane: "MarkerC".to_string(),
        }
    }
}

impl MarkerRoles {
    /// Pick the three role positions out of a sample, if all are tracked.
    pub fn select(&self, sample: &MarkerSample) -> Option<(Vec3, Vec3, Vec3)> {
        Some((
            sample.get(&self.reference)?,
            sample.get(&self.up)?,
            sample.get(&self.plane)?,
        ))
    }
}
