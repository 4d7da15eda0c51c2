//! Deck and tracking configuration.

use crate::coordinate::Coordinate;
use serde::{Deserialize, Serialize};

/// Which trackers start enabled when spots and containers are created or loaded.
///
/// A disabled tracker rejects every transaction; tip spots with a disabled tracker
/// hand out fresh prototype tips instead, which simulates an endless tip source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub tip_tracking: bool,
    pub tube_tracking: bool,
    /// Also governs petri dish media volume.
    pub volume_tracking: bool,
    pub colony_tracking: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tip_tracking: true,
            tube_tracking: true,
            volume_tracking: true,
            colony_tracking: true,
        }
    }
}

impl TrackingConfig {
    /// All trackers disabled.
    pub fn untracked() -> Self {
        Self {
            tip_tracking: false,
            tube_tracking: false,
            volume_tracking: false,
            colony_tracking: false,
        }
    }

    pub fn with_tip_tracking(mut self, enabled: bool) -> Self {
        self.tip_tracking = enabled;
        self
    }

    pub fn with_tube_tracking(mut self, enabled: bool) -> Self {
        self.tube_tracking = enabled;
        self
    }

    pub fn with_volume_tracking(mut self, enabled: bool) -> Self {
        self.volume_tracking = enabled;
        self
    }

    pub fn with_colony_tracking(mut self, enabled: bool) -> Self {
        self.colony_tracking = enabled;
        self
    }
}

/// Configuration for a [`Deck`](crate::deck::Deck).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Name of the root resource.
    pub name: String,
    /// Deck footprint in mm.
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    /// Absolute location of the deck origin in robot coordinates.
    pub origin: Coordinate,
    /// Pretty-print layout and state files.
    pub pretty_json: bool,
    pub tracking: TrackingConfig,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            name: "deck".to_string(),
            size_x: 1360.0,
            size_y: 653.5,
            size_z: 900.0,
            origin: Coordinate::ZERO,
            pretty_json: false,
            tracking: TrackingConfig::default(),
        }
    }
}

impl DeckConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_size(mut self, size_x: f64, size_y: f64, size_z: f64) -> Self {
        self.size_x = size_x;
        self.size_y = size_y;
        self.size_z = size_z;
        self
    }

    pub fn with_origin(mut self, origin: Coordinate) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingConfig) -> Self {
        self.tracking = tracking;
        self
    }
}
