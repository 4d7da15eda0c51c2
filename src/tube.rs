//! Tubes and tube spots.

use crate::error::TrackerError;
use crate::tracker::ItemTracker;
use serde::{Deserialize, Serialize};

/// A tube that can be placed in a tube rack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tube {
    #[serde(default)]
    pub model: Option<String>,
    /// Outer footprint and height, in mm.
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    /// Capacity in uL.
    pub max_volume: f64,
}

impl Tube {
    pub fn new(size_x: f64, size_y: f64, size_z: f64, max_volume: f64) -> Self {
        Self {
            model: None,
            size_x,
            size_y,
            size_z,
            max_volume,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

pub type TubeTracker = ItemTracker<Tube>;

/// A location in a tube rack where there may or may not be a tube.
#[derive(Debug)]
pub struct TubeSpot {
    prototype: Tube,
    pub tracker: TubeTracker,
}

impl TubeSpot {
    /// Creates an empty spot for tubes like `prototype`.
    pub fn new(thing: impl Into<String>, prototype: Tube) -> Self {
        Self {
            prototype,
            tracker: TubeTracker::new(thing),
        }
    }

    pub fn prototype_tube(&self) -> &Tube {
        &self.prototype
    }

    pub fn make_tube(&self) -> Tube {
        self.prototype.clone()
    }

    pub fn get_tube(&self) -> Result<&Tube, TrackerError> {
        self.tracker.get_item()
    }

    pub fn has_tube(&self) -> bool {
        self.tracker.has_item()
    }

    /// Puts a fresh tube in the spot, bypassing the transaction.
    pub fn fill(&mut self) {
        let tube = self.make_tube();
        self.tracker.set_item(Some(tube));
    }

    /// Empties the spot, bypassing the transaction.
    pub fn empty(&mut self) {
        self.tracker.set_item(None);
    }
}
