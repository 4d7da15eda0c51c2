//! Tips and tip spots.

use crate::error::TrackerError;
use crate::tracker::ItemTracker;
use serde::{Deserialize, Serialize};

/// A single pipette tip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    /// Whether the tip type has a filter.
    pub has_filter: bool,
    /// Total length of the tip, in mm.
    pub total_tip_length: f64,
    /// Maximal volume of the tip, in uL.
    pub maximal_volume: f64,
    /// Overlap between the tip and the pipette, in mm.
    pub fitting_depth: f64,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "default".to_string()
}

impl Tip {
    pub fn new(
        has_filter: bool,
        total_tip_length: f64,
        maximal_volume: f64,
        fitting_depth: f64,
    ) -> Self {
        Self {
            has_filter,
            total_tip_length,
            maximal_volume,
            fitting_depth,
            model: default_model(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub type TipTracker = ItemTracker<Tip>;

/// A location in a tip rack where there may or may not be a tip.
#[derive(Debug)]
pub struct TipSpot {
    prototype: Tip,
    pub tracker: TipTracker,
}

impl TipSpot {
    /// Creates a spot whose tips look like `prototype`. `thing` names the spot in errors.
    pub fn new(thing: impl Into<String>, prototype: Tip, start_with_tip: bool) -> Self {
        let mut tracker = TipTracker::new(thing);
        if start_with_tip {
            tracker.set_item(Some(prototype.clone()));
        }
        Self { prototype, tracker }
    }

    pub fn prototype_tip(&self) -> &Tip {
        &self.prototype
    }

    /// A new tip of this spot's type.
    pub fn make_tip(&self) -> Tip {
        self.prototype.clone()
    }

    /// The tip in this spot.
    ///
    /// With a disabled tracker an empty spot still yields a fresh tip.
    pub fn get_tip(&self) -> Result<Tip, TrackerError> {
        if self.tracker.is_disabled() && !self.tracker.has_item() {
            return Ok(self.make_tip());
        }
        self.tracker.get_item().cloned()
    }

    pub fn has_tip(&self) -> bool {
        self.tracker.has_item()
    }

    /// Puts a fresh tip in the spot, bypassing the transaction.
    pub fn fill(&mut self) {
        let tip = self.make_tip();
        self.tracker.set_item(Some(tip));
    }

    /// Empties the spot, bypassing the transaction.
    pub fn empty(&mut self) {
        self.tracker.set_item(None);
    }
}
