//! Wells: the liquid containers of a plate.

use crate::error::TrackerError;
use crate::volume_tracker::VolumeTracker;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Shape of the bottom of a well.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WellBottomType {
    #[serde(rename = "flat")]
    Flat,
    U,
    V,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Shape of a horizontal cut through a well.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossSectionType {
    #[default]
    Circle,
    Rectangle,
}

/// Capacity in uL of a well with the given outer size in mm.
///
/// A circular well is a cylinder whose diameter is the smaller footprint side.
pub fn compute_max_volume(
    size_x: f64,
    size_y: f64,
    size_z: f64,
    cross_section_type: CrossSectionType,
) -> f64 {
    let size = DVec3::new(size_x, size_y, size_z);
    match cross_section_type {
        CrossSectionType::Circle => {
            let radius = size.x.min(size.y) / 2.0;
            PI * radius * radius * size.z
        }
        CrossSectionType::Rectangle => size.element_product(),
    }
}

/// A well in a plate, tracking the liquids it holds.
#[derive(Debug)]
pub struct Well {
    pub bottom_type: WellBottomType,
    pub cross_section_type: CrossSectionType,
    pub tracker: VolumeTracker,
}

impl Well {
    pub fn new(
        thing: impl Into<String>,
        max_volume: f64,
        bottom_type: WellBottomType,
        cross_section_type: CrossSectionType,
    ) -> Self {
        Self {
            bottom_type,
            cross_section_type,
            tracker: VolumeTracker::new(thing, max_volume),
        }
    }

    pub fn max_volume(&self) -> f64 {
        self.tracker.max_volume()
    }

    /// Replaces the contents with `volume` uL of an unknown liquid.
    pub fn set_liquid_volume(&mut self, volume: f64) -> Result<(), TrackerError> {
        self.tracker.set_used_volume(volume)
    }
}
