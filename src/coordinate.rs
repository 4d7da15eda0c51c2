//! Coordinates and quarter-turn rotations.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A point or offset in millimetres, usually the location of a resource relative to its parent.
///
/// Components are rounded to 4 decimal places (0.1 µm) on construction so that
/// coordinates produced by arithmetic compare equal after a save/load cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

impl Coordinate {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: round4(x),
            y: round4(y),
            z: round4(z),
        }
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn as_dvec3(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

impl From<DVec3> for Coordinate {
    fn from(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Coordinate> for DVec3 {
    fn from(c: Coordinate) -> Self {
        c.as_dvec3()
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        (self.as_dvec3() + rhs.as_dvec3()).into()
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Coordinate) -> Coordinate {
        (self.as_dvec3() - rhs.as_dvec3()).into()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:07.3}, {:07.3}, {:07.3})", self.x, self.y, self.z)
    }
}

/// A counter-clockwise rotation around the local Z axis, restricted to quarter turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Normalizes `degrees` into `[0, 360)`; `None` unless it is a multiple of 90.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Self::R0),
            90 => Some(Self::R90),
            180 => Some(Self::R180),
            270 => Some(Self::R270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// Whether the x/y footprint is swapped in this orientation.
    pub fn swaps_footprint(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }
}

impl Add for Rotation {
    type Output = Rotation;

    fn add(self, rhs: Rotation) -> Rotation {
        let sum = i32::from(self.degrees()) + i32::from(rhs.degrees());
        Rotation::from_degrees(sum).unwrap_or_default()
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 {
        r.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Rotation::from_degrees(i32::from(degrees))
            .filter(|r| r.degrees() == degrees)
            .ok_or_else(|| format!("invalid rotation: {degrees} (expected 0, 90, 180 or 270)"))
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
