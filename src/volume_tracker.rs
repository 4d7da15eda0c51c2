//! Liquid volume tracking for wells, petri dishes and other containers.

use crate::error::TrackerError;
use crate::tracker::{StateTracker, TrackerCallback};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Volumes closer than this (in uL) are considered equal.
const VOLUME_EPSILON: f64 = 1e-9;

/// Kinds of liquid that can be tracked in a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Liquid {
    Water,
    Ethanol,
    Methanol,
    Glycerin,
    Dmso,
    Acetonitrile,
    Chloroform,
    Serum,
    Plasma,
    Blood,
    Media,
}

/// A volume (uL) of a liquid; `None` for an unknown liquid.
pub type LiquidEntry = (Option<Liquid>, f64);

fn total(liquids: &[LiquidEntry]) -> f64 {
    liquids.iter().map(|(_, volume)| volume).sum()
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    liquids: Vec<LiquidEntry>,
    pending_liquids: Vec<LiquidEntry>,
}

/// Tracks the liquids in a container with a fixed maximum volume.
///
/// Liquids are kept as a stack: added liquid goes on top, and removal takes from
/// the top first. Like [`ItemTracker`](crate::tracker::ItemTracker), changes are
/// staged until [`commit`](Self::commit).
pub struct VolumeTracker {
    thing: String,
    max_volume: f64,
    liquids: Vec<LiquidEntry>,
    pending_liquids: Vec<LiquidEntry>,
    is_disabled: bool,
    callback: Option<TrackerCallback>,
}

impl VolumeTracker {
    pub fn new(thing: impl Into<String>, max_volume: f64) -> Self {
        Self {
            thing: thing.into(),
            max_volume,
            liquids: Vec::new(),
            pending_liquids: Vec::new(),
            is_disabled: false,
            callback: None,
        }
    }

    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    pub fn is_disabled(&self) -> bool {
        self.is_disabled
    }

    pub fn disable(&mut self) {
        self.is_disabled = true;
    }

    pub fn enable(&mut self) {
        self.is_disabled = false;
    }

    pub fn register_callback(&mut self, callback: TrackerCallback) {
        self.callback = Some(callback);
    }

    /// Used volume, including staged changes.
    pub fn get_used_volume(&self) -> f64 {
        total(&self.pending_liquids)
    }

    /// Free volume, including staged changes.
    pub fn get_free_volume(&self) -> f64 {
        self.max_volume - self.get_used_volume()
    }

    /// Liquids, including staged changes, bottom first.
    pub fn get_liquids(&self) -> &[LiquidEntry] {
        &self.pending_liquids
    }

    pub fn committed_liquids(&self) -> &[LiquidEntry] {
        &self.liquids
    }

    /// Replaces the contents (committed and pending), bypassing the transaction.
    pub fn set_liquids(&mut self, liquids: Vec<LiquidEntry>) -> Result<(), TrackerError> {
        self.check_liquids(&liquids)?;
        self.liquids = liquids.clone();
        self.pending_liquids = liquids;
        Ok(())
    }

    /// Sets the contents to `volume` uL of an unknown liquid.
    pub fn set_used_volume(&mut self, volume: f64) -> Result<(), TrackerError> {
        self.check_volume(volume)?;
        if volume == 0.0 {
            return self.set_liquids(Vec::new());
        }
        self.set_liquids(vec![(None, volume)])
    }

    /// Stages adding `volume` uL of `liquid` on top of the current contents.
    pub fn queue_add_liquid(
        &mut self,
        liquid: Option<Liquid>,
        volume: f64,
    ) -> Result<(), TrackerError> {
        self.check_enabled()?;
        self.check_volume(volume)?;
        let free = self.get_free_volume();
        if volume > free + VOLUME_EPSILON {
            return Err(TrackerError::CapacityExceeded {
                thing: self.thing.clone(),
                requested: volume,
                free,
            });
        }
        let same_as_top = matches!(self.pending_liquids.last(), Some((top, _)) if *top == liquid);
        match self.pending_liquids.last_mut() {
            Some(top) if same_as_top => top.1 += volume,
            _ => self.pending_liquids.push((liquid, volume)),
        }
        Ok(())
    }

    /// Stages removing `volume` uL from the top and returns what would be removed.
    pub fn queue_remove_liquid(&mut self, volume: f64) -> Result<Vec<LiquidEntry>, TrackerError> {
        self.check_enabled()?;
        self.check_volume(volume)?;
        let available = self.get_used_volume();
        if volume > available + VOLUME_EPSILON {
            return Err(TrackerError::TooLittleLiquid {
                thing: self.thing.clone(),
                requested: volume,
                available,
            });
        }

        let mut removed = Vec::new();
        let mut remaining = volume;
        while remaining > VOLUME_EPSILON {
            let Some((liquid, top_volume)) = self.pending_liquids.pop() else {
                break;
            };
            if top_volume > remaining + VOLUME_EPSILON {
                self.pending_liquids.push((liquid, top_volume - remaining));
                removed.push((liquid, remaining));
                remaining = 0.0;
            } else {
                removed.push((liquid, top_volume));
                remaining -= top_volume;
            }
        }
        Ok(removed)
    }

    /// Stages and commits adding liquid.
    pub fn add_liquid(&mut self, liquid: Option<Liquid>, volume: f64) -> Result<(), TrackerError> {
        self.queue_add_liquid(liquid, volume)?;
        self.commit()
    }

    /// Stages and commits removing liquid.
    pub fn remove_liquid(&mut self, volume: f64) -> Result<Vec<LiquidEntry>, TrackerError> {
        let removed = self.queue_remove_liquid(volume)?;
        self.commit()?;
        Ok(removed)
    }

    pub fn commit(&mut self) -> Result<(), TrackerError> {
        self.check_enabled()?;
        self.liquids = self.pending_liquids.clone();
        debug!(thing = %self.thing, used = self.get_used_volume(), "volume tracker commit");
        if let Some(callback) = &self.callback {
            callback(&self.serialize_state());
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), TrackerError> {
        self.check_enabled()?;
        self.pending_liquids = self.liquids.clone();
        debug!(thing = %self.thing, used = self.get_used_volume(), "volume tracker rollback");
        Ok(())
    }

    /// Empties the container.
    pub fn clear(&mut self) {
        self.liquids.clear();
        self.pending_liquids.clear();
    }

    pub fn serialize_state(&self) -> Value {
        serde_json::json!({
            "liquids": self.liquids,
            "pending_liquids": self.pending_liquids,
        })
    }

    /// Loads a snapshot. Both stacks must fit the container.
    pub fn load_state(&mut self, state: &Value) -> Result<(), TrackerError> {
        let snapshot = self.parse_state(state)?;
        self.liquids = snapshot.liquids;
        self.pending_liquids = snapshot.pending_liquids;
        Ok(())
    }

    fn parse_state(&self, state: &Value) -> Result<Snapshot, TrackerError> {
        let snapshot: Snapshot =
            serde_json::from_value(state.clone()).map_err(|e| TrackerError::InvalidState {
                thing: self.thing.clone(),
                reason: e.to_string(),
            })?;
        self.check_liquids(&snapshot.liquids)?;
        self.check_liquids(&snapshot.pending_liquids)?;
        Ok(snapshot)
    }

    fn check_volume(&self, volume: f64) -> Result<(), TrackerError> {
        if !(volume.is_finite() && volume >= 0.0) {
            return Err(TrackerError::InvalidVolume {
                thing: self.thing.clone(),
                volume,
            });
        }
        Ok(())
    }

    fn check_liquids(&self, liquids: &[LiquidEntry]) -> Result<(), TrackerError> {
        for (_, volume) in liquids {
            self.check_volume(*volume)?;
        }
        let volume = total(liquids);
        if volume > self.max_volume + VOLUME_EPSILON {
            return Err(TrackerError::CapacityExceeded {
                thing: self.thing.clone(),
                requested: volume,
                free: self.max_volume,
            });
        }
        Ok(())
    }

    fn check_enabled(&self) -> Result<(), TrackerError> {
        if self.is_disabled {
            return Err(TrackerError::Disabled {
                thing: self.thing.clone(),
            });
        }
        Ok(())
    }
}

impl StateTracker for VolumeTracker {
    fn thing(&self) -> &str {
        &self.thing
    }

    fn set_thing(&mut self, thing: &str) {
        self.thing = thing.to_string();
    }

    fn is_disabled(&self) -> bool {
        VolumeTracker::is_disabled(self)
    }

    fn disable(&mut self) {
        VolumeTracker::disable(self);
    }

    fn enable(&mut self) {
        VolumeTracker::enable(self);
    }

    fn is_occupied(&self) -> bool {
        self.get_used_volume() > VOLUME_EPSILON
    }

    fn commit(&mut self) -> Result<(), TrackerError> {
        VolumeTracker::commit(self)
    }

    fn rollback(&mut self) -> Result<(), TrackerError> {
        VolumeTracker::rollback(self)
    }

    fn serialize_state(&self) -> Value {
        VolumeTracker::serialize_state(self)
    }

    fn check_state(&self, state: &Value) -> Result<(), TrackerError> {
        self.parse_state(state).map(|_| ())
    }

    fn load_state(&mut self, state: &Value) -> Result<(), TrackerError> {
        VolumeTracker::load_state(self, state)
    }

    fn register_callback(&mut self, callback: TrackerCallback) {
        VolumeTracker::register_callback(self, callback);
    }
}

impl fmt::Debug for VolumeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeTracker")
            .field("thing", &self.thing)
            .field("max_volume", &self.max_volume)
            .field("liquids", &self.liquids)
            .field("pending_liquids", &self.pending_liquids)
            .field("is_disabled", &self.is_disabled)
            .finish()
    }
}
