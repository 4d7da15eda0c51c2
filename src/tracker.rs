//! Transactional occupancy tracking for a single spot.
//!
//! A tracker holds at most one item (a tip, a tube, a colony culture). Changes are
//! staged with [`ItemTracker::queue_add`] / [`ItemTracker::queue_remove`] and become
//! durable on [`ItemTracker::commit`], or are discarded with [`ItemTracker::rollback`].
//! [`ItemTracker::add`] and [`ItemTracker::remove`] stage and commit in one step.
//!
//! Planning code sees staged changes: [`ItemTracker::has_item`] answers for the
//! pending state, while [`ItemTracker::get_item`] returns the committed item.

use crate::error::TrackerError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Invoked after every successful commit with the tracker's serialized state.
pub type TrackerCallback = Box<dyn Fn(&Value)>;

/// The committed/pending state of an [`ItemTracker`].
///
/// | state            | add(x)               | remove()         | commit      | rollback    |
/// |------------------|----------------------|------------------|-------------|-------------|
/// | `Empty`          | `PendingAdd(x)`      | error            | `Empty`     | `Empty`     |
/// | `PendingAdd(a)`  | error                | `Empty`          | `Occupied`  | `Empty`     |
/// | `Occupied(a)`    | error                | `PendingRemove`  | `Occupied`  | `Occupied`  |
/// | `PendingRemove`  | `PendingReplace`     | error            | `Empty`     | `Occupied`  |
/// | `PendingReplace` | error                | `PendingRemove`  | `Occupied`  | `Occupied`  |
#[derive(Clone, Debug, PartialEq)]
pub enum TrackerState<T> {
    Empty,
    /// Nothing committed, `T` staged.
    PendingAdd(T),
    Occupied(T),
    /// `T` committed, removal staged.
    PendingRemove(T),
    /// A committed item was removed and a different one staged in its place.
    PendingReplace { committed: T, pending: T },
}

impl<T> Default for TrackerState<T> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<T> TrackerState<T> {
    pub fn committed(&self) -> Option<&T> {
        match self {
            Self::Occupied(item) | Self::PendingRemove(item) => Some(item),
            Self::PendingReplace { committed, .. } => Some(committed),
            Self::Empty | Self::PendingAdd(_) => None,
        }
    }

    pub fn pending(&self) -> Option<&T> {
        match self {
            Self::PendingAdd(item) | Self::Occupied(item) => Some(item),
            Self::PendingReplace { pending, .. } => Some(pending),
            Self::Empty | Self::PendingRemove(_) => None,
        }
    }

    /// Whether a change is staged but not yet committed.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingAdd(_) | Self::PendingRemove(_) | Self::PendingReplace { .. }
        )
    }
}

impl<T: PartialEq> TrackerState<T> {
    /// Rebuilds a state from its committed and pending items.
    pub fn from_parts(committed: Option<T>, pending: Option<T>) -> Self {
        match (committed, pending) {
            (None, None) => Self::Empty,
            (None, Some(pending)) => Self::PendingAdd(pending),
            (Some(committed), None) => Self::PendingRemove(committed),
            (Some(committed), Some(pending)) if committed == pending => Self::Occupied(committed),
            (Some(committed), Some(pending)) => Self::PendingReplace { committed, pending },
        }
    }
}

/// Serialized form of a tracker's state.
#[derive(Serialize, Deserialize)]
struct Snapshot<T> {
    item: Option<T>,
    pending_item: Option<T>,
}

/// Operations shared by every tracker kind, used by bulk and state operations on the tree.
pub trait StateTracker {
    /// Name of the tracked thing, used in error messages.
    fn thing(&self) -> &str;
    fn set_thing(&mut self, thing: &str);
    fn is_disabled(&self) -> bool;
    fn disable(&mut self);
    fn enable(&mut self);
    /// Whether the pending state holds anything (an item, or some liquid).
    fn is_occupied(&self) -> bool;
    fn commit(&mut self) -> Result<(), TrackerError>;
    fn rollback(&mut self) -> Result<(), TrackerError>;
    fn serialize_state(&self) -> Value;
    /// Checks that `state` would load, without changing the tracker.
    fn check_state(&self, state: &Value) -> Result<(), TrackerError>;
    fn load_state(&mut self, state: &Value) -> Result<(), TrackerError>;
    fn register_callback(&mut self, callback: TrackerCallback);
}

/// Tracks whether a spot holds an item of type `T`.
pub struct ItemTracker<T> {
    thing: String,
    state: TrackerState<T>,
    is_disabled: bool,
    callback: Option<TrackerCallback>,
}

impl<T> ItemTracker<T> {
    /// Creates an empty, enabled tracker. `thing` names the spot in error messages.
    pub fn new(thing: impl Into<String>) -> Self {
        Self {
            thing: thing.into(),
            state: TrackerState::Empty,
            is_disabled: false,
            callback: None,
        }
    }

    pub fn state(&self) -> &TrackerState<T> {
        &self.state
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

    /// Whether the spot holds an item, including staged changes.
    pub fn has_item(&self) -> bool {
        self.state.pending().is_some()
    }

    /// The committed item.
    pub fn get_item(&self) -> Result<&T, TrackerError> {
        self.state.committed().ok_or_else(|| TrackerError::NoItem {
            thing: self.thing.clone(),
        })
    }

    /// The item as it will be after the staged changes are committed.
    pub fn pending_item(&self) -> Option<&T> {
        self.state.pending()
    }

    /// Replaces both committed and pending state, bypassing the transaction.
    pub fn set_item(&mut self, item: Option<T>) {
        self.state = match item {
            Some(item) => TrackerState::Occupied(item),
            None => TrackerState::Empty,
        };
    }

    /// Stages `item` as the new occupant.
    pub fn queue_add(&mut self, item: T) -> Result<(), TrackerError> {
        self.check_enabled()?;
        self.state = match std::mem::take(&mut self.state) {
            TrackerState::Empty => TrackerState::PendingAdd(item),
            TrackerState::PendingRemove(committed) => TrackerState::PendingReplace {
                committed,
                pending: item,
            },
            occupied => {
                self.state = occupied;
                return Err(TrackerError::HasItem {
                    thing: self.thing.clone(),
                });
            }
        };
        Ok(())
    }

    /// Stages the removal of the pending item.
    pub fn queue_remove(&mut self) -> Result<(), TrackerError> {
        self.check_enabled()?;
        self.state = match std::mem::take(&mut self.state) {
            TrackerState::PendingAdd(_) => TrackerState::Empty,
            TrackerState::Occupied(committed)
            | TrackerState::PendingReplace { committed, .. } => {
                TrackerState::PendingRemove(committed)
            }
            empty => {
                self.state = empty;
                return Err(TrackerError::NoItem {
                    thing: self.thing.clone(),
                });
            }
        };
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

    fn promote(&mut self) {
        self.state = match std::mem::take(&mut self.state) {
            TrackerState::PendingAdd(item)
            | TrackerState::Occupied(item)
            | TrackerState::PendingReplace { pending: item, .. } => TrackerState::Occupied(item),
            TrackerState::Empty | TrackerState::PendingRemove(_) => TrackerState::Empty,
        };
    }

    fn revert(&mut self) {
        self.state = match std::mem::take(&mut self.state) {
            TrackerState::Occupied(item)
            | TrackerState::PendingRemove(item)
            | TrackerState::PendingReplace {
                committed: item, ..
            } => TrackerState::Occupied(item),
            TrackerState::Empty | TrackerState::PendingAdd(_) => TrackerState::Empty,
        };
    }
}

impl<T> ItemTracker<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq,
{
    /// Stages and commits `item`.
    pub fn add(&mut self, item: T) -> Result<(), TrackerError> {
        self.queue_add(item)?;
        self.commit()
    }

    /// Stages and commits the removal of the current item.
    pub fn remove(&mut self) -> Result<(), TrackerError> {
        self.queue_remove()?;
        self.commit()
    }

    /// Promotes the pending state to the committed state and notifies the callback.
    pub fn commit(&mut self) -> Result<(), TrackerError> {
        self.check_enabled()?;
        self.promote();
        debug!(thing = %self.thing, has_item = self.has_item(), "tracker commit");
        if let Some(callback) = &self.callback {
            callback(&self.serialize_state());
        }
        Ok(())
    }

    /// Discards staged changes.
    pub fn rollback(&mut self) -> Result<(), TrackerError> {
        self.check_enabled()?;
        self.revert();
        debug!(thing = %self.thing, has_item = self.has_item(), "tracker rollback");
        Ok(())
    }

    pub fn serialize_state(&self) -> Value {
        serde_json::json!({
            "item": self.state.committed(),
            "pending_item": self.state.pending(),
        })
    }

    pub fn load_state(&mut self, state: &Value) -> Result<(), TrackerError> {
        let snapshot = self.parse_state(state)?;
        self.state = TrackerState::from_parts(snapshot.item, snapshot.pending_item);
        Ok(())
    }

    fn parse_state(&self, state: &Value) -> Result<Snapshot<T>, TrackerError> {
        serde_json::from_value(state.clone()).map_err(|e| TrackerError::InvalidState {
            thing: self.thing.clone(),
            reason: e.to_string(),
        })
    }
}

impl<T> StateTracker for ItemTracker<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq,
{
    fn thing(&self) -> &str {
        &self.thing
    }

    fn set_thing(&mut self, thing: &str) {
        self.thing = thing.to_string();
    }

    fn is_disabled(&self) -> bool {
        ItemTracker::is_disabled(self)
    }

    fn disable(&mut self) {
        ItemTracker::disable(self);
    }

    fn enable(&mut self) {
        ItemTracker::enable(self);
    }

    fn is_occupied(&self) -> bool {
        self.has_item()
    }

    fn commit(&mut self) -> Result<(), TrackerError> {
        ItemTracker::commit(self)
    }

    fn rollback(&mut self) -> Result<(), TrackerError> {
        ItemTracker::rollback(self)
    }

    fn serialize_state(&self) -> Value {
        ItemTracker::serialize_state(self)
    }

    fn check_state(&self, state: &Value) -> Result<(), TrackerError> {
        self.parse_state(state).map(|_| ())
    }

    fn load_state(&mut self, state: &Value) -> Result<(), TrackerError> {
        ItemTracker::load_state(self, state)
    }

    fn register_callback(&mut self, callback: TrackerCallback) {
        ItemTracker::register_callback(self, callback);
    }
}

impl<T: fmt::Debug> fmt::Debug for ItemTracker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemTracker")
            .field("thing", &self.thing)
            .field("state", &self.state)
            .field("is_disabled", &self.is_disabled)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
