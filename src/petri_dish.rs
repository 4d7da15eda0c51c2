//! Petri dishes and the colonies growing on them.

use crate::coordinate::Coordinate;
use crate::error::Result;
use crate::resource::{Resource, ResourceId, ResourceKind, ResourceTree};
use crate::tracker::ItemTracker;
use crate::volume_tracker::VolumeTracker;
use crate::well::{CrossSectionType, compute_max_volume};
use serde::{Deserialize, Serialize};

/// What a colony spot holds: a culture that can be picked and placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Culture {
    pub label: String,
}

impl Culture {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

pub type ColonyTracker = ItemTracker<Culture>;

/// A round dish whose tracker holds the volume of growth media.
#[derive(Debug)]
pub struct PetriDish {
    pub tracker: VolumeTracker,
}

impl PetriDish {
    pub fn new(thing: impl Into<String>, max_volume: f64) -> Self {
        Self {
            tracker: VolumeTracker::new(thing, max_volume),
        }
    }
}

/// A spot on a petri dish where a culture grows.
#[derive(Debug)]
pub struct Colony {
    pub tracker: ColonyTracker,
}

impl Colony {
    pub fn new(thing: impl Into<String>, culture: Option<Culture>) -> Self {
        let mut tracker = ColonyTracker::new(thing);
        tracker.set_item(culture);
        Self { tracker }
    }

    pub fn has_culture(&self) -> bool {
        self.tracker.has_item()
    }
}

impl ResourceTree {
    /// Creates a standalone petri dish of the given diameter and height, in mm.
    ///
    /// Its media capacity is that of a cylinder filling the dish.
    pub fn create_petri_dish(
        &mut self,
        name: impl Into<String>,
        diameter: f64,
        height: f64,
    ) -> ResourceId {
        let name = name.into();
        let max_volume = compute_max_volume(diameter, diameter, height, CrossSectionType::Circle);
        let dish = Resource::new(name.clone(), diameter, diameter, height)
            .with_category("petri_dish")
            .with_kind(ResourceKind::PetriDish(PetriDish::new(name, max_volume)));
        self.insert(dish)
    }

    /// Places a colony of footprint `size` (mm) on `dish` at `location`.
    pub fn add_colony(
        &mut self,
        dish: ResourceId,
        name: impl Into<String>,
        location: Coordinate,
        size: f64,
        culture: Option<Culture>,
    ) -> Result<ResourceId> {
        self.petri_dish(dish)?;
        let name = name.into();
        let colony = Resource::new(name.clone(), size, size, 0.0)
            .with_category("colony")
            .with_kind(ResourceKind::Colony(Colony::new(name, culture)));
        let id = self.insert(colony);
        if let Err(err) = self.assign_child_resource(dish, id, location) {
            self.remove(id)?;
            return Err(err);
        }
        Ok(id)
    }

    /// Colonies on `dish`, in placement order.
    pub fn get_colonies(&self, dish: ResourceId) -> Result<Vec<ResourceId>> {
        self.petri_dish(dish)?;
        Ok(self
            .resource(dish)?
            .children()
            .iter()
            .copied()
            .filter(|&child| matches!(self.kind(child), Ok(ResourceKind::Colony(_))))
            .collect())
    }
}
