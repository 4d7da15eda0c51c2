//! Layout documents and state snapshots.
//!
//! A layout ([`ResourceData`]) records structure: every resource's type, geometry
//! and location, with children nested in order. A [`StateSnapshot`] records only
//! what changes while a protocol runs (tracker contents), keyed by resource name,
//! so it can be replayed onto a freshly loaded copy of the same layout.

use crate::coordinate::{Coordinate, Rotation};
use crate::error::{ResourceError, Result};
use crate::itemized::{Grid, GridKind};
use crate::petri_dish::{Colony, PetriDish};
use crate::resource::{Resource, ResourceId, ResourceKind, ResourceTree, ResourceType};
use crate::tip::{Tip, TipSpot};
use crate::tube::{Tube, TubeSpot};
use crate::well::{CrossSectionType, Well, WellBottomType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Serialized form of a resource and its subtree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    pub name: String,
    /// Tag naming the concrete kind, see [`ResourceType`].
    #[serde(rename = "type")]
    pub resource_type: String,
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    /// Relative to the parent; `None` only for a standalone root.
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub children: Vec<ResourceData>,
    /// Informational only; structure comes from nesting.
    #[serde(default)]
    pub parent_name: Option<String>,
    /// Kind-specific fields such as `num_items_x` or `max_volume`.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Runtime state of a subtree: resource name to that resource's tracker state.
///
/// Resources without a tracker map to an empty object. When several resources
/// share a name, the one visited last in depth-first order wins.
pub type StateSnapshot = BTreeMap<String, Value>;

#[derive(Serialize, Deserialize)]
struct GridDetails {
    num_items_x: usize,
    num_items_y: usize,
}

#[derive(Serialize, Deserialize)]
struct TipSpotDetails {
    prototype_tip: Tip,
    has_tip: bool,
}

#[derive(Serialize, Deserialize)]
struct TubeSpotDetails {
    prototype_tube: Tube,
}

#[derive(Serialize, Deserialize)]
struct WellDetails {
    max_volume: f64,
    #[serde(default)]
    bottom_type: WellBottomType,
    #[serde(default)]
    cross_section_type: CrossSectionType,
}

#[derive(Serialize, Deserialize)]
struct ContainerDetails {
    max_volume: f64,
}

fn to_details<T: Serialize>(details: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(details)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn from_details<T: DeserializeOwned>(data: &ResourceData) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(data.details.clone()))?)
}

/// An empty kind for `data`, with grids left unfilled.
fn kind_from_data(resource_type: ResourceType, data: &ResourceData) -> Result<ResourceKind> {
    let grid = |data: &ResourceData| -> Result<Grid> {
        let details: GridDetails = from_details(data)?;
        Ok(Grid::new(details.num_items_x, details.num_items_y))
    };
    Ok(match resource_type {
        ResourceType::Resource => ResourceKind::Resource,
        ResourceType::Deck => ResourceKind::Deck,
        ResourceType::Trash => ResourceKind::Trash,
        ResourceType::Lid => ResourceKind::Lid,
        ResourceType::TipRack => ResourceKind::TipRack(grid(data)?),
        ResourceType::TubeRack => ResourceKind::TubeRack(grid(data)?),
        ResourceType::Plate => ResourceKind::Plate(grid(data)?),
        ResourceType::TipSpot => {
            let details: TipSpotDetails = from_details(data)?;
            ResourceKind::TipSpot(TipSpot::new(
                data.name.as_str(),
                details.prototype_tip,
                details.has_tip,
            ))
        }
        ResourceType::TubeSpot => {
            let details: TubeSpotDetails = from_details(data)?;
            ResourceKind::TubeSpot(TubeSpot::new(data.name.as_str(), details.prototype_tube))
        }
        ResourceType::Well => {
            let details: WellDetails = from_details(data)?;
            ResourceKind::Well(Well::new(
                data.name.as_str(),
                details.max_volume,
                details.bottom_type,
                details.cross_section_type,
            ))
        }
        ResourceType::PetriDish => {
            let details: ContainerDetails = from_details(data)?;
            ResourceKind::PetriDish(PetriDish::new(data.name.as_str(), details.max_volume))
        }
        ResourceType::Colony => ResourceKind::Colony(Colony::new(data.name.as_str(), None)),
    })
}

impl ResourceTree {
    // --- STRUCTURE ---

    /// Serializes `id` and its subtree.
    pub fn serialize(&self, id: ResourceId) -> Result<ResourceData> {
        let node = self.resource(id)?;
        let details = match node.kind() {
            ResourceKind::TipRack(grid) | ResourceKind::TubeRack(grid) | ResourceKind::Plate(grid) => {
                to_details(&GridDetails {
                    num_items_x: grid.num_items_x(),
                    num_items_y: grid.num_items_y(),
                })?
            }
            ResourceKind::TipSpot(spot) => to_details(&TipSpotDetails {
                prototype_tip: spot.make_tip(),
                has_tip: spot.has_tip(),
            })?,
            ResourceKind::TubeSpot(spot) => to_details(&TubeSpotDetails {
                prototype_tube: spot.make_tube(),
            })?,
            ResourceKind::Well(well) => to_details(&WellDetails {
                max_volume: well.max_volume(),
                bottom_type: well.bottom_type,
                cross_section_type: well.cross_section_type,
            })?,
            ResourceKind::PetriDish(dish) => to_details(&ContainerDetails {
                max_volume: dish.tracker.max_volume(),
            })?,
            ResourceKind::Resource
            | ResourceKind::Deck
            | ResourceKind::Trash
            | ResourceKind::Lid
            | ResourceKind::Colony(_) => Map::new(),
        };
        let parent_name = match node.parent() {
            Some(parent) => Some(self.name(parent)?.to_string()),
            None => None,
        };
        let children = node
            .children()
            .iter()
            .map(|&child| self.serialize(child))
            .collect::<Result<Vec<_>>>()?;

        Ok(ResourceData {
            name: node.name().to_string(),
            resource_type: node.resource_type().tag().to_string(),
            size_x: node.size_x(),
            size_y: node.size_y(),
            size_z: node.size_z(),
            location: node.location(),
            rotation: node.rotation(),
            category: node.category().map(str::to_string),
            model: node.model().map(str::to_string),
            children,
            parent_name,
            details,
        })
    }

    /// Rebuilds a standalone subtree from `data` and returns its root.
    ///
    /// The root comes back unassigned, without a location. On failure nothing
    /// is left behind in the tree.
    pub fn deserialize(&mut self, data: &ResourceData) -> Result<ResourceId> {
        let mut created = Vec::new();
        match self.build(data, &mut created) {
            Ok(root) => Ok(root),
            Err(err) => {
                self.discard(&created);
                Err(err)
            }
        }
    }

    fn build(&mut self, data: &ResourceData, created: &mut Vec<ResourceId>) -> Result<ResourceId> {
        let resource_type = ResourceType::from_tag(&data.resource_type)
            .ok_or_else(|| ResourceError::UnknownResourceType(data.resource_type.clone()))?;
        let mut resource = Resource::new(data.name.as_str(), data.size_x, data.size_y, data.size_z)
            .with_kind(kind_from_data(resource_type, data)?);
        resource.rotation = data.rotation;
        resource.category = data.category.clone();
        resource.model = data.model.clone();
        let id = self.insert(resource);
        created.push(id);

        for child_data in &data.children {
            let location = child_data
                .location
                .ok_or_else(|| ResourceError::MissingLocation(child_data.name.clone()))?;
            let child = self.build(child_data, created)?;
            self.assign_child_resource(id, child, location)?;
        }

        let node = self.resource(id)?;
        if let Some(kind) = GridKind::of(node.kind()) {
            let items: Vec<ResourceId> = node
                .children()
                .iter()
                .copied()
                .filter(|&child| self.get(child).is_some_and(|c| kind.holds(c.kind())))
                .collect();
            if let Some(grid) = self.resource_mut(id)?.kind.grid_mut() {
                if items.len() != grid.num_items() {
                    return Err(ResourceError::GridMismatch {
                        resource: data.name.clone(),
                        expected: grid.num_items(),
                        found: items.len(),
                    });
                }
                *grid = Grid::with_items(grid.num_items_x(), grid.num_items_y(), items);
            }
        }
        Ok(id)
    }

    /// Whether two subtrees, possibly in different trees, match in name, type,
    /// size, location, rotation, category and children, recursively.
    pub fn structurally_equal(
        &self,
        id: ResourceId,
        other: &ResourceTree,
        other_id: ResourceId,
    ) -> Result<bool> {
        let a = self.resource(id)?;
        let b = other.resource(other_id)?;
        let same_node = a.name() == b.name()
            && a.resource_type() == b.resource_type()
            && a.size_x() == b.size_x()
            && a.size_y() == b.size_y()
            && a.size_z() == b.size_z()
            && a.location() == b.location()
            && a.rotation() == b.rotation()
            && a.category() == b.category()
            && a.children().len() == b.children().len();
        if !same_node {
            return Ok(false);
        }
        for (&child, &other_child) in a.children().iter().zip(b.children()) {
            if !self.structurally_equal(child, other, other_child)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// An independent deep copy of `id`, including tracker state, as a new standalone root.
    pub fn copy(&mut self, id: ResourceId) -> Result<ResourceId> {
        let data = self.serialize(id)?;
        let state = self.serialize_all_state(id)?;
        let copy = self.deserialize(&data)?;
        if let Err(err) = self.load_all_state(copy, &state) {
            self.remove(copy)?;
            return Err(err);
        }
        Ok(copy)
    }

    /// A copy of `id` rotated by `degrees`.
    pub fn rotated(&mut self, id: ResourceId, degrees: i32) -> Result<ResourceId> {
        let rotation =
            Rotation::from_degrees(degrees).ok_or(ResourceError::InvalidRotation(degrees))?;
        let copy = self.copy(id)?;
        self.rotate_by(copy, rotation)?;
        Ok(copy)
    }

    /// Writes the layout of `id` to a JSON file.
    pub fn save(&self, id: ResourceId, path: impl AsRef<Path>, pretty: bool) -> Result<()> {
        let path = path.as_ref();
        let data = self.serialize(id)?;
        let json = if pretty {
            serde_json::to_string_pretty(&data)?
        } else {
            serde_json::to_string(&data)?
        };
        fs::write(path, json)?;
        info!(resource = %data.name, path = %path.display(), "saved layout");
        Ok(())
    }

    /// Reads a layout written by [`save`](Self::save) and rebuilds it as a new standalone root.
    pub fn load_from_json_file(&mut self, path: impl AsRef<Path>) -> Result<ResourceId> {
        let path = path.as_ref();
        let data: ResourceData = serde_json::from_str(&fs::read_to_string(path)?)?;
        let id = self.deserialize(&data)?;
        info!(resource = %data.name, path = %path.display(), "loaded layout");
        Ok(id)
    }

    // --- STATE ---

    /// The tracker state of `id`, or an empty object for a resource without one.
    pub fn serialize_state(&self, id: ResourceId) -> Result<Value> {
        Ok(match self.kind(id)?.tracker() {
            Some(tracker) => tracker.serialize_state(),
            None => Value::Object(Map::new()),
        })
    }

    /// Loads tracker state into `id`. Ignored for resources without a tracker.
    pub fn load_state(&mut self, id: ResourceId, state: &Value) -> Result<()> {
        let node = self.resource_mut(id)?;
        if let Some(tracker) = node.kind.tracker_mut() {
            tracker.load_state(state)?;
        }
        Ok(())
    }

    /// The state of `id` and all of its descendants.
    pub fn serialize_all_state(&self, id: ResourceId) -> Result<StateSnapshot> {
        let mut snapshot = StateSnapshot::new();
        snapshot.insert(self.name(id)?.to_string(), self.serialize_state(id)?);
        for child in self.get_all_children(id)? {
            snapshot.insert(self.name(child)?.to_string(), self.serialize_state(child)?);
        }
        Ok(snapshot)
    }

    /// Replays `snapshot` onto `id` and all of its descendants.
    ///
    /// Every resource in the subtree must have an entry, and every entry must
    /// load into its tracker. Entries are checked before any state is loaded.
    pub fn load_all_state(&mut self, id: ResourceId, snapshot: &StateSnapshot) -> Result<()> {
        let mut targets = vec![id];
        targets.extend(self.get_all_children(id)?);
        let mut states = Vec::with_capacity(targets.len());
        for target in targets {
            let name = self.name(target)?;
            let state = snapshot
                .get(name)
                .ok_or_else(|| ResourceError::MissingState(name.to_string()))?;
            if let Some(tracker) = self.kind(target)?.tracker() {
                tracker.check_state(state)?;
            }
            states.push((target, state));
        }
        for (target, state) in states {
            self.load_state(target, state)?;
        }
        Ok(())
    }

    pub fn save_state_to_file(
        &self,
        id: ResourceId,
        path: impl AsRef<Path>,
        pretty: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.serialize_all_state(id)?;
        let json = if pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };
        fs::write(path, json)?;
        info!(resources = snapshot.len(), path = %path.display(), "saved state");
        Ok(())
    }

    pub fn load_state_from_file(&mut self, id: ResourceId, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot: StateSnapshot = serde_json::from_str(&fs::read_to_string(path)?)?;
        self.load_all_state(id, &snapshot)?;
        info!(resources = snapshot.len(), path = %path.display(), "loaded state");
        Ok(())
    }
}
