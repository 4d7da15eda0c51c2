use crate::config::TrackingConfig;
use crate::coordinate::{Coordinate, Rotation};
use crate::error::{ResourceError, Result};
use crate::itemized::Grid;
use crate::petri_dish::{Colony, PetriDish};
use crate::tip::TipSpot;
use crate::tracker::{StateTracker, TrackerCallback};
use crate::tube::TubeSpot;
use crate::well::Well;
use std::fmt;
use tracing::{debug, warn};

/// Handle to a [`Resource`] stored in a [`ResourceTree`].
///
/// Handles are never reused: once a resource is removed from the tree, every
/// operation on its handle fails with [`ResourceError::InvalidHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifies a registered assignment hook, for [`ResourceTree::deregister_callback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

/// A hook fired before a child is assigned to or unassigned from a resource or any
/// of its descendants. Returning an error aborts the change before the tree is touched.
///
/// Receives the tree and the resource being (un)assigned.
pub type WillChangeCallback = Box<dyn Fn(&ResourceTree, ResourceId) -> Result<()>>;

/// A hook fired after a child was assigned to or unassigned from a resource or any
/// of its descendants.
pub type DidChangeCallback = Box<dyn Fn(&ResourceTree, ResourceId)>;

/// How [`ResourceTree::assign_child_resource_with`] treats a resource that already has a parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Reassign {
    /// Reassigning to the current parent only moves the resource (with a warning).
    /// A different parent is an error.
    #[default]
    Allow,
    /// Any existing parent is an error.
    Deny,
    /// Detach from the current parent first, firing its unassign hooks.
    Steal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Change {
    Assign,
    Unassign,
}

#[derive(Default)]
struct Hooks {
    will_assign: Vec<(CallbackHandle, WillChangeCallback)>,
    did_assign: Vec<(CallbackHandle, DidChangeCallback)>,
    will_unassign: Vec<(CallbackHandle, WillChangeCallback)>,
    did_unassign: Vec<(CallbackHandle, DidChangeCallback)>,
}

impl Hooks {
    fn will(&self, change: Change) -> &[(CallbackHandle, WillChangeCallback)] {
        match change {
            Change::Assign => &self.will_assign,
            Change::Unassign => &self.will_unassign,
        }
    }

    fn did(&self, change: Change) -> &[(CallbackHandle, DidChangeCallback)] {
        match change {
            Change::Assign => &self.did_assign,
            Change::Unassign => &self.did_unassign,
        }
    }

    fn remove(&mut self, handle: CallbackHandle) -> bool {
        let before = self.len();
        self.will_assign.retain(|(h, _)| *h != handle);
        self.did_assign.retain(|(h, _)| *h != handle);
        self.will_unassign.retain(|(h, _)| *h != handle);
        self.did_unassign.retain(|(h, _)| *h != handle);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.will_assign.len()
            + self.did_assign.len()
            + self.will_unassign.len()
            + self.did_unassign.len()
    }
}

/// The concrete kind of a resource, with the state that kind carries.
#[derive(Debug)]
pub enum ResourceKind {
    /// A plain resource with no behavior of its own.
    Resource,
    /// The root of a layout.
    Deck,
    Trash,
    Lid,
    TipRack(Grid),
    TipSpot(TipSpot),
    TubeRack(Grid),
    TubeSpot(TubeSpot),
    Plate(Grid),
    Well(Well),
    PetriDish(PetriDish),
    Colony(Colony),
}

impl ResourceKind {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Resource => ResourceType::Resource,
            Self::Deck => ResourceType::Deck,
            Self::Trash => ResourceType::Trash,
            Self::Lid => ResourceType::Lid,
            Self::TipRack(_) => ResourceType::TipRack,
            Self::TipSpot(_) => ResourceType::TipSpot,
            Self::TubeRack(_) => ResourceType::TubeRack,
            Self::TubeSpot(_) => ResourceType::TubeSpot,
            Self::Plate(_) => ResourceType::Plate,
            Self::Well(_) => ResourceType::Well,
            Self::PetriDish(_) => ResourceType::PetriDish,
            Self::Colony(_) => ResourceType::Colony,
        }
    }

    /// The grid of an itemized resource.
    pub fn grid(&self) -> Option<&Grid> {
        match self {
            Self::TipRack(grid) | Self::TubeRack(grid) | Self::Plate(grid) => Some(grid),
            _ => None,
        }
    }

    pub(crate) fn grid_mut(&mut self) -> Option<&mut Grid> {
        match self {
            Self::TipRack(grid) | Self::TubeRack(grid) | Self::Plate(grid) => Some(grid),
            _ => None,
        }
    }

    pub fn tracker(&self) -> Option<&dyn StateTracker> {
        match self {
            Self::TipSpot(spot) => Some(&spot.tracker),
            Self::TubeSpot(spot) => Some(&spot.tracker),
            Self::Well(well) => Some(&well.tracker),
            Self::PetriDish(dish) => Some(&dish.tracker),
            Self::Colony(colony) => Some(&colony.tracker),
            _ => None,
        }
    }

    pub fn tracker_mut(&mut self) -> Option<&mut dyn StateTracker> {
        match self {
            Self::TipSpot(spot) => Some(&mut spot.tracker),
            Self::TubeSpot(spot) => Some(&mut spot.tracker),
            Self::Well(well) => Some(&mut well.tracker),
            Self::PetriDish(dish) => Some(&mut dish.tracker),
            Self::Colony(colony) => Some(&mut colony.tracker),
            _ => None,
        }
    }

    /// Whether trackers of this kind start enabled under `tracking`.
    fn tracking_enabled(&self, tracking: &TrackingConfig) -> bool {
        match self {
            Self::TipSpot(_) => tracking.tip_tracking,
            Self::TubeSpot(_) => tracking.tube_tracking,
            Self::Well(_) | Self::PetriDish(_) => tracking.volume_tracking,
            Self::Colony(_) => tracking.colony_tracking,
            _ => true,
        }
    }
}

/// Serialized type tag of a [`ResourceKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Resource,
    Deck,
    Trash,
    Lid,
    TipRack,
    TipSpot,
    TubeRack,
    TubeSpot,
    Plate,
    Well,
    PetriDish,
    Colony,
}

impl ResourceType {
    pub const ALL: [ResourceType; 12] = [
        Self::Resource,
        Self::Deck,
        Self::Trash,
        Self::Lid,
        Self::TipRack,
        Self::TipSpot,
        Self::TubeRack,
        Self::TubeSpot,
        Self::Plate,
        Self::Well,
        Self::PetriDish,
        Self::Colony,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Resource => "Resource",
            Self::Deck => "Deck",
            Self::Trash => "Trash",
            Self::Lid => "Lid",
            Self::TipRack => "TipRack",
            Self::TipSpot => "TipSpot",
            Self::TubeRack => "TubeRack",
            Self::TubeSpot => "TubeSpot",
            Self::Plate => "Plate",
            Self::Well => "Well",
            Self::PetriDish => "PetriDish",
            Self::Colony => "Colony",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A physical object in a layout: a rack, a spot, a container, the deck itself.
///
/// Sizes are intrinsic and do not change with rotation; use [`get_size_x`](Self::get_size_x)
/// and [`get_size_y`](Self::get_size_y) for the rotated footprint.
pub struct Resource {
    pub(crate) name: String,
    pub(crate) size_x: f64,
    pub(crate) size_y: f64,
    pub(crate) size_z: f64,
    pub(crate) rotation: Rotation,
    pub(crate) category: Option<String>,
    pub(crate) model: Option<String>,
    /// Relative to the parent. Always set while `parent` is.
    pub(crate) location: Option<Coordinate>,
    pub(crate) parent: Option<ResourceId>,
    pub(crate) children: Vec<ResourceId>,
    pub(crate) kind: ResourceKind,
    hooks: Hooks,
}

impl Resource {
    /// A plain resource. Size is in mm.
    pub fn new(name: impl Into<String>, size_x: f64, size_y: f64, size_z: f64) -> Self {
        Self {
            name: name.into(),
            size_x,
            size_y,
            size_z,
            rotation: Rotation::R0,
            category: None,
            model: None,
            location: None,
            parent: None,
            children: Vec::new(),
            kind: ResourceKind::Resource,
            hooks: Hooks::default(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_x(&self) -> f64 {
        self.size_x
    }

    pub fn size_y(&self) -> f64 {
        self.size_y
    }

    pub fn size_z(&self) -> f64 {
        self.size_z
    }

    /// Footprint along x in the current orientation.
    pub fn get_size_x(&self) -> f64 {
        if self.rotation.swaps_footprint() {
            self.size_y
        } else {
            self.size_x
        }
    }

    /// Footprint along y in the current orientation.
    pub fn get_size_y(&self) -> f64 {
        if self.rotation.swaps_footprint() {
            self.size_x
        } else {
            self.size_y
        }
    }

    pub fn get_size_z(&self) -> f64 {
        self.size_z
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn location(&self) -> Option<Coordinate> {
        self.location
    }

    pub fn parent(&self) -> Option<ResourceId> {
        self.parent
    }

    pub fn children(&self) -> &[ResourceId] {
        &self.children
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn resource_type(&self) -> ResourceType {
        self.kind.resource_type()
    }

    /// The center of the footprint at the bottom of the resource, relative to its location.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.get_size_x() / 2.0, self.get_size_y() / 2.0, 0.0)
    }

    /// Evenly spaced points inside the resource, `n` per axis, relative to its location.
    ///
    /// An axis with `n == 0` contributes the single value 0.
    pub fn centers(&self, xn: usize, yn: usize, zn: usize) -> Vec<Coordinate> {
        fn spread(n: usize, size: f64) -> Vec<f64> {
            if n == 0 {
                return vec![0.0];
            }
            (1..=n).map(|i| i as f64 * size / (n + 1) as f64).collect()
        }
        let xs = spread(xn, self.get_size_x());
        let ys = spread(yn, self.get_size_y());
        let zs = spread(zn, self.get_size_z());
        let mut points = Vec::with_capacity(xs.len() * ys.len() * zs.len());
        for &x in &xs {
            for &y in &ys {
                for &z in &zs {
                    points.push(Coordinate::new(x, y, z));
                }
            }
        }
        points
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("size", &(self.size_x, self.size_y, self.size_z))
            .field("rotation", &self.rotation)
            .field("category", &self.category)
            .field("model", &self.model)
            .field("location", &self.location)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("kind", &self.kind)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Arena holding every resource of one or more layouts.
///
/// Resources reference each other through [`ResourceId`] handles: a child knows
/// its parent and a parent lists its children, in assignment order.
#[derive(Debug, Default)]
pub struct ResourceTree {
    nodes: Vec<Option<Resource>>,
    tracking: TrackingConfig,
    next_callback: u64,
}

/// Typed `&` / `&mut` accessors for the payload of one [`ResourceKind`] variant.
macro_rules! kind_accessors {
    ($($get:ident, $get_mut:ident: $variant:ident => $ty:ty, $expected:literal;)*) => {
        $(
            pub fn $get(&self, id: ResourceId) -> Result<&$ty> {
                let node = self.resource(id)?;
                match &node.kind {
                    ResourceKind::$variant(inner) => Ok(inner),
                    _ => Err(wrong_kind(&node.name, $expected)),
                }
            }

            pub fn $get_mut(&mut self, id: ResourceId) -> Result<&mut $ty> {
                let node = self.resource_mut(id)?;
                match &mut node.kind {
                    ResourceKind::$variant(inner) => Ok(inner),
                    _ => Err(wrong_kind(&node.name, $expected)),
                }
            }
        )*
    };
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree whose new trackers start enabled or disabled according to `tracking`.
    pub fn with_tracking(tracking: TrackingConfig) -> Self {
        Self {
            tracking,
            ..Self::default()
        }
    }

    pub fn tracking(&self) -> &TrackingConfig {
        &self.tracking
    }

    // --- ARENA ---

    /// Adds a standalone resource (no parent, no location) and returns its handle.
    ///
    /// The resource's tracker, if any, is renamed after the resource and disabled
    /// when the tree's [`TrackingConfig`] turns tracking off for its kind.
    pub fn insert(&mut self, mut resource: Resource) -> ResourceId {
        let tracking = self.tracking;
        let enabled = resource.kind.tracking_enabled(&tracking);
        let name = resource.name.clone();
        if let Some(tracker) = resource.kind.tracker_mut() {
            tracker.set_thing(&name);
            if !enabled {
                tracker.disable();
            }
        }
        resource.parent = None;
        resource.location = None;
        resource.children.clear();

        let id = ResourceId(self.nodes.len() as u32);
        self.nodes.push(Some(resource));
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.get(id).is_some()
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource> {
        self.get(id).ok_or(ResourceError::InvalidHandle(id))
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> Result<&mut Resource> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(ResourceError::InvalidHandle(id))
    }

    pub fn name(&self, id: ResourceId) -> Result<&str> {
        Ok(self.resource(id)?.name())
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renames an unassigned resource.
    pub fn set_name(&mut self, id: ResourceId, name: impl Into<String>) -> Result<()> {
        let node = self.resource_mut(id)?;
        if node.parent.is_some() {
            return Err(ResourceError::RenameAssigned(node.name.clone()));
        }
        node.name = name.into();
        let name = node.name.clone();
        if let Some(tracker) = node.kind.tracker_mut() {
            tracker.set_thing(&name);
        }
        Ok(())
    }

    /// Drops an unassigned resource and all of its descendants from the arena.
    pub fn remove(&mut self, id: ResourceId) -> Result<()> {
        let node = self.resource(id)?;
        if let Some(parent) = node.parent {
            return Err(ResourceError::HasParent {
                resource: node.name.clone(),
                parent: self.resource(parent)?.name.clone(),
            });
        }
        let mut doomed = self.get_all_children(id)?;
        doomed.push(id);
        self.discard(&doomed);
        Ok(())
    }

    /// Drops nodes without touching their relatives.
    pub(crate) fn discard(&mut self, ids: &[ResourceId]) {
        for id in ids {
            if let Some(slot) = self.nodes.get_mut(id.index()) {
                *slot = None;
            }
        }
    }

    /// Inserts a root resource, such as a deck, at an absolute location.
    pub(crate) fn insert_root(&mut self, resource: Resource, location: Coordinate) -> ResourceId {
        let id = self.insert(resource);
        if let Some(Some(node)) = self.nodes.get_mut(id.index()) {
            node.location = Some(location);
        }
        id
    }

    /// Places a parentless resource, such as a deck, at an absolute location.
    pub(crate) fn set_root_location(&mut self, id: ResourceId, location: Coordinate) -> Result<()> {
        let node = self.resource_mut(id)?;
        if let Some(parent) = node.parent {
            let resource = node.name.clone();
            return Err(ResourceError::HasParent {
                resource,
                parent: self.resource(parent)?.name.clone(),
            });
        }
        node.location = Some(location);
        Ok(())
    }

    // --- STRUCTURE ---

    /// Assigns `child` to `parent` at `location`, relative to the parent.
    ///
    /// Same as [`assign_child_resource_with`](Self::assign_child_resource_with) with
    /// [`Reassign::Allow`].
    pub fn assign_child_resource(
        &mut self,
        parent: ResourceId,
        child: ResourceId,
        location: Coordinate,
    ) -> Result<()> {
        self.assign_child_resource_with(parent, child, location, Reassign::Allow)
    }

    /// Assigns `child` to `parent` at `location`, relative to the parent.
    ///
    /// All preconditions are checked and every will-assign hook of `parent` and its
    /// ancestors runs before anything changes; a failure leaves the tree untouched.
    /// Did-assign hooks run afterwards.
    pub fn assign_child_resource_with(
        &mut self,
        parent: ResourceId,
        child: ResourceId,
        location: Coordinate,
        reassign: Reassign,
    ) -> Result<()> {
        self.check_assignment(parent, child, reassign)?;
        self.fire_will(parent, child, Change::Assign)?;

        if let Some(previous) = self.resource(child)?.parent.filter(|p| *p != parent) {
            self.unassign_child_resource(previous, child)?;
        }

        let node = self.resource_mut(child)?;
        node.parent = Some(parent);
        node.location = Some(location);
        let parent_node = self.resource_mut(parent)?;
        if !parent_node.children.contains(&child) {
            parent_node.children.push(child);
        }
        debug!(
            parent = %self.resource(parent)?.name,
            child = %self.resource(child)?.name,
            %location,
            "assigned resource"
        );

        self.fire_did(parent, child, Change::Assign)
    }

    fn check_assignment(
        &self,
        parent: ResourceId,
        child: ResourceId,
        reassign: Reassign,
    ) -> Result<()> {
        let child_node = self.resource(child)?;
        let parent_node = self.resource(parent)?;
        if parent == child {
            return Err(ResourceError::SelfAssignment(child_node.name.clone()));
        }
        if self.ancestors(parent)?.contains(&child) {
            return Err(ResourceError::CyclicAssignment {
                resource: child_node.name.clone(),
                parent: parent_node.name.clone(),
            });
        }

        if let Some(current) = child_node.parent {
            let current_name = self.resource(current)?.name.clone();
            match reassign {
                Reassign::Deny if current == parent => {
                    return Err(ResourceError::SameParent {
                        resource: child_node.name.clone(),
                        parent: current_name,
                    });
                }
                Reassign::Allow if current == parent => {
                    warn!(
                        resource = %child_node.name,
                        parent = %current_name,
                        "resource is already assigned to this parent, moving it"
                    );
                }
                Reassign::Steal if current != parent => {
                    self.check_detachable(current, child)?;
                }
                Reassign::Allow | Reassign::Deny => {
                    return Err(ResourceError::HasParent {
                        resource: child_node.name.clone(),
                        parent: current_name,
                    });
                }
                Reassign::Steal => {}
            }
        }

        let duplicate = parent_node.children.iter().any(|&sibling| {
            sibling != child && self.get(sibling).is_some_and(|s| s.name == child_node.name)
        });
        if duplicate {
            return Err(ResourceError::DuplicateName {
                name: child_node.name.clone(),
                parent: parent_node.name.clone(),
            });
        }

        if matches!(parent_node.kind, ResourceKind::Plate(_))
            && matches!(child_node.kind, ResourceKind::Lid)
        {
            let has_lid = parent_node.children.iter().any(|&sibling| {
                sibling != child && self.get(sibling).is_some_and(|s| matches!(s.kind, ResourceKind::Lid))
            });
            if has_lid {
                return Err(ResourceError::PlateHasLid(parent_node.name.clone()));
            }
        }
        Ok(())
    }

    fn check_detachable(&self, parent: ResourceId, child: ResourceId) -> Result<()> {
        let parent_node = self.resource(parent)?;
        let child_node = self.resource(child)?;
        if child_node.parent != Some(parent) {
            return Err(ResourceError::NotAChild {
                resource: child_node.name.clone(),
                parent: parent_node.name.clone(),
            });
        }
        if parent_node
            .kind
            .grid()
            .is_some_and(|grid| grid.items().contains(&child))
        {
            return Err(ResourceError::FixedGridItem {
                resource: child_node.name.clone(),
                parent: parent_node.name.clone(),
            });
        }
        Ok(())
    }

    /// Detaches `child` from `parent`, clearing its parent and location.
    pub fn unassign_child_resource(&mut self, parent: ResourceId, child: ResourceId) -> Result<()> {
        self.check_detachable(parent, child)?;
        self.fire_will(parent, child, Change::Unassign)?;

        self.resource_mut(parent)?.children.retain(|c| *c != child);
        let node = self.resource_mut(child)?;
        node.parent = None;
        node.location = None;
        debug!(
            parent = %self.resource(parent)?.name,
            child = %self.resource(child)?.name,
            "unassigned resource"
        );

        self.fire_did(parent, child, Change::Unassign)
    }

    /// Detaches `id` from its parent. Does nothing for a resource without a parent.
    pub fn unassign(&mut self, id: ResourceId) -> Result<()> {
        match self.resource(id)?.parent {
            Some(parent) => self.unassign_child_resource(parent, id),
            None => Ok(()),
        }
    }

    // --- HOOKS ---

    pub fn register_will_assign_callback(
        &mut self,
        id: ResourceId,
        callback: WillChangeCallback,
    ) -> Result<CallbackHandle> {
        let handle = self.next_handle();
        self.resource_mut(id)?.hooks.will_assign.push((handle, callback));
        Ok(handle)
    }

    pub fn register_did_assign_callback(
        &mut self,
        id: ResourceId,
        callback: DidChangeCallback,
    ) -> Result<CallbackHandle> {
        let handle = self.next_handle();
        self.resource_mut(id)?.hooks.did_assign.push((handle, callback));
        Ok(handle)
    }

    pub fn register_will_unassign_callback(
        &mut self,
        id: ResourceId,
        callback: WillChangeCallback,
    ) -> Result<CallbackHandle> {
        let handle = self.next_handle();
        self.resource_mut(id)?.hooks.will_unassign.push((handle, callback));
        Ok(handle)
    }

    pub fn register_did_unassign_callback(
        &mut self,
        id: ResourceId,
        callback: DidChangeCallback,
    ) -> Result<CallbackHandle> {
        let handle = self.next_handle();
        self.resource_mut(id)?.hooks.did_unassign.push((handle, callback));
        Ok(handle)
    }

    /// Removes a hook registered on `id`. Returns whether it was found.
    pub fn deregister_callback(&mut self, id: ResourceId, handle: CallbackHandle) -> Result<bool> {
        Ok(self.resource_mut(id)?.hooks.remove(handle))
    }

    fn next_handle(&mut self) -> CallbackHandle {
        self.next_callback += 1;
        CallbackHandle(self.next_callback)
    }

    /// Runs will-hooks on `parent`, then on each of its ancestors.
    fn fire_will(&self, parent: ResourceId, child: ResourceId, change: Change) -> Result<()> {
        let mut current = Some(parent);
        while let Some(id) = current {
            let node = self.resource(id)?;
            for (_, hook) in node.hooks.will(change) {
                hook(self, child)?;
            }
            current = node.parent;
        }
        Ok(())
    }

    fn fire_did(&self, parent: ResourceId, child: ResourceId, change: Change) -> Result<()> {
        let mut current = Some(parent);
        while let Some(id) = current {
            let node = self.resource(id)?;
            for (_, hook) in node.hooks.did(change) {
                hook(self, child);
            }
            current = node.parent;
        }
        Ok(())
    }

    // --- SPATIAL ---

    /// Location of `id` composed through every ancestor up to the root.
    pub fn get_absolute_location(&self, id: ResourceId) -> Result<Coordinate> {
        let mut absolute = Coordinate::ZERO;
        let mut current = Some(id);
        while let Some(handle) = current {
            let node = self.resource(handle)?;
            let location = node
                .location
                .ok_or_else(|| ResourceError::NoLocation(node.name.clone()))?;
            absolute = absolute + location;
            current = node.parent;
        }
        Ok(absolute)
    }

    /// Rotates `id` counter-clockwise by `degrees`, a multiple of 90.
    ///
    /// Every child is moved so it keeps its place on the rotated parent, then
    /// rotated itself by the same amount.
    pub fn rotate(&mut self, id: ResourceId, degrees: i32) -> Result<()> {
        let rotation =
            Rotation::from_degrees(degrees).ok_or(ResourceError::InvalidRotation(degrees))?;
        self.resource(id)?;
        self.rotate_by(id, rotation)?;
        debug!(resource = %self.resource(id)?.name, %rotation, "rotated resource");
        Ok(())
    }

    pub(crate) fn rotate_by(&mut self, id: ResourceId, rotation: Rotation) -> Result<()> {
        if rotation == Rotation::R0 {
            return Ok(());
        }
        let node = self.resource(id)?;
        let (parent_x, parent_y) = (node.get_size_x(), node.get_size_y());
        let children = node.children.clone();

        for child in children {
            let child_node = self.resource_mut(child)?;
            let (child_x, child_y) = (child_node.get_size_x(), child_node.get_size_y());
            if let Some(loc) = child_node.location {
                let (x, y) = match rotation {
                    Rotation::R0 => (loc.x, loc.y),
                    Rotation::R90 => (parent_y - loc.y - child_y, loc.x),
                    Rotation::R180 => (parent_x - loc.x - child_x, parent_y - loc.y - child_y),
                    Rotation::R270 => (loc.y, parent_x - loc.x - child_x),
                };
                child_node.location = Some(Coordinate::new(x, y, loc.z));
            }
            self.rotate_by(child, rotation)?;
        }

        let node = self.resource_mut(id)?;
        node.rotation = node.rotation + rotation;
        Ok(())
    }

    // --- LOOKUP ---

    /// Parent, grandparent, and so on up to the root.
    pub fn ancestors(&self, id: ResourceId) -> Result<Vec<ResourceId>> {
        let mut ancestors = Vec::new();
        let mut current = self.resource(id)?.parent;
        while let Some(handle) = current {
            ancestors.push(handle);
            current = self.resource(handle)?.parent;
        }
        Ok(ancestors)
    }

    pub fn get_root(&self, id: ResourceId) -> Result<ResourceId> {
        Ok(self.ancestors(id)?.last().copied().unwrap_or(id))
    }

    /// Every descendant of `id`, depth first, parents before their children.
    pub fn get_all_children(&self, id: ResourceId) -> Result<Vec<ResourceId>> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out)?;
        Ok(out)
    }

    fn collect_descendants(&self, id: ResourceId, out: &mut Vec<ResourceId>) -> Result<()> {
        for &child in &self.resource(id)?.children {
            out.push(child);
            self.collect_descendants(child, out)?;
        }
        Ok(())
    }

    /// The first resource named `name` in a depth-first search from `id`, `id` included.
    pub fn get_resource(&self, id: ResourceId, name: &str) -> Result<ResourceId> {
        if self.resource(id)?.name == name {
            return Ok(id);
        }
        self.get_all_children(id)?
            .into_iter()
            .find(|&child| self.get(child).is_some_and(|c| c.name == name))
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))
    }

    /// Every resource named `name` in the subtree of `id`, `id` included, in search order.
    pub fn find_all(&self, id: ResourceId, name: &str) -> Result<Vec<ResourceId>> {
        let mut candidates = vec![id];
        candidates.extend(self.get_all_children(id)?);
        Ok(candidates
            .into_iter()
            .filter(|&handle| self.get(handle).is_some_and(|r| r.name == name))
            .collect())
    }

    // --- KINDS ---

    pub fn kind(&self, id: ResourceId) -> Result<&ResourceKind> {
        Ok(&self.resource(id)?.kind)
    }

    kind_accessors! {
        tip_spot, tip_spot_mut: TipSpot => TipSpot, "tip spot";
        tube_spot, tube_spot_mut: TubeSpot => TubeSpot, "tube spot";
        well, well_mut: Well => Well, "well";
        petri_dish, petri_dish_mut: PetriDish => PetriDish, "petri dish";
        colony, colony_mut: Colony => Colony, "colony";
    }

    /// The grid of a tip rack, tube rack or plate.
    pub fn grid(&self, id: ResourceId) -> Result<&Grid> {
        let node = self.resource(id)?;
        node.kind
            .grid()
            .ok_or_else(|| wrong_kind(&node.name, "itemized resource"))
    }

    pub fn tracker(&self, id: ResourceId) -> Result<&dyn StateTracker> {
        let node = self.resource(id)?;
        node.kind
            .tracker()
            .ok_or_else(|| ResourceError::Stateless(node.name.clone()))
    }

    pub fn tracker_mut(&mut self, id: ResourceId) -> Result<&mut dyn StateTracker> {
        let node = self.resource_mut(id)?;
        let name = node.name.clone();
        node.kind
            .tracker_mut()
            .ok_or(ResourceError::Stateless(name))
    }

    /// Calls `callback` with the new state after every commit of the tracker of `id`.
    pub fn register_state_update_callback(
        &mut self,
        id: ResourceId,
        callback: TrackerCallback,
    ) -> Result<()> {
        self.tracker_mut(id)?.register_callback(callback);
        Ok(())
    }
}

fn wrong_kind(name: &str, expected: &'static str) -> ResourceError {
    ResourceError::WrongKind {
        name: name.to_string(),
        expected,
    }
}
