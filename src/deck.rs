use crate::config::{DeckConfig, TrackingConfig};
use crate::coordinate::Coordinate;
use crate::error::{ResourceError, Result};
use crate::resource::{Resource, ResourceId, ResourceKind, ResourceTree, ResourceType};
use crate::serialize::{ResourceData, StateSnapshot};
use std::path::Path;
use tracing::info;

/// The root of a layout: a resource tree plus name-based lookup across it and persistence.
///
/// The deck owns its [`ResourceTree`]; labware is built in [`tree_mut`](Self::tree_mut)
/// and placed with [`assign_child_resource`](Self::assign_child_resource).
#[derive(Debug)]
pub struct Deck {
    tree: ResourceTree,
    root: ResourceId,
    config: DeckConfig,
}

impl Deck {
    pub fn new(config: DeckConfig) -> Self {
        let mut tree = ResourceTree::with_tracking(config.tracking);
        let resource = Resource::new(config.name.as_str(), config.size_x, config.size_y, config.size_z)
            .with_category("deck")
            .with_kind(ResourceKind::Deck);
        let root = tree.insert_root(resource, config.origin);
        Self { tree, root, config }
    }

    pub fn root(&self) -> ResourceId {
        self.root
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ResourceTree {
        &mut self.tree
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    // --- LAYOUT ---

    /// Places `child` on the deck at `location`, relative to the deck origin.
    pub fn assign_child_resource(&mut self, child: ResourceId, location: Coordinate) -> Result<()> {
        self.tree.assign_child_resource(self.root, child, location)
    }

    pub fn unassign_child_resource(&mut self, child: ResourceId) -> Result<()> {
        self.tree.unassign_child_resource(self.root, child)
    }

    /// Unassigns everything placed directly on the deck. The resources stay in the tree.
    pub fn clear(&mut self) -> Result<()> {
        let children = self.tree.resource(self.root)?.children().to_vec();
        for child in children {
            self.tree.unassign_child_resource(self.root, child)?;
        }
        Ok(())
    }

    // --- LOOKUP ---

    /// The single resource on the deck named `name`.
    ///
    /// Fails with [`ResourceError::NotFound`] when nothing matches and with
    /// [`ResourceError::Ambiguous`] when resources under different parents share the name.
    pub fn get_resource(&self, name: &str) -> Result<ResourceId> {
        let matches: Vec<ResourceId> = self
            .tree
            .get_all_children(self.root)?
            .into_iter()
            .filter(|&id| self.tree.get(id).is_some_and(|r| r.name() == name))
            .collect();
        match matches.as_slice() {
            [] => Err(ResourceError::NotFound(name.to_string())),
            [found] => Ok(*found),
            _ => {
                let mut parents = Vec::with_capacity(matches.len());
                for id in &matches {
                    let parent = self.tree.resource(*id)?.parent();
                    parents.push(match parent {
                        Some(parent) => self.tree.name(parent)?.to_string(),
                        None => String::new(),
                    });
                }
                Err(ResourceError::Ambiguous {
                    name: name.to_string(),
                    parents,
                })
            }
        }
    }

    pub fn has_resource(&self, name: &str) -> bool {
        !matches!(self.get_resource(name), Err(ResourceError::NotFound(_)))
    }

    /// Every resource on the deck, depth first.
    pub fn get_all_resources(&self) -> Result<Vec<ResourceId>> {
        self.tree.get_all_children(self.root)
    }

    /// The trash, which must be named `"trash"`.
    pub fn get_trash_area(&self) -> Result<ResourceId> {
        let trash = self.get_resource("trash")?;
        match self.tree.kind(trash)? {
            ResourceKind::Trash => Ok(trash),
            _ => Err(ResourceError::WrongKind {
                name: "trash".to_string(),
                expected: "trash",
            }),
        }
    }

    /// One line per resource placed directly on the deck.
    pub fn summary(&self) -> Result<String> {
        let deck = self.tree.resource(self.root)?;
        let mut summary = format!("Deck: {} x {} mm\n\n", deck.get_size_x(), deck.get_size_y());
        for &child in deck.children() {
            let node = self.tree.resource(child)?;
            let location = node.location().unwrap_or_default();
            summary.push_str(&format!(
                "{}: {} at {}\n",
                node.name(),
                node.resource_type(),
                location
            ));
        }
        Ok(summary)
    }

    // --- PERSISTENCE ---

    pub fn serialize(&self) -> Result<ResourceData> {
        self.tree.serialize(self.root)
    }

    /// Rebuilds a deck from a layout document, with every tracker enabled.
    pub fn deserialize(data: &ResourceData) -> Result<Self> {
        Self::deserialize_with(data, TrackingConfig::default())
    }

    /// Rebuilds a deck from a layout document. The deck keeps its recorded origin.
    pub fn deserialize_with(data: &ResourceData, tracking: TrackingConfig) -> Result<Self> {
        match ResourceType::from_tag(&data.resource_type) {
            Some(ResourceType::Deck) => {}
            Some(_) => {
                return Err(ResourceError::WrongKind {
                    name: data.name.clone(),
                    expected: "deck",
                });
            }
            None => return Err(ResourceError::UnknownResourceType(data.resource_type.clone())),
        }

        let config = DeckConfig {
            name: data.name.clone(),
            size_x: data.size_x,
            size_y: data.size_y,
            size_z: data.size_z,
            origin: data.location.unwrap_or_default(),
            tracking,
            ..DeckConfig::default()
        };
        let mut tree = ResourceTree::with_tracking(tracking);
        let root = tree.deserialize(data)?;
        tree.set_root_location(root, config.origin)?;
        Ok(Self { tree, root, config })
    }

    /// Writes the layout to a JSON file, pretty-printed if the config says so.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.tree.save(self.root, path, self.config.pretty_json)
    }

    pub fn load_from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_from_json_file_with(path, TrackingConfig::default())
    }

    pub fn load_from_json_file_with(path: impl AsRef<Path>, tracking: TrackingConfig) -> Result<Self> {
        let path = path.as_ref();
        let data: ResourceData = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let deck = Self::deserialize_with(&data, tracking)?;
        info!(deck = %deck.name(), path = %path.display(), "loaded deck");
        Ok(deck)
    }

    // --- STATE ---

    pub fn serialize_all_state(&self) -> Result<StateSnapshot> {
        self.tree.serialize_all_state(self.root)
    }

    pub fn load_all_state(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        self.tree.load_all_state(self.root, snapshot)
    }

    pub fn save_state_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.tree
            .save_state_to_file(self.root, path, self.config.pretty_json)
    }

    pub fn load_state_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.tree.load_state_from_file(self.root, path)
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new(DeckConfig::default())
    }
}

/// Structural equality of the two layouts; tracker state is not compared.
impl PartialEq for Deck {
    fn eq(&self, other: &Self) -> bool {
        self.tree
            .structurally_equal(self.root, &other.tree, other.root)
            .unwrap_or(false)
    }
}
