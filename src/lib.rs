//! # labdeck
//!
//! The resource model of a laboratory liquid-handling robot: decks, racks, plates
//! and the spots inside them, arranged as a tree of positioned objects.
//!
//! Each spot or container pairs with a tracker that records what it holds (a tip,
//! a tube, a colony culture, some liquid) with pending/commit/rollback semantics.
//! Layouts round-trip through JSON, and tracker state can be snapshotted and
//! replayed separately from structure.
//!
//! Robot backends consume this crate: they resolve spots by name, read absolute
//! coordinates, and commit tracker changes around the physical operations they perform.

pub mod config;
pub mod coordinate;
pub mod deck;
pub mod error;
pub mod itemized;
pub mod petri_dish;
pub mod resource;
pub mod serialize;
pub mod tip;
pub mod tracker;
pub mod tube;
pub mod volume_tracker;
pub mod well;

pub use config::*;
pub use coordinate::*;
pub use deck::*;
pub use error::*;
pub use itemized::*;
pub use petri_dish::*;
pub use resource::*;
pub use serialize::*;
pub use tip::*;
pub use tracker::*;
pub use tube::*;
pub use volume_tracker::*;
pub use well::*;
