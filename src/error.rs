use crate::resource::ResourceId;
use std::io;

/// Failures of a tip, tube, colony or volume tracker.
///
/// A tracker is left unchanged when any of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("{thing} already has an item")]
    HasItem { thing: String },

    #[error("{thing} does not have an item")]
    NoItem { thing: String },

    #[error("tracker of {thing} is disabled, call `enable()`")]
    Disabled { thing: String },

    #[error("{thing} has too little volume to add {requested} uL ({free} uL free)")]
    CapacityExceeded {
        thing: String,
        requested: f64,
        free: f64,
    },

    #[error("{thing} has too little liquid to remove {requested} uL ({available} uL present)")]
    TooLittleLiquid {
        thing: String,
        requested: f64,
        available: f64,
    },

    #[error("invalid volume for {thing}: {volume} uL")]
    InvalidVolume { thing: String, volume: f64 },

    #[error("invalid tracker state for {thing}: {reason}")]
    InvalidState { thing: String, reason: String },
}

/// Errors raised by the resource tree, lookups and persistence.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    // ── Structure ─────────────────────────────────────────────────────────
    #[error("cannot assign resource '{0}' to itself")]
    SelfAssignment(String),

    #[error("will not assign resource '{resource}' that already has a parent: '{parent}'")]
    HasParent { resource: String, parent: String },

    #[error("will not reassign resource '{resource}' to the same parent: '{parent}'")]
    SameParent { resource: String, parent: String },

    #[error("cannot assign resource '{resource}' below its own descendant '{parent}'")]
    CyclicAssignment { resource: String, parent: String },

    #[error("resource '{parent}' already has a child named '{name}'")]
    DuplicateName { name: String, parent: String },

    #[error("resource '{resource}' is not a child of '{parent}'")]
    NotAChild { resource: String, parent: String },

    #[error("resource '{resource}' is a fixed grid item of '{parent}' and cannot be unassigned")]
    FixedGridItem { resource: String, parent: String },

    #[error("plate '{0}' already has a lid")]
    PlateHasLid(String),

    #[error("invalid rotation: {0} degrees (must be a multiple of 90)")]
    InvalidRotation(i32),

    #[error("resource '{0}' has no location")]
    NoLocation(String),

    #[error("cannot rename resource '{0}' while it is assigned")]
    RenameAssigned(String),

    #[error("change to resource '{resource}' vetoed: {reason}")]
    Vetoed { resource: String, reason: String },

    // ── Lookup ────────────────────────────────────────────────────────────
    #[error("resource with name '{0}' does not exist")]
    NotFound(String),

    #[error("resource name '{name}' is ambiguous, found under parents: {}", .parents.join(", "))]
    Ambiguous { name: String, parents: Vec<String> },

    #[error("'{resource}' has no spot named '{identifier}'")]
    NoSuchSpot {
        resource: String,
        identifier: String,
    },

    #[error("index {index} out of range for '{resource}' with {len} items")]
    IndexOutOfRange {
        resource: String,
        index: usize,
        len: usize,
    },

    #[error("resource '{name}' is not a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
    },

    #[error("resource '{0}' has no tracked state")]
    Stateless(String),

    #[error("stale resource handle {0:?}")]
    InvalidHandle(ResourceId),

    // ── Persistence ───────────────────────────────────────────────────────
    #[error("could not find resource subclass with name '{0}'")]
    UnknownResourceType(String),

    #[error("child resource '{0}' has no location")]
    MissingLocation(String),

    #[error("no state recorded for resource '{0}'")]
    MissingState(String),

    #[error("'{resource}' expects {expected} grid items, found {found}")]
    GridMismatch {
        resource: String,
        expected: usize,
        found: usize,
    },

    #[error("pattern for '{resource}' has {found} entries, expected {expected}")]
    PatternMismatch {
        resource: String,
        expected: usize,
        found: usize,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ResourceError>;
