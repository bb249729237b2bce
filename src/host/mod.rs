//! Model host abstraction.
//!
//! The engine reads geometry, membership and parameters through [`ModelHost`]
//! and mutates only inside a transaction opened on it. A host raises
//! [`Conflict`]s while a transaction is open; the [`ConflictResolver`]
//! attached to that transaction decides which ones are acknowledged at
//! commit.

pub mod memory;
pub mod snapshot;

use crate::error::HostError;
use crate::model::{
    BoundingBox, Category, ElementId, GroupInstance, Level, Location, Parameter, Point3, Room,
    RoomReference,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::{ElementRecord, MemoryModel};
pub use snapshot::{load_snapshot, save_snapshot, ModelSnapshot};

/// Host-level conflict identities raised during a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// A member of a single placed group was edited outside group edit mode.
    AtomViolationSingleInstance,
    /// A member of a group with several placed instances was edited.
    AtomViolationMultipleInstances,
    /// The edit propagates to more than one group instance.
    ModifyingMultipleGroups,
    /// Any other host conflict, identified by name.
    Other(String),
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::AtomViolationSingleInstance => f.write_str("atom violation (single instance)"),
            ConflictKind::AtomViolationMultipleInstances => {
                f.write_str("atom violation (multiple instances)")
            }
            ConflictKind::ModifyingMultipleGroups => f.write_str("modifying multiple groups"),
            ConflictKind::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub elements: Vec<ElementId>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Accept the conflict so the transaction can commit.
    Acknowledge,
    /// Leave the conflict to the host, which fails the commit.
    PassThrough,
}

/// Strategy attached to one transaction, consulted for every conflict it raises.
pub trait ConflictResolver {
    fn resolve(&self, conflict: &Conflict) -> ConflictResolution;
}

/// Everything the engine consumes from the host modeling application.
///
/// Reads are infallible: absent data is `None` or empty. Writes and
/// transaction control report [`HostError`].
pub trait ModelHost {
    fn document_name(&self) -> &str;

    fn elements_in_category(&self, category: &Category) -> Vec<ElementId>;

    fn category(&self, element: ElementId) -> Option<Category>;

    fn bounding_box(&self, element: ElementId) -> Option<BoundingBox>;

    fn location(&self, element: ElementId) -> Option<Location>;

    fn parameter(&self, element: ElementId, name: &str) -> Option<Parameter>;

    fn set_parameter(&mut self, element: ElementId, name: &str, value: &str)
        -> Result<(), HostError>;

    fn level_by_name(&self, name: &str) -> Option<Level>;

    /// Phase used for every room lookup.
    fn active_phase(&self) -> Option<ElementId>;

    fn room(&self, id: ElementId) -> Option<Room>;

    /// Room id held by one of the element's room relations.
    fn room_reference(&self, element: ElementId, reference: RoomReference) -> Option<ElementId>;

    /// Room enclosing `point` in `phase`.
    fn room_at_point(&self, point: Point3, phase: Option<ElementId>) -> Option<ElementId>;

    /// Every placed group instance in the model.
    fn group_instances(&self) -> Vec<GroupInstance>;

    fn group_members(&self, group: ElementId) -> Vec<ElementId>;

    fn is_group(&self, element: ElementId) -> bool;

    fn begin_transaction(
        &mut self,
        name: &str,
        resolver: Option<Box<dyn ConflictResolver>>,
    ) -> Result<(), HostError>;

    /// Commits the open transaction. On failure the host has already rolled back.
    fn commit_transaction(&mut self) -> Result<(), HostError>;

    fn rollback_transaction(&mut self) -> Result<(), HostError>;

    /// Isolates `elements` in the active view for user feedback.
    fn isolate_elements(&mut self, elements: &[ElementId]) -> Result<(), HostError>;
}
