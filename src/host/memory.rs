//! In-memory [`ModelHost`] backed by a model snapshot.

use super::{Conflict, ConflictKind, ConflictResolution, ConflictResolver, ModelHost, ModelSnapshot};
use crate::error::{HostError, SnapshotError};
use crate::model::{
    BoundingBox, Category, ElementId, GroupInstance, Level, Location, Parameter, Point3, Room,
    RoomReference,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Category given to group instance elements created by [`MemoryModel::insert_group`].
pub const GROUP_CATEGORY: &str = "Model Groups";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: ElementId,
    pub category: Category,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub contained_room: Option<ElementId>,
    #[serde(default)]
    pub from_room: Option<ElementId>,
    #[serde(default)]
    pub to_room: Option<ElementId>,
    /// Host message returned for every write to this element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_writes: Option<String>,
}

impl ElementRecord {
    #[must_use]
    pub fn new(id: impl Into<ElementId>, category: impl Into<Category>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            name: String::new(),
            bounding_box: None,
            location: None,
            parameters: Vec::new(),
            contained_room: None,
            from_room: None,
            to_room: None,
            reject_writes: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds empty writable parameters.
    #[must_use]
    pub fn with_empty_parameters(mut self, names: &[&str]) -> Self {
        self.parameters
            .extend(names.iter().map(|name| Parameter::new(*name, "")));
        self
    }

    #[must_use]
    pub fn with_contained_room(mut self, room: impl Into<ElementId>) -> Self {
        self.contained_room = Some(room.into());
        self
    }

    #[must_use]
    pub fn with_door_rooms(mut self, from: Option<ElementId>, to: Option<ElementId>) -> Self {
        self.from_room = from;
        self.to_room = to;
        self
    }

    #[must_use]
    pub fn rejecting_writes(mut self, message: impl Into<String>) -> Self {
        self.reject_writes = Some(message.into());
        self
    }

    fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    #[serde(flatten)]
    pub room: Room,
    /// Axis-aligned extent used for point-in-room tests.
    pub extent: BoundingBox,
    #[serde(default)]
    pub phase: Option<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(flatten)]
    pub instance: GroupInstance,
    pub members: Vec<ElementId>,
}

struct OpenTransaction {
    name: String,
    resolver: Option<Box<dyn ConflictResolver>>,
    backup: HashMap<ElementId, Vec<Parameter>>,
    conflicts: Vec<Conflict>,
}

impl fmt::Debug for OpenTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenTransaction")
            .field("name", &self.name)
            .field("has_resolver", &self.resolver.is_some())
            .field("backed_up", &self.backup.len())
            .field("conflicts", &self.conflicts)
            .finish()
    }
}

/// Host model held entirely in memory.
///
/// Writes require an open transaction. Parameter state touched by a
/// transaction is backed up and restored on rollback or failed commit.
/// Writing a member of a placed group mirrors the value onto the matching
/// member of every other instance of the same group type and raises the
/// corresponding group conflicts.
#[derive(Debug, Default)]
pub struct MemoryModel {
    name: String,
    active_phase: Option<ElementId>,
    levels: Vec<Level>,
    rooms: Vec<RoomRecord>,
    elements: BTreeMap<ElementId, ElementRecord>,
    groups: Vec<GroupRecord>,
    member_of: HashMap<ElementId, ElementId>,
    transaction: Option<OpenTransaction>,
    queued_conflicts: Vec<Conflict>,
    isolated: Vec<ElementId>,
    commits: usize,
    rollbacks: usize,
    writes: usize,
}

impl MemoryModel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn set_active_phase(&mut self, phase: Option<ElementId>) -> &mut Self {
        self.active_phase = phase;
        self
    }

    pub fn insert_level(&mut self, level: Level) -> &mut Self {
        self.levels.push(level);
        self
    }

    pub fn insert_room(
        &mut self,
        room: Room,
        extent: BoundingBox,
        phase: Option<ElementId>,
    ) -> &mut Self {
        self.rooms.push(RoomRecord {
            room,
            extent,
            phase,
        });
        self.rooms.sort_by_key(|r| r.room.id);
        self
    }

    pub fn insert_element(&mut self, element: ElementRecord) -> &mut Self {
        self.elements.insert(element.id, element);
        self
    }

    /// Places a group instance. A bare group element is created when the
    /// instance id is not yet a known element.
    pub fn insert_group(&mut self, instance: GroupInstance, members: Vec<ElementId>) -> &mut Self {
        self.elements
            .entry(instance.id)
            .or_insert_with(|| ElementRecord::new(instance.id, GROUP_CATEGORY).with_name(&instance.name));
        for member in &members {
            self.member_of.insert(*member, instance.id);
        }
        self.groups.push(GroupRecord { instance, members });
        self.groups.sort_by_key(|g| g.instance.id);
        self
    }

    /// Queues a conflict that the next commit raises.
    pub fn queue_conflict(&mut self, conflict: Conflict) {
        self.queued_conflicts.push(conflict);
    }

    #[must_use]
    pub fn parameter_value(&self, element: ElementId, name: &str) -> Option<&str> {
        self.elements
            .get(&element)
            .and_then(|e| e.parameter(name))
            .map(|p| p.value.as_str())
    }

    #[must_use]
    pub fn element(&self, element: ElementId) -> Option<&ElementRecord> {
        self.elements.get(&element)
    }

    #[must_use]
    pub fn isolated(&self) -> &[ElementId] {
        &self.isolated
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.rollbacks
    }

    /// Successful `set_parameter` calls, mirrored writes not included.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Converts a snapshot into a live model.
    pub fn from_snapshot(snapshot: ModelSnapshot) -> Result<Self, SnapshotError> {
        let mut model = Self::new(snapshot.name);
        model.set_active_phase(snapshot.active_phase);
        for level in snapshot.levels {
            model.insert_level(level);
        }
        for record in snapshot.rooms {
            model.insert_room(record.room, record.extent, record.phase);
        }
        for element in snapshot.elements {
            model.insert_element(element);
        }
        for group in snapshot.groups {
            if let Some(missing) = group
                .members
                .iter()
                .find(|m| !model.elements.contains_key(*m))
            {
                return Err(SnapshotError::DanglingReference(*missing));
            }
            model.insert_group(group.instance, group.members);
        }
        Ok(model)
    }

    /// Captures the committed state of the model.
    #[must_use]
    pub fn to_snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            name: self.name.clone(),
            active_phase: self.active_phase,
            levels: self.levels.clone(),
            rooms: self.rooms.clone(),
            elements: self.elements.values().cloned().collect(),
            groups: self.groups.clone(),
        }
    }

    fn group(&self, id: ElementId) -> Option<&GroupRecord> {
        self.groups.iter().find(|g| g.instance.id == id)
    }

    fn instances_of_type(&self, type_id: ElementId) -> impl Iterator<Item = &GroupRecord> {
        self.groups
            .iter()
            .filter(move |g| g.instance.type_id == type_id)
    }

    /// The element plus its counterparts in every other instance of its group type.
    fn mirrored_targets(&self, element: ElementId) -> Vec<ElementId> {
        let mut targets = vec![element];
        let Some(group) = self.member_of.get(&element).and_then(|g| self.group(*g)) else {
            return targets;
        };
        let Some(index) = group.members.iter().position(|m| *m == element) else {
            return targets;
        };
        for peer in self.instances_of_type(group.instance.type_id) {
            if peer.instance.id == group.instance.id {
                continue;
            }
            if let Some(member) = peer.members.get(index) {
                if !targets.contains(member) {
                    targets.push(*member);
                }
            }
        }
        targets
    }

    fn group_conflicts(&self, element: ElementId) -> Vec<Conflict> {
        let Some(group) = self.member_of.get(&element).and_then(|g| self.group(*g)) else {
            return Vec::new();
        };
        let instances = self.instances_of_type(group.instance.type_id).count();
        if instances <= 1 {
            return vec![Conflict {
                kind: ConflictKind::AtomViolationSingleInstance,
                elements: vec![element],
                message: format!(
                    "element {element} edited outside group '{}'",
                    group.instance.name
                ),
            }];
        }
        vec![
            Conflict {
                kind: ConflictKind::AtomViolationMultipleInstances,
                elements: vec![element],
                message: format!(
                    "element {element} edited outside {instances} instances of '{}'",
                    group.instance.type_name
                ),
            },
            Conflict {
                kind: ConflictKind::ModifyingMultipleGroups,
                elements: vec![element],
                message: format!(
                    "edit propagates to {instances} instances of '{}'",
                    group.instance.type_name
                ),
            },
        ]
    }

    fn restore(&mut self, backup: HashMap<ElementId, Vec<Parameter>>) {
        for (id, parameters) in backup {
            if let Some(record) = self.elements.get_mut(&id) {
                record.parameters = parameters;
            }
        }
    }
}

impl ModelHost for MemoryModel {
    fn document_name(&self) -> &str {
        &self.name
    }

    fn elements_in_category(&self, category: &Category) -> Vec<ElementId> {
        self.elements
            .values()
            .filter(|e| &e.category == category)
            .map(|e| e.id)
            .collect()
    }

    fn category(&self, element: ElementId) -> Option<Category> {
        self.elements.get(&element).map(|e| e.category.clone())
    }

    fn bounding_box(&self, element: ElementId) -> Option<BoundingBox> {
        self.elements.get(&element).and_then(|e| e.bounding_box)
    }

    fn location(&self, element: ElementId) -> Option<Location> {
        self.elements.get(&element).and_then(|e| e.location)
    }

    fn parameter(&self, element: ElementId, name: &str) -> Option<Parameter> {
        self.elements
            .get(&element)
            .and_then(|e| e.parameter(name))
            .cloned()
    }

    fn set_parameter(
        &mut self,
        element: ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), HostError> {
        if self.transaction.is_none() {
            return Err(HostError::NoOpenTransaction);
        }
        let record = self
            .elements
            .get(&element)
            .ok_or(HostError::ElementNotFound(element))?;
        if let Some(message) = &record.reject_writes {
            return Err(HostError::WriteRejected {
                element,
                parameter: name.to_string(),
                message: message.clone(),
            });
        }
        let parameter = record
            .parameter(name)
            .ok_or_else(|| HostError::ParameterNotFound {
                element,
                parameter: name.to_string(),
            })?;
        if parameter.read_only {
            return Err(HostError::ReadOnlyParameter {
                element,
                parameter: name.to_string(),
            });
        }

        let targets = self.mirrored_targets(element);
        let conflicts = self.group_conflicts(element);

        let Some(tx) = self.transaction.as_mut() else {
            return Err(HostError::NoOpenTransaction);
        };
        for target in targets {
            let Some(record) = self.elements.get_mut(&target) else {
                continue;
            };
            tx.backup
                .entry(target)
                .or_insert_with(|| record.parameters.clone());
            if let Some(parameter) = record.parameters.iter_mut().find(|p| p.name == name) {
                parameter.value = value.to_string();
            }
        }
        for conflict in conflicts {
            match tx.conflicts.iter_mut().find(|c| c.kind == conflict.kind) {
                Some(existing) => existing.elements.extend(conflict.elements),
                None => tx.conflicts.push(conflict),
            }
        }
        self.writes += 1;
        Ok(())
    }

    fn level_by_name(&self, name: &str) -> Option<Level> {
        self.levels.iter().find(|l| l.name == name).cloned()
    }

    fn active_phase(&self) -> Option<ElementId> {
        self.active_phase
    }

    fn room(&self, id: ElementId) -> Option<Room> {
        self.rooms
            .iter()
            .find(|r| r.room.id == id)
            .map(|r| r.room.clone())
    }

    fn room_reference(&self, element: ElementId, reference: RoomReference) -> Option<ElementId> {
        let record = self.elements.get(&element)?;
        match reference {
            RoomReference::Contained => record.contained_room,
            RoomReference::FromRoom => record.from_room,
            RoomReference::ToRoom => record.to_room,
        }
    }

    fn room_at_point(&self, point: Point3, phase: Option<ElementId>) -> Option<ElementId> {
        self.rooms
            .iter()
            .filter(|r| r.phase.is_none() || phase.is_none() || r.phase == phase)
            .find(|r| r.extent.contains(point))
            .map(|r| r.room.id)
    }

    fn group_instances(&self) -> Vec<GroupInstance> {
        self.groups.iter().map(|g| g.instance.clone()).collect()
    }

    fn group_members(&self, group: ElementId) -> Vec<ElementId> {
        self.group(group)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    fn is_group(&self, element: ElementId) -> bool {
        self.group(element).is_some()
    }

    fn begin_transaction(
        &mut self,
        name: &str,
        resolver: Option<Box<dyn ConflictResolver>>,
    ) -> Result<(), HostError> {
        if let Some(open) = &self.transaction {
            return Err(HostError::TransactionAlreadyOpen(open.name.clone()));
        }
        debug!(transaction = name, "transaction started");
        self.transaction = Some(OpenTransaction {
            name: name.to_string(),
            resolver,
            backup: HashMap::new(),
            conflicts: Vec::new(),
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), HostError> {
        let OpenTransaction {
            name,
            resolver,
            backup,
            mut conflicts,
        } = self.transaction.take().ok_or(HostError::NoOpenTransaction)?;
        conflicts.append(&mut self.queued_conflicts);

        for conflict in &conflicts {
            let resolution = resolver
                .as_ref()
                .map_or(ConflictResolution::PassThrough, |r| r.resolve(conflict));
            if resolution == ConflictResolution::PassThrough {
                debug!(transaction = %name, kind = %conflict.kind, "commit failed, rolling back");
                self.restore(backup);
                self.rollbacks += 1;
                return Err(HostError::UnresolvedConflict {
                    kind: conflict.kind.clone(),
                    message: conflict.message.clone(),
                });
            }
        }

        debug!(transaction = %name, acknowledged = conflicts.len(), "transaction committed");
        self.commits += 1;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), HostError> {
        let tx = self.transaction.take().ok_or(HostError::NoOpenTransaction)?;
        debug!(transaction = %tx.name, "transaction rolled back");
        self.restore(tx.backup);
        self.rollbacks += 1;
        Ok(())
    }

    fn isolate_elements(&mut self, elements: &[ElementId]) -> Result<(), HostError> {
        self.isolated = elements.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct AcceptAll;

    impl ConflictResolver for AcceptAll {
        fn resolve(&self, _conflict: &Conflict) -> ConflictResolution {
            ConflictResolution::Acknowledge
        }
    }

    fn grouped_model() -> MemoryModel {
        let mut model = MemoryModel::new("test");
        for id in [10, 11, 20, 21] {
            model.insert_element(ElementRecord::new(id, "Furniture").with_empty_parameters(&["Mark"]));
        }
        for (id, members) in [
            (1, vec![ElementId(10), ElementId(11)]),
            (2, vec![ElementId(20), ElementId(21)]),
        ] {
            model.insert_group(
                GroupInstance {
                    id: ElementId(id),
                    type_id: ElementId(100),
                    type_name: "Desk Pair".to_string(),
                    name: "Desk Pair".to_string(),
                },
                members,
            );
        }
        model
    }

    #[test]
    fn write_without_transaction_is_rejected() {
        let mut model = grouped_model();
        assert_eq!(
            model.set_parameter(ElementId(10), "Mark", "A"),
            Err(HostError::NoOpenTransaction)
        );
    }

    #[test]
    fn member_write_mirrors_to_peer_instance() {
        let mut model = grouped_model();
        model
            .begin_transaction("mirror", Some(Box::new(AcceptAll)))
            .unwrap();
        model.set_parameter(ElementId(11), "Mark", "B").unwrap();
        model.commit_transaction().unwrap();

        assert_eq!(model.parameter_value(ElementId(11), "Mark"), Some("B"));
        assert_eq!(model.parameter_value(ElementId(21), "Mark"), Some("B"));
        assert_eq!(model.parameter_value(ElementId(10), "Mark"), Some(""));
    }

    #[test]
    fn unresolved_conflict_rolls_back_commit() {
        let mut model = grouped_model();
        model.begin_transaction("no resolver", None).unwrap();
        model.set_parameter(ElementId(10), "Mark", "A").unwrap();
        let err = model.commit_transaction().unwrap_err();

        assert!(matches!(err, HostError::UnresolvedConflict { .. }));
        assert_eq!(model.parameter_value(ElementId(10), "Mark"), Some(""));
        assert_eq!(model.parameter_value(ElementId(20), "Mark"), Some(""));
        assert_eq!(model.rollback_count(), 1);
        assert!(!model.in_transaction());
    }

    #[test]
    fn rollback_restores_previous_values() {
        let mut model = MemoryModel::new("test");
        model.insert_element(
            ElementRecord::new(5, "Walls").with_parameter(Parameter::new("Comments", "old")),
        );
        model.begin_transaction("edit", None).unwrap();
        model.set_parameter(ElementId(5), "Comments", "new").unwrap();
        model.rollback_transaction().unwrap();

        assert_eq!(model.parameter_value(ElementId(5), "Comments"), Some("old"));
    }

    #[test]
    fn second_transaction_cannot_open() {
        let mut model = MemoryModel::new("test");
        model.begin_transaction("first", None).unwrap();
        assert_eq!(
            model.begin_transaction("second", None),
            Err(HostError::TransactionAlreadyOpen("first".to_string()))
        );
    }
}
