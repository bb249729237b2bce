//! Room ownership resolution and room parameter assignment.

use super::category_label;
use super::geometry::{representative_point, PointSource};
use super::guard::{ParameterWriteGuard, SkipReason};
use crate::accounting::ProcessingAccountant;
use crate::host::ModelHost;
use crate::model::{ElementId, Room, RoomReference};
use serde::Serialize;
use tracing::trace;

/// How the owning room of an element was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DetectionMethod {
    DirectReference,
    FromRoom,
    ToRoom,
    LocationPoint,
    CurveMidpoint,
    BoundingBoxCenter,
}

impl From<PointSource> for DetectionMethod {
    fn from(source: PointSource) -> Self {
        match source {
            PointSource::LocationPoint => DetectionMethod::LocationPoint,
            PointSource::CurveMidpoint => DetectionMethod::CurveMidpoint,
            PointSource::BoundingBoxCenter => DetectionMethod::BoundingBoxCenter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomResolution {
    pub room: Room,
    pub method: DetectionMethod,
}

/// Resolves the room owning an element. First match wins:
///
/// 1. the element's own contained-in-room reference,
/// 2. for doors and windows, the from-room then the to-room reference,
/// 3. a point-in-room test at the representative point in the active phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomOwnershipResolver {
    phase: Option<ElementId>,
}

impl RoomOwnershipResolver {
    #[must_use]
    pub fn new(phase: Option<ElementId>) -> Self {
        Self { phase }
    }

    /// Resolver bound to the document's active phase.
    #[must_use]
    pub fn for_document<H: ModelHost + ?Sized>(host: &H) -> Self {
        Self::new(host.active_phase())
    }

    #[must_use]
    pub fn resolve<H: ModelHost + ?Sized>(
        &self,
        host: &H,
        element: ElementId,
    ) -> Option<RoomResolution> {
        let referenced = |reference: RoomReference| {
            host.room_reference(element, reference)
                .and_then(|id| host.room(id))
        };

        if let Some(room) = referenced(RoomReference::Contained) {
            return Some(RoomResolution {
                room,
                method: DetectionMethod::DirectReference,
            });
        }

        if host.category(element).is_some_and(|c| c.is_door_like()) {
            if let Some(room) = referenced(RoomReference::FromRoom) {
                return Some(RoomResolution {
                    room,
                    method: DetectionMethod::FromRoom,
                });
            }
            if let Some(room) = referenced(RoomReference::ToRoom) {
                return Some(RoomResolution {
                    room,
                    method: DetectionMethod::ToRoom,
                });
            }
        }

        let (point, source) = representative_point(host, element)?;
        let room = host
            .room_at_point(point, self.phase)
            .and_then(|id| host.room(id))?;
        trace!(%element, room = %room.number, ?source, "room found by point test");
        Some(RoomResolution {
            room,
            method: source.into(),
        })
    }
}

/// Parameters receiving room values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomTargets<'a> {
    pub number: &'a [String],
    pub name: &'a [String],
    /// Receives "number: name".
    pub reference: &'a [String],
}

/// Writes room number, name and combined reference through the guard.
///
/// Returns how many parameters were actually written, so partial writes
/// still count the element as updated.
pub fn assign_room_parameters<H: ModelHost + ?Sized>(
    host: &mut H,
    guard: &mut ParameterWriteGuard,
    accountant: &mut ProcessingAccountant,
    element: ElementId,
    room: &Room,
    targets: &RoomTargets<'_>,
    overwrite: bool,
) -> usize {
    let category = category_label(host, element);
    let reference = room.reference();
    let writes = targets
        .number
        .iter()
        .map(|p| (p, room.number.as_str()))
        .chain(targets.name.iter().map(|p| (p, room.name.as_str())))
        .chain(targets.reference.iter().map(|p| (p, reference.as_str())));

    let mut written = 0;
    for (parameter, value) in writes {
        let result = guard.try_set(host, element, parameter, value, overwrite);
        if accountant.record_assignment(element, &category, parameter, value, &result) {
            written += 1;
        }
    }
    written
}

/// Room field picked for a legacy room parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomField {
    Number,
    Name,
    Reference,
}

impl RoomField {
    #[must_use]
    pub fn value(self, room: &Room) -> String {
        match self {
            RoomField::Number => room.number.clone(),
            RoomField::Name => room.name.clone(),
            RoomField::Reference => room.reference(),
        }
    }
}

/// Maps a legacy room parameter name to the room field it holds.
///
/// "Room Number", "Room No.", "ROOM_NR" hold the number; anything with
/// "name" holds the name; remaining "room"/"ref" names hold the reference.
#[must_use]
pub fn legacy_room_field(parameter: &str) -> Option<RoomField> {
    let lower = parameter.to_lowercase();
    let mut words = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty());

    if lower.contains("number") || words.any(|w| matches!(w, "no" | "nr" | "num")) {
        Some(RoomField::Number)
    } else if lower.contains("name") {
        Some(RoomField::Name)
    } else if lower.contains("room") || lower.contains("ref") {
        Some(RoomField::Reference)
    } else {
        None
    }
}

/// Legacy RoomOnly assignment: the written field is chosen per parameter
/// by [`legacy_room_field`]. Unrecognized names are skipped.
pub fn assign_legacy_room_parameters<H: ModelHost + ?Sized>(
    host: &mut H,
    guard: &mut ParameterWriteGuard,
    accountant: &mut ProcessingAccountant,
    element: ElementId,
    room: &Room,
    targets: &[String],
    overwrite: bool,
) -> usize {
    let category = category_label(host, element);
    let mut written = 0;
    for parameter in targets {
        let Some(field) = legacy_room_field(parameter) else {
            accountant.record_skip(
                element,
                &category,
                SkipReason::UnrecognizedRoomParameter,
                format!("{parameter}: not a room number, name or reference"),
            );
            continue;
        };
        let value = field.value(room);
        let result = guard.try_set(host, element, parameter, &value, overwrite);
        if accountant.record_assignment(element, &category, parameter, &value, &result) {
            written += 1;
        }
    }
    written
}
