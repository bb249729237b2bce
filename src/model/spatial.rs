use super::ElementId;
use serde::{Deserialize, Serialize};

/// Named vertical reference plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: ElementId,
    pub name: String,
    pub elevation: f64,
}

impl Level {
    #[must_use]
    pub fn new(id: impl Into<ElementId>, name: impl Into<String>, elevation: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            elevation,
        }
    }
}

/// Numbered spatial enclosure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: ElementId,
    pub number: String,
    pub name: String,
}

impl Room {
    #[must_use]
    pub fn new(id: impl Into<ElementId>, number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number: number.into(),
            name: name.into(),
        }
    }

    /// Combined "number: name" reference value.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}: {}", self.number, self.name)
    }
}

/// Which room relation of an element to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomReference {
    /// The element's own contained-in-room reference.
    Contained,
    FromRoom,
    ToRoom,
}
