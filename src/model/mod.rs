pub mod element;
pub mod geometry;
pub mod group;
pub mod spatial;

pub use element::{Category, ElementId, Parameter};
pub use geometry::{BoundingBox, Curve, Location, Point3};
pub use group::GroupInstance;
pub use spatial::{Level, Room, RoomReference};
