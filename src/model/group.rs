use super::ElementId;
use serde::{Deserialize, Serialize};

/// One placed instance of a group definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInstance {
    pub id: ElementId,
    /// Identity shared by every instance of the same definition.
    pub type_id: ElementId,
    pub type_name: String,
    pub name: String,
}
