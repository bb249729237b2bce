//! Classification, resolution and guarded writing of parameter values.

pub mod geometry;
pub mod group;
pub mod guard;
pub mod level;
pub mod room;

use crate::host::ModelHost;
use crate::model::ElementId;

pub use group::{GroupConflictResolver, GroupFillSummary, GroupIdentityResolver, GroupPreview};
pub use guard::{FailReason, ParameterAssignmentResult, ParameterWriteGuard, SkipReason};
pub use level::{BandClassification, LevelBandClassifier};
pub use room::{DetectionMethod, RoomOwnershipResolver, RoomResolution, RoomTargets};

/// Category name used in log entries.
pub(crate) fn category_label<H: ModelHost + ?Sized>(host: &H, element: ElementId) -> String {
    host.category(element)
        .map_or_else(|| "Unknown".to_string(), |c| c.to_string())
}
