use crate::accounting::ProcessingLog;
use crate::config::FillMode;
use crate::engine::{DetectionMethod, GroupFillSummary, GroupPreview, SkipReason};
use crate::model::ElementId;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelPreview {
    pub in_band: usize,
    pub below_band: usize,
    pub above_band: usize,
    pub no_bounding_box: usize,
    /// In-band elements with at least one writable target parameter.
    pub would_update: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoomPreview {
    pub with_room: usize,
    pub without_room: usize,
    pub unique_rooms: usize,
    pub by_method: BTreeMap<DetectionMethod, usize>,
    /// Elements with a room and at least one writable room parameter.
    pub would_update: usize,
}

/// Read-only estimate produced without opening a mutation boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewSummary {
    pub document: String,
    /// False when validation failed; only `warnings` is filled then.
    pub valid: bool,
    pub warnings: Vec<String>,
    pub elements_scanned: usize,
    pub elements_per_category: BTreeMap<String, usize>,
    pub level: Option<LevelPreview>,
    pub rooms: Option<RoomPreview>,
    pub groups: Option<GroupPreview>,
    pub duration: Duration,
}

impl PreviewSummary {
    pub(crate) fn invalid(document: &str, warning: String, duration: Duration) -> Self {
        Self {
            document: document.to_string(),
            valid: false,
            warnings: vec![warning],
            duration,
            ..Self::default()
        }
    }
}

/// Counters of one committed mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeSummary {
    pub mode: FillMode,
    pub elements_processed: usize,
    pub elements_updated: usize,
    pub successes: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration: Duration,
}

/// Result of an executed fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub document: String,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    pub elements_scanned: usize,
    pub elements_updated: usize,
    pub successful_writes: usize,
    pub skipped: usize,
    pub errors: usize,
    pub skip_reasons: BTreeMap<SkipReason, usize>,
    pub modes: Vec<ModeSummary>,
    pub rooms_touched: usize,
    pub group_types_touched: usize,
    pub group_fills: Vec<GroupFillSummary>,
    pub warnings: Vec<String>,
    pub skipped_elements: BTreeMap<SkipReason, Vec<ElementId>>,
    pub log: ProcessingLog,
}

impl ProcessingSummary {
    #[must_use]
    pub fn mode(&self, mode: FillMode) -> Option<&ModeSummary> {
        self.modes.iter().find(|m| m.mode == mode)
    }

    #[must_use]
    pub fn skip_count(&self, reason: SkipReason) -> usize {
        self.skip_reasons.get(&reason).copied().unwrap_or(0)
    }
}

impl fmt::Display for PreviewSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Preview of '{}'", self.document)?;
        if !self.valid {
            for warning in &self.warnings {
                writeln!(f, "  ! {warning}")?;
            }
            return Ok(());
        }
        writeln!(f, "  Elements scanned: {}", self.elements_scanned)?;
        for (category, count) in &self.elements_per_category {
            writeln!(f, "    {category}: {count}")?;
        }
        if let Some(level) = &self.level {
            writeln!(
                f,
                "  Level band: {} in band ({} writable), {} below, {} above, {} without bounding box",
                level.in_band, level.would_update, level.below_band, level.above_band, level.no_bounding_box
            )?;
        }
        if let Some(rooms) = &self.rooms {
            writeln!(
                f,
                "  Rooms: {} with room ({} writable) in {} rooms, {} without room",
                rooms.with_room, rooms.would_update, rooms.unique_rooms, rooms.without_room
            )?;
        }
        if let Some(groups) = &self.groups {
            writeln!(
                f,
                "  Groups: {} instances of {} types, {} members to visit, {} nested",
                groups.instances, groups.group_types, groups.members_to_visit, groups.nested_members
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "  ! {warning}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Filled '{}' in {:.2}s",
            self.document,
            self.duration.as_secs_f64()
        )?;
        writeln!(
            f,
            "  {} of {} elements updated, {} writes, {} skipped, {} errors",
            self.elements_updated,
            self.elements_scanned,
            self.successful_writes,
            self.skipped,
            self.errors
        )?;
        for mode in &self.modes {
            writeln!(
                f,
                "  {}: {} updated, {} skipped, {} errors",
                mode.mode, mode.elements_updated, mode.skipped, mode.errors
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "  ! {warning}")?;
        }
        Ok(())
    }
}
