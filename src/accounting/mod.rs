//! Processing accountant: an append-only record of every fill decision.

use crate::config::FillMode;
use crate::engine::guard::{ParameterAssignmentResult, SkipReason};
use crate::model::ElementId;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub element_id: ElementId,
    pub category: String,
    pub message: String,
    pub timestamp: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<FillMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

/// Entries of one run, split into success, skip and error buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingLog {
    pub successes: Vec<LogEntry>,
    pub skips: Vec<LogEntry>,
    pub errors: Vec<LogEntry>,
}

impl ProcessingLog {
    #[must_use]
    pub fn skip_reason_counts(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for reason in self.skips.iter().filter_map(|e| e.reason) {
            *counts.entry(reason).or_insert(0) += 1;
        }
        counts
    }

    /// Skip reasons by descending count, ties in reason order.
    #[must_use]
    pub fn skip_reasons_by_count(&self) -> Vec<(SkipReason, usize)> {
        let mut counts: Vec<_> = self.skip_reason_counts().into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts
    }

    /// Distinct skipped element ids per reason, ascending.
    #[must_use]
    pub fn skipped_by_reason(&self) -> BTreeMap<SkipReason, Vec<ElementId>> {
        let mut grouped: BTreeMap<SkipReason, BTreeSet<ElementId>> = BTreeMap::new();
        for entry in &self.skips {
            if let Some(reason) = entry.reason {
                grouped.entry(reason).or_default().insert(entry.element_id);
            }
        }
        grouped
            .into_iter()
            .map(|(reason, ids)| (reason, ids.into_iter().collect()))
            .collect()
    }

    /// Skip entries per reason in recording order.
    #[must_use]
    pub fn skips_grouped(&self) -> BTreeMap<SkipReason, Vec<&LogEntry>> {
        let mut grouped: BTreeMap<SkipReason, Vec<&LogEntry>> = BTreeMap::new();
        for entry in &self.skips {
            if let Some(reason) = entry.reason {
                grouped.entry(reason).or_default().push(entry);
            }
        }
        grouped
    }

    fn count_for_mode(entries: &[LogEntry], mode: FillMode) -> usize {
        entries.iter().filter(|e| e.mode == Some(mode)).count()
    }

    #[must_use]
    pub fn successes_for(&self, mode: FillMode) -> usize {
        Self::count_for_mode(&self.successes, mode)
    }

    #[must_use]
    pub fn skips_for(&self, mode: FillMode) -> usize {
        Self::count_for_mode(&self.skips, mode)
    }

    #[must_use]
    pub fn errors_for(&self, mode: FillMode) -> usize {
        Self::count_for_mode(&self.errors, mode)
    }
}

/// Records successes, skips and errors for one fill operation.
///
/// Every entry is tagged with the mode set through [`set_mode`](Self::set_mode).
#[derive(Debug, Default)]
pub struct ProcessingAccountant {
    log: ProcessingLog,
    mode: Option<FillMode>,
}

impl ProcessingAccountant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: Option<FillMode>) {
        self.mode = mode;
    }

    fn entry(&self, element: ElementId, category: &str, message: String) -> LogEntry {
        LogEntry {
            element_id: element,
            category: category.to_string(),
            message,
            timestamp: Local::now(),
            mode: self.mode,
            reason: None,
            exception: None,
        }
    }

    pub fn record_success(&mut self, element: ElementId, category: &str, message: impl Into<String>) {
        let entry = self.entry(element, category, message.into());
        self.log.successes.push(entry);
    }

    pub fn record_skip(
        &mut self,
        element: ElementId,
        category: &str,
        reason: SkipReason,
        message: impl Into<String>,
    ) {
        let mut entry = self.entry(element, category, message.into());
        entry.reason = Some(reason);
        self.log.skips.push(entry);
    }

    pub fn record_error(
        &mut self,
        element: ElementId,
        category: &str,
        message: impl Into<String>,
        exception: Option<String>,
    ) {
        let mut entry = self.entry(element, category, message.into());
        entry.exception = exception;
        self.log.errors.push(entry);
    }

    /// Records the outcome of one guarded write; returns whether it succeeded.
    pub fn record_assignment(
        &mut self,
        element: ElementId,
        category: &str,
        parameter: &str,
        value: &str,
        result: &ParameterAssignmentResult,
    ) -> bool {
        match result {
            ParameterAssignmentResult::Success => {
                self.record_success(element, category, format!("{parameter} = \"{value}\""));
                true
            }
            ParameterAssignmentResult::Skipped(reason) => {
                self.record_skip(element, category, *reason, format!("{parameter}: {reason}"));
                false
            }
            ParameterAssignmentResult::Failed(reason) => {
                self.record_error(
                    element,
                    category,
                    format!("{parameter}: write failed"),
                    Some(reason.to_string()),
                );
                false
            }
        }
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.log.successes.len()
    }

    #[must_use]
    pub fn skip_count(&self) -> usize {
        self.log.skips.len()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.log.errors.len()
    }

    #[must_use]
    pub fn skip_count_for(&self, reason: SkipReason) -> usize {
        self.log
            .skips
            .iter()
            .filter(|e| e.reason == Some(reason))
            .count()
    }

    #[must_use]
    pub fn log(&self) -> &ProcessingLog {
        &self.log
    }

    #[must_use]
    pub fn into_log(self) -> ProcessingLog {
        self.log
    }
}
