//! The single gate through which parameter values are written.

use crate::host::ModelHost;
use crate::model::ElementId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Non-fatal explanation for an element or parameter not being updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkipReason {
    ParameterMissing,
    ParameterReadOnly,
    ExistingValueNoOverwrite,
    NoBoundingBox,
    BelowBand,
    AboveBand,
    NoRoom,
    NoGroup,
    NestedGroup,
    UnmappedCategory,
    UnrecognizedRoomParameter,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ParameterMissing => "ParameterMissing",
            SkipReason::ParameterReadOnly => "ParameterReadOnly",
            SkipReason::ExistingValueNoOverwrite => "ExistingValueNoOverwrite",
            SkipReason::NoBoundingBox => "NoBoundingBox",
            SkipReason::BelowBand => "BelowBand",
            SkipReason::AboveBand => "AboveBand",
            SkipReason::NoRoom => "NoRoom",
            SkipReason::NoGroup => "NoGroup",
            SkipReason::NestedGroup => "NestedGroup",
            SkipReason::UnmappedCategory => "UnmappedCategory",
            SkipReason::UnrecognizedRoomParameter => "UnrecognizedRoomParameter",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailReason {
    /// The host write call returned an error.
    WriteException(String),
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::WriteException(message) => write!(f, "WriteException: {message}"),
        }
    }
}

/// Outcome of one (element, parameter) write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterAssignmentResult {
    Success,
    Skipped(SkipReason),
    Failed(FailReason),
}

impl ParameterAssignmentResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ParameterAssignmentResult::Success)
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, ParameterAssignmentResult::Failed(_))
    }
}

/// Existence, writability and overwrite-policy checks in front of every write.
#[derive(Debug, Default)]
pub struct ParameterWriteGuard {
    attempts: usize,
}

impl ParameterWriteGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`try_set`](Self::try_set) calls so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Runs the pre-write checks without writing.
    pub fn check<H: ModelHost + ?Sized>(
        host: &H,
        element: ElementId,
        parameter: &str,
        overwrite: bool,
    ) -> Result<(), SkipReason> {
        let current = host
            .parameter(element, parameter)
            .ok_or(SkipReason::ParameterMissing)?;
        if current.read_only {
            return Err(SkipReason::ParameterReadOnly);
        }
        if !overwrite && current.has_value() {
            return Err(SkipReason::ExistingValueNoOverwrite);
        }
        Ok(())
    }

    /// Writes `value` if the checks pass. Host write errors become
    /// [`ParameterAssignmentResult::Failed`], never a propagated error.
    pub fn try_set<H: ModelHost + ?Sized>(
        &mut self,
        host: &mut H,
        element: ElementId,
        parameter: &str,
        value: &str,
        overwrite: bool,
    ) -> ParameterAssignmentResult {
        self.attempts += 1;
        if let Err(reason) = Self::check(host, element, parameter, overwrite) {
            return ParameterAssignmentResult::Skipped(reason);
        }
        match host.set_parameter(element, parameter, value) {
            Ok(()) => ParameterAssignmentResult::Success,
            Err(err) => {
                debug!(%element, parameter, error = %err, "parameter write failed");
                ParameterAssignmentResult::Failed(FailReason::WriteException(err.to_string()))
            }
        }
    }
}
