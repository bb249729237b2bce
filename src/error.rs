//! Error types for the parameter auto-fill engine.

use crate::config::FillMode;
use crate::host::ConflictKind;
use crate::model::ElementId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a fill configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read configuration '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for a fill configuration.
    #[error("invalid configuration: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    #[error("no fill mode selected")]
    NoModes,

    #[error("no element category selected")]
    NoCategories,

    /// Level mode needs both band levels.
    #[error("{role} level is required for level fill")]
    MissingLevel { role: &'static str },

    #[error("{role} level '{name}' does not exist in the model")]
    UnknownLevel { role: &'static str, name: String },

    #[error(
        "base level '{base}' ({base_elevation}) must be below top level '{top}' ({top_elevation})"
    )]
    InvertedLevels {
        base: String,
        base_elevation: f64,
        top: String,
        top_elevation: f64,
    },

    #[error("no target parameter configured for {mode} mode")]
    NoTargets { mode: FillMode },

    #[error("empty target parameter name in {mode} mode")]
    EmptyParameterName { mode: FillMode },
}

/// Errors reported by the model host.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    #[error("element {0} not found")]
    ElementNotFound(ElementId),

    #[error("parameter '{parameter}' not found on element {element}")]
    ParameterNotFound {
        element: ElementId,
        parameter: String,
    },

    #[error("parameter '{parameter}' on element {element} is read-only")]
    ReadOnlyParameter {
        element: ElementId,
        parameter: String,
    },

    /// The host refused the write.
    #[error("write to '{parameter}' on element {element} rejected: {message}")]
    WriteRejected {
        element: ElementId,
        parameter: String,
        message: String,
    },

    #[error("no open transaction")]
    NoOpenTransaction,

    #[error("transaction '{0}' is already open")]
    TransactionAlreadyOpen(String),

    /// Commit failed because a conflict was not acknowledged; the host rolled back.
    #[error("unresolved {kind} conflict: {message}")]
    UnresolvedConflict { kind: ConflictKind, message: String },
}

/// Errors that abort a fill operation.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("invalid fill configuration: {0}")]
    Config(#[from] ConfigError),

    /// A mode's mutation boundary was rolled back. Modes in `committed`
    /// stay applied.
    #[error("{mode} fill aborted and rolled back: {source}")]
    ModeAborted {
        mode: FillMode,
        committed: Vec<FillMode>,
        source: HostError,
    },
}

/// Errors that can occur when loading or saving a model snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Failed to read the snapshot file from disk.
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the output file.
    #[error("failed to create file '{path}': {source}")]
    FileCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot JSON is malformed.
    #[error("invalid model snapshot: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A group or reference points at an element that is not in the snapshot.
    #[error("snapshot references unknown element {0}")]
    DanglingReference(ElementId),
}

/// Failures while writing the report, the skipped-elements CSV or the
/// summary JSON. The model itself is never touched by an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The export file could not be created, usually because its directory
    /// is missing or read-only.
    #[error("cannot create export file '{path}': {source}")]
    FileCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file was created but writing or flushing its contents failed.
    #[error("cannot write export '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The processing summary could not be serialized to JSON.
    #[error("cannot serialize processing summary: {source}")]
    SummaryJson {
        #[from]
        source: serde_json::Error,
    },

    /// A skipped-element row could not be written to the CSV.
    #[error("cannot write skipped-elements CSV: {source}")]
    SkipCsv {
        #[from]
        source: csv::Error,
    },
}
