use super::memory::{ElementRecord, GroupRecord, MemoryModel, RoomRecord};
use crate::error::SnapshotError;
use crate::model::{ElementId, Level};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Serializable state of a host model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub name: String,
    #[serde(default)]
    pub active_phase: Option<ElementId>,
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default)]
    pub rooms: Vec<RoomRecord>,
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
}

/// Loads a JSON model snapshot into a [`MemoryModel`].
///
/// # Errors
///
/// Returns [`SnapshotError::FileRead`] if the file cannot be read,
/// [`SnapshotError::Json`] if it is not a valid snapshot and
/// [`SnapshotError::DanglingReference`] if a group lists an unknown member.
///
/// # Example
///
/// ```no_run
/// use param_autofill::host::{load_snapshot, ModelHost};
///
/// let model = load_snapshot("model.json")?;
/// println!("Document: {}", model.document_name());
/// # Ok::<(), param_autofill::error::SnapshotError>(())
/// ```
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<MemoryModel, SnapshotError> {
    let content = std::fs::read_to_string(&path).map_err(|source| SnapshotError::FileRead {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    let snapshot: ModelSnapshot = serde_json::from_str(&content)?;
    MemoryModel::from_snapshot(snapshot)
}

/// Writes the committed state of `model` as pretty JSON.
pub fn save_snapshot<P: AsRef<Path>>(model: &MemoryModel, path: P) -> Result<(), SnapshotError> {
    let path_ref = path.as_ref();
    let json = serde_json::to_string_pretty(&model.to_snapshot())?;

    let mut file = File::create(path_ref).map_err(|source| SnapshotError::FileCreate {
        path: path_ref.to_path_buf(),
        source,
    })?;

    file.write_all(json.as_bytes())
        .map_err(|source| SnapshotError::FileCreate {
            path: path_ref.to_path_buf(),
            source,
        })?;

    Ok(())
}
