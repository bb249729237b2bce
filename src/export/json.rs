use crate::error::ExportError;
use crate::fill::ProcessingSummary;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the whole [`ProcessingSummary`] as pretty-printed JSON, log
/// entries included.
///
/// # Errors
///
/// Returns [`ExportError::FileCreate`] or [`ExportError::Write`] on I/O
/// failure and [`ExportError::SummaryJson`] when serialization fails.
pub fn export_json<P: AsRef<Path>>(summary: &ProcessingSummary, path: P) -> Result<(), ExportError> {
    let path_ref = path.as_ref();
    let json = serde_json::to_string_pretty(summary)?;

    let mut file = File::create(path_ref).map_err(|source| ExportError::FileCreate {
        path: path_ref.to_path_buf(),
        source,
    })?;

    file.write_all(json.as_bytes())
        .map_err(|source| ExportError::Write {
            path: path_ref.to_path_buf(),
            source,
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FillConfiguration, FillMode, ParameterTargets};
    use crate::fill::FillOrchestrator;
    use crate::host::{ElementRecord, MemoryModel};
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_serializes_with_skip_reasons() {
        let mut model = MemoryModel::new("Annex");
        model.insert_element(ElementRecord::new(4, "Doors").with_empty_parameters(&["Room"]));
        let config = FillConfiguration::new(["Doors"], [FillMode::RoomName].into_iter().collect())
            .with_targets(ParameterTargets {
                room_name: vec!["Room".to_string()],
                ..ParameterTargets::default()
            });
        let summary = FillOrchestrator::new(&mut model)
            .execute_fill(&config, |_, _| {})
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        export_json(&summary, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["document"], "Annex");
        assert_eq!(value["skip_reasons"]["NoRoom"], 1);
        assert_eq!(value["modes"][0]["mode"], "RoomName");
    }
}
