use crate::error::ExportError;
use crate::fill::ProcessingSummary;
use std::fs::File;
use std::path::Path;

/// One row per skip entry: `Reason, Element Id, Category, Message`.
///
/// # Errors
///
/// Returns [`ExportError`] when the file cannot be created or a row fails.
pub fn export_csv<P: AsRef<Path>>(summary: &ProcessingSummary, path: P) -> Result<(), ExportError> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref).map_err(|source| ExportError::FileCreate {
        path: path_ref.to_path_buf(),
        source,
    })?;

    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(["Reason", "Element Id", "Category", "Message"])?;

    for (reason, entries) in summary.log.skips_grouped() {
        for entry in entries {
            writer.write_record([
                reason.as_str(),
                entry.element_id.to_string().as_str(),
                entry.category.as_str(),
                entry.message.as_str(),
            ])?;
        }
    }

    writer.flush().map_err(|source| ExportError::Write {
        path: path_ref.to_path_buf(),
        source,
    })?;

    Ok(())
}
