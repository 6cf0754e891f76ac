//! Writes query results to disk as CSV or parquet.

mod csv;
mod parquet;
pub mod table;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::{catalog::SimulationRecord, error::Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Parquet,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Parquet => "parquet",
        }
    }
}

/// `<PROJECT>_query.<ext>` inside `dir`.
pub fn file_name(dir: &Path, project: &str, format: Format) -> PathBuf {
    dir.join(format!(
        "{}_query.{}",
        project.to_uppercase(),
        format.extension()
    ))
}

/// Saves the records, named after the project of the first one. Returns
/// `None` when there is nothing to write.
pub fn save(records: &[SimulationRecord], dir: &Path, format: Format) -> Result<Option<PathBuf>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };

    let project = first.project;
    let batch = table::to_batch(project, records)?;
    let file_path = file_name(dir, project.name(), format);

    match format {
        Format::Csv => csv::save(&batch, &file_path)?,
        Format::Parquet => parquet::save(&batch, &file_path)?,
    }
    info!(path = %file_path.display(), rows = records.len(), "query results saved");

    Ok(Some(file_path))
}

// -- Tests -------------------------------------------------------------------
