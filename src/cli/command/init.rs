use anyhow::Result;

use crate::{catalog, settings::Settings};

/// Creates the catalog tables at the configured path.
pub fn init_catalog(settings: &Settings) -> Result<String> {
    catalog::init(&settings.catalog.path)?;

    Ok(settings.catalog.path.to_string_lossy().to_string())
}

// -- Tests -------------------------------------------------------------------
