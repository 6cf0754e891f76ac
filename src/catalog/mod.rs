//! The local SQLite catalog of CMIP files.

pub mod aggregate;
pub mod query;
pub mod record;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::Result;

pub use query::CatalogQuery;
pub use record::{Column, SimulationRecord};

/// Opens an existing catalog for querying.
pub fn open(path: &Path) -> Result<Connection> {
    debug!(path = %path.display(), "opening catalog");
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    Ok(conn)
}

/// Creates a catalog at `path`, or adds missing tables to an existing one.
pub fn init(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    schema::create(&conn)?;
    info!(path = %path.display(), "catalog initialised");

    Ok(())
}

// -- Tests -------------------------------------------------------------------
