//! Layout of the local catalog database.
//!
//! File paths and per-file extended metadata are shared between projects; each
//! project has its own dataset table and a link table tying files to datasets.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS paths (
    pa_id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS extended_metadata (
    file_id INTEGER PRIMARY KEY REFERENCES paths(pa_id),
    variable TEXT,
    period TEXT
);
CREATE TABLE IF NOT EXISTS cmip5_dataset (
    dataset_id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT,
    product TEXT,
    institute TEXT,
    model TEXT,
    experiment TEXT,
    time_frequency TEXT,
    realm TEXT,
    cmor_table TEXT,
    ensemble TEXT,
    version TEXT,
    r INTEGER,
    i INTEGER,
    p INTEGER
);
CREATE TABLE IF NOT EXISTS cmip5_path (
    file_id INTEGER NOT NULL REFERENCES paths(pa_id),
    dataset_id INTEGER NOT NULL REFERENCES cmip5_dataset(dataset_id)
);
CREATE TABLE IF NOT EXISTS cmip6_dataset (
    dataset_id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT,
    activity_id TEXT,
    institution_id TEXT,
    source_id TEXT,
    source_type TEXT,
    experiment_id TEXT,
    sub_experiment_id TEXT,
    variant_label TEXT,
    member_id TEXT,
    table_id TEXT,
    frequency TEXT,
    realm TEXT,
    variable_id TEXT,
    grid_label TEXT,
    nominal_resolution TEXT,
    version TEXT,
    r INTEGER,
    i INTEGER,
    p INTEGER,
    f INTEGER
);
CREATE TABLE IF NOT EXISTS cmip6_path (
    file_id INTEGER NOT NULL REFERENCES paths(pa_id),
    dataset_id INTEGER NOT NULL REFERENCES cmip6_dataset(dataset_id)
);
"#;

/// Creates any missing catalog table.
pub fn create(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    info!("catalog schema ready");

    Ok(())
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Small in-memory catalogs for tests.

    use rusqlite::{params, Connection};

    use super::create;

    pub struct C5 {
        pub institute: &'static str,
        pub model: &'static str,
        pub experiment: &'static str,
        pub frequency: &'static str,
        pub table: &'static str,
        pub ensemble: &'static str,
        pub version: Option<&'static str>,
    }

    pub fn insert_file(
        conn: &Connection,
        path: &str,
        variable: Option<&str>,
        period: Option<&str>,
    ) -> rusqlite::Result<i64> {
        conn.execute("INSERT INTO paths (path) VALUES (?1)", params![path])?;
        let file_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO extended_metadata (file_id, variable, period) VALUES (?1, ?2, ?3)",
            params![file_id, variable, period],
        )?;

        Ok(file_id)
    }

    pub fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create(&conn).unwrap();
        conn
    }

    pub fn add_cmip5(conn: &Connection, d: &C5, files: &[(&str, &str, Option<&str>)]) {
        conn.execute(
            "INSERT INTO cmip5_dataset (project, product, institute, model, experiment,
                time_frequency, realm, cmor_table, ensemble, version, r, i, p)
             VALUES ('CMIP5', 'output1', ?1, ?2, ?3, ?4, 'atmos', ?5, ?6, ?7, 1, 1, 1)",
            params![d.institute, d.model, d.experiment, d.frequency, d.table, d.ensemble, d.version],
        )
        .unwrap();
        let dataset_id = conn.last_insert_rowid();

        for (path, variable, period) in files {
            let file_id = insert_file(conn, path, Some(*variable), *period).unwrap();
            conn.execute(
                "INSERT INTO cmip5_path (file_id, dataset_id) VALUES (?1, ?2)",
                params![file_id, dataset_id],
            )
            .unwrap();
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_cmip6(
        conn: &Connection,
        source_id: &str,
        experiment_id: &str,
        member_id: &str,
        table_id: &str,
        variable_id: &str,
        frequency: &str,
        files: &[(&str, Option<&str>)],
    ) {
        conn.execute(
            "INSERT INTO cmip6_dataset (project, activity_id, institution_id, source_id,
                source_type, experiment_id, sub_experiment_id, variant_label, member_id,
                table_id, frequency, realm, variable_id, grid_label, nominal_resolution)
             VALUES ('CMIP6', 'CMIP', 'CSIRO-ARCCSS', ?1, 'AOGCM', ?2, 'none', ?3, ?3,
                ?4, ?5, 'atmos', ?6, 'gn', '250 km')",
            params![source_id, experiment_id, member_id, table_id, frequency, variable_id],
        )
        .unwrap();
        let dataset_id = conn.last_insert_rowid();

        for (path, period) in files {
            let file_id = insert_file(conn, path, Some(variable_id), *period).unwrap();
            conn.execute(
                "INSERT INTO cmip6_path (file_id, dataset_id) VALUES (?1, ?2)",
                params![file_id, dataset_id],
            )
            .unwrap();
        }
    }
}

// -- Tests -------------------------------------------------------------------
