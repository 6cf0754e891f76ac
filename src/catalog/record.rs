//! Rows as read from the catalog and the simulation records built from them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::{
    error::{FinderError, Result},
    facet::{Facet, Project},
    period::PeriodInterval,
};

/// One catalogued file.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    /// Path as stored in the catalog, filename included.
    pub path: String,
    pub facets: BTreeMap<Facet, String>,
    pub version: Option<String>,
    pub variable: Option<String>,
    pub period: Option<String>,
}

/// One simulation directory.
///
/// Aggregation over the files of a directory: `filenames` and `periods` are
/// collected from every file, every other field takes the value of the first
/// file seen (they are constant within a directory).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRecord {
    pub project: Project,
    /// Canonical directory.
    pub path: String,
    pub version: Option<String>,
    pub filenames: BTreeSet<String>,
    pub periods: Vec<PeriodInterval>,
    pub fdate: Option<NaiveDate>,
    pub tdate: Option<NaiveDate>,
    pub time_complete: bool,
    pub facets: BTreeMap<Facet, String>,
}

impl SimulationRecord {
    pub fn new(project: Project, path: impl Into<String>) -> Self {
        SimulationRecord {
            project,
            path: path.into(),
            version: None,
            filenames: BTreeSet::new(),
            periods: Vec::new(),
            fdate: None,
            tdate: None,
            time_complete: false,
            facets: BTreeMap::new(),
        }
    }

    pub fn with_facet(mut self, facet: Facet, value: impl Into<String>) -> Self {
        self.facets.insert(facet, value.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn facet(&self, facet: Facet) -> Option<&str> {
        self.facets.get(&facet).map(String::as_str)
    }

    pub fn value(&self, column: Column) -> Option<&str> {
        match column {
            Column::Facet(f) => self.facet(f),
            Column::Version => self.version.as_deref(),
            Column::Path => Some(self.path.as_str()),
        }
    }
}

/// A field of a simulation record that can be grouped or combined on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Facet(Facet),
    Version,
    Path,
}

impl Column {
    pub fn parse(project: Project, key: &str) -> Result<Self> {
        match key {
            "version" => Ok(Column::Version),
            "path" => Ok(Column::Path),
            _ => project
                .facet(key)
                .map(Column::Facet)
                .ok_or_else(|| FinderError::UnknownFacet(key.to_string())),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Column::Facet(f) => f.key(),
            Column::Version => "version",
            Column::Path => "path",
        }
    }
}

// -- Tests -------------------------------------------------------------------
