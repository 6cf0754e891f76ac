//! Dataset-level identifiers shared by the local catalog and ESGF.

use std::{fmt, str::FromStr};

use crate::{
    catalog::SimulationRecord,
    error::{FinderError, Result},
    facet::{Facet, Project},
    vocabulary::Vocabulary,
};

/// Dot-delimited dataset identifier, e.g.
/// `CMIP6.CMIP.CSIRO-ARCCSS.ACCESS-CM2.historical.r1i1p1f1.Amon.tas.gn.v20191108`.
///
/// Equality ignores the data node a replica was published from, so copies of
/// one dataset compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatasetId {
    project: Project,
    /// Facet values between the project and the version.
    values: Vec<String>,
    /// Without the leading `v`.
    version: String,
}

/// Facets of the identifier between project and version, in order.
pub fn id_facets(project: Project) -> &'static [Facet] {
    match project {
        Project::Cmip5 => &[
            Facet::Product,
            Facet::Institute,
            Facet::Model,
            Facet::Experiment,
            Facet::TimeFrequency,
            Facet::Realm,
            Facet::CmorTable,
            Facet::Ensemble,
        ],
        Project::Cmip6 => &[
            Facet::ActivityId,
            Facet::InstitutionId,
            Facet::SourceId,
            Facet::ExperimentId,
            Facet::MemberId,
            Facet::TableId,
            Facet::VariableId,
            Facet::GridLabel,
        ],
    }
}

fn project_segment(project: Project) -> &'static str {
    match project {
        Project::Cmip5 => "cmip5",
        Project::Cmip6 => "CMIP6",
    }
}

impl DatasetId {
    pub fn new(project: Project, values: Vec<String>, version: &str) -> Result<Self> {
        if values.len() != id_facets(project).len() {
            return Err(FinderError::MalformedDatasetId(format!(
                "{project} id needs {} facet values, got {}",
                id_facets(project).len(),
                values.len()
            )));
        }

        Ok(DatasetId {
            project,
            values,
            version: version.trim_start_matches('v').to_string(),
        })
    }

    /// Builds the id of the dataset a local record belongs to. CMIP5 model
    /// names are written in their filename-safe form. `None` when the record
    /// lacks a facet or its version.
    pub fn from_record(record: &SimulationRecord, vocabulary: &Vocabulary) -> Option<Self> {
        let mut values = Vec::with_capacity(id_facets(record.project).len());
        for facet in id_facets(record.project) {
            let value = record.facet(*facet)?;
            if *facet == Facet::Model {
                values.extend(vocabulary.fix_model(&[value], true));
            } else {
                values.push(value.to_string());
            }
        }

        let version = record.version.as_deref()?;
        DatasetId::new(record.project, values, version).ok()
    }

    pub fn project(&self) -> Project {
        self.project
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    #[cfg(test)]
    pub fn get(&self, facet: Facet) -> Option<&str> {
        id_facets(self.project)
            .iter()
            .position(|f| *f == facet)
            .map(|idx| self.values[idx].as_str())
    }

    /// Key/value view of the id, in identifier order.
    pub fn facets(&self) -> Vec<(&'static str, &str)> {
        let mut out = vec![("project", project_segment(self.project))];
        out.extend(
            id_facets(self.project)
                .iter()
                .zip(&self.values)
                .map(|(f, v)| (f.key(), v.as_str())),
        );
        out.push(("version", self.version.as_str()));

        out
    }
}

impl FromStr for DatasetId {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.split('|').next().unwrap_or_default();
        let mut parts: Vec<&str> = id.split('.').collect();

        let project = parts
            .first()
            .ok_or_else(|| FinderError::MalformedDatasetId(s.to_string()))?
            .parse::<Project>()
            .map_err(|_| FinderError::MalformedDatasetId(s.to_string()))?;

        if parts.len() != id_facets(project).len() + 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(FinderError::MalformedDatasetId(s.to_string()));
        }

        let version = parts.pop().unwrap_or_default();
        let values = parts[1..].iter().map(|p| p.to_string()).collect();

        DatasetId::new(project, values, version)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.v{}",
            project_segment(self.project),
            self.values.join("."),
            self.version
        )
    }
}

// -- Tests -------------------------------------------------------------------
