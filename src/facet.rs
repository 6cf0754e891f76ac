//! Projects, facets and validated facet constraints.
//!
//! CMIP5 and CMIP6 do not share a facet schema, so every facet a catalog row
//! or a constraint can carry is one variant of [`Facet`] and each [`Project`]
//! states which of them it accepts.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use crate::error::{FinderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Project {
    Cmip5,
    Cmip6,
}

impl Project {
    pub fn name(&self) -> &'static str {
        match self {
            Project::Cmip5 => "CMIP5",
            Project::Cmip6 => "CMIP6",
        }
    }

    /// Keys a user may constrain a query with.
    pub fn constraint_keys(&self) -> &'static [Facet] {
        match self {
            Project::Cmip5 => &[
                Facet::Experiment,
                Facet::ExperimentFamily,
                Facet::Model,
                Facet::CmorTable,
                Facet::Variable,
                Facet::Ensemble,
                Facet::TimeFrequency,
                Facet::Realm,
                Facet::Institute,
            ],
            Project::Cmip6 => &[
                Facet::ActivityId,
                Facet::ExperimentId,
                Facet::SubExperimentId,
                Facet::SourceType,
                Facet::TableId,
                Facet::SourceId,
                Facet::VariableId,
                Facet::MemberId,
                Facet::VariantLabel,
                Facet::GridLabel,
                Facet::NominalResolution,
                Facet::Frequency,
                Facet::Realm,
                Facet::InstitutionId,
            ],
        }
    }

    /// Metadata columns carried by every simulation record of the project.
    pub fn record_facets(&self) -> &'static [Facet] {
        match self {
            Project::Cmip5 => &[
                Facet::Project,
                Facet::Product,
                Facet::Institute,
                Facet::Model,
                Facet::Experiment,
                Facet::TimeFrequency,
                Facet::Realm,
                Facet::CmorTable,
                Facet::Ensemble,
                Facet::Variable,
            ],
            Project::Cmip6 => &[
                Facet::Project,
                Facet::ActivityId,
                Facet::InstitutionId,
                Facet::SourceId,
                Facet::SourceType,
                Facet::ExperimentId,
                Facet::SubExperimentId,
                Facet::VariantLabel,
                Facet::MemberId,
                Facet::TableId,
                Facet::Frequency,
                Facet::Realm,
                Facet::VariableId,
                Facet::GridLabel,
                Facet::NominalResolution,
            ],
        }
    }

    /// Looks a key up among the constraint keys and record columns.
    pub fn facet(&self, key: &str) -> Option<Facet> {
        self.constraint_keys()
            .iter()
            .chain(self.record_facets())
            .find(|f| f.key() == key)
            .copied()
    }

    pub fn model_facet(&self) -> Facet {
        match self {
            Project::Cmip5 => Facet::Model,
            Project::Cmip6 => Facet::SourceId,
        }
    }

    pub fn member_facet(&self) -> Facet {
        match self {
            Project::Cmip5 => Facet::Ensemble,
            Project::Cmip6 => Facet::MemberId,
        }
    }

    pub fn frequency_facet(&self) -> Facet {
        match self {
            Project::Cmip5 => Facet::TimeFrequency,
            Project::Cmip6 => Facet::Frequency,
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Project {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "CMIP5" => Ok(Project::Cmip5),
            "CMIP6" => Ok(Project::Cmip6),
            _ => Err(FinderError::UnknownProject(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Facet {
    Project,
    Product,
    ActivityId,
    Institute,
    InstitutionId,
    Model,
    SourceId,
    SourceType,
    Experiment,
    ExperimentFamily,
    ExperimentId,
    SubExperimentId,
    Ensemble,
    VariantLabel,
    MemberId,
    TimeFrequency,
    Frequency,
    Realm,
    CmorTable,
    TableId,
    Variable,
    VariableId,
    GridLabel,
    NominalResolution,
}

impl Facet {
    /// Column / query-term name of the facet.
    pub fn key(&self) -> &'static str {
        match self {
            Facet::Project => "project",
            Facet::Product => "product",
            Facet::ActivityId => "activity_id",
            Facet::Institute => "institute",
            Facet::InstitutionId => "institution_id",
            Facet::Model => "model",
            Facet::SourceId => "source_id",
            Facet::SourceType => "source_type",
            Facet::Experiment => "experiment",
            Facet::ExperimentFamily => "experiment_family",
            Facet::ExperimentId => "experiment_id",
            Facet::SubExperimentId => "sub_experiment_id",
            Facet::Ensemble => "ensemble",
            Facet::VariantLabel => "variant_label",
            Facet::MemberId => "member_id",
            Facet::TimeFrequency => "time_frequency",
            Facet::Frequency => "frequency",
            Facet::Realm => "realm",
            Facet::CmorTable => "cmor_table",
            Facet::TableId => "table_id",
            Facet::Variable => "variable",
            Facet::VariableId => "variable_id",
            Facet::GridLabel => "grid_label",
            Facet::NominalResolution => "nominal_resolution",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The set of facet keys accepted as constraints for `project`.
pub fn valid_keys(project: Project) -> BTreeSet<&'static str> {
    project.constraint_keys().iter().map(Facet::key).collect()
}

/// Returns the supplied entries, failing on the first key outside `valid_keys`.
pub fn check_keys<V: Clone>(
    valid_keys: &BTreeSet<&str>,
    supplied: &BTreeMap<String, V>,
) -> Result<BTreeMap<String, V>> {
    if let Some(key) = supplied.keys().find(|k| !valid_keys.contains(k.as_str())) {
        return Err(FinderError::UnknownFacet(key.clone()));
    }

    Ok(supplied.clone())
}

/// Facet constraints for one project. Values under one key are OR-combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetConstraints {
    project: Project,
    terms: BTreeMap<Facet, Vec<String>>,
}

impl FacetConstraints {
    pub fn builder(project: Project) -> ConstraintsBuilder {
        ConstraintsBuilder {
            project,
            terms: BTreeMap::new(),
        }
    }

    /// Builds constraints from loosely-typed key/value pairs.
    pub fn from_map(project: Project, supplied: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let args = check_keys(&valid_keys(project), supplied)?;
        let mut builder = Self::builder(project);
        for (key, values) in &args {
            builder = builder.add(key, values)?;
        }

        Ok(builder.build())
    }

    pub fn project(&self) -> Project {
        self.project
    }

    pub fn get(&self, facet: Facet) -> Option<&[String]> {
        self.terms.get(&facet).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Facet, &[String])> {
        self.terms.iter().map(|(f, v)| (*f, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Replaces the values of one facet, keeping the key if it is present.
    pub fn map_values<F>(&mut self, facet: Facet, f: F)
    where
        F: FnOnce(&[String]) -> Vec<String>,
    {
        if let Some(values) = self.terms.get_mut(&facet) {
            *values = f(values);
        }
    }

    /// Splits the constraints into one single-valued constraint set per
    /// combination of requested values.
    pub fn combinations(&self) -> Vec<FacetConstraints> {
        let mut combos = vec![BTreeMap::new()];
        for (facet, values) in &self.terms {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut c: BTreeMap<Facet, Vec<String>> = combo.clone();
                    c.insert(*facet, vec![value.clone()]);
                    next.push(c);
                }
            }
            combos = next;
        }

        combos
            .into_iter()
            .map(|terms| FacetConstraints {
                project: self.project,
                terms,
            })
            .collect()
    }
}

impl fmt::Display for FacetConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project={}", self.project)?;
        for (facet, values) in &self.terms {
            write!(f, " {}={}", facet, values.join(","))?;
        }

        Ok(())
    }
}

pub struct ConstraintsBuilder {
    project: Project,
    terms: BTreeMap<Facet, Vec<String>>,
}

impl ConstraintsBuilder {
    /// Adds values under `key`. Unknown keys are rejected here, before any query
    /// is built. An empty value list leaves the key unconstrained.
    pub fn add<S: AsRef<str>>(mut self, key: &str, values: &[S]) -> Result<Self> {
        let facet = self
            .project
            .constraint_keys()
            .iter()
            .find(|f| f.key() == key)
            .copied()
            .ok_or_else(|| FinderError::UnknownFacet(key.to_string()))?;

        if !values.is_empty() {
            let entry = self.terms.entry(facet).or_default();
            for v in values {
                let v = v.as_ref().to_string();
                if !entry.contains(&v) {
                    entry.push(v);
                }
            }
        }

        Ok(self)
    }

    pub fn build(self) -> FacetConstraints {
        FacetConstraints {
            project: self.project,
            terms: self.terms,
        }
    }
}

// -- Tests -------------------------------------------------------------------
