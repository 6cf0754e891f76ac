//! Static facet vocabularies used to validate constraints before any query
//! reaches the catalog or ESGF.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{FinderError, Result},
    facet::{Facet, FacetConstraints, Project},
};

const CMIP5_VOCABULARY: &str = include_str!("../data/CMIP5_validation.json");
const CMIP6_VOCABULARY: &str = include_str!("../data/CMIP6_validation.json");

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    realms: Vec<String>,
    frequencies: Vec<String>,
    tables: Vec<String>,
    #[serde(default)]
    activities: Vec<String>,
    #[serde(default)]
    source_types: Vec<String>,
    #[serde(default)]
    model_aliases: BTreeMap<String, String>,
    #[serde(default)]
    families: BTreeMap<String, Vec<String>>,
}

/// Allowed values per facet for one project. Facets without an entry are open;
/// model, variable and experiment never have one.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    project: Project,
    values: BTreeMap<Facet, BTreeSet<String>>,
    // filename-safe spelling -> catalog spelling
    model_aliases: BTreeMap<String, String>,
    families: BTreeMap<String, Vec<String>>,
}

impl Vocabulary {
    pub fn load(project: Project) -> Result<Self> {
        let json = match project {
            Project::Cmip5 => CMIP5_VOCABULARY,
            Project::Cmip6 => CMIP6_VOCABULARY,
        };

        Self::from_json(project, json)
    }

    pub fn from_json(project: Project, json: &str) -> Result<Self> {
        let file: VocabularyFile =
            serde_json::from_str(json).map_err(|e| FinderError::Vocabulary(e.to_string()))?;

        let mut values = BTreeMap::new();
        let to_set = |v: Vec<String>| v.into_iter().collect::<BTreeSet<_>>();

        values.insert(Facet::Realm, to_set(file.realms));
        match project {
            Project::Cmip5 => {
                values.insert(Facet::TimeFrequency, to_set(file.frequencies));
                values.insert(Facet::CmorTable, to_set(file.tables));
                values.insert(
                    Facet::ExperimentFamily,
                    file.families.keys().cloned().collect(),
                );
            }
            Project::Cmip6 => {
                values.insert(Facet::Frequency, to_set(file.frequencies));
                values.insert(Facet::TableId, to_set(file.tables));
                values.insert(Facet::ActivityId, to_set(file.activities));
                values.insert(Facet::SourceType, to_set(file.source_types));
            }
        }

        debug!(project = %project, facets = values.len(), "vocabulary loaded");

        Ok(Vocabulary {
            project,
            values,
            model_aliases: file.model_aliases,
            families: file.families,
        })
    }

    pub fn project(&self) -> Project {
        self.project
    }

    pub fn allowed(&self, facet: Facet) -> Option<&BTreeSet<String>> {
        self.values.get(&facet)
    }

    /// Glob patterns making up a CMIP5 experiment family.
    pub fn family_patterns(&self, family: &str) -> Option<&[String]> {
        self.families.get(family).map(Vec::as_slice)
    }

    fn is_allowed(&self, facet: Facet, value: &str) -> bool {
        self.allowed(facet).map_or(true, |allowed| allowed.contains(value))
    }

    /// Maps CMIP5 model names between the filename-safe spelling used in
    /// dataset ids (`CESM1-BGC`) and the catalog spelling (`CESM1(BGC)`).
    ///
    /// `invert == false` goes filename-safe to catalog, `invert == true` back.
    /// Unknown names, and every CMIP6 name, pass through.
    pub fn fix_model<S: AsRef<str>>(&self, names: &[S], invert: bool) -> Vec<String> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let mapped = if invert {
                    self.model_aliases
                        .iter()
                        .find(|(_, catalog)| catalog.as_str() == name)
                        .map(|(safe, _)| safe.as_str())
                } else {
                    self.model_aliases.get(name).map(String::as_str)
                };

                mapped.unwrap_or(name).to_string()
            })
            .collect()
    }
}

/// Both project vocabularies, loaded once at start-up.
#[derive(Debug, Clone)]
pub struct Vocabularies {
    cmip5: Vocabulary,
    cmip6: Vocabulary,
}

impl Vocabularies {
    pub fn load() -> Result<Self> {
        Ok(Vocabularies {
            cmip5: load_vocabulary("CMIP5")?,
            cmip6: load_vocabulary("CMIP6")?,
        })
    }

    pub fn get(&self, project: Project) -> &Vocabulary {
        match project {
            Project::Cmip5 => &self.cmip5,
            Project::Cmip6 => &self.cmip6,
        }
    }
}

/// Loads the vocabulary of a project given by name.
pub fn load_vocabulary(project: &str) -> Result<Vocabulary> {
    Vocabulary::load(project.parse()?)
}

/// Checks every constrained value against the closed vocabularies.
pub fn check_values(constraints: &FacetConstraints, vocabulary: &Vocabulary) -> Result<bool> {
    for (facet, values) in constraints.iter() {
        if let Some(value) = values.iter().find(|v| !vocabulary.is_allowed(facet, v)) {
            return Err(FinderError::InvalidFacetValue {
                key: facet.key().to_string(),
                value: value.clone(),
            });
        }
    }

    Ok(true)
}

// -- Tests -------------------------------------------------------------------
