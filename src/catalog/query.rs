//! Translates facet constraints into a parameterised catalog query.

use tracing::debug;

use crate::{
    error::{FinderError, Result},
    facet::{Facet, FacetConstraints, Project},
    vocabulary::Vocabulary,
};

/// Where a project's dataset metadata lives.
#[derive(Debug, Clone, Copy)]
pub struct TableMapping {
    pub dataset: &'static str,
    pub link: &'static str,
    /// Facet columns selected from the dataset table.
    pub columns: &'static [Facet],
}

impl TableMapping {
    pub fn for_project(project: Project) -> Self {
        match project {
            Project::Cmip5 => TableMapping {
                dataset: "cmip5_dataset",
                link: "cmip5_path",
                columns: &[
                    Facet::Project,
                    Facet::Product,
                    Facet::Institute,
                    Facet::Model,
                    Facet::Experiment,
                    Facet::TimeFrequency,
                    Facet::Realm,
                    Facet::CmorTable,
                    Facet::Ensemble,
                ],
            },
            Project::Cmip6 => TableMapping {
                dataset: "cmip6_dataset",
                link: "cmip6_path",
                columns: &[
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
            },
        }
    }
}

/// A built, not yet executed, catalog query.
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    project: Project,
    mapping: TableMapping,
    clauses: Vec<String>,
    params: Vec<String>,
}

impl CatalogQuery {
    pub fn build(
        project: Project,
        free_text: &str,
        constraints: &FacetConstraints,
        vocabulary: &Vocabulary,
    ) -> Result<Self> {
        if constraints.project() != project || vocabulary.project() != project {
            return Err(FinderError::UnknownProject(format!(
                "{} constraints queried as {project}",
                constraints.project()
            )));
        }

        let mut query = CatalogQuery {
            project,
            mapping: TableMapping::for_project(project),
            clauses: Vec::new(),
            params: Vec::new(),
        };

        for (facet, values) in constraints.iter() {
            match (project, facet) {
                (Project::Cmip5, Facet::ExperimentFamily) => {
                    let mut patterns = Vec::new();
                    for family in values {
                        let globs = vocabulary.family_patterns(family).ok_or_else(|| {
                            FinderError::InvalidFacetValue {
                                key: facet.key().to_string(),
                                value: family.clone(),
                            }
                        })?;
                        patterns.extend(globs.iter().map(|g| g.replace('*', "%")));
                    }
                    query.push_any("d.experiment LIKE ?", patterns);
                }
                (Project::Cmip5, Facet::Variable) => query.push_in("e.variable", values),
                _ => query.push_in(&format!("d.{}", facet.key()), values),
            }
        }

        Ok(query.search(free_text))
    }

    /// Restricts the query to paths containing every whitespace-separated term.
    pub fn search(mut self, free_text: &str) -> Self {
        for term in free_text.split_whitespace() {
            self.clauses.push("p.path LIKE ?".to_string());
            self.params.push(format!("%{term}%"));
        }

        self
    }

    fn push_in(&mut self, column: &str, values: &[String]) {
        let placeholders = vec!["?"; values.len()].join(", ");
        self.clauses.push(format!("{column} IN ({placeholders})"));
        self.params.extend(values.iter().cloned());
    }

    fn push_any(&mut self, clause: &str, values: Vec<String>) {
        let ors = vec![clause; values.len()].join(" OR ");
        self.clauses.push(format!("({ors})"));
        self.params.extend(values);
    }

    pub fn project(&self) -> Project {
        self.project
    }

    /// Facet columns in select order, after the leading `path` column.
    pub fn columns(&self) -> &'static [Facet] {
        self.mapping.columns
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn sql(&self) -> String {
        let facets: Vec<String> = self
            .mapping
            .columns
            .iter()
            .map(|f| format!("d.{0} AS {0}", f.key()))
            .collect();

        let mut sql = format!(
            "SELECT p.path AS path, {}, d.version AS version, e.variable AS variable, e.period AS period \
             FROM paths p \
             JOIN extended_metadata e ON e.file_id = p.pa_id \
             JOIN {link} l ON l.file_id = p.pa_id \
             JOIN {dataset} d ON d.dataset_id = l.dataset_id",
            facets.join(", "),
            link = self.mapping.link,
            dataset = self.mapping.dataset,
        );

        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY p.path");

        debug!(%sql, params = ?self.params, "catalog query");

        sql
    }
}

// -- Tests -------------------------------------------------------------------
