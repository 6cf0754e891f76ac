//! Combinatorial matching: keeps the entities that have every combination of
//! the requested values.
//!
//! Asking for variables `tas, pr` and experiments `historical, ssp585` with the
//! model as the fixed entity returns only the models that have all four
//! (variable, experiment) pairs, not those that have any one of them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    catalog::{Column, SimulationRecord},
    error::{FinderError, Result},
    facet::{Facet, FacetConstraints},
};

/// Facets worth reporting for a qualifying entity, when not already fixed.
const IDENTIFYING: [Facet; 6] = [
    Facet::Model,
    Facet::SourceId,
    Facet::CmorTable,
    Facet::TableId,
    Facet::Ensemble,
    Facet::MemberId,
];

type Tuple = Vec<Option<String>>;

/// One entity that has every requested combination.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifyingGroup {
    /// Values of the fixed columns, in the order they were given.
    pub fixed: Tuple,
    /// Every observed combination of the combined columns.
    pub combinations: BTreeSet<Tuple>,
    pub versions: BTreeSet<String>,
    pub paths: BTreeSet<String>,
    pub attributes: BTreeMap<Facet, BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AndFilterResult {
    /// Input records of qualifying entities, in input order.
    pub rows: Vec<SimulationRecord>,
    pub groups: Vec<QualifyingGroup>,
}

impl AndFilterResult {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Keeps the entities, identified by their `fixed` values, whose observed
/// `cols` combinations include the full Cartesian product of the values
/// requested for `cols`.
pub fn and_filter(
    records: &[SimulationRecord],
    cols: &[Column],
    fixed: &[Column],
    requested: &FacetConstraints,
) -> Result<AndFilterResult> {
    if cols.is_empty() {
        return Err(FinderError::EmptyFilterSpec);
    }

    let mut lists: Vec<&[String]> = Vec::with_capacity(cols.len());
    for col in cols {
        let values = match col {
            Column::Facet(f) => requested.get(*f).filter(|v| !v.is_empty()),
            Column::Version | Column::Path => None,
        };
        let values =
            values.ok_or_else(|| FinderError::MissingFilterValues(col.key().to_string()))?;
        lists.push(values);
    }
    let expected: BTreeSet<Tuple> = cartesian(&lists)
        .into_iter()
        .map(|combo| combo.into_iter().map(Some).collect())
        .collect();

    let mut observed: BTreeMap<Tuple, QualifyingGroup> = BTreeMap::new();
    for record in records {
        let key = tuple(record, fixed);
        let group = observed.entry(key.clone()).or_insert_with(|| QualifyingGroup {
            fixed: key,
            combinations: BTreeSet::new(),
            versions: BTreeSet::new(),
            paths: BTreeSet::new(),
            attributes: BTreeMap::new(),
        });

        group.combinations.insert(tuple(record, cols));
        if let Some(version) = &record.version {
            group.versions.insert(version.clone());
        }
        group.paths.insert(record.path.clone());
        for facet in IDENTIFYING {
            if fixed.contains(&Column::Facet(facet)) {
                continue;
            }
            if let Some(value) = record.facet(facet) {
                group
                    .attributes
                    .entry(facet)
                    .or_default()
                    .insert(value.to_string());
            }
        }
    }

    let groups: Vec<QualifyingGroup> = observed
        .into_values()
        .filter(|g| expected.is_subset(&g.combinations))
        .collect();

    let qualifying: BTreeSet<&Tuple> = groups.iter().map(|g| &g.fixed).collect();
    let rows = records
        .iter()
        .filter(|r| qualifying.contains(&tuple(r, fixed)))
        .cloned()
        .collect();

    debug!(
        expected = expected.len(),
        qualifying = groups.len(),
        "and filter applied"
    );

    Ok(AndFilterResult { rows, groups })
}

fn tuple(record: &SimulationRecord, columns: &[Column]) -> Tuple {
    columns
        .iter()
        .map(|c| record.value(*c).map(str::to_string))
        .collect()
}

fn cartesian(lists: &[&[String]]) -> Vec<Vec<String>> {
    lists.iter().fold(vec![Vec::new()], |acc, values| {
        acc.iter()
            .flat_map(|prefix| {
                values.iter().map(move |v| {
                    let mut next = prefix.clone();
                    next.push(v.clone());
                    next
                })
            })
            .collect()
    })
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::facet::Project;

    fn record(model: &str, variable: &str, experiment: &str) -> SimulationRecord {
        SimulationRecord::new(
            Project::Cmip6,
            format!("/cmip6/{model}/{experiment}/{variable}/v20190101"),
        )
        .with_facet(Facet::SourceId, model)
        .with_facet(Facet::VariableId, variable)
        .with_facet(Facet::ExperimentId, experiment)
        .with_facet(Facet::MemberId, "r1i1p1f1")
        .with_version("20190101")
    }

    fn requested() -> FacetConstraints {
        FacetConstraints::builder(Project::Cmip6)
            .add("variable_id", &["tas", "pr"])
            .unwrap()
            .add("experiment_id", &["historical", "ssp126", "ssp585"])
            .unwrap()
            .build()
    }

    fn all_six(model: &str) -> Vec<SimulationRecord> {
        let mut records = Vec::new();
        for v in ["tas", "pr"] {
            for e in ["historical", "ssp126", "ssp585"] {
                records.push(record(model, v, e));
            }
        }
        records
    }

    fn cols() -> Vec<Column> {
        vec![
            Column::Facet(Facet::VariableId),
            Column::Facet(Facet::ExperimentId),
        ]
    }

    fn fixed() -> Vec<Column> {
        vec![Column::Facet(Facet::SourceId)]
    }

    #[test]
    fn should_keep_entity_with_every_combination() {
        let records = all_six("CESM2");
        let res = and_filter(&records, &cols(), &fixed(), &requested()).unwrap();

        assert_eq!(res.rows.len(), 6);
        assert_eq!(res.groups.len(), 1);
        let g = &res.groups[0];
        assert_eq!(g.fixed, vec![Some("CESM2".to_string())]);
        assert_eq!(g.combinations.len(), 6);
        assert_eq!(g.paths.len(), 6);
        assert_eq!(g.versions.len(), 1);
        assert!(!g.attributes.contains_key(&Facet::SourceId));
        assert_eq!(g.attributes[&Facet::MemberId].len(), 1);
    }

    #[test]
    fn should_drop_entity_missing_one_combination() {
        let mut records = all_six("CESM2");
        records.extend(all_six("MIROC6").into_iter().filter(|r| {
            !(r.facet(Facet::VariableId) == Some("pr")
                && r.facet(Facet::ExperimentId) == Some("ssp585"))
        }));

        let res = and_filter(&records, &cols(), &fixed(), &requested()).unwrap();

        assert_eq!(res.groups.len(), 1);
        assert!(res
            .rows
            .iter()
            .all(|r| r.facet(Facet::SourceId) == Some("CESM2")));
    }

    #[test]
    fn should_not_count_extra_tuples_as_coverage() {
        // as many observed pairs as expected, but one of them is not requested
        let mut records: Vec<SimulationRecord> = all_six("MIROC6")
            .into_iter()
            .filter(|r| {
                r.facet(Facet::ExperimentId) != Some("ssp585")
                    || r.facet(Facet::VariableId) != Some("pr")
            })
            .collect();
        records.push(record("MIROC6", "pr", "ssp245"));

        let res = and_filter(&records, &cols(), &fixed(), &requested()).unwrap();

        assert!(res.is_empty());
        assert!(res.rows.is_empty());
    }

    #[test]
    fn should_accept_superset_of_combinations() {
        let mut records = all_six("CESM2");
        records.push(record("CESM2", "pr", "ssp245"));

        let res = and_filter(&records, &cols(), &fixed(), &requested()).unwrap();

        assert_eq!(res.groups.len(), 1);
        assert_eq!(res.groups[0].combinations.len(), 7);
        assert_eq!(res.rows.len(), 7);
    }

    #[test]
    fn should_reject_empty_column_list() {
        let res = and_filter(&all_six("CESM2"), &[], &fixed(), &requested());
        assert!(matches!(res, Err(FinderError::EmptyFilterSpec)));
    }

    #[test]
    fn should_reject_column_without_requested_values() {
        let cols = vec![Column::Facet(Facet::TableId)];
        let res = and_filter(&all_six("CESM2"), &cols, &fixed(), &requested());

        assert!(matches!(res, Err(FinderError::MissingFilterValues(k)) if k == "table_id"));
    }

    #[test]
    fn should_return_nothing_for_empty_records() {
        let res = and_filter(&[], &cols(), &fixed(), &requested()).unwrap();
        assert!(res.is_empty());
    }
}
