//! Runs a catalog query and folds its per-file rows into simulation records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use super::{
    query::CatalogQuery,
    record::{CatalogRow, SimulationRecord},
};
use crate::{
    error::Result,
    facet::{Facet, Project},
    path::{extract_version, PathNormalizer},
    period::{convert, get_range, time_axis, Frequency},
};

/// Executes the query, one row per physical file.
pub fn execute(conn: &Connection, query: &CatalogQuery) -> Result<Vec<CatalogRow>> {
    let columns = query.columns();
    let mut stmt = conn.prepare(&query.sql())?;

    let rows = stmt.query_map(params_from_iter(query.params().iter()), |row| {
        let mut facets = BTreeMap::new();
        for (idx, facet) in columns.iter().enumerate() {
            if let Some(value) = row.get::<_, Option<String>>(idx + 1)? {
                facets.insert(*facet, value);
            }
        }

        let n = columns.len();
        Ok(CatalogRow {
            path: row.get(0)?,
            facets,
            version: row.get(n + 1)?,
            variable: row.get(n + 2)?,
            period: row.get(n + 3)?,
        })
    })?;

    let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    debug!(rows = rows.len(), "catalog rows fetched");

    Ok(rows)
}

struct Group {
    first: CatalogRow,
    filenames: BTreeSet<String>,
    periods: Vec<Option<String>>,
}

/// Groups rows by canonical directory, in order of first appearance.
pub fn group_rows(
    project: Project,
    rows: Vec<CatalogRow>,
    normalizer: &PathNormalizer,
    latest: bool,
) -> Vec<SimulationRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();

    for row in rows {
        let (dir, filename) = normalizer.normalize(&row.path, latest);
        let group = groups.entry(dir.clone()).or_insert_with(|| {
            order.push(dir);
            Group {
                first: row.clone(),
                filenames: BTreeSet::new(),
                periods: Vec::new(),
            }
        });

        if !filename.is_empty() {
            group.filenames.insert(filename);
        }
        group.periods.push(row.period);
    }

    order
        .into_iter()
        .filter_map(|dir| {
            let group = groups.remove(&dir)?;
            Some(post_process(project, dir, group))
        })
        .collect()
}

fn post_process(project: Project, dir: String, group: Group) -> SimulationRecord {
    let mut facets = group.first.facets;
    // CMIP6 names the variable in variable_id already
    if let Some(variable) = group.first.variable.filter(|_| project == Project::Cmip5) {
        facets.insert(Facet::Variable, variable);
    }

    let periods = convert(&group.periods);
    let (fdate, tdate) = get_range(&periods);
    let frequency = facets
        .get(&project.frequency_facet())
        .map(|f| Frequency::from_facet(f))
        .unwrap_or(Frequency::Daily);
    let time_complete = time_axis(&periods, fdate, tdate, frequency);

    // CMIP6 datasets usually carry no version column
    let version = group
        .first
        .version
        .filter(|v| !v.is_empty())
        .or_else(|| extract_version(&dir));

    SimulationRecord {
        project,
        path: dir,
        version,
        filenames: group.filenames,
        periods,
        fdate,
        tdate,
        time_complete,
        facets,
    }
}

/// Executes the query and returns one record per simulation directory.
pub fn execute_and_group(
    conn: &Connection,
    query: &CatalogQuery,
    normalizer: &PathNormalizer,
    latest: bool,
) -> Result<Vec<SimulationRecord>> {
    let rows = execute(conn, query)?;
    let records = group_rows(query.project(), rows, normalizer, latest);
    info!(
        project = %query.project(),
        simulations = records.len(),
        "local query complete"
    );

    Ok(records)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        catalog::schema::fixture::{self, C5},
        facet::FacetConstraints,
        vocabulary::Vocabulary,
    };

    const BOM: &str = "/g/data/rr3/publications/CMIP5/output1/CSIRO-BOM/ACCESS1-0/historical/mon/atmos/Amon/r1i1p1/files";

    fn access_historical(version: Option<&'static str>) -> C5 {
        C5 {
            institute: "CSIRO-BOM",
            model: "ACCESS1.0",
            experiment: "historical",
            frequency: "mon",
            table: "Amon",
            ensemble: "r1i1p1",
            version,
        }
    }

    fn run(conn: &Connection, c: &FacetConstraints, latest: bool) -> Vec<SimulationRecord> {
        let vocab = Vocabulary::load(c.project()).unwrap();
        let q = CatalogQuery::build(c.project(), "", c, &vocab).unwrap();
        execute_and_group(conn, &q, &PathNormalizer::default(), latest).unwrap()
    }

    #[test]
    fn should_group_files_by_directory() {
        let conn = fixture::open();
        let tas1 = format!("{BOM}/tas_20120115/tas_Amon_185001-189912.nc");
        let tas2 = format!("{BOM}/tas_20120115/tas_Amon_190001-200512.nc");
        let pr = format!("{BOM}/pr_20120115/pr_Amon_185001-200512.nc");
        fixture::add_cmip5(
            &conn,
            &access_historical(None),
            &[
                (&tas1, "tas", Some("185001-189912")),
                (&tas2, "tas", Some("190001-200512")),
                (&pr, "pr", Some("185001-200512")),
            ],
        );

        let c = FacetConstraints::builder(Project::Cmip5)
            .add("variable", &["tas"])
            .unwrap()
            .build();
        let records = run(&conn, &c, true);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.path.ends_with("/r1i1p1/latest/tas"));
        assert_eq!(r.filenames.len(), 2);
        assert_eq!(r.periods.len(), 2);
        assert_eq!(r.fdate, NaiveDate::from_ymd_opt(1850, 1, 1));
        assert_eq!(r.tdate, NaiveDate::from_ymd_opt(2005, 12, 31));
        assert!(r.time_complete);
        assert_eq!(r.facet(Facet::Model), Some("ACCESS1.0"));
        assert_eq!(r.facet(Facet::Variable), Some("tas"));
        // no version column, no version segment once collapsed to latest
        assert_eq!(r.version, None);
    }

    #[test]
    fn should_extract_version_from_dated_leaf_when_not_latest() {
        let conn = fixture::open();
        let tas = format!("{BOM}/tas_20120115/tas_Amon_185001-200512.nc");
        fixture::add_cmip5(
            &conn,
            &access_historical(None),
            &[(&tas, "tas", Some("185001-200512"))],
        );

        let c = FacetConstraints::builder(Project::Cmip5).build();
        let records = run(&conn, &c, false);

        assert_eq!(records[0].version.as_deref(), Some("20120115"));
    }

    #[test]
    fn should_flag_gaps_and_tolerate_missing_periods() {
        let conn = fixture::open();
        fixture::add_cmip6(
            &conn,
            "CESM2",
            "historical",
            "r1i1p1f1",
            "Amon",
            "tas",
            "mon",
            &[
                ("/cmip6/CESM2/tas/gn/v20190308/tas_185001-189912.nc", Some("185001-189912")),
                ("/cmip6/CESM2/tas/gn/v20190308/tas_195001-201412.nc", Some("195001-201412")),
                ("/cmip6/CESM2/tas/gn/v20190308/tas_fx.nc", None),
            ],
        );

        let c = FacetConstraints::builder(Project::Cmip6)
            .add("source_id", &["CESM2"])
            .unwrap()
            .build();
        let records = run(&conn, &c, true);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.filenames.len(), 3);
        assert_eq!(r.periods.len(), 2);
        assert!(!r.time_complete);
        assert_eq!(r.version.as_deref(), Some("20190308"));
        assert_eq!(r.facet(Facet::MemberId), Some("r1i1p1f1"));
        assert_eq!(r.facet(Facet::VariableId), Some("tas"));
        assert_eq!(r.facet(Facet::Variable), None);
    }

    #[test]
    fn should_return_nothing_for_unmatched_constraints() {
        let conn = fixture::open();
        fixture::add_cmip6(
            &conn,
            "CESM2",
            "historical",
            "r1i1p1f1",
            "Amon",
            "tas",
            "mon",
            &[("/cmip6/CESM2/tas/gn/v20190308/tas.nc", Some("185001-201412"))],
        );

        let c = FacetConstraints::builder(Project::Cmip6)
            .add("source_id", &["MIROC6"])
            .unwrap()
            .build();

        assert!(run(&conn, &c, true).is_empty());
    }
}
