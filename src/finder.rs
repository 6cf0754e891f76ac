//! Query orchestration: validation, local search, remote search, the AND
//! filter and local/remote reconciliation.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::{
    and_filter::{and_filter, AndFilterResult},
    catalog::{aggregate::execute_and_group, CatalogQuery, Column, SimulationRecord},
    error::Result,
    esgf::{RemoteQuery, RemoteSearch},
    facet::{Facet, FacetConstraints},
    latest::select_latest,
    path::PathNormalizer,
    reconcile::Reconciliation,
    vocabulary::{check_values, Vocabularies, Vocabulary},
};

/// Where a query is answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Local,
    Remote,
}

/// Message for a query that matched nothing.
pub fn nothing_found(source: Source, constraints: &FacetConstraints) -> String {
    match source {
        Source::Local => format!("There are no simulations stored locally for {constraints}"),
        Source::Remote => format!(
            "There are no simulations currently available on the ESGF nodes for {constraints}"
        ),
    }
}

pub struct Finder<'a> {
    conn: &'a Connection,
    vocabularies: &'a Vocabularies,
    normalizer: &'a PathNormalizer,
}

impl<'a> Finder<'a> {
    pub fn new(
        conn: &'a Connection,
        vocabularies: &'a Vocabularies,
        normalizer: &'a PathNormalizer,
    ) -> Self {
        Finder {
            conn,
            vocabularies,
            normalizer,
        }
    }

    pub fn vocabulary(&self, constraints: &FacetConstraints) -> &'a Vocabulary {
        self.vocabularies.get(constraints.project())
    }

    /// Checks values against the vocabulary and rewrites CMIP5 model names to
    /// their catalog spelling.
    pub fn prepare(&self, constraints: &FacetConstraints) -> Result<FacetConstraints> {
        let vocabulary = self.vocabulary(constraints);
        check_values(constraints, vocabulary)?;

        let mut prepared = constraints.clone();
        prepared.map_values(Facet::Model, |models| vocabulary.fix_model(models, false));

        Ok(prepared)
    }

    /// Local simulations matching the constraints and free text. `None` when
    /// nothing matched.
    pub fn search(
        &self,
        constraints: &FacetConstraints,
        free_text: &str,
        latest: bool,
    ) -> Result<Option<Vec<SimulationRecord>>> {
        let prepared = self.prepare(constraints)?;
        let query = CatalogQuery::build(
            prepared.project(),
            free_text,
            &prepared,
            self.vocabulary(&prepared),
        )?;

        let mut records = execute_and_group(self.conn, &query, self.normalizer, latest)?;
        if latest {
            records = select_latest(records);
        }

        if records.is_empty() {
            info!("{}", nothing_found(Source::Local, constraints));
            return Ok(None);
        }

        Ok(Some(records))
    }

    /// Runs one local search per combination of requested values.
    pub fn search_each(
        &self,
        constraints: &FacetConstraints,
        latest: bool,
    ) -> Result<Vec<SimulationRecord>> {
        // fail on bad values before running any combination
        self.prepare(constraints)?;

        let mut records = Vec::new();
        for combination in constraints.combinations() {
            if let Some(found) = self.search(&combination, "", latest)? {
                records.extend(found);
            }
        }

        Ok(records)
    }

    /// Remote datasets as simulation records.
    pub async fn remote_records<R: RemoteSearch>(
        &self,
        remote: &R,
        constraints: &FacetConstraints,
        query: &RemoteQuery,
    ) -> Result<Vec<SimulationRecord>> {
        let vocabulary = self.vocabulary(constraints);
        let found = remote.search(query).await?;

        Ok(found.iter().map(|r| r.to_simulation(vocabulary)).collect())
    }

    /// Applies the AND filter to local results, or to remote results when a
    /// remote query is given. `None` when the query matched nothing.
    pub async fn matching<R: RemoteSearch>(
        &self,
        remote: Option<(&R, &RemoteQuery)>,
        constraints: &FacetConstraints,
        cols: &[Column],
        fixed: &[Column],
        latest: bool,
    ) -> Result<Option<AndFilterResult>> {
        let prepared = self.prepare(constraints)?;

        let (source, records) = match remote {
            None => (Source::Local, self.search_each(constraints, latest)?),
            Some((remote, query)) => (
                Source::Remote,
                self.remote_records(remote, constraints, query).await?,
            ),
        };

        if records.is_empty() {
            info!("{}", nothing_found(source, constraints));
            return Ok(None);
        }

        and_filter(&records, cols, fixed, &prepared).map(Some)
    }

    /// Compares every local version against what ESGF publishes. A failed
    /// remote search is reported and yields `None`; local errors propagate.
    pub async fn missing<R: RemoteSearch>(
        &self,
        remote: &R,
        constraints: &FacetConstraints,
        free_text: &str,
        query: &RemoteQuery,
    ) -> Result<Option<Reconciliation>> {
        let local = self.search(constraints, free_text, false)?.unwrap_or_default();

        let published = match remote.search(query).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "ESGF search failed, missing datasets not checked");
                return Ok(None);
            }
        };

        Ok(Some(Reconciliation::from_records(
            &local,
            published.into_iter().map(|r| r.id),
            self.vocabulary(constraints),
        )))
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        catalog::schema::fixture::{self, C5},
        error::FinderError,
        esgf::stub::{FailingSearch, StubSearch},
        facet::Project,
    };

    const ROOT: &str = "/g/data/al33/replicas/CMIP5/combined/CSIRO-BOM/ACCESS1-0";
    const LOCAL_ID: &str =
        "cmip5.output1.CSIRO-BOM.ACCESS1-0.historical.mon.atmos.Amon.r1i1p1.v20120115";

    fn catalog() -> Connection {
        let conn = fixture::open();
        let datasets = [("historical", "tas"), ("historical", "pr"), ("rcp85", "tas")];
        for (experiment, variable) in datasets {
            let path =
                format!("{ROOT}/{experiment}/mon/atmos/Amon/r1i1p1/v20120115/{variable}/f.nc");
            fixture::add_cmip5(
                &conn,
                &C5 {
                    institute: "CSIRO-BOM",
                    model: "ACCESS1.0",
                    experiment,
                    frequency: "mon",
                    table: "Amon",
                    ensemble: "r1i1p1",
                    version: Some("20120115"),
                },
                &[(&path, variable, Some("185001-200512"))],
            );
        }
        conn
    }

    fn constraints(pairs: &[(&str, &[&str])]) -> FacetConstraints {
        pairs
            .iter()
            .fold(FacetConstraints::builder(Project::Cmip5), |b, (k, v)| {
                b.add(k, v).unwrap()
            })
            .build()
    }

    #[test]
    fn should_search_with_filename_safe_model_name() {
        let conn = catalog();
        let vocabularies = Vocabularies::load().unwrap();
        let normalizer = PathNormalizer::default();
        let finder = Finder::new(&conn, &vocabularies, &normalizer);

        let c = constraints(&[("model", &["ACCESS1-0"]), ("variable", &["tas"])]);
        let records = finder.search(&c, "", true).unwrap().unwrap();

        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.facet(Facet::Model) == Some("ACCESS1.0")));
    }

    #[test]
    fn should_reject_invalid_values_before_querying() {
        let conn = catalog();
        let vocabularies = Vocabularies::load().unwrap();
        let normalizer = PathNormalizer::default();
        let finder = Finder::new(&conn, &vocabularies, &normalizer);

        let c = constraints(&[("time_frequency", &["dummy"])]);
        assert!(matches!(
            finder.search(&c, "", true),
            Err(FinderError::InvalidFacetValue { .. })
        ));
    }

    #[test]
    fn should_return_none_when_nothing_matches() {
        let conn = catalog();
        let vocabularies = Vocabularies::load().unwrap();
        let normalizer = PathNormalizer::default();
        let finder = Finder::new(&conn, &vocabularies, &normalizer);

        let c = constraints(&[("model", &["MIROC5"])]);
        assert!(finder.search(&c, "", true).unwrap().is_none());
        assert!(nothing_found(Source::Local, &c).contains("model=MIROC5"));
    }

    #[tokio::test]
    async fn should_match_every_combination_locally() {
        let conn = catalog();
        let vocabularies = Vocabularies::load().unwrap();
        let normalizer = PathNormalizer::default();
        let finder = Finder::new(&conn, &vocabularies, &normalizer);

        let cols = [Column::Facet(Facet::Variable)];
        let fixed = [
            Column::Facet(Facet::Model),
            Column::Facet(Facet::Experiment),
        ];
        let c = constraints(&[("variable", &["tas", "pr"])]);

        let res = finder
            .matching::<StubSearch>(None, &c, &cols, &fixed, true)
            .await
            .unwrap()
            .unwrap();

        // only the historical experiment has both variables
        assert_eq!(res.groups.len(), 1);
        assert_eq!(
            res.groups[0].fixed,
            vec![Some("ACCESS1.0".to_string()), Some("historical".to_string())]
        );
        assert_eq!(res.rows.len(), 2);
    }

    #[tokio::test]
    async fn should_match_remote_results() {
        let conn = catalog();
        let vocabularies = Vocabularies::load().unwrap();
        let normalizer = PathNormalizer::default();
        let finder = Finder::new(&conn, &vocabularies, &normalizer);

        let c = constraints(&[("experiment", &["historical", "rcp85"])]);
        let remote = StubSearch(vec![
            LOCAL_ID,
            "cmip5.output1.CSIRO-BOM.ACCESS1-0.rcp85.mon.atmos.Amon.r1i1p1.v20120115",
            "cmip5.output1.MIROC.MIROC5.historical.mon.atmos.Amon.r1i1p1.v20120710",
        ]);
        let query = RemoteQuery::from_constraints(&c, finder.vocabulary(&c));
        let cols = [Column::Facet(Facet::Experiment)];
        let fixed = [Column::Facet(Facet::Model)];

        let res = finder
            .matching(Some((&remote, &query)), &c, &cols, &fixed, true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(res.groups.len(), 1);
        assert_eq!(res.groups[0].fixed, vec![Some("ACCESS1.0".to_string())]);
    }

    #[tokio::test]
    async fn should_report_missing_datasets() {
        let conn = catalog();
        let vocabularies = Vocabularies::load().unwrap();
        let normalizer = PathNormalizer::default();
        let finder = Finder::new(&conn, &vocabularies, &normalizer);

        let c = constraints(&[("experiment", &["historical"]), ("variable", &["tas"])]);
        let query = RemoteQuery::from_constraints(&c, finder.vocabulary(&c));
        let absent =
            "cmip5.output1.CSIRO-BOM.ACCESS1-0.historical.mon.atmos.Amon.r2i1p1.v20120115";
        let remote = StubSearch(vec![LOCAL_ID, absent]);

        let r = finder
            .missing(&remote, &c, "", &query)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(r.missing.len(), 1);
        assert_eq!(r.missing.iter().next().unwrap().to_string(), absent);
    }

    #[tokio::test]
    async fn should_abandon_reconciliation_on_remote_failure() {
        let conn = catalog();
        let vocabularies = Vocabularies::load().unwrap();
        let normalizer = PathNormalizer::default();
        let finder = Finder::new(&conn, &vocabularies, &normalizer);

        let c = constraints(&[("variable", &["tas"])]);
        let query = RemoteQuery::from_constraints(&c, finder.vocabulary(&c));

        let r = finder.missing(&FailingSearch, &c, "", &query).await.unwrap();
        assert!(r.is_none());
    }
}
