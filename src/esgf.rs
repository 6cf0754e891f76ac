//! ESGF search API client.
//!
//! Queries the federation's `esg-search/search` endpoint for datasets and
//! turns the Solr documents it returns into dataset ids and simulation records.

use std::{collections::BTreeMap, future::Future, time::Duration};

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    catalog::SimulationRecord,
    dataset_id::DatasetId,
    error::{FinderError, Result},
    facet::{Facet, FacetConstraints, Project},
    settings::EsgfSettings,
    vocabulary::Vocabulary,
};

/// One dataset search against ESGF.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteQuery {
    pub project: Project,
    /// Facet terms, repeated keys are OR-combined by the server.
    pub terms: Vec<(String, String)>,
    pub free_text: Option<String>,
    pub latest: bool,
    pub replica: bool,
    pub distrib: bool,
}

impl RemoteQuery {
    /// Builds a query from validated constraints. CMIP5 model names are sent
    /// in the filename-safe spelling ESGF publishes them under.
    pub fn from_constraints(constraints: &FacetConstraints, vocabulary: &Vocabulary) -> Self {
        let mut terms = Vec::new();
        for (facet, values) in constraints.iter() {
            let values = match facet {
                Facet::Model => vocabulary.fix_model(values, true),
                _ => values.to_vec(),
            };
            terms.extend(values.into_iter().map(|v| (facet.key().to_string(), v)));
        }

        RemoteQuery {
            project: constraints.project(),
            terms,
            free_text: None,
            latest: true,
            replica: false,
            distrib: true,
        }
    }

    pub fn with_free_text(mut self, free_text: &str) -> Self {
        let text = free_text.trim();
        self.free_text = (!text.is_empty()).then(|| text.to_string());
        self
    }

    /// Adds terms for a search field that is not a catalog facet.
    pub fn with_terms(mut self, key: &str, values: &[String]) -> Self {
        self.terms.extend(values.iter().map(|v| (key.to_string(), v.clone())));
        self
    }

    /// Fields requested for each dataset document.
    pub fn fields(&self) -> &'static str {
        match self.project {
            Project::Cmip5 => {
                "id,dataset_id,model,experiment,variable,ensemble,cmor_table,version,\
                 institute,product,time_frequency,realm"
            }
            Project::Cmip6 => {
                "id,dataset_id,source_id,experiment_id,variable_id,activity_id,table_id,\
                 version,grid_label,source_type,frequency,member_id,sub_experiment_id,\
                 institution_id,variant_label,nominal_resolution,realm"
            }
        }
    }

    /// Query-string parameters for one page of results.
    pub fn params(&self, offset: usize, limit: usize) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("type".into(), "Dataset".into()),
            ("format".into(), "application/solr+json".into()),
            ("project".into(), self.project.name().into()),
            ("fields".into(), self.fields().into()),
            ("distrib".into(), self.distrib.to_string()),
            ("limit".into(), limit.to_string()),
            ("offset".into(), offset.to_string()),
        ];
        if self.latest {
            params.push(("latest".into(), "true".into()));
        }
        // replicas are only excluded on request, asking for them means all copies
        if !self.replica {
            params.push(("replica".into(), "false".into()));
        }
        if let Some(text) = &self.free_text {
            params.push(("query".into(), text.clone()));
        }
        params.extend(self.terms.iter().cloned());

        params
    }
}

/// One dataset as published on ESGF.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub id: DatasetId,
    /// Data node serving this copy, when the id carried one.
    pub data_node: Option<String>,
    /// Document fields, each flattened to its first value.
    pub fields: BTreeMap<String, String>,
}

impl RemoteRecord {
    pub fn from_doc(doc: &BTreeMap<String, Value>) -> Result<Self> {
        let fields: BTreeMap<String, String> = doc
            .iter()
            .filter_map(|(k, v)| first_value(v).map(|v| (k.clone(), v)))
            .collect();

        let raw = fields
            .get("dataset_id")
            .or_else(|| fields.get("id"))
            .ok_or_else(|| FinderError::Remote("dataset document without an id".to_string()))?;
        let data_node = raw.split_once('|').map(|(_, node)| node.to_string());

        Ok(RemoteRecord {
            id: raw.parse()?,
            data_node,
            fields,
        })
    }

    /// A simulation record holding the facets of the dataset, with the
    /// version taken from the dataset id. CMIP5 model names are converted to
    /// the catalog spelling so remote and local records group alike.
    pub fn to_simulation(&self, vocabulary: &Vocabulary) -> SimulationRecord {
        let project = self.id.project();
        let mut record = SimulationRecord::new(project, self.id.to_string())
            .with_version(self.id.version());

        let from_id = self
            .id
            .facets()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()));
        let from_doc = self.fields.iter().map(|(k, v)| (k.clone(), v.clone()));

        for (key, value) in from_id.chain(from_doc) {
            let Some(facet) = project.facet(&key) else {
                continue;
            };
            let value = match facet {
                Facet::Model => vocabulary.fix_model(&[value], false).remove(0),
                _ => value,
            };
            record.facets.insert(facet, value);
        }
        record.facets.insert(Facet::Project, project.name().to_string());

        record
    }
}

fn first_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().and_then(first_value),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Object(_) => None,
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(rename = "numFound")]
    num_found: usize,
    docs: Vec<BTreeMap<String, Value>>,
}

/// Anything that can answer a remote dataset search.
pub trait RemoteSearch {
    fn search(&self, query: &RemoteQuery) -> impl Future<Output = Result<Vec<RemoteRecord>>>;
}

pub struct EsgfClient {
    client: Client,
    url: String,
    page_size: usize,
}

impl EsgfClient {
    pub fn new(settings: &EsgfSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cmipfind/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(EsgfClient {
            client,
            url: settings.url.clone(),
            page_size: settings.page_size.max(1),
        })
    }

    async fn fetch_page(&self, query: &RemoteQuery, offset: usize) -> Result<SearchBody> {
        debug!(url = %self.url, offset, "fetching ESGF page");
        let response = self
            .client
            .get(&self.url)
            .query(&query.params(offset, self.page_size))
            .send()
            .await?
            .error_for_status()?;

        let page: SearchResponse = response.json().await?;

        Ok(page.response)
    }
}

impl RemoteSearch for EsgfClient {
    async fn search(&self, query: &RemoteQuery) -> Result<Vec<RemoteRecord>> {
        let mut records = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(query, offset).await?;
            let count = page.docs.len();
            for doc in &page.docs {
                records.push(RemoteRecord::from_doc(doc)?);
            }

            offset += count;
            if count == 0 || offset >= page.num_found {
                break;
            }
        }

        info!(project = %query.project, datasets = records.len(), "ESGF search complete");

        Ok(records)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;

    /// Answers every search with the same dataset ids.
    pub struct StubSearch(pub Vec<&'static str>);

    impl RemoteSearch for StubSearch {
        fn search(&self, _query: &RemoteQuery) -> impl Future<Output = Result<Vec<RemoteRecord>>> {
            let ids = self.0.clone();
            async move {
                ids.into_iter()
                    .map(|id| {
                        let doc = [("id".to_string(), Value::from(id))].into_iter().collect();
                        RemoteRecord::from_doc(&doc)
                    })
                    .collect()
            }
        }
    }

    pub struct FailingSearch;

    impl RemoteSearch for FailingSearch {
        async fn search(&self, _query: &RemoteQuery) -> Result<Vec<RemoteRecord>> {
            Err(FinderError::Remote("connection refused".to_string()))
        }
    }
}

// -- Tests -------------------------------------------------------------------
