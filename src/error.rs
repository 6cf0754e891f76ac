//! Error taxonomy for the query and reconciliation engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Unknown project `{0}`, expected CMIP5 or CMIP6")]
    UnknownProject(String),
    #[error("Unknown facet `{0}`")]
    UnknownFacet(String),
    #[error("Invalid value `{value}` for facet `{key}`")]
    InvalidFacetValue { key: String, value: String },
    #[error("List of attributes to apply filter to is empty")]
    EmptyFilterSpec,
    #[error("No values were requested for filter attribute `{0}`")]
    MissingFilterValues(String),
    #[error("Malformed dataset id `{0}`")]
    MalformedDatasetId(String),
    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),
    #[error("Remote search error: {0}")]
    Remote(String),
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Export error: {0}")]
    Export(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FinderError>;

impl From<reqwest::Error> for FinderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Remote(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for FinderError {
    fn from(e: arrow::error::ArrowError) -> Self {
        Self::Export(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for FinderError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        Self::Export(e.to_string())
    }
}
