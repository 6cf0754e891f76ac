//! Layered settings: built-in defaults, the user config file, an explicit
//! `--config` file, then `CMIPFIND__<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};

use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::Result,
    path::{AssumePresent, FsProbe, PathNormalizer, VersionProbe},
};

const APP: &str = "cmipfind";
const ENV_PREFIX: &str = "CMIPFIND";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub esgf: EsgfSettings,
    pub output: OutputSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    pub path: PathBuf,
    /// Confirm unsolicited replica versions on disk before rewriting a path.
    pub check_replica_versions: bool,
    /// Publishers staging files as `files/<var>_<YYYYMMDD>`.
    pub dated_leaf_publishers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EsgfSettings {
    pub url: String,
    pub page_size: usize,
    pub distrib: bool,
    pub replica: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
}

impl Settings {
    /// Loads settings, reading `extra` after the user config file.
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        Self::layered(user_config_file().as_deref(), extra, Some(ENV_PREFIX))
    }

    /// Defaults, then each file given, then variables under `env_prefix`.
    fn layered(
        user: Option<&Path>,
        extra: Option<&Path>,
        env_prefix: Option<&str>,
    ) -> Result<Self> {
        let mut builder = defaults()?;

        if let Some(user) = user {
            debug!(path = %user.display(), "reading user config");
            builder = builder.add_source(File::from(user).required(false));
        }
        if let Some(extra) = extra {
            builder = builder.add_source(File::from(extra).required(true));
        }
        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("catalog.dated_leaf_publishers"),
            );
        }

        let settings = builder.build()?.try_deserialize()?;

        Ok(settings)
    }

    /// Built-in defaults plus `file`, ignoring the user config and environment.
    #[cfg(test)]
    pub fn from_file(file: &Path) -> Result<Self> {
        Self::layered(None, Some(file), None)
    }

    pub fn normalizer(&self) -> PathNormalizer {
        let probe: Box<dyn VersionProbe> = if self.catalog.check_replica_versions {
            Box::new(FsProbe)
        } else {
            Box::new(AssumePresent)
        };

        PathNormalizer::new(probe, self.catalog.dated_leaf_publishers.clone())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    let catalog = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP)
        .join("catalog.db");

    let builder = Config::builder()
        .set_default("catalog.path", catalog.to_string_lossy().to_string())?
        .set_default("catalog.check_replica_versions", false)?
        .set_default("catalog.dated_leaf_publishers", vec!["CSIRO-BOM"])?
        .set_default("esgf.url", "https://esgf.nci.org.au/esg-search/search")?
        .set_default("esgf.page_size", 500)?
        .set_default("esgf.distrib", true)?
        .set_default("esgf.replica", false)?
        .set_default("esgf.timeout_secs", 60)?
        .set_default("output.dir", ".")?
        .set_default("log.level", "warn")?;

    Ok(builder)
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP).join("config.toml"))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn should_load_defaults() {
        let settings = Settings::layered(None, None, None).unwrap();

        assert!(settings.catalog.path.ends_with("cmipfind/catalog.db"));
        assert_eq!(settings.catalog.dated_leaf_publishers, vec!["CSIRO-BOM"]);
        assert!(settings.esgf.url.ends_with("/esg-search/search"));
        assert!(settings.esgf.page_size > 0);
        assert_eq!(settings.log.level, "warn");
    }

    #[test]
    fn should_override_from_file() {
        let file = toml(
            "[esgf]\npage_size = 50\nreplica = true\n\n[output]\ndir = \"/tmp/out\"\n\n[catalog]\ndated_leaf_publishers = [\"CSIRO-BOM\", \"CSIRO-QCCCE\"]",
        );

        let settings = Settings::from_file(file.path()).unwrap();

        assert_eq!(settings.esgf.page_size, 50);
        assert!(settings.esgf.replica);
        assert_eq!(settings.output.dir, PathBuf::from("/tmp/out"));
        assert_eq!(settings.catalog.dated_leaf_publishers.len(), 2);
        assert!(settings.esgf.distrib);
    }

    #[test]
    fn should_read_explicit_file_after_user_config() {
        let user = toml("[esgf]\npage_size = 10\ntimeout_secs = 5");
        let extra = toml("[esgf]\npage_size = 20");

        let settings = Settings::layered(Some(user.path()), Some(extra.path()), None).unwrap();

        assert_eq!(settings.esgf.page_size, 20);
        assert_eq!(settings.esgf.timeout_secs, 5);
    }

    #[test]
    fn should_skip_missing_user_config() {
        let settings =
            Settings::layered(Some(Path::new("/nonexistent/config.toml")), None, None).unwrap();
        assert_eq!(settings.esgf.page_size, 500);
    }

    #[test]
    fn should_fail_on_missing_explicit_file() {
        assert!(Settings::from_file(Path::new("/nonexistent/cmipfind.toml")).is_err());
    }

    fn toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{contents}").unwrap();
        file
    }
}
