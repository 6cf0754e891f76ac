//! Command line interface.

pub mod command;

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;

use crate::{
    error::Result,
    facet::{FacetConstraints, Project},
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Finds CMIP5/CMIP6 simulations in the local catalog and on ESGF
pub struct Cli {
    /// Read settings from this file as well
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show debug output
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub flow: FlowArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct FlowArgs {
    /// Return only ESGF search results
    #[arg(long)]
    pub remote: bool,

    /// Return only local files matching the search
    #[arg(long)]
    pub local: bool,

    /// Return only datasets published on ESGF and missing locally
    #[arg(long)]
    pub missing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Local results, then what is missing locally.
    Default,
    Local,
    Remote,
    Missing,
}

impl FlowArgs {
    pub fn flow(&self) -> Flow {
        if self.remote {
            Flow::Remote
        } else if self.local {
            Flow::Local
        } else if self.missing {
            Flow::Missing
        } else {
            Flow::Default
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search CMIP5 simulations
    Cmip5(Cmip5Args),
    /// Search CMIP6 simulations
    Cmip6(Cmip6Args),
    /// Create the local catalog tables
    InitCatalog,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per dataset directory
    #[default]
    Dataset,
    /// One line per file
    File,
}

#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Free-text terms, every one must appear in the path
    pub query: Vec<String>,

    /// Return every version instead of only the latest
    #[arg(long)]
    pub all_versions: bool,

    /// Print dataset directories or individual files
    #[arg(long, value_enum, default_value_t = OutputFormat::Dataset)]
    pub format: OutputFormat,

    /// Save results to <PROJECT>_query.csv
    #[arg(long)]
    pub csv: bool,

    /// Save results to <PROJECT>_query.parquet
    #[arg(long)]
    pub parquet: bool,

    /// Print model and member counts
    #[arg(long)]
    pub stats: bool,

    /// Include replicas in ESGF results
    #[arg(long)]
    pub replica: bool,

    /// Search only the configured ESGF node
    #[arg(long)]
    pub no_distrib: bool,

    /// CF standard name, narrows ESGF searches: air_temperature ...
    #[arg(long, visible_alias = "cf_standard_name")]
    pub cf_standard_name: Vec<String>,

    /// Attributes that must have all requested values, e.g. --and variable
    #[arg(long = "and", value_name = "COL")]
    pub and: Vec<String>,

    /// Attributes identifying a simulation for --and (default: model and member)
    #[arg(long, value_name = "COL", requires = "and")]
    pub fixed: Vec<String>,
}

impl CommonArgs {
    pub fn latest(&self) -> bool {
        !self.all_versions
    }

    pub fn free_text(&self) -> String {
        self.query.join(" ")
    }
}

#[derive(Args, Debug, Default)]
pub struct Cmip5Args {
    /// CMIP5 experiment: piControl, rcp85, amip ...
    #[arg(long, short = 'e')]
    pub experiment: Vec<String>,

    /// CMIP5 experiment family: Decadal, RCP ...
    #[arg(long)]
    pub experiment_family: Vec<String>,

    /// CMIP5 model acronym: ACCESS1.3, MIROC5 ...
    #[arg(long, short = 'm')]
    pub model: Vec<String>,

    /// CMIP5 CMOR table: Amon, day, Omon ...
    #[arg(long = "table", visible_alias = "mip", short = 't')]
    pub cmor_table: Vec<String>,

    /// Variable name as shown in filenames: tas, pr, sic ...
    #[arg(long, short = 'v')]
    pub variable: Vec<String>,

    /// CMIP5 ensemble member: r#i#p#
    #[arg(long, visible_alias = "member")]
    pub ensemble: Vec<String>,

    #[arg(long = "frequency")]
    pub time_frequency: Vec<String>,

    #[arg(long)]
    pub realm: Vec<String>,

    /// Modelling group: MIROC, IPSL, MRI ...
    #[arg(long = "institution")]
    pub institute: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl Cmip5Args {
    pub fn constraints(&self) -> Result<FacetConstraints> {
        let supplied = facet_map([
            ("experiment", &self.experiment),
            ("experiment_family", &self.experiment_family),
            ("model", &self.model),
            ("cmor_table", &self.cmor_table),
            ("variable", &self.variable),
            ("ensemble", &self.ensemble),
            ("time_frequency", &self.time_frequency),
            ("realm", &self.realm),
            ("institute", &self.institute),
        ]);

        FacetConstraints::from_map(Project::Cmip5, &supplied)
    }
}

#[derive(Args, Debug, Default)]
pub struct Cmip6Args {
    /// CMIP6 MIP: CMIP, ScenarioMIP ...
    #[arg(long = "activity", visible_alias = "mip")]
    pub activity_id: Vec<String>,

    /// CMIP6 experiment: historical, ssp585 ...
    #[arg(long = "experiment", short = 'e')]
    pub experiment_id: Vec<String>,

    #[arg(long)]
    pub source_type: Vec<String>,

    /// CMIP6 CMOR table: Amon, SIday, Oday ...
    #[arg(long = "table", short = 't')]
    pub table_id: Vec<String>,

    /// CMIP6 model id: GFDL-AM4, CNRM-CM6-1 ...
    #[arg(long = "model", visible_alias = "source-id", short = 'm')]
    pub source_id: Vec<String>,

    /// CMIP6 variable name as in filenames
    #[arg(long = "variable", short = 'v')]
    pub variable_id: Vec<String>,

    /// CMIP6 member id: <sub-exp-id>-r#i#p#f#
    #[arg(long = "member")]
    pub member_id: Vec<String>,

    /// Grid label, gn for the model native grid
    #[arg(long = "grid", visible_alias = "grid-label", short = 'g')]
    pub grid_label: Vec<String>,

    /// Approximate resolution: "250 km"
    #[arg(long = "resolution", visible_alias = "nominal-resolution")]
    pub nominal_resolution: Vec<String>,

    #[arg(long)]
    pub frequency: Vec<String>,

    #[arg(long)]
    pub realm: Vec<String>,

    /// Hindcast and forecast start year: sYYYY
    #[arg(long)]
    pub sub_experiment_id: Vec<String>,

    /// Model variant: r#i#p#f#
    #[arg(long)]
    pub variant_label: Vec<String>,

    /// Modelling group: IPSL, NOAA-GFDL ...
    #[arg(long = "institution")]
    pub institution_id: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl Cmip6Args {
    pub fn constraints(&self) -> Result<FacetConstraints> {
        let supplied = facet_map([
            ("activity_id", &self.activity_id),
            ("experiment_id", &self.experiment_id),
            ("source_type", &self.source_type),
            ("table_id", &self.table_id),
            ("source_id", &self.source_id),
            ("variable_id", &self.variable_id),
            ("member_id", &self.member_id),
            ("grid_label", &self.grid_label),
            ("nominal_resolution", &self.nominal_resolution),
            ("frequency", &self.frequency),
            ("realm", &self.realm),
            ("sub_experiment_id", &self.sub_experiment_id),
            ("variant_label", &self.variant_label),
            ("institution_id", &self.institution_id),
        ]);

        FacetConstraints::from_map(Project::Cmip6, &supplied)
    }
}

// Options left empty are not constraints.
fn facet_map<'a>(
    options: impl IntoIterator<Item = (&'a str, &'a Vec<String>)>,
) -> BTreeMap<String, Vec<String>> {
    options
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| (key.to_string(), values.clone()))
        .collect()
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

// -- Tests -------------------------------------------------------------------
