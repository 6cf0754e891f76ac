use std::{fmt::Write, path::Path};

use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::{
    catalog::{self, Column, SimulationRecord},
    error::FinderError,
    cli::{create_spinner, CommonArgs, Flow, OutputFormat},
    esgf::{EsgfClient, RemoteQuery, RemoteSearch},
    export::{self, Format},
    facet::{FacetConstraints, Project},
    finder::{nothing_found, Finder, Source},
    path::file_path,
    settings::Settings,
    stats,
    vocabulary::{check_values, Vocabularies},
};

/// Runs a cmip5 or cmip6 search and returns the text to print.
pub async fn search(
    flow: Flow,
    constraints: &FacetConstraints,
    args: &CommonArgs,
    settings: &Settings,
    vocabularies: &Vocabularies,
) -> Result<String> {
    check_values(constraints, vocabularies.get(constraints.project()))?;

    // remote searches never read the catalog
    let conn = match flow {
        Flow::Remote => Connection::open_in_memory()?,
        _ => catalog::open(&settings.catalog.path)?,
    };
    let normalizer = settings.normalizer();
    let finder = Finder::new(&conn, vocabularies, &normalizer);
    let client = EsgfClient::new(&settings.esgf)?;

    run(flow, &finder, &client, constraints, args, settings).await
}

async fn run<R: RemoteSearch>(
    flow: Flow,
    finder: &Finder<'_>,
    remote: &R,
    constraints: &FacetConstraints,
    args: &CommonArgs,
    settings: &Settings,
) -> Result<String> {
    finder.prepare(constraints)?;
    let query = remote_query(finder, constraints, args, settings);
    if flow != Flow::Remote && !args.cf_standard_name.is_empty() {
        warn!("--cf-standard-name narrows only the ESGF search");
    }

    if !args.and.is_empty() {
        return matching(flow, finder, remote, constraints, &query, args, settings).await;
    }

    let mut out = String::new();

    if flow == Flow::Remote {
        let bar = create_spinner("Searching ESGF...".to_string());
        let found = remote.search(&query).await;
        bar.finish_and_clear();

        let found = match found {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "ESGF search failed");
                writeln!(out, "ESGF could not be searched: {e}")?;
                return Ok(out);
            }
        };
        if found.is_empty() {
            writeln!(out, "{}", nothing_found(Source::Remote, constraints))?;
        }
        for record in &found {
            debug!(
                id = %record.id,
                data_node = record.data_node.as_deref().unwrap_or("-"),
                "remote dataset"
            );
            writeln!(out, "{}", record.id)?;
        }
        return Ok(out);
    }

    let local = finder.search(constraints, &args.free_text(), args.latest())?;
    match &local {
        Some(records) => {
            if flow != Flow::Missing {
                write_listing(&mut out, records, args.format)?;
            }
            write_extras(&mut out, records, args, &settings.output.dir)?;
        }
        None if flow != Flow::Missing => {
            writeln!(out, "{}", nothing_found(Source::Local, constraints))?;
        }
        None => {}
    }

    if flow == Flow::Local {
        return Ok(out);
    }

    let bar = create_spinner("Comparing with ESGF...".to_string());
    let reconciliation = finder
        .missing(remote, constraints, &args.free_text(), &query)
        .await;
    bar.finish_and_clear();

    match reconciliation? {
        None => writeln!(out, "\nESGF could not be searched, missing datasets were not checked")?,
        Some(r) if r.is_complete() => {
            writeln!(out, "\nEverything available on ESGF is also available locally")?
        }
        Some(r) => {
            writeln!(out, "\nAvailable on ESGF but not locally:")?;
            for id in &r.missing {
                writeln!(out, "{id}")?;
            }
        }
    }

    Ok(out)
}

fn remote_query(
    finder: &Finder<'_>,
    constraints: &FacetConstraints,
    args: &CommonArgs,
    settings: &Settings,
) -> RemoteQuery {
    let mut query = RemoteQuery::from_constraints(constraints, finder.vocabulary(constraints))
        .with_free_text(&args.free_text())
        .with_terms("cf_standard_name", &args.cf_standard_name);
    query.latest = args.latest();
    query.replica = args.replica || settings.esgf.replica;
    query.distrib = settings.esgf.distrib && !args.no_distrib;

    query
}

/// Applies `--and` to local or remote results and lists the qualifying
/// simulations.
async fn matching<R: RemoteSearch>(
    flow: Flow,
    finder: &Finder<'_>,
    remote: &R,
    constraints: &FacetConstraints,
    query: &RemoteQuery,
    args: &CommonArgs,
    settings: &Settings,
) -> Result<String> {
    let project = constraints.project();
    let cols = columns(project, &args.and)?;
    let fixed = if args.fixed.is_empty() {
        vec![
            Column::Facet(project.model_facet()),
            Column::Facet(project.member_facet()),
        ]
    } else {
        columns(project, &args.fixed)?
    };

    let (source, remote) = match flow {
        Flow::Remote => (Source::Remote, Some((remote, query))),
        _ => (Source::Local, None),
    };

    let bar = create_spinner("Matching simulations...".to_string());
    let result = finder
        .matching(remote, constraints, &cols, &fixed, args.latest())
        .await;
    bar.finish_and_clear();

    let mut out = String::new();
    let result = match result {
        Err(FinderError::Remote(e)) => {
            warn!(error = %e, "ESGF search failed");
            writeln!(out, "ESGF could not be searched: {e}")?;
            return Ok(out);
        }
        result => result?,
    };
    let Some(result) = result else {
        writeln!(out, "{}", nothing_found(source, constraints))?;
        return Ok(out);
    };

    let keys = |cols: &[Column]| cols.iter().map(Column::key).collect::<Vec<_>>().join(", ");
    if result.is_empty() {
        writeln!(
            out,
            "No {} has every requested {}",
            keys(&fixed),
            keys(&cols)
        )?;
        return Ok(out);
    }

    writeln!(out, "Every requested {} is available for:", keys(&cols))?;
    for group in &result.groups {
        let fixed = group
            .fixed
            .iter()
            .map(|v| v.as_deref().unwrap_or("-"))
            .collect::<Vec<_>>()
            .join(" ");
        let versions = group.versions.iter().cloned().collect::<Vec<_>>().join(",");
        if versions.is_empty() {
            writeln!(out, "{fixed}")?;
        } else {
            writeln!(out, "{fixed} versions: {versions}")?;
        }
    }
    if source == Source::Local && args.format == OutputFormat::File {
        writeln!(out)?;
        write_listing(&mut out, &result.rows, args.format)?;
    }
    write_extras(&mut out, &result.rows, args, &settings.output.dir)?;

    Ok(out)
}

fn columns(project: Project, keys: &[String]) -> Result<Vec<Column>> {
    let cols = keys
        .iter()
        .map(|k| Column::parse(project, k))
        .collect::<crate::error::Result<Vec<_>>>()?;

    Ok(cols)
}

fn write_listing(
    out: &mut String,
    records: &[SimulationRecord],
    format: OutputFormat,
) -> std::fmt::Result {
    for record in records {
        match format {
            OutputFormat::Dataset => writeln!(out, "{}", record.path)?,
            OutputFormat::File => {
                for filename in &record.filenames {
                    writeln!(out, "{}", file_path(&record.path, filename).display())?;
                }
            }
        }
    }

    Ok(())
}

/// Statistics and exports requested alongside the listing.
fn write_extras(
    out: &mut String,
    records: &[SimulationRecord],
    args: &CommonArgs,
    dir: &Path,
) -> Result<()> {
    if args.stats {
        writeln!(out)?;
        write!(out, "{}", stats::summarise(records))?;
    }

    let formats = [(args.csv, Format::Csv), (args.parquet, Format::Parquet)];
    for (_, format) in formats.into_iter().filter(|(wanted, _)| *wanted) {
        if let Some(path) = export::save(records, dir, format)? {
            writeln!(out, "Results saved to `{}`", path.display())?;
        }
    }

    Ok(())
}

// -- Tests -------------------------------------------------------------------
