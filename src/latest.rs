//! Keeps only the most recent version of each simulation.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::{
    catalog::SimulationRecord,
    facet::{Facet, Project},
};

/// For every group of records sharing project and facets, keeps the record
/// with the greatest version. Ties go to the record seen last. Groups keep the
/// position of their first record.
pub fn select_latest(records: Vec<SimulationRecord>) -> Vec<SimulationRecord> {
    if records.len() <= 1 {
        return records;
    }
    warn_on_irregular_versions(&records);

    let before = records.len();
    let mut index: HashMap<(Project, BTreeMap<Facet, String>), usize> = HashMap::new();
    let mut kept: Vec<SimulationRecord> = Vec::new();

    for record in records {
        let key = (record.project, record.facets.clone());
        match index.get(&key) {
            Some(&idx) => {
                if record.version >= kept[idx].version {
                    kept[idx] = record;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    debug!(before, after = kept.len(), "latest versions selected");

    kept
}

// String ordering only matches time ordering for vYYYYMMDD-style tokens.
fn warn_on_irregular_versions(records: &[SimulationRecord]) {
    for version in records.iter().filter_map(|r| r.version.as_deref()) {
        if version.len() != 8 || !version.chars().all(|c| c.is_ascii_digit()) {
            warn!(version, "version is not an 8-digit date, latest selection may be wrong");
        }
    }
}

// -- Tests -------------------------------------------------------------------
