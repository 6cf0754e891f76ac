//! Local vs. remote dataset reconciliation.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::{catalog::SimulationRecord, dataset_id::DatasetId, vocabulary::Vocabulary};

/// Datasets published remotely with no local copy.
pub fn missing(local: &BTreeSet<DatasetId>, remote: &BTreeSet<DatasetId>) -> BTreeSet<DatasetId> {
    remote.difference(local).cloned().collect()
}

/// Dataset ids of local records. Records that cannot be identified (missing
/// facet or version) are left out.
pub fn local_ids(records: &[SimulationRecord], vocabulary: &Vocabulary) -> BTreeSet<DatasetId> {
    records
        .iter()
        .filter_map(|r| {
            let id = DatasetId::from_record(r, vocabulary);
            if id.is_none() {
                debug!(path = %r.path, "record has no dataset id");
            }
            id
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub local: BTreeSet<DatasetId>,
    pub remote: BTreeSet<DatasetId>,
    pub missing: BTreeSet<DatasetId>,
}

impl Reconciliation {
    pub fn new(local: BTreeSet<DatasetId>, remote: BTreeSet<DatasetId>) -> Self {
        let missing = missing(&local, &remote);
        info!(
            local = local.len(),
            remote = remote.len(),
            missing = missing.len(),
            "reconciled local and remote datasets"
        );

        Reconciliation {
            local,
            remote,
            missing,
        }
    }

    pub fn from_records(
        local: &[SimulationRecord],
        remote: impl IntoIterator<Item = DatasetId>,
        vocabulary: &Vocabulary,
    ) -> Self {
        Self::new(local_ids(local, vocabulary), remote.into_iter().collect())
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

// -- Tests -------------------------------------------------------------------
