//! Model and ensemble member counts over query results.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::catalog::SimulationRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub models: BTreeSet<String>,
    pub model_members: BTreeSet<(String, String)>,
    /// Member count -> models with that many members.
    pub by_member_count: BTreeMap<usize, BTreeSet<String>>,
}

pub fn summarise(records: &[SimulationRecord]) -> QueryStats {
    let mut members: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for record in records {
        let Some(model) = record.facet(record.project.model_facet()) else {
            continue;
        };
        let entry = members.entry(model.to_string()).or_default();
        if let Some(member) = record.facet(record.project.member_facet()) {
            entry.insert(member.to_string());
        }
    }

    let mut stats = QueryStats::default();
    for (model, set) in members {
        for member in &set {
            stats.model_members.insert((model.clone(), member.clone()));
        }
        stats
            .by_member_count
            .entry(set.len())
            .or_default()
            .insert(model.clone());
        stats.models.insert(model);
    }

    stats
}

impl fmt::Display for QueryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.models.is_empty() {
            return writeln!(f, "No results are available for this query");
        }

        writeln!(f, "Query summary")?;
        writeln!(f)?;
        writeln!(f, "{} model/s are available:", self.models.len())?;
        writeln!(f, "{}", join(&self.models))?;
        writeln!(f)?;
        writeln!(
            f,
            "A total of {} unique model-member combinations are available.",
            self.model_members.len()
        )?;
        for (count, models) in &self.by_member_count {
            writeln!(f)?;
            writeln!(f, "{} model/s have {} member/s:", models.len(), count)?;
            writeln!(f, "{}", join(models))?;
        }

        Ok(())
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(" ")
}

// -- Tests -------------------------------------------------------------------
