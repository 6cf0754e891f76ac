//! Arrow layout of query results.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, BooleanArray, Date32Array, RecordBatch, StringArray},
    datatypes::{DataType, Date32Type, Field, Schema},
};

use crate::{
    catalog::SimulationRecord,
    error::Result,
    facet::{Facet, Project},
};

/// Facets left out of exports.
const IGNORED: [Facet; 5] = [
    Facet::Institute,
    Facet::Project,
    Facet::InstitutionId,
    Facet::Realm,
    Facet::Product,
];

/// Exported facet columns, in record order.
pub fn facet_columns(project: Project) -> Vec<Facet> {
    project
        .record_facets()
        .iter()
        .filter(|f| !IGNORED.contains(f))
        .copied()
        .collect()
}

pub fn schema(project: Project) -> Schema {
    let mut fields: Vec<Field> = facet_columns(project)
        .iter()
        .map(|f| Field::new(f.key(), DataType::Utf8, true))
        .collect();
    fields.extend([
        Field::new("version", DataType::Utf8, true),
        Field::new("path", DataType::Utf8, false),
        Field::new("fdate", DataType::Date32, true),
        Field::new("tdate", DataType::Date32, true),
        Field::new("time_complete", DataType::Boolean, false),
    ]);

    Schema::new(fields)
}

/// One row per record. All records must belong to `project`.
pub fn to_batch(project: Project, records: &[SimulationRecord]) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = facet_columns(project)
        .iter()
        .map(|f| {
            let values: StringArray = records.iter().map(|r| r.facet(*f)).collect();
            Arc::new(values) as ArrayRef
        })
        .collect();

    let versions: StringArray = records.iter().map(|r| r.version.as_deref()).collect();
    let paths: StringArray = records.iter().map(|r| Some(r.path.as_str())).collect();
    let fdates: Date32Array = records
        .iter()
        .map(|r| r.fdate.map(Date32Type::from_naive_date))
        .collect();
    let tdates: Date32Array = records
        .iter()
        .map(|r| r.tdate.map(Date32Type::from_naive_date))
        .collect();
    let complete: BooleanArray = records.iter().map(|r| Some(r.time_complete)).collect();

    columns.extend([
        Arc::new(versions) as ArrayRef,
        Arc::new(paths) as ArrayRef,
        Arc::new(fdates) as ArrayRef,
        Arc::new(tdates) as ArrayRef,
        Arc::new(complete) as ArrayRef,
    ]);

    let batch = RecordBatch::try_new(Arc::new(schema(project)), columns)?;

    Ok(batch)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use arrow::array::Array;
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn should_skip_ignored_columns() {
        let schema = schema(Project::Cmip5);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();

        assert!(names.contains(&"model"));
        assert!(names.contains(&"variable"));
        for ignored in ["institute", "project", "realm", "product", "periods", "filename"] {
            assert!(!names.contains(&ignored), "{ignored} should not be exported");
        }
        assert_eq!(names.last(), Some(&"time_complete"));
    }

    #[test]
    fn should_export_cmip6_variable_once() {
        let schema = schema(Project::Cmip6);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();

        assert!(names.contains(&"variable_id"));
        assert!(!names.contains(&"variable"));
        let unique: std::collections::BTreeSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn should_build_batch() {
        let mut record = SimulationRecord::new(Project::Cmip6, "/cmip6/CESM2/v20190308")
            .with_facet(Facet::SourceId, "CESM2")
            .with_version("20190308");
        record.fdate = NaiveDate::from_ymd_opt(1850, 1, 1);
        record.time_complete = true;
        let bare = SimulationRecord::new(Project::Cmip6, "/cmip6/other");

        let batch = to_batch(Project::Cmip6, &[record, bare]).unwrap();

        assert_eq!(batch.num_rows(), 2);
        let source = batch.column_by_name("source_id").unwrap();
        assert!(source.is_valid(0));
        assert!(source.is_null(1));
        let tdate = batch.column_by_name("tdate").unwrap();
        assert_eq!(tdate.null_count(), 2);
    }
}
