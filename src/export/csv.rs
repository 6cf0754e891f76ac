use std::{fs::File, path::Path};

use arrow::{array::RecordBatch, csv::WriterBuilder};

use crate::error::Result;

pub fn save(batch: &RecordBatch, file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;

    Ok(())
}
