use std::{fs::File, path::Path};

use arrow::array::RecordBatch;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};

use crate::error::Result;

pub fn save(batch: &RecordBatch, file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    Ok(())
}
