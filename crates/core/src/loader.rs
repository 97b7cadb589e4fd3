use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use arrow::array::Array;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::ChunkReader;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::dataset::Dataset;
use crate::error::{AlarmLogError, Result};

/// Table formats recognized directly or inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    /// Detect a table format from a file name's extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Some(Self::Csv)
        } else if lower.ends_with(".parquet") {
            Some(Self::Parquet)
        } else {
            None
        }
    }
}

/// Load a table file, or the first table inside a `.zip` archive.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let name = path.to_string_lossy();
    let dataset = if name.to_ascii_lowercase().ends_with(".zip") {
        load_from_archive(path)?
    } else {
        match TableFormat::from_name(&name) {
            Some(TableFormat::Csv) => read_csv(File::open(path)?)?,
            Some(TableFormat::Parquet) => read_parquet(File::open(path)?)?,
            None => return Err(AlarmLogError::UnsupportedFormat(name.into_owned())),
        }
    };
    info!(
        "Loaded {} rows x {} columns from {}",
        dataset.len(),
        dataset.columns().len(),
        path.display()
    );
    Ok(dataset)
}

fn load_from_archive(path: &Path) -> Result<Dataset> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    // Central-directory order decides which table is "first".
    let mut selected = None;
    for idx in 0..archive.len() {
        let entry = archive.by_index(idx)?;
        if entry.is_dir() {
            continue;
        }
        if let Some(format) = TableFormat::from_name(entry.name()) {
            selected = Some((idx, format, entry.name().to_string()));
            break;
        }
    }
    let Some((idx, format, entry_name)) = selected else {
        return Err(AlarmLogError::NoTableFound(path.display().to_string()));
    };

    debug!(entry = %entry_name, "Reading table from archive");
    let mut buf = Vec::new();
    archive.by_index(idx)?.read_to_end(&mut buf)?;
    match format {
        TableFormat::Csv => read_csv(Cursor::new(buf)),
        TableFormat::Parquet => read_parquet(Bytes::from(buf)),
    }
}

fn read_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Dataset::new(columns, rows))
}

fn read_parquet<T: ChunkReader + 'static>(source: T) -> Result<Dataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(source)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    let reader = builder.build()?;

    let options = FormatOptions::default();
    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let formatters = batch
            .columns()
            .iter()
            .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row_idx in 0..batch.num_rows() {
            let row = batch
                .columns()
                .iter()
                .zip(&formatters)
                .map(|(col, fmt)| {
                    if col.is_null(row_idx) {
                        String::new()
                    } else {
                        fmt.value(row_idx).to_string()
                    }
                })
                .collect();
            rows.push(row);
        }
    }
    Ok(Dataset::new(columns, rows))
}
