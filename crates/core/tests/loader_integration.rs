//! Integration tests for dataset loading from flat files and archives.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use alarmlog_core::{load_dataset, AlarmLogError, Serial};

const CSV_BODY: &str = "serial,timestamp,alarm\n1,00:00:01,3\n1,00:00:02,4\n2,00:00:01,9\n";

fn write_file(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (entry, body) in entries {
        zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn parquet_bytes() -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("serial", DataType::Int64, false),
        Field::new("timestamp", DataType::Utf8, true),
        Field::new("alarm", DataType::Int64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![7, 7, 8])),
        Arc::new(StringArray::from(vec![Some("00:01"), None, Some("00:03")])),
        Arc::new(Int64Array::from(vec![1, 2, 3])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buf
}

#[test]
fn loads_plain_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "alarms.csv", CSV_BODY.as_bytes());
    let ds = load_dataset(&path).unwrap();
    assert_eq!(ds.len(), 3);
    assert_eq!(ds.columns(), ["serial", "timestamp", "alarm"]);
}

#[test]
fn archive_uses_first_table_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        dir.path(),
        "bundle.zip",
        &[
            ("README.txt", b"not a table"),
            ("logs/first.CSV", CSV_BODY.as_bytes()),
            ("logs/second.csv", b"serial,timestamp,alarm\n5,00:01,1\n"),
        ],
    );
    let ds = load_dataset(&path).unwrap();
    assert_eq!(ds.len(), 3);
}

#[test]
fn archive_without_table_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(dir.path(), "empty.zip", &[("notes.txt", b"hello")]);
    let err = load_dataset(&path).unwrap_err();
    assert!(matches!(err, AlarmLogError::NoTableFound(_)), "got {err:?}");
}

#[test]
fn loads_parquet_directly_and_from_archive() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = parquet_bytes();
    let direct = write_file(dir.path(), "alarms.parquet", &bytes);
    let zipped = write_zip(dir.path(), "alarms.zip", &[("alarms.parquet", &bytes)]);

    for path in [direct, zipped] {
        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.rows()[0], vec!["7", "00:01", "1"]);
        // Null timestamp becomes an empty cell and is dropped downstream.
        assert_eq!(ds.rows()[1][1], "");
        let extraction = ds.alarm_records().unwrap();
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.dropped_timestamps, 1);
        assert_eq!(extraction.records[1].machine_serial, Serial::Int(8));
    }
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_dataset(&dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, AlarmLogError::Io(_)));
}
