//! End-to-end tests of the export pipeline against real Parquet files.
//!
//! Rows come from an in-memory [`QuerySource`], so these tests need no
//! database. Live PostgreSQL coverage is in `postgres_tests.rs`.

mod common;

use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use arrow::array::{Array, Int32Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use common::{read_parquet, MemorySource, MemoryTable};
use pg2parquet::{
    export_query_to_parquet, export_table_to_parquet, export_tables_to_parquet, BatchWriter,
    ExportError, ExportOptions, ExportPipeline, ParquetBatchWriter, ParquetCompression,
    ConnectionError, ConversionError, PipelineState, QueryError,
};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn ids_and_names(batches: &[RecordBatch]) -> Vec<(i32, String)> {
    let mut out = Vec::new();
    for batch in batches {
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("id column should be Int32");
        let names = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("name column should be Utf8");
        for i in 0..batch.num_rows() {
            out.push((ids.value(i), names.value(i).to_string()));
        }
    }
    out
}

/// Parquet writer that counts `write_batch` calls.
struct CountingWriter {
    inner: ParquetBatchWriter,
    calls: Rc<Cell<usize>>,
}

impl BatchWriter for CountingWriter {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), ExportError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.write_batch(batch)
    }

    fn close(self) -> Result<(), ExportError> {
        self.inner.close()
    }
}

// ============================================================================
// Row Preservation
// ============================================================================

#[test]
fn test_rows_preserved_for_all_batch_sizes() {
    let dir = TempDir::new().unwrap();

    for row_count in [0, 1, 5, 12] {
        for batch_size in [1, 2, 3, 5, 7, 10_000] {
            let mut source =
                MemorySource::with_tables(vec![MemoryTable::sequential("items", row_count)]);
            let path = dir.path().join(format!("items_{row_count}_{batch_size}.parquet"));
            let options = ExportOptions::default().with_batch_size(batch_size);

            let summary = export_table_to_parquet(&mut source, "items", &path, &options).unwrap();
            assert_eq!(summary.rows, row_count as u64);

            let (_, batches) = read_parquet(&path);
            let rows = ids_and_names(&batches);
            let expected: Vec<(i32, String)> =
                (0..row_count).map(|i| (i, format!("row-{i}"))).collect();
            assert_eq!(rows, expected, "R={row_count} B={batch_size}");
        }
    }
}

#[test]
fn test_batch_count_matches_flush_rule() {
    let dir = TempDir::new().unwrap();
    // One leading empty flush, one per full batch after it, one trailing.
    for (row_count, batch_size, expected_batches) in
        [(0, 10, 1), (1, 10_000, 2), (3, 1, 4), (6, 3, 3), (7, 3, 4), (10, 5, 3)]
    {
        let mut source =
            MemorySource::with_tables(vec![MemoryTable::sequential("items", row_count)]);
        let path = dir.path().join("batches.parquet");
        let options = ExportOptions::default().with_batch_size(batch_size);

        let summary = export_table_to_parquet(&mut source, "items", &path, &options).unwrap();
        assert_eq!(
            summary.batches, expected_batches,
            "R={row_count} B={batch_size}"
        );
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_three_rows_batch_size_one() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abc.parquet");
    let mut source = MemorySource::with_tables(vec![MemoryTable::id_name(
        "letters",
        &[(1, "a"), (2, "b"), (3, "c")],
    )]);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let options = ExportOptions::default().with_batch_size(1);
    let mut pipeline = ExportPipeline::new(&mut source, options);
    let summary = pipeline
        .run(
            "SELECT * FROM \"letters\";",
            &path.display().to_string(),
            |schema| {
                Ok(CountingWriter {
                    inner: ParquetBatchWriter::create(&path, schema, ParquetCompression::None)?,
                    calls: counter,
                })
            },
        )
        .unwrap();

    assert_eq!(pipeline.state(), PipelineState::Closed);
    assert_eq!(calls.get(), 4);
    assert_eq!(summary.rows, 3);

    let (_, batches) = read_parquet(&path);
    assert_eq!(
        ids_and_names(&batches),
        vec![(1, "a".to_string()), (2, "b".to_string()), (3, "c".to_string())]
    );
}

#[test]
fn test_empty_table_produces_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.parquet");
    let mut source = MemorySource::with_tables(vec![MemoryTable::id_name("empty", &[])]);

    let summary =
        export_table_to_parquet(&mut source, "empty", &path, &ExportOptions::default()).unwrap();
    assert_eq!(summary.rows, 0);

    let (schema, batches) = read_parquet(&path);
    assert_eq!(schema.fields().len(), 2);
    assert_eq!(schema.field(0).name(), "id");
    assert_eq!(schema.field(0).data_type(), &DataType::Int32);
    assert_eq!(schema.field(1).name(), "name");
    assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 0);
}

#[test]
fn test_schema_carries_postgres_type_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.parquet");
    let mut source = MemorySource::with_tables(vec![MemoryTable::id_name("meta", &[(1, "x")])]);

    export_table_to_parquet(&mut source, "meta", &path, &ExportOptions::default()).unwrap();

    let (schema, _) = read_parquet(&path);
    assert_eq!(
        schema.field(0).metadata().get(pg2parquet::types::POSTGRES_TYPE_METADATA_KEY),
        Some(&"int4".to_string())
    );
}

#[test]
fn test_query_export_probes_with_limit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("query.parquet");
    let mut source =
        MemorySource::with_tables(vec![MemoryTable::id_name("users", &[(1, "a"), (2, "b")])]);

    let query = "SELECT * FROM users LIMIT 50;";
    export_query_to_parquet(&mut source, query, &path, &ExportOptions::default()).unwrap();

    assert_eq!(source.probes, vec!["SELECT * FROM users LIMIT 1;"]);
    assert_eq!(source.streams, vec![query]);
}

#[test]
fn test_probe_failure_creates_no_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.parquet");
    let mut source = MemorySource::default();

    let err = export_table_to_parquet(&mut source, "missing", &path, &ExportOptions::default())
        .unwrap_err();

    assert!(matches!(
        err,
        ExportError::Query(QueryError::ProbeFailed { .. })
    ));
    assert!(err.is_fatal_before_output());
    assert!(!path.exists());
}

// ============================================================================
// Incomplete Output
// ============================================================================

#[test]
fn test_connection_loss_before_writing_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.parquet");
    fs::write(&path, b"earlier export").unwrap();

    let mut source = MemorySource::with_tables(vec![MemoryTable::sequential("users", 3)]);
    source.lose_connection_on_schema_lookup = true;

    let err = export_table_to_parquet(&mut source, "users", &path, &ExportOptions::default())
        .unwrap_err();

    assert!(matches!(
        err,
        ExportError::Connection(ConnectionError::ConnectionLost(_))
    ));
    assert_eq!(err.partial_output(), None);
    assert_eq!(fs::read(&path).unwrap(), b"earlier export");
}

#[test]
fn test_unwritable_output_leaves_nothing_partial() {
    let dir = TempDir::new().unwrap();
    // A directory cannot be opened as the output file.
    let path = dir.path().join("users.parquet");
    fs::create_dir(&path).unwrap();

    let mut source = MemorySource::with_tables(vec![MemoryTable::sequential("users", 3)]);
    let err = export_table_to_parquet(&mut source, "users", &path, &ExportOptions::default())
        .unwrap_err();

    assert!(matches!(err, ExportError::Io(_)));
    assert_eq!(err.partial_output(), None);
    assert!(path.is_dir());
}

#[test]
fn test_mid_stream_failure_reports_incomplete_output() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.parquet");

    let mut table = MemoryTable::sequential("users", 2);
    table
        .rows
        .push(pg2parquet::Row::from_pairs([("id", pg2parquet::Value::Boolean(true))]));
    let mut source = MemorySource::with_tables(vec![table]);

    let err = export_table_to_parquet(&mut source, "users", &path, &ExportOptions::default())
        .unwrap_err();

    match &err {
        ExportError::Interrupted { output, source } => {
            assert_eq!(output, &path);
            assert!(matches!(
                **source,
                ExportError::Conversion(ConversionError::TypeMismatch { .. })
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.partial_output(), Some(path.as_path()));
    assert!(path.exists());
}

// ============================================================================
// Multi-table Export
// ============================================================================

#[test]
fn test_export_all_tables_sorted() {
    let dir = TempDir::new().unwrap();
    let mut source = MemorySource::with_tables(vec![
        MemoryTable::sequential("zebra", 3),
        MemoryTable::sequential("apple", 2),
        MemoryTable::sequential("mango", 0),
    ]);

    let exported = export_tables_to_parquet(
        &mut source,
        dir.path(),
        &ExportOptions::default().with_compression(ParquetCompression::Zstd),
    )
    .unwrap();

    let order: Vec<&str> = exported.iter().map(|e| e.table.as_str()).collect();
    assert_eq!(order, vec!["apple", "mango", "zebra"]);

    for export in &exported {
        assert_eq!(export.path, dir.path().join(format!("{}.parquet", export.table)));
        let (_, batches) = read_parquet(&export.path);
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows as u64, export.summary.rows);
    }
}

#[test]
fn test_export_all_tables_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let mut broken = MemoryTable::sequential("broken", 2);
    broken.rows.push(pg2parquet::Row::from_pairs([(
        "id",
        pg2parquet::Value::Boolean(true),
    )]));

    let mut source = MemorySource::with_tables(vec![
        MemoryTable::sequential("after", 1),
        broken,
        MemoryTable::sequential("alpha", 1),
    ]);

    let err = export_tables_to_parquet(&mut source, dir.path(), &ExportOptions::default())
        .unwrap_err();

    match &err {
        ExportError::Target { target, .. } => assert_eq!(target, "broken"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("broken"));
    assert_eq!(
        err.partial_output(),
        Some(dir.path().join("broken.parquet").as_path())
    );

    let written: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    // "after" and "alpha" sort first; "broken" left its partial file behind.
    assert!(written.contains(&"after.parquet".to_string()));
    assert!(written.contains(&"alpha.parquet".to_string()));
    assert!(written.contains(&"broken.parquet".to_string()));
}
