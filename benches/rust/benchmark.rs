//! Benchmark for pg2parquet export throughput.
//!
//! Measures rows per second through the export pipeline, either against a
//! live PostgreSQL table or against synthetic in-memory rows (no database).

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use arrow::datatypes::SchemaRef;
use clap::{Parser, ValueEnum};
use pg2parquet::{
    export_query_to_parquet, export_table_to_parquet, ColumnDescriptor, ExportError,
    ExportOptions, ParquetCompression, PostgresSettings, PostgresSource, QuerySource, Row,
    RowStream, Value,
};
use postgres::NoTls;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
enum Operation {
    /// Export a generated table from PostgreSQL
    ExportTable,
    /// Export synthetic rows without a database
    InMemory,
}

#[derive(Parser, Debug)]
#[command(name = "benchmark")]
#[command(about = "Benchmark pg2parquet export throughput")]
struct Args {
    /// Operation to benchmark
    #[arg(long, value_enum)]
    operation: Operation,

    /// Number of rows to export
    #[arg(short, long, default_value = "1000000")]
    rows: i64,

    /// Rows per fetch and per batch
    #[arg(short, long, default_value = "10000")]
    batch_size: usize,

    /// Parquet compression
    #[arg(long, default_value_t = ParquetCompression::Snappy)]
    compression: ParquetCompression,

    /// Number of benchmark iterations
    #[arg(short, long, default_value = "5")]
    iterations: usize,

    /// Number of warmup iterations
    #[arg(short, long, default_value = "1")]
    warmup: usize,

    /// Output directory for the Parquet files
    #[arg(long, default_value = "benches/data")]
    data_dir: PathBuf,
}

/// Connection configuration from environment
fn settings_from_env() -> Result<PostgresSettings, Box<dyn std::error::Error>> {
    let host = env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("POSTGRES_PORT")
        .unwrap_or_else(|_| "5432".to_string())
        .parse()?;
    let database = env::var("POSTGRES_DB").unwrap_or_else(|_| "postgres".to_string());

    let mut settings = PostgresSettings::new(host, port, database);
    settings.user = env::var("POSTGRES_USER").ok();
    settings.password = env::var("POSTGRES_PASSWORD").ok();
    Ok(settings)
}

const BENCH_TABLE: &str = "pg2parquet_benchmark";

fn setup_table(settings: &PostgresSettings, rows: i64) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = settings.client_config()?.connect(NoTls)?;
    client.batch_execute(&format!(
        "DROP TABLE IF EXISTS {BENCH_TABLE};
         CREATE TABLE {BENCH_TABLE} AS
         SELECT g AS id,
                'name-' || g AS name,
                g * 1.5::float8 AS amount,
                g % 2 = 0 AS flag,
                now() - (g || ' seconds')::interval AS created_at
         FROM generate_series(1, {rows}) g;"
    ))?;
    Ok(())
}

/// Synthetic rows shaped like the benchmark table.
struct SyntheticSource {
    rows: i64,
}

struct SyntheticStream {
    next: i64,
    end: i64,
    names: std::sync::Arc<[String]>,
}

impl RowStream for SyntheticStream {
    fn next_row(&mut self) -> Result<Option<Row>, ExportError> {
        if self.next > self.end {
            return Ok(None);
        }
        let g = self.next;
        self.next += 1;
        Ok(Some(Row::new(
            self.names.clone(),
            vec![
                Value::Int64(g),
                Value::Utf8(format!("name-{g}")),
                Value::Float64(g as f64 * 1.5),
                Value::Boolean(g % 2 == 0),
            ],
        )))
    }
}

impl QuerySource for SyntheticSource {
    fn probe(&mut self, _probe_query: &str) -> Result<Vec<ColumnDescriptor>, ExportError> {
        Ok(vec![
            ColumnDescriptor::new("id", "int8"),
            ColumnDescriptor::new("name", "text"),
            ColumnDescriptor::new("amount", "float8"),
            ColumnDescriptor::new("flag", "bool"),
        ])
    }

    fn stream<'a>(
        &'a mut self,
        _query: &str,
        schema: &SchemaRef,
        _fetch_size: usize,
    ) -> Result<Box<dyn RowStream + 'a>, ExportError> {
        Ok(Box::new(SyntheticStream {
            next: 1,
            end: self.rows,
            names: schema.fields().iter().map(|f| f.name().clone()).collect(),
        }))
    }

    fn list_tables(&mut self) -> Result<Vec<String>, ExportError> {
        Ok(vec![BENCH_TABLE.to_string()])
    }
}

fn run_once(
    args: &Args,
    settings: Option<&PostgresSettings>,
) -> Result<(u64, f64), Box<dyn std::error::Error>> {
    let options = ExportOptions::default()
        .with_batch_size(args.batch_size)
        .with_compression(args.compression);
    let path = args.data_dir.join(format!("{BENCH_TABLE}.parquet"));

    let start = Instant::now();
    let summary = match settings {
        Some(settings) => {
            let mut source = PostgresSource::connect(settings)?;
            export_table_to_parquet(&mut source, BENCH_TABLE, &path, &options)?
        }
        None => {
            let mut source = SyntheticSource { rows: args.rows };
            export_query_to_parquet(
                &mut source,
                &format!("SELECT * FROM {BENCH_TABLE}"),
                &path,
                &options,
            )?
        }
    };
    Ok((summary.rows, start.elapsed().as_secs_f64()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.data_dir)?;

    let settings = match args.operation {
        Operation::ExportTable => {
            let settings = settings_from_env()?;
            println!("Preparing {} rows in {}...", args.rows, settings.display_target());
            setup_table(&settings, args.rows)?;
            Some(settings)
        }
        Operation::InMemory => None,
    };

    println!(
        "pg2parquet Export Benchmark: {:?} {} rows, batch size {}, {}",
        args.operation, args.rows, args.batch_size, args.compression
    );
    println!();

    // Warmup iterations
    println!("Running {} warmup iteration(s)...", args.warmup);
    for i in 0..args.warmup {
        let (rows, elapsed) = run_once(&args, settings.as_ref())?;
        println!("  Warmup {}: {} rows in {:.3}s", i + 1, rows, elapsed);
    }

    // Benchmark iterations
    println!("Running {} benchmark iteration(s)...", args.iterations);
    let mut times = Vec::with_capacity(args.iterations);
    let mut total_rows = 0;
    for i in 0..args.iterations {
        let (rows, elapsed) = run_once(&args, settings.as_ref())?;
        times.push(elapsed);
        total_rows = rows;
        println!(
            "  Iteration {}: {} rows in {:.3}s ({:.0} rows/s)",
            i + 1,
            rows,
            elapsed,
            rows as f64 / elapsed
        );
    }

    if times.is_empty() {
        return Ok(());
    }

    let avg_time: f64 = times.iter().sum::<f64>() / times.len() as f64;
    let min_time: f64 = times.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_time: f64 = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    println!();
    println!("Results:");
    println!("  Avg time: {:.3}s", avg_time);
    println!("  Min time: {:.3}s", min_time);
    println!("  Max time: {:.3}s", max_time);
    println!("  Rows/sec: {:.0}", total_rows as f64 / avg_time);

    Ok(())
}
