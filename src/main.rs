mod commands;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pg2parquet::{
    ExportOptions, ParquetCompression, PostgresSettings, DEFAULT_BATCH_SIZE, DEFAULT_OUTPUT_FILE,
};
use tracing::error;

#[derive(Parser)]
#[command(
    name = "pg2parquet",
    version,
    about = "Export PostgreSQL tables and queries to Parquet files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// PostgreSQL host
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost", global = true)]
    host: String,

    /// PostgreSQL port
    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432, global = true)]
    port: u16,

    /// PostgreSQL user (requires a password)
    #[arg(long, env = "POSTGRES_USER", global = true)]
    user: Option<String>,

    /// PostgreSQL password
    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Parquet compression codec (none, snappy, gzip, lz4, zstd)
    #[arg(long, default_value_t = ParquetCompression::Snappy, global = true)]
    compression: ParquetCompression,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every table of the public schema, one file per table
    ExportTables {
        /// Database to export from
        #[arg(long)]
        database: String,
        /// Existing directory for the output files
        #[arg(long)]
        folder: PathBuf,
        /// Rows per fetch and per written batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Export a single table
    ExportTable {
        /// Database to export from
        #[arg(long)]
        database: String,
        /// Table in the public schema
        #[arg(long)]
        table: String,
        /// Existing directory for the output file
        #[arg(long)]
        folder: PathBuf,
        /// Output file name inside the folder
        #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
        output_file: String,
        /// Rows per fetch and per written batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Export the result of a SELECT read from a file
    ExportQuery {
        /// Database to export from
        #[arg(long)]
        database: String,
        /// File holding the query text
        #[arg(long)]
        query_file: PathBuf,
        /// Existing directory for the output file
        #[arg(long)]
        folder: PathBuf,
        /// Output file name inside the folder
        #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
        output_file: String,
        /// Rows per fetch and per written batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

impl Cli {
    fn settings(&self, database: &str) -> PostgresSettings {
        PostgresSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: database.to_string(),
        }
    }

    fn options(&self, batch_size: usize) -> ExportOptions {
        ExportOptions::default()
            .with_batch_size(batch_size)
            .with_compression(self.compression)
    }
}

/// Load variables from a `.env` file, if there is one.
///
/// Variables already in the environment win over the file.
fn load_env_file(path: &Path) {
    dotenvy::from_path(path).ok();
}

fn main() -> ExitCode {
    load_env_file(Path::new(".env"));

    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let result = match &cli.command {
        Commands::ExportTables {
            database,
            folder,
            batch_size,
        } => commands::export_tables(&cli.settings(database), folder, &cli.options(*batch_size)),
        Commands::ExportTable {
            database,
            table,
            folder,
            output_file,
            batch_size,
        } => commands::export_table(
            &cli.settings(database),
            table,
            &folder.join(output_file),
            &cli.options(*batch_size),
        ),
        Commands::ExportQuery {
            database,
            query_file,
            folder,
            output_file,
            batch_size,
        } => commands::export_query(
            &cli.settings(database),
            query_file,
            &folder.join(output_file),
            &cli.options(*batch_size),
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
