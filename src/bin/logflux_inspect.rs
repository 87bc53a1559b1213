// SPDX-License-Identifier: MIT OR Apache-2.0

//! logflux-inspect: look inside the stores an analysis produced.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use rusqlite::types::Value;

use logflux::core::config::{init_logging, LogLevel, LoggingConfig};
use logflux::core::projection::{
    apply_filter, reset_filter, DbConnection, DbInfo, FilterExpression, StoreReader, SCHEMA_TABLE,
};
use logflux::LogFluxResult;

#[derive(Parser)]
#[command(name = "logflux-inspect")]
#[command(about = "Inspect LogFlux projection stores")]
#[command(version)]
struct Cli {
    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables of a store
    Tables {
        /// Path to the store
        store: PathBuf,
    },
    /// Print rows of a projected table
    Rows {
        store: PathBuf,

        /// Data table: events, metrics, nodes or links
        #[arg(short, long, default_value = "events")]
        table: String,

        /// Only rows in the current filter
        #[arg(long)]
        filtered: bool,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long, default_value_t = 100)]
        limit: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Restrict the filter table to rows matching an SQL expression
    Filter {
        store: PathBuf,

        /// Boolean expression over the table's columns, e.g. "status >= 500"
        expression: String,

        #[arg(short, long, default_value = "events")]
        table: String,
    },
    /// Make every row visible again
    ResetFilter {
        store: PathBuf,

        #[arg(short, long, default_value = "events")]
        table: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match LogLevel::parse(&cli.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&LoggingConfig { level });

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> LogFluxResult<()> {
    match command {
        Commands::Tables { store } => list_tables(&store),
        Commands::Rows {
            store,
            table,
            filtered,
            offset,
            limit,
            format,
        } => print_rows(&store, &table, filtered, offset, limit, format),
        Commands::Filter {
            store,
            expression,
            table,
        } => {
            let expr = FilterExpression::parse(&expression)?;
            let db = DbConnection::open(&store_info(&store))?;
            let visible = apply_filter(db.connection(), &table, &expr)?;
            db.close()?;
            println!("{} rows visible", visible);
            Ok(())
        }
        Commands::ResetFilter { store, table } => {
            let db = DbConnection::open(&store_info(&store))?;
            let visible = reset_filter(db.connection(), &table)?;
            db.close()?;
            println!("{} rows visible", visible);
            Ok(())
        }
    }
}

fn store_info(path: &Path) -> Arc<DbInfo> {
    DbInfo::root(path)
}

fn list_tables(store: &Path) -> LogFluxResult<()> {
    let db = DbConnection::open_read_only(&store_info(store))?;
    let mut stmt = db
        .connection()
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name != ?1 ORDER BY name")?;
    let names = stmt
        .query_map([SCHEMA_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for name in names {
        let count: i64 = db
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", name), [], |row| row.get(0))?;
        println!("{:<24} {:>10}", name, count);
    }
    Ok(())
}

fn print_rows(
    store: &Path,
    table: &str,
    filtered: bool,
    offset: usize,
    limit: usize,
    format: OutputFormat,
) -> LogFluxResult<()> {
    let reader = StoreReader::open(&store_info(store), table)?;
    let columns = reader.columns();
    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = reader
                .raw_rows(filtered, offset, limit)?
                .into_iter()
                .map(|row| {
                    let obj: serde_json::Map<String, serde_json::Value> = columns
                        .iter()
                        .zip(row)
                        .map(|(name, value)| (name.to_string(), to_json(value)))
                        .collect();
                    serde_json::Value::Object(obj)
                })
                .collect();
            let text = serde_json::to_string_pretty(&rows)
                .map_err(|e| logflux::LogFluxError::other(e.to_string()))?;
            println!("{}", text);
        }
        OutputFormat::Table => {
            let rows = reader.rows(filtered, offset, limit)?;
            print_table(&columns, &rows);
            eprintln!(
                "\n{} of {} rows",
                rows.len(),
                reader.row_count(filtered)?
            );
        }
    }
    Ok(())
}

fn to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(i),
        Value::Real(f) => serde_json::Value::from(f),
        Value::Text(s) => serde_json::Value::String(s),
        Value::Blob(b) => serde_json::Value::String(format!("<{} bytes>", b.len())),
    }
}

const MAX_COLUMN_WIDTH: usize = 40;

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count()).min(MAX_COLUMN_WIDTH);
            }
        }
    }

    let line = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .into_iter()
            .zip(&widths)
            .map(|(c, &w)| {
                let clipped: String = c.chars().take(w).collect();
                format!("{:<w$}", clipped, w = w)
            })
            .collect();
        println!("{}", padded.join(" | "));
    };

    line(headers.iter().map(|h| h.to_string()).collect());
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    );
    for row in rows {
        line(row.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logflux::core::projection::{
        read_selection, EventClock, ProjectionField, ProjectionSchema, Projector, StoreRole,
    };
    use serde_json::json;

    fn sizes_store(dir: &Path) -> PathBuf {
        let root = DbInfo::root(dir.join("run.db"));
        let info = DbInfo::derive(&root, "sizes", StoreRole::Events).unwrap();
        let schema = ProjectionSchema::new().field(ProjectionField::int("bytes")).unwrap();
        Projector::new(Arc::clone(&info), schema, StoreRole::Events)
            .run(&mut EventClock::new(), |ctx| {
                for (id, bytes) in [(1i64, 10i64), (2, 20), (3, 30)] {
                    ctx.insert(&[("event_id", &id), ("bytes", &bytes)])?;
                }
                Ok(())
            })
            .unwrap();
        info.path().to_path_buf()
    }

    fn selection(store: &Path) -> Vec<i64> {
        let conn = rusqlite::Connection::open(store).unwrap();
        read_selection(&conn).unwrap()
    }

    #[test]
    fn test_to_json_maps_sqlite_values() {
        assert_eq!(to_json(Value::Null), json!(null));
        assert_eq!(to_json(Value::Integer(-4)), json!(-4));
        assert_eq!(to_json(Value::Real(0.5)), json!(0.5));
        assert_eq!(to_json(Value::Text("/api".into())), json!("/api"));
        assert_eq!(to_json(Value::Blob(vec![1, 2, 3])), json!("<3 bytes>"));
    }

    #[test]
    fn test_filter_then_reset() {
        let dir = tempfile::tempdir().unwrap();
        let store = sizes_store(dir.path());
        assert_eq!(selection(&store), vec![1, 2, 3]);

        run(Commands::Filter {
            store: store.clone(),
            expression: "bytes > 15".to_string(),
            table: "events".to_string(),
        })
        .unwrap();
        assert_eq!(selection(&store), vec![2, 3]);

        run(Commands::ResetFilter {
            store: store.clone(),
            table: "events".to_string(),
        })
        .unwrap();
        assert_eq!(selection(&store), vec![1, 2, 3]);
    }

    #[test]
    fn test_listing_and_rows_on_a_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = sizes_store(dir.path());

        run(Commands::Tables { store: store.clone() }).unwrap();
        for format in [OutputFormat::Table, OutputFormat::Json] {
            run(Commands::Rows {
                store: store.clone(),
                table: "events".to_string(),
                filtered: true,
                offset: 0,
                limit: 10,
                format,
            })
            .unwrap();
        }
        assert!(run(Commands::Filter {
            store,
            expression: "bytes >".to_string(),
            table: "events".to_string(),
        })
        .is_err());
    }
}
