//! tabscrape Worker
//!
//! Runs statements through the `isql` shell and prints the recovered rows
//! as JSON on stdout.
//!
//! Modes:
//! 1. `query`: execute one statement (or `QUERY_SQL`) and print its rows
//! 2. `split`: execute a Thai-column statement and an ASCII-column
//!    statement concurrently and print the merged rows
//! 3. `ping`: run the health probe

mod telemetry;

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tabscrape_common::config::PARSE_ENV_PREFIX;
use tabscrape_common::{OutputEncoding, ParseSettings, ScrapeError, ScriptEncoding, ShellSettings};
use tabscrape_engine::{IsqlShell, ParseOptions, QueryEngine};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tabscrape-worker")]
#[command(about = "Run SQL through an interactive SQL shell and print rows as JSON")]
struct Args {
    /// Shell executable
    #[arg(long, env = "ISQL_PROGRAM", default_value = "isql")]
    program: String,

    /// Shell arguments placed before the DSN (comma separated)
    #[arg(
        long = "shell-arg",
        env = "ISQL_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_value = "-v"
    )]
    shell_args: Vec<String>,

    /// ODBC data source name
    #[arg(long, env = "ISQL_DSN", default_value = "NBU_DSN")]
    dsn: String,

    /// Per-statement timeout in seconds
    #[arg(long, env = "QUERY_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Directory for transient script files (defaults to the OS temp dir)
    #[arg(long, env = "SCRIPT_DIR")]
    script_dir: Option<PathBuf>,

    /// Script file encoding: tis620 or utf8
    #[arg(long, env = "SCRIPT_ENCODING", default_value = "tis620")]
    script_encoding: ScriptEncoding,

    /// Shell output decoding: auto, tis620 or utf8
    #[arg(long, env = "OUTPUT_ENCODING", default_value = "auto")]
    output_encoding: OutputEncoding,

    /// Print parse diagnostics alongside the rows
    #[arg(long, env = "REPORT", default_value = "false")]
    report: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Execute one statement
    Query {
        #[arg(env = "QUERY_SQL")]
        sql: String,
    },
    /// Execute two statements and merge them on a key column
    Split {
        /// Statement whose rows define the output order
        #[arg(long)]
        primary: String,
        /// Statement whose columns are overlaid
        #[arg(long)]
        secondary: String,
        #[arg(long, default_value = "STUDENTID")]
        join_key: String,
    },
    /// Check connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    telemetry::init(&args.log_level)?;

    let engine = build_engine(&args)?;

    match run(&engine, &args).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!("Query failed: {}", e);
            println!(
                "{}",
                json!({ "status": "error", "code": e.code(), "message": e.to_string() })
            );
            Err(e.into())
        }
    }
}

fn build_engine(args: &Args) -> anyhow::Result<QueryEngine> {
    let mut shell_settings = ShellSettings {
        program: args.program.clone(),
        args: args.shell_args.clone(),
        dsn: args.dsn.clone(),
        timeout_secs: args.timeout_secs,
        script_encoding: args.script_encoding,
        output_encoding: args.output_encoding,
        ..Default::default()
    };
    if let Some(dir) = &args.script_dir {
        shell_settings.temp_dir = dir.clone();
    }

    let parse_settings = ParseSettings::from_env(PARSE_ENV_PREFIX).map_err(ScrapeError::from)?;

    info!(
        program = %shell_settings.program,
        dsn = %shell_settings.dsn,
        timeout_secs = shell_settings.timeout_secs,
        "Shell configured"
    );

    Ok(QueryEngine::new(
        Arc::new(IsqlShell::new(shell_settings)),
        ParseOptions::from_settings(&parse_settings),
    ))
}

async fn run(engine: &QueryEngine, args: &Args) -> Result<serde_json::Value, ScrapeError> {
    match &args.mode {
        Mode::Query { sql } if args.report => {
            let outcome = engine.execute_query_with_report(sql, None).await?;
            info!(
                rows = outcome.rows.len(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Query completed"
            );
            Ok(serde_json::to_value(outcome)?)
        }
        Mode::Query { sql } => {
            let rows = engine.execute_query(sql).await?;
            info!(rows = rows.len(), "Query completed");
            Ok(serde_json::to_value(rows)?)
        }
        Mode::Split {
            primary,
            secondary,
            join_key,
        } => {
            let rows = engine.fetch_split(primary, secondary, join_key).await?;
            info!(rows = rows.len(), "Split fetch completed");
            Ok(serde_json::to_value(rows)?)
        }
        Mode::Ping => {
            engine.ping().await?;
            Ok(json!({ "status": "ok" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["tabscrape-worker", "ping"]);
        assert_eq!(args.program, "isql");
        assert_eq!(args.shell_args, vec!["-v".to_string()]);
        assert_eq!(args.timeout_secs, 30);
        assert_eq!(args.script_encoding, ScriptEncoding::Tis620);
        assert_eq!(args.output_encoding, OutputEncoding::Auto);
        assert!(matches!(args.mode, Mode::Ping));
    }

    #[test]
    fn test_split_args() {
        let args = Args::parse_from([
            "tabscrape-worker",
            "--dsn",
            "OTHER_DSN",
            "split",
            "--primary",
            "SELECT COURSEID, DUMP(COURSENAME) AS COURSENAME_DUMP FROM COURSE",
            "--secondary",
            "SELECT COURSEID, CREDIT FROM COURSE",
            "--join-key",
            "COURSEID",
        ]);
        assert_eq!(args.dsn, "OTHER_DSN");
        match args.mode {
            Mode::Split { join_key, .. } => assert_eq!(join_key, "COURSEID"),
            other => panic!("unexpected mode: {other:?}"),
        }
    }
}
