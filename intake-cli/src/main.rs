use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::*;

use intake_cli::{Config, GateOutcome, RunReport, SystemClock};

/// Load a spreadsheet into the intermediate table and record the run in history
#[derive(Parser, Debug)]
#[command(name = "intake", version, about)]
struct Cli {
    /// Spreadsheet to ingest (xlsx, xlsm, xlsb, xls, ods)
    source: PathBuf,

    /// Config file (defaults to <config dir>/intake/config.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file, overrides config and INTAKE_DATABASE
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = Some(database);
    }

    let clock = SystemClock {
        timezone: config.timezone()?,
    };

    let report = intake_cli::run(&config, &cli.source, &clock).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = format!("warn,intake={level},intake_cli={level}");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .init();
}

fn print_report(report: &RunReport) {
    let ingest = &report.ingest;

    println!(
        "{} {} (sheet '{}')",
        "Ingested".green().bold(),
        ingest.filename.cyan(),
        ingest.sheet
    );
    println!(
        "  {} of {} rows written to {}",
        ingest.valid_rows, ingest.raw_rows, ingest.intermediate_table
    );
    match &ingest.binding.flag {
        Some(flag) => println!(
            "  flagged lines: {} (from '{}')",
            ingest.flagged_line_count, flag
        ),
        None => println!("  flagged lines: 0 {}", "(no flag column)".dimmed()),
    }

    match &report.history {
        GateOutcome::Appended { record, .. } => println!(
            "  history: {} at {}",
            "appended".green(),
            record.processing_timestamp
        ),
        GateOutcome::Skipped { .. } => println!(
            "  history: {}",
            "unchanged, nothing appended".yellow()
        ),
    }
}
