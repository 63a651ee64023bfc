// holdings-scan CLI
// Loads the fund catalog and registry, runs every fund, writes flat records

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use holdings_scan::{AutoRenderer, Driver, FundCatalog, HttpTransport, Registry, RegistryFields};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

/// Extract top-10 holdings from the latest fund reports
#[derive(Debug, Parser)]
#[command(name = "holdings-scan", version, about)]
struct Cli {
    /// Fund catalog (JSON)
    #[arg(long, default_value = "config/funds.json")]
    config: PathBuf,

    /// Reference registry (CSV with code/name headers)
    #[arg(long, default_value = "data/master.csv")]
    registry: PathBuf,

    /// Registry header holding the security code
    #[arg(long, default_value = "code")]
    code_field: String,

    /// Registry header holding the company name
    #[arg(long, default_value = "name")]
    name_field: String,

    /// Write records here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Overrides the catalog's logging level (RUST_LOG still wins)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration errors abort before any fund is processed
    let catalog = FundCatalog::from_file(&cli.config)
        .with_context(|| format!("failed to load fund catalog {}", cli.config.display()))?;

    let mut logging = catalog.logging().clone();
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    logging.init();

    let fields = RegistryFields {
        code: cli.code_field.clone(),
        name: cli.name_field.clone(),
    };
    let registry = Registry::from_path(&cli.registry, &fields)
        .with_context(|| format!("failed to load registry {}", cli.registry.display()))?;

    info!(
        funds = catalog.len(),
        registry_entries = registry.len(),
        version = holdings_scan::VERSION,
        "starting run"
    );

    let transport = HttpTransport::new(&catalog.settings().user_agent)?;
    let report = Driver::new(&catalog, &registry, &transport, &AutoRenderer).run();

    let writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match cli.format {
        OutputFormat::Csv => report.write_csv(writer)?,
        OutputFormat::Json => report.write_json(writer)?,
    }

    if let Some(path) = &cli.output {
        info!(path = %path.display(), records = report.records.len(), "records written");
    }

    Ok(())
}
