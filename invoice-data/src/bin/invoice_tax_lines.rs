use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use invoice_core::db::DbConfig;
use invoice_core::validation::{DEFAULT_PRECISION, check_invoice};
use invoice_core::{InvoiceTaxLine, InvoiceTaxLineRepository, InvoiceTotals, Tolerance};
use invoice_data::{TaxLineLoader, build_registry};
use rust_decimal::Decimal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Import, inspect and reconcile the tax lines of customer invoices.
#[derive(Parser, Debug)]
#[command(name = "invoice-tax-lines")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Database backend (defaults to INVOICE_DB_BACKEND, then "sqlite")
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Connection string, e.g. a SQLite file path (defaults to INVOICE_DB_URL)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Decimal places used when comparing amounts
    #[arg(long, global = true, default_value_t = DEFAULT_PRECISION)]
    precision: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load tax lines from a CSV file, replacing the lines of each invoice in it
    Import {
        /// CSV file with an invoice_id,tax_code,net_amount,... header
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the tax lines of an invoice
    List {
        #[arg(short, long)]
        invoice: i64,
    },

    /// Reconcile an invoice's tax lines with its stored totals
    Check {
        #[arg(short, long)]
        invoice: i64,

        /// Net total stored on the invoice
        #[arg(long)]
        net: Decimal,

        /// Tax total stored on the invoice
        #[arg(long)]
        tax: Decimal,

        /// Surcharge total stored on the invoice
        #[arg(long, default_value_t = Decimal::ZERO)]
        surcharge: Decimal,

        /// Share of the invoice actually due, below 1 after a global discount
        #[arg(long, default_value_t = Decimal::ONE)]
        due_ratio: Decimal,
    },

    /// Delete one tax line by id
    Delete {
        #[arg(long)]
        id: i64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn db_config(cli: &Cli) -> DbConfig {
    let env = DbConfig::from_env();
    DbConfig {
        backend: cli.backend.clone().unwrap_or(env.backend),
        connection_string: cli.db.clone().unwrap_or(env.connection_string),
    }
}

fn print_lines(lines: &[InvoiceTaxLine]) {
    println!(
        "{:>6} {:<10} {:>12} {:>7} {:>10} {:>7} {:>10} {:>12}",
        "id", "tax code", "net", "rate", "tax", "rec.", "surcharge", "total"
    );
    for line in lines {
        println!(
            "{:>6} {:<10} {:>12} {:>7} {:>10} {:>7} {:>10} {:>12}",
            line.id.map(|id| id.to_string()).unwrap_or_default(),
            line.tax_code.as_deref().unwrap_or("-"),
            line.net_amount,
            line.tax_rate,
            line.tax_amount,
            line.surcharge_rate,
            line.surcharge_amount,
            line.line_total,
        );
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let tolerance = Tolerance::new(cli.precision);
    let config = db_config(&cli);

    debug!("connecting to {} backend", config.backend);
    let registry = build_registry();
    let repo = registry
        .create(&config)
        .await
        .with_context(|| {
            format!(
                "Failed to open {} store '{}'",
                config.backend, config.connection_string
            )
        })?;

    match cli.command {
        Command::Import { file } => {
            let reader = File::open(&file)
                .with_context(|| format!("Failed to open: {}", file.display()))?;
            let records = TaxLineLoader::parse(reader)
                .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;
            info!("parsed {} records from {}", records.len(), file.display());

            let inserted = TaxLineLoader::load(&*repo, &records, &tolerance)
                .await
                .context("Failed to load tax lines into the database")?;
            info!("loaded {} tax lines", inserted);
        }
        Command::List { invoice } => {
            let lines = repo
                .list_by_invoice(invoice)
                .await
                .with_context(|| format!("Failed to list tax lines of invoice {}", invoice))?;
            if lines.is_empty() {
                info!("invoice {} has no tax lines", invoice);
            } else {
                print_lines(&lines);
            }
        }
        Command::Check {
            invoice,
            net,
            tax,
            surcharge,
            due_ratio,
        } => {
            let expected = InvoiceTotals::new(net, tax, surcharge);
            let report = check_invoice(&*repo, invoice, &expected, due_ratio, &tolerance)
                .await
                .with_context(|| format!("Failed to check invoice {}", invoice))?;

            println!("{}", report);
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Delete { id } => {
            let line = repo
                .get_line(id)
                .await
                .with_context(|| format!("Failed to find tax line {}", id))?;
            repo.delete(&line)
                .await
                .with_context(|| format!("Failed to delete tax line {}", id))?;
            info!("deleted tax line {}", id);
        }
    }

    Ok(ExitCode::SUCCESS)
}
