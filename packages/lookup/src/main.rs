#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for census tract income lookups.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tract_income::TractLookup;
use tract_income::batch::{BatchSummary, ResultRow, process_address_file, write_results_csv};
use tract_income_address::{generate_variations, parse};
use tract_income_lookup_models::AddressInput;

#[derive(Parser)]
#[command(name = "tract_income", about = "Census tract income lookup tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a structured address
    Lookup {
        /// Street line (e.g., "25 Drake Ave")
        #[arg(long)]
        street: String,
        /// City name
        #[arg(long)]
        city: String,
        /// State name or two-letter abbreviation
        #[arg(long)]
        state: String,
        /// ZIP code
        #[arg(long)]
        zip: Option<String>,
        /// Only try the address as written
        #[arg(long)]
        no_fuzzy: bool,
    },
    /// Split a one-line address into street, city, state and ZIP
    Parse {
        /// Full address (e.g., "25 Drake Ave, New Rochelle, NY 10805")
        address: String,
    },
    /// Show the query strings a fuzzy lookup would try
    Variations {
        /// Street line
        #[arg(long)]
        street: String,
        /// City name
        #[arg(long)]
        city: String,
        /// State name or two-letter abbreviation
        #[arg(long)]
        state: String,
        /// ZIP code
        #[arg(long)]
        zip: Option<String>,
    },
    /// Parse a one-line address, then look it up
    Full {
        /// Full address (e.g., "25 Drake Ave, New Rochelle, NY 10805")
        address: String,
        /// Only try the address as written
        #[arg(long)]
        no_fuzzy: bool,
    },
    /// Look up every address in a CSV file and write a results CSV
    Batch {
        /// Header-less CSV; every non-blank cell is one full address
        input: PathBuf,
        /// Results file
        #[arg(long, default_value = "tract_income_results.csv")]
        output: PathBuf,
        /// Maximum lookups in flight
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Lookup {
            street,
            city,
            state,
            zip,
            no_fuzzy,
        } => {
            let lookup = TractLookup::from_env()?;
            let input = AddressInput::new(&street, &city, &state, zip.as_deref());
            print_json(&lookup.lookup(&input, !no_fuzzy).await)?;
        }
        Commands::Parse { address } => {
            print_json(&parse(&address))?;
        }
        Commands::Variations {
            street,
            city,
            state,
            zip,
        } => {
            print_json(&generate_variations(&street, &city, &state, zip.as_deref()))?;
        }
        Commands::Full { address, no_fuzzy } => {
            let lookup = TractLookup::from_env()?;
            print_json(&lookup.lookup_full_address(&address, !no_fuzzy).await)?;
        }
        Commands::Batch {
            input,
            output,
            concurrency,
        } => {
            let lookup = TractLookup::from_env()?;
            let processed = process_address_file(&lookup, &input, true, concurrency).await?;

            let results: Vec<_> = processed.iter().map(|(_, result)| result.clone()).collect();
            print_json(&BatchSummary::from_results(&results))?;

            for (row, result) in &processed {
                if !result.is_complete() {
                    log::warn!(
                        "Row {}, Column {}: {} ({:?})",
                        row.row,
                        row.column,
                        row.address,
                        result.error_kind()
                    );
                }
            }

            let rows: Vec<ResultRow> = processed
                .iter()
                .map(|(row, result)| ResultRow::new(&row.address, result))
                .collect();
            write_results_csv(&output, &rows)?;
        }
    }

    Ok(())
}
