//! FILENAME: app/src/main.rs
// PURPOSE: Command-line entry point: load records, apply a layout, print the pivot as JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use engine::Record;
use finpivot::{
    add_calculated_field, create_app_state, fixtures, get_pivot_data, load_records, logging,
    update_pivot_config, AppError, CalculatedFieldRequest, PivotRequest,
};
use log::LevelFilter;
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "finpivot")]
#[command(about = "Pivot financial records with calculated fields")]
#[command(long_about = "Pivot financial records with calculated fields.

Reads a JSON array of records (field id -> value), applies a pivot layout and
prints the hierarchical result as JSON. Calculated measures such as Saldo are
evaluated once per group and take no aggregation.

REQUEST FILE:
  {
    \"rowFields\": [\"dataPrevisao\"],
    \"columnField\": \"tipo\",
    \"measures\": [{ \"field\": \"valorConta\", \"aggregation\": \"max\" }, { \"field\": \"Saldo\" }],
    \"filters\": [{ \"field\": \"banco\", \"operator\": \"equals\", \"value\": \"Itaú\" }],
    \"expanded\": [[\"24/03/2025\"]]
  }

EXAMPLES:
  finpivot --demo
  finpivot --demo --calc 'Saldo=[Valor da Conta] - [A Pagar ou Receber]' -q layout.json
  finpivot --records data.json --pretty")]
#[command(version)]
struct Cli {
    /// JSON file holding an array of records
    #[arg(short, long, conflicts_with = "demo")]
    records: Option<PathBuf>,

    /// Use the built-in demo dataset
    #[arg(long)]
    demo: bool,

    /// JSON file holding the pivot layout (defaults to rows by date, columns by type)
    #[arg(short = 'q', long)]
    request: Option<PathBuf>,

    /// Calculated field to register before pivoting, as NAME=FORMULA (repeatable)
    #[arg(long = "calc", value_name = "NAME=FORMULA")]
    calculated: Vec<String>,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, env = "FINPIVOT_LOG_LEVEL", default_value = "warn")]
    log_level: LevelFilter,

    /// Also write log lines to this file
    #[arg(long, env = "FINPIVOT_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AppError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: Cli) -> Result<(), AppError> {
    logging::init(cli.log_level, cli.log_file.as_deref())?;

    let records: Vec<Record> = match (&cli.records, cli.demo) {
        (Some(path), _) => read_json(path)?,
        (None, true) => fixtures::demo_records(),
        (None, false) => {
            return Err(AppError::Command(
                "no records: pass --records FILE or --demo".to_string(),
            ))
        }
    };

    let state = create_app_state();
    load_records(&state, records)?;

    for definition in &cli.calculated {
        let (name, formula) = definition.split_once('=').ok_or_else(|| {
            AppError::Command(format!("--calc expects NAME=FORMULA, got '{}'", definition))
        })?;
        add_calculated_field(
            &state,
            CalculatedFieldRequest {
                name: name.to_string(),
                formula: formula.to_string(),
            },
        )?;
    }

    if let Some(path) = &cli.request {
        let request: PivotRequest = read_json(path)?;
        update_pivot_config(&state, request)?;
    }

    let response = get_pivot_data(&state)?;
    let output = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", output);
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
