//! excel-gateway CLI - address, date serial and naming helpers, plus a
//! worksheet listing through a host bridge

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use excel_gateway::{GatewayConfig, SheetGateway, StdioHost, StdioHostConfig};
use excel_gateway_core::{
    column_index_to_letters, date_serial, generate_table_name, generate_worksheet_name,
    letters_to_column_index, next_available_row_index, validate_table_name,
    validate_worksheet_name, Address,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exgw")]
#[command(
    author,
    version,
    about = "Spreadsheet address, date serial and host session tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a range address and show its parts
    Address {
        /// Address such as `'My Sheet'!A1:C10`
        address: String,
    },

    /// Convert column letters to a 1-based index, or an index to letters
    Column {
        /// Letters (`AB`) or a 1-based index (`28`)
        value: String,
    },

    /// Convert a serial date number to a calendar date and time
    SerialToDate {
        serial: f64,
    },

    /// Convert `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` to a serial date number
    DateToSerial {
        date: String,
    },

    /// Check a worksheet (or table) name against the host's rules
    ValidateName {
        name: String,

        /// Validate as a table name
        #[arg(short, long)]
        table: bool,
    },

    /// First free row below a used range such as `Sheet1!A1:C10`
    NextRow {
        used_range: String,
    },

    /// Generate a table name, and the matching worksheet name, from a key
    TableName {
        key: String,

        /// Generate the name of a hidden lookup table
        #[arg(long)]
        hidden: bool,
    },

    /// List the worksheets of the workbook a host bridge has open
    Sheets {
        /// Path to the bridge executable
        #[arg(short, long)]
        bridge: Option<PathBuf>,

        /// Program that runs the bridge (for example `wine`)
        #[arg(short, long)]
        launcher: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Address { address } => show_address(&address),
        Commands::Column { value } => convert_column(&value),
        Commands::SerialToDate { serial } => serial_to_date(serial),
        Commands::DateToSerial { date } => date_to_serial(&date),
        Commands::ValidateName { name, table } => validate_name(&name, table),
        Commands::NextRow { used_range } => next_row(&used_range),
        Commands::TableName { key, hidden } => {
            let table = generate_table_name(&key, hidden);
            println!("table\t{table}");
            println!("sheet\t{}", generate_worksheet_name(&key, "_Data"));
            Ok(())
        }
        Commands::Sheets {
            bridge,
            launcher,
            json,
        } => list_sheets(bridge, launcher, json).await,
    }
}

fn show_address(raw: &str) -> Result<()> {
    let address =
        Address::parse(raw).with_context(|| format!("'{raw}' is not a valid address"))?;

    println!("Address: {address}");
    println!("Sheet:   {}", address.sheet_name().unwrap_or("(current)"));
    match address.bounds() {
        Some(bounds) => {
            println!("Range:   {}", bounds.to_a1_string());
            println!(
                "Size:    {} rows x {} columns",
                bounds.row_count(),
                bounds.col_count()
            );
        }
        None => println!("Range:   (whole sheet)"),
    }
    Ok(())
}

fn convert_column(value: &str) -> Result<()> {
    if let Ok(index) = value.parse::<u32>() {
        if index == 0 {
            bail!("Column indices start at 1");
        }
        println!("{}", column_index_to_letters(index));
    } else {
        let index = letters_to_column_index(value)
            .with_context(|| format!("'{value}' is not a column"))?;
        println!("{index}");
    }
    Ok(())
}

fn serial_to_date(serial: f64) -> Result<()> {
    let value = date_serial::serial_to_naive(serial)
        .with_context(|| format!("{serial} is outside the serial date range"))?;
    println!("{}", value.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

fn date_to_serial(raw: &str) -> Result<()> {
    let value = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .with_context(|| format!("'{raw}' is not a date"))?;
    let serial = date_serial::naive_to_serial(value)
        .with_context(|| format!("{raw} is outside the serial date range"))?;
    println!("{serial}");
    Ok(())
}

fn validate_name(name: &str, table: bool) -> Result<()> {
    let checked = if table {
        validate_table_name(name, "Table")
    } else {
        validate_worksheet_name(name, "Worksheet")
    };
    match checked {
        Ok(()) => {
            println!("ok");
            Ok(())
        }
        Err(err) => bail!(err.cause()),
    }
}

fn next_row(used_range: &str) -> Result<()> {
    let row = next_available_row_index(used_range)
        .with_context(|| format!("'{used_range}' carries no range"))?;
    println!("{row}");
    Ok(())
}

async fn list_sheets(bridge: Option<PathBuf>, launcher: Option<PathBuf>, json: bool) -> Result<()> {
    let host = StdioHost::start(StdioHostConfig {
        bridge_exe_path: bridge,
        launcher,
        ..StdioHostConfig::default()
    })
    .await
    .context("Failed to start the host bridge")?;
    let host = Arc::new(host);

    let gateway = SheetGateway::new(host.clone(), GatewayConfig::from_env());
    let sheets = gateway.list_worksheets().await;
    drop(gateway);

    if let Ok(host) = Arc::try_unwrap(host) {
        host.shutdown()
            .await
            .context("Failed to shut down the host bridge")?;
    }

    let Some(sheets) = sheets else {
        bail!("Listing worksheets failed; see the log above");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&sheets)?);
    } else {
        for (i, sheet) in sheets.iter().enumerate() {
            println!("{}\t{}\t{:?}", i, sheet.name, sheet.visibility);
        }
    }

    Ok(())
}
