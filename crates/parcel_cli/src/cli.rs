//! Command-line surface of the parcel tracker.

use clap::{Parser, Subcommand};
use parcel_core::{ClientId, ParcelNumber};
use std::path::PathBuf;

/// Track parcels stored in a local SQLite database.
#[derive(Debug, Parser)]
#[command(name = "parcel", version, about)]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, env = "PARCEL_DB", default_value = "tracker.db", global = true)]
    pub db: PathBuf,

    /// Log level (trace|debug|info|warn|error). Defaults by build mode.
    #[arg(long, env = "PARCEL_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Directory for rolling log files. File logging is off when unset.
    #[arg(long, env = "PARCEL_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register a new parcel for a client.
    Register {
        #[arg(long)]
        client: ClientId,
        #[arg(long)]
        address: String,
    },
    /// Show one parcel.
    Show { number: ParcelNumber },
    /// List all parcels of a client.
    List {
        #[arg(long)]
        client: ClientId,
    },
    /// Advance a parcel to its next delivery status.
    NextStatus { number: ParcelNumber },
    /// Change the address of a registered parcel.
    SetAddress {
        number: ParcelNumber,
        address: String,
    },
    /// Delete a registered parcel.
    Delete { number: ParcelNumber },
    /// Run a scripted walkthrough against an in-memory database.
    Demo,
}
