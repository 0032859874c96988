//! `parcel` binary: thin CLI over `parcel_core`.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use log::info;
use parcel_core::db::{open_db, open_db_in_memory};
use parcel_core::{
    default_log_level, init_logging, Parcel, ParcelRepository, ParcelService, ParcelStatus,
    SqliteParcelRepository,
};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    }

    run_command(&cli.db, cli.command)
}

/// Runs one subcommand. `demo` works on a fresh in-memory database; every
/// other command opens `db`.
fn run_command(db: &Path, command: Command) -> Result<()> {
    let conn = match command {
        Command::Demo => open_db_in_memory()?,
        _ => open_db(db)
            .with_context(|| format!("failed to open parcel database `{}`", db.display()))?,
    };
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn)?);

    match command {
        Command::Register { client, address } => print(&service.register(client, address)?),
        Command::Show { number } => print(&service.get(number)?),
        Command::List { client } => print(&service.client_parcels(client)?),
        Command::NextStatus { number } => {
            let status = service.next_status(number)?;
            print(&json!({ "number": number, "status": status }))
        }
        Command::SetAddress { number, address } => {
            service.change_address(number, &address)?;
            print(&json!({ "number": number, "address": address }))
        }
        Command::Delete { number } => {
            service.delete(number)?;
            print(&json!({ "number": number, "deleted": true }))
        }
        Command::Demo => run_demo(&conn),
    }
}

fn print(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_demo(conn: &Connection) -> Result<()> {
    info!("event=demo module=cli status=start");
    let repo = SqliteParcelRepository::try_new(conn)?;

    let number = repo.add(&Parcel::registered(1, "Main St", "2024-01-01"))?;
    println!("added parcel {number}");

    repo.set_address(number, "Oak St")?;
    println!("address -> {}", repo.get(number)?.address);

    repo.set_status(number, &ParcelStatus::Sent)?;
    match repo.set_address(number, "Elm St") {
        Err(err) if err.is_precondition_failed() => println!("set_address refused: {err}"),
        Err(err) => return Err(err.into()),
        Ok(()) => anyhow::bail!("address of sent parcel {number} was changed"),
    }
    match repo.delete(number) {
        Err(err) if err.is_precondition_failed() => println!("delete refused: {err}"),
        Err(err) => return Err(err.into()),
        Ok(()) => anyhow::bail!("sent parcel {number} was deleted"),
    }

    repo.set_status(number, &ParcelStatus::Registered)?;
    repo.delete(number)?;
    match repo.get(number) {
        Err(err) if err.is_not_found() => println!("{err}"),
        Err(err) => return Err(err.into()),
        Ok(parcel) => anyhow::bail!("parcel {} still present after delete", parcel.number),
    }

    info!("event=demo module=cli status=ok");
    Ok(())
}
