//! Parcel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide add/get/list/update/delete over the `parcel` table.
//! - Enforce the `registered`-only rule for address changes and deletion.
//!
//! # Invariants
//! - `number` comes from SQLite on insert; the input value is ignored.
//! - Guarded writes carry `status = 'registered'` in their `WHERE` clause, so a
//!   status change racing with the pre-check can never be overwritten.
//! - `set_status` is unconditional and succeeds even when no row matches.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
use log::{debug, warn};
use rusqlite::types::FromSql;
use rusqlite::{named_params, params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PARCEL_TABLE: &str = "parcel";
const PARCEL_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

pub type RepoResult<T> = Result<T, RepoError>;

/// Mutation that is only allowed while a parcel is `registered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAction {
    SetAddress,
    Delete,
}

impl GuardedAction {
    fn operation(self) -> &'static str {
        match self {
            Self::SetAddress => "set_address",
            Self::Delete => "delete",
        }
    }
}

impl Display for GuardedAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetAddress => f.write_str("address update"),
            Self::Delete => f.write_str("parcel delete"),
        }
    }
}

/// Row key a failed statement was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Number(ParcelNumber),
    Client(ClientId),
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(number) => write!(f, "number={number}"),
            Self::Client(client) => write!(f, "client={client}"),
        }
    }
}

/// Error returned by parcel repository operations.
#[derive(Debug)]
pub enum RepoError {
    NotFound(ParcelNumber),
    PreconditionFailed {
        action: GuardedAction,
        number: ParcelNumber,
        status: ParcelStatus,
    },
    /// The guarded write matched no row although the parcel still reads as
    /// `registered`; another writer touched it between check and write.
    ConcurrentModification {
        action: GuardedAction,
        number: ParcelNumber,
    },
    Storage {
        operation: &'static str,
        subject: Option<Subject>,
        source: DbError,
    },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(number) => write!(f, "parcel with number {number} not found"),
            Self::PreconditionFailed {
                action,
                number,
                status,
            } => write!(
                f,
                "{action} is not available for parcel {number} in `{status}` status"
            ),
            Self::ConcurrentModification { action, number } => write!(
                f,
                "{action} for parcel {number} did not apply; the row changed concurrently"
            ),
            Self::Storage {
                operation,
                subject: Some(subject),
                source,
            } => write!(f, "parcel {operation} failed ({subject}): {source}"),
            Self::Storage {
                operation,
                subject: None,
                source,
            } => write!(f, "parcel {operation} failed: {source}"),
            Self::InvalidData(message) => write!(f, "invalid persisted parcel data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn storage(
    operation: &'static str,
    subject: Option<Subject>,
) -> impl FnOnce(rusqlite::Error) -> RepoError {
    move |err| RepoError::Storage {
        operation,
        subject,
        source: DbError::Sqlite(err),
    }
}

/// Data-access contract for parcels.
pub trait ParcelRepository {
    /// Inserts `parcel` (its `number` is ignored) and returns the assigned number.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    /// Loads one parcel; `NotFound` when no row has this number.
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Lists a client's parcels by ascending number. Empty when there are none.
    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>>;
    /// Overwrites the status with no transition checks. A missing row is not an error.
    fn set_status(&self, number: ParcelNumber, status: &ParcelStatus) -> RepoResult<()>;
    /// Changes the address of a `registered` parcel.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()>;
    /// Removes a `registered` parcel.
    fn delete(&self, number: ParcelNumber) -> RepoResult<()>;
    /// Reads only the status of one parcel; `NotFound` when absent.
    fn status_by_number(&self, number: ParcelNumber) -> RepoResult<ParcelStatus>;
}

/// SQLite-backed parcel repository over a borrowed connection.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    /// Wraps a connection whose schema the caller manages.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection after checking it went through `apply_migrations`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn guarded_write<F>(
        &self,
        action: GuardedAction,
        number: ParcelNumber,
        write: F,
    ) -> RepoResult<()>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        let status = self.status_by_number(number)?;
        if !status.allows_mutation() {
            warn!(
                "event=parcel_{} module=repo status=denied number={number} parcel_status={status}",
                action.operation()
            );
            return Err(RepoError::PreconditionFailed {
                action,
                number,
                status,
            });
        }

        let changed = write(self.conn)
            .map_err(storage(action.operation(), Some(Subject::Number(number))))?;
        if changed == 0 {
            // Row left `registered` (or vanished) after the status check.
            let current = self.status_by_number(number)?;
            warn!(
                "event=parcel_{} module=repo status=denied number={number} parcel_status={current} reason=concurrent_change",
                action.operation()
            );
            if current.allows_mutation() {
                return Err(RepoError::ConcurrentModification { action, number });
            }
            return Err(RepoError::PreconditionFailed {
                action,
                number,
                status: current,
            });
        }

        debug!(
            "event=parcel_{} module=repo status=ok number={number}",
            action.operation()
        );
        Ok(())
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        self.conn
            .execute(
                "INSERT INTO parcel (client, status, address, created_at)
                 VALUES (:client, :status, :address, :created_at);",
                named_params! {
                    ":client": parcel.client,
                    ":status": parcel.status.as_str(),
                    ":address": parcel.address.as_str(),
                    ":created_at": parcel.created_at.as_str(),
                },
            )
            .map_err(storage("add", Some(Subject::Client(parcel.client))))?;

        let number = self.conn.last_insert_rowid();
        debug!(
            "event=parcel_add module=repo status=ok number={number} client={}",
            parcel.client
        );
        Ok(number)
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        let on_err = || storage("get", Some(Subject::Number(number)));

        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"))
            .map_err(on_err())?;
        let mut rows = stmt.query([number]).map_err(on_err())?;
        let row = rows.next().map_err(on_err())?;
        match row {
            Some(row) => parse_parcel_row(row, "get"),
            None => Err(RepoError::NotFound(number)),
        }
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        let on_err = || storage("get_by_client", Some(Subject::Client(client)));

        let mut stmt = self
            .conn
            .prepare(&format!(
                "{PARCEL_SELECT_SQL} WHERE client = ?1 ORDER BY number ASC;"
            ))
            .map_err(on_err())?;
        let mut rows = stmt.query([client]).map_err(on_err())?;
        let mut parcels = Vec::new();

        while let Some(row) = rows.next().map_err(on_err())? {
            parcels.push(parse_parcel_row(row, "get_by_client")?);
        }

        Ok(parcels)
    }

    fn set_status(&self, number: ParcelNumber, status: &ParcelStatus) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE parcel SET status = ?1 WHERE number = ?2;",
                params![status.as_str(), number],
            )
            .map_err(storage("set_status", Some(Subject::Number(number))))?;

        debug!(
            "event=parcel_set_status module=repo status=ok number={number} parcel_status={status} changed={changed}"
        );
        Ok(())
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        self.guarded_write(GuardedAction::SetAddress, number, |conn| {
            update_registered_address(conn, number, address)
        })
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        self.guarded_write(GuardedAction::Delete, number, |conn| {
            delete_registered(conn, number)
        })
    }

    fn status_by_number(&self, number: ParcelNumber) -> RepoResult<ParcelStatus> {
        let on_err = || storage("status_by_number", Some(Subject::Number(number)));

        let mut stmt = self
            .conn
            .prepare("SELECT status FROM parcel WHERE number = ?1;")
            .map_err(on_err())?;
        let mut rows = stmt.query([number]).map_err(on_err())?;
        let row = rows.next().map_err(on_err())?;
        match row {
            Some(row) => parse_status(row, "status_by_number"),
            None => Err(RepoError::NotFound(number)),
        }
    }
}

/// Address write that only matches a row still in `registered` status.
fn update_registered_address(
    conn: &Connection,
    number: ParcelNumber,
    address: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE parcel SET address = ?1 WHERE number = ?2 AND status = ?3;",
        params![address, number, ParcelStatus::REGISTERED],
    )
}

/// Delete that only matches a row still in `registered` status.
fn delete_registered(conn: &Connection, number: ParcelNumber) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM parcel WHERE number = ?1 AND status = ?2;",
        params![number, ParcelStatus::REGISTERED],
    )
}

fn parse_parcel_row(row: &Row<'_>, operation: &'static str) -> RepoResult<Parcel> {
    Ok(Parcel {
        number: column(row, "number", operation)?,
        client: column(row, "client", operation)?,
        status: parse_status(row, operation)?,
        address: column(row, "address", operation)?,
        created_at: column(row, "created_at", operation)?,
    })
}

fn parse_status(row: &Row<'_>, operation: &'static str) -> RepoResult<ParcelStatus> {
    let text: String = column(row, "status", operation)?;
    if text.trim().is_empty() {
        return Err(RepoError::InvalidData("empty status in parcel.status".to_string()));
    }
    Ok(ParcelStatus::from(text))
}

/// Reads one column, reporting type mismatches as `InvalidData`.
fn column<T: FromSql>(row: &Row<'_>, name: &str, operation: &'static str) -> RepoResult<T> {
    row.get(name).map_err(|err| match err {
        rusqlite::Error::InvalidColumnType(_, _, kind) => {
            RepoError::InvalidData(format!("unexpected {kind} value in parcel.{name}"))
        }
        rusqlite::Error::IntegralValueOutOfRange(_, value) => {
            RepoError::InvalidData(format!("value {value} out of range in parcel.{name}"))
        }
        rusqlite::Error::FromSqlConversionFailure(_, kind, _) => {
            RepoError::InvalidData(format!("unconvertible {kind} value in parcel.{name}"))
        }
        other => storage(operation, None)(other),
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn).map_err(|source| RepoError::Storage {
        operation: "try_new",
        subject: None,
        source,
    })?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, PARCEL_TABLE)? {
        return Err(RepoError::MissingRequiredTable(PARCEL_TABLE));
    }
    for column in PARCEL_COLUMNS {
        if !table_has_column(conn, PARCEL_TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: PARCEL_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )
        .map_err(storage("try_new", None))?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .map_err(storage("try_new", None))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(storage("try_new", None))?;
    for name in names {
        if name.map_err(storage("try_new", None))? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{
        delete_registered, update_registered_address, GuardedAction, ParcelRepository,
        RepoError, SqliteParcelRepository,
    };
    use crate::db::open_db_in_memory;
    use crate::model::parcel::{Parcel, ParcelStatus};
    use rusqlite::Connection;

    fn seeded(conn: &Connection, status: ParcelStatus) -> i64 {
        let repo = SqliteParcelRepository::try_new(conn).unwrap();
        repo.add(&Parcel::new(1, status, "Main St", "2024-01-01"))
            .unwrap()
    }

    #[test]
    fn registered_address_update_skips_non_registered_row() {
        let conn = open_db_in_memory().unwrap();
        let number = seeded(&conn, ParcelStatus::Sent);

        assert_eq!(update_registered_address(&conn, number, "Oak St").unwrap(), 0);
        let repo = SqliteParcelRepository::new(&conn);
        assert_eq!(repo.get(number).unwrap().address, "Main St");
    }

    #[test]
    fn registered_address_update_applies_to_registered_row() {
        let conn = open_db_in_memory().unwrap();
        let number = seeded(&conn, ParcelStatus::Registered);

        assert_eq!(update_registered_address(&conn, number, "Oak St").unwrap(), 1);
    }

    #[test]
    fn registered_delete_skips_non_registered_row() {
        let conn = open_db_in_memory().unwrap();
        let number = seeded(&conn, ParcelStatus::Delivered);

        assert_eq!(delete_registered(&conn, number).unwrap(), 0);
        let repo = SqliteParcelRepository::new(&conn);
        assert_eq!(repo.get(number).unwrap().status, ParcelStatus::Delivered);
    }

    #[test]
    fn guarded_write_refuses_when_status_changes_after_check() {
        let conn = open_db_in_memory().unwrap();
        let number = seeded(&conn, ParcelStatus::Registered);
        let repo = SqliteParcelRepository::new(&conn);

        let err = repo
            .guarded_write(GuardedAction::SetAddress, number, |conn| {
                conn.execute(
                    "UPDATE parcel SET status = 'sent' WHERE number = ?1;",
                    [number],
                )?;
                update_registered_address(conn, number, "Oak St")
            })
            .unwrap_err();

        assert!(matches!(
            err,
            RepoError::PreconditionFailed {
                action: GuardedAction::SetAddress,
                status: ParcelStatus::Sent,
                ..
            }
        ));
        assert_eq!(repo.get(number).unwrap().address, "Main St");
    }

    #[test]
    fn guarded_delete_refuses_when_status_changes_after_check() {
        let conn = open_db_in_memory().unwrap();
        let number = seeded(&conn, ParcelStatus::Registered);
        let repo = SqliteParcelRepository::new(&conn);

        let err = repo
            .guarded_write(GuardedAction::Delete, number, |conn| {
                conn.execute(
                    "UPDATE parcel SET status = 'sent' WHERE number = ?1;",
                    [number],
                )?;
                delete_registered(conn, number)
            })
            .unwrap_err();

        assert!(err.is_precondition_failed());
        assert_eq!(repo.get(number).unwrap().status, ParcelStatus::Sent);
    }
}
