//! Core of the parcel tracker: storage bootstrap, parcel persistence and
//! delivery use-cases.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
pub use repo::parcel_repo::{
    GuardedAction, ParcelRepository, RepoError, RepoResult, SqliteParcelRepository, Subject,
};
pub use service::parcel_service::{next_status_of, ParcelService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
