//! Parcel tracking use-cases.
//!
//! # Responsibility
//! - Register new parcels with a creation timestamp.
//! - Advance parcels through `registered -> sent -> delivered`.
//!
//! # Invariants
//! - Service APIs never bypass the repository's `registered` guard.
//! - Status transitions are validated here, not in the repository.

use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
use crate::repo::parcel_repo::{ParcelRepository, RepoError};
use chrono::{SecondsFormat, Utc};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error returned by parcel use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    /// The parcel's status has no defined successor.
    UnknownTransition {
        number: ParcelNumber,
        status: ParcelStatus,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::UnknownTransition { number, status } => write!(
                f,
                "parcel {number} has status `{status}` with no known next status"
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::UnknownTransition { .. } => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Successor of `status` in the delivery flow.
///
/// `delivered` is terminal and maps to itself; statuses written by other
/// producers have no successor.
pub fn next_status_of(status: &ParcelStatus) -> Option<ParcelStatus> {
    match status {
        ParcelStatus::Registered => Some(ParcelStatus::Sent),
        ParcelStatus::Sent | ParcelStatus::Delivered => Some(ParcelStatus::Delivered),
        ParcelStatus::Other(_) => None,
    }
}

/// Use-case wrapper around a parcel repository.
pub struct ParcelService<R: ParcelRepository> {
    repo: R,
}

impl<R: ParcelRepository> ParcelService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new parcel for `client`, stamped with the current UTC time.
    ///
    /// Returns the stored parcel including its assigned number.
    pub fn register(
        &self,
        client: ClientId,
        address: impl Into<String>,
    ) -> ServiceResult<Parcel> {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut parcel = Parcel::registered(client, address, created_at);
        parcel.number = self.repo.add(&parcel)?;

        info!(
            "event=parcel_register module=service status=ok number={} client={client}",
            parcel.number
        );
        Ok(parcel)
    }

    pub fn get(&self, number: ParcelNumber) -> ServiceResult<Parcel> {
        Ok(self.repo.get(number)?)
    }

    /// Lists all parcels owned by `client`.
    pub fn client_parcels(&self, client: ClientId) -> ServiceResult<Vec<Parcel>> {
        Ok(self.repo.get_by_client(client)?)
    }

    /// Moves a parcel one step along the delivery flow and returns the new status.
    ///
    /// A `delivered` parcel is left untouched.
    pub fn next_status(&self, number: ParcelNumber) -> ServiceResult<ParcelStatus> {
        let current = self.repo.status_by_number(number)?;
        let next = next_status_of(&current).ok_or_else(|| ServiceError::UnknownTransition {
            number,
            status: current.clone(),
        })?;

        if next != current {
            self.repo.set_status(number, &next)?;
            info!(
                "event=parcel_next_status module=service status=ok number={number} from={current} to={next}"
            );
        }
        Ok(next)
    }

    pub fn change_address(&self, number: ParcelNumber, address: &str) -> ServiceResult<()> {
        Ok(self.repo.set_address(number, address)?)
    }

    pub fn delete(&self, number: ParcelNumber) -> ServiceResult<()> {
        self.repo.delete(number)?;
        info!("event=parcel_delete module=service status=ok number={number}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::next_status_of;
    use crate::model::parcel::ParcelStatus;

    #[test]
    fn next_status_follows_delivery_flow() {
        assert_eq!(
            next_status_of(&ParcelStatus::Registered),
            Some(ParcelStatus::Sent)
        );
        assert_eq!(
            next_status_of(&ParcelStatus::Sent),
            Some(ParcelStatus::Delivered)
        );
        assert_eq!(
            next_status_of(&ParcelStatus::Delivered),
            Some(ParcelStatus::Delivered)
        );
    }

    #[test]
    fn next_status_rejects_foreign_status() {
        assert_eq!(next_status_of(&ParcelStatus::parse("returned")), None);
    }
}
