//! Parcel record and status vocabulary.
//!
//! # Responsibility
//! - Define the row shape stored in the `parcel` table.
//! - Map status values to and from their stored text form.
//!
//! # Invariants
//! - `number` is assigned by storage on insert and never changes afterwards.
//! - `address` may only change, and the parcel may only be deleted, while
//!   `status == ParcelStatus::Registered`.
//! - Unknown status text round-trips unchanged through `ParcelStatus::Other`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-generated parcel identifier (SQLite rowid).
pub type ParcelNumber = i64;

/// Identifier of the client owning a parcel.
pub type ClientId = i64;

/// Delivery status of a parcel.
///
/// Only `Registered` carries business rules in this crate; every other value
/// is passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParcelStatus {
    /// Accepted but not yet handed over; address changes and deletion allowed.
    Registered,
    /// Handed to the carrier.
    Sent,
    /// Received by the client.
    Delivered,
    /// Any status written by another producer.
    Other(String),
}

impl ParcelStatus {
    pub const REGISTERED: &'static str = "registered";
    pub const SENT: &'static str = "sent";
    pub const DELIVERED: &'static str = "delivered";

    /// Parses stored status text. Never fails; unknown text becomes `Other`.
    pub fn parse(value: &str) -> Self {
        match value {
            Self::REGISTERED => Self::Registered,
            Self::SENT => Self::Sent,
            Self::DELIVERED => Self::Delivered,
            other => Self::Other(other.to_string()),
        }
    }

    /// Text written to `parcel.status`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Registered => Self::REGISTERED,
            Self::Sent => Self::SENT,
            Self::Delivered => Self::DELIVERED,
            Self::Other(value) => value.as_str(),
        }
    }

    /// Whether address changes and deletion are permitted.
    pub fn allows_mutation(&self) -> bool {
        matches!(self, Self::Registered)
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ParcelStatus {
    fn from(value: String) -> Self {
        match Self::parse(&value) {
            Self::Other(_) => Self::Other(value),
            known => known,
        }
    }
}

impl From<&str> for ParcelStatus {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<ParcelStatus> for String {
    fn from(value: ParcelStatus) -> Self {
        match value {
            ParcelStatus::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

/// One row of the `parcel` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Ignored on insert; filled from storage on reads.
    pub number: ParcelNumber,
    pub client: ClientId,
    pub status: ParcelStatus,
    pub address: String,
    /// Creation timestamp text, RFC 3339 when produced by this crate.
    pub created_at: String,
}

impl Parcel {
    /// Builds an unsaved parcel. `number` stays `0` until storage assigns one.
    pub fn new(
        client: ClientId,
        status: ParcelStatus,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            number: 0,
            client,
            status,
            address: address.into(),
            created_at: created_at.into(),
        }
    }

    /// Builds a `registered` parcel, the state every tracked parcel starts in.
    pub fn registered(
        client: ClientId,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self::new(client, ParcelStatus::Registered, address, created_at)
    }
}
