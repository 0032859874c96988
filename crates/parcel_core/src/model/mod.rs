//! Domain model for tracked parcels.
//!
//! # Invariants
//! - A parcel is identified by the storage-assigned `ParcelNumber`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod parcel;
