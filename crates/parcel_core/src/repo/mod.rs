//! Persistence for parcels.
//!
//! # Responsibility
//! - Define the parcel data-access contract.
//! - Keep SQL text and row mapping out of the service layer.
//!
//! # Invariants
//! - Repositories borrow a caller-owned connection; they never open or close one.
//! - Lookups by number report `NotFound` instead of returning empty records.

pub mod parcel_repo;
