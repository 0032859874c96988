//! Use-case services over parcel persistence.
//!
//! # Responsibility
//! - Turn tracker commands (register, advance, re-address) into repository calls.
//! - Keep callers independent of SQL and connection handling.

pub mod parcel_service;
