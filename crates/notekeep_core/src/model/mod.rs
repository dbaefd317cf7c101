//! Note domain model and timestamp handling.
//!
//! # Responsibility
//! - Define the snapshots handed to callers of the repository.
//! - Own the canonical timestamp text format.
//!
//! # Invariants
//! - Values returned to callers are owned copies, never live rows.

pub mod note;
pub mod timestamp;
