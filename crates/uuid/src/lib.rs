//! Identifier utilities for the clinic backend.
//!
//! Every entity (users, patients, grants, sessions, groups, notifications, live connections)
//! is keyed by a *canonical* UUID: **32 lowercase hexadecimal characters** with no hyphens.
//!
//! This crate provides:
//! - [`ClinicUuid`], a wrapper that *guarantees* the canonical format once constructed.
//! - [`TimestampId`], a time-prefixed identifier used where listing order must equal
//!   acceptance order (chat messages).
//! - [`TimestampIdGenerator`], which hands out strictly increasing [`TimestampId`]s.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for externally supplied identifiers (path segments, request
//! bodies, token subjects). Use [`ClinicUuid::parse`] to validate an input string;
//! uppercase or hyphenated values are rejected rather than normalised.

mod service;

pub use service::{ClinicUuid, TimestampId, TimestampIdGenerator, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
