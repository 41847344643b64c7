//! # API Shared
//!
//! Shared utilities and definitions for the clinic APIs.
//!
//! Contains:
//! - Bearer-token minting and verification (`auth`)
//! - Shared services like `HealthService`
//! - JSON wire types with OpenAPI schemas (`wire`)
//!
//! Used by `api-rest` and `api-realtime` for common functionality.

pub mod auth;
pub mod health;
pub mod wire;

pub use auth::{TokenConfig, TokenError, TokenResult, TokenService};
pub use health::HealthService;
pub use wire::*;
