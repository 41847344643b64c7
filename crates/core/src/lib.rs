//! # Clinic Core
//!
//! Core business logic for the clinic backend.
//!
//! - [`access`]: patient-access authorization over (actor, patient, grant)
//! - [`presence`]: who is connected, with persisted and announced transitions
//! - [`rooms`] and [`fanout`]: room-scoped real-time delivery plus the durable notification log
//! - [`repositories`]: domain services for users, grants, patient records and messaging
//! - [`store`]: storage traits and the in-memory backend
//!
//! **No API concerns**: authentication, HTTP and socket servers belong in `api-rest`,
//! `api-realtime` or `api-shared`.

pub mod access;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod fanout;
pub mod locks;
pub mod model;
pub mod password;
pub mod presence;
pub mod repositories;
pub mod rooms;
pub mod store;

pub use access::{AccessControl, AccessDecision, GrantLookup, Permission};
pub use config::CoreConfig;
pub use context::ClinicContext;
pub use error::{ClinicError, ClinicResult, StoreError, StoreResult};
pub use events::{DomainEvent, RoomKey, ServerEvent};
pub use model::{Actor, Role, UserType};

pub use clinic_types::{EmailAddress, NonEmptyText, TextError};
pub use clinic_uuid::{ClinicUuid, TimestampId};
