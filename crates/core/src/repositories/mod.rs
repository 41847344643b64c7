//! Domain services.
//!
//! Each service owns one area of the clinic and talks to storage only through the traits in
//! [`crate::store`]. Services contain no transport concerns: authentication, HTTP and socket
//! handling belong in `api-rest`, `api-realtime` or `api-shared`.

pub mod grants;
pub mod messaging;
pub mod notifications;
pub mod patients;
pub mod users;
