//! Constants used throughout the clinic core crate.

/// Default bind address of the REST server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Default bind address of the real-time (WebSocket) server.
pub const DEFAULT_WS_ADDR: &str = "0.0.0.0:3001";

/// Default lifetime of issued bearer tokens, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Default upper bound on a presence write, in milliseconds.
pub const DEFAULT_PRESENCE_WRITE_TIMEOUT_MS: u64 = 2000;

/// Minimum accepted length of the token signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Number of messages returned when listing a conversation.
pub const DEFAULT_MESSAGE_HISTORY_LIMIT: usize = 100;

pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const MAX_GROUP_NAME_CHARS: usize = 120;
pub const MAX_DISPLAY_NAME_CHARS: usize = 120;

/// Minimum password length accepted when creating users.
pub const MIN_PASSWORD_LEN: usize = 8;
