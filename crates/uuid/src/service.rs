//! Internal implementation of the identifier types.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// The clinic's canonical UUID representation (32 lowercase hex characters, no hyphens).
///
/// This wrapper type guarantees that once constructed, the contained UUID is in canonical
/// format. Use it whenever an identifier crosses a boundary (HTTP path, JSON body, token
/// subject, socket payload) so that equality and map lookups are never confused by
/// alternative spellings of the same UUID.
///
/// # Construction
/// - [`ClinicUuid::new`] generates a new canonical UUID.
/// - [`ClinicUuid::parse`] validates an externally supplied identifier.
///
/// # Display format
/// Always the canonical 32-character lowercase hex format without hyphens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClinicUuid(Uuid);

impl Default for ClinicUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl ClinicUuid {
    /// Generates a new random (v4) UUID in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (for example, hyphenated or
    /// uppercase). Callers must provide the canonical representation.
    ///
    /// # Arguments
    ///
    /// * `input` - UUID string to validate and wrap. Must be exactly 32 lowercase hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid UUID '{}': {}", input, e)))
    }

    /// Returns the UUID as a `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical UUID form.
    ///
    /// This is a purely syntactic check: exactly 32 bytes, only `0-9` and `a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl From<Uuid> for ClinicUuid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for ClinicUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ClinicUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClinicUuid::parse(s)
    }
}

impl serde::Serialize for ClinicUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ClinicUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ClinicUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A time-prefixed identifier.
///
/// Format:
/// `YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`
///
/// Example:
/// `20260111T143522.045Z-550e8400e29b41d4a716446655440000`
///
/// Ordering compares the timestamp first, so ids produced by one [`TimestampIdGenerator`]
/// sort in the order they were handed out.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimestampId {
    timestamp: DateTime<Utc>,
    uuid: ClinicUuid,
}

impl TimestampId {
    /// Returns the timestamp component.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the UUID component.
    pub fn uuid(&self) -> &ClinicUuid {
        &self.uuid
    }

    /// Generate a new timestamp id.
    ///
    /// If `last` is provided, the timestamp is guaranteed to be strictly greater than the
    /// last one (by at least 1 ms).
    pub fn generate(last: Option<&TimestampId>) -> Self {
        let now = truncate_to_millis(Utc::now());

        let timestamp = match last {
            Some(prev) if now <= prev.timestamp => prev.timestamp + Duration::milliseconds(1),
            _ => now,
        };

        Self {
            timestamp,
            uuid: ClinicUuid::new(),
        }
    }
}

// The textual form carries millisecond precision; keeping the in-memory value at the same
// precision makes parse(display(id)) == id.
fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

impl FromStr for TimestampId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts_str, uuid_str) = s.split_once('-').ok_or_else(|| {
            UuidError::InvalidInput(format!("Invalid timestamp id format: '{}'", s))
        })?;

        let ts_no_z = ts_str.strip_suffix('Z').ok_or_else(|| {
            UuidError::InvalidInput(format!("Timestamp must end with 'Z': '{}'", ts_str))
        })?;

        let naive =
            chrono::NaiveDateTime::parse_from_str(ts_no_z, "%Y%m%dT%H%M%S%.3f").map_err(|e| {
                UuidError::InvalidInput(format!("Invalid timestamp format '{}': {}", ts_str, e))
            })?;

        Ok(Self {
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            uuid: ClinicUuid::parse(uuid_str)?,
        })
    }
}

impl fmt::Display for TimestampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            self.uuid
        )
    }
}

impl serde::Serialize for TimestampId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for TimestampId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TimestampId::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Hands out strictly increasing [`TimestampId`]s.
///
/// The last issued id is kept behind a short-lived mutex; the lock is never held across an
/// `.await`.
#[derive(Debug, Default)]
pub struct TimestampIdGenerator {
    last: Mutex<Option<TimestampId>>,
}

impl TimestampIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id, strictly greater than every id previously returned.
    pub fn next_id(&self) -> TimestampId {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = TimestampId::generate(last.as_ref());
        *last = Some(id.clone());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let id = ClinicUuid::new();
        let canonical = id.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(ClinicUuid::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let parsed = ClinicUuid::parse(canonical).expect("canonical input should parse");

        assert_eq!(parsed.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        let result = ClinicUuid::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_and_wrong_length() {
        assert!(ClinicUuid::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(ClinicUuid::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(ClinicUuid::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(ClinicUuid::parse("550e8400e29b41d4a716446655440zzz").is_err());
        assert!(ClinicUuid::parse("").is_err());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let id = ClinicUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let json = serde_json::to_string(&id).expect("serialise");
        assert_eq!(json, "\"550e8400e29b41d4a716446655440000\"");

        let back: ClinicUuid = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, id);

        let hyphenated: Result<ClinicUuid, _> =
            serde_json::from_str("\"550e8400-e29b-41d4-a716-446655440000\"");
        assert!(hyphenated.is_err());
    }

    #[test]
    fn test_timestamp_id_generate_monotonic_same_instant() {
        let first = TimestampId::generate(None);
        let second = TimestampId::generate(Some(&first));

        assert!(second.timestamp() > first.timestamp());
        assert!(second > first);
    }

    #[test]
    fn test_timestamp_id_parse_and_display() {
        let raw = "20260111T143522.045Z-550e8400e29b41d4a716446655440000";
        let id = TimestampId::from_str(raw).expect("valid timestamp id");

        assert_eq!(id.uuid().to_string(), "550e8400e29b41d4a716446655440000");
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn test_timestamp_id_parse_errors() {
        let missing_hyphen = "20260111T143522.045Z550e8400e29b41d4a716446655440000";
        match TimestampId::from_str(missing_hyphen) {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("Invalid timestamp id")),
            _ => panic!("Expected InvalidInput error"),
        }

        let missing_z = "20260111T143522.045-550e8400e29b41d4a716446655440000";
        match TimestampId::from_str(missing_z) {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("must end with 'Z'")),
            _ => panic!("Expected InvalidInput error"),
        }

        let bad_month = "20260199T143522.045Z-550e8400e29b41d4a716446655440000";
        assert!(TimestampId::from_str(bad_month).is_err());
    }

    #[test]
    fn test_generated_id_survives_text_form() {
        let id = TimestampId::generate(None);
        let parsed = TimestampId::from_str(&id.to_string()).expect("should parse own output");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_generator_is_strictly_increasing() {
        let generator = TimestampIdGenerator::new();
        let ids: Vec<TimestampId> = (0..50).map(|_| generator.next_id()).collect();

        for pair in ids.windows(2) {
            assert!(pair[1] > pair[0], "ids must be strictly increasing");
        }
    }
}
