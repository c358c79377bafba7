//! Core types for captured errors.

use crate::error::CollectorError;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::str::FromStr;

/// Length of a generated record id.
pub const ID_LEN: usize = 9;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Locally generated record identifier.
///
/// Nine base-36 characters from a non-cryptographic RNG. Unique with high
/// probability only.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorId(pub String);

impl ErrorId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..ID_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        ErrorId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorId({})", self.0)
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capture time, serialized as ISO-8601 UTC with millisecond precision
/// (`2024-05-01T12:00:00.000Z`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Current time, truncated to the serialized precision.
    pub fn now() -> Self {
        Timestamp(Utc::now().trunc_subsecs(3))
    }

    pub fn to_iso_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_iso_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Timestamp(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

/// The capture path that produced a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// A failure that escaped every handler.
    Uncaught,
    /// An asynchronous failure nobody observed.
    UnhandledPromise,
    /// Raised through a `wrap_async` wrapper.
    AsyncFunction,
    /// Raised through a `wrap_sync` wrapper.
    SyncFunction,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::Uncaught,
        ErrorKind::UnhandledPromise,
        ErrorKind::AsyncFunction,
        ErrorKind::SyncFunction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Uncaught => "uncaught",
            ErrorKind::UnhandledPromise => "unhandled-promise",
            ErrorKind::AsyncFunction => "async-function",
            ErrorKind::SyncFunction => "sync-function",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CollectorError::InvalidKind(s.to_string()))
    }
}

/// A record before the collector stamps it with `app` and `id`.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorInput {
    pub kind: ErrorKind,
    pub message: String,
    pub stack: String,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    pub timestamp: Timestamp,
}

impl ErrorInput {
    /// Create an input stamped with the current time and no stack.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: String::new(),
            filename: None,
            lineno: None,
            colno: None,
            timestamp: Timestamp::now(),
        }
    }

    /// Create an input from any displayable failure, capturing a backtrace if enabled.
    pub fn from_failure(kind: ErrorKind, failure: &impl fmt::Display) -> Self {
        Self::new(kind, failure.to_string()).with_stack(capture_stack())
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    pub fn with_location(mut self, filename: impl Into<String>, lineno: u32, colno: u32) -> Self {
        self.filename = Some(filename.into());
        self.lineno = Some(lineno);
        self.colno = Some(colno);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A captured error. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Owning application instance.
    pub app: String,

    #[serde(rename = "type")]
    pub kind: ErrorKind,

    pub message: String,

    /// Stack trace text, empty when none was available.
    pub stack: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,

    pub timestamp: Timestamp,

    pub id: ErrorId,
}

impl ErrorRecord {
    /// Stamp an input with the owning app and a fresh id.
    pub fn from_input(app: &str, input: ErrorInput) -> Self {
        Self {
            app: app.to_string(),
            kind: input.kind,
            message: input.message,
            stack: input.stack,
            filename: input.filename,
            lineno: input.lineno,
            colno: input.colno,
            timestamp: input.timestamp,
            id: ErrorId::generate(),
        }
    }
}

/// Capture the current backtrace as text.
///
/// Honors `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`; returns an empty string when
/// capture is disabled or unsupported.
pub fn capture_stack() -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_id_shape() {
        let id = ErrorId::generate();
        assert_eq!(id.as_str().len(), ID_LEN);
        assert!(id
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(ErrorKind::UnhandledPromise).unwrap(),
            json!("unhandled-promise")
        );
        assert_eq!("sync-function".parse::<ErrorKind>().unwrap(), ErrorKind::SyncFunction);
        assert!(matches!(
            "panic".parse::<ErrorKind>(),
            Err(CollectorError::InvalidKind(_))
        ));
    }

    #[test]
    fn test_timestamp_iso_millis() {
        let ts = Timestamp(
            DateTime::parse_from_rfc3339("2024-05-01T12:00:00.123456Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        assert_eq!(ts.to_iso_string(), "2024-05-01T12:00:00.123Z");
    }

    #[test]
    fn test_record_wire_shape() {
        let input = ErrorInput::new(ErrorKind::Uncaught, "boom")
            .with_location("app.js", 10, 4)
            .with_stack("at main");
        let record = ErrorRecord::from_input("demo", input);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["app"], "demo");
        assert_eq!(value["type"], "uncaught");
        assert_eq!(value["message"], "boom");
        assert_eq!(value["stack"], "at main");
        assert_eq!(value["filename"], "app.js");
        assert_eq!(value["lineno"], 10);
        assert_eq!(value["colno"], 4);
        assert_eq!(value["id"], record.id.as_str());
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_location_omitted_when_absent() {
        let record = ErrorRecord::from_input("demo", ErrorInput::new(ErrorKind::SyncFunction, "x"));
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("filename"));
        assert!(!obj.contains_key("lineno"));
        assert!(!obj.contains_key("colno"));

        let back: ErrorRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
