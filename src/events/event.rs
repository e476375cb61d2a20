//! Event record and severity levels.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Timestamp layout written into every event (local time, second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Arbitrary structured fields attached to an event.
pub type Fields = Map<String, Value>;

/// Event severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    /// Whether an event at this level passes a `min` threshold.
    pub fn passes(&self, min: Level) -> bool {
        *self <= min
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// A single structured log record.
///
/// Wire form is one flat JSON object: `timestamp`, `level`, `message` and the
/// message-specific fields side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Written as `TIMESTAMP_FORMAT`; read back as any string or number,
    /// empty when absent.
    #[serde(default, deserialize_with = "timestamp_text")]
    pub timestamp: String,
    pub level: Level,
    /// Discriminator acting as the event type ("HTTP Request", ...).
    pub message: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl LogEvent {
    pub fn new(at: DateTime<Local>, level: Level, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            level,
            message: message.into(),
            fields,
        }
    }

    /// Parse one line of an event stream.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        serde_json::from_str(trimmed).ok()
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// True when `name` is present with a JavaScript-truthy value.
    pub fn has_flag(&self, name: &str) -> bool {
        match self.fields.get(name) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
            Some(_) => true,
        }
    }
}

fn timestamp_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Turn a `json!({...})` value into event fields.
///
/// Objects are taken as-is, `null` yields no fields, anything else is kept
/// under a `data` key.
pub fn into_fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        Value::Null => Fields::new(),
        other => {
            let mut map = Fields::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}
