// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Row model: identity, timestamps, and the [`Row`] trait.
//!
//! The engine never looks inside a row beyond three accessors: `id`,
//! `created_at` and `updated_at`. Everything else is application data and
//! is carried through untouched.
//!
//! # Effective Timestamp
//!
//! ```text
//! effective_timestamp = updated_at.unwrap_or(created_at)
//! ```
//!
//! This is the only ordering key used when two versions of a row compete.

use crate::error::{ReplicaError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, UNIX_EPOCH};

/// Largest microsecond value humantime can render (year 9999).
const MAX_RFC3339_MICROS: i64 = 253_402_300_799_999_999;

/// Opaque row identity, unique within a table and stable for a row's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(id) => write!(f, "{}", id),
            RowId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        RowId::Int(id)
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        RowId::Text(id.to_string())
    }
}

impl From<String> for RowId {
    fn from(id: String) -> Self {
        RowId::Text(id)
    }
}

/// Microseconds since the Unix epoch.
///
/// Deserializes from either an integer (microseconds) or an RFC 3339
/// string such as `"2024-03-01T10:00:00.123456Z"` or
/// `"2024-03-01T12:00:00+02:00"`. Always serializes as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTimestamp", into = "i64")]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch; watermark of an empty snapshot.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp from microseconds since the epoch.
    pub const fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    /// Microseconds since the epoch.
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Parse an RFC 3339 timestamp with any UTC offset.
    ///
    /// A missing offset (Postgres `timestamp without time zone`, `T` or
    /// space separated) is read as UTC.
    pub fn parse_rfc3339(s: &str) -> Result<Self> {
        let time = DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc()))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc()))
            .map_err(|e| ReplicaError::InvalidTimestamp(format!("{:?}: {}", s, e)))?;
        Ok(Timestamp(time.timestamp_micros()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if (0..=MAX_RFC3339_MICROS).contains(&self.0) {
            let time = UNIX_EPOCH + Duration::from_micros(self.0 as u64);
            write!(f, "{}", humantime::format_rfc3339_micros(time))
        } else {
            write!(f, "{}us", self.0)
        }
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Micros(i64),
    Text(String),
}

impl TryFrom<RawTimestamp> for Timestamp {
    type Error = ReplicaError;

    fn try_from(raw: RawTimestamp) -> Result<Self> {
        match raw {
            RawTimestamp::Micros(micros) => Ok(Timestamp(micros)),
            RawTimestamp::Text(text) => Timestamp::parse_rfc3339(&text),
        }
    }
}

/// What the engine needs from a replicated row.
///
/// Implement this for the application's row type. Rows without a static
/// type can use [`DynamicRow`].
pub trait Row: Clone + Send + 'static {
    /// Row identity.
    fn id(&self) -> RowId;

    /// Creation time; never changes.
    fn created_at(&self) -> Timestamp;

    /// Last modification time, `None` if never updated.
    fn updated_at(&self) -> Option<Timestamp>;

    /// `updated_at` if present, else `created_at`.
    fn effective_timestamp(&self) -> Timestamp {
        self.updated_at().unwrap_or_else(|| self.created_at())
    }
}

/// A row with the three required columns plus arbitrary JSON fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRow {
    pub id: RowId,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl DynamicRow {
    /// Create a row with no extra fields.
    pub fn new(id: impl Into<RowId>, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            created_at,
            updated_at: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Builder: set `updated_at`.
    pub fn updated(mut self, updated_at: Timestamp) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builder: set an application field.
    pub fn with_field(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Look up an application field.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

impl Row for DynamicRow {
    fn id(&self) -> RowId {
        self.id.clone()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }
}

/// The partial row carried by a DELETE event.
///
/// Change streams often send only the primary key of a deleted row, and
/// sometimes not even that, so `id` is optional here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeletedRow {
    #[serde(default)]
    pub id: Option<RowId>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl DeletedRow {
    /// A partial row carrying only an id.
    pub fn with_id(id: impl Into<RowId>) -> Self {
        Self {
            id: Some(id.into()),
            fields: serde_json::Map::new(),
        }
    }
}
