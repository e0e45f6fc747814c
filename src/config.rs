//! Configuration for a live table.
//!
//! Configuration can be constructed programmatically or deserialized from
//! JSON/YAML.
//!
//! # Quick Start
//!
//! ```rust
//! use live_table::config::LiveTableConfig;
//!
//! let config = LiveTableConfig::new("thing", "type", "vehicle");
//! assert_eq!(config.channel_name, "thing:vehicle");
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! LiveTableConfig
//! ├── table_name: String           # Source table
//! ├── column_name: String          # Filter column
//! ├── column_value: JSON value     # Filter value (equality)
//! ├── channel_name: String         # Subscription channel
//! └── settings: LiveTableSettings
//!     ├── reconciler: ReconcilerConfig
//!     │   ├── replay_policy        # "watermark" | "per_row"
//!     │   ├── buffer_warn_threshold
//!     │   └── record_changes       # per-row change notifications
//!     ├── snapshot_timeout: "10s"
//!     └── emit_unchanged: bool
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "table_name": "thing",
//!   "column_name": "type",
//!   "column_value": "vehicle",
//!   "channel_name": "thing:vehicle",
//!   "settings": {
//!     "reconciler": { "replay_policy": "per_row" },
//!     "snapshot_timeout": "5s"
//!   }
//! }
//! ```

use crate::error::{ReplicaError, Result};
use crate::source::Filter;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything needed to run one live table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveTableConfig {
    /// Table the rows come from.
    pub table_name: String,

    /// Column the snapshot and subscription filter on.
    pub column_name: String,

    /// Value the filter column must equal.
    pub column_value: serde_json::Value,

    /// Subscription channel name. Defaults to `table:value`.
    #[serde(default)]
    pub channel_name: String,

    /// Tunables.
    #[serde(default)]
    pub settings: LiveTableSettings,
}

impl LiveTableConfig {
    /// Create a config with default settings and a derived channel name.
    pub fn new(
        table_name: &str,
        column_name: &str,
        column_value: impl Into<serde_json::Value>,
    ) -> Self {
        let mut config = Self {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            column_value: column_value.into(),
            channel_name: String::new(),
            settings: LiveTableSettings::default(),
        };
        config.channel_name = config.default_channel_name();
        config
    }

    /// Create a minimal config for testing (short snapshot timeout).
    pub fn for_testing(table_name: &str) -> Self {
        let mut config = Self::new(table_name, "type", "test");
        config.settings.snapshot_timeout = "1s".to_string();
        config
    }

    /// The snapshot/subscription filter described by this config.
    pub fn filter(&self) -> Filter {
        Filter {
            table: self.table_name.clone(),
            column: self.column_name.clone(),
            value: self.column_value.clone(),
        }
    }

    /// Channel name, falling back to `table:value` when unset.
    pub fn channel(&self) -> String {
        if self.channel_name.is_empty() {
            self.default_channel_name()
        } else {
            self.channel_name.clone()
        }
    }

    fn default_channel_name(&self) -> String {
        match &self.column_value {
            serde_json::Value::String(s) => format!("{}:{}", self.table_name, s),
            other => format!("{}:{}", self.table_name, other),
        }
    }

    /// Check the config for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(ReplicaError::Config("table_name must not be empty".to_string()));
        }
        if self.column_name.trim().is_empty() {
            return Err(ReplicaError::Config("column_name must not be empty".to_string()));
        }
        if self.column_value.is_null() {
            return Err(ReplicaError::Config("column_value must not be null".to_string()));
        }
        self.settings.parse_snapshot_timeout()?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LiveTableSettings
// ═══════════════════════════════════════════════════════════════════════════════

/// Host and driver tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveTableSettings {
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Upper bound on the snapshot fetch, as a duration string (e.g. "10s").
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout: String,

    /// Report records after events that changed nothing (duplicates,
    /// stale updates, deletes of absent rows).
    #[serde(default = "default_true")]
    pub emit_unchanged: bool,
}

fn default_snapshot_timeout() -> String {
    "10s".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LiveTableSettings {
    fn default() -> Self {
        Self {
            reconciler: ReconcilerConfig::default(),
            snapshot_timeout: "10s".to_string(),
            emit_unchanged: true,
        }
    }
}

impl LiveTableSettings {
    /// Parse the snapshot timeout string to a Duration.
    pub fn parse_snapshot_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.snapshot_timeout).map_err(|e| {
            ReplicaError::Config(format!(
                "invalid snapshot_timeout {:?}: {}",
                self.snapshot_timeout, e
            ))
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ReconcilerConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// How buffered events are pre-filtered when the first snapshot lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Discard buffered events older than the snapshot's global watermark.
    #[default]
    Watermark,
    /// Discard buffered events older than the snapshot's version of the
    /// same row. Events for rows missing from the snapshot always replay.
    PerRow,
}

/// Reconciler tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub replay_policy: ReplayPolicy,

    /// Log a warning when this many events are waiting for the snapshot.
    /// The buffer itself is never truncated.
    #[serde(default = "default_buffer_warn_threshold")]
    pub buffer_warn_threshold: usize,

    /// Keep a log of row-level changes for [`take_changes`].
    ///
    /// [`take_changes`]: crate::reconciler::Reconciler::take_changes
    #[serde(default)]
    pub record_changes: bool,
}

fn default_buffer_warn_threshold() -> usize {
    10_000
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            replay_policy: ReplayPolicy::Watermark,
            buffer_warn_threshold: 10_000,
            record_changes: false,
        }
    }
}
