//! Flush pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for the periodic flush of pending counter groups into the ledger.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FlushConfig {
    /// Interval in milliseconds between flush cycles.
    ///
    /// Default: 10000 (10 seconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum number of flush workers running at the same time.
    ///
    /// Default: 20
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: u16,

    /// Namespace prefix of counter group keys (`<namespace>:<id>:counts`).
    ///
    /// Default: "advertisement"
    #[serde(default = "default_key_namespace")]
    pub key_namespace: String,

    /// Number of keys requested per page while scanning for pending groups.
    ///
    /// Default: 100
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: u32,

    /// Optional upper bound in milliseconds on a single worker's run time.
    ///
    /// Workers exceeding it are abandoned and their group is retried next cycle.
    #[serde(default)]
    pub worker_timeout_ms: Option<u64>,
}

impl FlushConfig {
    /// Default flush interval: 10 seconds.
    pub const DEFAULT_INTERVAL_MS: u64 = 10_000;

    /// Default worker cap: 20.
    pub const DEFAULT_MAX_CONCURRENT_WORKERS: u16 = 20;

    pub const DEFAULT_KEY_NAMESPACE: &'static str = "advertisement";

    /// Characters a namespace may not hold: the key separator and Redis glob syntax.
    pub const RESERVED_NAMESPACE_CHARS: &'static [char] = &[':', '*', '?', '[', ']', '\\'];

    pub const DEFAULT_SCAN_PAGE_SIZE: u32 = 100;

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_ms.map(Duration::from_millis)
    }

    /// Validates the flush configuration.
    ///
    /// Rejects zero intervals, caps, page sizes and timeouts, and an empty namespace or one
    /// holding `:` or a glob metacharacter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "flush.interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_concurrent_workers == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "flush.max_concurrent_workers".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.key_namespace.trim().is_empty()
            || self.key_namespace.contains(Self::RESERVED_NAMESPACE_CHARS)
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "flush.key_namespace".to_string(),
                constraint: format!(
                    "must be non-empty and must not contain any of {:?}",
                    Self::RESERVED_NAMESPACE_CHARS
                ),
            });
        }

        if self.scan_page_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "flush.scan_page_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.worker_timeout_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "flush.worker_timeout_ms".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::DEFAULT_INTERVAL_MS,
            max_concurrent_workers: Self::DEFAULT_MAX_CONCURRENT_WORKERS,
            key_namespace: Self::DEFAULT_KEY_NAMESPACE.to_string(),
            scan_page_size: Self::DEFAULT_SCAN_PAGE_SIZE,
            worker_timeout_ms: None,
        }
    }
}

fn default_interval_ms() -> u64 {
    FlushConfig::DEFAULT_INTERVAL_MS
}

fn default_max_concurrent_workers() -> u16 {
    FlushConfig::DEFAULT_MAX_CONCURRENT_WORKERS
}

fn default_key_namespace() -> String {
    FlushConfig::DEFAULT_KEY_NAMESPACE.to_string()
}

fn default_scan_page_size() -> u32 {
    FlushConfig::DEFAULT_SCAN_PAGE_SIZE
}
