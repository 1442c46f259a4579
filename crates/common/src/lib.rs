
pub mod pretty;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use types::Value;

/// Canonical error type shared across the query pipeline.
///
/// Variants follow the pipeline layers: analysis failures are `Schema`,
/// `Type`, or `Semantic`; planning failures are `Plan` or `Translate`;
/// everything surfaced through an operator's `next` is a runtime
/// variant.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("parse: {0}")]
    Parse(String),
    #[error("schema: {0}")]
    Schema(String),
    #[error("type: {0}")]
    Type(String),
    #[error("semantic: {0}")]
    Semantic(String),
    #[error("plan: {0}")]
    Plan(String),
    #[error("translate: {0}")]
    Translate(String),
    #[error("runtime: {0}")]
    Runtime(String),
    #[error("query cancelled")]
    Cancelled,
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("data source: {message}")]
    DataSource {
        message: String,
        /// Idempotent transport failures may be retried once by the scan.
        retryable: bool,
    },
}

impl QueryError {
    pub fn data_source(message: impl Into<String>) -> Self {
        QueryError::DataSource {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn data_source_retryable(message: impl Into<String>) -> Self {
        QueryError::DataSource {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::DataSource { retryable: true, .. })
    }
}

/// Result alias that carries a `QueryError`.
pub type QueryResult<T> = Result<T, QueryError>;

/// A single record flowing through the execution pipeline: an
/// insertion-order-preserving map from field name to dynamic value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Build a row from a backend `_source` document.
    pub fn from_source(source: serde_json::Map<String, serde_json::Value>) -> Self {
        let values = source
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect();
        Self { values }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Lookup that also walks dotted paths into nested objects when no
    /// top-level field matches exactly.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.values.get(path) {
            return Some(v);
        }
        let mut segments = path.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            match current {
                Value::Object(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    pub fn delete(&mut self, field: &str) -> Option<Value> {
        self.values.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        self.get_path(field).and_then(Value::as_str_coerced)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get_path(field).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get_path(field).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get_path(field).and_then(Value::as_bool)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Per-operator row accounting exposed through `Operator::stats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperatorStats {
    /// Rows pulled from the child (or the backend, for scans).
    pub rows_read: u64,
    /// Rows handed to the parent.
    pub rows_returned: u64,
}

/// Runtime configuration for the pipeline components.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder()
///     .scan_batch_size(500)
///     .pushdown_enabled(false)
///     .build();
/// assert_eq!(config.scan_batch_size, 500);
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct Config {
    /// Default request `size` when the query carries no limit.
    #[builder(default = 1000)]
    pub scan_batch_size: usize,
    /// Hard cap for the sort operator's materialized buffer.
    #[builder(default = 100_000)]
    pub sort_max_rows: usize,
    /// Hard cap for the grouped-aggregation hash map.
    #[builder(default = 50_000)]
    pub agg_max_groups: usize,
    /// Per-row bound for parse/rex regex evaluation.
    #[builder(default = Duration::from_millis(100))]
    pub regex_timeout: Duration,
    /// Global switch: when false the translator receives nothing and the
    /// whole pipeline runs locally.
    #[builder(default = true)]
    pub pushdown_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

/// Ambient cancellation flag handed to every operator.
///
/// Cheap to clone; checked before each row produced and before every
/// backend call.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Error-returning check used at operator suspension points.
    pub fn check(&self) -> QueryResult<()> {
        if self.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{CancelToken, Config, OperatorStats, QueryError, QueryResult, Row};
    pub use types::{FieldType, Value};
}
