use chrono::NaiveDate;
use thiserror::Error;

/// Errors that abort a report request.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No statements found from {date_from} to {date_to}")]
    EmptyResult {
        date_from: NaiveDate,
        date_to: NaiveDate,
    },

    #[error("Employee {employee_id} does not have any bound device by {date}")]
    MissingBinding { employee_id: i64, date: NaiveDate },

    #[error("Device {device_id} of employee {employee_id} doesn't have any locations for {date}")]
    NoLocationData {
        employee_id: i64,
        device_id: i64,
        date: NaiveDate,
    },

    #[error("Invalid date range: {date_from} is after {date_to}")]
    InvalidRange {
        date_from: NaiveDate,
        date_to: NaiveDate,
    },

    #[error("Relation store error: {0}")]
    Store(#[from] StoreError),

    /// Only produced on the cached path; the dispatcher absorbs it.
    #[error("Snapshot cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),

    /// Snapshots do not hold rows before the window start.
    #[error("Request starting {date_from} is outside the cache window starting {window_start}")]
    OutsideCacheWindow {
        date_from: NaiveDate,
        window_start: NaiveDate,
    },
}

impl ReportError {
    /// Whether the direct path can still serve the request.
    pub fn is_cache_fallback(&self) -> bool {
        matches!(
            self,
            ReportError::CacheUnavailable(_) | ReportError::OutsideCacheWindow { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Query task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache service unreachable: {0}")]
    Unavailable(String),

    #[error("Cache service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl CacheError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        CacheError::Status {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported snapshot format version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Snapshot holds relation '{found}', expected '{expected}'")]
    Relation { found: String, expected: String },

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Column '{column}' has type {found}, expected {expected}")]
    ColumnType {
        column: String,
        found: &'static str,
        expected: &'static str,
    },

    #[error("Column '{column}' has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        found: usize,
        expected: usize,
    },

    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot compression error: {0}")]
    Compression(#[from] std::io::Error),
}

/// The cluster deriver could not build stays from the given pings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusterDerivationError {
    #[error("Not enough pings to cluster: {found} (need at least {required})")]
    InsufficientPings { found: usize, required: usize },

    #[error("Malformed pings: {0}")]
    Malformed(String),
}
