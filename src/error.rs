//! Error taxonomy for the sync engine (spec.md §7).
//!
//! One `thiserror` enum per component boundary, composed into a single
//! top-level error via `#[from]`, rather than one flat enum for the whole
//! crate.

use crate::plan::DownloadFileSpec;
use url::Url;

/// Errors from the HTTP fetch primitive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {0} was cancelled")]
    Aborted(Url),

    #[error("request to {0} timed out")]
    Timeout(Url),

    #[error("{0} was not found (404)")]
    NotFound(Url),

    #[error("{0} could not be accessed: {1}")]
    NotAccessible(Url, String),
}

/// Errors from the line-delimited JSON reader.
#[derive(Debug, thiserror::Error)]
pub enum LineReaderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("error reading response body: {0}")]
    Io(String),

    #[error("invalid JSON on line {line}: {source}")]
    InvalidJson {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("read timed out")]
    Timeout,

    #[error("read was cancelled")]
    Aborted,
}

/// Errors from the version-info resolver.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("version manifest not found at {0}")]
    VersionFileNotFound(Url),

    #[error("version manifest at {0} could not be accessed: {1}")]
    VersionFileNotAccessible(Url, String),

    #[error("version manifest at {0} is invalid: {1}")]
    VersionFileInvalid(Url, String),

    #[error("major version {major} not found for series {series}")]
    MajorVersionNotFound { series: String, major: u64 },
}

impl From<FetchError> for ManifestError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(url) => ManifestError::VersionFileNotFound(url),
            FetchError::Aborted(url) => {
                ManifestError::VersionFileNotAccessible(url, "cancelled".to_string())
            }
            FetchError::Timeout(url) => {
                ManifestError::VersionFileNotAccessible(url, "timed out".to_string())
            }
            FetchError::NotAccessible(url, msg) => ManifestError::VersionFileNotAccessible(url, msg),
        }
    }
}

/// Errors from the download planner. The planner is a pure function, so
/// this is its only variant.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("local version is newer than the server-published version")]
    DatabaseTooOld,
}

/// Errors from the per-file streamer.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    InvalidJson(#[from] LineReaderError),

    #[error("file for {spec:?} has no header as its first non-empty line")]
    HeaderMissing { spec: DownloadFileSpec },

    #[error("file for {spec:?} contains more than one header")]
    HeaderDuplicate { spec: DownloadFileSpec },

    #[error("header for {spec:?} does not match: {reason}")]
    VersionMismatch {
        spec: DownloadFileSpec,
        reason: String,
    },

    #[error("invalid record in {spec:?}: {reason}")]
    InvalidRecord {
        spec: DownloadFileSpec,
        reason: String,
    },
}

/// Errors from the record validator. These never abort an update on
/// their own; the driver turns them into `parseerror` callbacks.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has the wrong type")]
    WrongType { field: &'static str },

    #[error("field `{field}` must be >= {min}, got {actual}")]
    BelowMinimum {
        field: &'static str,
        min: i64,
        actual: i64,
    },

    #[error("field `{0}` must not be empty")]
    EmptyString(&'static str),

    #[error("unknown `_` discriminator `{0}`")]
    UnknownMode(String),

    #[error("record in a full file must not contain a `_` field")]
    UnexpectedMode,

    #[error("record in a patch file must contain a `_` field")]
    MissingMode,
}

/// Errors from the persistent store contract.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// The top-level error returned by `update()`, composing every
/// component error per spec.md §7's table.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("update was cancelled")]
    Aborted,
}
