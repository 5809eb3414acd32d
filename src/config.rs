//! Tunable constants for the sync engine.
//!
//! `SyncConfig` is shared across a whole `update()` call, carrying the
//! reference defaults below (batch size, progress epsilon, request timeout,
//! patch-gap threshold) made explicit and overridable rather than baked in.

use std::time::Duration;

/// Reference patch-gap threshold above which a resumed partitioned download
/// is abandoned in favor of a full reset (spec.md §4.4, §9).
pub const DEFAULT_RESUME_PATCH_GAP_THRESHOLD: u64 = 10;

/// Reference per-HTTP-call timeout (spec.md §5).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Reference batch size for store writes (spec.md §4.7).
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Reference progress-throttling epsilon (spec.md §4.7).
pub const DEFAULT_PROGRESS_EPSILON: f64 = 0.02;

/// Manifest cache TTL (spec.md §4.3).
pub const MANIFEST_CACHE_TTL: Duration = Duration::from_secs(3 * 60);

/// The knobs a caller may override on a per-`update()` basis; construct with
/// [`SyncConfig::new`] to start from the reference defaults above.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL data and manifest paths are joined against, e.g.
    /// `https://data.example.com/`.
    pub base_url: url::Url,

    /// Timeout applied independently to each HTTP call and to each
    /// subsequent body read.
    pub request_timeout: Duration,

    /// Number of validated record updates accumulated before a batch is
    /// flushed to the store.
    pub batch_size: usize,

    /// Minimum increase in `totalProgress` before a new mid-file progress
    /// event is emitted.
    pub progress_epsilon: f64,

    /// Number of intervening patches above which a resumed partitioned
    /// download is abandoned for a full reset.
    pub resume_patch_gap_threshold: u64,
}

impl SyncConfig {
    pub fn new(base_url: url::Url) -> Self {
        Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_epsilon: DEFAULT_PROGRESS_EPSILON,
            resume_patch_gap_threshold: DEFAULT_RESUME_PATCH_GAP_THRESHOLD,
        }
    }
}
