//! The progress/event callback surface, matching spec.md §6's literal
//! callback list (`updatestart`, `filestart{version}`,
//! `progress{fileProgress,totalProgress}`, `parseerror`, `fileend`,
//! `updateend`), each carrying the series identifier.
//!
//! Every method defaults to a no-op, so an embedder only overrides the
//! calls it cares about, and the driver holds an `Option<&dyn SyncReporter>`
//! rather than threading callback closures through every function signature.

use crate::error::ValidationError;
use crate::series::Series;
use crate::version::Version;
use serde_json::Value;

/// Notified of the events an `update()` call produces, per spec.md §4.7/§6.
pub trait SyncReporter: Send + Sync {
    /// An update for `series` has started.
    fn on_update_start(&self, _series: Series) {}

    /// The stored data for `series` is being discarded before new data is
    /// written, either because there was nothing stored locally or because
    /// the planner promoted a resumed download into a full reset.
    fn on_reset(&self, _series: Series) {}

    /// Began streaming one planned file.
    fn on_file_start(&self, _series: Series, _version: Version) {}

    /// Progress within the current file. `file_progress` is the fraction of
    /// the current file completed; `total_progress` is the running fraction
    /// of the whole `update()` call completed, both in `[0, 1]`. The driver
    /// throttles mid-file calls to at most one per `progress_epsilon`
    /// increase in `total_progress` (spec.md §4.7).
    fn on_progress(&self, _series: Series, _file_progress: f64, _total_progress: f64) {}

    /// A record failed validation and was skipped. The update continues;
    /// this is purely informational.
    fn on_parse_error(&self, _series: Series, _error: &ValidationError, _record: &Value) {}

    /// Finished streaming one planned file.
    fn on_file_end(&self, _series: Series) {}

    /// The whole `update()` call for `series` finished successfully.
    fn on_update_end(&self, _series: Series) {}
}

#[cfg(test)]
mod test {
    use super::*;

    struct Silent;
    impl SyncReporter for Silent {}

    #[test]
    fn default_methods_are_callable_as_no_ops() {
        let reporter = Silent;
        reporter.on_update_start(Series::Words);
        reporter.on_reset(Series::Words);
        reporter.on_update_end(Series::Words);
    }
}
