//! The persistent-store contract, target-language/backend-agnostic per
//! spec.md §4.8.
//!
//! `sled` is itself a synchronous API, so unlike the rest of this crate
//! `SeriesStore` is a plain (non-async) trait — callers that need to keep an
//! executor's worker threads free run its methods through
//! `tokio::task::spawn_blocking`.

pub mod sled_store;

use crate::error::StoreError;
use crate::series::{Series, SeriesKey};
use crate::stream::RecordMode;
use crate::version::{PartInfo, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One committed change to a series' stored records.
#[derive(Debug, Clone)]
pub struct RecordUpdate {
    pub key: SeriesKey,
    pub mode: RecordMode,
    /// `Some` for `Add`/`Change`, `None` for `Delete`.
    pub value: Option<Value>,
}

/// The persisted row tracking what version of a series is on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVersionRow {
    pub version: Version,
    pub part_info: Option<PartInfo>,
    pub lang: String,
    pub database_version: Option<String>,
    pub date_of_creation: String,
}

/// Storage contract the driver writes through. Implementors own both the per-record
/// data and the [`DataVersionRow`] bookkeeping, and must make
/// [`update_series`](SeriesStore::update_series) atomic per call: either
/// every update in the batch lands, or none does.
pub trait SeriesStore: Send + Sync {
    /// Opens (creating if absent) the store rooted at `path`.
    fn open(path: &std::path::Path) -> Result<Self, StoreError>
    where
        Self: Sized;

    /// Atomically discards every record stored for `series` and that
    /// series' version row, so a crash or fetch failure partway through a
    /// reset can never leave a version row pointing at data that no longer
    /// exists.
    fn clear_series(&self, series: Series) -> Result<(), StoreError>;

    /// Atomically applies one batch of record updates to `series`.
    fn update_series(&self, series: Series, updates: &[RecordUpdate]) -> Result<(), StoreError>;

    /// Replaces the stored version row for `series`.
    fn update_data_version(&self, series: Series, row: &DataVersionRow) -> Result<(), StoreError>;

    /// Reads back the stored version row for `series`, if any.
    fn get_data_version(&self, series: Series) -> Result<Option<DataVersionRow>, StoreError>;

    /// Deletes the store's on-disk state entirely.
    fn destroy(self) -> Result<(), StoreError>
    where
        Self: Sized;
}
