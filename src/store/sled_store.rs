//! A `sled`-backed [`SeriesStore`], grounded in `garage_db`'s `sled_adapter`:
//! one `sled::Tree` per logical table (here, one per series plus one shared
//! tree for version rows), `sled::Batch` for atomic per-tree writes.

use super::{DataVersionRow, RecordUpdate, SeriesStore};
use crate::error::StoreError;
use crate::series::{Series, SeriesKey};
use crate::stream::RecordMode;
use sled::transaction::{ConflictableTransactionResult, Transactional};
use std::path::{Path, PathBuf};

const VERSIONS_TREE: &str = "data_versions";

pub struct SledStore {
    db: sled::Db,
    path: PathBuf,
}

impl SledStore {
    fn record_tree(&self, series: Series) -> Result<sled::Tree, StoreError> {
        self.db
            .open_tree(format!("series:{series}"))
            .map_err(map_sled_err)
    }

    fn versions_tree(&self) -> Result<sled::Tree, StoreError> {
        self.db.open_tree(VERSIONS_TREE).map_err(map_sled_err)
    }
}

impl SeriesStore for SledStore {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(map_sled_err)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Empties `series`' record tree and drops its version row in one
    /// transaction, so a crash or fetch failure midway through a reset can
    /// never leave a version row pointing at data that no longer exists.
    fn clear_series(&self, series: Series) -> Result<(), StoreError> {
        let tree = self.record_tree(series)?;
        let versions = self.versions_tree()?;
        let keys: Vec<sled::IVec> = tree
            .iter()
            .filter_map(|entry| entry.ok().map(|(key, _)| key))
            .collect();
        let version_key = series.to_string();

        (&tree, &versions)
            .transaction(|(tx_tree, tx_versions)| -> ConflictableTransactionResult<(), ()> {
                for key in &keys {
                    tx_tree.remove(key.as_ref())?;
                }
                tx_versions.remove(version_key.as_bytes())?;
                Ok(())
            })
            .map_err(|err| StoreError::Backend(format!("{err:?}")))?;

        tree.flush().map_err(map_sled_err)?;
        versions.flush().map_err(map_sled_err)?;
        Ok(())
    }

    fn update_series(&self, series: Series, updates: &[RecordUpdate]) -> Result<(), StoreError> {
        let tree = self.record_tree(series)?;
        let mut batch = sled::Batch::default();
        for update in updates {
            let key = encode_key(&update.key);
            match update.mode {
                RecordMode::Delete => batch.remove(key),
                RecordMode::Add | RecordMode::Change => {
                    let value = update.value.as_ref().ok_or_else(|| {
                        StoreError::Backend("add/change update is missing a value".to_string())
                    })?;
                    let bytes = serde_json::to_vec(value)
                        .map_err(|err| StoreError::Backend(err.to_string()))?;
                    batch.insert(key, bytes);
                }
            }
        }
        tree.apply_batch(batch).map_err(map_sled_err)?;
        tree.flush().map_err(map_sled_err)?;
        Ok(())
    }

    fn update_data_version(&self, series: Series, row: &DataVersionRow) -> Result<(), StoreError> {
        let tree = self.versions_tree()?;
        let bytes = serde_json::to_vec(row).map_err(|err| StoreError::Backend(err.to_string()))?;
        tree.insert(series.to_string().as_bytes(), bytes)
            .map_err(map_sled_err)?;
        tree.flush().map_err(map_sled_err)?;
        Ok(())
    }

    fn get_data_version(&self, series: Series) -> Result<Option<DataVersionRow>, StoreError> {
        let tree = self.versions_tree()?;
        let Some(bytes) = tree.get(series.to_string().as_bytes()).map_err(map_sled_err)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn destroy(self) -> Result<(), StoreError> {
        drop(self.db);
        std::fs::remove_dir_all(&self.path).map_err(|err| StoreError::Backend(err.to_string()))
    }
}

fn encode_key(key: &SeriesKey) -> Vec<u8> {
    match key {
        SeriesKey::Id(id) | SeriesKey::Codepoint(id) => id.to_be_bytes().to_vec(),
        SeriesKey::Str(s) => s.as_bytes().to_vec(),
    }
}

/// `sled` has no `storage.estimate()`-style quota API, so an out-of-space
/// condition surfaces only as an `io::Error` on the write that hit it. This
/// is the closest local analogue to the spec's quota check (documented as an
/// open decision in DESIGN.md).
fn map_sled_err(err: sled::Error) -> StoreError {
    if let sled::Error::Io(io_err) = &err {
        let message = io_err.to_string().to_lowercase();
        if message.contains("no space") || message.contains("disk full") || message.contains("quota")
        {
            return StoreError::QuotaExceeded;
        }
    }
    StoreError::Backend(err.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::version::Version;
    use serde_json::json;

    fn open_store() -> (SledStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn add_then_read_back_via_iteration() {
        let (store, _dir) = open_store();
        store
            .update_series(
                Series::Kanji,
                &[RecordUpdate {
                    key: SeriesKey::Codepoint(19968),
                    mode: RecordMode::Add,
                    value: Some(json!({"id": 19968, "c": "一"})),
                }],
            )
            .unwrap();
        let tree = store.record_tree(Series::Kanji).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn delete_removes_the_key() {
        let (store, _dir) = open_store();
        let key = SeriesKey::Id(1);
        store
            .update_series(
                Series::Words,
                &[RecordUpdate {
                    key: key.clone(),
                    mode: RecordMode::Add,
                    value: Some(json!({"id": 1})),
                }],
            )
            .unwrap();
        store
            .update_series(
                Series::Words,
                &[RecordUpdate {
                    key,
                    mode: RecordMode::Delete,
                    value: None,
                }],
            )
            .unwrap();
        let tree = store.record_tree(Series::Words).unwrap();
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn clear_series_empties_only_that_series() {
        let (store, _dir) = open_store();
        store
            .update_series(
                Series::Words,
                &[RecordUpdate {
                    key: SeriesKey::Id(1),
                    mode: RecordMode::Add,
                    value: Some(json!({"id": 1})),
                }],
            )
            .unwrap();
        store
            .update_series(
                Series::Kanji,
                &[RecordUpdate {
                    key: SeriesKey::Codepoint(1),
                    mode: RecordMode::Add,
                    value: Some(json!({"id": 1})),
                }],
            )
            .unwrap();
        store.clear_series(Series::Words).unwrap();
        assert_eq!(store.record_tree(Series::Words).unwrap().len(), 0);
        assert_eq!(store.record_tree(Series::Kanji).unwrap().len(), 1);
    }

    #[test]
    fn clear_series_also_drops_its_version_row() {
        let (store, _dir) = open_store();
        let words_row = DataVersionRow {
            version: Version::new(1, 1, 2),
            part_info: None,
            lang: "en".to_string(),
            database_version: None,
            date_of_creation: "2024-01-01".to_string(),
        };
        let kanji_row = DataVersionRow {
            version: Version::new(1, 0, 0),
            part_info: None,
            lang: "en".to_string(),
            database_version: None,
            date_of_creation: "2024-01-01".to_string(),
        };
        store.update_data_version(Series::Words, &words_row).unwrap();
        store.update_data_version(Series::Kanji, &kanji_row).unwrap();

        store.clear_series(Series::Words).unwrap();

        assert!(store.get_data_version(Series::Words).unwrap().is_none());
        assert_eq!(store.get_data_version(Series::Kanji).unwrap(), Some(kanji_row));
    }

    #[test]
    fn data_version_round_trips() {
        let (store, _dir) = open_store();
        assert!(store.get_data_version(Series::Names).unwrap().is_none());
        let row = DataVersionRow {
            version: Version::new(1, 0, 0),
            part_info: None,
            lang: "en".to_string(),
            database_version: Some("175".to_string()),
            date_of_creation: "2024-01-01".to_string(),
        };
        store.update_data_version(Series::Names, &row).unwrap();
        assert_eq!(store.get_data_version(Series::Names).unwrap(), Some(row));
    }

    #[test]
    fn add_without_value_is_a_backend_error() {
        let (store, _dir) = open_store();
        let err = store
            .update_series(
                Series::Words,
                &[RecordUpdate {
                    key: SeriesKey::Id(1),
                    mode: RecordMode::Add,
                    value: None,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
