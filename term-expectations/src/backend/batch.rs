//! Batches of data and the bookkeeping of which ones are loaded.

use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{Result, TermError};

/// SHA-256 digest of a batch's schema and contents.
///
/// Computed once when the batch is built, so it can serve as a cache key
/// even though Arrow data carries no identity of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchFingerprint(String);

impl BatchFingerprint {
    /// Fingerprints a record batch through its Arrow IPC encoding.
    pub fn of(data: &RecordBatch) -> Result<Self> {
        let mut buffer = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buffer, data.schema().as_ref())?;
            writer.write(data)?;
            writer.finish()?;
        }
        let mut hasher = Sha256::new();
        hasher.update(&buffer);
        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named slice of data to validate or profile.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    data: RecordBatch,
    fingerprint: BatchFingerprint,
}

impl Batch {
    pub fn new(id: impl Into<String>, data: RecordBatch) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TermError::configuration("batch id cannot be empty"));
        }
        let fingerprint = BatchFingerprint::of(&data)?;
        Ok(Self {
            id,
            data,
            fingerprint,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &RecordBatch {
        &self.data
    }

    pub fn fingerprint(&self) -> &BatchFingerprint {
        &self.fingerprint
    }

    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }
}

/// Where a loaded batch lives in the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedBatch {
    pub batch_id: String,
    pub table_name: String,
    pub fingerprint: BatchFingerprint,
    /// True when the table was already registered for identical data.
    pub reused_table: bool,
}

/// Tracks loaded batches, their tables and the active batch.
///
/// Identical data (same fingerprint) shares one table, so reloading a batch
/// never registers a second copy.
#[derive(Debug, Default)]
pub struct BatchManager {
    loaded: Vec<LoadedBatch>,
    tables_by_fingerprint: HashMap<BatchFingerprint, String>,
    active_batch_id: Option<String>,
    next_table: usize,
}

impl BatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a batch and makes it active.
    ///
    /// Returns the load record; `reused_table` tells the caller whether a
    /// table has to be registered.
    pub fn load(&mut self, batch: &Batch) -> LoadedBatch {
        let (table_name, reused_table) = match self.tables_by_fingerprint.get(batch.fingerprint()) {
            Some(table) => (table.clone(), true),
            None => {
                self.next_table += 1;
                let table = format!("batch_{}", self.next_table);
                self.tables_by_fingerprint
                    .insert(batch.fingerprint().clone(), table.clone());
                (table, false)
            }
        };

        let record = LoadedBatch {
            batch_id: batch.id().to_string(),
            table_name,
            fingerprint: batch.fingerprint().clone(),
            reused_table,
        };
        debug!(
            batch.id = %record.batch_id,
            table = %record.table_name,
            reused = record.reused_table,
            "Loaded batch"
        );

        self.loaded.retain(|b| b.batch_id != record.batch_id);
        self.loaded.push(record.clone());
        self.active_batch_id = Some(record.batch_id.clone());
        record
    }

    /// Ids in load order.
    pub fn loaded_batch_ids(&self) -> Vec<String> {
        self.loaded.iter().map(|b| b.batch_id.clone()).collect()
    }

    /// The active batch id.
    ///
    /// When none was set but exactly one batch is loaded, that batch is
    /// unambiguous and is used instead.
    pub fn active_batch_id(&self) -> Option<String> {
        if let Some(id) = &self.active_batch_id {
            return Some(id.clone());
        }
        match self.loaded.as_slice() {
            [only] => {
                debug!(batch.id = %only.batch_id, "Falling back to the only loaded batch");
                Some(only.batch_id.clone())
            }
            _ => None,
        }
    }

    pub fn set_active_batch(&mut self, batch_id: &str) -> Result<()> {
        if !self.loaded.iter().any(|b| b.batch_id == batch_id) {
            return Err(TermError::configuration(format!(
                "batch '{batch_id}' is not loaded"
            )));
        }
        self.active_batch_id = Some(batch_id.to_string());
        Ok(())
    }

    pub fn clear_active_batch(&mut self) {
        self.active_batch_id = None;
    }

    /// Table holding the given batch, or the active batch when `batch_id` is `None`.
    pub fn table_for(&self, batch_id: Option<&str>) -> Result<&str> {
        let batch_id = match batch_id {
            Some(id) => id.to_string(),
            None => self.active_batch_id().ok_or_else(|| {
                warn!(
                    loaded = self.loaded.len(),
                    "No batch named and no unambiguous active batch"
                );
                TermError::configuration(
                    "no batch_id given and no active batch is available",
                )
            })?,
        };
        self.loaded
            .iter()
            .find(|b| b.batch_id == batch_id)
            .map(|b| b.table_name.as_str())
            .ok_or_else(|| TermError::configuration(format!("batch '{batch_id}' is not loaded")))
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn record_batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = BatchFingerprint::of(&record_batch(vec![1, 2, 3])).unwrap();
        let b = BatchFingerprint::of(&record_batch(vec![1, 2, 3])).unwrap();
        let c = BatchFingerprint::of(&record_batch(vec![1, 2, 4])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_identical_data_shares_table() {
        let mut manager = BatchManager::new();
        let first = manager.load(&Batch::new("b1", record_batch(vec![1])).unwrap());
        let second = manager.load(&Batch::new("b2", record_batch(vec![1])).unwrap());
        assert!(!first.reused_table);
        assert!(second.reused_table);
        assert_eq!(first.table_name, second.table_name);
        assert_eq!(manager.loaded_batch_ids(), vec!["b1", "b2"]);
    }

    #[test]
    fn test_last_loaded_batch_is_active() {
        let mut manager = BatchManager::new();
        manager.load(&Batch::new("b1", record_batch(vec![1])).unwrap());
        manager.load(&Batch::new("b2", record_batch(vec![2])).unwrap());
        assert_eq!(manager.active_batch_id().as_deref(), Some("b2"));
        assert_eq!(manager.table_for(None).unwrap(), "batch_2");
        assert_eq!(manager.table_for(Some("b1")).unwrap(), "batch_1");
    }

    #[test]
    fn test_single_batch_fallback() {
        let mut manager = BatchManager::new();
        manager.load(&Batch::new("only", record_batch(vec![1])).unwrap());
        manager.clear_active_batch();
        assert_eq!(manager.active_batch_id().as_deref(), Some("only"));

        manager.load(&Batch::new("second", record_batch(vec![2])).unwrap());
        manager.clear_active_batch();
        assert_eq!(manager.active_batch_id(), None);
        assert!(manager.table_for(None).is_err());
    }

    #[test]
    fn test_unknown_batch() {
        let manager = BatchManager::new();
        assert!(matches!(
            manager.table_for(Some("missing")),
            Err(TermError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_batch_id_rejected() {
        assert!(Batch::new(" ", record_batch(vec![1])).is_err());
    }
}
