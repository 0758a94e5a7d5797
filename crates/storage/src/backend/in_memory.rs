use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::api::{Error, PrefixResult, StorageBackend, StorageReadView, StorageWriteBatch, Table};

type TableData = BTreeMap<Vec<u8>, Vec<u8>>;
type StorageData = HashMap<Table, TableData>;

/// A staged write: `None` deletes the key.
type PendingOp = (Table, Vec<u8>, Option<Vec<u8>>);

/// In-memory storage backend.
///
/// Committed data lives behind an `Arc` that is swapped on every commit, so a
/// read view is just a clone of the current `Arc` and never blocks writers.
/// Suitable for testing and ephemeral nodes. Data is lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Arc<StorageData>>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Result<Snapshot, Error> {
        let guard = self.data.read().map_err(|e| e.to_string())?;
        Ok(Snapshot(Arc::clone(&guard)))
    }
}

impl StorageBackend for InMemoryBackend {
    fn begin_read(&self) -> Result<Box<dyn StorageReadView + '_>, Error> {
        Ok(Box::new(self.snapshot()?))
    }

    fn begin_write(&self) -> Result<Box<dyn StorageWriteBatch + '_>, Error> {
        let writer = self.writer.lock().map_err(|e| e.to_string())?;
        // Taken after acquiring the writer lock, so nothing can commit under us.
        let snapshot = self.snapshot()?;
        Ok(Box::new(InMemoryWriteBatch {
            _writer: writer,
            data: &self.data,
            snapshot,
            pending: Vec::new(),
        }))
    }
}

/// Immutable view of the committed data at some point in time.
struct Snapshot(Arc<StorageData>);

impl StorageReadView for Snapshot {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.0.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn prefix_iterator(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = PrefixResult> + '_>, Error> {
        let table_data = self.0.get(&table);
        let prefix_owned = prefix.to_vec();

        let iter: Box<dyn Iterator<Item = PrefixResult> + '_> = match table_data {
            Some(data) => Box::new(
                data.range(prefix.to_vec()..)
                    .take_while(move |(k, _)| k.starts_with(&prefix_owned))
                    .map(|(k, v)| Ok((k.clone().into_boxed_slice(), v.clone().into_boxed_slice()))),
            ),
            None => Box::new(std::iter::empty()),
        };

        Ok(iter)
    }
}

/// Write batch that accumulates changes before committing.
struct InMemoryWriteBatch<'a> {
    _writer: MutexGuard<'a, ()>,
    data: &'a RwLock<Arc<StorageData>>,
    snapshot: Snapshot,
    pending: Vec<PendingOp>,
}

impl StorageReadView for InMemoryWriteBatch<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.snapshot.get(table, key)
    }

    fn prefix_iterator(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = PrefixResult> + '_>, Error> {
        self.snapshot.prefix_iterator(table, prefix)
    }
}

impl StorageWriteBatch for InMemoryWriteBatch<'_> {
    fn put_batch(&mut self, table: Table, batch: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), Error> {
        self.pending
            .extend(batch.into_iter().map(|(k, v)| (table, k, Some(v))));
        Ok(())
    }

    fn delete_batch(&mut self, table: Table, keys: Vec<Vec<u8>>) -> Result<(), Error> {
        self.pending
            .extend(keys.into_iter().map(|k| (table, k, None)));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), Error> {
        let InMemoryWriteBatch {
            _writer,
            data,
            snapshot,
            pending,
        } = *self;
        // Drop our own reference first so `make_mut` can avoid a copy when no
        // reader holds the old snapshot.
        drop(snapshot);

        let mut guard = data.write().map_err(|e| e.to_string())?;
        let committed = Arc::make_mut(&mut *guard);

        for (table, key, value) in pending {
            match value {
                Some(value) => {
                    committed.entry(table).or_default().insert(key, value);
                }
                None => {
                    if let Some(table_data) = committed.get_mut(&table) {
                        table_data.remove(&key);
                    }
                }
            }
        }

        Ok(())
    }
}
