//! RocksDB storage backend.

use crate::api::{
    ALL_TABLES, Error, PrefixResult, StorageBackend, StorageReadView, StorageWriteBatch, Table,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, SnapshotWithThreadMode, WriteBatch, WriteOptions,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

type DB = DBWithThreadMode<MultiThreaded>;

/// Returns the column family name for a table.
fn cf_name(table: Table) -> &'static str {
    match table {
        Table::ProposalPartitions => "proposal_partitions",
        Table::ProposalHistory => "proposal_history",
        Table::BlockRoots => "block_roots",
        Table::BlockHeaders => "block_headers",
        Table::States => "states",
        Table::Metadata => "metadata",
    }
}

fn cf_handle(db: &DB, table: Table) -> Result<Arc<BoundColumnFamily<'_>>, Error> {
    db.cf_handle(cf_name(table))
        .ok_or_else(|| format!("Column family {} not found", cf_name(table)).into())
}

/// Iterate forward from `prefix`, stopping at the first key outside of it.
fn take_prefix<'a>(
    iter: impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>> + 'a,
    prefix: &[u8],
) -> Box<dyn Iterator<Item = PrefixResult> + 'a> {
    let prefix_owned = prefix.to_vec();
    Box::new(
        iter.map(|result| result.map_err(|e| Box::new(e) as Error))
            .take_while(move |result| match result {
                Ok((key, _)) => key.starts_with(&prefix_owned),
                Err(_) => true, // propagate errors
            }),
    )
}

/// RocksDB storage backend.
///
/// RocksDB holds a lock file in the database directory, so a second process
/// (or a second `open` in this one) pointed at the same path fails to open.
#[derive(Clone)]
pub struct RocksDBBackend {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDBBackend {
    /// Open a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = ALL_TABLES
            .iter()
            .map(|t| ColumnFamilyDescriptor::new(cf_name(*t), Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }
}

impl StorageBackend for RocksDBBackend {
    fn begin_read(&self) -> Result<Box<dyn StorageReadView + '_>, Error> {
        Ok(Box::new(RocksDBReadView {
            db: &self.db,
            snapshot: self.db.snapshot(),
        }))
    }

    fn begin_write(&self) -> Result<Box<dyn StorageWriteBatch + '_>, Error> {
        let writer = self.writer.lock().map_err(|e| e.to_string())?;
        Ok(Box::new(RocksDBWriteBatch {
            _writer: writer,
            db: &self.db,
            batch: WriteBatch::default(),
        }))
    }
}

/// Read-only view over a RocksDB snapshot.
struct RocksDBReadView<'a> {
    db: &'a DB,
    snapshot: SnapshotWithThreadMode<'a, DB>,
}

impl StorageReadView for RocksDBReadView<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let cf = cf_handle(self.db, table)?;
        Ok(self.snapshot.get_cf(&cf, key)?)
    }

    fn prefix_iterator(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = PrefixResult> + '_>, Error> {
        let cf = cf_handle(self.db, table)?;
        let iter = self
            .snapshot
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        Ok(take_prefix(iter, prefix))
    }
}

/// Write batch for RocksDB.
///
/// Holds the backend's writer lock, so reading straight from the database
/// sees exactly the committed state the batch will be applied on top of.
struct RocksDBWriteBatch<'a> {
    _writer: MutexGuard<'a, ()>,
    db: &'a DB,
    batch: WriteBatch,
}

impl StorageReadView for RocksDBWriteBatch<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let cf = cf_handle(self.db, table)?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    fn prefix_iterator(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = PrefixResult> + '_>, Error> {
        let cf = cf_handle(self.db, table)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        Ok(take_prefix(iter, prefix))
    }
}

impl StorageWriteBatch for RocksDBWriteBatch<'_> {
    fn put_batch(&mut self, table: Table, batch: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), Error> {
        let cf = cf_handle(self.db, table)?;

        for (key, value) in batch {
            self.batch.put_cf(&cf, key, value);
        }
        Ok(())
    }

    fn delete_batch(&mut self, table: Table, keys: Vec<Vec<u8>>) -> Result<(), Error> {
        let cf = cf_handle(self.db, table)?;

        for key in keys {
            self.batch.delete_cf(&cf, key);
        }
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), Error> {
        // A proposal is only recorded once it is on disk.
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);

        self.db.write_opt(self.batch, &write_opts)?;
        Ok(())
    }
}
