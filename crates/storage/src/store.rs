use std::sync::Arc;

use crate::{
    api::{StorageBackend, StorageReadView, StorageWriteBatch, Table},
    error::Error,
};

use slashguard_types::{
    ShortRoot,
    block::BlockHeader,
    config::ChainConfig,
    primitives::{H256, Slot, TreeHash},
};
use ssz::{Decode, Encode};
use tracing::{debug, info};

// ============ Metadata Keys ============

/// Key for the chain config the database was created with. Its value has type
/// [`ChainConfig`] and it's SSZ-encoded.
const KEY_CONFIG: &[u8] = b"config";

/// Durable store of the validator client.
///
/// Holds the proposal history used for slashing protection, plus the block
/// and state index served by the state query API. Cloning is cheap and every
/// clone shares the same backend.
#[derive(Clone)]
pub struct Store {
    /// Storage backend for all store data.
    backend: Arc<dyn StorageBackend>,
    config: ChainConfig,
}

impl Store {
    /// Open a store over `backend` with the given chain config.
    ///
    /// The first open records the config. Later opens must use the same one,
    /// since `slots_per_epoch` determines how stored bitfields are read.
    pub fn open(backend: Arc<dyn StorageBackend>, config: ChainConfig) -> Result<Self, Error> {
        config.validate()?;
        let store = Self { backend, config };

        let created = store.with_write_transaction(|tx| {
            match tx.get(Table::Metadata, KEY_CONFIG).map_err(Error::Transaction)? {
                Some(bytes) => {
                    let stored = ChainConfig::from_ssz_bytes(&bytes).map_err(|err| {
                        Error::corrupt(Table::Metadata, format!("config: {err:?}"))
                    })?;
                    if stored != config {
                        return Err(Error::ConfigMismatch {
                            stored,
                            configured: config,
                        });
                    }
                    Ok(false)
                }
                None => {
                    tx.put_batch(
                        Table::Metadata,
                        vec![(KEY_CONFIG.to_vec(), config.as_ssz_bytes())],
                    )
                    .map_err(Error::Transaction)?;
                    Ok(true)
                }
            }
        })?;

        info!(
            slots_per_epoch = config.slots_per_epoch,
            weak_subjectivity_period = config.weak_subjectivity_period,
            created,
            "Opened store"
        );
        Ok(store)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    // ============ Transactions ============

    /// Run `f` against a consistent snapshot of the store.
    ///
    /// Writes committed while `f` runs are not visible to it.
    pub fn with_read_transaction<T>(
        &self,
        f: impl FnOnce(&dyn StorageReadView) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let view = self.backend.begin_read().map_err(Error::Transaction)?;
        f(view.as_ref())
    }

    /// Run `f` in a write transaction and commit what it staged.
    ///
    /// Write transactions are serialized. If `f` fails the batch is dropped
    /// and nothing it staged is written. Transactions do not nest: calling
    /// this again from inside `f` deadlocks.
    pub fn with_write_transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn StorageWriteBatch) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut batch = self.backend.begin_write().map_err(Error::Transaction)?;
        let output = f(batch.as_mut())?;
        batch.commit().map_err(Error::Transaction)?;
        Ok(output)
    }

    // ============ Blocks ============

    /// Index a canonical block header, returning its root.
    ///
    /// Replaces whichever block was previously canonical at the same slot.
    pub fn insert_block(&self, header: &BlockHeader) -> Result<H256, Error> {
        let root = header.tree_hash_root();
        self.with_write_transaction(|tx| {
            tx.put_batch(
                Table::BlockHeaders,
                vec![(root.as_ssz_bytes(), header.as_ssz_bytes())],
            )
            .map_err(Error::Transaction)?;
            tx.put_batch(
                Table::BlockRoots,
                vec![(header.slot.to_be_bytes().to_vec(), root.as_ssz_bytes())],
            )
            .map_err(Error::Transaction)
        })?;
        debug!(slot = header.slot, root = %ShortRoot(&root.0), "Indexed block");
        Ok(root)
    }

    pub fn get_block_header(&self, root: &H256) -> Result<Option<BlockHeader>, Error> {
        self.with_read_transaction(|view| {
            view.get(Table::BlockHeaders, &root.as_ssz_bytes())
                .map_err(Error::Transaction)?
                .map(|bytes| {
                    BlockHeader::from_ssz_bytes(&bytes)
                        .map_err(|err| Error::corrupt(Table::BlockHeaders, format!("{err:?}")))
                })
                .transpose()
        })
    }

    /// Root of the canonical block at `slot`, if one was indexed.
    pub fn block_root_at_slot(&self, slot: Slot) -> Result<Option<H256>, Error> {
        self.with_read_transaction(|view| {
            view.get(Table::BlockRoots, &slot.to_be_bytes())
                .map_err(Error::Transaction)?
                .map(|bytes| {
                    H256::from_ssz_bytes(&bytes)
                        .map_err(|err| Error::corrupt(Table::BlockRoots, format!("{err:?}")))
                })
                .transpose()
        })
    }

    // ============ States ============

    /// Store an already SSZ-encoded state under its block root.
    ///
    /// The bytes are kept verbatim so queries return exactly what was saved.
    pub fn insert_state(&self, block_root: H256, encoded_state: Vec<u8>) -> Result<(), Error> {
        self.with_write_transaction(|tx| {
            tx.put_batch(
                Table::States,
                vec![(block_root.as_ssz_bytes(), encoded_state)],
            )
            .map_err(Error::Transaction)
        })
    }

    pub fn get_state(&self, block_root: &H256) -> Result<Option<Vec<u8>>, Error> {
        self.with_read_transaction(|view| {
            view.get(Table::States, &block_root.as_ssz_bytes())
                .map_err(Error::Transaction)
        })
    }
}
