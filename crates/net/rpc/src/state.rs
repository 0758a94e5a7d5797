//! Read-only state query service.
//!
//! Returns the SSZ-encoded state saved for a given block root, or for the
//! canonical block at a given slot.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use slashguard_storage::Store;
use slashguard_types::{
    config::ChainConfig,
    primitives::{H256, Slot},
};

#[derive(Debug, thiserror::Error)]
pub enum StateQueryError {
    #[error("Need to specify either a block root or slot to request state")]
    MissingFilter,
    #[error("Cannot specify both a block root and a slot to request state")]
    AmbiguousFilter,
    #[error(
        "Cannot retrieve information about a slot in the future, current slot {current_slot}, requested slot {requested_slot}"
    )]
    FutureSlot {
        current_slot: Slot,
        requested_slot: Slot,
    },
    #[error("No block found at slot {0}")]
    BlockNotFound(Slot),
    #[error("No state found for block root {0}")]
    StateNotFound(H256),
    #[error(transparent)]
    Storage(#[from] slashguard_storage::Error),
}

/// Source of the current wall-clock slot.
pub trait SlotClock: Send + Sync {
    fn current_slot(&self) -> Slot;
}

/// Slot clock derived from the chain's genesis time.
pub struct SystemSlotClock {
    genesis_time: u64,
    seconds_per_slot: u64,
}

impl SystemSlotClock {
    pub fn new(genesis_time: u64, seconds_per_slot: u64) -> Self {
        Self {
            genesis_time,
            seconds_per_slot: seconds_per_slot.max(1),
        }
    }
}

impl SlotClock for SystemSlotClock {
    fn current_slot(&self) -> Slot {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::default())
            .as_secs();
        now.saturating_sub(self.genesis_time) / self.seconds_per_slot
    }
}

/// Which state to look up. Exactly one of the fields must be set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StateFilter {
    pub block_root: Option<H256>,
    pub slot: Option<Slot>,
}

impl StateFilter {
    pub fn by_root(block_root: H256) -> Self {
        Self {
            block_root: Some(block_root),
            slot: None,
        }
    }

    pub fn by_slot(slot: Slot) -> Self {
        Self {
            block_root: None,
            slot: Some(slot),
        }
    }
}

#[derive(Clone)]
pub struct StateQuery {
    store: Store,
    clock: Arc<dyn SlotClock>,
}

impl StateQuery {
    pub fn new(store: Store, clock: Arc<dyn SlotClock>) -> Self {
        Self { store, clock }
    }

    pub fn config(&self) -> &ChainConfig {
        self.store.config()
    }

    pub fn current_slot(&self) -> Slot {
        self.clock.current_slot()
    }

    /// Fails if the store cannot open a read snapshot.
    pub fn check_store(&self) -> Result<(), StateQueryError> {
        self.store.with_read_transaction(|_| Ok(()))?;
        Ok(())
    }

    /// Returns the encoded state exactly as it was saved.
    pub fn get_state(&self, filter: &StateFilter) -> Result<Vec<u8>, StateQueryError> {
        let block_root = match (filter.block_root, filter.slot) {
            (None, None) => return Err(StateQueryError::MissingFilter),
            (Some(_), Some(_)) => return Err(StateQueryError::AmbiguousFilter),
            (Some(root), None) => root,
            (None, Some(slot)) => {
                let current_slot = self.clock.current_slot();
                if slot > current_slot {
                    return Err(StateQueryError::FutureSlot {
                        current_slot,
                        requested_slot: slot,
                    });
                }
                self.store
                    .block_root_at_slot(slot)?
                    .ok_or(StateQueryError::BlockNotFound(slot))?
            }
        };

        self.store
            .get_state(&block_root)?
            .ok_or(StateQueryError::StateNotFound(block_root))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use slashguard_storage::backend::InMemoryBackend;
    use slashguard_types::{block::BlockHeader, config::ChainConfig};

    use super::*;

    pub(crate) struct FixedSlotClock(pub Slot);

    impl SlotClock for FixedSlotClock {
        fn current_slot(&self) -> Slot {
            self.0
        }
    }

    pub(crate) fn setup(current_slot: Slot) -> (StateQuery, H256, Vec<u8>) {
        let store = Store::open(Arc::new(InMemoryBackend::new()), ChainConfig::default()).unwrap();
        let header = BlockHeader {
            slot: 100,
            proposer_index: 0,
            parent_root: H256::ZERO,
            state_root: H256::repeat_byte(0x11),
            body_root: H256::ZERO,
        };
        let root = store.insert_block(&header).unwrap();
        let encoded_state = vec![0xde, 0xad, 0xbe, 0xef, 100];
        store.insert_state(root, encoded_state.clone()).unwrap();

        let query = StateQuery::new(store, Arc::new(FixedSlotClock(current_slot)));
        (query, root, encoded_state)
    }

    #[test]
    fn requires_a_filter() {
        let (query, _, _) = setup(100);
        let err = query.get_state(&StateFilter::default()).unwrap_err();
        assert!(matches!(err, StateQueryError::MissingFilter));
        assert!(
            err.to_string()
                .contains("Need to specify either a block root or slot")
        );
    }

    #[test]
    fn rejects_both_filters() {
        let (query, root, _) = setup(100);
        let filter = StateFilter {
            block_root: Some(root),
            slot: Some(100),
        };
        assert!(matches!(
            query.get_state(&filter),
            Err(StateQueryError::AmbiguousFilter)
        ));
    }

    #[test]
    fn rejects_future_slot() {
        let (query, _, _) = setup(100);
        let err = query.get_state(&StateFilter::by_slot(101)).unwrap_err();
        assert!(matches!(
            err,
            StateQueryError::FutureSlot {
                current_slot: 100,
                requested_slot: 101
            }
        ));
        assert!(
            err.to_string()
                .contains("Cannot retrieve information about a slot in the future")
        );
    }

    #[test]
    fn returns_saved_state_by_root_and_slot() {
        let (query, root, encoded_state) = setup(150);

        assert_eq!(query.get_state(&StateFilter::by_root(root)).unwrap(), encoded_state);
        assert_eq!(query.get_state(&StateFilter::by_slot(100)).unwrap(), encoded_state);
    }

    #[test]
    fn unknown_slot_or_root() {
        let (query, _, _) = setup(150);

        assert!(matches!(
            query.get_state(&StateFilter::by_slot(99)),
            Err(StateQueryError::BlockNotFound(99))
        ));
        assert!(matches!(
            query.get_state(&StateFilter::by_root(H256::repeat_byte(0xff))),
            Err(StateQueryError::StateNotFound(_))
        ));
    }

    #[test]
    fn system_clock_counts_from_genesis() {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let clock = SystemSlotClock::new(now - 120, 12);
        let slot = clock.current_slot();
        assert!((10..=11).contains(&slot));

        let before_genesis = SystemSlotClock::new(now + 1000, 12);
        assert_eq!(before_genesis.current_slot(), 0);
    }
}
