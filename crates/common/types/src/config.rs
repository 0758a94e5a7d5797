use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::typenum::Unsigned;

use crate::primitives::{Epoch, MaxSlotsPerEpoch, Slot};

/// Slots per epoch on mainnet.
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 32;
/// Weak subjectivity period used for proposal history retention, in epochs.
pub const DEFAULT_WEAK_SUBJECTIVITY_PERIOD: u64 = 54_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("slots per epoch must be between 1 and {max}, got {got}")]
    InvalidSlotsPerEpoch { got: u64, max: u64 },
    #[error("weak subjectivity period must be at least one epoch")]
    ZeroWeakSubjectivityPeriod,
}

/// Chain parameters the proposal history store depends on.
///
/// Persisted alongside the data, since both values change how stored records
/// are read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ChainConfig {
    /// Number of slots in an epoch. Sets the capacity of every proposal bitfield.
    pub slots_per_epoch: u64,
    /// Number of epochs a proposal record is kept after a newer epoch is written.
    pub weak_subjectivity_period: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH,
            weak_subjectivity_period: DEFAULT_WEAK_SUBJECTIVITY_PERIOD,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = MaxSlotsPerEpoch::to_u64();
        if self.slots_per_epoch == 0 || self.slots_per_epoch > max {
            return Err(ConfigError::InvalidSlotsPerEpoch {
                got: self.slots_per_epoch,
                max,
            });
        }
        // A zero period would prune the record that was just written.
        if self.weak_subjectivity_period == 0 {
            return Err(ConfigError::ZeroWeakSubjectivityPeriod);
        }
        Ok(())
    }

    /// Epoch containing the given slot.
    pub fn epoch_of(&self, slot: Slot) -> Epoch {
        slot / self.slots_per_epoch
    }

    /// Position of the slot inside its epoch's bitfield.
    pub fn slot_index(&self, slot: Slot) -> usize {
        (slot % self.slots_per_epoch) as usize
    }

    pub fn slots_per_epoch_usize(&self) -> usize {
        self.slots_per_epoch as usize
    }

    /// Whether a record for `epoch` may be discarded once `newest` has been written.
    pub fn is_expired(&self, epoch: Epoch, newest: Epoch) -> bool {
        epoch.saturating_add(self.weak_subjectivity_period) <= newest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ChainConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_and_oversized_epochs() {
        let zero = ChainConfig {
            slots_per_epoch: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidSlotsPerEpoch { got: 0, .. })
        ));

        let huge = ChainConfig {
            slots_per_epoch: 8193,
            ..Default::default()
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn rejects_zero_retention() {
        let config = ChainConfig {
            weak_subjectivity_period: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroWeakSubjectivityPeriod)
        );
    }

    #[test]
    fn slot_arithmetic() {
        let config = ChainConfig {
            slots_per_epoch: 32,
            weak_subjectivity_period: 4,
        };
        assert_eq!(config.epoch_of(0), 0);
        assert_eq!(config.epoch_of(31), 0);
        assert_eq!(config.epoch_of(32), 1);
        assert_eq!(config.slot_index(325), 5);
    }

    #[test]
    fn expiry_boundary() {
        let config = ChainConfig {
            slots_per_epoch: 32,
            weak_subjectivity_period: 4,
        };
        assert!(config.is_expired(6, 10));
        assert!(!config.is_expired(7, 10));
        assert!(!config.is_expired(u64::MAX - 1, u64::MAX - 1));
    }

    #[test]
    fn deserializes_from_json() {
        let config: ChainConfig =
            serde_json::from_str(r#"{"slots_per_epoch": 8, "weak_subjectivity_period": 2}"#)
                .unwrap();
        assert_eq!(config.slots_per_epoch, 8);
        assert_eq!(config.weak_subjectivity_period, 2);
    }
}
