//! Per-epoch proposal bitfield.
//!
//! Each stored record answers "did this validator propose in slot `i` of the
//! epoch" for every slot of one epoch. Records are SSZ bitlists: the encoding
//! carries a delimiter bit right after the last significant bit, so a record
//! written under a different `slots_per_epoch` decodes to a different length
//! instead of being silently truncated or zero-extended.

use std::fmt;

use ssz::{Decode, Encode};
use ssz_types::typenum::Unsigned;

use crate::primitives::{BitList, MaxSlotsPerEpoch};

pub type ProposalBits = BitList<MaxSlotsPerEpoch>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BitfieldError {
    #[error("bitfield holds {stored} slots but {configured} are configured")]
    CapacityMismatch { stored: usize, configured: usize },
    #[error("slot index {index} is out of bounds for a bitfield of {capacity} slots")]
    IndexOutOfBounds { index: usize, capacity: usize },
    #[error("bitfield capacity must be between 1 and {max}, got {got}", max = MaxSlotsPerEpoch::to_usize())]
    InvalidCapacity { got: usize },
    #[error("malformed bitfield encoding: {0}")]
    Malformed(String),
}

/// Slots of one epoch a validator has already proposed for.
#[derive(Clone, PartialEq, Eq)]
pub struct ProposalBitfield {
    bits: ProposalBits,
}

impl ProposalBitfield {
    /// An all-zero bitfield covering `slots_per_epoch` slots.
    pub fn empty(slots_per_epoch: usize) -> Result<Self, BitfieldError> {
        if slots_per_epoch == 0 {
            return Err(BitfieldError::InvalidCapacity { got: 0 });
        }
        let bits = ProposalBits::with_capacity(slots_per_epoch)
            .map_err(|_| BitfieldError::InvalidCapacity {
                got: slots_per_epoch,
            })?;
        Ok(Self { bits })
    }

    /// Decode a stored record.
    ///
    /// A missing or empty record means nothing was proposed in that epoch and
    /// yields [`ProposalBitfield::empty`]. Otherwise the capacity is taken from
    /// the encoding itself and must equal `configured`.
    pub fn decode(raw: Option<&[u8]>, configured: usize) -> Result<Self, BitfieldError> {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Self::empty(configured),
        };
        let bits = ProposalBits::from_ssz_bytes(raw)
            .map_err(|err| BitfieldError::Malformed(format!("{err:?}")))?;
        if bits.len() != configured {
            return Err(BitfieldError::CapacityMismatch {
                stored: bits.len(),
                configured,
            });
        }
        Ok(Self { bits })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.bits.as_ssz_bytes()
    }

    /// Number of slots covered by this bitfield.
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    /// True if no slot in the epoch has a recorded proposal.
    pub fn is_zero(&self) -> bool {
        self.bits.is_zero()
    }

    pub fn get(&self, index: usize) -> Result<bool, BitfieldError> {
        self.bits.get(index).map_err(|_| self.out_of_bounds(index))
    }

    /// Mark the slot at `index` as proposed.
    ///
    /// Bits are never cleared; a recorded proposal only disappears when the
    /// whole epoch record is pruned.
    pub fn set(&mut self, index: usize) -> Result<(), BitfieldError> {
        if index >= self.capacity() {
            return Err(self.out_of_bounds(index));
        }
        self.bits
            .set(index, true)
            .map_err(|_| self.out_of_bounds(index))
    }

    /// Indices of all slots with a recorded proposal, in ascending order.
    pub fn proposed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(index, set)| set.then_some(index))
    }

    /// First slot recorded here that `next` does not record, if any.
    ///
    /// Used to refuse overwrites that would forget a proposal.
    pub fn first_cleared_by(&self, next: &ProposalBitfield) -> Option<usize> {
        self.proposed_indices()
            .find(|&index| !next.bits.get(index).unwrap_or(false))
    }

    fn out_of_bounds(&self, index: usize) -> BitfieldError {
        BitfieldError::IndexOutOfBounds {
            index,
            capacity: self.capacity(),
        }
    }
}

impl fmt::Debug for ProposalBitfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProposalBitfield")
            .field("capacity", &self.capacity())
            .field("proposed", &self.proposed_indices().collect::<Vec<_>>())
            .finish()
    }
}
