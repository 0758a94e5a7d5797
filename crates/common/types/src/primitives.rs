use ssz_types::typenum::U8192;
use tree_hash::Hash256;

// Re-export SSZ traits to avoid users having to depend on these directly
pub use ssz::{Decode, DecodeError, Encode};
pub use tree_hash::TreeHash;

pub use ssz_types::BitList;
pub type H256 = Hash256;

pub type Slot = u64;
pub type Epoch = u64;

/// Upper bound on the number of slots a single epoch can hold.
///
/// Bounds the capacity of a stored proposal bitfield.
pub type MaxSlotsPerEpoch = U8192;
