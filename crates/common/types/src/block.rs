use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::primitives::{H256, Slot};

/// Header of a canonical block, as indexed by the state query service.
///
/// The block root is the tree hash root of this header.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, TreeHash)]
pub struct BlockHeader {
    pub slot: Slot,
    pub proposer_index: u64,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz::{Decode, Encode};
    use tree_hash::TreeHash;

    fn header(slot: Slot) -> BlockHeader {
        BlockHeader {
            slot,
            proposer_index: 7,
            parent_root: H256::repeat_byte(1),
            state_root: H256::repeat_byte(2),
            body_root: H256::repeat_byte(3),
        }
    }

    #[test]
    fn root_depends_on_slot() {
        assert_ne!(header(1).tree_hash_root(), header(2).tree_hash_root());
        assert_eq!(header(1).tree_hash_root(), header(1).tree_hash_root());
    }

    #[test]
    fn ssz_encoding_is_fixed_size() {
        let bytes = header(100).as_ssz_bytes();
        assert_eq!(bytes.len(), 8 + 8 + 32 * 3);
        assert_eq!(BlockHeader::from_ssz_bytes(&bytes).unwrap(), header(100));
    }
}
