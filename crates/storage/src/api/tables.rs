/// Tables in the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Proposal history partitions: ValidatorPubkey -> ()
    ///
    /// A validator's history can only be read or written once its key is
    /// present here. Entries are created by bootstrapping, never by writes.
    ProposalPartitions,
    /// Proposal history: (pubkey || epoch big-endian) -> SSZ bitlist
    ///
    /// Big-endian epochs keep each validator's records in ascending epoch
    /// order under the pubkey prefix, which pruning relies on.
    ProposalHistory,
    /// Canonical block roots: slot big-endian -> H256
    BlockRoots,
    /// Block header storage: H256 -> BlockHeader
    BlockHeaders,
    /// State storage: H256 -> SSZ-encoded state, stored verbatim
    States,
    /// Metadata: string keys -> various scalar values
    Metadata,
}

/// All table variants.
#[cfg(feature = "rocksdb")]
pub const ALL_TABLES: [Table; 6] = [
    Table::ProposalPartitions,
    Table::ProposalHistory,
    Table::BlockRoots,
    Table::BlockHeaders,
    Table::States,
    Table::Metadata,
];
