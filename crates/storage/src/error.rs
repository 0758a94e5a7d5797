use slashguard_types::{
    config::{ChainConfig, ConfigError},
    primitives::Epoch,
    proposal::BitfieldError,
    pubkey::ValidatorPubkey,
};

use crate::api::{self, Table};

/// Errors returned by [`crate::Store`] operations.
///
/// Any error from a write means nothing from that write was committed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The validator's proposal history partition was never bootstrapped.
    #[error("no proposal history partition for validator {0}")]
    PartitionNotFound(ValidatorPubkey),

    #[error("epoch {epoch} bitfield holds {found} slots but {expected} are configured")]
    CapacityMismatch {
        epoch: Epoch,
        found: usize,
        expected: usize,
    },

    #[error("write to epoch {epoch} would clear the proposal recorded at slot index {index}")]
    WouldClearProposal { epoch: Epoch, index: usize },

    #[error(transparent)]
    Bitfield(#[from] BitfieldError),

    #[error("corrupt {table:?} record: {reason}")]
    CorruptRecord { table: Table, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("database was created with {stored:?}, refusing to open it with {configured:?}")]
    ConfigMismatch {
        stored: ChainConfig,
        configured: ChainConfig,
    },

    /// The storage engine failed to read, stage or commit. Nothing was written.
    #[error("storage transaction failed: {0}")]
    Transaction(#[source] api::Error),
}

impl Error {
    pub(crate) fn corrupt(table: Table, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            table,
            reason: reason.into(),
        }
    }

    /// Map a decoding error for the record at `epoch`.
    pub(crate) fn from_bitfield(epoch: Epoch, err: BitfieldError) -> Self {
        match err {
            BitfieldError::CapacityMismatch { stored, configured } => Self::CapacityMismatch {
                epoch,
                found: stored,
                expected: configured,
            },
            BitfieldError::Malformed(reason) => Self::corrupt(
                Table::ProposalHistory,
                format!("epoch {epoch}: {reason}"),
            ),
            other => Self::Bitfield(other),
        }
    }
}

/// A failed pruning pass.
///
/// Pruning only bounds storage growth, so this never fails the write that
/// triggered it; it is logged and returned in [`crate::PruneReport`].
#[derive(Debug, thiserror::Error)]
#[error("failed to prune proposal history of validator {pubkey}: {reason}")]
pub struct PruneFailure {
    pub pubkey: ValidatorPubkey,
    pub reason: String,
}
