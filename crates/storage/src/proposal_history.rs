//! Proposal history used for slashing protection.
//!
//! For every bootstrapped validator the store keeps one [`ProposalBitfield`]
//! per epoch, recording the slots the validator already signed a block for.
//! The signing workflow checks [`Store::has_proposed`] before signing and calls
//! [`Store::record_proposal`] once the signature exists.
//!
//! Every write also prunes the validator's epochs that fell out of the weak
//! subjectivity period, in the same transaction.

use slashguard_types::{
    primitives::{Epoch, Slot},
    proposal::ProposalBitfield,
    pubkey::{PUBKEY_LENGTH, ValidatorPubkey},
};
use tracing::{debug, info, warn};

use crate::{
    Store,
    api::{StorageReadView, StorageWriteBatch, Table},
    error::{Error, PruneFailure},
    metrics,
};

/// Outcome of the pruning pass run by a history write.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Epochs deleted by this write, in ascending order.
    pub pruned_epochs: Vec<Epoch>,
    /// Set when the pruning pass could not complete. The write itself was
    /// still committed.
    pub failure: Option<PruneFailure>,
}

// ============ Key Encoding Helpers ============

/// Encode a history key.
/// Layout: pubkey (48 bytes) || epoch (8 bytes big-endian)
fn history_key(pubkey: &ValidatorPubkey, epoch: Epoch) -> Vec<u8> {
    let mut key = Vec::with_capacity(PUBKEY_LENGTH + 8);
    key.extend_from_slice(pubkey.as_bytes());
    key.extend_from_slice(&epoch.to_be_bytes());
    key
}

/// Decode the epoch from a history key.
fn decode_epoch(key: &[u8]) -> Option<Epoch> {
    let bytes = key.get(PUBKEY_LENGTH..)?.try_into().ok()?;
    Some(Epoch::from_be_bytes(bytes))
}

// ============ Partition Helpers ============

fn ensure_partition<V: StorageReadView + ?Sized>(
    view: &V,
    pubkey: &ValidatorPubkey,
) -> Result<(), Error> {
    view.get(Table::ProposalPartitions, pubkey.as_bytes())
        .map_err(Error::Transaction)?
        .map(|_| ())
        .ok_or(Error::PartitionNotFound(*pubkey))
}

fn read_record<V: StorageReadView + ?Sized>(
    view: &V,
    pubkey: &ValidatorPubkey,
    epoch: Epoch,
    slots_per_epoch: usize,
) -> Result<ProposalBitfield, Error> {
    let raw = view
        .get(Table::ProposalHistory, &history_key(pubkey, epoch))
        .map_err(Error::Transaction)?;
    ProposalBitfield::decode(raw.as_deref(), slots_per_epoch)
        .map_err(|err| Error::from_bitfield(epoch, err))
}

impl Store {
    // ============ Partitions ============

    /// Create the history partition for `pubkey` if it does not exist yet.
    pub fn bootstrap_partition(&self, pubkey: &ValidatorPubkey) -> Result<bool, Error> {
        self.bootstrap_partitions(std::slice::from_ref(pubkey))
            .map(|created| created == 1)
    }

    /// Create history partitions for every key that does not have one yet,
    /// all in one transaction. Returns how many were created.
    ///
    /// This is the only way a partition comes into existence: reading or
    /// writing history for an unknown key fails with
    /// [`Error::PartitionNotFound`].
    pub fn bootstrap_partitions(&self, pubkeys: &[ValidatorPubkey]) -> Result<usize, Error> {
        let created = self.with_write_transaction(|tx| {
            let mut missing: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
            for pubkey in pubkeys {
                let key = pubkey.as_bytes().to_vec();
                let exists = tx
                    .get(Table::ProposalPartitions, &key)
                    .map_err(Error::Transaction)?
                    .is_some();
                if !exists && !missing.iter().any(|(k, _)| *k == key) {
                    missing.push((key, Vec::new()));
                }
            }
            let created = missing.len();
            if created > 0 {
                tx.put_batch(Table::ProposalPartitions, missing)
                    .map_err(Error::Transaction)?;
            }
            Ok(created)
        })?;

        info!(
            requested = pubkeys.len(),
            created, "Bootstrapped proposal history partitions"
        );
        Ok(created)
    }

    pub fn has_partition(&self, pubkey: &ValidatorPubkey) -> Result<bool, Error> {
        self.with_read_transaction(|view| match ensure_partition(view, pubkey) {
            Ok(()) => Ok(true),
            Err(Error::PartitionNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        })
    }

    // ============ History Table ============

    /// Proposals recorded for `pubkey` in `epoch`.
    ///
    /// Returns an all-zero bitfield when nothing was recorded for that epoch.
    pub fn read_epoch(
        &self,
        pubkey: &ValidatorPubkey,
        epoch: Epoch,
    ) -> Result<ProposalBitfield, Error> {
        let slots_per_epoch = self.config().slots_per_epoch_usize();
        self.with_read_transaction(|view| {
            ensure_partition(view, pubkey)?;
            read_record(view, pubkey, epoch, slots_per_epoch)
        })
    }

    /// Replace the record for `pubkey` in `epoch` with `bitfield`, then prune.
    ///
    /// The new bitfield must keep every proposal already recorded for the
    /// epoch; otherwise the write is refused with
    /// [`Error::WouldClearProposal`].
    pub fn write_epoch(
        &self,
        pubkey: &ValidatorPubkey,
        epoch: Epoch,
        bitfield: &ProposalBitfield,
    ) -> Result<PruneReport, Error> {
        let expected = self.config().slots_per_epoch_usize();
        if bitfield.capacity() != expected {
            return Err(Error::CapacityMismatch {
                epoch,
                found: bitfield.capacity(),
                expected,
            });
        }

        let report = self.with_history_write(pubkey, epoch, |existing| {
            if let Some(index) = existing.first_cleared_by(bitfield) {
                return Err(Error::WouldClearProposal { epoch, index });
            }
            Ok(Some(bitfield.clone()))
        })?;
        Ok(report.unwrap_or_default())
    }

    /// All records of `pubkey`, in ascending epoch order.
    pub fn proposal_history(
        &self,
        pubkey: &ValidatorPubkey,
    ) -> Result<Vec<(Epoch, ProposalBitfield)>, Error> {
        let slots_per_epoch = self.config().slots_per_epoch_usize();
        self.with_read_transaction(|view| {
            ensure_partition(view, pubkey)?;
            view.prefix_iterator(Table::ProposalHistory, pubkey.as_bytes())
                .map_err(Error::Transaction)?
                .map(|entry| {
                    let (key, value) = entry.map_err(Error::Transaction)?;
                    let epoch = decode_epoch(&key).ok_or_else(|| {
                        Error::corrupt(Table::ProposalHistory, "malformed history key")
                    })?;
                    let bitfield = ProposalBitfield::decode(Some(&value), slots_per_epoch)
                        .map_err(|err| Error::from_bitfield(epoch, err))?;
                    Ok((epoch, bitfield))
                })
                .collect()
        })
    }

    // ============ Signing Workflow ============

    /// Whether `pubkey` already signed a block for `slot`.
    pub fn has_proposed(&self, pubkey: &ValidatorPubkey, slot: Slot) -> Result<bool, Error> {
        let config = self.config();
        let bitfield = self.read_epoch(pubkey, config.epoch_of(slot))?;
        Ok(bitfield.get(config.slot_index(slot))?)
    }

    /// Record that `pubkey` signed a block for `slot`.
    ///
    /// Reads, updates and writes the epoch's bitfield in a single write
    /// transaction. Recording an already recorded slot changes nothing.
    pub fn record_proposal(
        &self,
        pubkey: &ValidatorPubkey,
        slot: Slot,
    ) -> Result<PruneReport, Error> {
        let config = self.config();
        let epoch = config.epoch_of(slot);
        let index = config.slot_index(slot);

        let written = self.with_history_write(pubkey, epoch, |existing| {
            if existing.get(index)? {
                return Ok(None);
            }
            let mut updated = existing.clone();
            updated.set(index)?;
            Ok(Some(updated))
        })?;

        let Some(report) = written else {
            debug!(%pubkey, slot, "Block proposal already recorded");
            return Ok(PruneReport::default());
        };
        metrics::inc_proposals_recorded();
        debug!(%pubkey, slot, epoch, "Recorded block proposal");
        Ok(report)
    }

    /// Shared read-modify-write of one epoch record.
    ///
    /// `update` gets the current record and returns the one to store, or
    /// `None` to leave the partition untouched, in which case nothing is
    /// written or pruned and this returns `None` as well.
    fn with_history_write(
        &self,
        pubkey: &ValidatorPubkey,
        epoch: Epoch,
        update: impl FnOnce(&ProposalBitfield) -> Result<Option<ProposalBitfield>, Error>,
    ) -> Result<Option<PruneReport>, Error> {
        let _timing = metrics::time_history_write();
        let config = *self.config();

        let report = self.with_write_transaction(|tx| {
            ensure_partition(&*tx, pubkey)?;
            let existing = read_record(&*tx, pubkey, epoch, config.slots_per_epoch_usize())?;
            let Some(updated) = update(&existing)? else {
                return Ok(None);
            };

            tx.put_batch(
                Table::ProposalHistory,
                vec![(history_key(pubkey, epoch), updated.encode())],
            )
            .map_err(Error::Transaction)?;

            prune(tx, pubkey, epoch, |old| config.is_expired(old, epoch)).map(Some)
        })?;

        let Some(report) = report else {
            return Ok(None);
        };
        if let Some(failure) = &report.failure {
            metrics::inc_prune_failures();
            warn!(%failure, epoch, "Proposal history pruning failed, write kept");
        }
        if !report.pruned_epochs.is_empty() {
            metrics::inc_pruned_epochs(report.pruned_epochs.len());
            debug!(
                %pubkey,
                newest_epoch = epoch,
                pruned = report.pruned_epochs.len(),
                "Pruned proposal history"
            );
        }
        Ok(Some(report))
    }
}

// ============ Retention ============

/// Stage deletion of the partition's expired records, oldest first.
///
/// Stops at the first record that is not expired: expiry is monotonic in the
/// epoch, and keys are iterated in ascending epoch order, so no later record
/// can be expired either. Failing to scan is reported in the returned
/// [`PruneReport`] and nothing is deleted. Failing to stage the deletions is
/// returned as an error, aborting the whole transaction.
fn prune(
    tx: &mut dyn StorageWriteBatch,
    pubkey: &ValidatorPubkey,
    newest_epoch: Epoch,
    is_expired: impl Fn(Epoch) -> bool,
) -> Result<PruneReport, Error> {
    let (expired, failure) = match scan_expired(&*tx, pubkey, is_expired) {
        Ok(expired) => (expired, None),
        Err(reason) => (Vec::new(), Some(PruneFailure {
            pubkey: *pubkey,
            reason,
        })),
    };

    if !expired.is_empty() {
        let keys = expired
            .iter()
            .map(|&epoch| history_key(pubkey, epoch))
            .collect();
        tx.delete_batch(Table::ProposalHistory, keys)
            .map_err(Error::Transaction)?;
    }

    debug_assert!(expired.iter().all(|&epoch| epoch < newest_epoch));
    Ok(PruneReport {
        pruned_epochs: expired,
        failure,
    })
}

fn scan_expired(
    view: &dyn StorageWriteBatch,
    pubkey: &ValidatorPubkey,
    is_expired: impl Fn(Epoch) -> bool,
) -> Result<Vec<Epoch>, String> {
    let mut expired = Vec::new();
    let entries = view
        .prefix_iterator(Table::ProposalHistory, pubkey.as_bytes())
        .map_err(|err| err.to_string())?;

    for entry in entries {
        let (key, _) = entry.map_err(|err| err.to_string())?;
        let epoch =
            decode_epoch(&key).ok_or_else(|| format!("malformed history key of {} bytes", key.len()))?;
        if !is_expired(epoch) {
            break;
        }
        expired.push(epoch);
    }
    Ok(expired)
}
