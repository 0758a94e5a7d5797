//! Prometheus metrics for the proposal history store.

use std::sync::LazyLock;

use slashguard_metrics::{
    Histogram, IntCounter, TimingGuard, register_histogram, register_int_counter,
};

static PROPOSALS_RECORDED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "slashguard_proposals_recorded_total",
        "Block proposals recorded in the slashing protection history"
    )
    .unwrap()
});

static PRUNED_EPOCHS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "slashguard_pruned_epochs_total",
        "Proposal history epochs deleted by retention"
    )
    .unwrap()
});

static PRUNE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "slashguard_prune_failures_total",
        "Proposal history pruning passes that could not complete"
    )
    .unwrap()
});

static HISTORY_WRITE_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "slashguard_history_write_seconds",
        "Duration of proposal history write transactions"
    )
    .unwrap()
});

pub fn inc_proposals_recorded() {
    PROPOSALS_RECORDED.inc();
}

#[cfg(test)]
pub fn proposals_recorded() -> u64 {
    PROPOSALS_RECORDED.get()
}

pub fn inc_pruned_epochs(count: usize) {
    PRUNED_EPOCHS.inc_by(count as u64);
}

pub fn inc_prune_failures() {
    PRUNE_FAILURES.inc();
}

/// Times a history write transaction until the returned guard is dropped.
pub fn time_history_write() -> TimingGuard {
    TimingGuard::new(&HISTORY_WRITE_SECONDS)
}
