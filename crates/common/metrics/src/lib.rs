//! Metrics utilities and prometheus re-exports for slashguard.

pub mod gather;
pub mod timing;

// Re-export prometheus types and macros we use
pub use prometheus::{
    Encoder, Histogram, IntCounter, TextEncoder, gather, register_histogram, register_int_counter,
};

pub use prometheus::Error as PrometheusError;

pub use gather::{GatherError, gather_default_metrics};
pub use timing::TimingGuard;
