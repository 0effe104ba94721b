//! Equivalence verifier for fused convolution kernels.
//!
//! A [`TrialConfig`] describes one kernel invocation. The verifier runs it twice: once as
//! an unfused chain of reference primitives ([`ReferenceGraph`]) and once through the fused
//! kernel under test ([`FusedInvoker`]), then compares the outputs element by element.
//! [`Sweep`] drives many trials and collects a [`SweepReport`].

pub mod bench;
pub mod compare;
pub mod config;
mod env;
pub mod fused;
pub mod matrix;
pub mod reference;
pub mod report;
pub mod sweep;
pub mod tolerance;

pub use compare::{compare, ComparisonResult, Mismatch, Tolerance};
pub use config::{Fill, FusedPipeline, PadStage, ResizeStage, TrialConfig, TrialInputs};
pub use env::sweep_parallel_enabled;
pub use fused::{CpuFusedInvoker, FusedInvoker};
pub use reference::{RefNode, ReferenceGraph};
pub use report::{SweepReport, TrialOutcome, TrialRecord};
pub use sweep::{Sweep, SweepError};
pub use tolerance::ToleranceConfig;

use tracing_subscriber::EnvFilter;

/// Installs a `RUST_LOG`-filtered fmt subscriber that writes through the test harness.
/// Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
