//! Drives trials: reference output, fused output, comparison, record.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use convfuse::KernelError;
use rayon::prelude::*;
use thiserror::Error;

use crate::compare::{compare, ComparisonResult};
use crate::config::{TrialConfig, TrialInputs};
use crate::env;
use crate::fused::FusedInvoker;
use crate::reference::ReferenceGraph;
use crate::report::{SweepReport, TrialOutcome, TrialRecord};
use crate::tolerance::ToleranceConfig;

/// A sweep stops at the first fatal error; every other failure is recorded per trial.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("sweep aborted at trial {trial} after {completed} completed trials: {source}")]
    Aborted {
        trial: String,
        completed: usize,
        #[source]
        source: KernelError,
    },
}

/// Verifies a fused invoker against reference graphs over a set of trials.
///
/// Trials share nothing but the invoker's backend, so any trial can be re-run on its own.
pub struct Sweep<I> {
    invoker: I,
    tolerances: ToleranceConfig,
}

impl<I: FusedInvoker> Sweep<I> {
    /// Uses the tolerances resolved by [`ToleranceConfig::from_env`].
    pub fn new(invoker: I) -> Result<Self> {
        Ok(Sweep {
            invoker,
            tolerances: ToleranceConfig::from_env()?,
        })
    }

    pub fn with_tolerances(mut self, tolerances: ToleranceConfig) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Builds fresh inputs, evaluates both sides and compares them.
    pub fn evaluate(&self, config: &TrialConfig) -> Result<ComparisonResult> {
        let inputs = TrialInputs::generate(config)?;
        let graph = ReferenceGraph::from_config(config)?;
        let (expected, actual) = rayon::join(
            || graph.execute(&inputs),
            || self.invoker.invoke(config, &inputs),
        );
        let actual = actual.with_context(|| format!("fused kernel {}", self.invoker.name()))?;
        let expected = expected.context("reference graph")?;
        Ok(compare(&expected, &actual, self.tolerances.resolve(config)))
    }

    /// Runs one trial in isolation.
    pub fn run_trial(&self, config: &TrialConfig) -> Result<TrialRecord, SweepError> {
        self.try_trial(config)
            .map_err(|source| self.abort(config, 0, source))
    }

    /// Runs `configs` one after another.
    pub fn run<C>(&self, configs: C) -> Result<SweepReport, SweepError>
    where
        C: IntoIterator<Item = TrialConfig>,
    {
        let mut records = Vec::new();
        for config in configs {
            match self.try_trial(&config) {
                Ok(record) => records.push(record),
                Err(source) => return Err(self.abort(&config, records.len(), source)),
            }
        }
        Ok(self.finish(records))
    }

    /// Runs `configs` across the global rayon pool. Records keep the input order; after a
    /// fatal error no further trial is started.
    pub fn run_parallel(&self, configs: &[TrialConfig]) -> Result<SweepReport, SweepError> {
        let aborted = AtomicBool::new(false);
        let results: Vec<Option<Result<TrialRecord, KernelError>>> = configs
            .par_iter()
            .map(|config| {
                if aborted.load(Ordering::Acquire) {
                    return None;
                }
                let result = self.try_trial(config);
                if result.is_err() {
                    aborted.store(true, Ordering::Release);
                }
                Some(result)
            })
            .collect();

        let mut records = Vec::with_capacity(results.len());
        for (config, result) in configs.iter().zip(results) {
            match result {
                Some(Ok(record)) => records.push(record),
                Some(Err(source)) => return Err(self.abort(config, records.len(), source)),
                None => {}
            }
        }
        Ok(self.finish(records))
    }

    /// Sequential or parallel depending on `CONVFUSE_SWEEP_PARALLEL`.
    pub fn run_configured(&self, configs: &[TrialConfig]) -> Result<SweepReport, SweepError> {
        if env::sweep_parallel_enabled() {
            self.run_parallel(configs)
        } else {
            self.run(configs.iter().cloned())
        }
    }

    /// `Err` only for fatal errors.
    fn try_trial(&self, config: &TrialConfig) -> Result<TrialRecord, KernelError> {
        let (outcome, comparison) = match self.evaluate(config) {
            Ok(result) if result.equal => (TrialOutcome::Passed, Some(result)),
            Ok(result) => (TrialOutcome::Mismatch, Some(result)),
            Err(err) => {
                if let Some(fatal) = fatal_cause(&err) {
                    return Err(fatal.clone());
                }
                (TrialOutcome::Failed(format!("{err:#}")), None)
            }
        };
        let record = TrialRecord {
            name: config.name.clone(),
            dtype: config.dtype,
            summary: config.summary(),
            outcome,
            comparison,
        };
        if record.passed() {
            tracing::debug!(
                trial = %record.name,
                max_abs_diff = record.max_abs_diff().unwrap_or(0.0),
                "trial passed"
            );
        } else {
            tracing::warn!(
                trial = %record.summary,
                outcome = record.outcome.label(),
                max_abs_diff = ?record.max_abs_diff(),
                detail = %record.detail(),
                "trial failed"
            );
        }
        Ok(record)
    }

    fn abort(&self, config: &TrialConfig, completed: usize, source: KernelError) -> SweepError {
        tracing::error!(
            trial = %config.summary(),
            completed,
            error = %source,
            "fatal error, aborting sweep"
        );
        SweepError::Aborted {
            trial: config.name.clone(),
            completed,
            source,
        }
    }

    fn finish(&self, records: Vec<TrialRecord>) -> SweepReport {
        let report = SweepReport::new(records);
        tracing::info!(
            invoker = self.invoker.name(),
            trials = report.len(),
            passed = report.passed(),
            failed = report.failed(),
            "sweep finished"
        );
        report
    }
}

fn fatal_cause(err: &anyhow::Error) -> Option<&KernelError> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<KernelError>())
        .find(|kernel_err| kernel_err.is_fatal())
}
