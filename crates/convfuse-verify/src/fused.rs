//! Invocation of the fused kernel under test.

use std::sync::Arc;

use anyhow::Result;
use convfuse::{BackendContextRegistry, ExecutionContext, Tensor};
use convfuse_backend_fused::{
    FusedConv2D, FusedConv2dAttrs, FusedPadAttrs, FusedPadConv2D, FusedResizeAndPadConv2D,
    FusedResizePadAttrs,
};

use crate::config::{FusedPipeline, TrialConfig, TrialInputs};

/// Runs the single fused kernel a trial describes.
pub trait FusedInvoker: Send + Sync {
    fn name(&self) -> &str;

    fn invoke(&self, config: &TrialConfig, inputs: &TrialInputs) -> Result<Tensor>;
}

/// Invokes the CPU fused kernels on the backend lent to `context`.
///
/// The backend is borrowed from the registry on every invocation; the invoker never owns
/// or tears it down.
pub struct CpuFusedInvoker {
    registry: Arc<BackendContextRegistry>,
    context: ExecutionContext,
}

impl CpuFusedInvoker {
    pub fn new(registry: Arc<BackendContextRegistry>, context: ExecutionContext) -> Self {
        CpuFusedInvoker { registry, context }
    }

    /// A private registry with `context` already registered.
    pub fn standalone(context: ExecutionContext) -> Self {
        let registry = Arc::new(BackendContextRegistry::new());
        registry.register(&context);
        Self::new(registry, context)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn registry(&self) -> &Arc<BackendContextRegistry> {
        &self.registry
    }
}

impl FusedInvoker for CpuFusedInvoker {
    fn name(&self) -> &str {
        "cpu-fused"
    }

    fn invoke(&self, config: &TrialConfig, inputs: &TrialInputs) -> Result<Tensor> {
        let backend = self.registry.get_or_create(&self.context)?;
        let strides = config.strides().to_nhwc();
        let padding = config.padding.as_str().to_string();
        let output = match &config.pipeline {
            FusedPipeline::ConvEpilogue(spec) => {
                let op = FusedConv2D::new(&FusedConv2dAttrs {
                    fused_ops: spec.names(),
                    num_args: spec.num_args(),
                    strides,
                    padding,
                })?;
                op.compute(&backend, &inputs.input, &inputs.filter, &inputs.args)?
            }
            FusedPipeline::ResizePadConv { resize, pad } => {
                let op = FusedResizeAndPadConv2D::new(&FusedResizePadAttrs {
                    mode: pad.mode.as_str().to_string(),
                    strides,
                    padding,
                    resize_align_corners: resize.align_corners,
                })?;
                op.compute(
                    &backend,
                    &inputs.input,
                    resize.size,
                    &pad.paddings(),
                    &inputs.filter,
                )?
            }
            FusedPipeline::PadConv { pad } => {
                let op = FusedPadConv2D::new(&FusedPadAttrs {
                    mode: pad.mode.as_str().to_string(),
                    strides,
                    padding,
                })?;
                op.compute(&backend, &inputs.input, &pad.paddings(), &inputs.filter)?
            }
        };
        Ok(output)
    }
}
