//! Unfused reference computation built from independently verified primitives.

use std::fmt;

use anyhow::{Context, Result};
use convfuse::ops::{Activation, ConvPadding, MirrorPadMode, Paddings, ResizeSize, Strides};
use convfuse::{DType, FusedOp, Tensor};
use convfuse_backend_ref_cpu as primitives;

use crate::config::{FusedPipeline, TrialConfig, TrialInputs};

/// One primitive op of a reference chain.
#[derive(Debug, Clone, PartialEq)]
pub enum RefNode {
    ResizeBilinear {
        size: ResizeSize,
        align_corners: bool,
    },
    Cast(DType),
    MirrorPad {
        paddings: Paddings,
        mode: MirrorPadMode,
    },
    Conv2d {
        strides: Strides,
        padding: ConvPadding,
    },
    /// Adds `TrialInputs::args[arg]`.
    BiasAdd {
        arg: usize,
    },
    Activation(Activation),
}

impl fmt::Display for RefNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefNode::ResizeBilinear {
                size,
                align_corners,
            } => write!(f, "ResizeBilinear({size}, align_corners={align_corners})"),
            RefNode::Cast(dtype) => write!(f, "Cast({dtype})"),
            RefNode::MirrorPad { paddings, mode } => {
                write!(f, "MirrorPad({mode}, {:?})", paddings.0)
            }
            RefNode::Conv2d { strides, padding } => write!(f, "Conv2D({strides}, {padding})"),
            RefNode::BiasAdd { arg } => write!(f, "BiasAdd(arg {arg})"),
            RefNode::Activation(act) => write!(f, "{act}"),
        }
    }
}

/// Linear chain of primitives equivalent to one fused kernel invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGraph {
    nodes: Vec<RefNode>,
}

impl ReferenceGraph {
    pub fn from_config(config: &TrialConfig) -> Result<Self> {
        config.validate()?;
        let mut nodes = Vec::new();
        let conv = RefNode::Conv2d {
            strides: config.strides(),
            padding: config.padding,
        };
        match &config.pipeline {
            FusedPipeline::ConvEpilogue(spec) => {
                nodes.push(conv);
                let mut next_arg = 0;
                for op in spec.ops() {
                    match op {
                        FusedOp::BiasAdd => {
                            nodes.push(RefNode::BiasAdd { arg: next_arg });
                            next_arg += 1;
                        }
                        FusedOp::Activation(act) => nodes.push(RefNode::Activation(*act)),
                    }
                }
            }
            FusedPipeline::ResizePadConv { resize, pad } => {
                nodes.push(RefNode::ResizeBilinear {
                    size: resize.size,
                    align_corners: resize.align_corners,
                });
                nodes.push(RefNode::Cast(config.dtype));
                nodes.push(RefNode::MirrorPad {
                    paddings: pad.paddings(),
                    mode: pad.mode,
                });
                nodes.push(conv);
            }
            FusedPipeline::PadConv { pad } => {
                nodes.push(RefNode::MirrorPad {
                    paddings: pad.paddings(),
                    mode: pad.mode,
                });
                nodes.push(conv);
            }
        }
        Ok(ReferenceGraph { nodes })
    }

    pub fn nodes(&self) -> &[RefNode] {
        &self.nodes
    }

    /// Runs the chain on `inputs.input`. Any failing primitive fails the whole chain.
    pub fn execute(&self, inputs: &TrialInputs) -> Result<Tensor> {
        let mut value = inputs.input.clone();
        for (idx, node) in self.nodes.iter().enumerate() {
            value = execute_node(node, &value, inputs)
                .with_context(|| format!("reference node {idx} ({node}) failed"))?;
        }
        Ok(value)
    }
}

fn execute_node(node: &RefNode, value: &Tensor, inputs: &TrialInputs) -> Result<Tensor> {
    let out = match node {
        RefNode::ResizeBilinear {
            size,
            align_corners,
        } => primitives::resize_bilinear(value, *size, *align_corners)?,
        RefNode::Cast(dtype) => primitives::cast(value, *dtype),
        RefNode::MirrorPad { paddings, mode } => primitives::mirror_pad(value, paddings, *mode)?,
        RefNode::Conv2d { strides, padding } => {
            primitives::conv2d(value, &inputs.filter, *strides, *padding)?
        }
        RefNode::BiasAdd { arg } => {
            let bias = inputs
                .args
                .get(*arg)
                .with_context(|| format!("missing auxiliary tensor {arg}"))?;
            primitives::bias_add(value, bias)?
        }
        RefNode::Activation(act) => primitives::activation(value, *act)?,
    };
    Ok(out)
}
