//! Trial configurations and the fresh inputs generated for each trial.

use anyhow::{ensure, Result};
use convfuse::ops::{ConvPadding, MirrorPadMode, Paddings, ResizeSize, Strides};
use convfuse::{DType, FusionSpec, Shape, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Bilinear resize applied before padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeStage {
    pub size: ResizeSize,
    pub align_corners: bool,
}

/// Symmetric spatial mirror padding applied before the convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadStage {
    pub y: usize,
    pub x: usize,
    pub mode: MirrorPadMode,
}

impl PadStage {
    pub fn paddings(&self) -> Paddings {
        Paddings::spatial(self.y, self.x)
    }
}

/// Which fused kernel a trial exercises, and the primitives it folds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FusedPipeline {
    /// Convolution followed by the epilogue ops of the spec.
    ConvEpilogue(FusionSpec),
    /// Resize, mirror pad, convolution.
    ResizePadConv { resize: ResizeStage, pad: PadStage },
    /// Mirror pad, convolution.
    PadConv { pad: PadStage },
}

/// How input tensors are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// `1, 2, 3, ...` for every tensor.
    Iota,
    /// Uniform `[-1, 1)` from one RNG seeded per trial.
    Random { seed: u64 },
}

/// One point of a sweep. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialConfig {
    pub name: String,
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub in_depth: usize,
    pub filter_h: usize,
    pub filter_w: usize,
    pub out_depth: usize,
    /// `[h, w]`
    pub stride: [usize; 2],
    pub padding: ConvPadding,
    pub dtype: DType,
    pub pipeline: FusedPipeline,
    pub fill: Fill,
}

impl TrialConfig {
    pub fn strides(&self) -> Strides {
        Strides::new(self.stride[0], self.stride[1])
    }

    pub fn input_shape(&self) -> Shape {
        Shape::new(vec![self.batch, self.height, self.width, self.in_depth])
    }

    pub fn filter_shape(&self) -> Shape {
        Shape::new(vec![self.filter_h, self.filter_w, self.in_depth, self.out_depth])
    }

    /// Epilogue ops folded into the kernel, if this pipeline has any.
    pub fn fusion_spec(&self) -> Option<&FusionSpec> {
        match &self.pipeline {
            FusedPipeline::ConvEpilogue(spec) => Some(spec),
            _ => None,
        }
    }

    /// Number of bias tensors the trial needs.
    pub fn num_args(&self) -> usize {
        self.fusion_spec().map_or(0, FusionSpec::num_args)
    }

    /// Spatial size of the convolution input after any resize and padding.
    pub fn conv_input_hw(&self) -> (usize, usize) {
        match &self.pipeline {
            FusedPipeline::ConvEpilogue(_) => (self.height, self.width),
            FusedPipeline::ResizePadConv { resize, pad } => (
                resize.size.height + 2 * pad.y,
                resize.size.width + 2 * pad.x,
            ),
            FusedPipeline::PadConv { pad } => (self.height + 2 * pad.y, self.width + 2 * pad.x),
        }
    }

    /// Checks the dimensions a trial needs before any tensor is allocated.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.batch > 0 && self.height > 0 && self.width > 0 && self.in_depth > 0,
            "trial {} has an empty input {}",
            self.name,
            self.input_shape()
        );
        ensure!(
            self.filter_h > 0 && self.filter_w > 0 && self.out_depth > 0,
            "trial {} has an empty filter {}",
            self.name,
            self.filter_shape()
        );
        ensure!(
            self.stride[0] > 0 && self.stride[1] > 0,
            "trial {} has a zero stride",
            self.name
        );
        Ok(())
    }

    /// One-line description with everything needed to rebuild the trial.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} {} in={} filter={} stride={} {}",
            self.name,
            self.dtype,
            self.input_shape(),
            self.filter_shape(),
            self.strides(),
            self.padding
        );
        match &self.pipeline {
            FusedPipeline::ConvEpilogue(spec) => out.push_str(&format!(" fused={spec}")),
            FusedPipeline::ResizePadConv { resize, pad } => out.push_str(&format!(
                " resize={}{} pad={}x{} {}",
                resize.size,
                if resize.align_corners { " align" } else { "" },
                pad.y,
                pad.x,
                pad.mode
            )),
            FusedPipeline::PadConv { pad } => {
                out.push_str(&format!(" pad={}x{} {}", pad.y, pad.x, pad.mode))
            }
        }
        match self.fill {
            Fill::Iota => out.push_str(" fill=iota"),
            Fill::Random { seed } => out.push_str(&format!(" fill=random({seed})")),
        }
        out
    }
}

/// Tensors owned by a single trial.
#[derive(Debug, Clone)]
pub struct TrialInputs {
    pub input: Tensor,
    pub filter: Tensor,
    /// One bias per `BiasAdd` in the fusion spec, in order.
    pub args: Vec<Tensor>,
}

impl TrialInputs {
    /// Builds fresh tensors for `config`. The same config always yields the same values.
    pub fn generate(config: &TrialConfig) -> Result<Self> {
        config.validate()?;
        let dtype = config.dtype;
        let bias_shape = Shape::new(vec![config.out_depth]);
        let inputs = match config.fill {
            Fill::Iota => TrialInputs {
                input: Tensor::iota(dtype, config.input_shape(), 1.0),
                filter: Tensor::iota(dtype, config.filter_shape(), 1.0),
                args: (0..config.num_args())
                    .map(|_| Tensor::iota(dtype, bias_shape.clone(), 1.0))
                    .collect(),
            },
            Fill::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                TrialInputs {
                    input: Tensor::random(dtype, config.input_shape(), &mut rng),
                    filter: Tensor::random(dtype, config.filter_shape(), &mut rng),
                    args: (0..config.num_args())
                        .map(|_| Tensor::random(dtype, bias_shape.clone(), &mut rng))
                        .collect(),
                }
            }
        };
        Ok(inputs)
    }

    /// Uses caller-provided tensors, checking them against `config`.
    pub fn explicit(
        config: &TrialConfig,
        input: Tensor,
        filter: Tensor,
        args: Vec<Tensor>,
    ) -> Result<Self> {
        ensure!(
            input.shape() == &config.input_shape(),
            "input shape {} does not match trial {}",
            input.shape(),
            config.summary()
        );
        ensure!(
            filter.shape() == &config.filter_shape(),
            "filter shape {} does not match trial {}",
            filter.shape(),
            config.summary()
        );
        ensure!(
            args.len() == config.num_args(),
            "trial {} needs {} auxiliary tensors, got {}",
            config.name,
            config.num_args(),
            args.len()
        );
        Ok(TrialInputs {
            input: input.cast(config.dtype),
            filter: filter.cast(config.dtype),
            args: args.into_iter().map(|t| t.cast(config.dtype)).collect(),
        })
    }
}
