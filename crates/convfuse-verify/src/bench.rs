//! Benchmark table for unfused and fused convolution chains.
//!
//! One row per `{variant, N, H, W, C, FW, FH, FC}` point; a single runner iterates the
//! table instead of registering each point by hand.

use std::fmt;

use anyhow::Result;
use convfuse::ops::{Activation, ConvPadding, Strides};
use convfuse::{CpuBackendContext, DType, FusedOp, FusionSpec, Shape, Tensor};
use convfuse_backend_fused::{FusedConv2D, FusedConv2dAttrs};
use convfuse_backend_ref_cpu as primitives;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{Fill, FusedPipeline, TrialConfig};

const BENCH_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchVariant {
    Conv2D,
    Conv2DWithBias,
    Conv2DWithBiasAndRelu,
    FusedConv2D,
    FusedConv2DAndRelu,
}

impl BenchVariant {
    pub const ALL: [BenchVariant; 5] = [
        BenchVariant::Conv2D,
        BenchVariant::Conv2DWithBias,
        BenchVariant::Conv2DWithBiasAndRelu,
        BenchVariant::FusedConv2D,
        BenchVariant::FusedConv2DAndRelu,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BenchVariant::Conv2D => "Conv2D",
            BenchVariant::Conv2DWithBias => "Conv2DWithBias",
            BenchVariant::Conv2DWithBiasAndRelu => "Conv2DWithBiasAndRelu",
            BenchVariant::FusedConv2D => "FusedConv2D",
            BenchVariant::FusedConv2DAndRelu => "FusedConv2DAndRelu",
        }
    }

    pub fn is_fused(self) -> bool {
        matches!(
            self,
            BenchVariant::FusedConv2D | BenchVariant::FusedConv2DAndRelu
        )
    }

    /// Ops after the convolution, fused or not.
    pub fn epilogue(self) -> Option<FusionSpec> {
        match self {
            BenchVariant::Conv2D => None,
            BenchVariant::Conv2DWithBias | BenchVariant::FusedConv2D => {
                Some(FusionSpec::bias_add())
            }
            BenchVariant::Conv2DWithBiasAndRelu | BenchVariant::FusedConv2DAndRelu => {
                Some(FusionSpec::bias_add_then(Activation::Relu))
            }
        }
    }
}

impl fmt::Display for BenchVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One benchmark point. Filters are `FW x FH x C x FC`, stride 1, SAME padding, f32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchCase {
    pub variant: BenchVariant,
    pub n: usize,
    pub h: usize,
    pub w: usize,
    pub c: usize,
    pub fw: usize,
    pub fh: usize,
    pub fc: usize,
    pub label: String,
}

impl BenchCase {
    pub fn new(variant: BenchVariant, [n, h, w, c]: [usize; 4], [fw, fh, fc]: [usize; 3]) -> Self {
        BenchCase {
            variant,
            n,
            h,
            w,
            c,
            fw,
            fh,
            fc,
            label: format!("{fh}x{fw} /b {n}"),
        }
    }

    pub fn name(&self) -> String {
        format!(
            "BM_{}_cpu_{}_{}_{}_{}_{}_{}_{}",
            self.variant, self.n, self.h, self.w, self.c, self.fw, self.fh, self.fc
        )
    }

    /// Input elements consumed per iteration.
    pub fn items_processed(&self) -> u64 {
        (self.n * self.h * self.w * self.c) as u64
    }

    /// The equivalent trial, for checking a benchmark point before timing it.
    pub fn trial_config(&self) -> TrialConfig {
        TrialConfig {
            name: self.name(),
            batch: self.n,
            height: self.h,
            width: self.w,
            in_depth: self.c,
            filter_h: self.fh,
            filter_w: self.fw,
            out_depth: self.fc,
            stride: [1, 1],
            padding: ConvPadding::Same,
            dtype: DType::F32,
            pipeline: FusedPipeline::ConvEpilogue(
                self.variant.epilogue().unwrap_or_else(FusionSpec::bias_add),
            ),
            fill: Fill::Random { seed: BENCH_SEED },
        }
    }

    /// Allocates random inputs and builds the kernel once, outside the timed loop.
    pub fn prepare(&self) -> Result<PreparedBench> {
        let mut rng = StdRng::seed_from_u64(BENCH_SEED);
        let input = Tensor::random(
            DType::F32,
            Shape::new(vec![self.n, self.h, self.w, self.c]),
            &mut rng,
        );
        let filter = Tensor::random(
            DType::F32,
            Shape::new(vec![self.fh, self.fw, self.c, self.fc]),
            &mut rng,
        );
        let bias = Tensor::random(DType::F32, Shape::new(vec![self.fc]), &mut rng);
        let fused = match self.variant.epilogue() {
            Some(spec) if self.variant.is_fused() => Some(FusedConv2D::new(&FusedConv2dAttrs {
                fused_ops: spec.names(),
                num_args: spec.num_args(),
                strides: Strides::new(1, 1).to_nhwc(),
                padding: ConvPadding::Same.as_str().to_string(),
            })?),
            _ => None,
        };
        Ok(PreparedBench {
            variant: self.variant,
            input,
            filter,
            bias,
            fused,
        })
    }
}

/// Inputs and kernel for one benchmark point.
pub struct PreparedBench {
    variant: BenchVariant,
    input: Tensor,
    filter: Tensor,
    bias: Tensor,
    fused: Option<FusedConv2D>,
}

impl PreparedBench {
    /// One iteration. Unfused variants run the reference primitives, fused variants run
    /// on `backend`.
    pub fn run(&self, backend: &CpuBackendContext) -> Result<Tensor> {
        if let Some(op) = &self.fused {
            let out = op.compute(
                backend,
                &self.input,
                &self.filter,
                std::slice::from_ref(&self.bias),
            )?;
            return Ok(out);
        }
        let mut out = primitives::conv2d(
            &self.input,
            &self.filter,
            Strides::new(1, 1),
            ConvPadding::Same,
        )?;
        for op in self.variant.epilogue().iter().flat_map(FusionSpec::ops) {
            out = match op {
                FusedOp::BiasAdd => primitives::bias_add(&out, &self.bias)?,
                FusedOp::Activation(act) => primitives::activation(&out, *act)?,
            };
        }
        Ok(out)
    }
}

/// Pixel-CNN shapes: `32x32x128` images into 1024 filters, 1x1 and 3x3, batches 8/16/32.
pub fn bench_table() -> Vec<BenchCase> {
    let mut cases = Vec::new();
    for filter in [1, 3] {
        for variant in BenchVariant::ALL {
            for batch in [8, 16, 32] {
                cases.push(BenchCase::new(
                    variant,
                    [batch, 32, 32, 128],
                    [filter, filter, 1024],
                ));
            }
        }
    }
    cases
}
