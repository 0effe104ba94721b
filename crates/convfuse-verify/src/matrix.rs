//! Concrete trial tables: hand-computed cases, the resize/pad comparative matrix, the
//! pad-only matrix and the conv + bias (+ relu) matrix.

use anyhow::Result;
use convfuse::ops::{Activation, ConvPadding, MirrorPadMode, ResizeSize};
use convfuse::{DType, FusionSpec, Shape, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Fill, FusedPipeline, PadStage, ResizeStage, TrialConfig, TrialInputs};

use ConvPadding::{Same, Valid};
use MirrorPadMode::{Reflect, Symmetric};

/// A trial with fixed inputs and a known exact output.
#[derive(Debug, Clone)]
pub struct KnownAnswer {
    pub config: TrialConfig,
    pub inputs: TrialInputs,
    pub expected: Tensor,
}

// name, dtypes, in_w, in_h, depth, resize_w, resize_h, y_pad, x_pad, filter_size,
// filter_count, align_corners, mode, stride, padding
type ResizePadRow = (
    &'static str,
    &'static [DType],
    usize,
    usize,
    usize,
    usize,
    usize,
    usize,
    usize,
    usize,
    usize,
    bool,
    MirrorPadMode,
    usize,
    ConvPadding,
);

const ALL: &[DType] = &DType::ALL;
const FLOAT: &[DType] = &[DType::F32];

#[rustfmt::skip]
const RESIZE_PAD_ROWS: &[ResizePadRow] = &[
    ("identity_comparative",       ALL,   10, 10, 1, 10, 10, 0, 0, 1, 1, false, Reflect,   1, Same),
    ("conv_only",                  FLOAT, 10, 10, 3, 10, 10, 0, 0, 4, 4, false, Reflect,   1, Same),
    ("resize_only",                FLOAT, 10, 10, 1, 20, 20, 0, 0, 1, 1, false, Reflect,   1, Same),
    ("resize_and_conv",            FLOAT,  2,  2, 4,  4,  2, 0, 0, 2, 2, false, Reflect,   1, Same),
    ("resize_align_and_conv",      FLOAT,  2,  2, 4,  4,  2, 0, 0, 2, 2, true,  Reflect,   1, Same),
    ("resize_and_conv_strided",    FLOAT,  2,  2, 4,  4,  2, 0, 0, 2, 2, false, Reflect,   2, Same),
    ("resize_align_and_conv_valid", FLOAT, 2,  2, 4,  4,  2, 0, 0, 2, 2, true,  Reflect,   1, Valid),
    ("pad_only",                   FLOAT,  4,  4, 1,  4,  4, 2, 2, 1, 1, false, Reflect,   1, Same),
    ("pad_only_with_channels",     FLOAT,  4,  4, 3,  4,  4, 2, 2, 1, 1, false, Reflect,   1, Same),
    ("resize_and_pad",             FLOAT,  4,  4, 1,  6,  6, 2, 2, 1, 1, false, Reflect,   1, Same),
    ("pad_only_symmetric",         FLOAT,  4,  4, 1,  4,  4, 2, 2, 1, 1, false, Symmetric, 1, Same),
    ("resize_and_pad_symmetric",   FLOAT,  4,  4, 3,  6,  6, 2, 2, 1, 1, false, Symmetric, 1, Same),
    ("resize_and_pad_symmetric_large", FLOAT, 1000, 1000, 3, 1006, 1006, 2, 2, 1, 1, false, Symmetric, 1, Same),
];

// name, dtypes, in_w, in_h, depth, y_pad, x_pad, filter_size, filter_count, mode, stride, padding
type PadRow = (
    &'static str,
    &'static [DType],
    usize,
    usize,
    usize,
    usize,
    usize,
    usize,
    usize,
    MirrorPadMode,
    usize,
    ConvPadding,
);

#[rustfmt::skip]
const PAD_ROWS: &[PadRow] = &[
    ("no_resize_identity",               ALL,   10, 10, 1, 0, 0, 1, 1, Reflect,   1, Same),
    ("no_resize_conv_only",              FLOAT, 10, 10, 3, 0, 0, 4, 4, Reflect,   1, Same),
    ("no_resize_pad_only",               FLOAT,  4,  4, 1, 2, 2, 1, 1, Reflect,   1, Same),
    ("no_resize_pad_only_with_channels", FLOAT,  4,  4, 3, 2, 2, 1, 1, Reflect,   1, Same),
    ("no_resize_pad_only_symmetric",     FLOAT,  4,  4, 1, 2, 2, 1, 1, Symmetric, 1, Same),
];

const CONV_BIAS_IMAGE: [usize; 4] = [8, 32, 32, 3];
const CONV_BIAS_FILTER_COUNT: usize = 12;
const CONV_BIAS_SEED: u64 = 0x5eed;

/// Resize + mirror pad + conv compared against the unfused chain, iota-filled.
pub fn resize_pad_matrix() -> Vec<TrialConfig> {
    let mut trials = Vec::new();
    for &(name, dtypes, in_w, in_h, depth, rw, rh, y, x, size, count, align, mode, stride, padding) in
        RESIZE_PAD_ROWS
    {
        for &dtype in dtypes {
            trials.push(TrialConfig {
                name: format!("resize_pad/{name}"),
                batch: 1,
                height: in_h,
                width: in_w,
                in_depth: depth,
                filter_h: size,
                filter_w: size,
                out_depth: count,
                stride: [stride, stride],
                padding,
                dtype,
                pipeline: FusedPipeline::ResizePadConv {
                    resize: ResizeStage {
                        size: ResizeSize {
                            height: rh,
                            width: rw,
                        },
                        align_corners: align,
                    },
                    pad: PadStage { y, x, mode },
                },
                fill: Fill::Iota,
            });
        }
    }
    trials
}

/// Mirror pad + conv with no resize, iota-filled.
pub fn pad_conv_matrix() -> Vec<TrialConfig> {
    let mut trials = Vec::new();
    for &(name, dtypes, in_w, in_h, depth, y, x, size, count, mode, stride, padding) in PAD_ROWS {
        for &dtype in dtypes {
            trials.push(TrialConfig {
                name: format!("pad/{name}"),
                batch: 1,
                height: in_h,
                width: in_w,
                in_depth: depth,
                filter_h: size,
                filter_w: size,
                out_depth: count,
                stride: [stride, stride],
                padding,
                dtype,
                pipeline: FusedPipeline::PadConv {
                    pad: PadStage { y, x, mode },
                },
                fill: Fill::Iota,
            });
        }
    }
    trials
}

/// Conv + BiasAdd and Conv + BiasAdd + Relu on an `8x32x32x3` batch for 1x1, image-size
/// and 3x3 filters, randomly filled.
pub fn conv_bias_matrix(dtype: DType) -> Vec<TrialConfig> {
    let [batch, height, width, depth] = CONV_BIAS_IMAGE;
    let filters = [("one_by_one", 1), ("image_size", height), ("spatial", 3)];
    let specs = [
        ("bias", FusionSpec::bias_add()),
        ("bias_relu", FusionSpec::bias_add_then(Activation::Relu)),
    ];
    let mut trials = Vec::new();
    for (spec_name, spec) in &specs {
        for &(filter_name, size) in &filters {
            trials.push(TrialConfig {
                name: format!("conv_{spec_name}/{filter_name}"),
                batch,
                height,
                width,
                in_depth: depth,
                filter_h: size,
                filter_w: size,
                out_depth: CONV_BIAS_FILTER_COUNT,
                stride: [1, 1],
                padding: Same,
                dtype,
                pipeline: FusedPipeline::ConvEpilogue(spec.clone()),
                fill: Fill::Random {
                    seed: CONV_BIAS_SEED,
                },
            });
        }
    }
    trials
}

/// Every comparative trial above, for every dtype it is defined for.
pub fn all_trials() -> Vec<TrialConfig> {
    let mut trials = resize_pad_matrix();
    trials.extend(pad_conv_matrix());
    for dtype in DType::ALL {
        trials.extend(conv_bias_matrix(dtype));
    }
    trials
}

/// The two hand-computed convolutions, routed through each fused kernel with a no-op
/// prologue or a zero bias, for every dtype.
pub fn known_answers() -> Result<Vec<KnownAnswer>> {
    let mut answers = Vec::new();
    for dtype in DType::ALL {
        for case in [same_padding_case(), anisotropic_stride_case()] {
            for pipeline in case.pipelines() {
                answers.push(case.build(dtype, pipeline)?);
            }
        }
    }
    Ok(answers)
}

struct HandCase {
    name: &'static str,
    input_hw: [usize; 2],
    filter_hw: [usize; 2],
    stride: [usize; 2],
    padding: ConvPadding,
    input: &'static [f64],
    filter: &'static [f64],
    expected_hw: [usize; 2],
    expected: &'static [f64],
}

fn same_padding_case() -> HandCase {
    HandCase {
        name: "handwritten_same",
        input_hw: [3, 4],
        filter_hw: [3, 3],
        stride: [1, 1],
        padding: Same,
        input: &[1., 2., 3., 4., 5., 6., 7., 8., 9., 10., 11., 12.],
        filter: &[1., 4., 7., 2., 5., 8., 3., 6., 9.],
        expected_hw: [3, 4],
        expected: &[105., 150., 183., 95., 235., 312., 357., 178., 187., 234., 261., 121.],
    }
}

fn anisotropic_stride_case() -> HandCase {
    HandCase {
        name: "anisotropic_stride_valid",
        input_hw: [3, 6],
        filter_hw: [2, 2],
        stride: [1, 3],
        padding: Valid,
        input: &[
            3., 2., 1., -1., -2., -3., 4., 3., 2., -2., -3., -4., 5., 4., 3., -3., -4., -5.,
        ],
        filter: &[1., 2., 3., 4.],
        expected_hw: [2, 2],
        expected: &[31., -23., 41., -33.],
    }
}

impl HandCase {
    fn pipelines(&self) -> [(&'static str, FusedPipeline); 3] {
        let pad = PadStage {
            y: 0,
            x: 0,
            mode: Reflect,
        };
        let [height, width] = self.input_hw;
        [
            (
                "resize_pad",
                FusedPipeline::ResizePadConv {
                    resize: ResizeStage {
                        size: ResizeSize { height, width },
                        align_corners: false,
                    },
                    pad,
                },
            ),
            ("pad", FusedPipeline::PadConv { pad }),
            ("conv_bias", FusedPipeline::ConvEpilogue(FusionSpec::bias_add())),
        ]
    }

    fn build(&self, dtype: DType, (kernel, pipeline): (&str, FusedPipeline)) -> Result<KnownAnswer> {
        let config = TrialConfig {
            name: format!("{kernel}/{}", self.name),
            batch: 1,
            height: self.input_hw[0],
            width: self.input_hw[1],
            in_depth: 1,
            filter_h: self.filter_hw[0],
            filter_w: self.filter_hw[1],
            out_depth: 1,
            stride: self.stride,
            padding: self.padding,
            dtype,
            pipeline,
            fill: Fill::Iota,
        };
        let input = Tensor::from_f64_values(dtype, config.input_shape(), self.input)?;
        let filter = Tensor::from_f64_values(dtype, config.filter_shape(), self.filter)?;
        let args = (0..config.num_args())
            .map(|_| Tensor::zeros(dtype, Shape::new(vec![1])))
            .collect();
        let inputs = TrialInputs::explicit(&config, input, filter, args)?;
        let expected = Tensor::from_f64_values(
            dtype,
            Shape::new(vec![1, self.expected_hw[0], self.expected_hw[1], 1]),
            self.expected,
        )?;
        Ok(KnownAnswer {
            config,
            inputs,
            expected,
        })
    }
}

/// `count` small, valid, randomly shaped trials across all kernels and dtypes.
///
/// The same seed always yields the same trials.
pub fn random_trials(seed: u64, count: usize) -> Vec<TrialConfig> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|idx| random_trial(&mut rng, idx)).collect()
}

fn random_trial(rng: &mut StdRng, idx: usize) -> TrialConfig {
    let dtype = DType::ALL[rng.gen_range(0..DType::ALL.len())];
    let height = rng.gen_range(1..=8);
    let width = rng.gen_range(1..=8);
    let mode = if rng.gen_bool(0.5) { Reflect } else { Symmetric };
    let padding = if rng.gen_bool(0.5) { Same } else { Valid };
    let pick_pad = |rng: &mut StdRng, dim: usize| rng.gen_range(0..=mode.max_padding(dim).min(2));

    let pipeline = match rng.gen_range(0..3) {
        0 => {
            let size = ResizeSize {
                height: rng.gen_range(1..=10),
                width: rng.gen_range(1..=10),
            };
            FusedPipeline::ResizePadConv {
                resize: ResizeStage {
                    size,
                    align_corners: rng.gen_bool(0.5),
                },
                pad: PadStage {
                    y: pick_pad(rng, size.height),
                    x: pick_pad(rng, size.width),
                    mode,
                },
            }
        }
        1 => FusedPipeline::PadConv {
            pad: PadStage {
                y: pick_pad(rng, height),
                x: pick_pad(rng, width),
                mode,
            },
        },
        _ => FusedPipeline::ConvEpilogue(match rng.gen_range(0..4) {
            0 => FusionSpec::bias_add(),
            1 => FusionSpec::bias_add_then(Activation::Relu),
            2 => FusionSpec::bias_add_then(Activation::Relu6),
            _ => FusionSpec::bias_add_then(Activation::Elu),
        }),
    };

    let mut config = TrialConfig {
        name: format!("random/{idx}"),
        batch: rng.gen_range(1..=2),
        height,
        width,
        in_depth: rng.gen_range(1..=3),
        filter_h: rng.gen_range(1..=3),
        filter_w: rng.gen_range(1..=3),
        out_depth: rng.gen_range(1..=3),
        stride: [rng.gen_range(1..=2), rng.gen_range(1..=2)],
        padding,
        dtype,
        pipeline,
        fill: Fill::Random { seed: rng.gen() },
    };
    if padding == Valid {
        let (conv_h, conv_w) = config.conv_input_hw();
        config.filter_h = config.filter_h.min(conv_h);
        config.filter_w = config.filter_w.min(conv_w);
    }
    config
}
