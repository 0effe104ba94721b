use convfuse::ops::{
    bilinear, interpolation_weights, Activation, Conv2dGeometry, ConvPadding, MirrorPadMode,
    Paddings, ResizeSize, Strides,
};
use convfuse::{with_element_type, DType, Element, KernelError, KernelResult, Shape, Tensor};

fn nhwc_dims(tensor: &Tensor, op: &str) -> KernelResult<[usize; 4]> {
    tensor.shape().as_nhwc().ok_or_else(|| {
        KernelError::shape_mismatch(format!(
            "{op} expects a rank-4 NHWC tensor, got {:?}",
            tensor.dims()
        ))
    })
}

fn ensure_same_dtype(op: &str, lhs: &Tensor, rhs: &Tensor) -> KernelResult<()> {
    if lhs.dtype() != rhs.dtype() {
        tracing::debug!(op, lhs = %lhs.dtype(), rhs = %rhs.dtype(), "dtype mismatch");
        return Err(KernelError::DTypeMismatch {
            expected: lhs.dtype(),
            actual: rhs.dtype(),
        });
    }
    Ok(())
}

/// Direct NHWC x HWIO convolution with a zero border.
///
/// Each output sums `(kh, kw, ci)` terms in that order in f64 and rounds once.
pub fn conv2d(
    input: &Tensor,
    filter: &Tensor,
    strides: Strides,
    padding: ConvPadding,
) -> KernelResult<Tensor> {
    ensure_same_dtype("conv2d", input, filter)?;
    let geometry = Conv2dGeometry::new(
        nhwc_dims(input, "conv2d")?,
        filter.shape(),
        strides,
        padding,
    )?;
    with_element_type!(input.dtype(), E => {
        let values = conv2d_typed::<E>(
            input.as_slice::<E>()?,
            filter.as_slice::<E>()?,
            &geometry,
        )?;
        Tensor::from_vec(geometry.output_shape(), values)
    })
}

fn conv2d_typed<E: Element>(
    input: &[E],
    filter: &[E],
    g: &Conv2dGeometry,
) -> KernelResult<Vec<E>> {
    let mut out = Vec::with_capacity(g.output_len()?);
    for n in 0..g.batch {
        for oy in 0..g.out_h {
            for ox in 0..g.out_w {
                for co in 0..g.out_depth {
                    let mut acc = 0.0f64;
                    for kh in 0..g.filter_h {
                        let Some(y) = g.input_row(oy, kh) else {
                            continue;
                        };
                        for kw in 0..g.filter_w {
                            let Some(x) = g.input_col(ox, kw) else {
                                continue;
                            };
                            for ci in 0..g.in_depth {
                                let xv = input[((n * g.in_h + y) * g.in_w + x) * g.in_depth + ci];
                                let wv = filter
                                    [((kh * g.filter_w + kw) * g.in_depth + ci) * g.out_depth + co];
                                acc += xv.to_f64() * wv.to_f64();
                            }
                        }
                    }
                    out.push(E::from_f64(acc));
                }
            }
        }
    }
    Ok(out)
}

/// Bilinear resize of an NHWC tensor. The output is always F32.
pub fn resize_bilinear(
    input: &Tensor,
    size: ResizeSize,
    align_corners: bool,
) -> KernelResult<Tensor> {
    let [batch, in_h, in_w, depth] = nhwc_dims(input, "resize_bilinear")?;
    if in_h == 0 || in_w == 0 {
        return Err(KernelError::invalid_argument(
            "resize_bilinear input must have positive spatial size",
        ));
    }
    let ys = interpolation_weights(in_h, size.height, align_corners);
    let xs = interpolation_weights(in_w, size.width, align_corners);
    let source: Vec<f32> = with_element_type!(input.dtype(), E => {
        input.as_slice::<E>()?.iter().map(|v| v.to_f32()).collect()
    });
    let at =
        |n: usize, y: usize, x: usize, c: usize| source[((n * in_h + y) * in_w + x) * depth + c];

    let mut out = Vec::with_capacity(batch * size.height * size.width * depth);
    for n in 0..batch {
        for yi in &ys {
            for xi in &xs {
                for c in 0..depth {
                    out.push(bilinear(
                        at(n, yi.lower, xi.lower, c),
                        at(n, yi.lower, xi.upper, c),
                        at(n, yi.upper, xi.lower, c),
                        at(n, yi.upper, xi.upper, c),
                        xi.lerp,
                        yi.lerp,
                    ));
                }
            }
        }
    }
    Tensor::from_vec(Shape::new(vec![batch, size.height, size.width, depth]), out)
}

/// Mirror padding of all four NHWC dimensions.
pub fn mirror_pad(
    input: &Tensor,
    paddings: &Paddings,
    mode: MirrorPadMode,
) -> KernelResult<Tensor> {
    let dims = nhwc_dims(input, "mirror_pad")?;
    paddings.validate_mirror(dims, mode)?;
    let padded = paddings.padded_dims(dims);
    let [in_n, in_h, in_w, in_c] = dims;
    let [out_n, out_h, out_w, out_c] = padded;

    with_element_type!(input.dtype(), E => {
        let source = input.as_slice::<E>()?;
        let mut out = Vec::with_capacity(out_n * out_h * out_w * out_c);
        for n in 0..out_n {
            let sn = mode.source_index(n, paddings.dim(0)[0], in_n);
            for y in 0..out_h {
                let sy = mode.source_index(y, paddings.dim(1)[0], in_h);
                for x in 0..out_w {
                    let sx = mode.source_index(x, paddings.dim(2)[0], in_w);
                    for c in 0..out_c {
                        let sc = mode.source_index(c, paddings.dim(3)[0], in_c);
                        out.push(source[((sn * in_h + sy) * in_w + sx) * in_c + sc]);
                    }
                }
            }
        }
        Tensor::from_vec(Shape::new(padded.to_vec()), out)
    })
}

/// Adds a `[C]` bias along the last axis.
pub fn bias_add(input: &Tensor, bias: &Tensor) -> KernelResult<Tensor> {
    ensure_same_dtype("bias_add", input, bias)?;
    let channels = input.dims().last().copied().unwrap_or(0);
    if bias.dims() != [channels] {
        return Err(KernelError::shape_mismatch(format!(
            "bias_add expects bias of shape [{channels}], got {:?}",
            bias.dims()
        )));
    }
    with_element_type!(input.dtype(), E => {
        let bias = bias.as_slice::<E>()?;
        let values: Vec<E> = input
            .as_slice::<E>()?
            .iter()
            .enumerate()
            .map(|(idx, v)| E::from_f64(v.to_f64() + bias[idx % channels].to_f64()))
            .collect();
        Tensor::from_vec(input.shape().clone(), values)
    })
}

pub fn activation(input: &Tensor, activation: Activation) -> KernelResult<Tensor> {
    with_element_type!(input.dtype(), E => {
        let values: Vec<E> = input
            .as_slice::<E>()?
            .iter()
            .map(|v| E::from_f64(activation.apply(v.to_f64())))
            .collect();
        Tensor::from_vec(input.shape().clone(), values)
    })
}

pub fn cast(input: &Tensor, dtype: DType) -> Tensor {
    input.cast(dtype)
}
