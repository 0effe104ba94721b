use convfuse::ops::Conv2dGeometry;
use convfuse::{CpuBackendContext, Element, KernelResult};
use rayon::prelude::*;

/// Row-parallel direct convolution over an input that is only reachable through `sample`.
///
/// `sample(n, y, x, ci)` returns the (already rounded) input element at an in-bounds
/// coordinate of the convolution input; the zero border is skipped. Each output channel
/// accumulates its `(kh, kw, ci)` terms in that order in f64, is rounded to `E` once and
/// then handed to `epilogue(co, value)`.
pub(crate) fn conv2d_rows<E, S, P>(
    backend: &CpuBackendContext,
    geometry: &Conv2dGeometry,
    filter: &[E],
    sample: S,
    epilogue: P,
) -> KernelResult<Vec<E>>
where
    E: Element,
    S: Fn(usize, usize, usize, usize) -> f64 + Sync,
    P: Fn(usize, E) -> E + Sync,
{
    let g = geometry;
    let mut out = vec![E::zero(); g.output_len()?];
    let row_len = g.out_w * g.out_depth;
    if row_len == 0 {
        return Ok(out);
    }

    backend.install(|| {
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, chunk)| {
                let n = row / g.out_h;
                let oy = row % g.out_h;
                let mut acc = vec![0.0f64; g.out_depth];
                for ox in 0..g.out_w {
                    acc.fill(0.0);
                    for kh in 0..g.filter_h {
                        let Some(y) = g.input_row(oy, kh) else {
                            continue;
                        };
                        for kw in 0..g.filter_w {
                            let Some(x) = g.input_col(ox, kw) else {
                                continue;
                            };
                            for ci in 0..g.in_depth {
                                let xv = sample(n, y, x, ci);
                                let base = ((kh * g.filter_w + kw) * g.in_depth + ci) * g.out_depth;
                                let weights = &filter[base..base + g.out_depth];
                                for (slot, w) in acc.iter_mut().zip(weights) {
                                    *slot += xv * w.to_f64();
                                }
                            }
                        }
                    }
                    let dst = &mut chunk[ox * g.out_depth..(ox + 1) * g.out_depth];
                    for (co, (slot, &sum)) in dst.iter_mut().zip(acc.iter()).enumerate() {
                        *slot = epilogue(co, E::from_f64(sum));
                    }
                }
            });
    });
    Ok(out)
}
