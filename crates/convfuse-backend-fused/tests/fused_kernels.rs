use std::sync::Arc;

use convfuse::ops::{ConvPadding, MirrorPadMode, Paddings, ResizeSize, Strides};
use convfuse::{
    BackendContextRegistry, CpuBackendContext, DType, ExecutionContext, KernelError, Shape,
    Tensor,
};
use convfuse_backend_fused::{
    FusedConv2D, FusedConv2dAttrs, FusedPadAttrs, FusedPadConv2D, FusedResizeAndPadConv2D,
    FusedResizePadAttrs,
};
use convfuse_backend_ref_cpu as reference;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn backend(threads: i32) -> Arc<CpuBackendContext> {
    let registry = BackendContextRegistry::new();
    let context = ExecutionContext::with_recommended_threads(threads);
    registry.register(&context);
    registry.get_or_create(&context).unwrap()
}

fn conv_attrs(ops: &[&str], num_args: usize) -> FusedConv2dAttrs {
    FusedConv2dAttrs {
        fused_ops: ops.iter().map(|s| s.to_string()).collect(),
        num_args,
        strides: vec![1, 1, 1, 1],
        padding: "SAME".to_string(),
    }
}

fn resize_attrs(mode: &str, stride: usize, padding: &str, align: bool) -> FusedResizePadAttrs {
    FusedResizePadAttrs {
        mode: mode.to_string(),
        strides: vec![1, stride, stride, 1],
        padding: padding.to_string(),
        resize_align_corners: align,
    }
}

#[test]
fn construction_rejects_invalid_attributes() {
    assert!(matches!(
        FusedConv2D::new(&conv_attrs(&["BiasAdd", "Softmax"], 1)),
        Err(KernelError::InvalidAttribute { .. })
    ));
    assert!(matches!(
        FusedConv2D::new(&conv_attrs(&[], 0)),
        Err(KernelError::InvalidAttribute { .. })
    ));
    let err = FusedConv2D::new(&conv_attrs(&["BiasAdd", "Relu"], 2)).unwrap_err();
    assert!(err.to_string().contains("num_args"), "{err}");

    let mut bad_strides = conv_attrs(&["BiasAdd"], 1);
    bad_strides.strides = vec![2, 1, 1, 1];
    assert!(FusedConv2D::new(&bad_strides).is_err());
    let mut bad_padding = conv_attrs(&["BiasAdd"], 1);
    bad_padding.padding = "FULL".to_string();
    assert!(FusedConv2D::new(&bad_padding).is_err());

    assert!(FusedResizeAndPadConv2D::new(&resize_attrs("CONSTANT", 1, "SAME", false)).is_err());
    assert!(FusedPadConv2D::new(&FusedPadAttrs {
        mode: "REFLECT".to_string(),
        strides: vec![1, 1, 1],
        padding: "SAME".to_string(),
    })
    .is_err());
}

#[test]
fn compute_validates_arguments() {
    let backend = backend(1);
    let op = FusedConv2D::new(&conv_attrs(&["BiasAdd"], 1)).unwrap();
    let input = Tensor::zeros(DType::F32, Shape::new(vec![1, 4, 4, 2]));
    let filter = Tensor::zeros(DType::F32, Shape::new(vec![3, 3, 2, 5]));

    assert!(op.compute(&backend, &input, &filter, &[]).is_err());
    let wrong_len = Tensor::zeros(DType::F32, Shape::new(vec![4]));
    assert!(matches!(
        op.compute(&backend, &input, &filter, &[wrong_len]),
        Err(KernelError::ShapeMismatch(_))
    ));
    let wrong_dtype = Tensor::zeros(DType::F64, Shape::new(vec![5]));
    assert!(matches!(
        op.compute(&backend, &input, &filter, &[wrong_dtype]),
        Err(KernelError::DTypeMismatch { .. })
    ));

    let pad_op = FusedPadConv2D::new(&FusedPadAttrs {
        mode: "REFLECT".to_string(),
        strides: vec![1, 1, 1, 1],
        padding: "SAME".to_string(),
    })
    .unwrap();
    let batch_pad = Paddings([[1, 1], [0, 0], [0, 0], [0, 0]]);
    assert!(pad_op.compute(&backend, &input, &batch_pad, &filter).is_err());
    assert!(pad_op
        .compute(&backend, &input, &Paddings::spatial(4, 0), &filter)
        .is_err());
}

#[test]
fn resize_pad_kernel_reproduces_hand_computed_conv() {
    let backend = backend(2);
    let op = FusedResizeAndPadConv2D::new(&resize_attrs("REFLECT", 1, "SAME", false)).unwrap();
    for dtype in DType::ALL {
        let image = Tensor::iota(dtype, Shape::new(vec![1, 3, 4, 1]), 1.0);
        let filter = Tensor::from_f64_values(
            dtype,
            Shape::new(vec![3, 3, 1, 1]),
            &[1., 4., 7., 2., 5., 8., 3., 6., 9.],
        )
        .unwrap();
        let out = op
            .compute(
                &backend,
                &image,
                ResizeSize::new(3, 4).unwrap(),
                &Paddings::zero(),
                &filter,
            )
            .unwrap();
        assert_eq!(out.dtype(), dtype);
        assert_eq!(out.dims(), &[1, 3, 4, 1]);
        assert_eq!(
            out.to_f64_vec(),
            vec![105., 150., 183., 95., 235., 312., 357., 178., 187., 234., 261., 121.]
        );
    }
}

#[test]
fn resize_pad_kernel_matches_unfused_chain() {
    let backend = backend(3);
    let mut rng = StdRng::seed_from_u64(11);
    let image = Tensor::random(DType::F64, Shape::new(vec![2, 5, 4, 3]), &mut rng);
    let filter = Tensor::random(DType::F64, Shape::new(vec![3, 2, 3, 4]), &mut rng);
    let size = ResizeSize::new(7, 9).unwrap();
    let pads = Paddings::spatial(3, 2);

    for (align, stride, padding) in [
        (false, 1, ConvPadding::Same),
        (true, 2, ConvPadding::Valid),
    ] {
        let op = FusedResizeAndPadConv2D::new(&resize_attrs(
            "SYMMETRIC",
            stride,
            padding.as_str(),
            align,
        ))
        .unwrap();
        let fused = op.compute(&backend, &image, size, &pads, &filter).unwrap();

        let resized = reference::resize_bilinear(&image, size, align)
            .unwrap()
            .cast(DType::F64);
        let padded = reference::mirror_pad(&resized, &pads, MirrorPadMode::Symmetric).unwrap();
        let expected =
            reference::conv2d(&padded, &filter, Strides::new(stride, stride), padding).unwrap();

        assert_eq!(fused.dims(), expected.dims());
        assert_eq!(fused.to_f64_vec(), expected.to_f64_vec());
    }
}

#[test]
fn identity_filter_reduces_to_bias_and_relu() {
    let backend = backend(2);
    let depth = 3;
    let mut rng = StdRng::seed_from_u64(5);
    let image = Tensor::random(DType::F32, Shape::new(vec![2, 4, 4, depth]), &mut rng);
    let mut eye = vec![0.0f32; depth * depth];
    for c in 0..depth {
        eye[c * depth + c] = 1.0;
    }
    let filter = Tensor::from_vec(Shape::new(vec![1, 1, depth, depth]), eye).unwrap();
    let bias = Tensor::from_vec(Shape::new(vec![depth]), vec![0.25f32, -0.5, 0.0]).unwrap();

    let op = FusedConv2D::new(&conv_attrs(&["BiasAdd", "Relu"], 1)).unwrap();
    let out = op.compute(&backend, &image, &filter, &[bias]).unwrap();
    let bias_values = [0.25f32, -0.5, 0.0];
    for (idx, (&x, &y)) in image
        .as_slice::<f32>()
        .unwrap()
        .iter()
        .zip(out.as_slice::<f32>().unwrap())
        .enumerate()
    {
        let expected = (x + bias_values[idx % depth]).max(0.0);
        assert!((expected - y).abs() <= 1e-6, "index {idx}: {expected} vs {y}");
    }
}

#[test]
fn epilogue_applies_ops_in_order() {
    let backend = backend(1);
    let image = Tensor::from_vec(Shape::new(vec![1, 1, 1, 1]), vec![-2.0f64]).unwrap();
    let filter = Tensor::from_vec(Shape::new(vec![1, 1, 1, 1]), vec![1.0f64]).unwrap();
    let bias = Tensor::from_vec(Shape::new(vec![1]), vec![3.0f64]).unwrap();

    let bias_then_relu = FusedConv2D::new(&conv_attrs(&["BiasAdd", "Relu"], 1)).unwrap();
    let relu_then_bias = FusedConv2D::new(&conv_attrs(&["Relu", "BiasAdd"], 1)).unwrap();
    let a = bias_then_relu
        .compute(&backend, &image, &filter, std::slice::from_ref(&bias))
        .unwrap();
    let b = relu_then_bias
        .compute(&backend, &image, &filter, std::slice::from_ref(&bias))
        .unwrap();
    assert_eq!(a.to_f64_vec(), vec![1.0]);
    assert_eq!(b.to_f64_vec(), vec![3.0]);
}

#[test]
fn results_do_not_depend_on_thread_count() {
    let mut rng = StdRng::seed_from_u64(99);
    let image = Tensor::random(DType::F16, Shape::new(vec![3, 9, 7, 4]), &mut rng);
    let filter = Tensor::random(DType::F16, Shape::new(vec![3, 3, 4, 6]), &mut rng);
    let bias = Tensor::random(DType::F16, Shape::new(vec![6]), &mut rng);
    let op = FusedConv2D::new(&conv_attrs(&["BiasAdd", "Elu"], 1)).unwrap();

    let single = op
        .compute(&backend(1), &image, &filter, std::slice::from_ref(&bias))
        .unwrap();
    let multi = op
        .compute(&backend(4), &image, &filter, std::slice::from_ref(&bias))
        .unwrap();
    assert_eq!(single.to_f64_vec(), multi.to_f64_vec());
}
