use convfuse::ops::{Activation, ConvPadding, MirrorPadMode, Paddings, ResizeSize, Strides};
use convfuse::tensor::f16;
use convfuse::{DType, KernelError, Shape, Tensor};
use convfuse_backend_ref_cpu as reference;

fn tensor_f32(dims: &[usize], data: Vec<f32>) -> Tensor {
    Tensor::from_vec(Shape::new(dims.to_vec()), data).unwrap()
}

#[test]
fn conv2d_same_matches_hand_computed_values() {
    let image = Tensor::iota(DType::F32, Shape::new(vec![1, 3, 4, 1]), 1.0);
    let filter = tensor_f32(&[3, 3, 1, 1], vec![1., 4., 7., 2., 5., 8., 3., 6., 9.]);
    let out = reference::conv2d(&image, &filter, Strides::new(1, 1), ConvPadding::Same).unwrap();
    assert_eq!(out.dims(), &[1, 3, 4, 1]);
    assert_eq!(
        out.as_slice::<f32>().unwrap(),
        &[105., 150., 183., 95., 235., 312., 357., 178., 187., 234., 261., 121.]
    );
}

#[test]
fn conv2d_valid_with_anisotropic_stride() {
    let image = tensor_f32(
        &[1, 3, 6, 1],
        vec![
            3., 2., 1., -1., -2., -3., 4., 3., 2., -2., -3., -4., 5., 4., 3., -3., -4., -5.,
        ],
    );
    let filter = tensor_f32(&[2, 2, 1, 1], vec![1., 2., 3., 4.]);
    let out = reference::conv2d(&image, &filter, Strides::new(1, 3), ConvPadding::Valid).unwrap();
    assert_eq!(out.dims(), &[1, 2, 2, 1]);
    assert_eq!(out.as_slice::<f32>().unwrap(), &[31., -23., 41., -33.]);
}

#[test]
fn conv2d_rejects_mixed_dtypes_and_depths() {
    let image = Tensor::zeros(DType::F32, Shape::new(vec![1, 4, 4, 2]));
    let filter64 = Tensor::zeros(DType::F64, Shape::new(vec![1, 1, 2, 1]));
    assert!(matches!(
        reference::conv2d(&image, &filter64, Strides::new(1, 1), ConvPadding::Same),
        Err(KernelError::DTypeMismatch { .. })
    ));
    let filter = Tensor::zeros(DType::F32, Shape::new(vec![1, 1, 3, 1]));
    assert!(matches!(
        reference::conv2d(&image, &filter, Strides::new(1, 1), ConvPadding::Same),
        Err(KernelError::ShapeMismatch(_))
    ));
}

#[test]
fn conv2d_half_accumulates_before_rounding() {
    let image = Tensor::iota(DType::F16, Shape::new(vec![1, 3, 4, 1]), 1.0);
    let filter = tensor_f32(&[3, 3, 1, 1], vec![1., 4., 7., 2., 5., 8., 3., 6., 9.]).cast(DType::F16);
    let out = reference::conv2d(&image, &filter, Strides::new(1, 1), ConvPadding::Same).unwrap();
    let values: Vec<f32> = out.as_slice::<f16>().unwrap().iter().map(|v| v.to_f32()).collect();
    assert_eq!(
        values,
        vec![105., 150., 183., 95., 235., 312., 357., 178., 187., 234., 261., 121.]
    );
}

#[test]
fn mirror_pad_reflect_and_symmetric() {
    // 2x3 image [[1, 2, 3], [4, 5, 6]]
    let image = Tensor::iota(DType::F64, Shape::new(vec![1, 2, 3, 1]), 1.0);
    let pads = Paddings([[0, 0], [1, 1], [2, 2], [0, 0]]);

    let reflect = reference::mirror_pad(&image, &pads, MirrorPadMode::Reflect).unwrap();
    assert_eq!(reflect.dims(), &[1, 4, 7, 1]);
    #[rustfmt::skip]
    let expected_reflect = [
        6., 5., 4., 5., 6., 5., 4.,
        3., 2., 1., 2., 3., 2., 1.,
        6., 5., 4., 5., 6., 5., 4.,
        3., 2., 1., 2., 3., 2., 1.,
    ];
    assert_eq!(reflect.as_slice::<f64>().unwrap(), &expected_reflect);

    let symmetric = reference::mirror_pad(&image, &pads, MirrorPadMode::Symmetric).unwrap();
    #[rustfmt::skip]
    let expected_symmetric = [
        2., 1., 1., 2., 3., 3., 2.,
        2., 1., 1., 2., 3., 3., 2.,
        5., 4., 4., 5., 6., 6., 5.,
        5., 4., 4., 5., 6., 6., 5.,
    ];
    assert_eq!(symmetric.as_slice::<f64>().unwrap(), &expected_symmetric);
}

#[test]
fn mirror_pad_rejects_reflect_padding_as_large_as_the_axis() {
    let image = Tensor::iota(DType::F32, Shape::new(vec![1, 2, 2, 1]), 1.0);
    let pads = Paddings::spatial(2, 2);
    assert!(reference::mirror_pad(&image, &pads, MirrorPadMode::Reflect).is_err());
    assert!(reference::mirror_pad(&image, &pads, MirrorPadMode::Symmetric).is_ok());
}

#[test]
fn resize_bilinear_outputs_float_and_aligns_corners() {
    // 1x2 row [0, 3] resized to width 4
    let image = tensor_f32(&[1, 1, 2, 1], vec![0., 3.]).cast(DType::F64);
    let size = ResizeSize::new(1, 4).unwrap();

    let plain = reference::resize_bilinear(&image, size, false).unwrap();
    assert_eq!(plain.dtype(), DType::F32);
    assert_eq!(plain.as_slice::<f32>().unwrap(), &[0.0, 1.5, 3.0, 3.0]);

    let aligned = reference::resize_bilinear(&image, size, true).unwrap();
    assert_eq!(aligned.as_slice::<f32>().unwrap(), &[0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn resize_to_the_same_size_is_identity() {
    let image = Tensor::iota(DType::F32, Shape::new(vec![2, 3, 5, 2]), 1.0);
    let out = reference::resize_bilinear(&image, ResizeSize::new(3, 5).unwrap(), false).unwrap();
    assert_eq!(out.to_f64_vec(), image.to_f64_vec());
}

#[test]
fn bias_add_and_activations() {
    let x = tensor_f32(&[1, 1, 2, 2], vec![-1.0, 2.0, 3.0, -4.0]);
    let bias = tensor_f32(&[2], vec![0.5, -0.5]);
    let biased = reference::bias_add(&x, &bias).unwrap();
    assert_eq!(biased.as_slice::<f32>().unwrap(), &[-0.5, 1.5, 3.5, -4.5]);

    let relu = reference::activation(&biased, Activation::Relu).unwrap();
    assert_eq!(relu.as_slice::<f32>().unwrap(), &[0.0, 1.5, 3.5, 0.0]);

    let wrong = tensor_f32(&[3], vec![0.0; 3]);
    assert!(reference::bias_add(&x, &wrong).is_err());
}

#[test]
fn cast_preserves_shape() {
    let x = Tensor::iota(DType::F32, Shape::new(vec![2, 2]), 0.0);
    let y = reference::cast(&x, DType::F64);
    assert_eq!(y.dtype(), DType::F64);
    assert_eq!(y.dims(), &[2, 2]);
    assert_eq!(y.to_f64_vec(), vec![0.0, 1.0, 2.0, 3.0]);
}
