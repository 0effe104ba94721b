use convfuse::ops::Activation;
use convfuse::{FusedOp, FusionSpec, KernelError};

#[test]
fn parses_known_names_in_order() {
    let spec = FusionSpec::parse(&["BiasAdd", "Relu"]).unwrap();
    assert_eq!(
        spec.ops(),
        &[FusedOp::BiasAdd, FusedOp::Activation(Activation::Relu)]
    );
    assert_eq!(spec.num_args(), 1);
    assert_eq!(spec.to_string(), "BiasAdd+Relu");
    assert_eq!(spec.names(), vec!["BiasAdd".to_string(), "Relu".to_string()]);

    let reordered = FusionSpec::parse(&["Relu", "BiasAdd"]).unwrap();
    assert_ne!(reordered, spec);
}

#[test]
fn rejects_empty_and_unknown_specs() {
    let empty: [&str; 0] = [];
    assert!(matches!(
        FusionSpec::parse(&empty),
        Err(KernelError::InvalidAttribute { .. })
    ));
    let err = FusionSpec::parse(&["BiasAdd", "Gelu"]).unwrap_err();
    assert!(err.to_string().contains("Gelu"), "{err}");
}

#[test]
fn counts_one_argument_per_bias_add() {
    let spec = FusionSpec::parse(&["BiasAdd", "Elu", "BiasAdd"]).unwrap();
    assert_eq!(spec.num_args(), 2);
    assert_eq!(FusionSpec::parse(&["Relu6"]).unwrap().num_args(), 0);
    assert_eq!(FusionSpec::bias_add().num_args(), 1);
}

#[test]
fn activations_follow_their_definitions() {
    assert_eq!(Activation::Relu.apply(-3.0), 0.0);
    assert_eq!(Activation::Relu.apply(2.5), 2.5);
    assert_eq!(Activation::Relu6.apply(7.0), 6.0);
    assert_eq!(Activation::Relu6.apply(-1.0), 0.0);
    assert_eq!(Activation::Elu.apply(1.5), 1.5);
    assert!((Activation::Elu.apply(-1.0) - ((-1.0f64).exp() - 1.0)).abs() < 1e-15);
}
