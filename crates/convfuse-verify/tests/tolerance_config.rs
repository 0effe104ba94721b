use convfuse::ops::ConvPadding;
use convfuse::{DType, FusionSpec};
use convfuse_verify::{Fill, FusedPipeline, Tolerance, ToleranceConfig, TrialConfig};

fn trial(name: &str, dtype: DType) -> TrialConfig {
    TrialConfig {
        name: name.to_string(),
        batch: 1,
        height: 2,
        width: 2,
        in_depth: 1,
        filter_h: 1,
        filter_w: 1,
        out_depth: 1,
        stride: [1, 1],
        padding: ConvPadding::Same,
        dtype,
        pipeline: FusedPipeline::ConvEpilogue(FusionSpec::bias_add()),
        fill: Fill::Iota,
    }
}

const CONFIG: &str = r#"{
    "default": { "atol": 2e-5 },
    "rules": [
        { "dtype": "half", "rtol": 2e-3 },
        { "trial": "resize_pad/*_large", "atol": 1e-4 },
        { "trial": "resize_pad/*_large", "dtype": "float", "atol": 5e-4 }
    ]
}"#;

#[test]
fn empty_config_uses_dtype_defaults() {
    let config = ToleranceConfig::default();
    for dtype in DType::ALL {
        assert_eq!(
            config.resolve(&trial("conv/x", dtype)),
            Tolerance::for_dtype(dtype)
        );
    }
}

#[test]
fn most_specific_rule_wins() {
    let config = ToleranceConfig::from_json_str(CONFIG).unwrap();
    assert_eq!(
        config.resolve(&trial("conv/x", DType::F64)),
        Tolerance::new(2e-5, 0.0)
    );
    assert_eq!(
        config.resolve(&trial("conv/x", DType::F16)),
        Tolerance::new(2e-5, 2e-3)
    );
    assert_eq!(
        config.resolve(&trial("resize_pad/symmetric_large", DType::F64)),
        Tolerance::new(1e-4, 0.0)
    );
    assert_eq!(
        config.resolve(&trial("resize_pad/symmetric_large", DType::F32)),
        Tolerance::new(5e-4, 0.0)
    );
    assert_eq!(
        config.resolve(&trial("resize_pad/symmetric_large", DType::F16)),
        Tolerance::new(1e-4, 2e-3)
    );
}

#[test]
fn loads_from_file() {
    let path = std::env::temp_dir()
        .join(format!("convfuse-tolerance-{}.json", std::process::id()));
    std::fs::write(&path, CONFIG).unwrap();
    let config = ToleranceConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(
        config.resolve(&trial("conv/x", DType::F32)),
        Tolerance::new(2e-5, 0.0)
    );
}

#[test]
fn rejects_malformed_json() {
    let err = ToleranceConfig::from_json_str("{ \"rules\": 3 }").unwrap_err();
    assert!(format!("{err:#}").contains("tolerance config"), "{err:#}");
    let missing = std::env::temp_dir().join("convfuse-tolerance-missing.json");
    assert!(ToleranceConfig::load(&missing).is_err());
}

#[test]
fn workspace_config_matches_dtype_defaults() {
    let path = ToleranceConfig::workspace_path();
    let config = ToleranceConfig::load(&path).unwrap();
    for dtype in DType::ALL {
        for name in ["conv_bias/spatial", "resize_pad/symmetric_large"] {
            assert_eq!(config.resolve(&trial(name, dtype)), Tolerance::for_dtype(dtype));
        }
    }
}
