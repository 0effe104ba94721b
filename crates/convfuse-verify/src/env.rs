use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

static CONVFUSE_TOLERANCE_CONFIG: OnceLock<Option<PathBuf>> = OnceLock::new();
static CONVFUSE_SWEEP_PARALLEL: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// Path of the JSON tolerance overrides, if configured.
pub(crate) fn tolerance_config_path() -> Option<PathBuf> {
    CONVFUSE_TOLERANCE_CONFIG
        .get_or_init(|| match env::var("CONVFUSE_TOLERANCE_CONFIG") {
            Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value.trim())),
            _ => None,
        })
        .clone()
}

/// Whether sweeps spread trials across worker threads.
pub fn sweep_parallel_enabled() -> bool {
    *CONVFUSE_SWEEP_PARALLEL.get_or_init(|| match env::var("CONVFUSE_SWEEP_PARALLEL") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}
