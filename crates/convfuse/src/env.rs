use std::env;
use std::sync::OnceLock;

static CONVFUSE_NUM_THREADS: OnceLock<Option<usize>> = OnceLock::new();

fn parse_positive(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

/// Default backend thread count when a context carries no hint.
pub(crate) fn num_threads_override() -> Option<usize> {
    *CONVFUSE_NUM_THREADS.get_or_init(|| match env::var("CONVFUSE_NUM_THREADS") {
        Ok(value) if !value.trim().is_empty() => parse_positive(&value),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_positive_rejects_zero_and_garbage() {
        assert_eq!(parse_positive(" 4 "), Some(4));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("-2"), None);
        assert_eq!(parse_positive("many"), None);
    }
}
