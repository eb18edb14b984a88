//! Tracing subscriber setup for binaries embedding the pipeline.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "shortsflow=info";

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// With `json` set, every line is a JSON object carrying the structured
/// fields the pipeline logs (`run_id`, `stage`, `provider`, ...). Returns
/// `false` if a global subscriber was already installed.
pub fn init_tracing(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init_tracing(false);
        assert!(!init_tracing(true));
    }
}
