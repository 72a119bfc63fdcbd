//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG`.
///
/// Without `RUST_LOG`, `debug` selects `jsonstash=debug,info`, otherwise
/// `info`. Returns `false` if a global subscriber was already installed,
/// which makes repeated calls (e.g. from several tests) harmless.
pub fn init_tracing(debug: bool) -> bool {
    let fallback = if debug { "jsonstash=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        let _ = init_tracing(true);
        assert!(!init_tracing(false));
    }
}
