//! Log subscriber installation.
//!
//! The engine only emits `tracing` events; hosts decide where they go. This
//! helper installs a formatted stderr subscriber for binaries and tests that do
//! not bring their own.

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"info"` or `"skirmish_core=debug"`).
///
/// Returns false if a global subscriber was already installed; calling this
/// more than once is harmless.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        let _ = init_tracing("warn");
        assert!(!init_tracing("warn"));
    }
}
