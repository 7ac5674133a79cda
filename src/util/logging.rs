// loglens - util/logging.rs
//
// Tracing setup for the CLI binary. The effective filter directive is
// resolved once from (in order) the RUST_LOG environment variable, the
// --debug flag, the config-file level, and the built-in default; the
// subscriber itself writes terse single-line events to stderr so engine
// output on stdout stays machine-readable.

use crate::util::constants::DEFAULT_LOG_LEVEL;
use tracing_subscriber::EnvFilter;

/// Resolve the filter directive to install.
///
/// `None` means RUST_LOG is set and `EnvFilter` should read it verbatim;
/// otherwise the returned directive is the strongest of the remaining
/// sources: --debug beats the config level, which beats the default.
fn resolve_directive(debug_flag: bool, config_level: Option<&str>) -> Option<String> {
    if std::env::var_os("RUST_LOG").is_some() {
        return None;
    }
    if debug_flag {
        return Some("debug".to_string());
    }
    Some(
        config_level
            .filter(|level| !level.trim().is_empty())
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string(),
    )
}

/// Install the global subscriber. Call once, before any engine work.
pub fn init(debug_flag: bool, config_level: Option<&str>) {
    let filter = match resolve_directive(debug_flag, config_level) {
        None => EnvFilter::from_default_env(),
        Some(directive) => EnvFilter::new(directive),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    tracing::debug!(
        app = super::constants::APP_NAME,
        version = super::constants::APP_VERSION,
        "logging ready"
    );
}
