//! Optional subscriber wiring for test harnesses (feature `subscriber`).
//!
//! # Priority (highest to lowest)
//!
//! 1. `FRANKENAPPROVAL_LOG` (full directives, e.g. `frankenapproval=debug,warn`)
//! 2. `RUST_LOG`
//! 3. `FRANKENAPPROVAL_LOG_LEVEL` (a bare level applied to `frankenapproval`)
//! 4. The `default` passed in

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use frankenapproval_core::tracing_config::{TARGET_PREFIX, level_from_env};

/// Environment variable carrying full filter directives.
pub const LOG_DIRECTIVES_ENV: &str = "FRANKENAPPROVAL_LOG";

/// Install a global subscriber that writes through libtest's capture.
///
/// Returns `false` when a subscriber is already installed, so every test may
/// call this without coordination.
pub fn init_subscriber(default: Level) -> bool {
    let fmt_layer = fmt::layer()
        .with_test_writer()
        .with_target(true)
        .with_level(true)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(build_env_filter(default))
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

fn build_env_filter(default: Level) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_DIRECTIVES_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = level_from_env(default);
    EnvFilter::new(format!(
        "warn,{TARGET_PREFIX}={}",
        level.as_str().to_ascii_lowercase()
    ))
}
