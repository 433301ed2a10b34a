//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable carrying per-module log directives.
pub const LOG_ENV_VAR: &str = "TIDEMARK_LOG";

static INIT: Once = Once::new();

/// Initialize the Tidemark tracing/logging system.
///
/// Reads `TIDEMARK_LOG` for per-module log levels, e.g.
/// `TIDEMARK_LOG=tidemark_core::extraction=debug,tidemark_core::learning=info`.
///
/// Falls back to `tidemark=info` if `TIDEMARK_LOG` is not set or is invalid.
/// Calling it more than once has no effect.
pub fn init_tracing() {
    init_tracing_with_verbosity(false);
}

/// Like [`init_tracing`], with `debug` as the fallback level when `verbose`.
pub fn init_tracing_with_verbosity(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose {
            "tidemark=debug,tidemark_core=debug"
        } else {
            "tidemark=info,tidemark_core=info"
        };
        let filter =
            EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(fallback));

        // A subscriber installed by the host application wins.
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
