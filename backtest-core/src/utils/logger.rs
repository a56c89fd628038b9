//! Process-wide tracing setup (spec §2 "Logging").
//!
//! Grounded on `bog-core::utils::logger`: an `EnvFilter` seeded from
//! `RUST_LOG` (falling back to an explicit level), with a plain
//! human-readable layer by default and a JSON layer for production log
//! shipping.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global tracing subscriber. `log_level` is used only when
/// `RUST_LOG` is unset; `json_logs` switches the output encoding.
pub fn init_logger(log_level: &str, json_logs: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}
