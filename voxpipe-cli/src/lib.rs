//! Voxpipe CLI Library
//!
//! Shared functionality for the voxpipe command-line tools.

pub mod config;
pub mod stats;

pub use config::{generate_key, Config, ConfigError, ReceiverConfig, SenderConfig};
pub use stats::{display_compact_stats, display_pacer_stats, format_bytes, format_duration, ReceiverStats};

/// Install the fmt subscriber; `RUST_LOG` wins over `verbose`
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
