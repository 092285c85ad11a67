//! Logging setup for Twotter binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a `tracing` subscriber that prints to stderr.
///
/// Every `twotter*` crate and `binary_name` log at `default_level`. The
/// `RUST_LOG` environment variable, when set, replaces that filter entirely.
///
/// ```no_run
/// twotter::logging::init_logging("twotter_server", "info");
/// ```
///
/// Calling this twice in one process is harmless: the second call leaves
/// the first subscriber in place.
pub fn init_logging(binary_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        [
            "twotter",
            "twotter_transport",
            "twotter_protocol",
            "twotter_registry",
            "twotter_tick",
            "twotter_client",
            binary_name,
        ]
        .iter()
        .map(|target| format!("{}={default_level}", target.replace('-', "_")))
        .collect::<Vec<_>>()
        .join(",")
        .into()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
