// crates.io
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter directive used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

/// Output format for the process-wide subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
	/// Human-readable lines.
	#[default]
	Pretty,
	/// One JSON object per event.
	Json,
}

/// Installs the global `tracing` subscriber, honoring `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
	let builder = fmt().with_env_filter(filter).with_target(true);

	match format {
		LogFormat::Pretty => builder.try_init().is_ok(),
		LogFormat::Json => builder.json().try_init().is_ok(),
	}
}
