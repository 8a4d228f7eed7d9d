//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("[call {}] Received download request", id);
//! error!("Download processing error: {}", e);
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `default_level` applies when `RUST_LOG` is not set:
///
/// ```bash
/// RUST_LOG=debug filexchange serve ./shared
/// RUST_LOG=filexchange::server=debug,filexchange::files=trace filexchange serve ./shared
/// ```
pub fn init_tracing(default_level: &str) {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.with_target(false)
		.try_init();
}

/// Default filter for a given `-v` count
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "info",
		1 => "debug",
		_ => "trace",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_level_for_verbosity() {
		assert_eq!(level_for_verbosity(0), "info");
		assert_eq!(level_for_verbosity(1), "debug");
		assert_eq!(level_for_verbosity(5), "trace");
	}
}

// vim: ts=4
