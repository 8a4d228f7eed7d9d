//! SIGINT/SIGTERM handling
//!
//! Signals do not exit the process. They complete [`shutdown_signal`] or cancel
//! a token, and the caller winds down the way it would on any cancellation.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Completes on the first SIGINT or SIGTERM
#[cfg(unix)]
pub async fn shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = match signal(SignalKind::terminate()) {
		Ok(stream) => Some(stream),
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Only SIGINT stops the process.", e);
			None
		}
	};

	tokio::select! {
		_ = async {
			match sigterm.as_mut() {
				Some(stream) => {
					stream.recv().await;
				}
				None => std::future::pending::<()>().await,
			}
		} => debug!("Received SIGTERM"),
		result = tokio::signal::ctrl_c() => match result {
			Ok(()) => debug!("Received SIGINT"),
			Err(e) => {
				warn!("Failed to setup SIGINT handler: {}", e);
				std::future::pending::<()>().await
			}
		},
	}
}

/// Completes on the first Ctrl-C
#[cfg(not(unix))]
pub async fn shutdown_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => debug!("Received Ctrl-C"),
		Err(e) => {
			warn!("Failed to setup Ctrl-C handler: {}", e);
			std::future::pending::<()>().await
		}
	}
}

/// Cancel `token` on the first signal; the watcher stops once the token is cancelled
pub fn cancel_on_signal(token: CancellationToken) {
	tokio::spawn(async move {
		tokio::select! {
			_ = shutdown_signal() => {
				debug!("Cancelling on signal");
				token.cancel();
			}
			_ = token.cancelled() => {}
		}
	});
}

// vim: ts=4
