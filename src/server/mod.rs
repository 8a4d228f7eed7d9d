//! Download server
//!
//! [`FileServer::start`] binds the listener and arms the first handler. From then
//! on every handler arms its successor as soon as it has accepted a connection,
//! so exactly one handler is waiting for a new call at any time.

pub mod call;
pub mod handler;
pub mod manager;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::files::FileManager;
use crate::logging::*;

pub use call::ServerCall;
pub use handler::{
	CallState, DownloadHandler, HandlerContext, TransferSettings, DEFAULT_CHUNK_SIZE,
	DEFAULT_MAX_CHUNK_SIZE,
};
pub use manager::{CallId, HandlerEntry, HandlerManager};

impl From<&ServerConfig> for TransferSettings {
	fn from(config: &ServerConfig) -> Self {
		Self { default_chunk_size: config.default_chunk_size, max_chunk_size: config.max_chunk_size }
	}
}

/// Configured server that has not started listening yet
#[derive(Debug)]
pub struct FileServer {
	config: ServerConfig,
	files: FileManager,
}

impl FileServer {
	/// Prepare a server for `config.root`, which must be an existing directory
	pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
		let files = FileManager::new(&config.root)?;
		Ok(Self { config, files })
	}

	pub fn config(&self) -> &ServerConfig {
		&self.config
	}

	pub fn files(&self) -> &FileManager {
		&self.files
	}

	/// Bind the listener and arm the first handler
	pub async fn start(self) -> Result<RunningServer, ServerError> {
		let bind_error = |source: std::io::Error| ServerError::Bind {
			addr: self.config.listen_addr.clone(),
			source,
		};
		let listener = TcpListener::bind(&self.config.listen_addr).await.map_err(bind_error)?;
		let local_addr = listener.local_addr().map_err(bind_error)?;

		let manager = HandlerManager::new();
		let ctx = HandlerContext {
			manager: manager.clone(),
			files: self.files.clone(),
			listener: Arc::new(listener),
			settings: TransferSettings::from(&self.config),
		};
		DownloadHandler::arm(&ctx)?;

		info!("Serving {} on {}", self.files.root().display(), local_addr);
		Ok(RunningServer { local_addr, manager, files: self.files })
	}
}

/// Listening server; dropping it does not stop the handlers, use [`RunningServer::shutdown`]
#[derive(Debug)]
pub struct RunningServer {
	local_addr: SocketAddr,
	manager: HandlerManager,
	files: FileManager,
}

impl RunningServer {
	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	pub fn manager(&self) -> &HandlerManager {
		&self.manager
	}

	pub fn files(&self) -> &FileManager {
		&self.files
	}

	/// Cancel every call and wait for all handlers to release themselves
	pub async fn shutdown(self) {
		info!("Shutting down, {} handler(s) live", self.manager.len());
		self.manager.cancel_all();
		self.manager.wait_idle().await;
		info!("Server stopped");
	}

	/// Serve until `signal` completes, then shut down
	pub async fn run_until<F: Future<Output = ()>>(self, signal: F) {
		signal.await;
		self.shutdown().await;
	}
}

// vim: ts=4
