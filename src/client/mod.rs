//! Download client
//!
//! ```ignore
//! let client = FileExchangeClient::new("127.0.0.1:55555");
//! let factory = DirectoryWriterFactory::new("./downloads")?;
//! let outcome = client.download("docs", &factory).await?;
//! ```

pub mod call;
pub mod handler;
pub mod writer;

use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::DownloadRequest;

pub use call::ClientCall;
pub use handler::{ClientHandler, ClientState, DownloadOutcome, ReceivedFile};
pub use writer::{DirectoryWriterFactory, DownloadWriter, MemoryWriterFactory, WriterFactory};

#[derive(Debug, Clone)]
pub struct FileExchangeClient {
	server_addr: String,
	chunk_size: u64,
}

impl FileExchangeClient {
	pub fn new(server_addr: impl Into<String>) -> Self {
		Self { server_addr: server_addr.into(), chunk_size: 0 }
	}

	pub fn from_config(config: &ClientConfig) -> Self {
		Self { server_addr: config.server_addr.clone(), chunk_size: config.chunk_size }
	}

	/// Chunk length to ask for; 0 leaves the choice to the server
	pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
		self.chunk_size = chunk_size;
		self
	}

	pub fn server_addr(&self) -> &str {
		&self.server_addr
	}

	pub fn chunk_size(&self) -> u64 {
		self.chunk_size
	}

	/// Download `name` (a file or a directory) through `factory`
	pub async fn download(
		&self,
		name: &str,
		factory: &dyn WriterFactory,
	) -> Result<DownloadOutcome, ClientError> {
		self.download_with_cancel(name, factory, CancellationToken::new()).await
	}

	/// Like [`download`](Self::download), aborted when `cancel` is cancelled
	pub async fn download_with_cancel(
		&self,
		name: &str,
		factory: &dyn WriterFactory,
		cancel: CancellationToken,
	) -> Result<DownloadOutcome, ClientError> {
		let request = DownloadRequest { name: name.to_string(), chunk_size: self.chunk_size };
		ClientHandler::new(request, factory, cancel).run(&self.server_addr).await
	}
}

// vim: ts=4
