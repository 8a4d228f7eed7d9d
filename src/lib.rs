//! # filexchange - Streaming File Download Service
//!
//! A client asks for a file or a directory by name and the server streams back,
//! for every regular file, a header followed by data chunks, then a terminal status.
//!
//! Every server call runs as its own task. The [`server::HandlerManager`] keeps
//! exactly one acceptor armed while any number of transfers run, and the
//! [`files::FileManager`] guarantees that a path is never read while it is being
//! written (or written while it is being read).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filexchange::client::{FileExchangeClient, MemoryWriterFactory};
//! use filexchange::config::ServerConfig;
//! use filexchange::server::FileServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig { root: "./shared".into(), listen_addr: "127.0.0.1:0".into(), ..Default::default() };
//!     let server = FileServer::new(config)?.start().await?;
//!
//!     let client = FileExchangeClient::new(server.local_addr().to_string());
//!     let factory = MemoryWriterFactory::new();
//!     let outcome = client.download("docs", &factory).await?;
//!     println!("{}: {} bytes", outcome.status, outcome.bytes_received);
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod status;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{CallError, ClientError, ConfigError, FileError, ManagerError, ServerError};
pub use status::{Status, StatusCode};

// vim: ts=4
