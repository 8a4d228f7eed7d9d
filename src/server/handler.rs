//! Server-side download handler
//!
//! One [`DownloadHandler`] serves exactly one call, from accepting the
//! connection to the terminal status. Its [`CallState`] is published to the
//! [`HandlerManager`] at every phase change.

use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::call::ServerCall;
use super::manager::{CallId, HandlerManager};
use crate::error::{CallError, FileError, ManagerError};
use crate::files::{FileManager, FileReader};
use crate::logging::*;
use crate::protocol::{DownloadRequest, DownloadResponse};
use crate::status::Status;

/// Chunk length used when the client asks for 0
pub const DEFAULT_CHUNK_SIZE: u64 = 4096;

/// Largest chunk length a client may ask for
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Pause before re-arming after a failed accept
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Phase of a server call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
	NewCall,
	ExpectingRequest,
	SendingFile,
	SendingNextFile,
	CallComplete,
}

impl fmt::Display for CallState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			CallState::NewCall => "NewCall",
			CallState::ExpectingRequest => "ExpectingRequest",
			CallState::SendingFile => "SendingFile",
			CallState::SendingNextFile => "SendingNextFile",
			CallState::CallComplete => "CallComplete",
		};
		write!(f, "{}", name)
	}
}

/// Chunk sizing applied to every call of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
	pub default_chunk_size: u64,
	pub max_chunk_size: u64,
}

impl Default for TransferSettings {
	fn default() -> Self {
		Self { default_chunk_size: DEFAULT_CHUNK_SIZE, max_chunk_size: DEFAULT_MAX_CHUNK_SIZE }
	}
}

impl TransferSettings {
	/// Chunk length to use for a requested size
	pub fn chunk_size_for(&self, requested: u64) -> u64 {
		if requested == 0 {
			self.default_chunk_size
		} else {
			requested.min(self.max_chunk_size)
		}
	}
}

/// Everything a handler shares with the rest of the server
#[derive(Clone)]
pub struct HandlerContext {
	pub manager: HandlerManager,
	pub files: FileManager,
	pub listener: Arc<TcpListener>,
	pub settings: TransferSettings,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"handler panicked".to_string()
	}
}

fn base_name(path: &std::path::Path) -> String {
	path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}

pub struct DownloadHandler {
	id: CallId,
	ctx: HandlerContext,
	state: CallState,
}

impl DownloadHandler {
	pub fn new(id: CallId, ctx: HandlerContext) -> Self {
		Self { id, ctx, state: CallState::NewCall }
	}

	/// Register a fresh handler waiting for the next connection
	pub fn arm(ctx: &HandlerContext) -> Result<CallId, ManagerError> {
		let next = ctx.clone();
		ctx.manager.add_handler(move |id| DownloadHandler::new(id, next).run())
	}

	pub fn id(&self) -> CallId {
		self.id
	}

	pub fn state(&self) -> CallState {
		self.state
	}

	fn set_state(&mut self, state: CallState) {
		if self.state != state {
			debug!("[call {}] {} -> {}", self.id, self.state, state);
			self.state = state;
			self.ctx.manager.update_state(self.id, state);
		}
	}

	fn arm_next_handler(&self) {
		match Self::arm(&self.ctx) {
			Ok(next) => debug!("[call {}] Armed handler {} for the next call", self.id, next),
			Err(ManagerError::ShuttingDown) => {
				debug!("[call {}] Not arming a new handler, server is shutting down", self.id)
			}
			Err(e) => error!("[call {}] Cannot arm a new handler: {}", self.id, e),
		}
	}

	/// Serve one call from accept to terminal status
	pub async fn run(mut self) {
		let shutdown = self.ctx.manager.shutdown_token();
		let mut call = match ServerCall::accept(self.id, &self.ctx.listener, &shutdown).await {
			Ok(call) => call,
			Err(CallError::Accept(e)) => {
				warn!("[call {}] Failed to accept connection: {}", self.id, e);
				tokio::select! {
					_ = shutdown.cancelled() => {}
					_ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => self.arm_next_handler(),
				}
				return;
			}
			Err(e) => {
				debug!("[call {}] No call accepted: {}", self.id, e);
				return;
			}
		};

		self.set_state(CallState::ExpectingRequest);
		self.arm_next_handler();
		debug!("[call {}] Accepted connection from {}", self.id, call.peer());

		let request = match call.read_request().await {
			Ok(request) => request,
			Err(e) => {
				debug!("[call {}] Call ended before a download request: {}", self.id, e);
				self.set_state(CallState::CallComplete);
				return;
			}
		};
		info!(
			"[call {}] Received download request: file name [{}] from {}",
			self.id,
			request.name,
			call.peer()
		);

		let outcome = AssertUnwindSafe(self.stream_files(&mut call, &request)).catch_unwind().await;
		let status = match outcome {
			Ok(Ok(())) => None,
			Ok(Err(CallError::Aborted { reason })) => {
				info!("[call {}] Download processing aborted: {}", self.id, reason);
				None
			}
			Ok(Err(CallError::Rejected(status))) => {
				warn!("[call {}] Download rejected: {}", self.id, status);
				Some(status)
			}
			Ok(Err(CallError::File(e))) => {
				error!("[call {}] Download processing error: {}", self.id, e);
				Some(Status::from(&e))
			}
			Ok(Err(CallError::Accept(e))) => {
				error!("[call {}] Download processing error: {}", self.id, e);
				Some(Status::unknown(""))
			}
			Err(panic) => {
				let message = panic_message(panic.as_ref());
				error!("[call {}] Download processing error: {}", self.id, message);
				Some(Status::unknown(""))
			}
		};

		self.set_state(CallState::CallComplete);
		if let Some(status) = status {
			if let Err(e) = call.finish(status).await {
				info!("[call {}] Cannot send final status: {}", self.id, e);
			}
		}
		debug!("[call {}] The call has been completed", self.id);
	}

	async fn stream_files(
		&mut self,
		call: &mut ServerCall,
		request: &DownloadRequest,
	) -> Result<(), CallError> {
		let chunk_size = self.ctx.settings.chunk_size_for(request.chunk_size);
		let mut listing = self.ctx.files.list_files(&request.name).await?;
		if listing.is_empty() {
			return Err(CallError::Rejected(Status::file_name_empty()));
		}

		while let Some(reader) = self.next_file(call, &mut listing).await? {
			self.set_state(CallState::SendingFile);
			self.send_file(call, reader, chunk_size, listing.is_empty()).await?;
			if listing.is_empty() {
				break;
			}
			self.set_state(CallState::SendingNextFile);
		}
		Ok(())
	}

	/// Dequeue step: open the next file and announce it
	///
	/// Zero-byte files are announced and skipped here. Returns `None` once the
	/// call has been finished.
	async fn next_file(
		&mut self,
		call: &mut ServerCall,
		listing: &mut VecDeque<PathBuf>,
	) -> Result<Option<FileReader>, CallError> {
		loop {
			let path = listing
				.pop_front()
				.ok_or_else(|| CallError::Rejected(Status::file_name_empty()))?;
			let reader = self.ctx.files.open_for_read(&path).await?;
			let header = DownloadResponse::header(base_name(&path), reader.size());

			info!("[call {}] Sending {} ({} bytes)", self.id, path.display(), reader.size());
			if reader.size() > 0 {
				call.write(header).await?;
				return Ok(Some(reader));
			}
			if listing.is_empty() {
				call.write_and_finish(header, Status::ok()).await?;
				return Ok(None);
			}
			call.write(header).await?;
		}
	}

	async fn send_file(
		&mut self,
		call: &mut ServerCall,
		mut reader: FileReader,
		chunk_size: u64,
		last_file: bool,
	) -> Result<(), CallError> {
		let mut remaining = reader.size();
		while remaining > 0 {
			let len = chunk_size.min(remaining) as usize;
			let mut data = vec![0u8; len];
			let read = reader.read(&mut data).await?;
			debug_assert_eq!(read, len, "file shrank while it was being sent");
			if read != len {
				return Err(FileError::unknown(format!(
					"short read on {}: expected {} bytes, got {}",
					reader.path().display(),
					len,
					read
				))
				.into());
			}
			remaining -= len as u64;

			let chunk = DownloadResponse::chunk(data);
			if remaining == 0 && last_file {
				call.write_and_finish(chunk, Status::ok()).await?;
			} else {
				call.write(chunk).await?;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_chunk_size_selection() {
		let settings = TransferSettings { default_chunk_size: 4096, max_chunk_size: 65536 };
		assert_eq!(settings.chunk_size_for(0), 4096);
		assert_eq!(settings.chunk_size_for(1), 1);
		assert_eq!(settings.chunk_size_for(65536), 65536);
		assert_eq!(settings.chunk_size_for(1 << 30), 65536);
	}

	#[test]
	fn test_default_settings() {
		let settings = TransferSettings::default();
		assert_eq!(settings.default_chunk_size, DEFAULT_CHUNK_SIZE);
		assert_eq!(settings.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
	}

	#[test]
	fn test_panic_message() {
		let panic: Box<dyn Any + Send> = Box::new("boom");
		assert_eq!(panic_message(panic.as_ref()), "boom");
		let panic: Box<dyn Any + Send> = Box::new(String::from("bang"));
		assert_eq!(panic_message(panic.as_ref()), "bang");
		let panic: Box<dyn Any + Send> = Box::new(7u32);
		assert_eq!(panic_message(panic.as_ref()), "handler panicked");
	}

	#[test]
	fn test_base_name() {
		assert_eq!(base_name(std::path::Path::new("/srv/docs/a.txt")), "a.txt");
		assert_eq!(base_name(std::path::Path::new("/")), "");
	}
}

// vim: ts=4
