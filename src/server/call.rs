//! Server end of one download call
//!
//! A [`ServerCall`] owns one accepted connection. Every operation on it races
//! against the call's cancellation token, which is a child of the server
//! shutdown token and is also cancelled by the client (CANCEL frame, EOF or a
//! broken connection). A cancelled operation fails with [`CallError::Aborted`].

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::manager::CallId;
use crate::error::CallError;
use crate::logging::*;
use crate::protocol::{read_frame, write_frame, DownloadRequest, DownloadResponse, Frame};
use crate::status::Status;

/// Upper bound for the status written when the server shuts a call down
const SHUTDOWN_STATUS_TIMEOUT: Duration = Duration::from_secs(1);

pub struct ServerCall {
	id: CallId,
	peer: SocketAddr,
	reader: Option<BufReader<OwnedReadHalf>>,
	writer: BufWriter<OwnedWriteHalf>,
	cancel: CancellationToken,
	shutdown: CancellationToken,
	watcher: Option<JoinHandle<()>>,
	finished: bool,
}

impl ServerCall {
	/// Wait for the next connection on the shared listener
	///
	/// Fails with `Aborted` if the server shuts down first.
	pub async fn accept(
		id: CallId,
		listener: &TcpListener,
		shutdown: &CancellationToken,
	) -> Result<Self, CallError> {
		let accepted = tokio::select! {
			biased;
			_ = shutdown.cancelled() => None,
			result = listener.accept() => Some(result),
		};

		let (stream, peer) = match accepted {
			None => return Err(CallError::aborted("server is shutting down")),
			Some(Err(e)) => return Err(CallError::Accept(e)),
			Some(Ok(accepted)) => accepted,
		};
		if let Err(e) = stream.set_nodelay(true) {
			debug!("[call {}] Cannot set TCP_NODELAY: {}", id, e);
		}

		let (read_half, write_half) = stream.into_split();
		Ok(Self {
			id,
			peer,
			reader: Some(BufReader::new(read_half)),
			writer: BufWriter::new(write_half),
			cancel: shutdown.child_token(),
			shutdown: shutdown.clone(),
			watcher: None,
			finished: false,
		})
	}

	pub fn id(&self) -> CallId {
		self.id
	}

	pub fn peer(&self) -> SocketAddr {
		self.peer
	}

	/// Read the request that opens the call
	///
	/// Once it has arrived, the rest of the inbound stream is handed to a watcher
	/// task that turns CANCEL, EOF or a read error into call cancellation.
	pub async fn read_request(&mut self) -> Result<DownloadRequest, CallError> {
		let reader = self.reader.as_mut().ok_or_else(|| CallError::aborted("request already read"))?;

		let frame = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => return Err(CallError::aborted("server is shutting down")),
			frame = read_frame(reader) => frame,
		};

		match frame {
			Ok(Some(Frame::Request(request))) => {
				self.watch_for_cancel();
				Ok(request)
			}
			Ok(Some(_)) => Err(CallError::aborted("first frame is not a download request")),
			Ok(None) => Err(CallError::aborted("connection closed before a request arrived")),
			Err(e) => Err(CallError::aborted(format!("cannot read request: {}", e))),
		}
	}

	fn watch_for_cancel(&mut self) {
		let Some(mut reader) = self.reader.take() else {
			return;
		};
		let cancel = self.cancel.clone();
		let id = self.id;

		self.watcher = Some(tokio::spawn(async move {
			loop {
				match read_frame(&mut reader).await {
					Ok(Some(Frame::Cancel)) => {
						debug!("[call {}] Client cancelled the call", id);
						break;
					}
					Ok(Some(_)) => debug!("[call {}] Ignoring unexpected frame from client", id),
					Ok(None) => {
						debug!("[call {}] Client closed the connection", id);
						break;
					}
					Err(e) => {
						debug!("[call {}] Connection error: {}", id, e);
						break;
					}
				}
			}
			cancel.cancel();
		}));
	}

	async fn send(&mut self, frame: &Frame) -> Result<(), CallError> {
		if self.finished {
			return Err(CallError::aborted("call already finished"));
		}
		if self.cancel.is_cancelled() {
			return Err(self.abort_before_write().await);
		}

		let result = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => None,
			result = write_frame(&mut self.writer, frame) => Some(result),
		};

		match result {
			Some(Ok(())) => Ok(()),
			Some(Err(e)) => {
				self.finished = true;
				Err(CallError::aborted(format!("write failed: {}", e)))
			}
			None => {
				self.finished = true;
				Err(CallError::aborted("call cancelled during write"))
			}
		}
	}

	// Nothing of the refused frame is on the wire, so a shutdown status can still go out
	async fn abort_before_write(&mut self) -> CallError {
		self.finished = true;
		if !self.shutdown.is_cancelled() {
			return CallError::aborted("call cancelled by the client");
		}

		let end = Frame::End(Status::cancelled("server is shutting down"));
		match tokio::time::timeout(SHUTDOWN_STATUS_TIMEOUT, write_frame(&mut self.writer, &end)).await
		{
			Ok(Ok(())) => {}
			Ok(Err(e)) => debug!("[call {}] Cannot send shutdown status: {}", self.id, e),
			Err(_) => debug!("[call {}] Timed out sending shutdown status", self.id),
		}
		CallError::aborted("server is shutting down")
	}

	/// Send one header or chunk
	pub async fn write(&mut self, response: DownloadResponse) -> Result<(), CallError> {
		self.send(&Frame::Response(response)).await
	}

	/// Send the last message of the call together with its status
	pub async fn write_and_finish(
		&mut self,
		response: DownloadResponse,
		status: Status,
	) -> Result<(), CallError> {
		self.write(response).await?;
		self.finish(status).await
	}

	/// Send the terminal status; a call is finished at most once
	pub async fn finish(&mut self, status: Status) -> Result<(), CallError> {
		if self.finished {
			debug!("[call {}] Call already finished, dropping status {}", self.id, status);
			return Ok(());
		}
		self.send(&Frame::End(status)).await?;
		self.finished = true;
		Ok(())
	}
}

impl Drop for ServerCall {
	fn drop(&mut self) {
		if let Some(watcher) = self.watcher.take() {
			watcher.abort();
		}
	}
}

// vim: ts=4
