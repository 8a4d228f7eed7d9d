//! Client end of one download call

use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::logging::*;
use crate::protocol::{read_frame, write_frame, DownloadRequest, DownloadResponse, Frame};
use crate::status::Status;

pub struct ClientCall {
	reader: BufReader<OwnedReadHalf>,
	writer: BufWriter<OwnedWriteHalf>,
	cancel: CancellationToken,
	status: Option<Status>,
}

impl ClientCall {
	/// Connect to `addr` and send the request
	///
	/// `cancel` aborts the call; cancelling before the connection is up fails
	/// with [`ClientError::Cancelled`].
	pub async fn start(
		addr: &str,
		request: &DownloadRequest,
		cancel: CancellationToken,
	) -> Result<Self, ClientError> {
		let connected = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(ClientError::Cancelled),
			result = TcpStream::connect(addr) => result,
		};
		let stream =
			connected.map_err(|source| ClientError::Connect { addr: addr.to_string(), source })?;
		if let Err(e) = stream.set_nodelay(true) {
			debug!("Cannot set TCP_NODELAY: {}", e);
		}

		let (read_half, write_half) = stream.into_split();
		let mut call = Self {
			reader: BufReader::new(read_half),
			writer: BufWriter::new(write_half),
			cancel,
			status: None,
		};
		write_frame(&mut call.writer, &Frame::Request(request.clone())).await?;
		Ok(call)
	}

	/// Give up on the call; the next read returns `None`
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Next header or chunk, `None` once the stream has ended
	///
	/// The stream ends with the server's status, with cancellation, or with a
	/// transport failure. The latter two finish the call as `Cancelled`.
	pub async fn read(&mut self) -> Option<DownloadResponse> {
		if self.status.is_some() {
			return None;
		}

		let frame = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => {
				self.abort("download cancelled").await;
				return None;
			}
			frame = read_frame(&mut self.reader) => frame,
		};

		match frame {
			Ok(Some(Frame::Response(response))) => Some(response),
			Ok(Some(Frame::End(status))) => {
				debug!("Server finished the call: {}", status);
				self.status = Some(status);
				None
			}
			Ok(Some(_)) => {
				warn!("Server sent a client frame");
				self.abort("protocol violation").await;
				None
			}
			Ok(None) => {
				self.status = Some(Status::cancelled("connection closed by server"));
				None
			}
			Err(e) => {
				warn!("Cannot read from server: {}", e);
				self.status = Some(Status::cancelled(format!("connection failed: {}", e)));
				None
			}
		}
	}

	async fn abort(&mut self, reason: &str) {
		self.cancel.cancel();
		if let Err(e) = write_frame(&mut self.writer, &Frame::Cancel).await {
			debug!("Cannot send cancel: {}", e);
		}
		self.status = Some(Status::cancelled(reason));
	}

	/// Terminal status of the call
	///
	/// A call finished before the server sent its status is cancelled first.
	pub async fn finish(mut self) -> Status {
		if self.status.is_none() {
			self.abort("download cancelled").await;
		}
		self.status.unwrap_or_else(|| Status::cancelled(""))
	}
}

// vim: ts=4
