//! Client-side download handler

use std::fmt;
use tokio_util::sync::CancellationToken;

use super::call::ClientCall;
use super::writer::{DownloadWriter, WriterFactory};
use crate::error::ClientError;
use crate::logging::*;
use crate::protocol::{DownloadRequest, DownloadResponse, FileChunk, FileHeader, ProtocolError};
use crate::status::{Status, StatusCode};

/// Phase of a client call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
	NewCall,
	SendingRequest,
	ExpectingHeader,
	ReceivingFile,
	CallComplete,
}

impl fmt::Display for ClientState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ClientState::NewCall => "NewCall",
			ClientState::SendingRequest => "SendingRequest",
			ClientState::ExpectingHeader => "ExpectingHeader",
			ClientState::ReceivingFile => "ReceivingFile",
			ClientState::CallComplete => "CallComplete",
		};
		write!(f, "{}", name)
	}
}

/// A file announced by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
	pub name: String,
	pub size: u64,
	pub received: u64,
}

/// What a finished download produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
	pub status: Status,
	/// Payload bytes written, empty chunks excluded
	pub bytes_received: u64,
	/// Chunk messages received, empty ones included
	pub chunks_received: u64,
	pub files: Vec<ReceivedFile>,
}

impl DownloadOutcome {
	pub fn is_ok(&self) -> bool {
		self.status.is_ok()
	}
}

struct OpenFile {
	writer: Box<dyn DownloadWriter>,
	remaining: u64,
}

/// Drives one download call from request to terminal status
pub struct ClientHandler<'a> {
	request: DownloadRequest,
	factory: &'a dyn WriterFactory,
	cancel: CancellationToken,
	state: ClientState,
	current: Option<OpenFile>,
	bytes_received: u64,
	chunks_received: u64,
	files: Vec<ReceivedFile>,
}

impl<'a> ClientHandler<'a> {
	pub fn new(
		request: DownloadRequest,
		factory: &'a dyn WriterFactory,
		cancel: CancellationToken,
	) -> Self {
		Self {
			request,
			factory,
			cancel,
			state: ClientState::NewCall,
			current: None,
			bytes_received: 0,
			chunks_received: 0,
			files: Vec::new(),
		}
	}

	pub fn state(&self) -> ClientState {
		self.state
	}

	fn set_state(&mut self, state: ClientState) {
		if self.state != state {
			debug!("[download {}] {} -> {}", self.request.name, self.state, state);
			self.state = state;
		}
	}

	/// Run the call against the server at `addr`
	///
	/// Only a failure to start the call is returned as an error; everything
	/// after that ends up in the outcome's status.
	pub async fn run(mut self, addr: &str) -> Result<DownloadOutcome, ClientError> {
		let mut call = ClientCall::start(addr, &self.request, self.cancel.clone()).await?;
		self.set_state(ClientState::SendingRequest);
		debug!("Requested {} from {}", self.request.name, addr);
		self.set_state(ClientState::ExpectingHeader);

		while let Some(response) = call.read().await {
			if let Err(e) = self.process(response).await {
				warn!("Download processing error: {}", e);
				call.cancel();
			}
		}

		self.close_current().await;
		let status = call.finish().await;
		self.set_state(ClientState::CallComplete);

		let outcome = DownloadOutcome {
			status,
			bytes_received: self.bytes_received,
			chunks_received: self.chunks_received,
			files: self.files,
		};
		report(&self.request.name, &outcome);
		Ok(outcome)
	}

	async fn process(&mut self, response: DownloadResponse) -> Result<(), ClientError> {
		match (self.state, response) {
			(ClientState::ExpectingHeader | ClientState::ReceivingFile, DownloadResponse::Header(header)) => {
				self.open_file(header).await
			}
			(ClientState::ReceivingFile, DownloadResponse::Chunk(chunk)) => self.write_chunk(chunk).await,
			(ClientState::ExpectingHeader, DownloadResponse::Chunk(_)) => {
				Err(ClientError::UnexpectedMessage { expected: "file header" })
			}
			(state, _) => Err(ProtocolError::ProtocolViolation(format!(
				"message received in state {}",
				state
			))
			.into()),
		}
	}

	async fn open_file(&mut self, header: FileHeader) -> Result<(), ClientError> {
		self.close_current().await;
		info!("Receiving {} ({} bytes)", header.name, header.size);

		let writer = self.factory.create(&header.name, header.size).await?;
		self.files.push(ReceivedFile { name: header.name, size: header.size, received: 0 });

		if header.size == 0 {
			let mut writer = writer;
			writer.finish().await?;
			self.set_state(ClientState::ExpectingHeader);
		} else {
			self.current = Some(OpenFile { writer, remaining: header.size });
			self.set_state(ClientState::ReceivingFile);
		}
		Ok(())
	}

	async fn write_chunk(&mut self, chunk: FileChunk) -> Result<(), ClientError> {
		self.chunks_received += 1;
		if chunk.is_empty() {
			debug!("Dropping empty chunk");
			return Ok(());
		}

		let len = chunk.len() as u64;
		let file = self
			.current
			.as_mut()
			.ok_or(ClientError::UnexpectedMessage { expected: "file header" })?;
		if len > file.remaining {
			return Err(ProtocolError::ProtocolViolation(format!(
				"chunk of {} bytes exceeds the {} bytes left in the file",
				len, file.remaining
			))
			.into());
		}

		file.writer.write(&chunk.data).await?;
		file.remaining -= len;
		self.bytes_received += len;
		if let Some(received) = self.files.last_mut() {
			received.received += len;
		}
		Ok(())
	}

	async fn close_current(&mut self) {
		if let Some(mut file) = self.current.take() {
			if let Err(e) = file.writer.finish().await {
				warn!("Cannot finish file: {}", e);
			}
		}
	}
}

fn report(name: &str, outcome: &DownloadOutcome) {
	match outcome.status.code() {
		StatusCode::Ok => info!(
			"Download of {} finished: {} bytes in {} file(s)",
			name,
			outcome.bytes_received,
			outcome.files.len()
		),
		StatusCode::Cancelled => warn!("Download of {} cancelled: {}", name, outcome.status.message()),
		_ => error!("Download of {} failed: {}", name, outcome.status),
	}
}

// vim: ts=4
