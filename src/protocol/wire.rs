//! Wire framing for download calls
//!
//! # Wire format
//!
//! Every frame starts with a single-line JSON control object tagged by `cmd`.
//! Chunk payloads follow their control line as raw bytes.
//!
//! ```text
//! client -> server   {"cmd":"DOWNLOAD","name":"docs","chunkSize":0}
//!                    {"cmd":"CANCEL"}
//! server -> client   {"cmd":"HDR","name":"a.txt","size":10}
//!                    {"cmd":"CHK","len":4}\n<4 raw bytes>
//!                    {"cmd":"END","code":"OK","msg":""}
//! ```

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::ProtocolError;
use super::messages::{DownloadRequest, DownloadResponse, FileChunk, FileHeader};
use crate::status::{Status, StatusCode};

/// Longest accepted control line, newline included
pub const MAX_CONTROL_LINE: u64 = 64 * 1024;

/// Largest chunk payload a frame may carry
pub const MAX_CHUNK_LEN: u64 = 64 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "cmd")]
enum ControlFrame {
	#[serde(rename = "DOWNLOAD")]
	Download {
		name: String,
		#[serde(rename = "chunkSize", default)]
		chunk_size: u64,
	},
	#[serde(rename = "CANCEL")]
	Cancel,
	#[serde(rename = "HDR")]
	Header { name: String, size: u64 },
	#[serde(rename = "CHK")]
	Chunk { len: u64 },
	#[serde(rename = "END")]
	End {
		code: StatusCode,
		#[serde(default)]
		msg: String,
	},
}

/// One unit on the wire, in either direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
	/// Opens the call (client to server, first frame)
	Request(DownloadRequest),
	/// Client gives up on the call
	Cancel,
	/// Header or chunk (server to client)
	Response(DownloadResponse),
	/// Terminal status (server to client, last frame)
	End(Status),
}

/// Writes one frame and flushes the writer
pub async fn write_frame<W: AsyncWrite + Unpin>(
	writer: &mut W,
	frame: &Frame,
) -> Result<(), ProtocolError> {
	let (control, payload) = match frame {
		Frame::Request(request) => (
			ControlFrame::Download { name: request.name.clone(), chunk_size: request.chunk_size },
			None,
		),
		Frame::Cancel => (ControlFrame::Cancel, None),
		Frame::Response(DownloadResponse::Header(header)) => {
			(ControlFrame::Header { name: header.name.clone(), size: header.size }, None)
		}
		Frame::Response(DownloadResponse::Chunk(chunk)) => {
			(ControlFrame::Chunk { len: chunk.data.len() as u64 }, Some(chunk.data.as_slice()))
		}
		Frame::End(status) => (
			ControlFrame::End { code: status.code(), msg: status.message().to_string() },
			None,
		),
	};

	if let Some(data) = payload {
		let len = data.len() as u64;
		if len > MAX_CHUNK_LEN {
			return Err(ProtocolError::FrameTooLarge { len, max: MAX_CHUNK_LEN });
		}
	}

	let mut line = serde_json::to_string(&control)?;
	line.push('\n');
	writer.write_all(line.as_bytes()).await?;
	if let Some(data) = payload {
		writer.write_all(data).await?;
	}
	writer.flush().await?;
	Ok(())
}

/// Reads the next frame
///
/// Returns `None` on a clean end of stream (EOF between frames).
pub async fn read_frame<R: AsyncBufRead + Unpin>(
	reader: &mut R,
) -> Result<Option<Frame>, ProtocolError> {
	let mut line = String::new();

	let control = loop {
		line.clear();
		let n = (&mut *reader).take(MAX_CONTROL_LINE).read_line(&mut line).await?;
		if n == 0 {
			return Ok(None);
		}
		if !line.ends_with('\n') {
			if n as u64 >= MAX_CONTROL_LINE {
				return Err(ProtocolError::FrameTooLarge { len: n as u64, max: MAX_CONTROL_LINE });
			}
			return Err(ProtocolError::ProtocolViolation(
				"stream ended inside a control line".to_string(),
			));
		}

		let trimmed = line.trim();
		// Skip empty lines
		if trimmed.is_empty() {
			continue;
		}
		break serde_json::from_str::<ControlFrame>(trimmed)?;
	};

	let frame = match control {
		ControlFrame::Download { name, chunk_size } => {
			Frame::Request(DownloadRequest { name, chunk_size })
		}
		ControlFrame::Cancel => Frame::Cancel,
		ControlFrame::Header { name, size } => {
			Frame::Response(DownloadResponse::Header(FileHeader { name, size }))
		}
		ControlFrame::Chunk { len } => {
			if len > MAX_CHUNK_LEN {
				return Err(ProtocolError::FrameTooLarge { len, max: MAX_CHUNK_LEN });
			}
			let mut data = vec![0u8; len as usize];
			reader.read_exact(&mut data).await?;
			Frame::Response(DownloadResponse::Chunk(FileChunk { data }))
		}
		ControlFrame::End { code, msg } => Frame::End(Status::new(code, msg)),
	};

	Ok(Some(frame))
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn encode(frames: &[Frame]) -> Vec<u8> {
		let mut buf = Vec::new();
		for frame in frames {
			write_frame(&mut buf, frame).await.unwrap();
		}
		buf
	}

	#[tokio::test]
	async fn test_response_stream_decodes_in_order() {
		let frames = vec![
			Frame::Response(DownloadResponse::header("a.bin", 5)),
			Frame::Response(DownloadResponse::chunk(vec![0, 10, 13, 255, 1])),
			Frame::End(Status::ok()),
		];
		let buf = encode(&frames).await;

		let mut reader = buf.as_slice();
		let mut decoded = Vec::new();
		while let Some(frame) = read_frame(&mut reader).await.unwrap() {
			decoded.push(frame);
		}
		assert_eq!(decoded, frames);
	}

	#[tokio::test]
	async fn test_control_line_format() {
		let buf = encode(&[Frame::Request(DownloadRequest {
			name: "docs".to_string(),
			chunk_size: 0,
		})])
		.await;
		assert_eq!(
			String::from_utf8(buf).unwrap(),
			"{\"cmd\":\"DOWNLOAD\",\"name\":\"docs\",\"chunkSize\":0}\n"
		);

		let buf = encode(&[Frame::End(Status::file_name_empty())]).await;
		let text = String::from_utf8(buf).unwrap();
		assert!(text.starts_with("{\"cmd\":\"END\",\"code\":\"FileNameEmpty\""));
	}

	#[tokio::test]
	async fn test_empty_chunk_frame() {
		let buf = encode(&[Frame::Response(DownloadResponse::chunk(Vec::new()))]).await;
		let mut reader = buf.as_slice();
		let frame = read_frame(&mut reader).await.unwrap();
		assert_eq!(frame, Some(Frame::Response(DownloadResponse::chunk(Vec::new()))));
		assert_eq!(read_frame(&mut reader).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_missing_chunk_size_defaults_to_zero() {
		let mut reader: &[u8] = b"{\"cmd\":\"DOWNLOAD\",\"name\":\"x\"}\n";
		let frame = read_frame(&mut reader).await.unwrap();
		assert_eq!(
			frame,
			Some(Frame::Request(DownloadRequest { name: "x".to_string(), chunk_size: 0 }))
		);
	}

	#[tokio::test]
	async fn test_oversized_chunk_rejected() {
		let line = format!("{{\"cmd\":\"CHK\",\"len\":{}}}\n", MAX_CHUNK_LEN + 1);
		let mut reader = line.as_bytes();
		match read_frame(&mut reader).await {
			Err(ProtocolError::FrameTooLarge { len, .. }) => assert_eq!(len, MAX_CHUNK_LEN + 1),
			other => panic!("expected FrameTooLarge, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_truncated_payload_is_an_error() {
		let mut reader: &[u8] = b"{\"cmd\":\"CHK\",\"len\":8}\nabc";
		assert!(matches!(read_frame(&mut reader).await, Err(ProtocolError::Io(_))));

		let mut reader: &[u8] = b"{\"cmd\":\"HDR\",\"na";
		assert!(matches!(
			read_frame(&mut reader).await,
			Err(ProtocolError::ProtocolViolation(_))
		));
	}

	#[tokio::test]
	async fn test_unknown_command_rejected() {
		let mut reader: &[u8] = b"{\"cmd\":\"UPLOAD\",\"name\":\"x\"}\n";
		assert!(matches!(read_frame(&mut reader).await, Err(ProtocolError::Json(_))));
	}
}

// vim: ts=4
