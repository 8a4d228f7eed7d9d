//! Protocol error types

use std::fmt;
use std::io;

/// Wire protocol error type
#[derive(Debug)]
pub enum ProtocolError {
	/// I/O error from async operations
	Io(io::Error),
	/// Control line is not valid JSON for any known frame
	Json(String),
	/// Frame exceeds the allowed size
	FrameTooLarge { len: u64, max: u64 },
	/// Protocol violation (unexpected format or state)
	ProtocolViolation(String),
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
			ProtocolError::Json(msg) => write!(f, "JSON parse error: {}", msg),
			ProtocolError::FrameTooLarge { len, max } => {
				write!(f, "Frame too large: {} bytes (max {})", len, max)
			}
			ProtocolError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
		}
	}
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
	fn from(e: io::Error) -> Self {
		ProtocolError::Io(e)
	}
}

impl From<serde_json::Error> for ProtocolError {
	fn from(e: serde_json::Error) -> Self {
		ProtocolError::Json(e.to_string())
	}
}

// vim: ts=4
