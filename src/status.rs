//! Terminal call statuses and their mapping from file errors

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FileError;

/// Status code a download call finishes with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
	#[serde(rename = "OK")]
	Ok,
	Cancelled,
	FileNotFound,
	FileLocked,
	#[serde(rename = "FileIOError")]
	FileIoError,
	FileNameEmpty,
	UnknownError,
}

impl StatusCode {
	/// Message used when a status carries no text of its own
	pub fn default_message(&self) -> &'static str {
		match self {
			StatusCode::Ok => "",
			StatusCode::Cancelled => "Call cancelled",
			StatusCode::FileNotFound => "File not found",
			StatusCode::FileLocked => "File is locked",
			StatusCode::FileIoError => "File I/O error",
			StatusCode::FileNameEmpty => "No file to download",
			StatusCode::UnknownError => "Unknown error",
		}
	}
}

impl fmt::Display for StatusCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			StatusCode::Ok => "OK",
			StatusCode::Cancelled => "Cancelled",
			StatusCode::FileNotFound => "FileNotFound",
			StatusCode::FileLocked => "FileLocked",
			StatusCode::FileIoError => "FileIOError",
			StatusCode::FileNameEmpty => "FileNameEmpty",
			StatusCode::UnknownError => "UnknownError",
		};
		write!(f, "{}", name)
	}
}

/// Terminal status of a call: a code plus a human readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
	code: StatusCode,
	message: String,
}

impl Status {
	pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
		Self { code, message: message.into() }
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::Ok, "")
	}

	pub fn cancelled(message: impl Into<String>) -> Self {
		Self::new(StatusCode::Cancelled, message)
	}

	/// The listing was exhausted before a single file was queued
	pub fn file_name_empty() -> Self {
		Self::new(StatusCode::FileNameEmpty, StatusCode::FileNameEmpty.default_message())
	}

	pub fn unknown(message: impl Into<String>) -> Self {
		Self::new(StatusCode::UnknownError, message)
	}

	pub fn code(&self) -> StatusCode {
		self.code
	}

	/// Status text, falling back to the code's default message
	pub fn message(&self) -> &str {
		if self.message.is_empty() {
			self.code.default_message()
		} else {
			&self.message
		}
	}

	pub fn is_ok(&self) -> bool {
		self.code == StatusCode::Ok
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_ok() {
			write!(f, "{}", self.code)
		} else {
			write!(f, "{}: {}", self.code, self.message())
		}
	}
}

/// Wire status for a file failure
///
/// Only the code's fixed message goes to the client. Server paths stay in the
/// server's log.
impl From<&FileError> for Status {
	fn from(e: &FileError) -> Self {
		let code = match e {
			FileError::NotManaged { .. } => StatusCode::FileNotFound,
			FileError::Locked { .. } => StatusCode::FileLocked,
			FileError::Io { .. } => StatusCode::FileIoError,
			FileError::Unknown { .. } => StatusCode::UnknownError,
		};
		Status::new(code, code.default_message())
	}
}


// vim: ts=4
