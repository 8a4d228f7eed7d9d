//! Error types for filexchange operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::protocol::ProtocolError;
use crate::status::Status;
use crate::validation::ValidationError;

/// Failure raised by the file-access layer
#[derive(Debug)]
pub enum FileError {
	/// Path does not exist or lies outside the served root
	NotManaged { path: PathBuf },

	/// Path is held by a conflicting reader or writer
	Locked { path: PathBuf },

	/// Open, read, write or enumerate failure
	Io { path: PathBuf, source: io::Error },

	/// Anything else, including broken invariants
	Unknown { message: String },
}

impl FileError {
	pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		FileError::Io { path: path.into(), source }
	}

	pub fn unknown(message: impl Into<String>) -> Self {
		FileError::Unknown { message: message.into() }
	}
}

impl fmt::Display for FileError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FileError::NotManaged { path } => {
				write!(f, "File is not managed: {}", path.display())
			}
			FileError::Locked { path } => write!(f, "File is locked: {}", path.display()),
			FileError::Io { path, source } => {
				write!(f, "I/O error on {}: {}", path.display(), source)
			}
			FileError::Unknown { message } => write!(f, "{}", message),
		}
	}
}

impl Error for FileError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			FileError::Io { source, .. } => Some(source),
			_ => None,
		}
	}
}

/// Why a server call stopped before (or instead of) finishing normally
#[derive(Debug)]
pub enum CallError {
	/// Call was cancelled, the peer went away or the server is shutting down
	Aborted { reason: String },

	/// Accepting the next connection failed
	Accept(io::Error),

	/// A file operation failed while the call was being processed
	File(FileError),

	/// The request is rejected with this terminal status
	Rejected(Status),
}

impl CallError {
	pub fn aborted(reason: impl Into<String>) -> Self {
		CallError::Aborted { reason: reason.into() }
	}
}

impl fmt::Display for CallError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CallError::Aborted { reason } => write!(f, "Call aborted: {}", reason),
			CallError::Accept(e) => write!(f, "Accept failed: {}", e),
			CallError::File(e) => write!(f, "{}", e),
			CallError::Rejected(status) => write!(f, "Request rejected: {}", status),
		}
	}
}

impl Error for CallError {}

impl From<FileError> for CallError {
	fn from(e: FileError) -> Self {
		CallError::File(e)
	}
}

/// Handler registry errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
	/// Shutdown has begun, no new handlers are armed
	ShuttingDown,

	/// Called outside of a tokio runtime
	NoRuntime,
}

impl fmt::Display for ManagerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ManagerError::ShuttingDown => write!(f, "Handler manager is shutting down"),
			ManagerError::NoRuntime => write!(f, "No tokio runtime available to run handler"),
		}
	}
}

impl Error for ManagerError {}

/// Server startup errors
#[derive(Debug)]
pub enum ServerError {
	/// Failed to bind the listening socket
	Bind { addr: String, source: io::Error },

	/// Served root is unusable
	Files(FileError),

	/// Could not arm the first handler
	Manager(ManagerError),
}

impl fmt::Display for ServerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ServerError::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
			ServerError::Files(e) => write!(f, "Invalid served root: {}", e),
			ServerError::Manager(e) => write!(f, "Failed to arm handler: {}", e),
		}
	}
}

impl Error for ServerError {}

impl From<FileError> for ServerError {
	fn from(e: FileError) -> Self {
		ServerError::Files(e)
	}
}

impl From<ManagerError> for ServerError {
	fn from(e: ManagerError) -> Self {
		ServerError::Manager(e)
	}
}

/// Client-side download errors
#[derive(Debug)]
pub enum ClientError {
	/// Could not connect to the server
	Connect { addr: String, source: io::Error },

	/// Download was cancelled before the call started
	Cancelled,

	/// Wire protocol failure
	Protocol(ProtocolError),

	/// Server sent a message that is not valid in the current state
	UnexpectedMessage { expected: &'static str },

	/// Destination writer failure
	File(FileError),
}

impl fmt::Display for ClientError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ClientError::Connect { addr, source } => {
				write!(f, "Failed to connect to {}: {}", addr, source)
			}
			ClientError::Cancelled => write!(f, "Download cancelled"),
			ClientError::Protocol(e) => write!(f, "{}", e),
			ClientError::UnexpectedMessage { expected } => write!(f, "{} expected", expected),
			ClientError::File(e) => write!(f, "{}", e),
		}
	}
}

impl Error for ClientError {}

impl From<ProtocolError> for ClientError {
	fn from(e: ProtocolError) -> Self {
		ClientError::Protocol(e)
	}
}

impl From<FileError> for ClientError {
	fn from(e: FileError) -> Self {
		ClientError::File(e)
	}
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
	/// Config file could not be read
	Read { path: PathBuf, source: io::Error },

	/// Config file could not be parsed
	Parse { path: PathBuf, message: String },

	/// Environment variable holds an unusable value
	Env { name: String, value: String },

	/// Configuration failed validation
	Invalid(ValidationError),
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Read { path, source } => {
				write!(f, "Cannot read config {}: {}", path.display(), source)
			}
			ConfigError::Parse { path, message } => {
				write!(f, "Cannot parse config {}: {}", path.display(), message)
			}
			ConfigError::Env { name, value } => write!(f, "Invalid value for {}: {:?}", name, value),
			ConfigError::Invalid(e) => write!(f, "{}", e),
		}
	}
}

impl Error for ConfigError {}

impl From<ValidationError> for ConfigError {
	fn from(e: ValidationError) -> Self {
		ConfigError::Invalid(e)
	}
}

// vim: ts=4
