//! Sequential writes to a locked file

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::lock::LockGuard;
use crate::error::FileError;

/// Created file holding the write lock on its path
#[derive(Debug)]
pub struct FileWriter {
	file: File,
	path: PathBuf,
	expected_size: u64,
	written: u64,
	_lock: LockGuard,
}

impl FileWriter {
	pub(crate) fn new(file: File, path: PathBuf, expected_size: u64, lock: LockGuard) -> Self {
		Self { file, path, expected_size, written: 0, _lock: lock }
	}

	/// Append `data` and wait until it has reached the file
	pub async fn write(&mut self, data: &[u8]) -> Result<(), FileError> {
		self.file.write_all(data).await.map_err(|e| FileError::io(&self.path, e))?;
		// tokio's File completes writes in the background; flush waits for them
		self.file.flush().await.map_err(|e| FileError::io(&self.path, e))?;
		self.written += data.len() as u64;
		Ok(())
	}

	/// Flush file contents and metadata to disk
	pub async fn sync(&mut self) -> Result<(), FileError> {
		self.file.sync_all().await.map_err(|e| FileError::io(&self.path, e))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Size announced when the writer was opened
	pub fn expected_size(&self) -> u64 {
		self.expected_size
	}

	/// Bytes written so far
	pub fn written(&self) -> u64 {
		self.written
	}

	pub fn is_complete(&self) -> bool {
		self.written == self.expected_size
	}
}

// vim: ts=4
