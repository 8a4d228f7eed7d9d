//! Chunked reads from a locked file

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::lock::LockGuard;
use crate::error::FileError;

/// Open file holding a read lock on its path
#[derive(Debug)]
pub struct FileReader {
	file: File,
	path: PathBuf,
	size: u64,
	_lock: LockGuard,
}

impl FileReader {
	pub(crate) fn new(file: File, path: PathBuf, size: u64, lock: LockGuard) -> Self {
		Self { file, path, size, _lock: lock }
	}

	/// File size captured when the file was opened
	pub fn size(&self) -> u64 {
		self.size
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Fill `buf` from the current position
	///
	/// Returns the number of bytes read, which is short of `buf.len()` only at
	/// end of file.
	pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
		let mut filled = 0;
		while filled < buf.len() {
			let n = self
				.file
				.read(&mut buf[filled..])
				.await
				.map_err(|e| FileError::io(&self.path, e))?;
			if n == 0 {
				break;
			}
			filled += n;
		}
		Ok(filled)
	}
}

// vim: ts=4
