//! Path lock table shared by every open reader and writer
//!
//! Readers share a path, a writer holds it alone. A lock lives exactly as long as
//! its [`LockGuard`], so it is released on every exit path of the owner,
//! including early returns and task cancellation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::FileError;
use crate::logging::*;

/// How a path is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
	Read,
	Write,
}

#[derive(Debug, Default)]
struct LockState {
	readers: usize,
	writer: bool,
}

impl LockState {
	fn is_free(&self) -> bool {
		self.readers == 0 && !self.writer
	}
}

/// Table of locked paths, keyed by canonical path
#[derive(Debug, Clone, Default)]
pub struct LockTable {
	inner: Arc<Mutex<HashMap<PathBuf, LockState>>>,
}

impl LockTable {
	pub fn new() -> Self {
		Self::default()
	}

	fn table(&self) -> MutexGuard<'_, HashMap<PathBuf, LockState>> {
		// A panic while holding the table cannot leave a half-applied update
		self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Acquire `path` in `mode`, failing immediately on contention
	pub fn acquire(&self, path: &Path, mode: LockMode) -> Result<LockGuard, FileError> {
		let mut table = self.table();
		let state = table.entry(path.to_path_buf()).or_default();

		let granted = match mode {
			LockMode::Read => !state.writer,
			LockMode::Write => state.is_free(),
		};
		if !granted {
			debug!("Lock contention on {} ({:?} requested)", path.display(), mode);
			return Err(FileError::Locked { path: path.to_path_buf() });
		}

		match mode {
			LockMode::Read => state.readers += 1,
			LockMode::Write => state.writer = true,
		}

		Ok(LockGuard { table: self.clone(), path: path.to_path_buf(), mode })
	}

	fn release(&self, path: &Path, mode: LockMode) {
		let mut table = self.table();
		if let Some(state) = table.get_mut(path) {
			match mode {
				LockMode::Read => state.readers = state.readers.saturating_sub(1),
				LockMode::Write => state.writer = false,
			}
			if state.is_free() {
				table.remove(path);
			}
		}
	}

	/// Whether any reader or writer currently holds `path`
	pub fn is_locked(&self, path: &Path) -> bool {
		self.table().get(path).map(|state| !state.is_free()).unwrap_or(false)
	}

	/// Number of paths currently held
	pub fn len(&self) -> usize {
		self.table().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Held lock on one path; released on drop
#[derive(Debug)]
pub struct LockGuard {
	table: LockTable,
	path: PathBuf,
	mode: LockMode,
}

impl LockGuard {
	pub fn mode(&self) -> LockMode {
		self.mode
	}
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		self.table.release(&self.path, self.mode);
	}
}


// vim: ts=4
