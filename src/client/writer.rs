//! Destinations for downloaded files
//!
//! The client core only ever sees a [`WriterFactory`] and the
//! [`DownloadWriter`]s it hands out, one per announced file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::FileError;
use crate::files::{FileManager, FileWriter};
use crate::logging::*;
use crate::validation::validate_file_name;

/// Sink for the chunks of one file
#[async_trait]
pub trait DownloadWriter: Send {
	async fn write(&mut self, data: &[u8]) -> Result<(), FileError>;

	/// Called once the file has been fully received or abandoned
	async fn finish(&mut self) -> Result<(), FileError> {
		Ok(())
	}
}

/// Creates a writer for every file header the server announces
#[async_trait]
pub trait WriterFactory: Send + Sync {
	async fn create(&self, name: &str, size: u64) -> Result<Box<dyn DownloadWriter>, FileError>;
}

#[async_trait]
impl DownloadWriter for FileWriter {
	async fn write(&mut self, data: &[u8]) -> Result<(), FileError> {
		FileWriter::write(self, data).await
	}

	async fn finish(&mut self) -> Result<(), FileError> {
		if !self.is_complete() {
			warn!(
				"{}: received {} of {} bytes",
				self.path().display(),
				self.written(),
				self.expected_size()
			);
		}
		self.sync().await
	}
}

/// Writes every downloaded file into one local directory
///
/// File names from the server must be plain names; anything with a path
/// separator or a parent reference is refused.
#[derive(Debug, Clone)]
pub struct DirectoryWriterFactory {
	files: FileManager,
}

impl DirectoryWriterFactory {
	pub fn new(dir: impl AsRef<Path>) -> Result<Self, FileError> {
		Ok(Self { files: FileManager::new(dir)? })
	}

	pub fn dir(&self) -> &Path {
		self.files.root()
	}
}

#[async_trait]
impl WriterFactory for DirectoryWriterFactory {
	async fn create(&self, name: &str, size: u64) -> Result<Box<dyn DownloadWriter>, FileError> {
		validate_file_name(name).map_err(|e| {
			debug!("Refusing file name {:?}: {}", name, e);
			FileError::NotManaged { path: PathBuf::from(name) }
		})?;
		let writer = self.files.open_for_write(Path::new(name), size).await?;
		debug!("Writing {} to {}", name, writer.path().display());
		Ok(Box::new(writer))
	}
}

/// Keeps downloaded files in memory, keyed by name
///
/// A name announced twice keeps the last contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriterFactory {
	files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryWriterFactory {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
		self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Snapshot of everything received so far
	pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
		self.lock().clone()
	}

	pub fn get(&self, name: &str) -> Option<Vec<u8>> {
		self.lock().get(name).cloned()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

struct MemoryWriter {
	name: String,
	files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

#[async_trait]
impl DownloadWriter for MemoryWriter {
	async fn write(&mut self, data: &[u8]) -> Result<(), FileError> {
		let mut files = self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		files.entry(self.name.clone()).or_default().extend_from_slice(data);
		Ok(())
	}
}

#[async_trait]
impl WriterFactory for MemoryWriterFactory {
	async fn create(&self, name: &str, size: u64) -> Result<Box<dyn DownloadWriter>, FileError> {
		self.lock().insert(name.to_string(), Vec::with_capacity(size.min(1 << 20) as usize));
		Ok(Box::new(MemoryWriter { name: name.to_string(), files: Arc::clone(&self.files) }))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_memory_factory_collects_files() {
		let factory = MemoryWriterFactory::new();
		let mut a = factory.create("a.txt", 5).await.unwrap();
		a.write(b"hel").await.unwrap();
		a.write(b"lo").await.unwrap();
		a.finish().await.unwrap();
		let _empty = factory.create("empty", 0).await.unwrap();

		assert_eq!(factory.len(), 2);
		assert_eq!(factory.get("a.txt").unwrap(), b"hello");
		assert_eq!(factory.get("empty").unwrap(), b"");
	}

	#[tokio::test]
	async fn test_directory_factory_writes_files() {
		let dir = TempDir::new().unwrap();
		let factory = DirectoryWriterFactory::new(dir.path()).unwrap();

		let mut writer = factory.create("out.bin", 3).await.unwrap();
		writer.write(&[1, 2, 3]).await.unwrap();
		writer.finish().await.unwrap();
		drop(writer);

		assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), vec![1, 2, 3]);
	}

	#[tokio::test]
	async fn test_directory_factory_refuses_paths() {
		let dir = TempDir::new().unwrap();
		let factory = DirectoryWriterFactory::new(dir.path()).unwrap();

		for name in ["../escape.txt", "sub/file.txt", "/etc/passwd", ""] {
			let result = factory.create(name, 1).await;
			assert!(matches!(result, Err(FileError::NotManaged { .. })), "{:?} accepted", name);
		}
	}

	#[tokio::test]
	async fn test_directory_factory_holds_write_lock() {
		let dir = TempDir::new().unwrap();
		let factory = DirectoryWriterFactory::new(dir.path()).unwrap();

		let writer = factory.create("busy.txt", 1).await.unwrap();
		assert!(matches!(factory.create("busy.txt", 1).await, Err(FileError::Locked { .. })));
		drop(writer);
		assert!(factory.create("busy.txt", 1).await.is_ok());
	}
}

// vim: ts=4
