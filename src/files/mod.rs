//! File-access layer
//!
//! Resolves names against a served root, hands out locked readers and writers,
//! and enumerates directories. The lock table is shared by every clone of a
//! [`FileManager`], so all handlers of a server see the same locks.

pub mod listing;
pub mod lock;
pub mod reader;
pub mod writer;

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as afs;

use crate::error::FileError;
use crate::logging::*;
use crate::validation::{is_path_safe, is_path_within_root, validate_request_name};

pub use listing::list_regular_files;
pub use lock::{LockGuard, LockMode, LockTable};
pub use reader::FileReader;
pub use writer::FileWriter;

fn not_found_or_io(path: &Path, e: io::Error) -> FileError {
	match e.kind() {
		io::ErrorKind::NotFound => FileError::NotManaged { path: path.to_path_buf() },
		_ => FileError::io(path, e),
	}
}

/// Entry point of the file-access layer for one served root
#[derive(Debug, Clone)]
pub struct FileManager {
	root: PathBuf,
	locks: LockTable,
}

impl FileManager {
	/// Manage the files below `root`, which must be an existing directory
	pub fn new(root: impl AsRef<Path>) -> Result<Self, FileError> {
		let root = root.as_ref();
		let canonical = std::fs::canonicalize(root).map_err(|e| not_found_or_io(root, e))?;
		if !canonical.is_dir() {
			return Err(FileError::io(
				root,
				io::Error::new(io::ErrorKind::Other, "served root is not a directory"),
			));
		}
		Ok(Self { root: canonical, locks: LockTable::new() })
	}

	/// Canonical served root
	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn locks(&self) -> &LockTable {
		&self.locks
	}

	fn join_root(&self, path: &Path) -> Result<PathBuf, FileError> {
		if !is_path_safe(path) {
			return Err(FileError::NotManaged { path: path.to_path_buf() });
		}
		if path.is_absolute() {
			Ok(path.to_path_buf())
		} else {
			Ok(self.root.join(path))
		}
	}

	/// Canonical form of an existing path inside the root
	pub async fn resolve(&self, path: &Path) -> Result<PathBuf, FileError> {
		let candidate = self.join_root(path)?;
		let canonical =
			afs::canonicalize(&candidate).await.map_err(|e| not_found_or_io(&candidate, e))?;
		if !is_path_within_root(&canonical, &self.root) {
			debug!("{} resolves outside of {}", candidate.display(), self.root.display());
			return Err(FileError::NotManaged { path: path.to_path_buf() });
		}
		Ok(canonical)
	}

	/// Resolve a name received in a download request
	pub async fn resolve_request(&self, name: &str) -> Result<PathBuf, FileError> {
		if let Err(e) = validate_request_name(name) {
			debug!("Rejected request name {:?}: {}", name, e);
			return Err(FileError::NotManaged { path: PathBuf::from(name) });
		}
		self.resolve(Path::new(name)).await
	}

	// Target of a write: the file itself may not exist yet, its directory must
	async fn resolve_for_write(&self, path: &Path) -> Result<PathBuf, FileError> {
		let candidate = self.join_root(path)?;
		let not_managed = || FileError::NotManaged { path: path.to_path_buf() };

		let file_name = candidate.file_name().ok_or_else(not_managed)?;
		let parent = candidate.parent().ok_or_else(not_managed)?;
		let parent = afs::canonicalize(parent).await.map_err(|e| not_found_or_io(parent, e))?;
		if !is_path_within_root(&parent, &self.root) {
			return Err(not_managed());
		}

		let target = parent.join(file_name);
		match afs::symlink_metadata(&target).await {
			Ok(meta) if meta.file_type().is_symlink() => self.resolve(&target).await,
			_ => Ok(target),
		}
	}

	/// Ordered list of files to send for a request name
	///
	/// A directory yields its regular files sorted by name, a regular file yields
	/// itself. Directory entries that resolve outside the root are left out. A
	/// missing name is `NotManaged`.
	pub async fn list_files(&self, name: &str) -> Result<VecDeque<PathBuf>, FileError> {
		let path = self.resolve_request(name).await?;
		let meta = afs::metadata(&path).await.map_err(|e| not_found_or_io(&path, e))?;
		if meta.is_file() {
			return Ok(VecDeque::from(vec![path]));
		}

		let mut listing = list_regular_files(&path).await?;
		let mut managed = VecDeque::with_capacity(listing.len());
		while let Some(entry) = listing.pop_front() {
			match afs::canonicalize(&entry).await {
				Ok(canonical) if is_path_within_root(&canonical, &self.root) => managed.push_back(entry),
				Ok(canonical) => {
					debug!("Skipping {}, it resolves to {}", entry.display(), canonical.display())
				}
				Err(e) => debug!("Skipping {} while listing: {}", entry.display(), e),
			}
		}
		Ok(managed)
	}

	/// Open a file for streaming read under a shared lock
	pub async fn open_for_read(&self, path: &Path) -> Result<FileReader, FileError> {
		let canonical = self.resolve(path).await?;
		let lock = self.locks.acquire(&canonical, LockMode::Read)?;

		let file = afs::File::open(&canonical).await.map_err(|e| FileError::io(&canonical, e))?;
		let meta = file.metadata().await.map_err(|e| FileError::io(&canonical, e))?;
		if !meta.is_file() {
			return Err(FileError::io(
				&canonical,
				io::Error::new(io::ErrorKind::Other, "not a regular file"),
			));
		}

		debug!("Opened {} for read ({} bytes)", canonical.display(), meta.len());
		Ok(FileReader::new(file, canonical, meta.len(), lock))
	}

	/// Create (or truncate) a file for writing under the exclusive lock
	pub async fn open_for_write(
		&self,
		path: &Path,
		expected_size: u64,
	) -> Result<FileWriter, FileError> {
		let target = self.resolve_for_write(path).await?;
		let lock = self.locks.acquire(&target, LockMode::Write)?;

		let file = afs::File::create(&target).await.map_err(|e| FileError::io(&target, e))?;

		debug!("Opened {} for write ({} bytes expected)", target.display(), expected_size);
		Ok(FileWriter::new(file, target, expected_size, lock))
	}

	/// Whether `path` (relative to the root, or absolute) is held by anyone
	pub fn is_locked(&self, path: &Path) -> bool {
		let candidate = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };
		let key = std::fs::canonicalize(&candidate).unwrap_or(candidate);
		self.locks.is_locked(&key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	fn setup() -> (TempDir, FileManager) {
		let dir = TempDir::new().unwrap();
		let files = FileManager::new(dir.path()).unwrap();
		(dir, files)
	}

	#[test]
	fn test_missing_root_is_not_managed() {
		let dir = TempDir::new().unwrap();
		let result = FileManager::new(dir.path().join("nope"));
		assert!(matches!(result, Err(FileError::NotManaged { .. })));
	}

	#[tokio::test]
	async fn test_read_in_chunks_with_short_final_read() {
		let (dir, files) = setup();
		fs::write(dir.path().join("data.bin"), b"0123456789").unwrap();

		let mut reader = files.open_for_read(Path::new("data.bin")).await.unwrap();
		assert_eq!(reader.size(), 10);

		let mut buf = [0u8; 4];
		assert_eq!(reader.read(&mut buf).await.unwrap(), 4);
		assert_eq!(&buf, b"0123");
		assert_eq!(reader.read(&mut buf).await.unwrap(), 4);
		assert_eq!(&buf, b"4567");
		assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
		assert_eq!(&buf[..2], b"89");
		assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_open_missing_file_is_not_managed() {
		let (_dir, files) = setup();
		let result = files.open_for_read(Path::new("missing.txt")).await;
		assert!(matches!(result, Err(FileError::NotManaged { .. })));
	}

	#[tokio::test]
	async fn test_read_lock_blocks_writer() {
		let (dir, files) = setup();
		fs::write(dir.path().join("a.txt"), b"abc").unwrap();

		let reader = files.open_for_read(Path::new("a.txt")).await.unwrap();
		assert!(files.is_locked(Path::new("a.txt")));
		let result = files.open_for_write(Path::new("a.txt"), 3).await;
		assert!(matches!(result, Err(FileError::Locked { .. })));

		// A second reader is fine
		let second = files.open_for_read(Path::new("a.txt")).await.unwrap();
		drop(reader);
		drop(second);

		assert!(!files.is_locked(Path::new("a.txt")));
		assert!(files.open_for_write(Path::new("a.txt"), 3).await.is_ok());
	}

	#[tokio::test]
	async fn test_write_lock_blocks_reader_until_dropped() {
		let (_dir, files) = setup();
		let mut writer = files.open_for_write(Path::new("new.txt"), 5).await.unwrap();
		writer.write(b"hello").await.unwrap();
		assert!(writer.is_complete());

		let result = files.open_for_read(Path::new("new.txt")).await;
		assert!(matches!(result, Err(FileError::Locked { .. })));

		drop(writer);
		let mut reader = files.open_for_read(Path::new("new.txt")).await.unwrap();
		let mut buf = vec![0u8; 5];
		reader.read(&mut buf).await.unwrap();
		assert_eq!(buf, b"hello");
	}

	#[tokio::test]
	async fn test_locks_shared_between_clones() {
		let (dir, files) = setup();
		fs::write(dir.path().join("a.txt"), b"abc").unwrap();
		let other = files.clone();

		let _reader = files.open_for_read(Path::new("a.txt")).await.unwrap();
		assert!(matches!(
			other.open_for_write(Path::new("a.txt"), 3).await,
			Err(FileError::Locked { .. })
		));
	}

	#[tokio::test]
	async fn test_traversal_is_not_managed() {
		let (_dir, files) = setup();
		assert!(matches!(
			files.open_for_read(Path::new("../etc/passwd")).await,
			Err(FileError::NotManaged { .. })
		));
		assert!(matches!(files.list_files("/etc").await, Err(FileError::NotManaged { .. })));
		assert!(matches!(files.list_files("a/../..").await, Err(FileError::NotManaged { .. })));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_symlink_outside_root_is_not_managed() {
		let outside = TempDir::new().unwrap();
		fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
		let (dir, files) = setup();
		std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link"))
			.unwrap();

		let result = files.open_for_read(Path::new("link")).await;
		assert!(matches!(result, Err(FileError::NotManaged { .. })));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_listing_skips_symlink_outside_root() {
		let outside = TempDir::new().unwrap();
		fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
		let (dir, files) = setup();
		fs::create_dir(dir.path().join("docs")).unwrap();
		fs::write(dir.path().join("docs/a.txt"), b"a").unwrap();
		fs::write(dir.path().join("shared.txt"), b"s").unwrap();
		std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("docs/leak"))
			.unwrap();
		std::os::unix::fs::symlink(dir.path().join("shared.txt"), dir.path().join("docs/shared"))
			.unwrap();

		let listing = files.list_files("docs").await.unwrap();
		assert_eq!(listing.len(), 2);
		assert!(listing[0].ends_with("docs/a.txt"));
		assert!(listing[1].ends_with("docs/shared"));
	}

	#[tokio::test]
	async fn test_list_files_for_file_and_directory() {
		let (dir, files) = setup();
		fs::create_dir(dir.path().join("docs")).unwrap();
		fs::write(dir.path().join("docs/b.txt"), b"b").unwrap();
		fs::write(dir.path().join("docs/a.txt"), b"a").unwrap();

		let listing = files.list_files("docs").await.unwrap();
		assert_eq!(listing.len(), 2);
		assert!(listing[0].ends_with("a.txt"));
		assert!(listing[1].ends_with("b.txt"));

		let single = files.list_files("docs/b.txt").await.unwrap();
		assert_eq!(single.len(), 1);
		assert!(single[0].ends_with("docs/b.txt"));

		assert!(matches!(files.list_files("nope").await, Err(FileError::NotManaged { .. })));
	}

	#[tokio::test]
	async fn test_open_directory_for_read_is_io_error() {
		let (dir, files) = setup();
		fs::create_dir(dir.path().join("sub")).unwrap();
		let result = files.open_for_read(Path::new("sub")).await;
		assert!(matches!(result, Err(FileError::Io { .. })));
		assert!(!files.is_locked(Path::new("sub")));
	}
}

// vim: ts=4
