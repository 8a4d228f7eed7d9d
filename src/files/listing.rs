//! Directory enumeration

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as afs;

use crate::error::FileError;
use crate::logging::*;

/// List the regular files of `dir`, sorted by path
///
/// The result is a snapshot: files created or removed afterwards are not seen.
/// Symlinks are followed, so a link to a regular file is listed; entries that
/// vanish or cannot be inspected while scanning are skipped.
pub async fn list_regular_files(dir: &Path) -> Result<VecDeque<PathBuf>, FileError> {
	let mut entries = afs::read_dir(dir).await.map_err(|e| match e.kind() {
		io::ErrorKind::NotFound => FileError::NotManaged { path: dir.to_path_buf() },
		_ => FileError::io(dir, e),
	})?;

	let mut files = Vec::new();
	while let Some(entry) = entries.next_entry().await.map_err(|e| FileError::io(dir, e))? {
		let path = entry.path();
		match afs::metadata(&path).await {
			Ok(meta) if meta.is_file() => files.push(path),
			Ok(_) => {}
			Err(e) => {
				debug!("Skipping {} while listing: {}", path.display(), e);
			}
		}
	}

	files.sort();
	Ok(files.into())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_lists_only_regular_files_sorted() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("b.txt"), b"b").unwrap();
		fs::write(dir.path().join("a.txt"), b"a").unwrap();
		fs::write(dir.path().join("C.txt"), b"c").unwrap();
		fs::create_dir(dir.path().join("sub")).unwrap();
		fs::write(dir.path().join("sub/nested.txt"), b"n").unwrap();

		let files = list_regular_files(dir.path()).await.unwrap();
		let names: Vec<_> = files
			.iter()
			.map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
			.collect();
		assert_eq!(names, vec!["C.txt", "a.txt", "b.txt"]);
	}

	#[tokio::test]
	async fn test_empty_directory() {
		let dir = TempDir::new().unwrap();
		assert!(list_regular_files(dir.path()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_missing_directory_is_not_managed() {
		let dir = TempDir::new().unwrap();
		let result = list_regular_files(&dir.path().join("missing")).await;
		assert!(matches!(result, Err(FileError::NotManaged { .. })));
	}

	#[tokio::test]
	async fn test_file_instead_of_directory_is_io_error() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("plain.txt");
		fs::write(&file, b"x").unwrap();
		assert!(matches!(list_regular_files(&file).await, Err(FileError::Io { .. })));
	}
}

// vim: ts=4
