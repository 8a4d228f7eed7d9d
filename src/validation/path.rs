//! Path validation functions

use std::path::{Component, Path};

use super::ValidationError;

/// Check that a path has no parent directory references
pub fn is_path_safe(path: &Path) -> bool {
	!path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Check if path is within a root directory
///
/// Both paths are expected to be canonical; this is a plain prefix test.
pub fn is_path_within_root(path: &Path, root: &Path) -> bool {
	path.starts_with(root)
}

/// Validate a name sent in a download request
///
/// The name is resolved against the served root, so it must be relative and
/// must not climb out of the root with `..`. An empty name denotes the root.
pub fn validate_request_name(name: &str) -> Result<(), ValidationError> {
	let path = Path::new(name);
	if path.is_absolute() || path.has_root() {
		return Err(ValidationError::PathError(format!(
			"Request name must be relative, got {:?}",
			name
		)));
	}
	if !is_path_safe(path) {
		return Err(ValidationError::PathError(format!(
			"Request name contains parent directory reference (..): {:?}",
			name
		)));
	}
	Ok(())
}

/// Validate a file name announced in a download header
///
/// Received files are materialized directly inside the destination directory,
/// so the name must be exactly one normal path component.
pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
	let mut components = Path::new(name).components();
	match (components.next(), components.next()) {
		(Some(Component::Normal(_)), None) => Ok(()),
		_ => Err(ValidationError::PathError(format!("Not a plain file name: {:?}", name))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_path_safe() {
		assert!(is_path_safe(Path::new("dir/file.txt")));
		assert!(!is_path_safe(Path::new("dir/../file.txt")));
	}

	#[test]
	fn test_is_path_within_root() {
		let root = Path::new("/srv/files");
		assert!(is_path_within_root(Path::new("/srv/files/a/b.txt"), root));
		assert!(is_path_within_root(root, root));
		assert!(!is_path_within_root(Path::new("/srv/filesystem"), root));
		assert!(!is_path_within_root(Path::new("/etc/passwd"), root));
	}

	#[test]
	fn test_validate_request_name() {
		assert!(validate_request_name("docs").is_ok());
		assert!(validate_request_name("docs/2024").is_ok());
		assert!(validate_request_name("").is_ok());
		assert!(validate_request_name("/etc").is_err());
		let err = validate_request_name("../secret").unwrap_err();
		assert!(err.to_string().contains("parent directory"));
	}

	#[test]
	fn test_validate_file_name() {
		assert!(validate_file_name("report.pdf").is_ok());
		assert!(validate_file_name("").is_err());
		assert!(validate_file_name("a/b").is_err());
		assert!(validate_file_name("..").is_err());
		assert!(validate_file_name("/abs").is_err());
	}
}

// vim: ts=4
