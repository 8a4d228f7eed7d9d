//! Configuration validation functions

use super::ValidationError;
use crate::protocol::MAX_CHUNK_LEN;

/// Validate the server's chunk size settings
///
/// The default must be non-zero and must not exceed the maximum, and the maximum
/// must fit in a single chunk frame.
pub fn validate_chunk_sizes(default_size: u64, max_size: u64) -> Result<(), ValidationError> {
	if default_size == 0 {
		return Err(ValidationError::ConfigError(
			"Default chunk size must be greater than 0".to_string(),
		));
	}
	if default_size > max_size {
		return Err(ValidationError::ConfigError(format!(
			"Default chunk size {} exceeds maximum chunk size {}",
			default_size, max_size
		)));
	}
	if max_size > MAX_CHUNK_LEN {
		return Err(ValidationError::ConfigError(format!(
			"Maximum chunk size {} exceeds frame limit {}",
			max_size, MAX_CHUNK_LEN
		)));
	}
	Ok(())
}

/// Validate a client-requested chunk size (0 selects the server default)
pub fn validate_requested_chunk_size(size: u64) -> Result<(), ValidationError> {
	if size > MAX_CHUNK_LEN {
		return Err(ValidationError::ConfigError(format!(
			"Chunk size too large: {} (max {})",
			size, MAX_CHUNK_LEN
		)));
	}
	Ok(())
}

/// Validate a `host:port` address string
pub fn validate_address(addr: &str) -> Result<(), ValidationError> {
	let trimmed = addr.trim();
	if trimmed.is_empty() {
		return Err(ValidationError::ConfigError("Address must not be empty".to_string()));
	}
	match trimmed.rsplit_once(':') {
		Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
		_ => Err(ValidationError::ConfigError(format!(
			"Address must be host:port, got {:?}",
			addr
		))),
	}
}


// vim: ts=4
