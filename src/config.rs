//! Configuration for the server and the client
//!
//! Settings are layered, later layers win:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Config file (`--config FILE` or `$FILEXCHANGE_CONFIG`), TOML or JSON5
//! 3. Environment variables (`FILEXCHANGE_*`)
//! 4. CLI flags, applied by the binary

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::server::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNK_SIZE};
use crate::validation::{
	validate_address, validate_chunk_sizes, validate_requested_chunk_size, ValidationError,
	Validator,
};

pub const DEFAULT_ADDR: &str = "127.0.0.1:55555";

pub const ENV_CONFIG: &str = "FILEXCHANGE_CONFIG";
pub const ENV_LISTEN: &str = "FILEXCHANGE_LISTEN";
pub const ENV_ROOT: &str = "FILEXCHANGE_ROOT";
pub const ENV_SERVER: &str = "FILEXCHANGE_SERVER";
pub const ENV_CHUNK_SIZE: &str = "FILEXCHANGE_CHUNK_SIZE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	pub server: ServerConfig,
	pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
	/// Address the server listens on
	pub listen_addr: String,
	/// Directory whose files are served
	pub root: PathBuf,
	/// Chunk length for requests that ask for 0
	pub default_chunk_size: u64,
	/// Requested chunk lengths are clamped to this
	pub max_chunk_size: u64,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen_addr: DEFAULT_ADDR.to_string(),
			root: PathBuf::from("."),
			default_chunk_size: DEFAULT_CHUNK_SIZE,
			max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
	pub server_addr: String,
	/// Where downloaded files are written
	pub download_dir: PathBuf,
	/// Requested chunk length, 0 for the server default
	pub chunk_size: u64,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self { server_addr: DEFAULT_ADDR.to_string(), download_dir: PathBuf::from("."), chunk_size: 0 }
	}
}

impl Validator for ServerConfig {
	fn validate(&self) -> Result<(), ValidationError> {
		validate_address(&self.listen_addr)?;
		validate_chunk_sizes(self.default_chunk_size, self.max_chunk_size)?;
		if self.root.as_os_str().is_empty() {
			return Err(ValidationError::ConfigError("served root cannot be empty".to_string()));
		}
		Ok(())
	}
}

impl Validator for ClientConfig {
	fn validate(&self) -> Result<(), ValidationError> {
		validate_address(&self.server_addr)?;
		validate_requested_chunk_size(self.chunk_size)?;
		Ok(())
	}
}

impl Validator for Config {
	fn validate(&self) -> Result<(), ValidationError> {
		self.server.validate()?;
		self.client.validate()
	}
}

impl Config {
	/// Parse a config file; `.json` and `.json5` files are JSON5, anything else TOML
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
		let parse_error = |message: String| ConfigError::Parse { path: path.to_path_buf(), message };

		match path.extension().and_then(|ext| ext.to_str()) {
			Some("json") | Some("json5") => json5::from_str(&text).map_err(|e| parse_error(e.to_string())),
			_ => toml::from_str(&text).map_err(|e| parse_error(e.to_string())),
		}
	}

	/// Apply `FILEXCHANGE_*` overrides read through `lookup`
	pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(addr) = lookup(ENV_LISTEN) {
			self.server.listen_addr = addr;
		}
		if let Some(root) = lookup(ENV_ROOT) {
			self.server.root = PathBuf::from(root);
		}
		if let Some(addr) = lookup(ENV_SERVER) {
			self.client.server_addr = addr;
		}
		if let Some(value) = lookup(ENV_CHUNK_SIZE) {
			self.client.chunk_size = value
				.trim()
				.parse()
				.map_err(|_| ConfigError::Env { name: ENV_CHUNK_SIZE.to_string(), value })?;
		}
		Ok(())
	}

	pub fn apply_env(&mut self) -> Result<(), ConfigError> {
		self.apply_env_with(|name| std::env::var(name).ok())
	}

	/// Defaults, then the config file, then the environment
	///
	/// An explicit `path` must exist; otherwise `$FILEXCHANGE_CONFIG` is used if set.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let file = path.map(Path::to_path_buf).or_else(|| std::env::var_os(ENV_CONFIG).map(PathBuf::from));
		let mut config = match file {
			Some(file) => Self::from_file(&file)?,
			None => Self::default(),
		};
		config.apply_env()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert_eq!(config.server.listen_addr, DEFAULT_ADDR);
		assert_eq!(config.server.default_chunk_size, 4096);
		assert_eq!(config.server.max_chunk_size, 4 * 1024 * 1024);
		assert_eq!(config.client.chunk_size, 0);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_toml_file_with_partial_sections() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("filexchange.toml");
		fs::write(
			&path,
			"[server]\nlistenAddr = \"0.0.0.0:6000\"\ndefaultChunkSize = 1024\n\n[client]\nchunkSize = 512\n",
		)
		.unwrap();

		let config = Config::from_file(&path).unwrap();
		assert_eq!(config.server.listen_addr, "0.0.0.0:6000");
		assert_eq!(config.server.default_chunk_size, 1024);
		assert_eq!(config.server.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
		assert_eq!(config.client.chunk_size, 512);
		assert_eq!(config.client.server_addr, DEFAULT_ADDR);
	}

	#[test]
	fn test_json5_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("filexchange.json5");
		fs::write(&path, "{ server: { root: '/srv/files' }, // served directory\n }").unwrap();

		let config = Config::from_file(&path).unwrap();
		assert_eq!(config.server.root, PathBuf::from("/srv/files"));
	}

	#[test]
	fn test_unreadable_and_malformed_files() {
		let dir = TempDir::new().unwrap();
		assert!(matches!(
			Config::from_file(&dir.path().join("missing.toml")),
			Err(ConfigError::Read { .. })
		));

		let path = dir.path().join("bad.toml");
		fs::write(&path, "[server\nlistenAddr = 1").unwrap();
		assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
	}

	#[test]
	fn test_env_overrides() {
		let env: HashMap<&str, &str> = [
			(ENV_LISTEN, "127.0.0.1:7000"),
			(ENV_ROOT, "/data"),
			(ENV_SERVER, "example.com:7000"),
			(ENV_CHUNK_SIZE, " 8192 "),
		]
		.into_iter()
		.collect();

		let mut config = Config::default();
		config.apply_env_with(|name| env.get(name).map(|v| v.to_string())).unwrap();
		assert_eq!(config.server.listen_addr, "127.0.0.1:7000");
		assert_eq!(config.server.root, PathBuf::from("/data"));
		assert_eq!(config.client.server_addr, "example.com:7000");
		assert_eq!(config.client.chunk_size, 8192);
	}

	#[test]
	fn test_invalid_env_chunk_size() {
		let mut config = Config::default();
		let result = config.apply_env_with(|name| {
			(name == ENV_CHUNK_SIZE).then(|| "lots".to_string())
		});
		assert!(matches!(result, Err(ConfigError::Env { .. })));
	}

	#[test]
	fn test_validate_rejects_bad_values() {
		let mut config = Config::default();
		config.server.default_chunk_size = 0;
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.server.default_chunk_size = config.server.max_chunk_size + 1;
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.client.server_addr = String::new();
		assert!(config.validate().is_err());
	}
}

// vim: ts=4
