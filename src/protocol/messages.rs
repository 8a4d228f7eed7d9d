//! Download message types
//!
//! These are the application-level messages of the `Download` method. The
//! framing that carries them over a connection lives in [`super::wire`].

/// Request sent by the client to open a download call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadRequest {
	/// File or directory name, relative to the served root
	pub name: String,
	/// Requested chunk length; 0 selects the server default
	pub chunk_size: u64,
}

/// Announces a file before its chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
	/// Base name of the file
	pub name: String,
	/// Declared size in bytes
	pub size: u64,
}

/// One fragment of file payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileChunk {
	pub data: Vec<u8>,
}

impl FileChunk {
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}
}

/// Server to client message: a header or a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResponse {
	Header(FileHeader),
	Chunk(FileChunk),
}

impl DownloadResponse {
	pub fn header(name: impl Into<String>, size: u64) -> Self {
		DownloadResponse::Header(FileHeader { name: name.into(), size })
	}

	pub fn chunk(data: Vec<u8>) -> Self {
		DownloadResponse::Chunk(FileChunk { data })
	}
}

// vim: ts=4
