//! Download protocol: message types and wire framing
//!
//! A call carries one [`DownloadRequest`] from client to server and a stream of
//! [`DownloadResponse`] messages back, terminated by a [`Status`](crate::status::Status).
//!
//! # Example Usage
//!
//! ```ignore
//! use filexchange::protocol::{read_frame, write_frame, Frame};
//!
//! write_frame(&mut writer, &Frame::Request(request)).await?;
//! while let Some(frame) = read_frame(&mut reader).await? {
//!     // Frame::Response(..) until Frame::End(status)
//! }
//! ```

pub mod error;
pub mod messages;
pub mod wire;

pub use error::ProtocolError;
pub use messages::{DownloadRequest, DownloadResponse, FileChunk, FileHeader};
pub use wire::{read_frame, write_frame, Frame, MAX_CHUNK_LEN, MAX_CONTROL_LINE};

// vim: ts=4
