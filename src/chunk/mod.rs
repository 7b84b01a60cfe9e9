//! The RTMP chunk framing layer.
//!
//! Every message sent after the handshake travels as one or more chunks:
//! a 1-3 byte basic header, a 0/3/7/11 byte message header (one of four
//! compression formats), an optional 4 byte extended timestamp, and up to
//! `chunk size` bytes of payload.  Chunks for distinct chunk stream ids may
//! be interleaved on the wire; this module keeps the per-stream state needed
//! to reassemble each of them independently.

pub mod assembler;
mod errors;
pub mod header;
mod stream;
mod writer;

pub use self::errors::{ChunkDecodeError, ChunkEncodeError};
pub use self::header::{BasicHeader, ChunkHeader, ChunkHeaderFormat, HeaderSnapshot};
pub use self::stream::{ChunkStream, ChunkStreamTable};
pub use self::writer::{csid_for_message_type, ChunkWriter};

/// Chunk size both peers start with, until renegotiated via Set Chunk Size
pub const DEFAULT_CHUNK_SIZE: usize = 128;

/// The 3 byte timestamp field value that signals a 4 byte extended timestamp
pub const EXTENDED_TIMESTAMP_SENTINEL: u32 = 0xFFFFFF;

/// Chunk sizes are carried in 31 bits of the Set Chunk Size message
pub const MAX_CHUNK_SIZE: u32 = 2147483647;

/// Message lengths are carried in a 3 byte field
pub const MAX_MESSAGE_LENGTH: usize = 16777215;
