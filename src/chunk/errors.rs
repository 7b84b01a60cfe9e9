use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while
/// decoding RTMP chunks from the transport.
#[derive(Debug, Error)]
pub enum ChunkDecodeError {
    /// Chunks with formats 1 through 3 inherit header fields from the
    /// previously received chunk on the same chunk stream id.  This error
    /// occurs when such a chunk arrives on a stream that has not seen a
    /// format 0 chunk yet, so there is nothing to inherit from.
    #[error(
        "Received chunk with non-zero format on csid {csid} prior to receiving a format 0 chunk"
    )]
    NoPreviousChunkOnStream { csid: u32 },

    /// An I/O error occurred while reading from the transport.  A short read
    /// mid-header or mid-payload surfaces here as `UnexpectedEof`.
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// An enumeration defining all the possible errors that could occur while
/// encoding RTMP messages into chunks.
#[derive(Debug, Error)]
pub enum ChunkEncodeError {
    /// A message cannot be longer than 16,777,215 bytes, even when split
    /// across multiple chunks, since its length travels in a 3 byte field.
    #[error("The current message has a length of {size} bytes, which is over the allowed size of 16777215 bytes")]
    MessageTooLong { size: usize },

    /// Encountered when the chunk size is set to an invalid value
    #[error("An invalid chunk size was specified.  Chunk size must be greater than 0 and less than 2147483647")]
    InvalidMaxChunkSize { chunk_size: u32 },

    /// Only chunk stream ids 2 through 65599 are representable in the basic
    /// header (0 and 1 are escape markers, larger values don't fit)
    #[error("Chunk stream id {csid} is outside the encodable range of 2 through 65599")]
    ChunkStreamIdOutOfRange { csid: u32 },

    /// An I/O error occurred while writing to the transport
    #[error("{0}")]
    Io(#[from] io::Error),
}
