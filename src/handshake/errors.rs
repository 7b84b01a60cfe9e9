use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur during
/// the handshake.  None of them are recoverable: the caller must close the
/// transport.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The peer's first byte was not the version this crate speaks (3)
    #[error("First byte of the handshake was {version}, but only version 3 is supported")]
    BadVersionId { version: u8 },

    /// The handshake is a one-shot exchange; attempting to run it a second
    /// time on the same connection is a caller bug.
    #[error("The handshake has already been performed on this connection")]
    AlreadyPerformed,

    /// An I/O error occurred while exchanging handshake packets.  A peer
    /// delivering fewer than the 1536 bytes a packet requires surfaces here
    /// as `UnexpectedEof`.
    #[error("{0}")]
    Io(#[from] io::Error),
}
