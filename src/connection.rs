//! Connection orchestration: one handshake, then a loop of chunk decoding
//! and message reassembly over the transport.
//!
//! Everything here is synchronous and single-context.  The only suspension
//! points are transport reads and writes, so cancelling a connection means
//! closing the transport out from under it and letting the in-flight read
//! fail with an I/O error.

use crate::chunk::{
    assembler, header, ChunkDecodeError, ChunkEncodeError, ChunkStreamTable, ChunkWriter,
    DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE,
};
use crate::handshake::{Handshake, HandshakeError, Role};
use crate::message::Message;
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ByteOrder};
use log::debug;
use std::io::{Read, Write};
use std::time::Instant;

/// Message type id that renegotiates the incoming chunk size
const SET_CHUNK_SIZE_TYPE_ID: u8 = 1;

/// An enumeration defining all the possible errors that could occur while
/// reading or writing messages on a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// No chunk may be read or written before the handshake completes
    #[error("Attempted to read or write chunks before the handshake completed")]
    HandshakeIncomplete,

    /// The peer's Set Chunk Size message carried fewer than the 4 required
    /// body bytes
    #[error("Set Chunk Size message body was {length} bytes, expected at least 4")]
    MalformedSetChunkSize { length: usize },

    /// The peer announced a chunk size this implementation cannot honor
    #[error("Peer announced an invalid chunk size of {size} bytes")]
    InvalidAnnouncedChunkSize { size: u32 },

    #[error("{0}")]
    Handshake(#[from] HandshakeError),

    #[error("{0}")]
    Decode(#[from] ChunkDecodeError),

    #[error("{0}")]
    Encode(#[from] ChunkEncodeError),
}

/// One RTMP connection over a blocking byte-stream transport.
///
/// The connection owns the transport for its lifetime; callers wanting to
/// close it take it back with [`Connection::into_inner`] (dropping it works
/// too for transports that close on drop).
///
/// ```no_run
/// use std::net::TcpStream;
/// use rtmp_wire::{Connection, Role};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = TcpStream::connect("example.com:1935")?;
/// let mut connection = Connection::new(stream, Role::Client);
/// connection.handshake()?;
///
/// loop {
///     let message = connection.read_message()?;
///     println!("type {} on stream {}", message.type_id, message.message_stream_id);
/// }
/// # }
/// ```
pub struct Connection<T: Read + Write> {
    transport: T,
    handshake: Handshake,
    epoch: Option<Instant>,
    in_chunk_size: usize,
    streams: ChunkStreamTable,
    writer: ChunkWriter,
}

impl<T: Read + Write> Connection<T> {
    pub fn new(transport: T, role: Role) -> Connection<T> {
        Connection {
            transport,
            handshake: Handshake::new(role),
            epoch: None,
            in_chunk_size: DEFAULT_CHUNK_SIZE,
            streams: ChunkStreamTable::new(),
            writer: ChunkWriter::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.handshake.role()
    }

    /// Performs the handshake.  Must be called exactly once, before any
    /// message is read or written; calling it again returns
    /// `HandshakeError::AlreadyPerformed`.
    pub fn handshake(&mut self) -> Result<(), HandshakeError> {
        let epoch = self.handshake.perform(&mut self.transport)?;
        self.epoch = Some(epoch);
        Ok(())
    }

    /// Reads chunks off the transport until one of them completes a message,
    /// then returns it.
    ///
    /// Chunks for other chunk stream ids encountered along the way are fed
    /// into their own streams' reassembly state, so interleaved traffic is
    /// handled transparently; messages surface in the order their final
    /// payload bytes arrive on the wire.
    ///
    /// A completed Set Chunk Size message (type 1) adjusts the incoming
    /// chunk size before being returned; it is handed to the caller like any
    /// other message.
    pub fn read_message(&mut self) -> Result<Message, ConnectionError> {
        if self.epoch.is_none() {
            return Err(ConnectionError::HandshakeIncomplete);
        }

        loop {
            let basic = header::read_basic_header(&mut self.transport)?;
            let stream = self.streams.get_or_create(basic.chunk_stream_id);
            let chunk_header = header::read_message_header(
                &mut self.transport,
                basic,
                stream.last_header.as_ref(),
            )?;

            let completed =
                assembler::feed(stream, &chunk_header, &mut self.transport, self.in_chunk_size)?;

            if let Some(message) = completed {
                if message.type_id == SET_CHUNK_SIZE_TYPE_ID {
                    self.apply_set_chunk_size(&message)?;
                }

                return Ok(message);
            }
        }
    }

    /// Writes one message to the transport as chunks of at most
    /// `out_chunk_size()` bytes.
    pub fn send_message(&mut self, message: &Message) -> Result<(), ConnectionError> {
        if self.epoch.is_none() {
            return Err(ConnectionError::HandshakeIncomplete);
        }

        self.writer
            .write_message(&mut self.transport, message, false)?;
        Ok(())
    }

    /// Changes the outgoing chunk size, announcing it to the peer with a
    /// Set Chunk Size message before it takes effect.
    pub fn set_out_chunk_size(&mut self, new_size: u32) -> Result<(), ConnectionError> {
        let time = self
            .epoch_timestamp()
            .ok_or(ConnectionError::HandshakeIncomplete)?;
        self.writer
            .set_max_chunk_size(&mut self.transport, new_size, time)?;
        Ok(())
    }

    /// The maximum payload size of chunks the peer sends us
    pub fn in_chunk_size(&self) -> usize {
        self.in_chunk_size
    }

    /// The maximum payload size of chunks we send the peer
    pub fn out_chunk_size(&self) -> u32 {
        self.writer.max_chunk_size()
    }

    /// Milliseconds elapsed since this connection's handshake epoch, for
    /// stamping outbound messages.  `None` before the handshake completes.
    pub fn epoch_timestamp(&self) -> Option<RtmpTimestamp> {
        self.epoch
            .map(|epoch| RtmpTimestamp::new(epoch.elapsed().as_millis() as u32))
    }

    /// Consumes the connection and hands the transport back, typically to
    /// close it.
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn apply_set_chunk_size(&mut self, message: &Message) -> Result<(), ConnectionError> {
        if message.data.len() < 4 {
            return Err(ConnectionError::MalformedSetChunkSize {
                length: message.data.len(),
            });
        }

        // Only the low 31 bits carry the size
        let size = BigEndian::read_u32(&message.data[..4]) & MAX_CHUNK_SIZE;
        if size == 0 {
            return Err(ConnectionError::InvalidAnnouncedChunkSize { size });
        }

        debug!("Peer changed incoming chunk size from {} to {}", self.in_chunk_size, size);
        self.in_chunk_size = size as usize;
        Ok(())
    }
}
