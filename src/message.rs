use crate::chunk::header::{ChunkHeader, ChunkHeaderFormat};
use crate::time::RtmpTimestamp;
use bytes::Bytes;
use std::io::{self, Read};

/// One reassembled application-level RTMP message.
///
/// The body is opaque to this crate; `type_id` tells the layer above how to
/// interpret it.  The timestamp is always absolute, even when the wire form
/// that delivered it was a delta.
#[derive(PartialEq, Debug, Clone)]
pub struct Message {
    /// Format of the chunk header that most recently carried this message's
    /// header fields
    pub header_format: ChunkHeaderFormat,
    pub type_id: u8,
    pub timestamp: RtmpTimestamp,
    pub message_stream_id: u32,
    /// Id of the chunk stream the message arrived on (or should leave on)
    pub chunk_stream_id: u32,
    pub data: Bytes,
}

impl Message {
    pub fn new(
        chunk_stream_id: u32,
        type_id: u8,
        timestamp: RtmpTimestamp,
        message_stream_id: u32,
        data: Bytes,
    ) -> Message {
        Message {
            header_format: ChunkHeaderFormat::Full,
            type_id,
            timestamp,
            message_stream_id,
            chunk_stream_id,
            data,
        }
    }
}

/// A message mid-reassembly.  The body buffer is allocated up front at the
/// declared payload length and filled chunk by chunk; the message is complete
/// exactly when `bytes_received == body.len()`.
#[derive(Debug)]
pub(crate) struct PendingMessage {
    pub header_format: ChunkHeaderFormat,
    pub type_id: u8,
    pub message_stream_id: u32,
    pub timestamp: RtmpTimestamp,
    body: Vec<u8>,
    bytes_received: usize,
}

impl PendingMessage {
    pub fn new(header: &ChunkHeader, timestamp: RtmpTimestamp) -> PendingMessage {
        PendingMessage {
            header_format: header.format,
            type_id: header.message_type_id,
            message_stream_id: header.message_stream_id,
            timestamp,
            body: vec![0; header.message_length as usize],
            bytes_received: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.body.len() - self.bytes_received
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_received == self.body.len()
    }

    /// Reads exactly `count` payload bytes into the body at the current
    /// offset.  `count` must not exceed `remaining()`.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R, count: usize) -> Result<(), io::Error> {
        let end = self.bytes_received + count;
        reader.read_exact(&mut self.body[self.bytes_received..end])?;
        self.bytes_received = end;
        Ok(())
    }

    /// Replaces the header fields with those of a later chunk that continued
    /// this message with a fresh format 1/2 header (unusual, but accepted).
    pub fn rebase(&mut self, header: &ChunkHeader, timestamp: RtmpTimestamp) {
        self.header_format = header.format;
        self.type_id = header.message_type_id;
        self.message_stream_id = header.message_stream_id;
        self.timestamp = timestamp;
    }

    pub fn into_message(self, chunk_stream_id: u32) -> Message {
        Message {
            header_format: self.header_format,
            type_id: self.type_id,
            timestamp: self.timestamp,
            message_stream_id: self.message_stream_id,
            chunk_stream_id,
            data: Bytes::from(self.body),
        }
    }
}
