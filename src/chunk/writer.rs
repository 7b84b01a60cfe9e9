//! Outbound chunking: turns messages into chunk streams of at most
//! `max_chunk_size` payload bytes each.
//!
//! The chunk format has a basic form of header compression.  When a chunk's
//! header shares fields with the previous chunk sent on the same chunk
//! stream id, the writer downgrades to formats 1-3 and lets the receiver
//! inherit the omitted fields.  Compression is an optimization only; callers
//! needing maximum compatibility can force format 0 headers.  Continuation
//! chunks of a split message always use format 3.

use super::errors::ChunkEncodeError;
use super::header::ChunkHeaderFormat;
use super::{DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP_SENTINEL, MAX_CHUNK_SIZE, MAX_MESSAGE_LENGTH};
use crate::message::Message;
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use bytes::Bytes;
use std::cmp::min;
use std::collections::HashMap;
use std::io::Write;

/// Message type id of the Set Chunk Size control message
const SET_CHUNK_SIZE_TYPE_ID: u8 = 1;

/// Chunk stream ids must be representable in the basic header
const MIN_CSID: u32 = 2;
const MAX_CSID: u32 = 65599;

#[derive(Debug)]
struct OutboundHeader {
    timestamp: RtmpTimestamp,
    timestamp_delta: u32,
    message_length: u32,
    message_type_id: u8,
    message_stream_id: u32,
}

/// Serializes messages into chunks on a blocking writer.
///
/// The same writer instance must be used for every message sent to a peer,
/// since header compression relies on what was previously sent per chunk
/// stream id.
pub struct ChunkWriter {
    previous_headers: HashMap<u32, OutboundHeader>,
    max_chunk_size: u32,
}

impl ChunkWriter {
    pub fn new() -> ChunkWriter {
        ChunkWriter {
            previous_headers: HashMap::new(),
            max_chunk_size: DEFAULT_CHUNK_SIZE as u32,
        }
    }

    /// The maximum payload size of any chunk this writer produces
    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Changes the outbound chunk size, announcing it to the peer first.
    ///
    /// The receiver must know about the change before any chunk using the new
    /// size arrives, so a Set Chunk Size control message is written before
    /// the new size takes effect.
    pub fn set_max_chunk_size<W: Write>(
        &mut self,
        writer: &mut W,
        new_size: u32,
        time: RtmpTimestamp,
    ) -> Result<(), ChunkEncodeError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE {
            return Err(ChunkEncodeError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        let mut body = Vec::with_capacity(4);
        body.write_u32::<BigEndian>(new_size)?;

        let message = Message::new(
            MIN_CSID,
            SET_CHUNK_SIZE_TYPE_ID,
            time,
            0,
            Bytes::from(body),
        );
        self.write_message(writer, &message, false)?;

        self.max_chunk_size = new_size;
        Ok(())
    }

    /// Writes one message as `⌈len / max_chunk_size⌉` chunks (a zero length
    /// message still produces one header-only chunk).
    ///
    /// Some encoders and players require the first messages after the
    /// handshake to arrive with uncompressed format 0 headers; passing
    /// `force_uncompressed` guarantees that at the cost of a few bytes.
    pub fn write_message<W: Write>(
        &mut self,
        writer: &mut W,
        message: &Message,
        force_uncompressed: bool,
    ) -> Result<(), ChunkEncodeError> {
        if message.data.len() > MAX_MESSAGE_LENGTH {
            return Err(ChunkEncodeError::MessageTooLong {
                size: message.data.len(),
            });
        }

        let csid = message.chunk_stream_id;
        if csid < MIN_CSID || csid > MAX_CSID {
            return Err(ChunkEncodeError::ChunkStreamIdOutOfRange { csid });
        }

        let mut header = OutboundHeader {
            timestamp: message.timestamp,
            timestamp_delta: 0,
            message_length: message.data.len() as u32,
            message_type_id: message.type_id,
            message_stream_id: message.message_stream_id,
        };

        let format = if force_uncompressed {
            ChunkHeaderFormat::Full
        } else {
            match self.previous_headers.get(&csid) {
                None => ChunkHeaderFormat::Full,
                Some(previous) => {
                    header.timestamp_delta = (message.timestamp - previous.timestamp).value;
                    choose_format(&header, previous)
                }
            }
        };

        let timestamp_value = match format {
            ChunkHeaderFormat::Full => header.timestamp.value,
            _ => header.timestamp_delta,
        };
        let uses_extended = timestamp_value >= EXTENDED_TIMESTAMP_SENTINEL;

        let chunk_size = self.max_chunk_size as usize;
        let mut offset = 0;
        let mut chunk_format = format;
        loop {
            let end = min(offset + chunk_size, message.data.len());
            write_chunk(
                writer,
                chunk_format,
                csid,
                &header,
                timestamp_value,
                uses_extended,
                &message.data[offset..end],
            )?;

            offset = end;
            if offset >= message.data.len() {
                break;
            }
            chunk_format = ChunkHeaderFormat::Empty;
        }

        self.previous_headers.insert(csid, header);
        Ok(())
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        ChunkWriter::new()
    }
}

/// Spreads repeated message types over a handful of chunk stream ids so the
/// header compression stays effective: protocol control on 2, command/data
/// on 3, video on 4, audio on 5, everything else on 6.
pub fn csid_for_message_type(message_type_id: u8) -> u32 {
    match message_type_id {
        1..=6 => 2,
        18 | 19 | 20 => 3,
        9 => 4,
        8 => 5,
        _ => 6,
    }
}

fn choose_format(current: &OutboundHeader, previous: &OutboundHeader) -> ChunkHeaderFormat {
    if current.message_stream_id != previous.message_stream_id {
        return ChunkHeaderFormat::Full;
    }

    if current.message_type_id != previous.message_type_id
        || current.message_length != previous.message_length
    {
        return ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId;
    }

    if current.timestamp_delta != previous.timestamp_delta {
        return ChunkHeaderFormat::TimeDeltaOnly;
    }

    ChunkHeaderFormat::Empty
}

fn write_chunk<W: Write>(
    writer: &mut W,
    format: ChunkHeaderFormat,
    csid: u32,
    header: &OutboundHeader,
    timestamp_value: u32,
    uses_extended: bool,
    payload: &[u8],
) -> Result<(), ChunkEncodeError> {
    write_basic_header(writer, format, csid)?;

    if format != ChunkHeaderFormat::Empty {
        writer.write_u24::<BigEndian>(min(timestamp_value, EXTENDED_TIMESTAMP_SENTINEL))?;
    }

    if format == ChunkHeaderFormat::Full
        || format == ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId
    {
        writer.write_u24::<BigEndian>(header.message_length)?;
        writer.write_u8(header.message_type_id)?;
    }

    if format == ChunkHeaderFormat::Full {
        writer.write_u32::<LittleEndian>(header.message_stream_id)?;
    }

    // Format 3 chunks re-carry the 4 byte value whenever the chunk that
    // opened the message did; the receiver inherits the flag per stream.
    if uses_extended {
        writer.write_u32::<BigEndian>(timestamp_value)?;
    }

    writer.write_all(payload)?;
    Ok(())
}

fn write_basic_header<W: Write>(
    writer: &mut W,
    format: ChunkHeaderFormat,
    csid: u32,
) -> Result<(), ChunkEncodeError> {
    let mask = format.mask();
    if csid <= 63 {
        writer.write_u8(csid as u8 | mask)?;
    } else if csid <= 319 {
        writer.write_u8(mask)?;
        writer.write_u8((csid - 64) as u8)?;
    } else {
        writer.write_u8(1 | mask)?;
        writer.write_u16::<LittleEndian>((csid - 64) as u16)?;
    }

    Ok(())
}
