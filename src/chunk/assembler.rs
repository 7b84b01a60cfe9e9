//! Reassembly of complete messages from a sequence of decoded chunk headers
//! and their payload bytes.
//!
//! Each call handles exactly one chunk for one chunk stream.  All state lives
//! on the `ChunkStream`, so chunks for distinct stream ids interleaved on the
//! wire reassemble into distinct messages with no cross-contamination.

use super::header::{ChunkHeader, ChunkHeaderFormat, HeaderSnapshot};
use super::stream::ChunkStream;
use super::ChunkDecodeError;
use crate::message::{Message, PendingMessage};
use crate::time::RtmpTimestamp;
use std::cmp::min;
use std::io::Read;

/// Feeds one chunk into the stream's in-flight message, reading up to
/// `in_chunk_size` payload bytes from the transport.
///
/// A new message starts when the header establishes a fresh payload length:
/// every format 0 chunk, or any format 1-3 chunk arriving while no message
/// is in flight on the stream (a format 3 chunk then starts the next message
/// entirely from inherited state, reapplying the stored timestamp delta).
/// Otherwise the chunk continues the in-flight message.
///
/// The message timestamp is computed once, when the message starts: absolute
/// headers set it directly, delta headers add onto the stream's cumulative
/// timestamp.  Continuation chunks never re-apply a delta, even when they
/// re-carry the 4 byte extended timestamp value.
///
/// Returns the completed `Message` once `payload_length` bytes have been
/// received, committing the timestamp and header snapshot back onto the
/// stream; returns `None` while further chunks are still needed.
pub fn feed<R: Read>(
    stream: &mut ChunkStream,
    header: &ChunkHeader,
    reader: &mut R,
    in_chunk_size: usize,
) -> Result<Option<Message>, ChunkDecodeError> {
    let mut pending = match (header.format, stream.pending.take()) {
        (ChunkHeaderFormat::Full, _) => {
            PendingMessage::new(header, RtmpTimestamp::new(header.timestamp_field))
        }

        (_, None) => PendingMessage::new(header, stream.timestamp + header.timestamp_field),

        (ChunkHeaderFormat::Empty, Some(pending)) => pending,

        (_, Some(mut pending)) => {
            // A format 1/2 chunk continuing an in-flight message is unusual
            // but accepted; its header fields supersede the pending ones.
            pending.rebase(header, stream.timestamp + header.timestamp_field);
            pending
        }
    };

    let bytes_to_read = min(in_chunk_size, pending.remaining());
    pending.fill_from(reader, bytes_to_read)?;

    stream.last_header = Some(HeaderSnapshot::from(header));

    if pending.is_complete() {
        stream.timestamp = pending.timestamp;
        Ok(Some(pending.into_message(stream.id)))
    } else {
        stream.pending = Some(pending);
        Ok(None)
    }
}
