//! Decoding of basic headers, the four message header formats, and the
//! extended timestamp escape.  Decoding is driven directly by blocking reads
//! on the transport: each field is read with `read_exact`, so a peer closing
//! the connection mid-header surfaces as an `UnexpectedEof` I/O error.

use super::errors::ChunkDecodeError;
use super::EXTENDED_TIMESTAMP_SENTINEL;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::Read;

const FORMAT_MASK: u8 = 0b11000000;
const CSID_MASK: u8 = 0b00111111;

/// The four chunk message header formats, in decreasing order of
/// completeness.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub enum ChunkHeaderFormat {
    /// Format 0: 11 bytes, all fields present, timestamp is absolute
    Full,
    /// Format 1: 7 bytes, timestamp delta + length + type id
    TimeDeltaWithoutMessageStreamId,
    /// Format 2: 3 bytes, timestamp delta only
    TimeDeltaOnly,
    /// Format 3: 0 bytes, everything inherited
    Empty,
}

impl ChunkHeaderFormat {
    fn from_first_byte(byte: u8) -> ChunkHeaderFormat {
        match byte & FORMAT_MASK {
            0b00000000 => ChunkHeaderFormat::Full,
            0b01000000 => ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId,
            0b10000000 => ChunkHeaderFormat::TimeDeltaOnly,
            _ => ChunkHeaderFormat::Empty,
        }
    }

    pub(crate) fn mask(self) -> u8 {
        match self {
            ChunkHeaderFormat::Full => 0b00000000,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 0b01000000,
            ChunkHeaderFormat::TimeDeltaOnly => 0b10000000,
            ChunkHeaderFormat::Empty => 0b11000000,
        }
    }
}

/// The leading 1-3 bytes of every chunk: format plus chunk stream id.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub struct BasicHeader {
    pub format: ChunkHeaderFormat,
    pub chunk_stream_id: u32,
}

/// A fully resolved chunk header: fields the wire omitted have been filled in
/// from the chunk stream's previous header snapshot.
///
/// `timestamp_field` holds the raw value as it appeared (or was inherited)
/// on the wire: absolute for format 0, a delta for formats 1-3.
#[derive(Debug, Copy, Clone)]
pub struct ChunkHeader {
    pub format: ChunkHeaderFormat,
    pub chunk_stream_id: u32,
    pub timestamp_field: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
    pub uses_extended_timestamp: bool,
}

/// The per-chunk-stream snapshot that formats 1-3 inherit omitted fields
/// from.  The extended timestamp flag is part of the snapshot (and therefore
/// per stream, never per connection): a format 3 chunk carries the 4 byte
/// extension exactly when the previous header on its stream did.
#[derive(Debug, Copy, Clone)]
pub struct HeaderSnapshot {
    pub timestamp_field: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
    pub uses_extended_timestamp: bool,
}

impl From<&ChunkHeader> for HeaderSnapshot {
    fn from(header: &ChunkHeader) -> HeaderSnapshot {
        HeaderSnapshot {
            timestamp_field: header.timestamp_field,
            message_length: header.message_length,
            message_type_id: header.message_type_id,
            message_stream_id: header.message_stream_id,
            uses_extended_timestamp: header.uses_extended_timestamp,
        }
    }
}

/// Reads the 1-3 byte basic header.
///
/// The low 6 bits of the first byte are the chunk stream id, except that the
/// values 0 and 1 are escape markers: 0 means one more byte follows (ids 64
/// through 319), 1 means two more bytes follow as a little-endian value (ids
/// 64 through 65599), in both cases storing the real id minus 64.
pub fn read_basic_header<R: Read>(reader: &mut R) -> Result<BasicHeader, ChunkDecodeError> {
    let first_byte = reader.read_u8()?;
    let format = ChunkHeaderFormat::from_first_byte(first_byte);

    let chunk_stream_id = match first_byte & CSID_MASK {
        0 => reader.read_u8()? as u32 + 64,
        1 => reader.read_u16::<LittleEndian>()? as u32 + 64,
        csid => csid as u32,
    };

    Ok(BasicHeader {
        format,
        chunk_stream_id,
    })
}

/// Reads the message header for `basic.format` and resolves it against the
/// stream's previous header snapshot.
///
/// Formats 1-3 require a prior header on the same chunk stream; without one
/// there is nothing to inherit and decoding fails with
/// `NoPreviousChunkOnStream`.
pub fn read_message_header<R: Read>(
    reader: &mut R,
    basic: BasicHeader,
    prev: Option<&HeaderSnapshot>,
) -> Result<ChunkHeader, ChunkDecodeError> {
    match basic.format {
        ChunkHeaderFormat::Full => {
            let timestamp = reader.read_u24::<BigEndian>()?;
            let message_length = reader.read_u24::<BigEndian>()?;
            let message_type_id = reader.read_u8()?;
            let message_stream_id = reader.read_u32::<LittleEndian>()?;
            let (timestamp_field, uses_extended_timestamp) =
                resolve_timestamp_field(reader, timestamp)?;

            Ok(ChunkHeader {
                format: basic.format,
                chunk_stream_id: basic.chunk_stream_id,
                timestamp_field,
                message_length,
                message_type_id,
                message_stream_id,
                uses_extended_timestamp,
            })
        }

        ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => {
            let prev = require_prev(prev, basic.chunk_stream_id)?;
            let delta = reader.read_u24::<BigEndian>()?;
            let message_length = reader.read_u24::<BigEndian>()?;
            let message_type_id = reader.read_u8()?;
            let (timestamp_field, uses_extended_timestamp) =
                resolve_timestamp_field(reader, delta)?;

            Ok(ChunkHeader {
                format: basic.format,
                chunk_stream_id: basic.chunk_stream_id,
                timestamp_field,
                message_length,
                message_type_id,
                message_stream_id: prev.message_stream_id,
                uses_extended_timestamp,
            })
        }

        ChunkHeaderFormat::TimeDeltaOnly => {
            let prev = require_prev(prev, basic.chunk_stream_id)?;
            let delta = reader.read_u24::<BigEndian>()?;
            let (timestamp_field, uses_extended_timestamp) =
                resolve_timestamp_field(reader, delta)?;

            Ok(ChunkHeader {
                format: basic.format,
                chunk_stream_id: basic.chunk_stream_id,
                timestamp_field,
                message_length: prev.message_length,
                message_type_id: prev.message_type_id,
                message_stream_id: prev.message_stream_id,
                uses_extended_timestamp,
            })
        }

        ChunkHeaderFormat::Empty => {
            let prev = require_prev(prev, basic.chunk_stream_id)?;

            // A format 3 chunk carries the 4 byte extension only when the
            // stream's previous header did.
            let timestamp_field = if prev.uses_extended_timestamp {
                reader.read_u32::<BigEndian>()?
            } else {
                prev.timestamp_field
            };

            Ok(ChunkHeader {
                format: basic.format,
                chunk_stream_id: basic.chunk_stream_id,
                timestamp_field,
                message_length: prev.message_length,
                message_type_id: prev.message_type_id,
                message_stream_id: prev.message_stream_id,
                uses_extended_timestamp: prev.uses_extended_timestamp,
            })
        }
    }
}

fn require_prev(
    prev: Option<&HeaderSnapshot>,
    csid: u32,
) -> Result<&HeaderSnapshot, ChunkDecodeError> {
    prev.ok_or(ChunkDecodeError::NoPreviousChunkOnStream { csid })
}

fn resolve_timestamp_field<R: Read>(
    reader: &mut R,
    three_byte_value: u32,
) -> Result<(u32, bool), ChunkDecodeError> {
    if three_byte_value == EXTENDED_TIMESTAMP_SENTINEL {
        Ok((reader.read_u32::<BigEndian>()?, true))
    } else {
        Ok((three_byte_value, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Cursor;

    fn basic_header_bytes(format_mask: u8, csid: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        if csid <= 63 {
            bytes.push(csid as u8 | format_mask);
        } else if csid <= 319 {
            bytes.push(format_mask);
            bytes.push((csid - 64) as u8);
        } else {
            bytes.push(1 | format_mask);
            bytes
                .write_u16::<LittleEndian>((csid - 64) as u16)
                .unwrap();
        }

        bytes
    }

    fn snapshot() -> HeaderSnapshot {
        HeaderSnapshot {
            timestamp_field: 20,
            message_length: 300,
            message_type_id: 9,
            message_stream_id: 7,
            uses_extended_timestamp: false,
        }
    }

    #[test]
    fn can_read_directly_encoded_chunk_stream_id() {
        let mut cursor = Cursor::new(basic_header_bytes(0b01000000, 50));
        let basic = read_basic_header(&mut cursor).unwrap();

        assert_eq!(
            basic.format,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId
        );
        assert_eq!(basic.chunk_stream_id, 50);
    }

    #[test]
    fn can_read_two_byte_chunk_stream_id() {
        let mut cursor = Cursor::new(basic_header_bytes(0, 300));
        let basic = read_basic_header(&mut cursor).unwrap();

        assert_eq!(basic.format, ChunkHeaderFormat::Full);
        assert_eq!(basic.chunk_stream_id, 300);
    }

    #[test]
    fn can_read_three_byte_chunk_stream_id() {
        let mut cursor = Cursor::new(basic_header_bytes(0b11000000, 50000));
        let basic = read_basic_header(&mut cursor).unwrap();

        assert_eq!(basic.format, ChunkHeaderFormat::Empty);
        assert_eq!(basic.chunk_stream_id, 50000);
    }

    #[test]
    fn can_read_format_0_header() {
        let bytes = vec![
            0x00, 0x00, 0x19, // timestamp = 25
            0x00, 0x01, 0x2c, // length = 300
            0x09, // type id
            0x05, 0x00, 0x00, 0x00, // stream id 5, little endian
        ];
        let basic = BasicHeader {
            format: ChunkHeaderFormat::Full,
            chunk_stream_id: 4,
        };

        let mut cursor = Cursor::new(bytes);
        let header = read_message_header(&mut cursor, basic, None).unwrap();

        assert_eq!(header.timestamp_field, 25);
        assert_eq!(header.message_length, 300);
        assert_eq!(header.message_type_id, 9);
        assert_eq!(header.message_stream_id, 5);
        assert!(!header.uses_extended_timestamp);
    }

    #[test]
    fn format_0_sentinel_timestamp_reads_four_byte_extension() {
        let bytes = vec![
            0xff, 0xff, 0xff, // sentinel
            0x00, 0x00, 0x01, // length = 1
            0x09, // type id
            0x01, 0x00, 0x00, 0x00, // stream id 1
            0x01, 0xff, 0xff, 0xff, // extended timestamp
        ];
        let basic = BasicHeader {
            format: ChunkHeaderFormat::Full,
            chunk_stream_id: 6,
        };

        let mut cursor = Cursor::new(bytes);
        let header = read_message_header(&mut cursor, basic, None).unwrap();

        assert_eq!(header.timestamp_field, 0x1ffffff);
        assert!(header.uses_extended_timestamp);
    }

    #[test]
    fn format_1_inherits_message_stream_id() {
        let bytes = vec![
            0x00, 0x00, 0x0a, // delta = 10
            0x00, 0x00, 0x05, // length = 5
            0x08, // type id
        ];
        let basic = BasicHeader {
            format: ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId,
            chunk_stream_id: 5,
        };

        let mut cursor = Cursor::new(bytes);
        let prev = snapshot();
        let header = read_message_header(&mut cursor, basic, Some(&prev)).unwrap();

        assert_eq!(header.timestamp_field, 10);
        assert_eq!(header.message_length, 5);
        assert_eq!(header.message_type_id, 8);
        assert_eq!(header.message_stream_id, 7, "stream id not inherited");
    }

    #[test]
    fn format_2_inherits_length_and_type() {
        let bytes = vec![0x00, 0x00, 0x0b]; // delta = 11
        let basic = BasicHeader {
            format: ChunkHeaderFormat::TimeDeltaOnly,
            chunk_stream_id: 5,
        };

        let mut cursor = Cursor::new(bytes);
        let prev = snapshot();
        let header = read_message_header(&mut cursor, basic, Some(&prev)).unwrap();

        assert_eq!(header.timestamp_field, 11);
        assert_eq!(header.message_length, 300);
        assert_eq!(header.message_type_id, 9);
        assert_eq!(header.message_stream_id, 7);
    }

    #[test]
    fn format_3_inherits_everything_including_delta() {
        let basic = BasicHeader {
            format: ChunkHeaderFormat::Empty,
            chunk_stream_id: 5,
        };

        let mut cursor = Cursor::new(Vec::new());
        let prev = snapshot();
        let header = read_message_header(&mut cursor, basic, Some(&prev)).unwrap();

        assert_eq!(header.timestamp_field, 20);
        assert_eq!(header.message_length, 300);
        assert_eq!(header.message_type_id, 9);
        assert_eq!(header.message_stream_id, 7);
        assert_eq!(cursor.position(), 0, "format 3 should consume no bytes");
    }

    #[test]
    fn format_3_reads_extension_when_previous_header_used_it() {
        let basic = BasicHeader {
            format: ChunkHeaderFormat::Empty,
            chunk_stream_id: 5,
        };

        let mut prev = snapshot();
        prev.uses_extended_timestamp = true;
        prev.timestamp_field = 0x1ffffff;

        let mut cursor = Cursor::new(vec![0x01, 0xff, 0xff, 0xff]);
        let header = read_message_header(&mut cursor, basic, Some(&prev)).unwrap();

        assert_eq!(header.timestamp_field, 0x1ffffff);
        assert!(header.uses_extended_timestamp);
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn format_3_without_previous_header_is_a_protocol_error() {
        let basic = BasicHeader {
            format: ChunkHeaderFormat::Empty,
            chunk_stream_id: 9,
        };

        let mut cursor = Cursor::new(Vec::new());
        match read_message_header(&mut cursor, basic, None) {
            Err(ChunkDecodeError::NoPreviousChunkOnStream { csid: 9 }) => {}
            x => panic!("Expected NoPreviousChunkOnStream, got {:?}", x),
        }
    }

    #[test]
    fn format_1_without_previous_header_is_a_protocol_error() {
        let bytes = vec![0x00, 0x00, 0x0a, 0x00, 0x00, 0x05, 0x08];
        let basic = BasicHeader {
            format: ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId,
            chunk_stream_id: 3,
        };

        let mut cursor = Cursor::new(bytes);
        match read_message_header(&mut cursor, basic, None) {
            Err(ChunkDecodeError::NoPreviousChunkOnStream { csid: 3 }) => {}
            x => panic!("Expected NoPreviousChunkOnStream, got {:?}", x),
        }
    }

    #[test]
    fn short_read_mid_header_is_an_io_error() {
        let bytes = vec![0x00, 0x00]; // truncated timestamp field
        let basic = BasicHeader {
            format: ChunkHeaderFormat::Full,
            chunk_stream_id: 4,
        };

        let mut cursor = Cursor::new(bytes);
        match read_message_header(&mut cursor, basic, None) {
            Err(ChunkDecodeError::Io(_)) => {}
            x => panic!("Expected Io error, got {:?}", x),
        }
    }
}
