use super::header::HeaderSnapshot;
use crate::message::PendingMessage;
use crate::time::RtmpTimestamp;
use std::collections::HashMap;

/// State for one multiplexed chunk stream.
///
/// A chunk stream owns at most one in-flight message at a time; between
/// messages only the header snapshot and the cumulative timestamp survive,
/// which is what allows the next message's compressed headers to decode.
#[derive(Debug)]
pub struct ChunkStream {
    pub id: u32,
    pub last_header: Option<HeaderSnapshot>,
    /// Running absolute timestamp for this stream; deltas accumulate here
    pub timestamp: RtmpTimestamp,
    pub(crate) pending: Option<PendingMessage>,
}

impl ChunkStream {
    fn new(id: u32) -> ChunkStream {
        ChunkStream {
            id,
            last_header: None,
            timestamp: RtmpTimestamp::new(0),
            pending: None,
        }
    }
}

/// Lazily populated map of chunk stream id to per-stream state.
///
/// Entries are created on first reference and live for the connection's
/// lifetime.  Each connection owns exactly one table and accesses it from a
/// single execution context, so no synchronization is involved.
#[derive(Debug)]
pub struct ChunkStreamTable {
    streams: HashMap<u32, ChunkStream>,
}

impl ChunkStreamTable {
    pub fn new() -> ChunkStreamTable {
        ChunkStreamTable {
            streams: HashMap::new(),
        }
    }

    pub fn get_or_create(&mut self, id: u32) -> &mut ChunkStream {
        self.streams.entry(id).or_insert_with(|| ChunkStream::new(id))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Default for ChunkStreamTable {
    fn default() -> Self {
        ChunkStreamTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_zeroed_state_for_new_id() {
        let mut table = ChunkStreamTable::new();
        let stream = table.get_or_create(5);

        assert_eq!(stream.id, 5);
        assert_eq!(stream.timestamp, RtmpTimestamp::new(0));
        assert!(stream.last_header.is_none());
        assert!(stream.pending.is_none());
    }

    #[test]
    fn get_or_create_returns_existing_entry() {
        let mut table = ChunkStreamTable::new();
        table.get_or_create(5).timestamp = RtmpTimestamp::new(100);

        assert_eq!(table.get_or_create(5).timestamp, RtmpTimestamp::new(100));
        assert_eq!(table.len(), 1);
    }
}
