//! Wire-protocol engine for RTMP.
//!
//! This crate implements the layer of RTMP that sits directly on top of a
//! connected byte stream: the three-packet handshake, the chunk framing
//! protocol with its four header-compression formats, and the reassembly of
//! interleaved chunks back into complete messages.  Message bodies are opaque
//! to this crate; command dispatch, AMF encoding, and audio/video semantics
//! belong to the layer above.
//!
//! The entry point is [`connection::Connection`], which owns a blocking
//! `Read + Write` transport and exposes `handshake()`, `read_message()` and
//! `send_message()`.

pub mod chunk;
pub mod connection;
pub mod handshake;
pub mod message;
pub mod time;

pub use self::connection::{Connection, ConnectionError};
pub use self::handshake::Role;
pub use self::message::Message;
pub use self::time::RtmpTimestamp;
