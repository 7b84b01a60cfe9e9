//! The RTMP handshake: a fixed exchange of one version byte and three
//! 1536 byte packets in each direction, completed before any chunk traffic.
//!
//! Both sides run the same packet-building logic; the only difference
//! between the client and server variants is which side sends first, so the
//! role is an enum selecting the sequence rather than two implementations.
//! Completing the handshake establishes the connection's timestamp epoch.

mod errors;

pub use self::errors::HandshakeError;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use rand::Rng;
use std::io::{Cursor, Read, Write};
use std::time::Instant;

/// Total size of each of the three large handshake packets
pub const PACKET_SIZE: usize = 1536;

const RANDOM_SIZE: usize = 1528;
const RTMP_VERSION: u8 = 3;

/// Which side of the connection this engine plays.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub enum Role {
    Client,
    Server,
}

#[derive(Eq, PartialEq, Debug)]
enum State {
    Start,
    VersionExchanged,
    PeerEpochKnown,
    Complete,
    Failed,
}

/// One large handshake packet: two 4 byte time fields and 1528 bytes of
/// pseudo-random filler the peer must echo back.
struct Packet {
    time: u32,
    time2: u32,
    random: [u8; RANDOM_SIZE],
}

/// One-shot handshake state machine, driven by blocking transport reads and
/// writes.  Any failure is terminal; the engine cannot be restarted.
pub struct Handshake {
    role: Role,
    state: State,
    my_epoch: u32,
    peer_epoch: u32,
    my_random: [u8; RANDOM_SIZE],
}

impl Handshake {
    pub fn new(role: Role) -> Handshake {
        let mut my_random = [0_u8; RANDOM_SIZE];
        rand::thread_rng().fill(&mut my_random[..]);

        Handshake {
            role,
            state: State::Start,
            my_epoch: 0,
            peer_epoch: 0,
            my_random,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// The epoch the peer declared in its first packet.  Diagnostic only;
    /// nothing in the chunk layer depends on it.
    pub fn peer_epoch(&self) -> u32 {
        self.peer_epoch
    }

    /// Runs the full handshake to completion, blocking on the transport.
    ///
    /// Returns the instant the local timestamp epoch was established.  Any
    /// error (bad version byte, short read or write) is terminal and leaves
    /// the engine in a failed state; the caller must close the transport.
    pub fn perform<T: Read + Write>(
        &mut self,
        transport: &mut T,
    ) -> Result<Instant, HandshakeError> {
        if self.state != State::Start {
            return Err(HandshakeError::AlreadyPerformed);
        }

        match self.run(transport) {
            Ok(epoch) => {
                self.state = State::Complete;
                Ok(epoch)
            }

            Err(error) => {
                self.state = State::Failed;
                Err(error)
            }
        }
    }

    fn run<T: Read + Write>(&mut self, transport: &mut T) -> Result<Instant, HandshakeError> {
        let epoch = match self.role {
            Role::Server => {
                let version = transport.read_u8()?;
                if version != RTMP_VERSION {
                    return Err(HandshakeError::BadVersionId { version });
                }

                transport.write_u8(RTMP_VERSION)?;
                let epoch = Instant::now();
                self.state = State::VersionExchanged;

                self.send_own_packet(transport)?;
                let peer_packet = self.receive_peer_packet(transport)?;
                self.send_acknowledgement(transport, epoch, &peer_packet)?;
                read_packet(transport)?; // presence and length only

                epoch
            }

            Role::Client => {
                transport.write_u8(RTMP_VERSION)?;
                let epoch = Instant::now();
                self.send_own_packet(transport)?;

                let version = transport.read_u8()?;
                if version != RTMP_VERSION {
                    return Err(HandshakeError::BadVersionId { version });
                }
                self.state = State::VersionExchanged;

                let peer_packet = self.receive_peer_packet(transport)?;
                self.send_acknowledgement(transport, epoch, &peer_packet)?;
                read_packet(transport)?; // presence and length only

                epoch
            }
        };

        Ok(epoch)
    }

    fn send_own_packet<W: Write>(&self, writer: &mut W) -> Result<(), HandshakeError> {
        write_packet(writer, self.my_epoch, 0, &self.my_random)
    }

    fn receive_peer_packet<R: Read>(&mut self, reader: &mut R) -> Result<Packet, HandshakeError> {
        let packet = read_packet(reader)?;
        self.peer_epoch = packet.time;
        self.state = State::PeerEpochKnown;
        debug!(
            "Peer declared handshake epoch {} (time2 field {})",
            self.peer_epoch, packet.time2
        );
        Ok(packet)
    }

    /// The acknowledgement echoes the peer's 1528 random bytes verbatim; the
    /// two leading time fields become the peer's declared epoch and the local
    /// time the packet was received.
    fn send_acknowledgement<W: Write>(
        &self,
        writer: &mut W,
        epoch: Instant,
        peer_packet: &Packet,
    ) -> Result<(), HandshakeError> {
        let read_time = epoch.elapsed().as_millis() as u32;
        write_packet(writer, peer_packet.time, read_time, &peer_packet.random)
    }
}

fn write_packet<W: Write>(
    writer: &mut W,
    time: u32,
    time2: u32,
    random: &[u8; RANDOM_SIZE],
) -> Result<(), HandshakeError> {
    writer.write_u32::<BigEndian>(time)?;
    writer.write_u32::<BigEndian>(time2)?;
    writer.write_all(random)?;
    writer.flush()?;
    Ok(())
}

fn read_packet<R: Read>(reader: &mut R) -> Result<Packet, HandshakeError> {
    let mut bytes = [0_u8; PACKET_SIZE];
    reader.read_exact(&mut bytes)?;

    let mut cursor = Cursor::new(&bytes[..]);
    let time = cursor.read_u32::<BigEndian>()?;
    let time2 = cursor.read_u32::<BigEndian>()?;
    let mut random = [0_u8; RANDOM_SIZE];
    cursor.read_exact(&mut random)?;

    Ok(Packet {
        time,
        time2,
        random,
    })
}
