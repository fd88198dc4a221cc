//! # Packet Codec
//!
//! Frames and deframes packets over a [`Transport`].
//!
//! ## Encoding
//!
//! The header is built with the checksum byte zeroed, the 8-bit sum of all
//! header and body bytes is taken, and its two's-complement negation is
//! stored in the checksum byte. Header then body go out on the wire.
//!
//! ## Decoding
//!
//! 1. Read single bytes until one equals [`SIGNATURE`]; anything before it
//!    is discarded. This is how the receiver resynchronizes after noise or
//!    a dropped packet.
//! 2. Read command, id, checksum and the 4-byte length.
//! 3. Reject a length above the limit before touching the body.
//! 4. Read the body and check that header plus body sum to zero.

use tracing::trace;

use crate::codes::{ErrorCode, SIGNATURE};
use crate::error::{CodecError, CodecResult};
use crate::transport::Transport;

/// Size of the fixed packet header in bytes
pub const HEADER_SIZE: usize = 8;

/// Decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader
{
    /// Request, reply, event or error code
    pub command: u8,
    /// Request identifier, echoed in the reply
    pub id: u8,
    /// Checksum byte as carried on the wire
    pub checksum: u8,
    /// Body length in bytes
    pub length: u32,
}

impl PacketHeader
{
    /// Serialize the header exactly as it travels on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE]
    {
        let len = self.length.to_le_bytes();
        [SIGNATURE, self.command, self.id, self.checksum, len[0], len[1], len[2], len[3]]
    }
}

/// A received packet: header plus owned body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet
{
    /// Packet header
    pub header: PacketHeader,
    /// Body bytes, `header.length` long
    pub body: Vec<u8>,
}

/// 8-bit wrapping sum of every byte in `parts`.
fn byte_sum(parts: &[&[u8]]) -> u8
{
    parts
        .iter()
        .flat_map(|part| part.iter())
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Build a header for `body`, with the checksum filled in.
#[must_use]
pub fn encode_header(command: u8, id: u8, body: &[u8]) -> [u8; HEADER_SIZE]
{
    debug_assert!(u32::try_from(body.len()).is_ok());
    let mut header = PacketHeader {
        command,
        id,
        checksum: 0,
        length: body.len() as u32,
    };
    let sum = byte_sum(&[&header.to_bytes(), body]);
    header.checksum = sum.wrapping_neg();
    header.to_bytes()
}

/// Encode a full packet into a fresh buffer.
#[must_use]
pub fn encode_packet(command: u8, id: u8, body: &[u8]) -> Vec<u8>
{
    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(&encode_header(command, id, body));
    bytes.extend_from_slice(body);
    bytes
}

/// Frame and send one packet.
///
/// ## Errors
///
/// Returns the transport's I/O error.
pub fn send_packet<T: Transport + ?Sized>(transport: &mut T, command: u8, id: u8, body: &[u8]) -> std::io::Result<()>
{
    trace!(command, id, len = body.len(), "send packet");
    transport.send(&encode_header(command, id, body))?;
    if !body.is_empty() {
        transport.send(body)?;
    }
    Ok(())
}

/// Send a zero-length error packet echoing `id`.
///
/// ## Errors
///
/// Returns the transport's I/O error.
pub fn send_error<T: Transport + ?Sized>(transport: &mut T, code: ErrorCode, id: u8) -> std::io::Result<()>
{
    send_packet(transport, code.code(), id, &[])
}

/// Receive one packet, resynchronizing on the signature byte.
///
/// The body is written into `body`, which is resized to the received length
/// so callers can reuse one buffer across packets.
///
/// ## Errors
///
/// - `OversizedPacket`: the length field exceeds `max_len`; no body bytes were read
/// - `ChecksumMismatch`: header and body do not sum to zero
/// - `Io`: the transport failed
pub fn recv_packet<T: Transport + ?Sized>(transport: &mut T, body: &mut Vec<u8>, max_len: usize) -> CodecResult<PacketHeader>
{
    let mut byte = [0u8; 1];
    let mut skipped = 0usize;
    loop {
        transport.recv(&mut byte)?;
        if byte[0] == SIGNATURE {
            break;
        }
        skipped += 1;
    }
    if skipped > 0 {
        trace!(skipped, "resynchronized on packet signature");
    }

    let mut rest = [0u8; HEADER_SIZE - 1];
    transport.recv(&mut rest)?;
    let header = PacketHeader {
        command: rest[0],
        id: rest[1],
        checksum: rest[2],
        length: u32::from_le_bytes([rest[3], rest[4], rest[5], rest[6]]),
    };

    if header.length as usize > max_len {
        return Err(CodecError::OversizedPacket {
            length: header.length,
            max: max_len,
        });
    }

    body.clear();
    body.resize(header.length as usize, 0);
    transport.recv(body)?;

    let sum = byte_sum(&[&header.to_bytes(), body]);
    if sum != 0 {
        return Err(CodecError::ChecksumMismatch { sum });
    }

    Ok(header)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::codes::MAX_PACKET_LEN;
    use crate::transport::ScriptedLink;

    #[test]
    fn test_packet_sums_to_zero()
    {
        let bytes = encode_packet(0x02, 9, &[1, 2, 3, 250]);
        let sum = bytes.iter().fold(0u8, |s, b| s.wrapping_add(*b));
        assert_eq!(sum, 0);
        assert_eq!(bytes[0], SIGNATURE);
        assert_eq!(&bytes[4..8], &4u32.to_le_bytes());
    }

    #[test]
    fn test_empty_body_packet()
    {
        let mut link = ScriptedLink::new();
        send_error(&mut link, ErrorCode::InvalidCommand, 42).unwrap();
        assert_eq!(link.outbound().len(), HEADER_SIZE);

        let packets = link.take_sent_packets().unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].header.command, ErrorCode::InvalidCommand.code());
        assert_eq!(packets[0].header.id, 42);
        assert!(packets[0].body.is_empty());
    }

    #[test]
    fn test_oversized_rejected_before_body()
    {
        let mut link = ScriptedLink::new();
        let len = (MAX_PACKET_LEN as u32 + 1).to_le_bytes();
        link.push_bytes(&[SIGNATURE, 0x02, 1, 0, len[0], len[1], len[2], len[3]]);
        link.push_bytes(&[0x55; 16]);

        let mut body = Vec::new();
        let err = recv_packet(&mut link, &mut body, MAX_PACKET_LEN).unwrap_err();
        assert!(matches!(err, CodecError::OversizedPacket { .. }));
        assert!(err.is_framing());
        assert_eq!(link.pending_inbound(), 16);
    }

    #[test]
    fn test_eof_is_not_framing()
    {
        let mut link = ScriptedLink::new();
        let mut body = Vec::new();
        let err = recv_packet(&mut link, &mut body, MAX_PACKET_LEN).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
        assert!(!err.is_framing());
    }
}
