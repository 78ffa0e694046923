//! The length-prefixed frame envelope: `[len u32][version u8][type u8][flags u8][payload]`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;

/// The protocol version this build speaks. Bumped whenever the wire
/// contract changes in a way that isn't purely additive.
pub const PROTOCOL_VERSION: u8 = 2;

/// The minimum peer version that may receive a compressed payload.
/// v1 peers cannot decompress; the compressed flag must never be set
/// for them (§4.1).
const MIN_COMPRESSION_PEER_VERSION: u8 = 2;

/// Frames above this size (length field value) are rejected outright.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Payloads below this size are never worth compressing.
const COMPRESSION_THRESHOLD: usize = 512;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u8 {
        const COMPRESSED = 0b0000_0001;
        const ENCRYPTED   = 0b0000_0010;
    }
}

/// A decoded (or to-be-encoded) protocol frame. `payload` is always the
/// *plaintext, uncompressed* application payload — compression and the
/// encrypted-opaque-blob handling are purely a wire concern and are
/// undone/applied by [`Frame::decode`]/[`Frame::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub kind: u8,
    pub flags: FrameFlags,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: u8, payload: Bytes) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            flags: FrameFlags::empty(),
            payload,
        }
    }

    pub fn encrypted(kind: u8, payload: Bytes) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            flags: FrameFlags::ENCRYPTED,
            payload,
        }
    }

    /// Encode this frame for a peer known to speak `peer_version`.
    /// Compression is only ever applied for peers at version 2+, and
    /// never for an already-encrypted payload (§9: "never compress
    /// already-encrypted payloads").
    pub fn encode(&self, peer_version: u8) -> Result<Bytes, CodecError> {
        let should_try_compress = !self.flags.contains(FrameFlags::ENCRYPTED)
            && peer_version >= MIN_COMPRESSION_PEER_VERSION
            && self.payload.len() >= COMPRESSION_THRESHOLD;

        let (flags, wire_payload) = if should_try_compress {
            let compressed = compress(&self.payload);
            if compressed.len() < self.payload.len() {
                (self.flags | FrameFlags::COMPRESSED, compressed)
            } else {
                (self.flags, self.payload.clone())
            }
        } else {
            (self.flags - FrameFlags::COMPRESSED, self.payload.clone())
        };

        let body_len = 1 + 1 + 1 + wire_payload.len(); // version + type + flags + payload
        if body_len > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge(body_len));
        }

        let mut out = BytesMut::with_capacity(4 + body_len);
        out.put_u32(body_len as u32);
        out.put_u8(self.version);
        out.put_u8(self.kind);
        out.put_u8(flags.bits());
        out.put_slice(&wire_payload);
        Ok(out.freeze())
    }

    /// Decode one frame from a buffer that already contains at least the
    /// 4-byte length prefix plus that many bytes (callers using a
    /// `tokio_util::codec`-style reassembly buffer check this first).
    pub fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::UnexpectedEof("frame length"));
        }
        let len = buf.get_u32();
        if (len as usize) < 3 {
            return Err(CodecError::InvalidFrameLength(len));
        }
        if len as usize > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge(len as usize));
        }
        if buf.remaining() < len as usize {
            return Err(CodecError::UnexpectedEof("frame body"));
        }

        let mut body = buf.copy_to_bytes(len as usize);
        let version = body.get_u8();
        let kind = body.get_u8();
        let mut flags = FrameFlags::from_bits_truncate(body.get_u8());
        let wire_payload = body;

        let payload = if flags.contains(FrameFlags::COMPRESSED) {
            if flags.contains(FrameFlags::ENCRYPTED) {
                // Compression must never coexist with encryption (§9); an
                // encoder that set both is malformed. Treat the flag as
                // advisory-ignored rather than failing the whole frame.
                flags.remove(FrameFlags::COMPRESSED);
                wire_payload
            } else {
                decompress(wire_payload)?
            }
        } else {
            wire_payload
        };

        Ok(Frame {
            version,
            kind,
            flags,
            payload,
        })
    }

    /// Number of bytes the length prefix covers, were this frame encoded
    /// uncompressed. Used by callers validating an incoming length
    /// before buffering the rest of the frame.
    pub fn would_exceed_max(declared_len: u32) -> bool {
        declared_len as usize > MAX_FRAME_LEN
    }
}

fn compress(payload: &Bytes) -> Bytes {
    let block = lz4_flex::block::compress(payload);
    let mut out = BytesMut::with_capacity(4 + block.len());
    out.put_u32(payload.len() as u32);
    out.put_slice(&block);
    out.freeze()
}

fn decompress(mut wire_payload: Bytes) -> Result<Bytes, CodecError> {
    if wire_payload.remaining() < 4 {
        return Err(CodecError::UnexpectedEof("compressed payload header"));
    }
    let uncompressed_len = wire_payload.get_u32();
    if uncompressed_len as usize > MAX_FRAME_LEN {
        return Err(CodecError::InvalidCompressedLen(uncompressed_len));
    }
    let decompressed =
        lz4_flex::block::decompress(&wire_payload, uncompressed_len as usize)?;
    Ok(Bytes::from(decompressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_small_payload() {
        let frame = Frame::new(0x0A, Bytes::from_static(b"hello"));
        let wire = frame.encode(2).unwrap();
        let mut wire = wire;
        let decoded = Frame::decode(&mut wire).unwrap();
        assert_eq!(decoded.payload, Bytes::from_static(b"hello"));
        assert!(!decoded.flags.contains(FrameFlags::COMPRESSED));
    }

    #[test]
    fn compresses_large_compressible_payload_for_v2_peer() {
        let payload = Bytes::from("ab".repeat(5000));
        let frame = Frame::new(0x0A, payload.clone());
        let wire = frame.encode(2).unwrap();
        let mut wire_for_decode = wire.clone();
        // Peek at the flags byte directly: [len:4][version:1][type:1][flags:1]
        let flags_byte = wire[6];
        assert_eq!(flags_byte & FrameFlags::COMPRESSED.bits(), FrameFlags::COMPRESSED.bits());

        let decoded = Frame::decode(&mut wire_for_decode).unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn never_compresses_for_v1_peer() {
        let payload = Bytes::from("ab".repeat(5000));
        let frame = Frame::new(0x0A, payload);
        let wire = frame.encode(1).unwrap();
        let flags_byte = wire[6];
        assert_eq!(flags_byte & FrameFlags::COMPRESSED.bits(), 0);
    }

    #[test]
    fn never_compresses_small_payload() {
        let payload = Bytes::from_static(b"short");
        let frame = Frame::new(0x0A, payload);
        let wire = frame.encode(2).unwrap();
        let flags_byte = wire[6];
        assert_eq!(flags_byte & FrameFlags::COMPRESSED.bits(), 0);
    }

    #[test]
    fn never_compresses_encrypted_payload() {
        let payload = Bytes::from("x".repeat(5000));
        let frame = Frame::encrypted(0x0A, payload.clone());
        let wire = frame.encode(2).unwrap();
        let flags_byte = wire[6];
        assert_eq!(flags_byte & FrameFlags::COMPRESSED.bits(), 0);
        assert_eq!(flags_byte & FrameFlags::ENCRYPTED.bits(), FrameFlags::ENCRYPTED.bits());
    }

    #[test]
    fn oversized_frame_fails_to_encode() {
        let payload = Bytes::from(vec![0u8; 2 * 1024 * 1024]);
        let frame = Frame::new(0x0A, payload);
        let err = frame.encode(2).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(_)));
    }

    #[test]
    fn oversized_declared_length_fails_to_decode() {
        let mut buf = BytesMut::new();
        buf.put_u32(2_000_000);
        buf.put_u8(2);
        buf.put_u8(0x0A);
        buf.put_u8(0);
        let mut frozen = buf.freeze();
        let err = Frame::decode(&mut frozen).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(_)));
    }

    #[test]
    fn frame_length_below_minimum_fails() {
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.put_u8(2);
        buf.put_u8(0);
        let mut frozen = buf.freeze();
        let err = Frame::decode(&mut frozen).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFrameLength(2)));
    }

    #[test]
    fn decompression_refuses_oversized_uncompressed_len() {
        let mut payload = BytesMut::new();
        payload.put_u32(2 * 1024 * 1024);
        payload.put_slice(b"not actually lz4 but we fail before touching it");
        let err = decompress(payload.freeze()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidCompressedLen(_)));
    }
}
