//! Waves P2P wire format.
//!
//! Frame format (all integers big-endian):
//! `[length u32][magic u32][content_id u8][payload_len u32][checksum 4][payload]`
//!
//! `length` counts every byte after itself. A frame with an empty payload
//! carries no checksum (length == 9). The checksum is the first 4 bytes of
//! blake2b-256 over the payload.
//!
//! The handshake is not framed; each peer sends one right after connecting.

use crate::address::blake2b256;
use crate::constants::protocol::{
    CHECKSUM_LEN, CONTENT_ID_SCORE, DECLARED_LOOPBACK, DEFAULT_VERSION, FRAME_HEADER_LEN,
    FRAME_HEADER_WITH_CHECKSUM_LEN, MAGIC,
};
use crate::error::DecodeError;
use crate::network_type::NetworkType;

/// One decoded frame, borrowing its payload from the receive buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub length: u32,
    pub magic: u32,
    pub content_id: u8,
    pub payload_len: u32,
    pub checksum: Option<[u8; CHECKSUM_LEN]>,
    pub payload: &'a [u8],
}

impl Frame<'_> {
    /// True when the carried checksum matches the payload (or there is none)
    pub fn checksum_valid(&self) -> bool {
        match self.checksum {
            Some(checksum) => checksum == payload_checksum(self.payload),
            None => true,
        }
    }

    /// Re-serialize with a freshly computed checksum
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.content_id, self.payload)
    }
}

pub fn payload_checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = blake2b256(payload);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&hash[..CHECKSUM_LEN]);
    checksum
}

/// Serialize a frame for the given content id and payload.
pub fn encode_frame(content_id: u8, payload: &[u8]) -> Vec<u8> {
    let header_len = if payload.is_empty() {
        FRAME_HEADER_LEN
    } else {
        FRAME_HEADER_WITH_CHECKSUM_LEN
    };
    let length = (header_len - 4 + payload.len()) as u32;

    let mut frame = Vec::with_capacity(header_len + payload.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(&MAGIC.to_be_bytes());
    frame.push(content_id);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    if !payload.is_empty() {
        frame.extend_from_slice(&payload_checksum(payload));
        frame.extend_from_slice(payload);
    }
    frame
}

/// Iterate over the frames of one receive buffer.
///
/// Yields frames until the buffer is exhausted. A partial frame at the end
/// of the buffer is dropped. A magic mismatch or a malformed header yields
/// one error and ends the iteration.
pub fn parse_frames(buf: &[u8]) -> FrameIter<'_> {
    FrameIter { buf, done: false }
}

pub struct FrameIter<'a> {
    buf: &'a [u8],
    done: bool,
}

impl<'a> FrameIter<'a> {
    fn fail(&mut self, err: DecodeError) -> Option<Result<Frame<'a>, DecodeError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Result<Frame<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.buf.is_empty() {
            return None;
        }

        let buf = self.buf;
        if buf.len() >= 8 {
            let magic = read_u32(buf, 4);
            if magic != MAGIC {
                return self.fail(DecodeError::BadMagic { found: magic });
            }
        }
        if buf.len() < FRAME_HEADER_LEN {
            self.done = true;
            return None;
        }

        let length = read_u32(buf, 0);
        let total = (length as usize).saturating_add(4);
        if total < FRAME_HEADER_LEN {
            return self.fail(DecodeError::TruncatedFrame {
                needed: FRAME_HEADER_LEN,
                available: total,
            });
        }
        if buf.len() < total {
            // Rest of the frame arrives in a later read; single-buffer parsing drops it
            self.done = true;
            return None;
        }

        let content_id = buf[8];
        let payload_len = read_u32(buf, 9);

        let (checksum, payload) = if total == FRAME_HEADER_LEN {
            (None, &buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN])
        } else {
            let payload_end = FRAME_HEADER_WITH_CHECKSUM_LEN.saturating_add(payload_len as usize);
            if total < FRAME_HEADER_WITH_CHECKSUM_LEN || payload_end > total {
                return self.fail(DecodeError::TruncatedFrame {
                    needed: payload_end.max(FRAME_HEADER_WITH_CHECKSUM_LEN),
                    available: total,
                });
            }
            let mut checksum = [0u8; CHECKSUM_LEN];
            checksum.copy_from_slice(&buf[FRAME_HEADER_LEN..FRAME_HEADER_WITH_CHECKSUM_LEN]);
            (
                Some(checksum),
                &buf[FRAME_HEADER_WITH_CHECKSUM_LEN..payload_end],
            )
        };

        self.buf = &buf[total..];
        Some(Ok(Frame {
            length,
            magic: MAGIC,
            content_id,
            payload_len,
            checksum,
            payload,
        }))
    }
}

/// Score payload layout: minimal big-endian two's complement (Java BigInteger),
/// so a leading zero byte is added when the top bit is set.
pub fn encode_score(score: u128) -> Vec<u8> {
    let bytes = score.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut out = Vec::with_capacity(17);
    if bytes[first] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[first..]);
    out
}

pub fn decode_score(payload: &[u8]) -> Result<u128, DecodeError> {
    let first = payload
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(payload.len());
    let digits = &payload[first..];
    if digits.len() > 16 {
        return Err(DecodeError::ScoreTooLarge(payload.len()));
    }
    Ok(digits
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

pub fn build_score_frame(score: u128) -> Vec<u8> {
    encode_frame(CONTENT_ID_SCORE, &encode_score(score))
}

/// Peer identification exchanged once per connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub network: NetworkType,
    pub version: (u32, u32, u32),
    pub node_name: String,
    pub nonce: u64,
    pub declared_address: u32,
    pub declared_port: u32,
    pub timestamp: u64,
}

impl Handshake {
    /// Our own handshake, declaring 127.0.0.1 and the local socket port
    pub fn local(port: u16, network: NetworkType, node_name: &str, version: (u32, u32, u32)) -> Self {
        Self {
            network,
            version,
            node_name: node_name.to_string(),
            nonce: rand::random::<u64>(),
            declared_address: DECLARED_LOOPBACK,
            declared_port: u32::from(port),
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let chain_name = self.network.chain_name();
        let name = self.node_name.as_bytes();
        let name = &name[..name.len().min(u8::MAX as usize)];

        let mut out = Vec::with_capacity(1 + chain_name.len() + 12 + 1 + name.len() + 28);
        out.push(chain_name.len() as u8);
        out.extend_from_slice(chain_name);
        out.extend_from_slice(&self.version.0.to_be_bytes());
        out.extend_from_slice(&self.version.1.to_be_bytes());
        out.extend_from_slice(&self.version.2.to_be_bytes());
        out.push(name.len() as u8);
        out.extend_from_slice(name);
        out.extend_from_slice(&self.nonce.to_be_bytes());
        // Declared address: length, IPv4 bytes, port
        out.extend_from_slice(&8u32.to_be_bytes());
        out.extend_from_slice(&self.declared_address.to_be_bytes());
        out.extend_from_slice(&self.declared_port.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out
    }

    /// Returns `None` when the buffer does not start with a recognized handshake
    pub fn decode(buf: &[u8]) -> Option<Self> {
        Self::decode_prefix(buf).map(|(handshake, _)| handshake)
    }

    /// Decode a handshake at the start of `buf`, also returning its encoded length
    pub fn decode_prefix(buf: &[u8]) -> Option<(Self, usize)> {
        let mut r = Reader::new(buf);
        if r.u8()? != 6 {
            return None;
        }
        let network = NetworkType::from_chain_name(r.take(6)?)?;
        let version = (r.u32()?, r.u32()?, r.u32()?);
        let name_len = r.u8()? as usize;
        let node_name = String::from_utf8_lossy(r.take(name_len)?).into_owned();
        let nonce = r.u64()?;

        let (declared_address, declared_port) = match r.u32()? as usize {
            0 => (0, 0),
            len if len >= 4 => {
                let addr = r.take(len - 4)?;
                let declared_address = match <[u8; 4]>::try_from(addr) {
                    Ok(v4) => u32::from_be_bytes(v4),
                    Err(_) => 0,
                };
                (declared_address, r.u32()?)
            }
            _ => return None,
        };
        let timestamp = r.u64()?;

        let handshake = Self {
            network,
            version,
            node_name,
            nonce,
            declared_address,
            declared_port,
            timestamp,
        };
        Some((handshake, r.pos))
    }
}

pub fn build_handshake(port: u16, is_testnet: bool) -> Vec<u8> {
    Handshake::local(
        port,
        NetworkType::from_testnet_flag(is_testnet),
        "wavescache",
        DEFAULT_VERSION,
    )
    .encode()
}

pub fn decode_handshake(buf: &[u8]) -> Option<Handshake> {
    Handshake::decode(buf)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Bounds-checked big-endian cursor
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Option<u64> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Some(u64::from_be_bytes(out))
    }
}
