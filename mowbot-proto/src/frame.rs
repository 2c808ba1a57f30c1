//! WebSocket frame codec (RFC 6455, client side).
//!
//! Frame layout:
//!
//! ```text
//! byte 0     FIN(1) RSV(3) OPCODE(4)
//! byte 1     MASK(1) LEN(7)          LEN 126 -> u16 follows, 127 -> u64 follows
//! [4 bytes]  masking key (present when MASK is set)
//! payload
//! ```
//!
//! Frames sent by the remote are always masked. Frames from the robot are
//! expected unmasked, but a masked frame is unmasked in place. The robot
//! never fragments messages, so continuation frames are rejected.

/// Largest header: 2 + 8 (extended length) + 4 (mask).
pub const MAX_HEADER_LEN: usize = 14;

/// Longest payload allowed on a control frame.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    /// Parse the low nibble of the first header byte.
    pub const fn from_bits(bits: u8) -> Result<Self, FrameError> {
        match bits {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    /// Close, ping and pong are control frames.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// Error type for frame encoding and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// A reserved header bit is set (no extensions are negotiated).
    ReservedBits,
    /// Opcode is not defined by RFC 6455.
    UnknownOpcode(u8),
    /// Fragmented message (FIN clear or continuation frame).
    Fragmented,
    /// Payload length exceeds the receive buffer.
    TooLarge,
    /// Output buffer cannot hold the encoded frame.
    BufferTooSmall,
    /// Control frame payload longer than [`MAX_CONTROL_PAYLOAD`].
    ControlTooLong,
}

/// Location of one decoded frame inside the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    /// Offset of the first payload byte.
    pub payload_offset: usize,
    pub payload_len: usize,
}

impl Frame {
    /// Offset just past the frame; the next frame starts here.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.payload_offset + self.payload_len
    }

    /// Borrow the (unmasked) payload from the buffer the frame was decoded from.
    #[inline]
    #[must_use]
    pub fn payload<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.payload_offset..self.end()]
    }
}

/// Parsed frame header, available before the payload has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub opcode: Opcode,
    /// Header length including the masking key.
    pub header_len: usize,
    pub payload_len: usize,
    pub mask: Option<[u8; 4]>,
}

impl FrameHeader {
    /// Header plus payload.
    #[inline]
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        self.header_len + self.payload_len
    }
}

/// Decode just the header at the start of `buf`.
///
/// Returns `Ok(None)` until the whole header (including any masking key)
/// is present. The payload length is checked so that
/// [`FrameHeader::frame_len`] cannot overflow.
pub fn decode_header(buf: &[u8]) -> Result<Option<FrameHeader>, FrameError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let b0 = buf[0];
    let b1 = buf[1];
    if b0 & 0x70 != 0 {
        return Err(FrameError::ReservedBits);
    }
    let fin = b0 & 0x80 != 0;
    let opcode = Opcode::from_bits(b0 & 0x0F)?;
    if !fin || opcode == Opcode::Continuation {
        return Err(FrameError::Fragmented);
    }

    let masked = b1 & 0x80 != 0;
    let (payload_len, mut offset) = match b1 & 0x7F {
        126 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut len = [0u8; 8];
            len.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(len), 10)
        }
        short => (short as u64, 2),
    };

    if opcode.is_control() && payload_len > MAX_CONTROL_PAYLOAD as u64 {
        return Err(FrameError::ControlTooLong);
    }

    let mask = if masked {
        if buf.len() < offset + 4 {
            return Ok(None);
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };

    let payload_len = usize::try_from(payload_len).map_err(|_| FrameError::TooLarge)?;
    offset.checked_add(payload_len).ok_or(FrameError::TooLarge)?;

    Ok(Some(FrameHeader {
        opcode,
        header_len: offset,
        payload_len,
        mask,
    }))
}

/// Decode the frame at the start of `buf`.
///
/// Returns `Ok(None)` while the frame is incomplete. When `buf` is the whole
/// receive buffer and the declared length still does not fit,
/// [`FrameError::TooLarge`] is returned so the caller can drop the session.
/// A masked payload is unmasked in place.
pub fn decode_frame(buf: &mut [u8]) -> Result<Option<Frame>, FrameError> {
    decode_frame_with_capacity(buf, usize::MAX)
}

/// Like [`decode_frame`], but rejects frames longer than `capacity` bytes
/// as soon as their header is readable.
///
/// Callers that want to skip an oversized frame instead use
/// [`decode_header`] and discard [`FrameHeader::frame_len`] bytes.
pub fn decode_frame_with_capacity(
    buf: &mut [u8],
    capacity: usize,
) -> Result<Option<Frame>, FrameError> {
    let Some(header) = decode_header(buf)? else {
        return Ok(None);
    };

    let total = header.frame_len();
    if total > capacity {
        return Err(FrameError::TooLarge);
    }
    if buf.len() < total {
        return Ok(None);
    }

    if let Some(key) = header.mask {
        apply_mask(&mut buf[header.header_len..total], key);
    }

    Ok(Some(Frame {
        opcode: header.opcode,
        payload_offset: header.header_len,
        payload_len: header.payload_len,
    }))
}

/// Encode one masked client frame into `out`. Returns the frame length.
pub fn encode_frame(
    opcode: Opcode,
    payload: &[u8],
    mask: [u8; 4],
    out: &mut [u8],
) -> Result<usize, FrameError> {
    if opcode.is_control() && payload.len() > MAX_CONTROL_PAYLOAD {
        return Err(FrameError::ControlTooLong);
    }

    let len = payload.len();
    let header_len = match len {
        0..=125 => 2,
        126..=0xFFFF => 4,
        _ => 10,
    } + 4;
    let total = header_len + len;
    if out.len() < total {
        return Err(FrameError::BufferTooSmall);
    }

    out[0] = 0x80 | opcode.bits();
    let mut pos = match len {
        0..=125 => {
            out[1] = 0x80 | len as u8;
            2
        }
        126..=0xFFFF => {
            out[1] = 0x80 | 126;
            out[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        }
        _ => {
            out[1] = 0x80 | 127;
            out[2..10].copy_from_slice(&(len as u64).to_be_bytes());
            10
        }
    };
    out[pos..pos + 4].copy_from_slice(&mask);
    pos += 4;

    out[pos..total].copy_from_slice(payload);
    apply_mask(&mut out[pos..total], mask);
    Ok(total)
}

/// XOR `data` with the repeating 4-byte masking key.
#[inline]
fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}
