//! HDLC framing used by the trace stream
//!
//! Each frame is `seq, record_type, timestamp[4], data.., checksum` with
//! byte-stuffing, terminated by [`FLAG`]. The checksum is the complement of
//! the byte sum of everything before it.

use core::fmt;

/// HDLC flag byte (frame delimiter)
pub const FLAG: u8 = 0x7E;
/// HDLC escape byte
pub const ESC: u8 = 0x7D;
/// XOR mask for escaped bytes
pub const ESC_XOR: u8 = 0x20;

/// Append `byte` to `frame`, escaping reserved values
pub fn stuff<const M: usize>(frame: &mut heapless::Vec<u8, M>, byte: u8) {
    if byte == FLAG || byte == ESC {
        let _ = frame.push(ESC);
        let _ = frame.push(byte ^ ESC_XOR);
    } else {
        let _ = frame.push(byte);
    }
}

/// A decoded, checksum-verified frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<const N: usize> {
    /// Sequence counter maintained by the emitter
    pub seq: u8,
    /// Raw record type byte
    pub record_type: u8,
    /// Timestamp of the record
    pub timestamp: u32,
    /// Record payload after the timestamp
    pub data: heapless::Vec<u8, N>,
}

/// Errors produced while decoding frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the fixed header and checksum
    FrameTooShort(usize),
    /// The frame does not fit the decoder buffer
    FrameTooLong,
    /// The checksum byte does not match the frame contents
    InvalidChecksum { expected: u8, found: u8 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::FrameTooShort(len) => write!(f, "frame too short (len={})", len),
            DecodeError::FrameTooLong => write!(f, "frame exceeds decoder buffer"),
            DecodeError::InvalidChecksum { expected, found } => write!(
                f,
                "checksum mismatch: expected {:#04x}, found {:#04x}",
                expected, found
            ),
        }
    }
}

/// Incremental decoder fed one byte at a time
#[derive(Debug, Default)]
pub struct Decoder<const N: usize> {
    buffer: heapless::Vec<u8, N>,
    escape_next: bool,
    overflow: bool,
}

impl<const N: usize> Decoder<N> {
    /// Create an empty decoder
    pub const fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
            escape_next: false,
            overflow: false,
        }
    }

    /// Clear any partial frame state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.escape_next = false;
        self.overflow = false;
    }

    /// Feed one byte; returns a result whenever a frame is closed
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame<N>, DecodeError>> {
        if byte == FLAG {
            let result = if self.overflow {
                Some(Err(DecodeError::FrameTooLong))
            } else if self.buffer.is_empty() {
                None
            } else {
                Some(Self::decode_frame(&self.buffer))
            };
            self.reset();
            return result;
        }

        let byte = if self.escape_next {
            self.escape_next = false;
            byte ^ ESC_XOR
        } else if byte == ESC {
            self.escape_next = true;
            return None;
        } else {
            byte
        };

        if self.buffer.push(byte).is_err() {
            self.overflow = true;
        }
        None
    }

    fn decode_frame(raw: &[u8]) -> Result<Frame<N>, DecodeError> {
        // seq + type + timestamp + checksum
        if raw.len() < 7 {
            return Err(DecodeError::FrameTooShort(raw.len()));
        }

        let (body, checksum) = raw.split_at(raw.len() - 1);
        let expected = !body.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte));
        if checksum[0] != expected {
            return Err(DecodeError::InvalidChecksum {
                expected,
                found: checksum[0],
            });
        }

        let timestamp = u32::from_le_bytes([body[2], body[3], body[4], body[5]]);
        let data = heapless::Vec::from_slice(&body[6..]).map_err(|_| DecodeError::FrameTooLong)?;

        Ok(Frame {
            seq: body[0],
            record_type: body[1],
            timestamp,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(seq: u8, record_type: u8, timestamp: u32, data: &[u8]) -> heapless::Vec<u8, 128> {
        let mut body = heapless::Vec::<u8, 64>::new();
        body.extend_from_slice(&[seq, record_type]).unwrap();
        body.extend_from_slice(&timestamp.to_le_bytes()).unwrap();
        body.extend_from_slice(data).unwrap();
        let checksum = !body.iter().fold(0u8, |s, &b| s.wrapping_add(b));

        let mut frame = heapless::Vec::new();
        for &byte in body.iter().chain(core::iter::once(&checksum)) {
            stuff(&mut frame, byte);
        }
        frame.push(FLAG).unwrap();
        frame
    }

    #[test]
    fn test_decode_stuffed_frame() {
        let frame = encode(3, 5, 0x7E7D, &[FLAG, 1, ESC]);
        let mut decoder: Decoder<64> = Decoder::new();

        let mut decoded = None;
        for &byte in &frame {
            if let Some(result) = decoder.push(byte) {
                decoded = Some(result);
            }
        }

        let decoded = decoded.unwrap().unwrap();
        assert_eq!(decoded.seq, 3);
        assert_eq!(decoded.record_type, 5);
        assert_eq!(decoded.timestamp, 0x7E7D);
        assert_eq!(&decoded.data[..], &[FLAG, 1, ESC]);
    }

    #[test]
    fn test_corrupted_checksum() {
        let mut frame = encode(0, 1, 0, &[9]);
        let last = frame.len() - 2;
        frame[last] ^= 0x01;

        let mut decoder: Decoder<64> = Decoder::new();
        let result = frame.iter().find_map(|&b| decoder.push(b)).unwrap();
        assert!(matches!(result, Err(DecodeError::InvalidChecksum { .. })));
    }

    #[test]
    fn test_idle_flags_are_skipped() {
        let mut decoder: Decoder<16> = Decoder::new();
        assert!(decoder.push(FLAG).is_none());
        assert!(decoder.push(FLAG).is_none());
        assert_eq!(decoder.push(1), None);
        assert_eq!(decoder.push(FLAG), Some(Err(DecodeError::FrameTooShort(1))));
    }

    #[test]
    fn test_oversized_frame() {
        let mut decoder: Decoder<4> = Decoder::new();
        for byte in 0..10 {
            assert!(decoder.push(byte).is_none());
        }
        assert_eq!(decoder.push(FLAG), Some(Err(DecodeError::FrameTooLong)));
    }
}
