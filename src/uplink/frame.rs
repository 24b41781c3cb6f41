//! Frame codec for the co-processor link.
//!
//! Request and reply frames share one layout:
//!
//! ```text
//! [0xAA, 0x55, kind, seq, len_lo, len_hi, payload.., crc_lo, crc_hi]
//! ```
//!
//! The CRC is CRC-16/CCITT-FALSE over everything before it. Replies echo the
//! request's `seq`, set bit 7 of `kind` and start their payload with a status
//! byte (`0` = ok / connected).

use crc16::{State, CCITT_FALSE};
use heapless::Vec;

pub const SYNC: [u8; 2] = [0xAA, 0x55];
pub const HEADER_LEN: usize = 6;
pub const CRC_LEN: usize = 2;
pub const REPLY_FLAG: u8 = 0x80;
pub const STATUS_OK: u8 = 0x00;
pub const MAX_REPLY_PAYLOAD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Kind {
    Status = 0x01,
    Connect = 0x02,
    Publish = 0x03,
    Poll = 0x04,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    BadChecksum,
    TooLong,
}

/// Header for a request carrying `len` payload bytes.
pub fn header(kind: Kind, seq: u8, len: usize) -> Result<[u8; HEADER_LEN], FrameError> {
    let len = u16::try_from(len).map_err(|_| FrameError::TooLong)?;
    let [lo, hi] = len.to_le_bytes();
    Ok([SYNC[0], SYNC[1], kind as u8, seq, lo, hi])
}

/// Trailing CRC over the header and the payload parts, in order.
pub fn checksum(header: &[u8; HEADER_LEN], parts: &[&[u8]]) -> [u8; CRC_LEN] {
    let mut crc = State::<CCITT_FALSE>::new();
    crc.update(header);
    for part in parts {
        crc.update(part);
    }
    crc.get().to_le_bytes()
}

/// Publish payload prefix: topic length then topic, the body follows.
pub fn topic_prefix(topic: &str) -> Result<[u8; 1], FrameError> {
    u8::try_from(topic.len())
        .map(|n| [n])
        .map_err(|_| FrameError::TooLong)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: u8,
    pub seq: u8,
    pub payload: Vec<u8, MAX_REPLY_PAYLOAD>,
}

impl Reply {
    pub fn answers(&self, kind: Kind, seq: u8) -> bool {
        self.kind == (kind as u8 | REPLY_FLAG) && self.seq == seq
    }

    pub fn status(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn is_ok(&self) -> bool {
        self.status() == Some(STATUS_OK)
    }
}

const MAX_REPLY_FRAME: usize = HEADER_LEN + MAX_REPLY_PAYLOAD + CRC_LEN;

/// Byte-at-a-time reply parser. Resynchronises on the sync word after any
/// garbage or a rejected frame.
#[derive(Default)]
pub struct ReplyDecoder {
    buf: Vec<u8, MAX_REPLY_FRAME>,
}

impl ReplyDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Feed one byte; yields once a whole frame has been seen.
    pub fn push(&mut self, byte: u8) -> Option<Result<Reply, FrameError>> {
        match self.buf.len() {
            0 if byte != SYNC[0] => return None,
            1 if byte != SYNC[1] => {
                self.buf.clear();
                if byte == SYNC[0] {
                    let _ = self.buf.push(byte);
                }
                return None;
            }
            _ => {}
        }
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            return Some(Err(FrameError::TooLong));
        }

        if self.buf.len() < HEADER_LEN {
            return None;
        }
        let len = u16::from_le_bytes([self.buf[4], self.buf[5]]) as usize;
        if len > MAX_REPLY_PAYLOAD {
            self.buf.clear();
            return Some(Err(FrameError::TooLong));
        }
        let total = HEADER_LEN + len + CRC_LEN;
        if self.buf.len() < total {
            return None;
        }

        let body = HEADER_LEN + len;
        let expected = State::<CCITT_FALSE>::calculate(&self.buf[..body]);
        let received = u16::from_le_bytes([self.buf[body], self.buf[body + 1]]);
        let result = if expected == received {
            let mut payload = Vec::new();
            let _ = payload.extend_from_slice(&self.buf[HEADER_LEN..body]);
            Ok(Reply {
                kind: self.buf[2],
                seq: self.buf[3],
                payload,
            })
        } else {
            Err(FrameError::BadChecksum)
        };
        self.buf.clear();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: u8, seq: u8, payload: &[u8]) -> std::vec::Vec<u8> {
        let mut out = vec![0xAA, 0x55, kind, seq, payload.len() as u8, 0];
        out.extend_from_slice(payload);
        let crc = State::<CCITT_FALSE>::calculate(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Push every byte, keeping the last frame the decoder yields.
    fn feed(dec: &mut ReplyDecoder, bytes: &[u8]) -> Option<Result<Reply, FrameError>> {
        bytes.iter().fold(None, |last, &b| dec.push(b).or(last))
    }

    #[test]
    fn header_and_checksum_match_whole_frame_crc() {
        let topic = "sic/stage3/bp_data";
        let prefix = topic_prefix(topic).unwrap();
        let body = br#"{"ppg":[1]}"#;
        let len = prefix.len() + topic.len() + body.len();
        let hdr = header(Kind::Publish, 9, len).unwrap();
        let crc = checksum(&hdr, &[&prefix, topic.as_bytes(), body]);

        let mut payload = std::vec::Vec::new();
        payload.extend_from_slice(&prefix);
        payload.extend_from_slice(topic.as_bytes());
        payload.extend_from_slice(body);

        let mut streamed = hdr.to_vec();
        streamed.extend_from_slice(&payload);
        streamed.extend_from_slice(&crc);
        assert_eq!(streamed, frame(Kind::Publish as u8, 9, &payload));
    }

    #[test]
    fn oversize_payload_is_rejected() {
        assert_eq!(header(Kind::Publish, 0, 70_000), Err(FrameError::TooLong));
        let long = "x".repeat(300);
        assert_eq!(topic_prefix(&long), Err(FrameError::TooLong));
    }

    #[test]
    fn decodes_reply_after_garbage() {
        let mut dec = ReplyDecoder::new();
        let mut bytes = vec![0x00, 0xAA, 0x13, 0xAA];
        bytes.extend(frame(Kind::Connect as u8 | REPLY_FLAG, 4, &[STATUS_OK]));

        let reply = feed(&mut dec, &bytes).unwrap().unwrap();
        assert!(reply.answers(Kind::Connect, 4));
        assert!(reply.is_ok());
    }

    #[test]
    fn corrupted_crc_is_reported() {
        let mut bytes = frame(Kind::Poll as u8 | REPLY_FLAG, 1, &[STATUS_OK, 2]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut dec = ReplyDecoder::new();
        assert_eq!(feed(&mut dec, &bytes), Some(Err(FrameError::BadChecksum)));

        // the decoder is usable again straight after
        let good = frame(Kind::Poll as u8 | REPLY_FLAG, 2, &[STATUS_OK, 0]);
        assert!(feed(&mut dec, &good).unwrap().unwrap().answers(Kind::Poll, 2));
    }

    #[test]
    fn truncated_and_foreign_input_yield_nothing() {
        let bytes = frame(Kind::Status as u8 | REPLY_FLAG, 1, &[1]);
        let mut dec = ReplyDecoder::new();
        assert_eq!(feed(&mut dec, &bytes[..5]), None);
        dec.reset();
        assert_eq!(feed(&mut dec, &[0x12, 0x34, 0x56]), None);
    }

    #[test]
    fn oversized_reply_length_is_rejected() {
        let mut dec = ReplyDecoder::new();
        let header = [0xAA, 0x55, Kind::Poll as u8 | REPLY_FLAG, 1, 200, 0];
        assert_eq!(feed(&mut dec, &header), Some(Err(FrameError::TooLong)));
    }

    #[test]
    fn status_reply_reports_disconnected() {
        let mut dec = ReplyDecoder::new();
        let reply = feed(&mut dec, &frame(Kind::Status as u8 | REPLY_FLAG, 7, &[1]))
            .unwrap()
            .unwrap();
        assert!(reply.answers(Kind::Status, 7));
        assert!(!reply.answers(Kind::Status, 8));
        assert!(!reply.is_ok());
    }
}
