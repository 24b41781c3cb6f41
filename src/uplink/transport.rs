//! [`Transport`] over a byte stream to the co-processor.
//!
//! Only the startup probe and reconnects wait for a reply, bounded by the
//! reply timeout. Maintenance polls and publishes are fire-and-forget; poll
//! replies are collected on the following tick.

use embedded_io::{Read, ReadReady, Write};

use super::frame::{self, FrameError, Kind, Reply, ReplyDecoder};
use crate::clock::Clock;
use crate::link::{Topic, Transport};

/// Unanswered polls before the link is considered down.
const MAX_MISSED_POLLS: u8 = 3;
/// Upper bound on bytes consumed per drain, keeps a tick O(1).
const DRAIN_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UplinkError {
    Io(embedded_io::ErrorKind),
    Frame(FrameError),
    Timeout,
    Nack,
}

impl From<FrameError> for UplinkError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

fn io<E: embedded_io::Error>(e: E) -> UplinkError {
    UplinkError::Io(e.kind())
}

pub struct UartUplink<U, C> {
    uart: U,
    clock: C,
    client_id: &'static str,
    reply_timeout_ms: u64,
    seq: u8,
    connected: bool,
    pending_poll: Option<u8>,
    missed_polls: u8,
    decoder: ReplyDecoder,
}

impl<U, C> UartUplink<U, C>
where
    U: Read + Write + ReadReady,
    C: Clock,
{
    pub fn new(uart: U, clock: C, client_id: &'static str, reply_timeout_ms: u64) -> Self {
        Self {
            uart,
            clock,
            client_id,
            reply_timeout_ms,
            seq: 0,
            connected: false,
            pending_poll: None,
            missed_polls: 0,
            decoder: ReplyDecoder::new(),
        }
    }

    /// Ask the co-processor whether the broker session is up.
    pub fn probe(&mut self) -> bool {
        self.connected = match self.request(Kind::Status, &[]) {
            Ok(reply) => reply.is_ok(),
            Err(e) => {
                warn!("uplink probe failed: {:?}", e);
                false
            }
        };
        self.connected
    }

    pub fn into_inner(self) -> U {
        self.uart
    }

    fn send(&mut self, kind: Kind, parts: &[&[u8]]) -> Result<u8, UplinkError> {
        self.seq = self.seq.wrapping_add(1);
        let len = parts.iter().map(|p| p.len()).sum();
        let header = frame::header(kind, self.seq, len)?;
        let crc = frame::checksum(&header, parts);

        self.uart.write_all(&header).map_err(io)?;
        for part in parts {
            self.uart.write_all(part).map_err(io)?;
        }
        self.uart.write_all(&crc).map_err(io)?;
        self.uart.flush().map_err(io)?;
        Ok(self.seq)
    }

    fn request(&mut self, kind: Kind, parts: &[&[u8]]) -> Result<Reply, UplinkError> {
        self.decoder.reset();
        let seq = self.send(kind, parts)?;
        let deadline = self.clock.now_millis() + self.reply_timeout_ms;
        let mut chunk = [0u8; 16];

        while self.clock.now_millis() < deadline {
            if !self.uart.read_ready().map_err(io)? {
                continue;
            }
            let n = self.uart.read(&mut chunk).map_err(io)?;
            for &b in &chunk[..n] {
                match self.decoder.push(b) {
                    Some(Ok(reply)) if reply.answers(kind, seq) => return Ok(reply),
                    Some(Ok(reply)) => self.absorb(&reply),
                    Some(Err(e)) => debug!("uplink frame dropped: {:?}", e),
                    None => {}
                }
            }
        }
        Err(UplinkError::Timeout)
    }

    /// Consume whatever replies arrived since the last tick.
    fn drain(&mut self) -> Result<(), UplinkError> {
        let mut chunk = [0u8; 16];
        let mut consumed = 0;
        while consumed < DRAIN_LIMIT && self.uart.read_ready().map_err(io)? {
            let n = self.uart.read(&mut chunk).map_err(io)?;
            if n == 0 {
                break;
            }
            consumed += n;
            for &b in &chunk[..n] {
                match self.decoder.push(b) {
                    Some(Ok(reply)) => self.absorb(&reply),
                    Some(Err(e)) => debug!("uplink frame dropped: {:?}", e),
                    None => {}
                }
            }
        }
        Ok(())
    }

    fn absorb(&mut self, reply: &Reply) {
        let Some(seq) = self.pending_poll else {
            return;
        };
        if !reply.answers(Kind::Poll, seq) {
            return;
        }
        self.pending_poll = None;
        self.missed_polls = 0;
        let up = reply.is_ok();
        if up != self.connected {
            info!("uplink broker session {}", if up { "up" } else { "down" });
        }
        self.connected = up;
        if let Some(&inbound) = reply.payload.get(1) {
            if inbound > 0 {
                debug!("uplink has {} inbound message(s)", inbound);
            }
        }
    }
}

impl<U, C> Transport for UartUplink<U, C>
where
    U: Read + Write + ReadReady,
    C: Clock,
{
    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn reconnect(&mut self) -> bool {
        let client_id = self.client_id;
        match self.request(Kind::Connect, &[client_id.as_bytes()]) {
            Ok(reply) if reply.is_ok() => {
                self.connected = true;
                self.missed_polls = 0;
            }
            Ok(reply) => {
                warn!("uplink connect refused, status {:?}", reply.status());
                self.connected = false;
            }
            Err(e) => {
                warn!("uplink connect failed: {:?}", e);
                self.connected = false;
            }
        }
        self.connected
    }

    fn maintenance_tick(&mut self) {
        if let Err(e) = self.drain() {
            warn!("uplink read failed: {:?}", e);
        }

        if self.pending_poll.is_some() {
            self.missed_polls = self.missed_polls.saturating_add(1);
            if self.missed_polls >= MAX_MISSED_POLLS && self.connected {
                warn!("uplink silent for {} polls, marking down", self.missed_polls);
                self.connected = false;
            }
        }

        match self.send(Kind::Poll, &[]) {
            Ok(seq) => self.pending_poll = Some(seq),
            Err(e) => {
                warn!("uplink poll not sent: {:?}", e);
                self.connected = false;
            }
        }
    }

    fn publish(&mut self, topic: Topic, payload: &[u8]) -> bool {
        if !self.connected {
            return false;
        }
        let name = topic.name();
        let result = frame::topic_prefix(name)
            .map_err(UplinkError::from)
            .and_then(|prefix| self.send(Kind::Publish, &[&prefix, name.as_bytes(), payload]));
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("uplink publish failed: {:?}", e);
                false
            }
        }
    }
}
