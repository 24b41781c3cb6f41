//! Transport interface and its maintenance cadence.

use crate::config::Config;
use crate::source::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Topic {
    BloodPressure,
    Stress,
}

impl Topic {
    pub fn name(self) -> &'static str {
        match self {
            Topic::BloodPressure => crate::config::TOPIC_BP,
            Topic::Stress => crate::config::TOPIC_STRESS,
        }
    }
}

/// Pub/sub client the session hands its payloads to.
pub trait Transport {
    fn is_connected(&mut self) -> bool;

    /// One connection attempt. Must return promptly.
    fn reconnect(&mut self) -> bool;

    /// Keep-alive and inbound pump.
    fn maintenance_tick(&mut self);

    /// Queue `payload` for sending. `true` means accepted, not delivered.
    fn publish(&mut self, topic: Topic, payload: &[u8]) -> bool;
}

/// Stand-in when no uplink exists at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransport;

impl Transport for NoTransport {
    fn is_connected(&mut self) -> bool {
        false
    }

    fn reconnect(&mut self) -> bool {
        false
    }

    fn maintenance_tick(&mut self) {}

    fn publish(&mut self, _topic: Topic, _payload: &[u8]) -> bool {
        false
    }
}

/// Runs transport maintenance on its own cadence and rations reconnects.
///
/// A lost link gets a burst of at most `reconnect_attempts` tries spaced by
/// the backoff. An exhausted burst stays exhausted until [`rearm`](Self::rearm)
/// or a successful reconnect. Nothing here blocks.
pub struct LinkSupervisor {
    mode: Mode,
    period_ms: u64,
    backoff_ms: u64,
    max_attempts: u8,
    last_tick_ms: u64,
    attempts_left: u8,
    next_attempt_ms: u64,
    total_attempts: u32,
}

impl LinkSupervisor {
    pub fn new(config: &Config, mode: Mode, now_ms: u64) -> Self {
        Self {
            mode,
            period_ms: config.maintenance_period_ms,
            backoff_ms: config.reconnect_backoff_ms,
            max_attempts: config.reconnect_attempts,
            last_tick_ms: now_ms,
            attempts_left: config.reconnect_attempts,
            next_attempt_ms: now_ms,
            total_attempts: 0,
        }
    }

    pub fn attempts_left(&self) -> u8 {
        self.attempts_left
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn rearm(&mut self, now_ms: u64) {
        self.attempts_left = self.max_attempts;
        self.next_attempt_ms = now_ms;
    }

    /// Call every loop iteration. Returns `true` when a maintenance tick ran.
    pub fn service<T: Transport>(&mut self, now_ms: u64, transport: &mut T) -> bool {
        if now_ms.saturating_sub(self.last_tick_ms) < self.period_ms {
            return false;
        }
        self.last_tick_ms = now_ms;

        // a simulated session keeps the link pumped but never dials out
        if self.mode == Mode::Live && !transport.is_connected() {
            self.try_reconnect(now_ms, transport);
        }
        transport.maintenance_tick();
        true
    }

    fn try_reconnect<T: Transport>(&mut self, now_ms: u64, transport: &mut T) {
        if self.attempts_left == 0 || now_ms < self.next_attempt_ms {
            return;
        }
        self.attempts_left -= 1;
        self.total_attempts += 1;
        let attempt = self.max_attempts - self.attempts_left;

        if transport.reconnect() {
            info!("uplink reconnected on attempt {}", attempt);
            self.rearm(now_ms);
            return;
        }

        self.next_attempt_ms = now_ms + self.backoff_ms;
        if self.attempts_left == 0 {
            warn!(
                "uplink still down after {} attempts, holding until next window",
                self.max_attempts
            );
        } else {
            warn!(
                "uplink reconnect attempt {} failed, retrying in {} ms",
                attempt, self.backoff_ms
            );
        }
    }
}
