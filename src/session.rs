//! The control loop aggregate: both streams, the cycle, and the uplink.

use crate::clock::Clock;
use crate::config::{Config, DECIMATED_LEN, PPG_CAPACITY, TEMP_CAPACITY};
use crate::cycle::{CycleState, Phase, PublishOutcome, PublishStage, Stats, WindowReport};
use crate::decimate::decimate;
use crate::link::{LinkSupervisor, Topic, Transport};
use crate::payload::{BpPayload, PayloadBuf, PayloadError, StressPayload};
use crate::source::{Mode, SignalSource};
use crate::stream::SampleStream;

/// Samples shown in the log when a simulated window is dropped.
const PREVIEW_PPG: usize = 10;
const PREVIEW_TEMP: usize = 5;

/// Everything the loop owns. There is one per process and nothing in it is
/// shared, so [`poll`](Self::poll) needs no locking.
pub struct Session<S, T, C> {
    config: Config,
    mode: Mode,
    source: S,
    transport: T,
    clock: C,
    link: LinkSupervisor,
    ppg: SampleStream<i32, PPG_CAPACITY>,
    temperature: SampleStream<f32, TEMP_CAPACITY>,
    phase: Phase,
    window_started_us: u64,
    report: Option<WindowReport>,
    outcome: Option<PublishOutcome>,
    stats: Stats,
    payload: PayloadBuf,
}

impl<S: SignalSource, T: Transport, C: Clock> Session<S, T, C> {
    /// Start in `Idle`; the first window opens after the settle delay.
    pub fn new(config: Config, source: S, transport: T, clock: C) -> Self {
        let mode = source.mode();
        let now_ms = clock.now_millis();
        let now_us = clock.now_micros();
        info!(
            "session in {:?} mode, first window in {} ms",
            mode, config.settle_ms
        );

        Self {
            mode,
            link: LinkSupervisor::new(&config, mode, now_ms),
            ppg: SampleStream::new(config.ppg_rate_hz),
            temperature: SampleStream::new(config.temp_rate_hz),
            phase: Phase::Idle {
                until_ms: now_ms + config.settle_ms,
            },
            window_started_us: now_us,
            report: None,
            outcome: None,
            stats: Stats::default(),
            payload: PayloadBuf::new(),
            config,
            source,
            transport,
            clock,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> CycleState {
        self.phase.state()
    }

    pub fn high_rate(&self) -> &SampleStream<i32, PPG_CAPACITY> {
        &self.ppg
    }

    pub fn low_rate(&self) -> &SampleStream<f32, TEMP_CAPACITY> {
        &self.temperature
    }

    /// Start of the current (or most recent) window on the microsecond clock.
    pub fn window_started_us(&self) -> u64 {
        self.window_started_us
    }

    pub fn last_report(&self) -> Option<&WindowReport> {
        self.report.as_ref()
    }

    pub fn last_outcome(&self) -> Option<PublishOutcome> {
        self.outcome
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn link(&self) -> &LinkSupervisor {
        &self.link
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The decimated view of the current high-rate buffer.
    pub fn decimated(&self) -> heapless::Vec<i32, DECIMATED_LEN> {
        decimate(self.ppg.samples())
    }

    /// One loop iteration. Never blocks beyond the sensor and transport calls
    /// it makes.
    pub fn poll(&mut self) -> CycleState {
        match self.phase {
            Phase::Idle { until_ms } => {
                if self.clock.now_millis() >= until_ms {
                    self.begin_window();
                }
            }
            Phase::Collecting { started_ms } => {
                self.sample(self.clock.now_micros());
                let now_ms = self.clock.now_millis();
                if now_ms.saturating_sub(started_ms) >= self.config.window_ms {
                    self.close_window(started_ms, now_ms);
                }
            }
            Phase::Publishing {
                stage,
                not_before_ms,
            } => {
                let now_ms = self.clock.now_millis();
                if now_ms >= not_before_ms {
                    self.publish_stage(stage, now_ms);
                }
            }
            Phase::Cooldown { until_ms } => {
                let now_ms = self.clock.now_millis();
                if now_ms >= until_ms {
                    self.link.rearm(now_ms);
                    self.begin_window();
                }
            }
        }

        self.link
            .service(self.clock.now_millis(), &mut self.transport);
        self.phase.state()
    }

    fn begin_window(&mut self) {
        let now_us = self.clock.now_micros();
        let now_ms = self.clock.now_millis();
        self.ppg.reset(now_us);
        self.temperature.reset(now_us);
        self.window_started_us = now_us;
        self.phase = Phase::Collecting { started_ms: now_ms };
        info!("collecting for {} ms", self.config.window_ms);
    }

    fn sample(&mut self, now_us: u64) {
        let source = &mut self.source;
        self.ppg.poll(now_us, |i| source.high_rate_sample(i));

        let fallback = self.config.temp_fallback_c;
        let fallbacks = &mut self.stats.temp_fallbacks;
        self.temperature.poll(now_us, |i| {
            let celsius = source.low_rate_sample();
            if celsius.is_nan() {
                *fallbacks += 1;
                debug!("temperature read {} was NaN, using {}", i, fallback);
                fallback
            } else {
                celsius
            }
        });
    }

    fn close_window(&mut self, started_ms: u64, now_ms: u64) {
        let report = WindowReport {
            started_ms,
            closed_ms: now_ms,
            ppg_count: self.ppg.cursor(),
            ppg_capacity: self.ppg.capacity(),
            temp_count: self.temperature.cursor(),
            temp_capacity: self.temperature.capacity(),
            ppg_underfilled: !self.ppg.meets_fill(self.config.ppg_min_fill_permille),
            temp_underfilled: !self.temperature.meets_fill(self.config.temp_min_fill_permille),
        };

        info!(
            "window complete: ppg {}/{}, temperature {}/{}",
            report.ppg_count, report.ppg_capacity, report.temp_count, report.temp_capacity
        );
        if report.ppg_underfilled {
            warn!(
                "ppg sample count too low ({}), check sensor or timing",
                report.ppg_count
            );
        }
        if report.temp_underfilled {
            warn!("temperature sample count too low ({})", report.temp_count);
        }

        self.stats.windows += 1;
        if report.is_underfilled() {
            self.stats.underfilled_windows += 1;
        }
        self.report = Some(report);
        self.phase = Phase::Publishing {
            stage: PublishStage::Raw,
            not_before_ms: now_ms,
        };
    }

    fn publish_stage(&mut self, stage: PublishStage, now_ms: u64) {
        if self.mode == Mode::Simulated {
            info!("simulated session, window not sent");
            self.preview();
            self.outcome = Some(PublishOutcome::Suppressed);
            self.enter_cooldown(now_ms);
            return;
        }

        match stage {
            PublishStage::Raw => {
                let encoded = self.payload.encode(&BpPayload {
                    device_id: self.config.device_id,
                    timestamp: now_ms,
                    ppg: self.ppg.samples(),
                });
                let raw_accepted = self.deliver(Topic::BloodPressure, encoded);
                self.phase = Phase::Publishing {
                    stage: PublishStage::Stress { raw_accepted },
                    not_before_ms: now_ms + self.config.publish_spacing_ms,
                };
            }
            PublishStage::Stress { raw_accepted } => {
                let view = self.decimated();
                let encoded = self.payload.encode(&StressPayload {
                    device_id: self.config.device_id,
                    timestamp: now_ms,
                    ppg: &view,
                    temperature: self.temperature.samples(),
                });
                let stress_accepted = self.deliver(Topic::Stress, encoded);
                self.outcome = Some(PublishOutcome::Published {
                    raw_accepted,
                    stress_accepted,
                });
                self.enter_cooldown(now_ms);
            }
        }
    }

    fn deliver(&mut self, topic: Topic, encoded: Result<usize, PayloadError>) -> bool {
        let accepted = match encoded {
            Ok(len) => {
                info!("sending {} ({} bytes)", topic.name(), len);
                let accepted = self.transport.publish(topic, self.payload.as_bytes());
                if accepted {
                    info!("{} sent", topic.name());
                } else {
                    warn!("{} rejected by transport", topic.name());
                }
                accepted
            }
            Err(e) => {
                warn!("{} not encoded: {:?}", topic.name(), e);
                false
            }
        };
        if !accepted {
            self.stats.publish_failures += 1;
        }
        accepted
    }

    fn enter_cooldown(&mut self, now_ms: u64) {
        info!(
            "windows {}, underfilled {}, publish failures {}, reconnects {}; next window in {} ms",
            self.stats.windows,
            self.stats.underfilled_windows,
            self.stats.publish_failures,
            self.link.total_attempts(),
            self.config.cooldown_ms
        );
        self.phase = Phase::Cooldown {
            until_ms: now_ms + self.config.cooldown_ms,
        };
    }

    fn preview(&self) {
        for (i, v) in self.ppg.samples().iter().take(PREVIEW_PPG).enumerate() {
            info!("  ppg[{}] = {}", i, v);
        }
        for (i, v) in self.temperature.samples().iter().take(PREVIEW_TEMP).enumerate() {
            info!("  temperature[{}] = {}", i, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::link::NoTransport;
    use crate::source::Simulated;

    fn tight() -> Config {
        Config {
            window_ms: 100,
            settle_ms: 10,
            cooldown_ms: 50,
            publish_spacing_ms: 5,
            ..Config::DEFAULT
        }
    }

    #[test]
    fn starts_idle_until_settled() {
        let clock = ManualClock::new(0);
        let mut s = Session::new(tight(), Simulated::new(1), NoTransport, &clock);
        assert_eq!(s.poll(), CycleState::Idle);
        clock.advance_millis(9);
        assert_eq!(s.poll(), CycleState::Idle);
        clock.advance_millis(1);
        assert_eq!(s.poll(), CycleState::Collecting);
        assert_eq!(s.window_started_us(), 10_000);
    }

    #[test]
    fn simulated_window_is_suppressed_then_restarts() {
        let clock = ManualClock::new(0);
        let mut s = Session::new(tight(), Simulated::new(1), NoTransport, &clock);
        clock.advance_millis(10);
        s.poll();
        while s.poll() == CycleState::Collecting {
            clock.advance_micros(500);
        }
        assert_eq!(s.state(), CycleState::Publishing);
        assert_eq!(s.high_rate().cursor(), 10);
        assert_eq!(s.low_rate().cursor(), 0);
        assert!(s.last_report().unwrap().is_underfilled());

        assert_eq!(s.poll(), CycleState::Cooldown);
        assert_eq!(s.last_outcome(), Some(PublishOutcome::Suppressed));

        clock.advance_millis(50);
        assert_eq!(s.poll(), CycleState::Collecting);
        assert_eq!(s.high_rate().cursor(), 0);
        assert_eq!(s.high_rate().last_sample_us(), s.window_started_us());
        assert_eq!(s.low_rate().last_sample_us(), s.window_started_us());
    }

    #[test]
    fn no_sampling_outside_collecting() {
        let clock = ManualClock::new(0);
        let mut s = Session::new(tight(), Simulated::new(3), NoTransport, &clock);
        for _ in 0..9 {
            clock.advance_millis(1);
            s.poll();
        }
        assert_eq!(s.state(), CycleState::Idle);
        assert_eq!(s.high_rate().cursor(), 0);
    }
}
