//! Signal acquisition for both streams, live or simulated.
//!
//! The variant is picked once at startup from the peripheral/link probe and
//! never changes for the life of the session.

use core::f32::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::PPG_SAMPLE_RATE_HZ;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Live,
    Simulated,
}

impl Mode {
    /// Live only when the PPG sensor answered and the uplink came up.
    pub fn probe(sensor_present: bool, link_up: bool) -> Self {
        if sensor_present && link_up {
            Mode::Live
        } else {
            Mode::Simulated
        }
    }
}

/// High-rate optical pulse sensor. Must not block.
pub trait PulseSensor {
    fn read_ir(&mut self) -> i32;
}

/// Low-rate temperature sensor. A failed read is reported as NaN.
pub trait TemperatureSensor {
    fn read_celsius(&mut self) -> f32;
}

/// What the scheduler samples from.
pub trait SignalSource {
    fn mode(&self) -> Mode;

    /// `index` is the sample's position within the current window.
    fn high_rate_sample(&mut self, index: usize) -> i32;

    /// Raw low-rate reading; may be NaN when the sensor glitches.
    fn low_rate_sample(&mut self) -> f32;
}

pub struct Live<P, T> {
    pulse: P,
    temperature: T,
}

impl<P: PulseSensor, T: TemperatureSensor> Live<P, T> {
    pub fn new(pulse: P, temperature: T) -> Self {
        Self { pulse, temperature }
    }
}

impl<P: PulseSensor, T: TemperatureSensor> SignalSource for Live<P, T> {
    fn mode(&self) -> Mode {
        Mode::Live
    }

    fn high_rate_sample(&mut self, _index: usize) -> i32 {
        self.pulse.read_ir()
    }

    fn low_rate_sample(&mut self) -> f32 {
        self.temperature.read_celsius()
    }
}

// Synthetic PPG: 1.2 Hz pulse around a DC level, plus uniform noise.
pub const SIM_PPG_BASELINE: f32 = 50_000.0;
pub const SIM_PPG_AMPLITUDE: f32 = 10_000.0;
pub const SIM_PPG_PULSE_HZ: f32 = 1.2;
pub const SIM_PPG_NOISE: i32 = 500;

pub const SIM_TEMP_BASELINE_C: f32 = 36.5;

/// Synthetic generator used when the hardware or link is missing.
pub struct Simulated {
    rng: SmallRng,
}

impl Simulated {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Noise-free PPG value at window position `index`.
    pub fn ppg_wave(index: usize) -> f32 {
        let t = index as f32 / PPG_SAMPLE_RATE_HZ as f32;
        SIM_PPG_BASELINE + SIM_PPG_AMPLITUDE * libm::sinf(2.0 * PI * SIM_PPG_PULSE_HZ * t)
    }
}

impl SignalSource for Simulated {
    fn mode(&self) -> Mode {
        Mode::Simulated
    }

    fn high_rate_sample(&mut self, index: usize) -> i32 {
        let noise = self.rng.gen_range(-SIM_PPG_NOISE..SIM_PPG_NOISE);
        Self::ppg_wave(index) as i32 + noise
    }

    fn low_rate_sample(&mut self) -> f32 {
        // 0.05 °C steps in [-0.5, 0.45]
        SIM_TEMP_BASELINE_C + self.rng.gen_range(-10i32..10) as f32 / 20.0
    }
}

/// Startup-selected acquisition variant.
pub enum Acquisition<P, T> {
    Live(Live<P, T>),
    Simulated(Simulated),
}

impl<P: PulseSensor, T: TemperatureSensor> Acquisition<P, T> {
    /// Pick the variant for `mode`. A live mode without a pulse sensor
    /// falls back to simulation.
    pub fn select(mode: Mode, pulse: Option<P>, temperature: T, seed: u64) -> Self {
        match (mode, pulse) {
            (Mode::Live, Some(pulse)) => Acquisition::Live(Live::new(pulse, temperature)),
            _ => Acquisition::Simulated(Simulated::new(seed)),
        }
    }
}

impl<P: PulseSensor, T: TemperatureSensor> SignalSource for Acquisition<P, T> {
    fn mode(&self) -> Mode {
        match self {
            Acquisition::Live(s) => s.mode(),
            Acquisition::Simulated(s) => s.mode(),
        }
    }

    fn high_rate_sample(&mut self, index: usize) -> i32 {
        match self {
            Acquisition::Live(s) => s.high_rate_sample(index),
            Acquisition::Simulated(s) => s.high_rate_sample(index),
        }
    }

    fn low_rate_sample(&mut self) -> f32 {
        match self {
            Acquisition::Live(s) => s.low_rate_sample(),
            Acquisition::Simulated(s) => s.low_rate_sample(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPulse(i32);
    impl PulseSensor for FixedPulse {
        fn read_ir(&mut self) -> i32 {
            self.0
        }
    }

    struct NanTemp;
    impl TemperatureSensor for NanTemp {
        fn read_celsius(&mut self) -> f32 {
            f32::NAN
        }
    }

    #[test]
    fn probe_requires_sensor_and_link() {
        assert_eq!(Mode::probe(true, true), Mode::Live);
        assert_eq!(Mode::probe(false, true), Mode::Simulated);
        assert_eq!(Mode::probe(true, false), Mode::Simulated);
        assert_eq!(Mode::probe(false, false), Mode::Simulated);
    }

    #[test]
    fn simulated_ppg_stays_within_noise_band() {
        let mut sim = Simulated::new(7);
        for i in 0..1000 {
            let expected = 50_000.0
                + 10_000.0 * (2.0 * std::f64::consts::PI * 1.2 * (i as f64 / 100.0)).sin();
            let got = sim.high_rate_sample(i) as f64;
            assert!(
                (got - expected).abs() <= 501.0,
                "index {i}: {got} vs {expected}"
            );
        }
    }

    #[test]
    fn simulated_ppg_depends_on_index_not_call_order() {
        assert_eq!(Simulated::ppg_wave(0), SIM_PPG_BASELINE);
        let quarter = (PPG_SAMPLE_RATE_HZ as f32 / SIM_PPG_PULSE_HZ / 4.0) as usize;
        assert!(Simulated::ppg_wave(quarter) > 59_000.0);
    }

    #[test]
    fn simulated_temperature_bounds() {
        let mut sim = Simulated::new(42);
        for _ in 0..500 {
            let t = sim.low_rate_sample();
            assert!((36.0..37.0).contains(&t), "{t}");
        }
    }

    #[test]
    fn select_falls_back_without_sensor() {
        let acq = Acquisition::<FixedPulse, NanTemp>::select(Mode::Live, None, NanTemp, 1);
        assert_eq!(acq.mode(), Mode::Simulated);

        let mut acq = Acquisition::select(Mode::Live, Some(FixedPulse(1234)), NanTemp, 1);
        assert_eq!(acq.mode(), Mode::Live);
        assert_eq!(acq.high_rate_sample(0), 1234);
        assert!(acq.low_rate_sample().is_nan());
    }
}
