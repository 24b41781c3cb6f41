// Centralize all configuration constants
pub const PPG_SAMPLE_RATE_HZ: u32 = 100;
pub const TEMP_SAMPLE_RATE_HZ: u32 = 4;
pub const WINDOW_MS: u64 = 10_000;

// Buffers hold exactly one window at the nominal rate
pub const PPG_CAPACITY: usize = 1000;
pub const TEMP_CAPACITY: usize = 40;
pub const DECIMATED_LEN: usize = 640;

pub const SETTLE_MS: u64 = 3_000;
pub const COOLDOWN_MS: u64 = 5_000;
pub const PUBLISH_SPACING_MS: u64 = 500;

pub const MAINTENANCE_PERIOD_MS: u64 = 100;
pub const RECONNECT_ATTEMPTS: u8 = 3;
pub const RECONNECT_BACKOFF_MS: u64 = 3_000;

// Minimum acceptable fill, in per-mille of capacity
pub const PPG_MIN_FILL_PERMILLE: u32 = 900;
pub const TEMP_MIN_FILL_PERMILLE: u32 = 875;

/// Substituted for a temperature read that came back as NaN.
pub const TEMP_FALLBACK_C: f32 = 36.5;

pub const PAYLOAD_CAPACITY: usize = 16_384;
pub const DEVICE_ID: &str = "ESP32_SIC_01";
pub const TOPIC_BP: &str = "sic/stage3/bp_data";
pub const TOPIC_STRESS: &str = "sic/stage3/stress_data";

pub const I2C_FREQUENCY_HZ: u32 = 400_000;
pub const UPLINK_BAUDRATE: u32 = 921_600;
pub const UPLINK_REPLY_TIMEOUT_MS: u64 = 20;

/// Timing knobs for one session. Buffer capacities are fixed by the
/// constants above; everything else may be tightened in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub ppg_rate_hz: u32,
    pub temp_rate_hz: u32,
    pub window_ms: u64,
    pub settle_ms: u64,
    pub cooldown_ms: u64,
    pub publish_spacing_ms: u64,
    pub maintenance_period_ms: u64,
    pub reconnect_attempts: u8,
    pub reconnect_backoff_ms: u64,
    pub ppg_min_fill_permille: u32,
    pub temp_min_fill_permille: u32,
    pub temp_fallback_c: f32,
    pub device_id: &'static str,
}

impl Config {
    pub const DEFAULT: Self = Self {
        ppg_rate_hz: PPG_SAMPLE_RATE_HZ,
        temp_rate_hz: TEMP_SAMPLE_RATE_HZ,
        window_ms: WINDOW_MS,
        settle_ms: SETTLE_MS,
        cooldown_ms: COOLDOWN_MS,
        publish_spacing_ms: PUBLISH_SPACING_MS,
        maintenance_period_ms: MAINTENANCE_PERIOD_MS,
        reconnect_attempts: RECONNECT_ATTEMPTS,
        reconnect_backoff_ms: RECONNECT_BACKOFF_MS,
        ppg_min_fill_permille: PPG_MIN_FILL_PERMILLE,
        temp_min_fill_permille: TEMP_MIN_FILL_PERMILLE,
        temp_fallback_c: TEMP_FALLBACK_C,
        device_id: DEVICE_ID,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
