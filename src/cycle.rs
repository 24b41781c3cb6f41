//! Collection cycle states and the records each window leaves behind.

/// Externally visible phase of the collection cycle.
///
/// `Idle` is only ever the startup phase; after the first window the cycle
/// loops `Collecting -> Publishing -> Cooldown -> Collecting` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleState {
    Idle,
    Collecting,
    Publishing,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PublishStage {
    Raw,
    Stress { raw_accepted: bool },
}

/// Internal phase with the deadline that ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle { until_ms: u64 },
    Collecting { started_ms: u64 },
    Publishing { stage: PublishStage, not_before_ms: u64 },
    Cooldown { until_ms: u64 },
}

impl Phase {
    pub(crate) fn state(&self) -> CycleState {
        match self {
            Phase::Idle { .. } => CycleState::Idle,
            Phase::Collecting { .. } => CycleState::Collecting,
            Phase::Publishing { .. } => CycleState::Publishing,
            Phase::Cooldown { .. } => CycleState::Cooldown,
        }
    }
}

/// Achieved sample counts of a window that just timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WindowReport {
    pub started_ms: u64,
    pub closed_ms: u64,
    pub ppg_count: usize,
    pub ppg_capacity: usize,
    pub temp_count: usize,
    pub temp_capacity: usize,
    pub ppg_underfilled: bool,
    pub temp_underfilled: bool,
}

impl WindowReport {
    pub fn is_underfilled(&self) -> bool {
        self.ppg_underfilled || self.temp_underfilled
    }
}

/// What happened to a window's payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishOutcome {
    /// Simulated session: nothing goes out.
    Suppressed,
    Published { raw_accepted: bool, stress_accepted: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    pub windows: u32,
    pub underfilled_windows: u32,
    pub publish_failures: u32,
    pub temp_fallbacks: u32,
}
