/// Monotonic time source. Both counters are non-decreasing for the
/// lifetime of the process and never wrap within a session.
pub trait Clock {
    fn now_millis(&self) -> u64;
    fn now_micros(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }

    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }
}

/// Uptime from the embassy time driver.
#[cfg(feature = "firmware")]
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "firmware")]
impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    fn now_micros(&self) -> u64 {
        embassy_time::Instant::now().as_micros()
    }
}

/// Hand-driven clock for host runs and tests. Shared by reference so the
/// driver can advance time while a session holds it.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: core::cell::Cell<u64>,
}

impl ManualClock {
    pub const fn new(start_micros: u64) -> Self {
        Self {
            micros: core::cell::Cell::new(start_micros),
        }
    }

    pub fn advance_micros(&self, us: u64) {
        self.micros.set(self.micros.get() + us);
    }

    pub fn advance_millis(&self, ms: u64) {
        self.advance_micros(ms * 1000);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.micros.get() / 1000
    }

    fn now_micros(&self) -> u64 {
        self.micros.get()
    }
}
