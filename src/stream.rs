//! Fixed-capacity sample buffers and the free-running per-stream scheduler.

use heapless::Vec;

/// One window's worth of samples for a single stream.
///
/// The write cursor is the buffer length: it only grows during a window and
/// never passes `N`. Samples are never overwritten until [`reset`](Self::reset).
pub struct SampleStream<T, const N: usize> {
    period_us: u64,
    last_sample_us: u64,
    samples: Vec<T, N>,
}

impl<T: Copy, const N: usize> SampleStream<T, N> {
    pub fn new(frequency_hz: u32) -> Self {
        Self {
            period_us: 1_000_000 / u64::from(frequency_hz.max(1)),
            last_sample_us: 0,
            samples: Vec::new(),
        }
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn cursor(&self) -> usize {
        self.samples.len()
    }

    pub fn is_full(&self) -> bool {
        self.samples.is_full()
    }

    pub fn last_sample_us(&self) -> u64 {
        self.last_sample_us
    }

    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Empty the buffer and restart the period from `now_us`.
    pub fn reset(&mut self, now_us: u64) {
        self.samples.clear();
        self.last_sample_us = now_us;
    }

    /// Take at most one sample if a full period has passed since the last one.
    ///
    /// `read` gets the index the sample will land at. The last-sample time is
    /// moved to `now_us` itself rather than the ideal grid point, so lateness
    /// within a window is not caught up. Returns `true` if a sample was stored.
    pub fn poll(&mut self, now_us: u64, read: impl FnOnce(usize) -> T) -> bool {
        if now_us.saturating_sub(self.last_sample_us) < self.period_us {
            return false;
        }
        self.last_sample_us = now_us;

        if self.samples.is_full() {
            return false;
        }
        let value = read(self.samples.len());
        self.samples.push(value).is_ok()
    }

    /// Whether the achieved count reaches `permille` of capacity.
    pub fn meets_fill(&self, permille: u32) -> bool {
        self.samples.len() as u64 * 1000 >= N as u64 * u64::from(permille)
    }
}
