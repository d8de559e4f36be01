use std::collections::VecDeque;
use std::time::Duration;

/// Number of step durations kept in the rolling window.
pub const TIMING_WINDOW: usize = 1000;

/// Rolling window of wall-clock step durations.
///
/// Filled only when `CpuConfig::record_timings` is set. Once the window holds
/// [`TIMING_WINDOW`] samples the oldest is dropped for each new one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepTimings {
    samples: VecDeque<Duration>,
}

impl StepTimings {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(TIMING_WINDOW),
        }
    }

    /// Appends one sample, evicting the oldest when full.
    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() == TIMING_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    /// Samples held, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = Duration> + '_ {
        self.samples.iter().copied()
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when no step has been timed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the window, or `None` when empty.
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        let count = u32::try_from(self.samples.len()).ok().filter(|n| *n > 0)?;
        Some(self.samples.iter().sum::<Duration>() / count)
    }

    /// Slowest step in the window.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().copied().max()
    }

    /// Fastest step in the window.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        self.samples.iter().copied().min()
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
