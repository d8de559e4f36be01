use crate::fault::CpuError;

/// Host-observable run control: halt, pause and the latched fault.
///
/// `halted` is one-way until [`RunState::reset`]. `paused` is toggled from
/// outside and never changes architectural contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunState {
    halted: bool,
    paused: bool,
    latched_fault: Option<CpuError>,
}

impl RunState {
    /// Returns `true` once execution has stopped.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Returns `true` while paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns the error that halted the engine, if any.
    #[must_use]
    pub const fn latched_fault(&self) -> Option<CpuError> {
        self.latched_fault
    }

    /// Marks execution as stopped.
    pub const fn halt(&mut self) {
        self.halted = true;
    }

    /// Halts and records `error`.
    pub const fn latch_fault(&mut self, error: CpuError) {
        self.halted = true;
        self.latched_fault = Some(error);
    }

    /// Sets or clears the pause flag.
    pub const fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Restart state: not halted, no fault, paused.
    pub const fn reset(&mut self) {
        self.halted = false;
        self.latched_fault = None;
        self.paused = true;
    }
}
