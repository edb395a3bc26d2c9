//! Fixed-Timestep Clock
//!
//! Turns irregular wall-clock deltas into a whole number of simulation steps.
//! The remainder carries over to the next call.

/// Upper bound on steps returned by one `accumulate` call.
pub const MAX_STEPS_PER_CALL: u32 = 10;

/// Accumulates elapsed time and hands out fixed steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedStepClock {
    step_ms: u64,
    accumulator_ms: u64,
}

impl FixedStepClock {
    /// Create a clock with the given step length (minimum 1 ms).
    pub fn new(step_ms: u64) -> Self {
        Self {
            step_ms: step_ms.max(1),
            accumulator_ms: 0,
        }
    }

    /// Step length in milliseconds.
    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    /// Time carried over towards the next step.
    pub fn pending_ms(&self) -> u64 {
        self.accumulator_ms
    }

    /// Add elapsed time and return how many steps to run now.
    pub fn accumulate(&mut self, elapsed_ms: u64) -> u32 {
        self.accumulator_ms = self.accumulator_ms.saturating_add(elapsed_ms);

        // Backlog beyond the cap stays queued for later calls.
        let due = (self.accumulator_ms / self.step_ms).min(u64::from(MAX_STEPS_PER_CALL));
        self.accumulator_ms -= due * self.step_ms;
        due as u32
    }

    /// Forget any carried-over time.
    pub fn reset(&mut self) {
        self.accumulator_ms = 0;
    }
}
