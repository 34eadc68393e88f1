//! Per-question countdown clock.
//!
//! The countdown itself is a pure counter; the match driver feeds it one tick
//! per second. Keeping the clock out of the counter lets the session tests
//! drive time explicitly.

/// Result of feeding one tick to a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// The clock moved and still has the given number of seconds left.
    Running(u32),
    /// The clock just reached zero. Reported once per round.
    Expired,
    /// The clock is stopped (expired earlier or cancelled); nothing happened.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountdownState {
    Running,
    Expired,
    Cancelled,
}

/// Decrementing per-round clock with a single expiry notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    budget: u32,
    remaining: u32,
    state: CountdownState,
}

impl Countdown {
    /// Start a countdown at `budget` seconds.
    pub fn new(budget: u32) -> Self {
        Self {
            budget,
            remaining: budget,
            state: CountdownState::Running,
        }
    }

    /// Seconds left on the clock.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Advance the clock by one second.
    pub fn tick(&mut self) -> CountdownTick {
        if self.state != CountdownState::Running {
            return CountdownTick::Idle;
        }

        if self.remaining <= 1 {
            self.remaining = 0;
            self.state = CountdownState::Expired;
            return CountdownTick::Expired;
        }

        self.remaining -= 1;
        CountdownTick::Running(self.remaining)
    }

    /// Freeze the clock. The remaining value is kept for display.
    pub fn cancel(&mut self) {
        if self.state == CountdownState::Running {
            self.state = CountdownState::Cancelled;
        }
    }

    /// Restart at the full budget.
    pub fn reset(&mut self) {
        self.remaining = self.budget;
        self.state = CountdownState::Running;
    }
}
