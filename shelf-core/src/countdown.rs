//! Fixed-length release countdown.
//!
//! A plain value type: the async driver in `gate` calls `tick()` once per
//! second and acts on the returned `Tick`.

use std::time::Duration;

/// Seconds a presentation must wait before delivery starts.
pub const COUNTDOWN_SECONDS: u32 = 30;

/// Interval between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Running,
    /// Reached zero and handed off to delivery. Terminal.
    Fired,
    /// Torn down before reaching zero. Terminal.
    Cancelled,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still counting; carries the new remaining value.
    Waiting(u32),
    /// Remaining went 1 -> 0. Emitted exactly once per countdown.
    Fire,
    /// Nothing happened (fired, cancelled, or delivery already done).
    Idle,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u32,
    start: u32,
    state: CountdownState,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self::with_start(COUNTDOWN_SECONDS)
    }

    pub(crate) fn with_start(start: u32) -> Self {
        Self {
            remaining: start,
            start,
            state: CountdownState::Running,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn start_value(&self) -> u32 {
        self.start
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    /// Advance by one second.
    ///
    /// No-op once the countdown has fired or been cancelled, and while
    /// `delivery_complete` is set (remaining stays frozen).
    pub fn tick(&mut self, delivery_complete: bool) -> Tick {
        if self.state != CountdownState::Running || delivery_complete {
            return Tick::Idle;
        }
        if self.remaining == 0 {
            // Only reachable with a zero start value.
            self.state = CountdownState::Fired;
            return Tick::Fire;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.state = CountdownState::Fired;
            Tick::Fire
        } else {
            Tick::Waiting(self.remaining)
        }
    }

    pub fn cancel(&mut self) {
        if self.state == CountdownState::Running {
            self.state = CountdownState::Cancelled;
        }
    }
}
