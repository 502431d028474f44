//! Tick clock driving the simulation.
//!
//! The renderer feeds an absolute millisecond clock into
//! [`FxSystem::tick`](crate::FxSystem::tick). [`TickClock`] turns those
//! absolute values into deltas, resynchronizing whenever the clock goes
//! backwards (level load, savegame restore, first frame).
//!
//! # Example
//!
//! ```ignore
//! use pfxbatch::time::TickClock;
//!
//! let mut clock = TickClock::new();
//! assert!(clock.advance(100).is_some());
//! assert!(clock.advance(100).is_none()); // duplicate tick
//! ```

/// Time elapsed between two simulation ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickDelta {
    /// Elapsed milliseconds.
    pub millis: u64,
    /// Elapsed seconds, for integrating motion.
    pub secs: f32,
}

impl TickDelta {
    /// Build a delta from a millisecond count.
    pub fn from_millis(millis: u64) -> Self {
        Self {
            millis,
            secs: millis as f32 / 1000.0,
        }
    }
}

/// Absolute-to-delta converter for the simulation clock.
#[derive(Debug, Default)]
pub struct TickClock {
    /// Last absolute clock value a tick was evaluated at.
    last_update: u64,
    /// Number of ticks that produced a non-zero delta.
    frame_count: u64,
}

impl TickClock {
    /// Create a clock whose origin is zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the absolute clock value `ticks`.
    ///
    /// Returns `None` when no simulation work should run: either the clock
    /// went backwards (the new value is stored and becomes the origin) or
    /// the delta is zero.
    pub fn advance(&mut self, ticks: u64) -> Option<TickDelta> {
        if self.last_update > ticks {
            log::trace!("tick clock resync: {} -> {}", self.last_update, ticks);
            self.last_update = ticks;
            return None;
        }

        let dt = ticks - self.last_update;
        if dt == 0 {
            return None;
        }

        self.last_update = ticks;
        self.frame_count += 1;
        Some(TickDelta::from_millis(dt))
    }

    /// Force the next [`advance`](Self::advance) to resynchronize.
    pub fn reset(&mut self) {
        self.last_update = u64::MAX;
    }

    /// Last absolute clock value that was evaluated.
    #[inline]
    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    /// Ticks that advanced the simulation so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }
}
