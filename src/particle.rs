//! Per-particle simulation state.

use glam::Vec3;

/// Simulation record for one particle slot.
///
/// A slot is free when `life == 0`. Records are mutated in place by the
/// bucket tick and never move inside the arena.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParticleState {
    /// Position relative to the owning block's anchor.
    pub pos: Vec3,
    /// Velocity in units per second.
    pub dir: Vec3,
    /// Billboard rotation (heading) in radians.
    pub rotation: f32,
    /// Elevation angle in radians.
    pub elevation: f32,
    /// Remaining life in milliseconds. Zero marks a free slot.
    pub life: u32,
    /// Life assigned at spawn, the basis for [`life_time`](Self::life_time).
    pub max_life: u32,
}

impl ParticleState {
    /// Whether this slot holds a live particle.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.life != 0
    }

    /// Normalized age: 0.0 at spawn, approaching 1.0 at death.
    ///
    /// Only meaningful for live particles; `max_life` is never zero for those.
    #[inline]
    pub fn life_time(&self) -> f32 {
        1.0 - self.life as f32 / self.max_life as f32
    }
}
