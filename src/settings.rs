//! Runtime settings for an [`FxSystem`](crate::FxSystem).
//!
//! # Example
//!
//! ```ignore
//! let settings = FxSettings::new()
//!     .with_cull_distance(2500.0)
//!     .with_seed(7);
//! ```

/// Default culling radius, in world units.
pub const DEFAULT_CULL_DISTANCE: f32 = 4000.0;

/// Default fixed-point scale used by the emission throttle.
pub const DEFAULT_FIXED_POINT_SCALE: u64 = 100;

/// Tunables shared by every bucket of a system.
#[derive(Clone, Debug, PartialEq)]
pub struct FxSettings {
    /// Emitters farther than this from the viewer only keep time.
    pub cull_distance: f32,
    /// Fixed-point scale applied to particles-per-second before the
    /// integer emission schedule is evaluated.
    pub fixed_point_scale: u64,
    /// Seed for the spawn RNG. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for FxSettings {
    fn default() -> Self {
        Self {
            cull_distance: DEFAULT_CULL_DISTANCE,
            fixed_point_scale: DEFAULT_FIXED_POINT_SCALE,
            seed: None,
        }
    }
}

impl FxSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the culling distance (not squared).
    pub fn with_cull_distance(mut self, distance: f32) -> Self {
        self.cull_distance = distance.abs();
        self
    }

    /// Set the fixed-point scale of the emission throttle. Clamped to at least one.
    pub fn with_fixed_point_scale(mut self, scale: u64) -> Self {
        self.fixed_point_scale = scale.max(1);
        self
    }

    /// Seed the spawn RNG for reproducible simulations.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Squared culling distance compared against emitter distances.
    #[inline]
    pub fn cull_distance_sq(&self) -> f32 {
        self.cull_distance * self.cull_distance
    }
}
