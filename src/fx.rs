//! Particle effect configuration.
//!
//! A [`ParticleFx`] is the already-parsed description of one effect: where
//! particles spawn, how fast, how long they live and how they look. The
//! system never inspects it by value when grouping emitters; effects are
//! shared as `Arc<ParticleFx>` and two `Arc`s only land in the same bucket
//! when they point at the same allocation.
//!
//! # Example
//!
//! ```ignore
//! let torch = Arc::new(
//!     ParticleFx::new()
//!         .with_shape(EmitterShape::Sphere, Vec3::splat(20.0))
//!         .with_rate(30.0)
//!         .with_lifetime(800.0, 200.0)
//!         .with_colors(Vec3::new(255.0, 200.0, 80.0), Vec3::new(120.0, 20.0, 0.0))
//!         .with_blend_mode(BlendMode::Additive),
//! );
//! let emitter = system.get(&torch);
//! ```

use crate::error::{FxError, Result};
use glam::{Vec2, Vec3};

/// Highest emission rate, in particles per second, an effect may ask for.
pub const MAX_RATE: f32 = 10_000.0;

/// Longest particle lifetime, in milliseconds, an effect may ask for.
pub const MAX_LIFETIME_MS: f32 = 600_000.0;

/// Upper bound on particle slots per emitter block.
///
/// Effects whose steady-state population exceeds it drop the surplus spawns.
pub const MAX_BLOCK_SIZE: usize = 1 << 16;

/// Volume particles are spawned in, relative to the emitter.
///
/// Only `Point`, `Sphere` and `Box` produce an offset; the remaining shapes
/// spawn at the emitter origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitterShape {
    /// Spawn at the origin.
    #[default]
    Point,
    /// Line segment. Spawns at the origin.
    Line,
    /// Uniform inside an axis-aligned box of `shape_dim`.
    Box,
    /// Flat circle. Spawns at the origin.
    Circle,
    /// Uniform on the surface of an ellipsoid of `shape_dim`.
    Sphere,
    /// Mesh surface. Spawns at the origin.
    Mesh,
}

/// How a particle's rotation is chosen at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DirectionMode {
    /// Rotation stays at zero.
    #[default]
    None,
    /// Uniformly random rotation.
    Random,
    /// Fixed heading/elevation with random variance, all in degrees.
    Direction {
        /// Heading angle.
        heading: f32,
        /// Heading variance (+/-).
        heading_var: f32,
        /// Elevation angle.
        elevation: f32,
        /// Elevation variance (+/-).
        elevation_var: f32,
    },
    /// Face a target. Falls back to a random rotation.
    Target,
}

/// How particle colors are composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Straight RGB, alpha carried in the alpha channel.
    #[default]
    Alpha,
    /// RGB premultiplied by alpha, alpha forced to opaque.
    Additive,
}

/// Declarative description of one particle effect.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFx {
    /// Spawn volume.
    pub shape: EmitterShape,
    /// Full extents of the spawn volume.
    pub shape_dim: Vec3,
    /// Offset added to every spawn position.
    pub shape_offset: Vec3,
    /// Particles emitted per second.
    pub pps: f32,
    /// Average particle lifetime in milliseconds.
    pub lifetime_avg: f32,
    /// Lifetime variance (+/-) in milliseconds.
    pub lifetime_var: f32,
    /// Rotation assignment at spawn.
    pub direction: DirectionMode,
    /// Displacement added to every live particle each tick.
    pub gravity: Vec3,
    /// Color at birth (0-255 per channel).
    pub color_start: Vec3,
    /// Color at death (0-255 per channel).
    pub color_end: Vec3,
    /// Opacity at birth (0-1).
    pub alpha_start: f32,
    /// Opacity at death (0-1).
    pub alpha_end: f32,
    /// Quad size at birth.
    pub size_start: Vec2,
    /// Size multiplier reached at death.
    pub size_end_scale: f32,
    /// Color compositing.
    pub blend: BlendMode,
    /// Texture name resolved by the render backend.
    pub texture: String,
    /// Number of animation frames in the texture.
    ///
    /// Carried through for atlas animation; billboards currently always
    /// sample the full texture.
    pub frame_count: u32,
}

impl Default for ParticleFx {
    fn default() -> Self {
        Self {
            shape: EmitterShape::Point,
            shape_dim: Vec3::ZERO,
            shape_offset: Vec3::ZERO,
            pps: 10.0,
            lifetime_avg: 1000.0,
            lifetime_var: 0.0,
            direction: DirectionMode::None,
            gravity: Vec3::ZERO,
            color_start: Vec3::splat(255.0),
            color_end: Vec3::splat(255.0),
            alpha_start: 1.0,
            alpha_end: 0.0,
            size_start: Vec2::splat(10.0),
            size_end_scale: 1.0,
            blend: BlendMode::Alpha,
            texture: String::new(),
            frame_count: 1,
        }
    }
}

impl ParticleFx {
    /// Create an effect with default values.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // PRESETS
    // =========================================================================

    /// Dust kicked up by footsteps: slow, grey, short-lived puffs.
    pub fn dust() -> Self {
        Self {
            shape: EmitterShape::Box,
            shape_dim: Vec3::new(40.0, 5.0, 40.0),
            pps: 8.0,
            lifetime_avg: 900.0,
            lifetime_var: 300.0,
            direction: DirectionMode::Random,
            gravity: Vec3::new(0.0, 0.05, 0.0),
            color_start: Vec3::new(150.0, 140.0, 130.0),
            color_end: Vec3::new(80.0, 75.0, 70.0),
            alpha_start: 0.6,
            alpha_end: 0.0,
            size_start: Vec2::splat(15.0),
            size_end_scale: 2.5,
            texture: "dust".into(),
            ..Default::default()
        }
    }

    /// Weapon-hit sparks: bright, additive, very short-lived.
    pub fn sparks() -> Self {
        Self {
            shape: EmitterShape::Sphere,
            shape_dim: Vec3::splat(10.0),
            pps: 60.0,
            lifetime_avg: 250.0,
            lifetime_var: 100.0,
            direction: DirectionMode::Random,
            gravity: Vec3::new(0.0, -0.2, 0.0),
            color_start: Vec3::new(255.0, 255.0, 200.0),
            color_end: Vec3::new(255.0, 150.0, 0.0),
            alpha_start: 1.0,
            alpha_end: 0.2,
            size_start: Vec2::splat(4.0),
            size_end_scale: 0.5,
            blend: BlendMode::Additive,
            texture: "spark".into(),
            ..Default::default()
        }
    }

    /// Rising chimney smoke.
    pub fn smoke() -> Self {
        Self {
            shape: EmitterShape::Point,
            pps: 5.0,
            lifetime_avg: 4000.0,
            lifetime_var: 1000.0,
            direction: DirectionMode::Direction {
                heading: 0.0,
                heading_var: 180.0,
                elevation: 90.0,
                elevation_var: 10.0,
            },
            gravity: Vec3::new(0.0, 0.3, 0.0),
            color_start: Vec3::splat(90.0),
            color_end: Vec3::splat(40.0),
            alpha_start: 0.5,
            alpha_end: 0.0,
            size_start: Vec2::splat(30.0),
            size_end_scale: 4.0,
            texture: "smoke".into(),
            ..Default::default()
        }
    }

    // =========================================================================
    // BUILDER
    // =========================================================================

    /// Set the spawn volume and its full extents.
    pub fn with_shape(mut self, shape: EmitterShape, dim: Vec3) -> Self {
        self.shape = shape;
        self.shape_dim = dim;
        self
    }

    /// Set the offset added to spawn positions.
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.shape_offset = offset;
        self
    }

    /// Set the emission rate in particles per second.
    pub fn with_rate(mut self, pps: f32) -> Self {
        self.pps = pps;
        self
    }

    /// Set the average lifetime and its variance, in milliseconds.
    pub fn with_lifetime(mut self, avg: f32, var: f32) -> Self {
        self.lifetime_avg = avg;
        self.lifetime_var = var;
        self
    }

    /// Set the direction mode.
    pub fn with_direction(mut self, direction: DirectionMode) -> Self {
        self.direction = direction;
        self
    }

    /// Set the per-tick gravity displacement.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set birth and death colors (0-255 per channel).
    pub fn with_colors(mut self, start: Vec3, end: Vec3) -> Self {
        self.color_start = start;
        self.color_end = end;
        self
    }

    /// Set birth and death opacity.
    pub fn with_alpha(mut self, start: f32, end: f32) -> Self {
        self.alpha_start = start;
        self.alpha_end = end;
        self
    }

    /// Set the birth size and the multiplier reached at death.
    pub fn with_size(mut self, start: Vec2, end_scale: f32) -> Self {
        self.size_start = start;
        self.size_end_scale = end_scale;
        self
    }

    /// Set the compositing mode.
    pub fn with_blend_mode(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Set the texture name.
    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = texture.into();
        self
    }

    // =========================================================================
    // DERIVED VALUES
    // =========================================================================

    /// Longest lifetime a particle of this effect can get, in milliseconds.
    pub fn max_lifetime(&self) -> u64 {
        (self.lifetime_avg + self.lifetime_var.abs()).max(0.0).ceil() as u64
    }

    /// Emission rate the simulation runs at: `pps` limited to `0..=MAX_RATE`.
    pub fn effective_rate(&self) -> f32 {
        if self.pps.is_nan() {
            0.0
        } else {
            self.pps.clamp(0.0, MAX_RATE)
        }
    }

    /// Particle slots one emitter needs to hold its steady-state population,
    /// capped at [`MAX_BLOCK_SIZE`].
    pub fn block_size(&self) -> usize {
        let pps = self.effective_rate().ceil() as u64;
        let reserve = self.max_lifetime().saturating_mul(pps).div_ceil(1000);
        reserve.min(MAX_BLOCK_SIZE as u64) as usize
    }

    /// Check that the effect can be simulated.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_RATE).contains(&self.pps) {
            return Err(FxError::InvalidRate(self.pps));
        }
        let avg = self.lifetime_avg;
        let var = self.lifetime_var;
        if !avg.is_finite()
            || !var.is_finite()
            || var < 0.0
            || avg - var < 1.0
            || avg + var > MAX_LIFETIME_MS
        {
            return Err(FxError::InvalidLifetime { avg, var });
        }
        Ok(())
    }
}
