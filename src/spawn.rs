//! Spawn initialization for new particles.
//!
//! [`SpawnContext`] wraps the injected random source with the sampling
//! helpers the spawn routine needs, so that every random draw goes through
//! one place and seeded runs stay reproducible.

use crate::fx::{DirectionMode, EmitterShape, ParticleFx};
use crate::particle::ParticleState;
use glam::Vec3;
use rand::Rng;
use std::f32::consts::TAU;

/// Random helpers used while spawning particles.
pub struct SpawnContext<'a, R: Rng + ?Sized> {
    rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> SpawnContext<'a, R> {
    /// Wrap a random source.
    pub fn new(rng: &'a mut R) -> Self {
        Self { rng }
    }

    // ========== Random primitives ==========

    /// Random f32 in `[0, 1)`.
    #[inline]
    pub fn random(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Random f32 in `[-1, 1)`.
    #[inline]
    pub fn random_signed(&mut self) -> f32 {
        2.0 * self.random() - 1.0
    }

    /// Random angle in `[0, 2π)`.
    #[inline]
    pub fn random_angle(&mut self) -> f32 {
        self.random() * TAU
    }

    // ========== Position helpers ==========

    /// Uniform point on the unit sphere.
    ///
    /// Latitude is drawn through the inverse cosine so points do not bunch
    /// up at the poles.
    pub fn random_on_sphere(&mut self) -> Vec3 {
        let theta = self.random_angle();
        let phi = (1.0 - 2.0 * self.random()).acos();
        Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
    }

    /// Uniform point in the `[-1, 1]` cube.
    pub fn random_in_cube(&mut self) -> Vec3 {
        let x = self.random_signed();
        let y = self.random_signed();
        let z = self.random_signed();
        Vec3::new(x, y, z)
    }

    /// Unit-scale offset for an emitter shape.
    pub fn shape_offset(&mut self, shape: EmitterShape) -> Vec3 {
        match shape {
            EmitterShape::Sphere => self.random_on_sphere(),
            EmitterShape::Box => self.random_in_cube(),
            EmitterShape::Point
            | EmitterShape::Line
            | EmitterShape::Circle
            | EmitterShape::Mesh => Vec3::ZERO,
        }
    }

    // ========== Particle init ==========

    /// Initialize a freshly spawned particle for `fx`.
    ///
    /// The position is local to the block anchor; the anchor is added when
    /// vertices are built.
    pub fn spawn(&mut self, fx: &ParticleFx) -> ParticleState {
        let offset = self.shape_offset(fx.shape);
        let pos = offset * (fx.shape_dim * 0.5) + fx.shape_offset;

        let (rotation, elevation) = match fx.direction {
            DirectionMode::None => (0.0, 0.0),
            DirectionMode::Random => (self.random_angle(), 0.0),
            DirectionMode::Direction {
                heading,
                heading_var,
                elevation,
                elevation_var,
            } => {
                let head = heading + self.random_signed() * heading_var;
                let elev = elevation + self.random_signed() * elevation_var;
                (head.to_radians(), elev.to_radians())
            }
            // No look-at yet: the target position is not known here.
            DirectionMode::Target => (self.random_angle(), 0.0),
        };

        let life = (fx.lifetime_avg + fx.lifetime_var * self.random_signed()).max(1.0) as u32;

        ParticleState {
            pos,
            dir: Vec3::ZERO,
            rotation,
            elevation,
            life,
            max_life: life,
        }
    }
}
