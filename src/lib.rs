//! # pfxbatch - Batched Particle Effects
//!
//! CPU-simulated, camera-facing particle effects for game scenes, batched so
//! that every emitter sharing an effect configuration is drawn with a single
//! draw call.
//!
//! pfxbatch handles emission scheduling, particle aging, memory recycling and
//! billboard generation. Your renderer keeps its pipelines and passes; the
//! crate only asks it for buffers and bind sets through [`RenderBackend`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use pfxbatch::prelude::*;
//! use std::sync::Arc;
//!
//! let torch = Arc::new(
//!     ParticleFx::new()
//!         .with_rate(40.0)
//!         .with_lifetime(800.0, 200.0)
//!         .with_gravity(Vec3::new(0.0, 0.02, 0.0))
//!         .with_blend_mode(BlendMode::Additive)
//!         .with_texture("flame"),
//! );
//!
//! let mut fx = FxSystem::new(HeadlessBackend::default(), FxSettings::new())?;
//! let mut emitter = fx.get(&torch);
//! emitter.set_position(10.0, 2.0, -4.0);
//! emitter.set_active(true);
//!
//! fx.tick(0);
//! fx.tick(16);
//! ```
//!
//! ## Core Concepts
//!
//! ### Effects
//!
//! A [`ParticleFx`] is an immutable description of an effect: emitter shape,
//! spawn rate, lifetime, initial direction, gravity and how color, alpha and
//! size evolve over a particle's life. Effects are shared as
//! `Arc<ParticleFx>` and identified by pointer, not by value.
//!
//! ### Buckets
//!
//! Each effect gets one [`Bucket`]. A bucket keeps one contiguous particle
//! arena carved into fixed-size blocks; every emitter that is spawning owns
//! exactly one block. Blocks are allocated lazily, recycled when their
//! particles expire, and the arena is trimmed from the tail.
//!
//! ### Emitters
//!
//! An [`Emitter`] is a move-only handle to a bucket slot. Dropping it stops
//! spawning; particles already in flight finish their lives first.
//!
//! ### Frames
//!
//! GPU resources exist once per frame in flight. The driver calls
//! [`FxSystem::commit_ubo`], [`FxSystem::update_ubo`] and [`FxSystem::draw`]
//! with the frame slot it is preparing, and re-records its commands while
//! [`FxSystem::needs_to_update_commands`] reports the slot as stale.
//!
//! ## Feature Flags
//!
//! | Flag | Default | Provides |
//! |------|---------|----------|
//! | `wgpu` | yes | [`WgpuBackend`](gpu::WgpuBackend) |

pub mod billboard;
pub mod bucket;
mod emitter;
pub mod error;
pub mod fx;
pub mod gpu;
pub mod particle;
pub mod settings;
pub mod spawn;
mod system;
pub mod textures;
pub mod time;
pub mod uniforms;

pub use billboard::{CameraBasis, Vertex, VERTICES_PER_PARTICLE};
pub use bucket::{Block, Bucket, EmitterSlot};
pub use bytemuck;
pub use emitter::Emitter;
pub use error::{FxError, Result};
pub use fx::{BlendMode, DirectionMode, EmitterShape, ParticleFx};
pub use glam::{Mat4, Vec2, Vec3};
pub use gpu::{FrameEncoder, HeadlessBackend, HeadlessEncoder, RenderBackend};
pub use particle::ParticleState;
pub use settings::FxSettings;
pub use spawn::SpawnContext;
pub use system::FxSystem;
pub use textures::{AddressMode, FilterMode, SamplerConfig};
pub use uniforms::{GlobalUniforms, Light};

#[cfg(feature = "wgpu")]
pub use gpu::WgpuBackend;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use pfxbatch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::emitter::Emitter;
    pub use crate::fx::{BlendMode, DirectionMode, EmitterShape, ParticleFx};
    pub use crate::gpu::{FrameEncoder, HeadlessBackend, RenderBackend};
    pub use crate::settings::FxSettings;
    pub use crate::system::FxSystem;
    pub use crate::textures::{AddressMode, FilterMode, SamplerConfig};
    pub use crate::uniforms::Light;
    pub use crate::{Mat4, Vec2, Vec3};
    #[cfg(feature = "wgpu")]
    pub use crate::gpu::WgpuBackend;
}
