//! The particle system root.
//!
//! [`FxSystem`] owns one [`Bucket`] per effect configuration, advances them
//! on the game clock and feeds their vertices to the rendering layer through
//! a [`RenderBackend`].
//!
//! # Frame driver
//!
//! ```ignore
//! let mut fx = FxSystem::new(backend, FxSettings::new())?;
//! let mut torch = fx.get(&torch_fx);
//! torch.set_position(x, y, z);
//! torch.set_active(true);
//!
//! loop {
//!     fx.set_viewer_pos(camera.position);
//!     fx.set_model_view(&camera.view, &shadow.view);
//!     fx.tick(game.ticks());
//!
//!     fx.commit_ubo(frame, &shadow.view_texture)?;
//!     fx.update_ubo(frame)?;
//!     if fx.needs_to_update_commands(frame) {
//!         // re-record the particle pass, then
//!         fx.set_as_updated(frame);
//!     }
//!     fx.draw(&mut pass, frame)?;
//! }
//! ```

use std::cell::Ref;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::bucket::{Bucket, SharedBucket};
use crate::emitter::Emitter;
use crate::error::{FxError, Result};
use crate::fx::ParticleFx;
use crate::gpu::{FrameEncoder, RenderBackend};
use crate::settings::FxSettings;
use crate::time::TickClock;
use crate::uniforms::{GlobalUniforms, Light};

/// GPU resources of one bucket in one frame slot.
struct FrameResources<B: RenderBackend> {
    vbo: Option<B::VertexBuffer>,
    vbo_len: usize,
    bind_set: Option<B::BindSet>,
}

impl<B: RenderBackend> Default for FrameResources<B> {
    fn default() -> Self {
        Self {
            vbo: None,
            vbo_len: 0,
            bind_set: None,
        }
    }
}

struct BucketEntry<B: RenderBackend> {
    bucket: Rc<SharedBucket>,
    frames: Vec<FrameResources<B>>,
}

impl<B: RenderBackend> BucketEntry<B> {
    fn new(fx: Arc<ParticleFx>, frames: usize) -> Self {
        Self {
            bucket: Rc::new(SharedBucket::new(Bucket::new(fx))),
            frames: (0..frames).map(|_| FrameResources::default()).collect(),
        }
    }

    fn matches(&self, fx: &Arc<ParticleFx>) -> bool {
        Arc::ptr_eq(&self.bucket.borrow().fx, fx)
    }

    /// No emitters left and no frame slot still holds a vertex buffer.
    fn is_retired(&self) -> bool {
        self.bucket.borrow().slots.is_empty() && self.frames.iter().all(|f| f.vbo.is_none())
    }
}

/// Registry of particle buckets bound to a rendering backend.
pub struct FxSystem<B: RenderBackend> {
    backend: B,
    settings: FxSettings,
    buckets: Vec<BucketEntry<B>>,
    uniforms: GlobalUniforms,
    frame_uniforms: Vec<B::UniformBuffer>,
    update_cmd: Vec<bool>,
    clock: TickClock,
    viewer: Vec3,
    rng: SmallRng,
}

impl<B: RenderBackend> FxSystem<B> {
    /// Create a system, allocating one uniform buffer per frame slot.
    pub fn new(backend: B, settings: FxSettings) -> Result<Self> {
        let frames = backend.frames_in_flight().max(1);
        let size = std::mem::size_of::<GlobalUniforms>();
        let frame_uniforms = (0..frames)
            .map(|_| backend.create_uniform_buffer(size))
            .collect::<Result<Vec<_>>>()?;

        let rng = match settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let mut clock = TickClock::new();
        clock.reset();

        log::debug!("particle system created with {} frame slots", frames);

        Ok(Self {
            backend,
            settings,
            buckets: Vec::new(),
            uniforms: GlobalUniforms::default(),
            frame_uniforms,
            update_cmd: vec![true; frames],
            clock,
            viewer: Vec3::ZERO,
            rng,
        })
    }

    // =========================================================================
    // EMITTERS
    // =========================================================================

    /// Register a new emitter for `fx`.
    ///
    /// Configurations are matched by identity: two `Arc`s with equal
    /// contents still get separate buckets. The emitter starts inactive at
    /// the origin.
    pub fn get(&mut self, fx: &Arc<ParticleFx>) -> Emitter {
        let index = self.bucket_index(fx);
        let bucket = &self.buckets[index].bucket;
        let id = bucket.borrow_mut().alloc_emitter();
        Emitter::new(bucket, id)
    }

    fn bucket_index(&mut self, fx: &Arc<ParticleFx>) -> usize {
        if let Some(i) = self.buckets.iter().position(|e| e.matches(fx)) {
            return i;
        }
        if let Err(e) = fx.validate() {
            log::warn!("particle effect '{}' is out of range: {}", fx.texture, e);
        }
        log::debug!(
            "new particle bucket for '{}' (block size {})",
            fx.texture,
            fx.block_size()
        );
        self.buckets
            .push(BucketEntry::new(Arc::clone(fx), self.frame_uniforms.len()));
        self.buckets.len() - 1
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Advance every bucket to the absolute game time `ticks` (milliseconds).
    ///
    /// The first call after creation or [`reset_ticks`](Self::reset_ticks)
    /// only records the time. A clock that goes backwards is resynchronized
    /// without simulating.
    pub fn tick(&mut self, ticks: u64) {
        let Some(dt) = self.clock.advance(ticks) else {
            return;
        };

        let view = self.uniforms.view();
        let mut layout_changed = false;

        for entry in &self.buckets {
            entry.bucket.apply_deferred();
            let mut bucket = entry.bucket.borrow_mut();
            bucket.tick(dt, self.viewer, &self.settings, &mut self.rng);
            bucket.build_vbo(&view);
            layout_changed |= bucket.take_layout_changed();
        }

        if layout_changed {
            self.invalidate_cmd();
        }
    }

    /// Forget the last tick time, e.g. after a level load.
    pub fn reset_ticks(&mut self) {
        self.clock.reset();
    }

    // =========================================================================
    // GPU
    // =========================================================================

    /// Upload the global uniforms and every bucket's vertices for `frame`.
    ///
    /// Buckets whose vertex buffer no longer matches their vertex count are
    /// skipped until the next [`commit_ubo`](Self::commit_ubo) of that frame.
    pub fn update_ubo(&mut self, frame: usize) -> Result<()> {
        self.check_frame(frame)?;
        self.backend
            .write_uniform_buffer(&self.frame_uniforms[frame], self.uniforms.as_bytes());

        for entry in &self.buckets {
            let bucket = entry.bucket.borrow();
            let res = &entry.frames[frame];
            if let Some(vbo) = &res.vbo {
                if res.vbo_len == bucket.vertices.len() {
                    self.backend.write_vertex_buffer(vbo, &bucket.vertices);
                }
            }
        }
        Ok(())
    }

    /// Drop retired buckets and, if `frame` is dirty, rebuild its buffers
    /// and bind sets.
    ///
    /// A backend failure on one bucket is logged and leaves that bucket
    /// undrawn for this frame slot.
    pub fn commit_ubo(&mut self, frame: usize, shadow_map: &B::Texture) -> Result<()> {
        self.check_frame(frame)?;

        let before = self.buckets.len();
        self.buckets.retain(|e| !e.is_retired());
        if self.buckets.len() != before {
            log::debug!("removed {} empty particle buckets", before - self.buckets.len());
        }

        if !self.update_cmd[frame] {
            return Ok(());
        }

        for entry in &mut self.buckets {
            let bucket = entry.bucket.borrow();
            let res = &mut entry.frames[frame];
            let len = bucket.vertices.len();

            if res.vbo_len != len || res.vbo.is_none() {
                res.vbo = None;
                res.vbo_len = 0;
                if len > 0 {
                    match self.backend.create_vertex_buffer(&bucket.vertices) {
                        Ok(vbo) => {
                            res.vbo = Some(vbo);
                            res.vbo_len = len;
                        }
                        Err(e) => log::warn!("particle vertex buffer for '{}': {}", bucket.fx.texture, e),
                    }
                }
            }

            res.bind_set = match self.backend.create_bind_set(
                &self.frame_uniforms[frame],
                &bucket.fx.texture,
                shadow_map,
            ) {
                Ok(set) => Some(set),
                Err(e) => {
                    log::warn!("particle bind set for '{}': {}", bucket.fx.texture, e);
                    None
                }
            };
        }
        Ok(())
    }

    /// Record one draw per bucket that has vertices in `frame`.
    pub fn draw<E: FrameEncoder<B>>(&self, encoder: &mut E, frame: usize) -> Result<()> {
        self.check_frame(frame)?;
        for entry in &self.buckets {
            let res = &entry.frames[frame];
            if let (Some(vbo), Some(set)) = (&res.vbo, &res.bind_set) {
                if res.vbo_len == 0 {
                    continue;
                }
                encoder.set_bind_set(set);
                encoder.draw(vbo, res.vbo_len as u32);
            }
        }
        Ok(())
    }

    fn check_frame(&self, frame: usize) -> Result<()> {
        let frames = self.update_cmd.len();
        if frame < frames {
            Ok(())
        } else {
            Err(FxError::FrameOutOfRange { frame, frames })
        }
    }

    /// Mark every frame slot as needing its commands rebuilt.
    fn invalidate_cmd(&mut self) {
        self.update_cmd.fill(true);
    }

    /// Whether `frame`'s draw commands are stale.
    pub fn needs_to_update_commands(&self, frame: usize) -> bool {
        self.update_cmd.get(frame).copied().unwrap_or(false)
    }

    /// Acknowledge that `frame`'s draw commands were rebuilt.
    pub fn set_as_updated(&mut self, frame: usize) {
        if let Some(flag) = self.update_cmd.get_mut(frame) {
            *flag = false;
        }
    }

    // =========================================================================
    // SCENE
    // =========================================================================

    /// Set the camera view and the shadow-map view.
    ///
    /// Billboards are oriented from the camera view on the next tick.
    pub fn set_model_view(&mut self, view: &Mat4, shadow: &Mat4) {
        self.uniforms.set_view(view, shadow);
    }

    /// Set the scene light.
    pub fn set_light(&mut self, light: &Light, ambient: Vec3) {
        self.uniforms.set_light(light, ambient);
    }

    /// Set the viewer position used for distance culling.
    pub fn set_viewer_pos(&mut self, pos: Vec3) {
        self.viewer = pos;
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// The bucket bound to `fx`, if any.
    ///
    /// Emitter writes made while the returned guard is alive are applied at
    /// the next [`tick`](Self::tick).
    pub fn bucket(&self, fx: &Arc<ParticleFx>) -> Option<Ref<'_, Bucket>> {
        self.buckets
            .iter()
            .find(|e| e.matches(fx))
            .map(|e| e.bucket.borrow())
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of frame slots.
    pub fn frames_in_flight(&self) -> usize {
        self.update_cmd.len()
    }

    /// Current global uniform block.
    pub fn uniforms(&self) -> &GlobalUniforms {
        &self.uniforms
    }

    /// Runtime settings.
    pub fn settings(&self) -> &FxSettings {
        &self.settings
    }

    /// The rendering backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The rendering backend, mutably (e.g. to register textures).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
