//! Per-effect particle pools.
//!
//! A [`Bucket`] holds everything for one [`ParticleFx`]: the emitter
//! registry, the pool of backing [`Block`]s, the shared particle arena and
//! the vertex array built from it.
//!
//! # Memory Layout
//!
//! ```text
//! slots:     [ e0 ][ e1 ][ e2 ][ e3 ]          registry, one per handle
//!               |     |           |
//!               v     v           v
//! blocks:    [ b0 ][ b1 ][ b2 (dead) ]         lazily materialized
//!               |     |     |
//!               v     v     v
//! particles: [ 0..N ][ N..2N ][ 2N..3N ]       N = block_size
//! vertices:  [ 0..6N ][ 6N..12N ][ 12N..18N ]
//! ```
//!
//! Slots and blocks are recycled by linear scan. Only the tail of either
//! pool is ever trimmed, so indices held by live entries stay valid.

use crate::billboard::{Vertex, VERTICES_PER_PARTICLE};
use crate::fx::ParticleFx;
use crate::particle::ParticleState;
use crate::settings::FxSettings;
use crate::spawn::SpawnContext;
use crate::time::TickDelta;
use glam::Vec3;
use rand::Rng;
use std::cell::{Ref, RefCell, RefMut};
use std::sync::Arc;

/// Backing memory of one emitter: a fixed slice of the particle arena.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Block {
    pub(crate) offset: usize,
    pub(crate) count: usize,
    pub(crate) emitted: u64,
    pub(crate) time_total: u64,
    pub(crate) pos: Vec3,
    pub(crate) alive: bool,
}

impl Block {
    /// First arena index of this block's slice.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Live particles in the slice.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Particles scheduled so far, spawned or skipped.
    #[inline]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Milliseconds accumulated since the block was materialized.
    #[inline]
    pub fn time_total(&self) -> u64 {
        self.time_total
    }

    /// World-space anchor particles are positioned relative to.
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.pos
    }

    /// Whether an emitter owns this block.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Registry entry behind an [`Emitter`](crate::Emitter) handle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EmitterSlot {
    pub(crate) pos: Vec3,
    pub(crate) active: bool,
    pub(crate) alive: bool,
    pub(crate) block: Option<usize>,
}

impl EmitterSlot {
    /// Emitter world position.
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.pos
    }

    /// Whether the emitter wants to spawn.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a handle still owns this slot.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Index of the backing block, if memory has been materialized.
    #[inline]
    pub fn block(&self) -> Option<usize> {
        self.block
    }
}

/// All simulation state for one effect configuration.
#[derive(Debug)]
pub struct Bucket {
    pub(crate) fx: Arc<ParticleFx>,
    pub(crate) slots: Vec<EmitterSlot>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) particles: Vec<ParticleState>,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) block_size: usize,
    layout_changed: bool,
}

impl Bucket {
    /// Create an empty bucket for `fx`.
    pub fn new(fx: Arc<ParticleFx>) -> Self {
        let block_size = fx.block_size();
        Self {
            fx,
            slots: Vec::new(),
            blocks: Vec::new(),
            particles: Vec::new(),
            vertices: Vec::new(),
            block_size,
            layout_changed: false,
        }
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Effect this bucket simulates.
    pub fn fx(&self) -> &Arc<ParticleFx> {
        &self.fx
    }

    /// Particle slots per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Emitter registry.
    pub fn slots(&self) -> &[EmitterSlot] {
        &self.slots
    }

    /// Block pool.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Particle arena.
    pub fn particles(&self) -> &[ParticleState] {
        &self.particles
    }

    /// Vertex array, six vertices per particle slot.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Live particles across all blocks.
    pub fn live_particles(&self) -> usize {
        self.blocks.iter().map(|b| b.count).sum()
    }

    /// Whether the arena was resized since the last call.
    pub(crate) fn take_layout_changed(&mut self) -> bool {
        std::mem::take(&mut self.layout_changed)
    }

    // =========================================================================
    // ALLOCATION
    // =========================================================================

    /// Reuse a dead block or grow the arena by one block.
    pub(crate) fn alloc_block(&mut self) -> usize {
        if let Some(i) = self.blocks.iter().position(|b| !b.alive) {
            let offset = self.blocks[i].offset;
            self.blocks[i] = Block {
                offset,
                alive: true,
                ..Default::default()
            };
            return i;
        }

        let offset = self.particles.len();
        self.blocks.push(Block {
            offset,
            alive: true,
            ..Default::default()
        });
        self.particles
            .resize(offset + self.block_size, ParticleState::default());
        self.vertices
            .resize(self.particles.len() * VERTICES_PER_PARTICLE, Vertex::ZERO);
        self.layout_changed = true;

        log::debug!(
            "particle arena grown to {} slots ({} blocks)",
            self.particles.len(),
            self.blocks.len()
        );
        self.blocks.len() - 1
    }

    /// Release the block backing `slot`. The block must be empty.
    pub(crate) fn free_block(&mut self, slot: usize) {
        if let Some(b) = self.slots[slot].block.take() {
            let block = &mut self.blocks[b];
            debug_assert_eq!(block.count, 0, "freeing a block with live particles");
            block.alive = false;
        }
    }

    /// Reuse a fully released registry slot or append a new one.
    ///
    /// A dead slot that still owns a block is dying, not free: its particles
    /// are still animating and it must not be handed out yet.
    pub(crate) fn alloc_emitter(&mut self) -> usize {
        let fresh = EmitterSlot {
            alive: true,
            ..Default::default()
        };

        if let Some(i) = self
            .slots
            .iter()
            .position(|s| !s.alive && s.block.is_none())
        {
            self.slots[i] = fresh;
            return i;
        }

        self.slots.push(fresh);
        self.slots.len() - 1
    }

    /// Trim dead entries off the tail of both pools and fit the arena.
    ///
    /// Returns `true` when the particle and vertex arrays were resized.
    pub fn shrink(&mut self) -> bool {
        while let Some(s) = self.slots.last() {
            if s.alive || s.block.is_some() {
                break;
            }
            self.slots.pop();
        }
        while let Some(b) = self.blocks.last() {
            if b.alive || b.count > 0 {
                break;
            }
            self.blocks.pop();
        }

        let required = self.blocks.len() * self.block_size;
        if self.particles.len() == required {
            return false;
        }

        self.particles.resize(required, ParticleState::default());
        self.vertices
            .resize(required * VERTICES_PER_PARTICLE, Vertex::ZERO);
        self.layout_changed = true;

        log::debug!(
            "particle arena shrunk to {} slots ({} blocks)",
            self.particles.len(),
            self.blocks.len()
        );
        true
    }

    /// Block backing `slot`, materialized on first use.
    pub(crate) fn get_block(&mut self, slot: usize) -> usize {
        if let Some(b) = self.slots[slot].block {
            return b;
        }
        let b = self.alloc_block();
        self.blocks[b].pos = self.slots[slot].pos;
        self.slots[slot].block = Some(b);
        b
    }

    fn has_reclaimable_tail(&self) -> bool {
        self.slots
            .last()
            .is_some_and(|s| !s.alive && s.block.is_none())
    }

    // =========================================================================
    // HANDLE OPERATIONS
    // =========================================================================

    pub(crate) fn set_position(&mut self, slot: usize, pos: Vec3) {
        let entry = &mut self.slots[slot];
        entry.pos = pos;
        if let Some(b) = entry.block {
            self.blocks[b].pos = pos;
        }
    }

    pub(crate) fn set_active(&mut self, slot: usize, active: bool) {
        self.slots[slot].active = active;
    }

    pub(crate) fn release(&mut self, slot: usize) {
        let entry = &mut self.slots[slot];
        entry.alive = false;
        entry.active = false;
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Advance every emitter of this bucket by `dt`.
    pub(crate) fn tick<R: Rng + ?Sized>(
        &mut self,
        dt: TickDelta,
        viewer: Vec3,
        settings: &FxSettings,
        rng: &mut R,
    ) {
        let cull_sq = settings.cull_distance_sq();
        let scale = settings.fixed_point_scale;
        let rate = u128::from((self.fx.effective_rate() * scale as f32) as u64);
        let mut do_shrink = false;

        for i in 0..self.slots.len() {
            let slot = self.slots[i];
            let nearby = (slot.pos - viewer).length_squared() < cull_sq;
            let process = slot.active && nearby;

            if !process && slot.block.is_none() {
                continue;
            }

            let b = self.get_block(i);
            if self.blocks[b].count > 0 {
                self.step_block(b, dt);
            }
            if self.blocks[b].count == 0 && !process {
                self.free_block(i);
                do_shrink = true;
                continue;
            }

            let block = &mut self.blocks[b];
            block.time_total += dt.millis;
            let target = (u128::from(block.time_total) * rate / (1000 * u128::from(scale))) as u64;

            if !nearby {
                block.emitted = target;
            } else if slot.active {
                self.emit(b, target, rng);
            }
        }

        if do_shrink || self.has_reclaimable_tail() {
            self.shrink();
        }
    }

    /// Age the particles of one block, retiring the expired ones.
    fn step_block(&mut self, b: usize, dt: TickDelta) {
        let gravity = self.fx.gravity;
        let offset = self.blocks[b].offset;

        for i in offset..offset + self.block_size {
            let ps = &mut self.particles[i];
            if ps.life == 0 {
                continue;
            }
            if u64::from(ps.life) <= dt.millis {
                ps.life = 0;
                self.blocks[b].count -= 1;
                let start = i * VERTICES_PER_PARTICLE;
                self.vertices[start..start + VERTICES_PER_PARTICLE].fill(Vertex::ZERO);
            } else {
                ps.life -= dt.millis as u32;
                ps.pos += ps.dir * dt.secs + gravity;
            }
        }
    }

    /// Spawn until the block's emission counter reaches `target`.
    ///
    /// A full block silently drops the spawn; the counter still advances.
    fn emit<R: Rng + ?Sized>(&mut self, b: usize, target: u64, rng: &mut R) {
        let offset = self.blocks[b].offset;
        let slice = offset..offset + self.block_size;
        let mut ctx = SpawnContext::new(rng);

        while self.blocks[b].emitted < target {
            self.blocks[b].emitted += 1;

            if let Some(free) = self.particles[slice.clone()]
                .iter()
                .position(|p| !p.is_alive())
            {
                self.particles[offset + free] = ctx.spawn(&self.fx);
                self.blocks[b].count += 1;
            }
        }
    }
}

/// Handle operation on one registry slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum SlotOp {
    Position(Vec3),
    Active(bool),
    Release,
}

impl Bucket {
    pub(crate) fn apply(&mut self, slot: usize, op: SlotOp) {
        match op {
            SlotOp::Position(pos) => self.set_position(slot, pos),
            SlotOp::Active(active) => self.set_active(slot, active),
            SlotOp::Release => self.release(slot),
        }
    }
}

/// A bucket as shared between the system and its emitter handles.
///
/// Handles must never panic because the caller happens to hold a
/// [`Ref<Bucket>`] from [`FxSystem::bucket`](crate::FxSystem::bucket). When
/// the bucket is borrowed, handle writes are queued here and applied in
/// order at the start of the next tick.
#[derive(Debug)]
pub(crate) struct SharedBucket {
    state: RefCell<Bucket>,
    deferred: RefCell<Vec<(usize, SlotOp)>>,
}

impl SharedBucket {
    pub(crate) fn new(bucket: Bucket) -> Self {
        Self {
            state: RefCell::new(bucket),
            deferred: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn borrow(&self) -> Ref<'_, Bucket> {
        self.state.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, Bucket> {
        self.state.borrow_mut()
    }

    /// Run `f` against the bucket unless it is mutably borrowed.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Bucket) -> T) -> Option<T> {
        let state = self.state.try_borrow().ok()?;
        Some(f(&state))
    }

    /// Apply `op` now, or queue it if the bucket is borrowed.
    pub(crate) fn apply(&self, slot: usize, op: SlotOp) {
        match self.state.try_borrow_mut() {
            Ok(mut bucket) => bucket.apply(slot, op),
            Err(_) => {
                log::trace!("bucket borrowed, deferring {:?} on slot {}", op, slot);
                self.deferred.borrow_mut().push((slot, op));
            }
        }
    }

    /// Number of queued handle operations.
    pub(crate) fn deferred_len(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// Apply queued handle operations. The bucket must not be borrowed.
    pub(crate) fn apply_deferred(&self) {
        let ops = std::mem::take(&mut *self.deferred.borrow_mut());
        if ops.is_empty() {
            return;
        }
        let mut bucket = self.state.borrow_mut();
        for (slot, op) in ops {
            bucket.apply(slot, op);
        }
    }
}
