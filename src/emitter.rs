//! Emitter handles.
//!
//! An [`Emitter`] is the caller's grip on one registry slot of a bucket. It
//! is move-only: exactly one handle owns a slot, and dropping it is the only
//! way to tell the system the emitter is gone. Dropping does not reclaim
//! memory; particles already in flight keep animating and the slot is
//! recycled once they have all expired.
//!
//! # Example
//!
//! ```ignore
//! let mut dust = system.get(&footstep_fx);
//! dust.set_position(npc.x, npc.y, npc.z);
//! dust.set_active(true);
//! // ...
//! drop(dust); // remaining puffs fade out on their own
//! ```

use crate::bucket::{Block, Bucket, SharedBucket, SlotOp};
use glam::{Mat4, Vec3};
use std::rc::{Rc, Weak};

/// Handle to a particle emitter.
///
/// A default-constructed handle is unbound and every operation on it is a
/// no-op. Moving out with [`std::mem::take`] leaves such a handle behind.
///
/// Handles stay usable while a [`Ref<Bucket>`](std::cell::Ref) from
/// [`FxSystem::bucket`](crate::FxSystem::bucket) is held. Writes made in
/// that window, including the release on drop, take effect at the next tick.
#[derive(Debug, Default)]
pub struct Emitter {
    bucket: Option<Weak<SharedBucket>>,
    id: usize,
}

impl Emitter {
    pub(crate) fn new(bucket: &Rc<SharedBucket>, id: usize) -> Self {
        Self {
            bucket: Some(Rc::downgrade(bucket)),
            id,
        }
    }

    fn shared(&self) -> Option<Rc<SharedBucket>> {
        self.bucket.as_ref()?.upgrade()
    }

    fn apply(&self, op: SlotOp) {
        if let Some(bucket) = self.shared() {
            bucket.apply(self.id, op);
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Bucket, usize) -> T) -> Option<T> {
        self.shared()?.read(|b| f(b, self.id))
    }

    /// Whether this handle owns a registry slot.
    pub fn is_bound(&self) -> bool {
        self.bucket.is_some()
    }

    /// Move the emitter. Particles already spawned follow immediately.
    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.apply(SlotOp::Position(Vec3::new(x, y, z)));
    }

    /// Move the emitter to the translation of an object transform.
    pub fn set_object_matrix(&mut self, transform: &Mat4) {
        let t = transform.w_axis;
        self.set_position(t.x, t.y, t.z);
    }

    /// Start or stop spawning.
    ///
    /// Backing memory is materialized by the next tick that sees the
    /// emitter active and near the viewer, not here.
    pub fn set_active(&mut self, active: bool) {
        self.apply(SlotOp::Active(active));
    }

    /// Current emitter position, if bound.
    pub fn position(&self) -> Option<Vec3> {
        self.read(|b, id| b.slots[id].pos)
    }

    /// Whether the emitter is bound and active.
    pub fn is_active(&self) -> bool {
        self.read(|b, id| b.slots[id].active).unwrap_or(false)
    }

    /// Snapshot of the backing block, if memory has been materialized.
    pub fn backing_block(&self) -> Option<Block> {
        self.read(|b, id| b.slots[id].block.map(|i| b.blocks[i]))
            .flatten()
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        if let Some(bucket) = self.shared() {
            bucket.apply(self.id, SlotOp::Release);
        }
        self.bucket = None;
    }
}
