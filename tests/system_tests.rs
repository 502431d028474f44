//! Integration tests driving `FxSystem` through a recording backend.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use pfxbatch::prelude::*;
use pfxbatch::{FxError, Vertex};

/// Backend that records every allocation and upload.
#[derive(Default)]
struct RecordingBackend {
    next_id: Cell<u32>,
    vertex_buffers: RefCell<Vec<(u32, usize)>>,
    vertex_writes: RefCell<Vec<(u32, usize)>>,
    uniform_writes: Cell<usize>,
    bind_sets: RefCell<Vec<String>>,
    missing_textures: Vec<&'static str>,
}

impl RecordingBackend {
    fn id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl RenderBackend for RecordingBackend {
    type UniformBuffer = u32;
    type VertexBuffer = u32;
    type Texture = ();
    type BindSet = String;

    fn frames_in_flight(&self) -> usize {
        2
    }

    fn create_uniform_buffer(&self, size: usize) -> pfxbatch::Result<u32> {
        assert_eq!(size, std::mem::size_of::<pfxbatch::GlobalUniforms>());
        Ok(self.id())
    }

    fn write_uniform_buffer(&self, _buffer: &u32, data: &[u8]) {
        assert_eq!(data.len(), 176);
        self.uniform_writes.set(self.uniform_writes.get() + 1);
    }

    fn create_vertex_buffer(&self, vertices: &[Vertex]) -> pfxbatch::Result<u32> {
        let id = self.id();
        self.vertex_buffers.borrow_mut().push((id, vertices.len()));
        Ok(id)
    }

    fn write_vertex_buffer(&self, buffer: &u32, vertices: &[Vertex]) {
        self.vertex_writes.borrow_mut().push((*buffer, vertices.len()));
    }

    fn create_bind_set(&self, uniforms: &u32, texture: &str, _shadow: &()) -> pfxbatch::Result<String> {
        if self.missing_textures.iter().any(|t| *t == texture) {
            return Err(FxError::UnknownTexture(texture.to_string()));
        }
        let set = format!("{texture}@{uniforms}");
        self.bind_sets.borrow_mut().push(set.clone());
        Ok(set)
    }
}

#[derive(Default)]
struct RecordingEncoder {
    bound: Vec<String>,
    draws: Vec<(u32, u32)>,
}

impl FrameEncoder<RecordingBackend> for RecordingEncoder {
    fn set_bind_set(&mut self, set: &String) {
        self.bound.push(set.clone());
    }

    fn draw(&mut self, vertices: &u32, vertex_count: u32) {
        self.draws.push((*vertices, vertex_count));
    }
}

fn system(backend: RecordingBackend) -> FxSystem<RecordingBackend> {
    FxSystem::new(backend, FxSettings::new().with_seed(42)).unwrap()
}

fn effect(texture: &str, pps: f32, life: f32) -> Arc<ParticleFx> {
    Arc::new(
        ParticleFx::new()
            .with_rate(pps)
            .with_lifetime(life, 0.0)
            .with_texture(texture),
    )
}

/// Every live particle sits in a live block, and counts match the arena.
fn assert_arena_consistent(sys: &FxSystem<RecordingBackend>, fx: &Arc<ParticleFx>) {
    let bucket = sys.bucket(fx).unwrap();
    let size = bucket.block_size();
    assert_eq!(bucket.particles().len(), bucket.blocks().len() * size);
    assert_eq!(bucket.vertices().len(), bucket.particles().len() * 6);

    for block in bucket.blocks() {
        let live = bucket.particles()[block.offset()..block.offset() + size]
            .iter()
            .filter(|p| p.is_alive())
            .count();
        assert_eq!(live, block.count());
        assert!(block.count() <= size);
        if block.count() > 0 {
            assert!(block.is_alive());
        }
    }
}

#[test]
fn test_one_draw_per_bucket() {
    let mut sys = system(RecordingBackend::default());
    let fire = effect("fire", 20.0, 500.0);
    let smoke = effect("smoke", 5.0, 2000.0);

    let mut emitters: Vec<Emitter> = (0..3).map(|_| sys.get(&fire)).collect();
    emitters.push(sys.get(&smoke));
    for (i, e) in emitters.iter_mut().enumerate() {
        e.set_position(i as f32, 0.0, 0.0);
        e.set_active(true);
    }

    sys.tick(1_000);
    sys.tick(1_200);
    assert_eq!(sys.bucket_count(), 2);

    sys.commit_ubo(0, &()).unwrap();
    sys.update_ubo(0).unwrap();
    let mut enc = RecordingEncoder::default();
    sys.draw(&mut enc, 0).unwrap();

    assert_eq!(enc.draws.len(), 2);
    assert_eq!(enc.bound, vec!["fire@0".to_string(), "smoke@0".to_string()]);

    let fire_bucket = sys.bucket(&fire).unwrap();
    assert_eq!(fire_bucket.blocks().len(), 3);
    assert_eq!(enc.draws[0].1 as usize, fire_bucket.vertices().len());
}

#[test]
fn test_equal_configs_are_distinct_buckets() {
    let mut sys = system(RecordingBackend::default());
    let a = effect("spark", 10.0, 1000.0);
    let b = Arc::new((*a).clone());

    let _ea = sys.get(&a);
    let _eb = sys.get(&b);
    let _ea2 = sys.get(&Arc::clone(&a));

    assert_eq!(sys.bucket_count(), 2);
    assert_eq!(sys.bucket(&a).unwrap().slots().len(), 2);
    assert_eq!(sys.bucket(&b).unwrap().slots().len(), 1);
}

#[test]
fn test_update_ubo_skips_stale_buffers() {
    let mut sys = system(RecordingBackend::default());
    let fx = effect("dust", 10.0, 5000.0);
    let mut e1 = sys.get(&fx);
    e1.set_active(true);

    sys.tick(0);
    sys.tick(100);
    sys.commit_ubo(0, &()).unwrap();
    sys.update_ubo(0).unwrap();
    assert_eq!(sys.backend().vertex_writes.borrow().len(), 1);

    // A second spawning emitter grows the arena; frame 0's buffer is now stale.
    let mut e2 = sys.get(&fx);
    e2.set_position(5.0, 0.0, 0.0);
    e2.set_active(true);
    sys.tick(200);
    assert!(sys.needs_to_update_commands(0));

    sys.update_ubo(0).unwrap();
    assert_eq!(sys.backend().vertex_writes.borrow().len(), 1);
    assert_eq!(sys.backend().uniform_writes.get(), 2);

    sys.commit_ubo(0, &()).unwrap();
    sys.update_ubo(0).unwrap();
    let writes = sys.backend().vertex_writes.borrow();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].1, 2 * 50 * 6);
}

#[test]
fn test_clean_frame_keeps_resources() {
    let mut sys = system(RecordingBackend::default());
    let fx = effect("dust", 10.0, 5000.0);
    let mut e = sys.get(&fx);
    e.set_active(true);
    sys.tick(0);
    sys.tick(100);

    sys.commit_ubo(0, &()).unwrap();
    sys.set_as_updated(0);
    let created = sys.backend().vertex_buffers.borrow().len();
    let binds = sys.backend().bind_sets.borrow().len();

    sys.tick(200);
    assert!(!sys.needs_to_update_commands(0));
    sys.commit_ubo(0, &()).unwrap();
    assert_eq!(sys.backend().vertex_buffers.borrow().len(), created);
    assert_eq!(sys.backend().bind_sets.borrow().len(), binds);
}

#[test]
fn test_missing_texture_leaves_bucket_undrawn() {
    let backend = RecordingBackend {
        missing_textures: vec!["ghost"],
        ..Default::default()
    };
    let mut sys = system(backend);
    let ghost = effect("ghost", 10.0, 1000.0);
    let fire = effect("fire", 10.0, 1000.0);
    let mut a = sys.get(&ghost);
    let mut b = sys.get(&fire);
    a.set_active(true);
    b.set_active(true);

    sys.tick(0);
    sys.tick(100);
    sys.commit_ubo(1, &()).unwrap();

    let mut enc = RecordingEncoder::default();
    sys.draw(&mut enc, 1).unwrap();
    assert_eq!(enc.bound, vec!["fire@1".to_string()]);
}

#[test]
fn test_clock_rewind_does_not_simulate() {
    let mut sys = system(RecordingBackend::default());
    let fx = effect("dust", 10.0, 5000.0);
    let mut e = sys.get(&fx);
    e.set_active(true);

    sys.tick(10_000);
    sys.tick(10_100);
    assert_eq!(sys.bucket(&fx).unwrap().live_particles(), 1);

    sys.tick(3_000);
    assert_eq!(sys.bucket(&fx).unwrap().live_particles(), 1);
    sys.tick(3_100);
    assert_eq!(sys.bucket(&fx).unwrap().live_particles(), 2);
}

#[test]
fn test_emitter_churn_keeps_arena_consistent() {
    let mut sys = system(RecordingBackend::default());
    let fx = effect("spark", 30.0, 300.0);
    let mut live: Vec<Emitter> = Vec::new();
    let mut t = 0;
    sys.tick(t);

    for round in 0..40 {
        if round % 3 == 0 {
            let mut e = sys.get(&fx);
            e.set_position(round as f32, 0.0, 0.0);
            e.set_active(true);
            live.push(e);
        }
        if round % 5 == 4 && !live.is_empty() {
            live.remove(0);
        }
        if round % 7 == 6 {
            if let Some(e) = live.last_mut() {
                e.set_active(false);
            }
        }

        t += 50;
        sys.tick(t);
        assert_arena_consistent(&sys, &fx);
    }

    live.clear();
    for _ in 0..20 {
        t += 50;
        sys.tick(t);
    }
    let bucket = sys.bucket(&fx).unwrap();
    assert!(bucket.slots().is_empty());
    assert!(bucket.blocks().is_empty());
    assert!(bucket.particles().is_empty());
}

#[test]
fn test_far_emitter_keeps_schedule_without_spawning() {
    let mut sys = system(RecordingBackend::default());
    let fx = effect("dust", 10.0, 5000.0);
    let mut e = sys.get(&fx);
    e.set_position(0.0, 0.0, 0.0);
    e.set_active(true);

    sys.tick(0);
    sys.tick(100);
    assert_eq!(e.backing_block().unwrap().count(), 1);

    sys.set_viewer_pos(Vec3::new(10_000.0, 0.0, 0.0));
    sys.tick(1_100);
    let block = e.backing_block().unwrap();
    assert_eq!(block.emitted(), 11);
    assert_eq!(block.count(), 1);

    // Walking back in range does not release the backlog.
    sys.set_viewer_pos(Vec3::ZERO);
    sys.tick(1_200);
    let block = e.backing_block().unwrap();
    assert_eq!(block.emitted(), 12);
    assert_eq!(block.count(), 2);
}

#[test]
fn test_far_emitter_without_block_stays_free() {
    let mut sys = system(RecordingBackend::default());
    let fx = effect("dust", 10.0, 5000.0);
    let mut e = sys.get(&fx);
    e.set_active(true);

    sys.set_viewer_pos(Vec3::new(0.0, 0.0, -9_000.0));
    sys.tick(0);
    sys.tick(1_000);
    assert!(e.backing_block().is_none());
    assert!(sys.bucket(&fx).unwrap().particles().is_empty());
}

#[test]
fn test_billboards_face_camera() {
    let mut sys = system(RecordingBackend::default());
    let fx = Arc::new(
        ParticleFx::new()
            .with_rate(10.0)
            .with_lifetime(5000.0, 0.0)
            .with_size(Vec2::splat(2.0), 1.0),
    );
    let mut e = sys.get(&fx);
    e.set_position(3.0, 4.0, 5.0);
    e.set_active(true);

    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 50.0), Vec3::ZERO, Vec3::Y);
    sys.set_model_view(&view, &Mat4::IDENTITY);
    sys.tick(0);
    sys.tick(100);

    let bucket = sys.bucket(&fx).unwrap();
    let quad = &bucket.vertices()[..6];
    let forward = Vec3::Z;
    for v in quad {
        let p = Vec3::from(v.pos) - Vec3::new(3.0, 4.0, 5.0);
        // Corners lie in the plane facing the camera.
        assert!(p.dot(forward).abs() < 1e-4);
        assert!((p.length() - 2.0_f32.sqrt()).abs() < 1e-4);
    }
}

#[test]
fn test_emitter_usable_while_bucket_inspected() {
    let mut sys = system(RecordingBackend::default());
    let fx = effect("dust", 10.0, 300.0);
    let mut e = sys.get(&fx);
    e.set_active(true);
    sys.tick(0);
    sys.tick(100);

    {
        let bucket = sys.bucket(&fx).unwrap();
        assert_eq!(bucket.slots().len(), 1);
        assert!(e.is_active());
        assert_eq!(e.position(), Some(Vec3::ZERO));
        assert_eq!(e.backing_block().map(|b| b.count()), Some(1));

        e.set_position(2.0, 0.0, 0.0);
        drop(e);
        // Nothing lands while the guard is held.
        assert!(bucket.slots()[0].is_alive());
        assert_eq!(bucket.slots()[0].position(), Vec3::ZERO);
    }

    sys.tick(200);
    {
        let bucket = sys.bucket(&fx).unwrap();
        assert_eq!(bucket.blocks()[0].position(), Vec3::new(2.0, 0.0, 0.0));
        assert!(!bucket.slots()[0].is_alive());
        assert_eq!(bucket.blocks()[0].emitted(), 1);
    }

    // The released emitter drains and its slot is trimmed.
    sys.tick(500);
    assert!(sys.bucket(&fx).unwrap().slots().is_empty());
}

#[test]
fn test_out_of_range_effect_does_not_panic() {
    let mut sys = system(RecordingBackend::default());
    let fx = Arc::new(ParticleFx::new().with_rate(1.0e20));
    assert!(fx.validate().is_err());

    let mut e = sys.get(&fx);
    e.set_active(true);
    sys.tick(0);
    sys.tick(10);
    assert!(sys.bucket(&fx).unwrap().block_size() <= pfxbatch::fx::MAX_BLOCK_SIZE);
    assert_eq!(e.backing_block().unwrap().emitted(), 100);
}
