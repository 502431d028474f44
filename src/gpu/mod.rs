//! Rendering-layer seam.
//!
//! The particle system never talks to a graphics API directly. It asks a
//! [`RenderBackend`] for buffers and bind sets, and records draws through a
//! [`FrameEncoder`]. Pipelines, render passes and shadow maps stay owned by
//! the caller's renderer.
//!
//! Two backends ship with the crate:
//! - [`WgpuBackend`] (feature `wgpu`, on by default)
//! - [`HeadlessBackend`], which allocates nothing and is used for
//!   server-side simulation and tests

#[cfg(feature = "wgpu")]
mod wgpu_backend;

#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuBackend;

use crate::billboard::Vertex;
use crate::error::Result;

/// GPU resource factory used by [`FxSystem`](crate::FxSystem).
pub trait RenderBackend {
    /// Per-frame global uniform buffer.
    type UniformBuffer;
    /// Vertex buffer holding one bucket's quads.
    type VertexBuffer;
    /// Texture handle, used for the shadow map.
    type Texture;
    /// Bound resource set for one bucket draw.
    type BindSet;

    /// Number of frame slots that may be in flight at once.
    fn frames_in_flight(&self) -> usize;

    /// Allocate a uniform buffer of `size` bytes.
    fn create_uniform_buffer(&self, size: usize) -> Result<Self::UniformBuffer>;

    /// Overwrite a uniform buffer from the start.
    fn write_uniform_buffer(&self, buffer: &Self::UniformBuffer, data: &[u8]);

    /// Allocate a vertex buffer sized for and filled with `vertices`.
    fn create_vertex_buffer(&self, vertices: &[Vertex]) -> Result<Self::VertexBuffer>;

    /// Overwrite a vertex buffer. `vertices` has the length it was created with.
    fn write_vertex_buffer(&self, buffer: &Self::VertexBuffer, vertices: &[Vertex]);

    /// Bind the global uniforms, the named particle texture and the shadow map.
    fn create_bind_set(
        &self,
        uniforms: &Self::UniformBuffer,
        texture: &str,
        shadow_map: &Self::Texture,
    ) -> Result<Self::BindSet>;
}

/// Draw-command sink for one frame.
pub trait FrameEncoder<B: RenderBackend + ?Sized> {
    /// Bind the resource set of the next draw.
    fn set_bind_set(&mut self, set: &B::BindSet);

    /// Draw `vertex_count` vertices from `vertices`.
    fn draw(&mut self, vertices: &B::VertexBuffer, vertex_count: u32);
}

/// Backend that allocates nothing.
///
/// Vertex buffers are represented by their length so that draws can still be
/// counted.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    frames_in_flight: usize,
}

impl HeadlessBackend {
    /// Create a headless backend with the given number of frame slots.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(2)
    }
}

impl RenderBackend for HeadlessBackend {
    type UniformBuffer = ();
    type VertexBuffer = usize;
    type Texture = ();
    type BindSet = ();

    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn create_uniform_buffer(&self, _size: usize) -> Result<()> {
        Ok(())
    }

    fn write_uniform_buffer(&self, _buffer: &(), _data: &[u8]) {}

    fn create_vertex_buffer(&self, vertices: &[Vertex]) -> Result<usize> {
        Ok(vertices.len())
    }

    fn write_vertex_buffer(&self, _buffer: &usize, _vertices: &[Vertex]) {}

    fn create_bind_set(&self, _uniforms: &(), _texture: &str, _shadow_map: &()) -> Result<()> {
        Ok(())
    }
}

/// Encoder that records vertex counts instead of issuing draws.
#[derive(Debug, Default, Clone)]
pub struct HeadlessEncoder {
    /// Vertex count of every draw, in submission order.
    pub draws: Vec<u32>,
    /// Number of bind-set changes.
    pub binds: usize,
}

impl HeadlessEncoder {
    /// Total vertices drawn.
    pub fn vertex_total(&self) -> u64 {
        self.draws.iter().map(|&n| n as u64).sum()
    }
}

impl FrameEncoder<HeadlessBackend> for HeadlessEncoder {
    fn set_bind_set(&mut self, _set: &()) {
        self.binds += 1;
    }

    fn draw(&mut self, _vertices: &usize, vertex_count: u32) {
        self.draws.push(vertex_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_frames_clamped() {
        assert_eq!(HeadlessBackend::new(0).frames_in_flight(), 1);
        assert_eq!(HeadlessBackend::default().frames_in_flight(), 2);
    }

    #[test]
    fn test_headless_vertex_buffer_is_length() {
        let b = HeadlessBackend::default();
        let vbo = b.create_vertex_buffer(&[Vertex::ZERO; 12]).unwrap();
        assert_eq!(vbo, 12);
    }

    #[test]
    fn test_headless_encoder_counts() {
        let mut enc = HeadlessEncoder::default();
        FrameEncoder::<HeadlessBackend>::set_bind_set(&mut enc, &());
        FrameEncoder::<HeadlessBackend>::draw(&mut enc, &6, 6);
        FrameEncoder::<HeadlessBackend>::draw(&mut enc, &12, 12);
        assert_eq!(enc.binds, 1);
        assert_eq!(enc.vertex_total(), 18);
    }
}
