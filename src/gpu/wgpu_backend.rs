//! wgpu implementation of the rendering seam.

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::{FrameEncoder, RenderBackend};
use crate::billboard::Vertex;
use crate::error::{FxError, Result};
use crate::textures::SamplerConfig;

/// Backend over a caller-owned `wgpu::Device` and `wgpu::Queue`.
///
/// Bind sets follow the layout returned by [`WgpuBackend::bind_group_layout`]:
///
/// | binding | resource                  |
/// |---------|---------------------------|
/// | 0       | global uniforms           |
/// | 1       | particle texture sampler  |
/// | 2       | particle texture          |
/// | 3       | shadow map (depth)        |
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textures: HashMap<String, wgpu::TextureView>,
    frames_in_flight: usize,
}

impl WgpuBackend {
    /// Create a backend.
    ///
    /// `layout` must be compatible with [`WgpuBackend::bind_group_layout`];
    /// it is the layout the caller's particle pipeline was built with.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        layout: wgpu::BindGroupLayout,
        sampler: SamplerConfig,
        frames_in_flight: usize,
    ) -> Self {
        let sampler = device.create_sampler(&sampler.descriptor());
        Self {
            device,
            queue,
            layout,
            sampler,
            textures: HashMap::new(),
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    /// Bind group layout expected by [`RenderBackend::create_bind_set`].
    pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        })
    }

    /// Make a texture available to effects under `name`.
    ///
    /// Replacing a texture only affects bind sets built afterwards.
    pub fn register_texture(&mut self, name: impl Into<String>, view: wgpu::TextureView) {
        self.textures.insert(name.into(), view);
    }

    /// Forget a texture. Returns the view if it was registered.
    pub fn remove_texture(&mut self, name: &str) -> Option<wgpu::TextureView> {
        self.textures.remove(name)
    }

    /// The device this backend allocates from.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

impl RenderBackend for WgpuBackend {
    type UniformBuffer = wgpu::Buffer;
    type VertexBuffer = wgpu::Buffer;
    type Texture = wgpu::TextureView;
    type BindSet = wgpu::BindGroup;

    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn create_uniform_buffer(&self, size: usize) -> Result<wgpu::Buffer> {
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniform Buffer"),
            size: size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }))
    }

    fn write_uniform_buffer(&self, buffer: &wgpu::Buffer, data: &[u8]) {
        self.queue.write_buffer(buffer, 0, data);
    }

    fn create_vertex_buffer(&self, vertices: &[Vertex]) -> Result<wgpu::Buffer> {
        let contents: &[u8] = bytemuck::cast_slice(vertices);
        let limit = self.device.limits().max_buffer_size;
        if contents.len() as u64 > limit {
            return Err(FxError::BufferTooLarge {
                size: contents.len() as u64,
                limit,
            });
        }

        Ok(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Vertex Buffer"),
            contents,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        }))
    }

    fn write_vertex_buffer(&self, buffer: &wgpu::Buffer, vertices: &[Vertex]) {
        self.queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(vertices));
    }

    fn create_bind_set(
        &self,
        uniforms: &wgpu::Buffer,
        texture: &str,
        shadow_map: &wgpu::TextureView,
    ) -> Result<wgpu::BindGroup> {
        let view = self
            .textures
            .get(texture)
            .ok_or_else(|| FxError::UnknownTexture(texture.to_string()))?;

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(shadow_map),
                },
            ],
        }))
    }
}

impl FrameEncoder<WgpuBackend> for wgpu::RenderPass<'_> {
    fn set_bind_set(&mut self, set: &wgpu::BindGroup) {
        self.set_bind_group(0, set, &[]);
    }

    fn draw(&mut self, vertices: &wgpu::Buffer, vertex_count: u32) {
        self.set_vertex_buffer(0, vertices.slice(..));
        wgpu::RenderPass::draw(self, 0..vertex_count, 0..1);
    }
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Unorm8x4];

    /// Vertex buffer layout for particle pipelines.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_matches_struct() {
        let layout = Vertex::layout();
        assert_eq!(layout.array_stride, 24);
        assert_eq!(layout.attributes.len(), 3);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 20);
        assert_eq!(layout.attributes[2].format, wgpu::VertexFormat::Unorm8x4);
    }
}
