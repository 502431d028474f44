//! Global per-frame uniform block shared by every particle draw.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Directional light affecting particles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    /// Direction the light travels in.
    pub direction: Vec3,
    /// Light color.
    pub color: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::ONE,
        }
    }
}

/// GPU layout of the global uniform block.
///
/// Written once per frame on the CPU and copied into the uniform buffer of
/// the frame slot being prepared.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    /// Camera view matrix.
    pub model_view: [[f32; 4]; 4],
    /// Shadow-map view matrix.
    pub shadow_view: [[f32; 4]; 4],
    /// Direction towards the light.
    pub light_dir: [f32; 3],
    _pad0: f32,
    /// Light color, w unused.
    pub light_color: [f32; 4],
    /// Ambient color, w unused.
    pub light_ambient: [f32; 4],
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        Self {
            model_view: Mat4::IDENTITY.to_cols_array_2d(),
            shadow_view: Mat4::IDENTITY.to_cols_array_2d(),
            light_dir: [0.0, 1.0, 0.0],
            _pad0: 0.0,
            light_color: [1.0, 1.0, 1.0, 0.0],
            light_ambient: [0.0; 4],
        }
    }
}

impl GlobalUniforms {
    /// Set camera and shadow matrices.
    pub fn set_view(&mut self, view: &Mat4, shadow: &Mat4) {
        self.model_view = view.to_cols_array_2d();
        self.shadow_view = shadow.to_cols_array_2d();
    }

    /// Set the light. The stored direction points towards the light.
    pub fn set_light(&mut self, light: &Light, ambient: Vec3) {
        self.light_dir = (-light.direction).to_array();
        self.light_color = light.color.extend(0.0).to_array();
        self.light_ambient = ambient.extend(0.0).to_array();
    }

    /// Camera view matrix.
    pub fn view(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model_view)
    }

    /// Raw bytes for a uniform buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
