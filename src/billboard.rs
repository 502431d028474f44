//! Camera-facing billboard quads.
//!
//! Every live particle becomes two triangles (six vertices) oriented along
//! the camera's right/up axes and spun by the particle's own rotation.
//! Vertex slots belong to particle slots one-to-one: slot `i` owns vertices
//! `6*i..6*i+6`, which lets a dying particle blank its quad in place.

use crate::bucket::Bucket;
use crate::fx::{BlendMode, ParticleFx};
use crate::particle::ParticleState;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Vertices per particle quad.
pub const VERTICES_PER_PARTICLE: usize = 6;

/// Unit quad corner offsets, two triangles.
const QUAD_DX: [f32; 6] = [-0.5, 0.5, -0.5, 0.5, 0.5, -0.5];
const QUAD_DY: [f32; 6] = [0.5, 0.5, -0.5, 0.5, -0.5, -0.5];

/// GPU vertex of a particle quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// World-space position.
    pub pos: [f32; 3],
    /// Texture coordinate.
    pub uv: [f32; 2],
    /// RGBA8 color.
    pub color: [u8; 4],
}

impl Vertex {
    /// Degenerate vertex written over dead particles.
    pub const ZERO: Vertex = Vertex {
        pos: [0.0; 3],
        uv: [0.0; 2],
        color: [0; 4],
    };
}

/// Camera right/up axes in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraBasis {
    /// World-space right axis.
    pub left: Vec3,
    /// World-space up axis.
    pub top: Vec3,
}

impl CameraBasis {
    /// Extract the basis from the first two rows of a view matrix.
    pub fn from_view(view: &Mat4) -> Self {
        Self {
            left: view.row(0).truncate().normalize_or_zero(),
            top: view.row(1).truncate().normalize_or_zero(),
        }
    }

    /// Basis spun by `angle` radians inside the view plane.
    #[inline]
    pub fn rotated(&self, angle: f32) -> (Vec3, Vec3) {
        let (s, c) = angle.sin_cos();
        (self.left * c - self.top * s, self.left * s + self.top * c)
    }
}

/// Pack a 0-255 color and 0-1 alpha for the given blend mode.
pub fn pack_color(color: Vec3, alpha: f32, blend: BlendMode) -> [u8; 4] {
    match blend {
        BlendMode::Additive => [
            (color.x * alpha) as u8,
            (color.y * alpha) as u8,
            (color.z * alpha) as u8,
            255,
        ],
        BlendMode::Alpha => [
            color.x as u8,
            color.y as u8,
            color.z as u8,
            (alpha * 255.0) as u8,
        ],
    }
}

/// Write the six vertices of one live particle.
pub fn write_quad(
    out: &mut [Vertex],
    ps: &ParticleState,
    anchor: Vec3,
    basis: &CameraBasis,
    fx: &ParticleFx,
) {
    let a = ps.life_time();
    let color = fx.color_start * (1.0 - a) + fx.color_end * a;
    let alpha = fx.alpha_start * (1.0 - a) + fx.alpha_end * a;
    let size = fx.size_start * (1.0 + a * (fx.size_end_scale - 1.0));
    let packed = pack_color(color, alpha, fx.blend);

    let (left, top) = basis.rotated(ps.rotation);
    let center = ps.pos + anchor;

    for (i, v) in out.iter_mut().take(VERTICES_PER_PARTICLE).enumerate() {
        let corner = left * (QUAD_DX[i] * size.x) + top * (QUAD_DY[i] * size.y);
        *v = Vertex {
            pos: (center + corner).to_array(),
            uv: [QUAD_DX[i] + 0.5, QUAD_DY[i] + 0.5],
            color: packed,
        };
    }
}

impl Bucket {
    /// Rebuild the quads of every live particle.
    ///
    /// Free slots are skipped; their vertices were zeroed when they died.
    pub(crate) fn build_vbo(&mut self, view: &Mat4) {
        let basis = CameraBasis::from_view(view);
        let fx = &self.fx;

        for block in &self.blocks {
            if block.count == 0 {
                continue;
            }
            for i in block.offset..block.offset + self.block_size {
                let ps = &self.particles[i];
                if !ps.is_alive() {
                    continue;
                }
                let start = i * VERTICES_PER_PARTICLE;
                let quad = &mut self.vertices[start..start + VERTICES_PER_PARTICLE];
                write_quad(quad, ps, block.pos, &basis, fx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn live(life: u32, max_life: u32) -> ParticleState {
        ParticleState {
            life,
            max_life,
            ..Default::default()
        }
    }

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn test_identity_basis() {
        let basis = CameraBasis::from_view(&Mat4::IDENTITY);
        assert_eq!(basis.left, Vec3::X);
        assert_eq!(basis.top, Vec3::Y);

        let (l, t) = basis.rotated(std::f32::consts::FRAC_PI_2);
        assert!((l + Vec3::Y).length() < 1e-6);
        assert!((t - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_basis_is_normalized() {
        let view = Mat4::from_scale(Vec3::new(3.0, 2.0, 1.0));
        let basis = CameraBasis::from_view(&view);
        assert!((basis.left.length() - 1.0).abs() < 1e-6);
        assert!((basis.top.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pack_color_modes() {
        let c = Vec3::new(200.0, 100.0, 50.0);
        assert_eq!(pack_color(c, 0.5, BlendMode::Alpha), [200, 100, 50, 127]);
        assert_eq!(pack_color(c, 0.5, BlendMode::Additive), [100, 50, 25, 255]);
    }

    #[test]
    fn test_fresh_particle_quad() {
        let fx = ParticleFx::new().with_size(Vec2::new(2.0, 4.0), 1.0);
        let basis = CameraBasis::from_view(&Mat4::IDENTITY);
        let mut out = [Vertex::ZERO; 6];
        let anchor = Vec3::new(10.0, 0.0, 0.0);

        write_quad(&mut out, &live(1000, 1000), anchor, &basis, &fx);

        // Top-left corner of the first triangle.
        assert_eq!(out[0].pos, [9.0, 2.0, 0.0]);
        assert_eq!(out[0].uv, [0.0, 1.0]);
        assert_eq!(out[4].pos, [11.0, -2.0, 0.0]);
        assert_eq!(out[4].uv, [1.0, 0.0]);
        // Birth color, full opacity.
        assert_eq!(out[0].color, [255, 255, 255, 255]);
    }

    #[test]
    fn test_interpolates_over_life() {
        let fx = ParticleFx::new()
            .with_colors(Vec3::ZERO, Vec3::splat(200.0))
            .with_alpha(1.0, 0.0)
            .with_size(Vec2::splat(2.0), 3.0);
        let basis = CameraBasis::from_view(&Mat4::IDENTITY);
        let mut out = [Vertex::ZERO; 6];

        write_quad(&mut out, &live(500, 1000), Vec3::ZERO, &basis, &fx);

        assert_eq!(out[0].color, [100, 100, 100, 127]);
        // Half size grows from 1.0 to 2.0 at half life.
        assert_eq!(out[0].pos, [-2.0, 2.0, 0.0]);
    }
}
