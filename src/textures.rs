//! Sampler configuration for particle textures.
//!
//! Particle textures themselves are owned by the rendering layer and looked
//! up by the name stored in [`ParticleFx::texture`](crate::ParticleFx). This
//! module only describes how those textures are sampled.
//!
//! ```ignore
//! let sampler = SamplerConfig::new()
//!     .with_filter(FilterMode::Nearest)
//!     .with_address_mode(AddressMode::Repeat);
//! ```

/// Filter mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Smooth linear filtering (default). Good for soft puffs and smoke.
    #[default]
    Linear,
    /// Sharp nearest-neighbor filtering. Good for pixel-art sprites.
    Nearest,
}

/// Address mode for texture wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// Clamp to edge color (default). Keeps quad borders from bleeding.
    #[default]
    ClampToEdge,
    /// Repeat/tile the texture.
    Repeat,
    /// Mirror the texture at boundaries.
    MirrorRepeat,
}

/// How particle textures are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerConfig {
    /// Filter mode for magnification, minification and mip selection.
    pub filter: FilterMode,
    /// Address mode for UV coordinates outside 0-1.
    pub address_mode: AddressMode,
}

impl SamplerConfig {
    /// Linear filtering, clamped to edge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter mode.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Set the address mode.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }
}

#[cfg(feature = "wgpu")]
impl From<FilterMode> for wgpu::FilterMode {
    fn from(mode: FilterMode) -> Self {
        match mode {
            FilterMode::Linear => wgpu::FilterMode::Linear,
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

#[cfg(feature = "wgpu")]
impl From<AddressMode> for wgpu::AddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[cfg(feature = "wgpu")]
impl SamplerConfig {
    /// Sampler descriptor for this configuration.
    pub fn descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        let address: wgpu::AddressMode = self.address_mode.into();
        let filter: wgpu::FilterMode = self.filter.into();
        wgpu::SamplerDescriptor {
            label: Some("Particle Sampler"),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = SamplerConfig::new();
        assert_eq!(s.filter, FilterMode::Linear);
        assert_eq!(s.address_mode, AddressMode::ClampToEdge);
    }

    #[test]
    fn test_builder() {
        let s = SamplerConfig::new()
            .with_filter(FilterMode::Nearest)
            .with_address_mode(AddressMode::MirrorRepeat);
        assert_eq!(s.filter, FilterMode::Nearest);
        assert_eq!(s.address_mode, AddressMode::MirrorRepeat);
    }

    #[cfg(feature = "wgpu")]
    #[test]
    fn test_descriptor() {
        let d = SamplerConfig::new()
            .with_address_mode(AddressMode::Repeat)
            .descriptor();
        assert_eq!(d.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(d.mag_filter, wgpu::FilterMode::Linear);
    }
}
