//! GPU abstraction layer for backend-agnostic texture uploads
//!
//! This module provides the device trait the loaders talk to, allowing the
//! texture system to work with any GPU backend.

pub mod mock;
#[cfg(feature = "gpu-vulkan")]
pub mod vulkan;

use std::fmt::Debug;
use thiserror::Error;

use crate::options::{AddressMode, FilterKind, TextureOptions};
use crate::texture::TextureType;

/// Error type for GPU operations
#[derive(Error, Debug, Clone)]
pub enum GpuError {
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("Sampler creation failed: {0}")]
    SamplerCreationFailed(String),

    #[error("Unsupported texture format: {0:?}")]
    UnsupportedFormat(GpuTextureFormat),

    #[error("Device lost")]
    DeviceLost,

    #[error("Out of memory")]
    OutOfMemory,
}

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Pixel formats a texture can be uploaded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuTextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgb8Unorm,
    Rgb565,
    Rgba4444,
    Rgba5551,
    /// Single channel luminance
    L8,
    /// Single channel alpha
    A8,
    /// Luminance + alpha
    La88,
    Pvrtc2bppRgb,
    Pvrtc2bppRgba,
    Pvrtc4bppRgb,
    Pvrtc4bppRgba,
    Etc1,
    Bc1,
    Bc2,
    Bc3,
}

impl GpuTextureFormat {
    /// Whether the format is block compressed
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Self::Pvrtc2bppRgb
                | Self::Pvrtc2bppRgba
                | Self::Pvrtc4bppRgb
                | Self::Pvrtc4bppRgba
                | Self::Etc1
                | Self::Bc1
                | Self::Bc2
                | Self::Bc3
        )
    }

    /// Bytes per pixel for uncompressed formats
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Rgba8Unorm | Self::Bgra8Unorm => Some(4),
            Self::Rgb8Unorm => Some(3),
            Self::Rgb565 | Self::Rgba4444 | Self::Rgba5551 | Self::La88 => Some(2),
            Self::L8 | Self::A8 => Some(1),
            _ => None,
        }
    }

    /// Block footprint as `(block_width, block_height, bytes_per_block, min_blocks)`
    ///
    /// Uncompressed formats report a 1x1 block of one pixel.
    pub fn block_layout(self) -> (u32, u32, usize, u32) {
        match self {
            // PVRTC always addresses at least 2x2 blocks
            Self::Pvrtc2bppRgb | Self::Pvrtc2bppRgba => (8, 4, 8, 2),
            Self::Pvrtc4bppRgb | Self::Pvrtc4bppRgba => (4, 4, 8, 2),
            Self::Etc1 | Self::Bc1 => (4, 4, 8, 1),
            Self::Bc2 | Self::Bc3 => (4, 4, 16, 1),
            other => (1, 1, other.bytes_per_pixel().unwrap_or(4), 1),
        }
    }

    /// Size in bytes of one image of the given dimensions
    pub fn level_size(self, width: u32, height: u32) -> usize {
        let (bw, bh, block_bytes, min_blocks) = self.block_layout();
        let blocks_x = width.div_ceil(bw).max(min_blocks) as usize;
        let blocks_y = height.div_ceil(bh).max(min_blocks) as usize;
        blocks_x * blocks_y * block_bytes
    }
}

/// Texture descriptor for creation
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    /// Allocated width in pixels
    pub width: u32,
    /// Allocated height in pixels
    pub height: u32,
    /// Texture format
    pub format: GpuTextureFormat,
    /// Number of mip levels (1 = no mipmaps)
    pub mip_levels: u32,
    /// Flat or cubemap
    pub texture_type: TextureType,
}

impl TextureDescriptor {
    /// Number of faces (array layers) the texture has
    pub fn face_count(&self) -> u32 {
        match self.texture_type {
            TextureType::Flat2D => 1,
            TextureType::Cubemap => 6,
        }
    }

    /// Total bytes of a full mip chain across all faces
    pub fn byte_size(&self) -> usize {
        let per_face: usize = (0..self.mip_levels)
            .map(|level| {
                let (w, h) = mip_dimensions(self.width, self.height, level);
                self.format.level_size(w, h)
            })
            .sum();
        per_face * self.face_count() as usize
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: GpuTextureFormat::Rgba8Unorm,
            mip_levels: 1,
            texture_type: TextureType::Flat2D,
        }
    }
}

/// Sampler state descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDescriptor {
    pub min_filter: FilterKind,
    pub mag_filter: FilterKind,
    pub mipmap_filter: FilterKind,
    pub address_mode_x: AddressMode,
    pub address_mode_y: AddressMode,
}

impl SamplerDescriptor {
    /// Build a sampler descriptor for a texture with `mip_levels` levels
    ///
    /// A single-level texture never samples across mips.
    pub fn from_options(options: &TextureOptions, mip_levels: u32) -> Self {
        Self {
            min_filter: options.min_filter,
            mag_filter: options.mag_filter,
            mipmap_filter: if mip_levels > 1 {
                options.mipmap_filter
            } else {
                FilterKind::MipmapNone
            },
            address_mode_x: options.address_mode_x,
            address_mode_y: options.address_mode_y,
        }
    }
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self::from_options(&TextureOptions::default(), 1)
    }
}

/// Dimensions of a mip level, clamped to 1x1
pub fn mip_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Number of levels in a full mip chain for the given base size
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Core GPU device trait for backend-agnostic texture operations
///
/// This trait abstracts GPU operations, allowing the texture system to work
/// with any GPU backend (Vulkan, Metal, Mock, etc.) through associated types.
///
/// # Associated Types
/// - `Texture`: The texture handle type for this GPU backend
/// - `Sampler`: The sampler-state handle type for this GPU backend
///
/// # Example
/// ```ignore
/// let gpu = MockGpu::new();
/// let texture = gpu.create_texture(&desc)?;
/// gpu.upload_texture_level(&texture, 0, 0, &pixels)?;
/// ```
pub trait GpuDevice: Send + Sync + Clone + Debug + 'static {
    /// Texture type for this GPU backend
    type Texture: Send + Sync + Debug;

    /// Sampler type for this GPU backend
    type Sampler: Send + Sync + Debug;

    /// Allocate an empty texture
    fn create_texture(&self, desc: &TextureDescriptor) -> GpuResult<Self::Texture>;

    /// Upload one mip level of one face
    ///
    /// # Arguments
    /// * `texture` - Target texture
    /// * `face` - Cubemap face index (0 for flat textures)
    /// * `level` - Mip level, 0 being the base
    /// * `data` - Tightly packed pixel data for the level
    fn upload_texture_level(
        &self,
        texture: &Self::Texture,
        face: u32,
        level: u32,
        data: &[u8],
    ) -> GpuResult<()>;

    /// Fill levels 1.. from level 0
    fn generate_mipmaps(&self, texture: &Self::Texture) -> GpuResult<()>;

    /// Create sampler state
    fn create_sampler(&self, desc: &SamplerDescriptor) -> GpuResult<Self::Sampler>;

    /// Release a texture
    fn destroy_texture(&self, _texture: Self::Texture) {
        // Default: let Drop handle it
    }

    /// Release a sampler
    fn destroy_sampler(&self, _sampler: Self::Sampler) {
        // Default: let Drop handle it
    }

    /// Whether the device can sample the given format
    fn supports_format(&self, _format: GpuTextureFormat) -> bool {
        true
    }

    /// Whether textures must be allocated with power-of-two dimensions
    fn requires_power_of_two(&self) -> bool {
        false
    }

    /// Get the name of this GPU backend (for debugging)
    fn backend_name(&self) -> &'static str;
}

// Re-export implementations
pub use mock::MockGpu;

#[cfg(feature = "gpu-vulkan")]
pub use vulkan::VulkanDevice;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncompressed_level_size() {
        assert_eq!(GpuTextureFormat::Rgba8Unorm.level_size(64, 64), 64 * 64 * 4);
        assert_eq!(GpuTextureFormat::Rgb565.level_size(3, 5), 3 * 5 * 2);
        assert_eq!(GpuTextureFormat::A8.level_size(1, 1), 1);
    }

    #[test]
    fn test_compressed_level_size() {
        // 4x4 blocks of 8 bytes, rounded up
        assert_eq!(GpuTextureFormat::Bc1.level_size(5, 5), 4 * 8);
        assert_eq!(GpuTextureFormat::Bc3.level_size(4, 4), 16);
        // PVRTC never goes below 2x2 blocks
        assert_eq!(GpuTextureFormat::Pvrtc4bppRgba.level_size(1, 1), 32);
        assert_eq!(GpuTextureFormat::Pvrtc2bppRgb.level_size(16, 16), 2 * 4 * 8);
    }

    #[test]
    fn test_mip_helpers() {
        assert_eq!(full_mip_chain(64, 64), 7);
        assert_eq!(full_mip_chain(1, 1), 1);
        assert_eq!(full_mip_chain(100, 20), 7);
        assert_eq!(mip_dimensions(64, 16, 5), (2, 1));
    }

    #[test]
    fn test_descriptor_byte_size() {
        let desc = TextureDescriptor {
            width: 4,
            height: 4,
            format: GpuTextureFormat::Rgba8Unorm,
            mip_levels: 3,
            texture_type: TextureType::Cubemap,
        };
        assert_eq!(desc.face_count(), 6);
        assert_eq!(desc.byte_size(), (64 + 16 + 4) * 6);
    }

    #[test]
    fn test_single_level_sampler_drops_mip_filter() {
        let options = TextureOptions {
            mipmap_filter: FilterKind::Linear,
            ..TextureOptions::default()
        };
        assert_eq!(
            SamplerDescriptor::from_options(&options, 1).mipmap_filter,
            FilterKind::MipmapNone
        );
        assert_eq!(
            SamplerDescriptor::from_options(&options, 4).mipmap_filter,
            FilterKind::Linear
        );
    }
}
