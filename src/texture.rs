//! GPU-backed textures
//!
//! A [`Texture`] owns one GPU texture handle and one sampler handle and
//! releases both when dropped. Textures are only produced by the loading
//! pipeline, either from a decoded image or from a parsed PVR container.

use glam::{UVec2, Vec2};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use crate::error::{Result, TextureError};
use crate::gpu::{
    full_mip_chain, mip_dimensions, GpuDevice, GpuTextureFormat, SamplerDescriptor,
    TextureDescriptor,
};
use crate::loader::image::DecodedImage;
use crate::loader::pvr::{ContainerDescriptor, LevelRange, PvrContainer};
use crate::options::TextureOptions;

/// The type of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    /// A regular rectangular texture
    Flat2D,
    /// Six square faces
    Cubemap,
}

/// A UV-rectangle view covering part of a texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteFrame {
    /// Rectangle origin in pixels
    pub origin: UVec2,
    /// Rectangle size in pixels
    pub size: UVec2,
    /// Lower UV corner
    pub uv_min: Vec2,
    /// Upper UV corner
    pub uv_max: Vec2,
    /// Whether the rectangle is stored rotated by 90 degrees
    pub rotated: bool,
}

/// GPU handles owned by a texture
///
/// Released on drop, so a partially built texture never leaks its handles.
#[derive(Debug)]
struct GpuResources<G: GpuDevice> {
    gpu: G,
    texture: Option<G::Texture>,
    sampler: Option<G::Sampler>,
}

impl<G: GpuDevice> GpuResources<G> {
    fn allocate(gpu: &G, desc: &TextureDescriptor) -> Result<Self> {
        let texture = gpu.create_texture(desc)?;
        Ok(Self {
            gpu: gpu.clone(),
            texture: Some(texture),
            sampler: None,
        })
    }

    fn texture(&self) -> Result<&G::Texture> {
        self.texture
            .as_ref()
            .ok_or_else(|| TextureError::GpuResourceExhausted("texture released".to_string()))
    }

    fn upload(&self, face: u32, level: u32, data: &[u8]) -> Result<()> {
        self.gpu
            .upload_texture_level(self.texture()?, face, level, data)?;
        Ok(())
    }

    fn generate_mipmaps(&self) -> Result<()> {
        self.gpu.generate_mipmaps(self.texture()?)?;
        Ok(())
    }

    fn attach_sampler(&mut self, desc: &SamplerDescriptor) -> Result<()> {
        let sampler = self.gpu.create_sampler(desc).map_err(|e| match e {
            crate::gpu::GpuError::SamplerCreationFailed(msg) => {
                TextureError::GpuResourceExhausted(msg)
            }
            other => other.into(),
        })?;
        self.sampler = Some(sampler);
        Ok(())
    }
}

impl<G: GpuDevice> Drop for GpuResources<G> {
    fn drop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            self.gpu.destroy_sampler(sampler);
        }
        if let Some(texture) = self.texture.take() {
            self.gpu.destroy_texture(texture);
            log::trace!("Texture released on {}", self.gpu.backend_name());
        }
    }
}

/// A texture living on the GPU
#[derive(Debug)]
pub struct Texture<G: GpuDevice> {
    resources: Option<GpuResources<G>>,
    size_in_pixels: UVec2,
    content_size_in_pixels: UVec2,
    texture_type: TextureType,
    format: GpuTextureFormat,
    mip_levels: u32,
    byte_size: usize,
    premultiplied_alpha: bool,
    content_scale: AtomicU32,
    sprite_frame: OnceLock<SpriteFrame>,
}

impl<G: GpuDevice> Texture<G> {
    /// The "no texture" placeholder: zero sized, no GPU handles, samples black
    pub fn none() -> Self {
        Self::assemble(
            None,
            UVec2::ZERO,
            UVec2::ZERO,
            TextureType::Flat2D,
            GpuTextureFormat::Rgba8Unorm,
            0,
            0,
            false,
        )
    }

    /// Upload a decoded image
    ///
    /// Pads to the next power of two when the device requires it; the padded
    /// allocation size becomes `content_size_in_pixels`.
    pub fn from_image(gpu: &G, image: &DecodedImage, options: &TextureOptions) -> Result<Self> {
        let size = UVec2::new(image.width, image.height);
        if !gpu.supports_format(image.format) {
            return Err(TextureError::UnsupportedPixelFormat(format!(
                "{:?} on {}",
                image.format,
                gpu.backend_name()
            )));
        }

        let expected = image.format.level_size(image.width, image.height);
        if image.data.len() != expected {
            return Err(TextureError::TruncatedData {
                expected,
                actual: image.data.len(),
            });
        }

        let content_size = if gpu.requires_power_of_two() && !is_power_of_two(size) {
            UVec2::new(size.x.next_power_of_two(), size.y.next_power_of_two())
        } else {
            size
        };
        let pixels = pad_rows(&image.data, image.format, size, content_size)?;

        let mip_levels = if options.generate_mipmaps {
            full_mip_chain(content_size.x, content_size.y)
        } else {
            1
        };

        let desc = TextureDescriptor {
            width: content_size.x,
            height: content_size.y,
            format: image.format,
            mip_levels,
            texture_type: TextureType::Flat2D,
        };
        let mut resources = GpuResources::allocate(gpu, &desc)?;
        resources.upload(0, 0, &pixels)?;
        if mip_levels > 1 {
            resources.generate_mipmaps()?;
        }
        resources.attach_sampler(&SamplerDescriptor::from_options(options, mip_levels))?;

        Ok(Self::assemble(
            Some(resources),
            size,
            content_size,
            TextureType::Flat2D,
            image.format,
            mip_levels,
            desc.byte_size(),
            false,
        ))
    }

    /// Upload a parsed PVR container
    ///
    /// Container mips take precedence: `generate_mipmaps` is only honoured
    /// for single-level, uncompressed containers.
    pub fn from_container(gpu: &G, container: &PvrContainer, options: &TextureOptions) -> Result<Self> {
        Self::from_container_levels(gpu, &container.descriptor, options, move |range| {
            container.level_bytes(range).map(Cow::Borrowed)
        })
    }

    /// Upload a container whose levels are fetched one range at a time
    ///
    /// `fetch` is called once per range, face-major with ascending mips, after
    /// the GPU texture is allocated. When the device requires power-of-two
    /// sizes, uncompressed flat containers are padded level by level; other
    /// containers are rejected before anything is allocated.
    pub fn from_container_levels<'a, F>(
        gpu: &G,
        descriptor: &ContainerDescriptor,
        options: &TextureOptions,
        mut fetch: F,
    ) -> Result<Self>
    where
        F: FnMut(&LevelRange) -> Result<Cow<'a, [u8]>>,
    {
        let format = descriptor.pixel_format;
        if !gpu.supports_format(format) {
            return Err(TextureError::UnsupportedPixelFormat(format!(
                "{:?} on {}",
                format,
                gpu.backend_name()
            )));
        }

        let size = UVec2::new(descriptor.width, descriptor.height);
        let content_size = if gpu.requires_power_of_two() && !is_power_of_two(size) {
            if format.is_compressed() || descriptor.face_count != 1 {
                return Err(TextureError::UnsupportedPixelFormat(format!(
                    "{}x{} {:?} {:?} cannot be padded to a power of two for {}",
                    size.x,
                    size.y,
                    descriptor.texture_type(),
                    format,
                    gpu.backend_name()
                )));
            }
            UVec2::new(size.x.next_power_of_two(), size.y.next_power_of_two())
        } else {
            size
        };

        let mut generate = false;
        if options.generate_mipmaps {
            if descriptor.mip_level_count > 1 {
                log::debug!(
                    "Container provides {} mip levels, ignoring mipmap generation",
                    descriptor.mip_level_count
                );
            } else if format.is_compressed() {
                log::warn!("Cannot generate mipmaps for compressed format {:?}", format);
            } else {
                generate = true;
            }
        }

        let mip_levels = if generate {
            full_mip_chain(content_size.x, content_size.y)
        } else {
            descriptor.mip_level_count
        };
        let texture_type = descriptor.texture_type();

        let desc = TextureDescriptor {
            width: content_size.x,
            height: content_size.y,
            format,
            mip_levels,
            texture_type,
        };
        let mut resources = GpuResources::allocate(gpu, &desc)?;
        for range in descriptor.upload_order() {
            let bytes = fetch(range)?;
            let (w, h) = mip_dimensions(size.x, size.y, range.level);
            let (cw, ch) = mip_dimensions(content_size.x, content_size.y, range.level);
            let level = pad_rows(&bytes, format, UVec2::new(w, h), UVec2::new(cw, ch))?;
            resources.upload(range.face, range.level, &level)?;
        }
        if generate {
            resources.generate_mipmaps()?;
        }
        resources.attach_sampler(&SamplerDescriptor::from_options(options, mip_levels))?;

        Ok(Self::assemble(
            Some(resources),
            size,
            content_size,
            texture_type,
            format,
            mip_levels,
            desc.byte_size(),
            descriptor.premultiplied_alpha,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        resources: Option<GpuResources<G>>,
        size_in_pixels: UVec2,
        content_size_in_pixels: UVec2,
        texture_type: TextureType,
        format: GpuTextureFormat,
        mip_levels: u32,
        byte_size: usize,
        premultiplied_alpha: bool,
    ) -> Self {
        Self {
            resources,
            size_in_pixels,
            content_size_in_pixels,
            texture_type,
            format,
            mip_levels,
            byte_size,
            premultiplied_alpha,
            content_scale: AtomicU32::new(1.0f32.to_bits()),
            sprite_frame: OnceLock::new(),
        }
    }

    /// Logical size in pixels
    pub fn size_in_pixels(&self) -> UVec2 {
        self.size_in_pixels
    }

    /// Allocated size in pixels; differs from `size_in_pixels` when padded
    pub fn content_size_in_pixels(&self) -> UVec2 {
        self.content_size_in_pixels
    }

    /// Logical size in points
    pub fn size_in_points(&self) -> Vec2 {
        self.size_in_pixels.as_vec2() / self.content_scale()
    }

    /// Allocated size in points
    pub fn content_size(&self) -> Vec2 {
        self.content_size_in_pixels.as_vec2() / self.content_scale()
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn format(&self) -> GpuTextureFormat {
        self.format
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_levels
    }

    /// GPU memory held by this texture
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn has_premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn is_power_of_two(&self) -> bool {
        is_power_of_two(self.size_in_pixels)
    }

    /// Whether this is the placeholder texture
    pub fn is_none(&self) -> bool {
        self.resources.is_none()
    }

    pub fn content_scale(&self) -> f32 {
        f32::from_bits(self.content_scale.load(Ordering::Relaxed))
    }

    /// Re-tag the texture with a new content scale
    pub fn set_content_scale(&self, scale: f32) {
        self.content_scale.store(scale.to_bits(), Ordering::Relaxed);
    }

    /// GPU texture handle, `None` for the placeholder
    pub fn gpu_texture(&self) -> Option<&G::Texture> {
        self.resources.as_ref().and_then(|r| r.texture.as_ref())
    }

    /// Sampler handle, `None` for the placeholder
    pub fn sampler(&self) -> Option<&G::Sampler> {
        self.resources.as_ref().and_then(|r| r.sampler.as_ref())
    }

    /// A sprite frame covering the whole texture, computed once
    pub fn sprite_frame(&self) -> &SpriteFrame {
        self.sprite_frame.get_or_init(|| {
            let content = self.content_size_in_pixels.as_vec2();
            let uv_max = if content.x > 0.0 && content.y > 0.0 {
                self.size_in_pixels.as_vec2() / content
            } else {
                Vec2::ZERO
            };
            SpriteFrame {
                origin: UVec2::ZERO,
                size: self.size_in_pixels,
                uv_min: Vec2::ZERO,
                uv_max,
                rotated: false,
            }
        })
    }
}

fn is_power_of_two(size: UVec2) -> bool {
    size.x.is_power_of_two() && size.y.is_power_of_two()
}

/// Copy `size` rows of pixels into a zeroed allocation of `content`
fn pad_rows(
    data: &[u8],
    format: GpuTextureFormat,
    size: UVec2,
    content: UVec2,
) -> Result<Cow<'_, [u8]>> {
    if content == size {
        return Ok(Cow::Borrowed(data));
    }

    let bpp = format.bytes_per_pixel().ok_or_else(|| {
        TextureError::UnsupportedPixelFormat(format!("cannot pad {format:?}"))
    })?;
    let src_row = size.x as usize * bpp;
    let expected = src_row * size.y as usize;
    if data.len() != expected {
        return Err(TextureError::TruncatedData {
            expected,
            actual: data.len(),
        });
    }

    let dst_row = content.x as usize * bpp;
    let mut padded = vec![0u8; dst_row * content.y as usize];
    for (src, dst) in data
        .chunks_exact(src_row)
        .zip(padded.chunks_exact_mut(dst_row))
    {
        dst[..src_row].copy_from_slice(src);
    }
    Ok(Cow::Owned(padded))
}
