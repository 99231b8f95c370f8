//! Vulkan GPU implementation
//!
//! Provides a Vulkan backend using `ash` and `vk-mem`.
//!
//! Image and sampler creation happen immediately. Level uploads and mipmap
//! generation need a command buffer the host owns, so they are copied into
//! staging buffers and queued; the host drains them with
//! [`VulkanDevice::take_pending_ops`] and records them into its next
//! transfer submission.

use super::{
    mip_dimensions, GpuDevice, GpuError, GpuResult, GpuTextureFormat, SamplerDescriptor,
    TextureDescriptor,
};
use crate::options::{AddressMode, FilterKind};
use crate::texture::TextureType;
use ash::vk;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use vk_mem::Alloc;

/// Inner state for VulkanTexture that holds the actual Vulkan resources
struct VulkanTextureInner {
    image: vk::Image,
    view: vk::ImageView,
    allocation: vk_mem::Allocation,
    /// Reference to allocator for cleanup
    allocator: Arc<Mutex<vk_mem::Allocator>>,
    /// Reference to device for cleanup
    device: ash::Device,
}

impl Drop for VulkanTextureInner {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
        let allocator = self.allocator.lock();
        unsafe {
            allocator.destroy_image(self.image, &mut self.allocation);
        }
        log::trace!("VulkanTexture destroyed");
    }
}

/// Vulkan texture with associated image and view
///
/// Clones share the image; it is destroyed once the texture and every
/// queued operation referencing it are gone.
#[derive(Clone)]
pub struct VulkanTexture {
    #[allow(dead_code)]
    inner: Arc<Mutex<VulkanTextureInner>>,
    /// Vulkan image handle (cached for quick access)
    pub image: vk::Image,
    /// Image view (cached for quick access)
    pub view: vk::ImageView,
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
    pub mip_levels: u32,
    /// 1, or 6 for cubemaps
    pub layers: u32,
}

impl fmt::Debug for VulkanTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanTexture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("mip_levels", &self.mip_levels)
            .field("layers", &self.layers)
            .finish()
    }
}

impl VulkanTexture {
    /// Get the raw Vulkan image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Get the image view handle
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

struct VulkanSamplerInner {
    sampler: vk::Sampler,
    device: ash::Device,
}

impl Drop for VulkanSamplerInner {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Vulkan sampler state
#[derive(Clone)]
pub struct VulkanSampler {
    #[allow(dead_code)]
    inner: Arc<Mutex<VulkanSamplerInner>>,
    /// Sampler handle (cached for quick access)
    pub sampler: vk::Sampler,
    pub desc: SamplerDescriptor,
}

impl fmt::Debug for VulkanSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanSampler")
            .field("desc", &self.desc)
            .finish()
    }
}

impl VulkanSampler {
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

/// Host-visible buffer holding one level's pixels
pub struct StagingBuffer {
    pub buffer: vk::Buffer,
    pub size: usize,
    allocation: vk_mem::Allocation,
    allocator: Arc<Mutex<vk_mem::Allocator>>,
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        let allocator = self.allocator.lock();
        unsafe {
            allocator.destroy_buffer(self.buffer, &mut self.allocation);
        }
        log::trace!("Staging buffer destroyed (size={})", self.size);
    }
}

impl fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("size", &self.size)
            .finish()
    }
}

/// GPU work waiting for the host's command buffer
#[derive(Debug)]
pub enum PendingOp {
    /// Copy `staging` into one level of one layer
    CopyLevel {
        texture: VulkanTexture,
        staging: StagingBuffer,
        face: u32,
        level: u32,
        width: u32,
        height: u32,
    },
    /// Blit levels 1.. down from level 0 in every layer
    GenerateMipmaps { texture: VulkanTexture },
}

impl PendingOp {
    /// Copy region for a `CopyLevel` op
    pub fn copy_region(&self) -> Option<vk::BufferImageCopy> {
        match self {
            PendingOp::CopyLevel {
                face,
                level,
                width,
                height,
                ..
            } => Some(
                vk::BufferImageCopy::builder()
                    .buffer_offset(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: *level,
                        base_array_layer: *face,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D {
                        width: *width,
                        height: *height,
                        depth: 1,
                    })
                    .build(),
            ),
            PendingOp::GenerateMipmaps { .. } => None,
        }
    }
}

/// Vulkan GPU device wrapper
///
/// Wraps `ash::Device` and VMA allocator to implement the `GpuDevice` trait.
#[derive(Clone)]
pub struct VulkanDevice {
    device: ash::Device,
    allocator: Arc<Mutex<vk_mem::Allocator>>,
    unsupported: Arc<HashSet<GpuTextureFormat>>,
    pending: Arc<Mutex<Vec<PendingOp>>>,
}

impl fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("backend", &"Vulkan")
            .field("pending_ops", &self.pending.lock().len())
            .finish()
    }
}

/// Every format the loaders can produce
const ALL_FORMATS: [GpuTextureFormat; 17] = [
    GpuTextureFormat::Rgba8Unorm,
    GpuTextureFormat::Bgra8Unorm,
    GpuTextureFormat::Rgb8Unorm,
    GpuTextureFormat::Rgb565,
    GpuTextureFormat::Rgba4444,
    GpuTextureFormat::Rgba5551,
    GpuTextureFormat::L8,
    GpuTextureFormat::A8,
    GpuTextureFormat::La88,
    GpuTextureFormat::Pvrtc2bppRgb,
    GpuTextureFormat::Pvrtc2bppRgba,
    GpuTextureFormat::Pvrtc4bppRgb,
    GpuTextureFormat::Pvrtc4bppRgba,
    GpuTextureFormat::Etc1,
    GpuTextureFormat::Bc1,
    GpuTextureFormat::Bc2,
    GpuTextureFormat::Bc3,
];

impl VulkanDevice {
    /// Create a new Vulkan device wrapper that assumes every format samples
    ///
    /// # Arguments
    /// * `device` - The ash Vulkan device
    /// * `allocator` - VMA allocator for memory management
    pub fn new(device: ash::Device, allocator: Arc<Mutex<vk_mem::Allocator>>) -> Self {
        Self {
            device,
            allocator,
            unsupported: Arc::new(HashSet::new()),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Query which formats the physical device can sample with optimal tiling
    pub fn with_format_support(
        mut self,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        let unsupported = ALL_FORMATS
            .iter()
            .copied()
            .filter(|format| {
                let props = unsafe {
                    instance.get_physical_device_format_properties(
                        physical_device,
                        Self::to_vk_format(*format),
                    )
                };
                !props
                    .optimal_tiling_features
                    .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE)
            })
            .collect();
        self.unsupported = Arc::new(unsupported);
        self
    }

    /// Get the underlying ash device
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the allocator
    pub fn allocator(&self) -> &Arc<Mutex<vk_mem::Allocator>> {
        &self.allocator
    }

    /// Drain queued uploads and mip generations, in submission order
    pub fn take_pending_ops(&self) -> Vec<PendingOp> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Convert GpuTextureFormat to Vulkan format
    fn to_vk_format(format: GpuTextureFormat) -> vk::Format {
        match format {
            GpuTextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
            GpuTextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
            GpuTextureFormat::Rgb8Unorm => vk::Format::R8G8B8_UNORM,
            GpuTextureFormat::Rgb565 => vk::Format::R5G6B5_UNORM_PACK16,
            GpuTextureFormat::Rgba4444 => vk::Format::R4G4B4A4_UNORM_PACK16,
            GpuTextureFormat::Rgba5551 => vk::Format::R5G5B5A1_UNORM_PACK16,
            GpuTextureFormat::L8 | GpuTextureFormat::A8 => vk::Format::R8_UNORM,
            GpuTextureFormat::La88 => vk::Format::R8G8_UNORM,
            GpuTextureFormat::Pvrtc2bppRgb | GpuTextureFormat::Pvrtc2bppRgba => {
                vk::Format::PVRTC1_2BPP_UNORM_BLOCK_IMG
            }
            GpuTextureFormat::Pvrtc4bppRgb | GpuTextureFormat::Pvrtc4bppRgba => {
                vk::Format::PVRTC1_4BPP_UNORM_BLOCK_IMG
            }
            // ETC2 decoders read ETC1 data unchanged
            GpuTextureFormat::Etc1 => vk::Format::ETC2_R8G8B8_UNORM_BLOCK,
            GpuTextureFormat::Bc1 => vk::Format::BC1_RGBA_UNORM_BLOCK,
            GpuTextureFormat::Bc2 => vk::Format::BC2_UNORM_BLOCK,
            GpuTextureFormat::Bc3 => vk::Format::BC3_UNORM_BLOCK,
        }
    }

    /// Channel mapping for the single and dual channel formats
    fn component_mapping(format: GpuTextureFormat) -> vk::ComponentMapping {
        use vk::ComponentSwizzle as S;
        let (r, g, b, a) = match format {
            GpuTextureFormat::L8 => (S::R, S::R, S::R, S::ONE),
            GpuTextureFormat::A8 => (S::ZERO, S::ZERO, S::ZERO, S::R),
            GpuTextureFormat::La88 => (S::R, S::R, S::R, S::G),
            _ => (S::IDENTITY, S::IDENTITY, S::IDENTITY, S::IDENTITY),
        };
        vk::ComponentMapping { r, g, b, a }
    }

    fn to_vk_filter(filter: FilterKind) -> vk::Filter {
        match filter {
            FilterKind::Nearest => vk::Filter::NEAREST,
            FilterKind::Linear | FilterKind::MipmapNone => vk::Filter::LINEAR,
        }
    }

    fn to_vk_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
        match mode {
            AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            AddressMode::RepeatMirrored => vk::SamplerAddressMode::MIRRORED_REPEAT,
        }
    }

    fn create_staging_buffer(&self, data: &[u8]) -> GpuResult<StagingBuffer> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(data.len() as u64)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .build();

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        };

        let allocator = self.allocator.lock();
        let (buffer, mut allocation) = unsafe {
            allocator
                .create_buffer(&buffer_info, &allocation_info)
                .map_err(|e| GpuError::AllocationFailed(format!("VMA error: {e:?}")))?
        };

        let mapped = unsafe { allocator.map_memory(&mut allocation) };
        match mapped {
            Ok(ptr) => unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
                allocator.unmap_memory(&mut allocation);
            },
            Err(e) => {
                unsafe { allocator.destroy_buffer(buffer, &mut allocation) };
                return Err(GpuError::UploadFailed(format!(
                    "Failed to map memory: {e:?}"
                )));
            }
        }

        Ok(StagingBuffer {
            buffer,
            size: data.len(),
            allocation,
            allocator: Arc::clone(&self.allocator),
        })
    }
}

impl GpuDevice for VulkanDevice {
    type Texture = VulkanTexture;
    type Sampler = VulkanSampler;

    fn create_texture(&self, desc: &TextureDescriptor) -> GpuResult<Self::Texture> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(GpuError::TextureCreationFailed(
                "Invalid texture dimensions".to_string(),
            ));
        }
        if !self.supports_format(desc.format) {
            return Err(GpuError::UnsupportedFormat(desc.format));
        }

        let vk_format = Self::to_vk_format(desc.format);
        let layers = desc.face_count();
        let (create_flags, view_type) = match desc.texture_type {
            TextureType::Flat2D => (vk::ImageCreateFlags::empty(), vk::ImageViewType::TYPE_2D),
            TextureType::Cubemap => (
                vk::ImageCreateFlags::CUBE_COMPATIBLE,
                vk::ImageViewType::CUBE,
            ),
        };

        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST;
        if desc.mip_levels > 1 && !desc.format.is_compressed() {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }

        let image_info = vk::ImageCreateInfo::builder()
            .flags(create_flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk_format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .build();

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let allocator = self.allocator.lock();
        let (image, mut allocation) = unsafe {
            allocator.create_image(&image_info, &allocation_info).map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                    GpuError::OutOfMemory
                }
                other => GpuError::TextureCreationFailed(format!("VMA error: {other:?}")),
            })?
        };

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(view_type)
            .format(vk_format)
            .components(Self::component_mapping(desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: desc.mip_levels,
                base_array_layer: 0,
                layer_count: layers,
            })
            .build();

        let view = match unsafe { self.device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe { allocator.destroy_image(image, &mut allocation) };
                return Err(GpuError::TextureCreationFailed(format!(
                    "Failed to create image view: {e:?}"
                )));
            }
        };
        drop(allocator);

        let inner = VulkanTextureInner {
            image,
            view,
            allocation,
            allocator: Arc::clone(&self.allocator),
            device: self.device.clone(),
        };

        Ok(VulkanTexture {
            inner: Arc::new(Mutex::new(inner)),
            image,
            view,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_levels: desc.mip_levels,
            layers,
        })
    }

    fn upload_texture_level(
        &self,
        texture: &Self::Texture,
        face: u32,
        level: u32,
        data: &[u8],
    ) -> GpuResult<()> {
        if face >= texture.layers || level >= texture.mip_levels {
            return Err(GpuError::UploadFailed(format!(
                "No such level: face={face}, level={level}"
            )));
        }
        let (width, height) = mip_dimensions(texture.width, texture.height, level);
        let expected = texture.format.level_size(width, height);
        if data.len() != expected {
            return Err(GpuError::UploadFailed(format!(
                "Level size mismatch: expected={expected}, data_len={}",
                data.len()
            )));
        }

        let staging = self.create_staging_buffer(data)?;
        self.pending.lock().push(PendingOp::CopyLevel {
            texture: texture.clone(),
            staging,
            face,
            level,
            width,
            height,
        });
        Ok(())
    }

    fn generate_mipmaps(&self, texture: &Self::Texture) -> GpuResult<()> {
        if texture.format.is_compressed() {
            return Err(GpuError::UploadFailed(
                "Cannot generate mipmaps for compressed formats".to_string(),
            ));
        }
        self.pending.lock().push(PendingOp::GenerateMipmaps {
            texture: texture.clone(),
        });
        Ok(())
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> GpuResult<Self::Sampler> {
        let (mipmap_mode, max_lod) = match desc.mipmap_filter {
            FilterKind::MipmapNone => (vk::SamplerMipmapMode::NEAREST, 0.0),
            FilterKind::Nearest => (vk::SamplerMipmapMode::NEAREST, vk::LOD_CLAMP_NONE),
            FilterKind::Linear => (vk::SamplerMipmapMode::LINEAR, vk::LOD_CLAMP_NONE),
        };

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(Self::to_vk_filter(desc.mag_filter))
            .min_filter(Self::to_vk_filter(desc.min_filter))
            .mipmap_mode(mipmap_mode)
            .address_mode_u(Self::to_vk_address_mode(desc.address_mode_x))
            .address_mode_v(Self::to_vk_address_mode(desc.address_mode_y))
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .min_lod(0.0)
            .max_lod(max_lod)
            .build();

        let sampler = unsafe { self.device.create_sampler(&sampler_info, None) }
            .map_err(|e| GpuError::SamplerCreationFailed(format!("{e:?}")))?;

        Ok(VulkanSampler {
            inner: Arc::new(Mutex::new(VulkanSamplerInner {
                sampler,
                device: self.device.clone(),
            })),
            sampler,
            desc: *desc,
        })
    }

    fn destroy_texture(&self, _texture: Self::Texture) {
        // Drop is handled by VulkanTextureInner
    }

    fn destroy_sampler(&self, _sampler: Self::Sampler) {
        // Drop is handled by VulkanSamplerInner
    }

    fn supports_format(&self, format: GpuTextureFormat) -> bool {
        !self.unsupported.contains(&format)
    }

    fn backend_name(&self) -> &'static str {
        "Vulkan"
    }
}
