//! Mock GPU implementation for testing
//!
//! Provides a mock GPU that stores texture data in memory and keeps enough
//! bookkeeping to assert on allocations, uploads and releases without
//! requiring actual GPU hardware.

use super::{
    mip_dimensions, GpuDevice, GpuError, GpuResult, GpuTextureFormat, SamplerDescriptor,
    TextureDescriptor,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counter for generating unique texture/sampler IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// One recorded call to `upload_texture_level`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRecord {
    pub texture_id: u64,
    pub face: u32,
    pub level: u32,
    pub len: usize,
}

#[derive(Debug, Default)]
struct MockState {
    allocated_bytes: AtomicU64,
    live_textures: AtomicUsize,
    live_samplers: AtomicUsize,
    mipmap_generations: AtomicUsize,
    memory_budget: Mutex<Option<u64>>,
    unsupported: RwLock<HashSet<GpuTextureFormat>>,
    requires_pot: AtomicBool,
    fail_samplers: AtomicBool,
    uploads: Mutex<Vec<UploadRecord>>,
}

/// Mock GPU device for testing
///
/// Clones share the same bookkeeping, so a test can keep a handle to the
/// device it passed into a cache.
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    state: Arc<MockState>,
}

impl MockGpu {
    /// Create a new mock GPU device
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject texture allocations once `bytes` are in use
    pub fn with_memory_budget(self, bytes: u64) -> Self {
        *self.state.memory_budget.lock() = Some(bytes);
        self
    }

    /// Require power-of-two texture allocations
    pub fn with_power_of_two_requirement(self) -> Self {
        self.state.requires_pot.store(true, Ordering::Relaxed);
        self
    }

    /// Report `format` as unsupported
    pub fn with_unsupported_format(self, format: GpuTextureFormat) -> Self {
        self.state.unsupported.write().insert(format);
        self
    }

    /// Make every subsequent sampler creation fail
    pub fn set_fail_samplers(&self, fail: bool) {
        self.state.fail_samplers.store(fail, Ordering::Relaxed);
    }

    /// Get total allocated texture memory (for testing)
    pub fn allocated_bytes(&self) -> u64 {
        self.state.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Number of textures created and not yet destroyed
    pub fn live_textures(&self) -> usize {
        self.state.live_textures.load(Ordering::Relaxed)
    }

    /// Number of samplers created and not yet destroyed
    pub fn live_samplers(&self) -> usize {
        self.state.live_samplers.load(Ordering::Relaxed)
    }

    /// Number of `generate_mipmaps` calls
    pub fn mipmap_generations(&self) -> usize {
        self.state.mipmap_generations.load(Ordering::Relaxed)
    }

    /// Every upload so far, in call order
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.state.uploads.lock().clone()
    }
}

/// Mock texture that stores pixel data in memory
#[derive(Clone, Debug)]
pub struct MockTexture {
    /// Unique identifier
    pub id: u64,
    /// Allocated width
    pub width: u32,
    /// Allocated height
    pub height: u32,
    /// Texture format
    pub format: GpuTextureFormat,
    /// Number of mip levels
    pub mip_levels: u32,
    /// Number of faces
    pub faces: u32,
    /// Allocation size in bytes
    pub byte_size: u64,
    /// Uploaded data keyed by `(face, level)`
    pub levels: Arc<RwLock<HashMap<(u32, u32), Vec<u8>>>>,
}

impl MockTexture {
    /// Create a new mock texture
    pub fn new(desc: &TextureDescriptor) -> Self {
        Self {
            id: next_id(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_levels: desc.mip_levels,
            faces: desc.face_count(),
            byte_size: desc.byte_size() as u64,
            levels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Read back uploaded data for one level
    pub fn level_data(&self, face: u32, level: u32) -> Option<Vec<u8>> {
        self.levels.read().get(&(face, level)).cloned()
    }
}

/// Mock sampler recording its descriptor
#[derive(Clone, Debug)]
pub struct MockSampler {
    pub id: u64,
    pub desc: SamplerDescriptor,
}

impl GpuDevice for MockGpu {
    type Texture = MockTexture;
    type Sampler = MockSampler;

    fn create_texture(&self, desc: &TextureDescriptor) -> GpuResult<Self::Texture> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(GpuError::TextureCreationFailed(
                "Invalid texture dimensions".to_string(),
            ));
        }
        if !self.supports_format(desc.format) {
            return Err(GpuError::UnsupportedFormat(desc.format));
        }

        let size = desc.byte_size() as u64;
        if let Some(budget) = *self.state.memory_budget.lock() {
            if self.allocated_bytes() + size > budget {
                return Err(GpuError::OutOfMemory);
            }
        }

        self.state.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        self.state.live_textures.fetch_add(1, Ordering::Relaxed);
        Ok(MockTexture::new(desc))
    }

    fn upload_texture_level(
        &self,
        texture: &Self::Texture,
        face: u32,
        level: u32,
        data: &[u8],
    ) -> GpuResult<()> {
        if face >= texture.faces || level >= texture.mip_levels {
            return Err(GpuError::UploadFailed(format!(
                "No such level: face={face}, level={level}"
            )));
        }

        let (w, h) = mip_dimensions(texture.width, texture.height, level);
        let expected = texture.format.level_size(w, h);
        if data.len() != expected {
            return Err(GpuError::UploadFailed(format!(
                "Level size mismatch: expected={expected}, data_len={}",
                data.len()
            )));
        }

        texture.levels.write().insert((face, level), data.to_vec());
        self.state.uploads.lock().push(UploadRecord {
            texture_id: texture.id,
            face,
            level,
            len: data.len(),
        });
        Ok(())
    }

    fn generate_mipmaps(&self, texture: &Self::Texture) -> GpuResult<()> {
        if texture.format.is_compressed() {
            return Err(GpuError::UploadFailed(
                "Cannot generate mipmaps for compressed formats".to_string(),
            ));
        }
        self.state.mipmap_generations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> GpuResult<Self::Sampler> {
        if self.state.fail_samplers.load(Ordering::Relaxed) {
            return Err(GpuError::SamplerCreationFailed(
                "Sampler allocation rejected".to_string(),
            ));
        }
        self.state.live_samplers.fetch_add(1, Ordering::Relaxed);
        Ok(MockSampler {
            id: next_id(),
            desc: *desc,
        })
    }

    fn destroy_texture(&self, texture: Self::Texture) {
        self.state
            .allocated_bytes
            .fetch_sub(texture.byte_size, Ordering::Relaxed);
        self.state.live_textures.fetch_sub(1, Ordering::Relaxed);
    }

    fn destroy_sampler(&self, _sampler: Self::Sampler) {
        self.state.live_samplers.fetch_sub(1, Ordering::Relaxed);
    }

    fn supports_format(&self, format: GpuTextureFormat) -> bool {
        !self.state.unsupported.read().contains(&format)
    }

    fn requires_power_of_two(&self) -> bool {
        self.state.requires_pot.load(Ordering::Relaxed)
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}
