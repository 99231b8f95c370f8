//! archetype_texture - GPU texture loading and caching for 2D engines
//!
//! # Features
//! - GPU abstraction (Vulkan via trait, in-memory mock for tests)
//! - PVR v2/v3 containers uploaded level by level, including cubemaps
//! - Rewindable streamed image sources over single-pass byte streams
//! - Thread-safe texture cache with single-flight loads
//! - Memory-pressure and budget eviction that never frees textures in use
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_texture::{MockGpu, TextureCache};
//!
//! let cache = TextureCache::new(MockGpu::new());
//! let texture = cache.texture_with_file("hero.png")?;
//! ```
//!
//! # Feature Flags
//!
//! - `gpu-vulkan`: Enable Vulkan GPU backend
//! - `runtime-tokio`: Enable Tokio spawner and async file loading

// Core modules
pub mod cache;
pub mod gpu;
pub mod loader;
pub mod options;
pub mod runtime;
pub mod texture;

// Error types
mod error;
pub use error::{Result, TextureError};

// Re-export main types from cache
pub use cache::{CacheMetrics, CacheMetricsHandle, TextureCache, TextureCacheConfig};

// Re-export GPU types
pub use gpu::mock::MockGpu;
#[cfg(feature = "gpu-vulkan")]
pub use gpu::vulkan::VulkanDevice;
pub use gpu::{
    GpuDevice, GpuError, GpuResult, GpuTextureFormat, SamplerDescriptor, TextureDescriptor,
};

// Re-export loader types
pub use loader::{
    ContainerDescriptor, DecodeSource, DecodedImage, DefaultImageDecoder, DirectoryResolver,
    FileResolver, ImageDecoder, LevelRange, PvrContainer, PvrLoader, ReadSizeHintExt,
    StreamedImageSource, TextureFile,
};

// Re-export options
pub use options::{AddressMode, FilterKind, OptionsResolver, TextureOptions, TextureOptionsOverride};

// Re-export runtime types
pub use runtime::mock::{MockSpawnBehavior, MockSpawner};
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{JoinHandle, TaskSpawner, ThreadSpawner};

// Re-export texture types
pub use texture::{SpriteFrame, Texture, TextureType};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
