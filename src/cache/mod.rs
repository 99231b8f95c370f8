//! Texture caching with single-flight loads
//!
//! The cache maps logical keys to shared [`Texture`]s. At most one load per
//! key runs at a time: the first caller registers an in-flight slot and runs
//! the loader outside the index lock, every later caller for that key blocks
//! on the slot and receives the same result. Successes are memoized, failures
//! are not.

mod flight;
pub mod metrics;

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::Xxh3;

use crate::error::{Result, TextureError};
use crate::gpu::{GpuDevice, MockGpu};
use crate::loader::file::{DirectoryResolver, FileResolver, TextureFile};
use crate::loader::image::{DefaultImageDecoder, ImageDecoder};
use crate::loader::pvr::{self, PvrLoader};
use crate::options::{OptionsResolver, TextureOptions, TextureOptionsOverride};
use crate::runtime::{JoinHandle, TaskSpawner};
use crate::texture::Texture;
use flight::{Flight, SharedResult};

pub use metrics::{CacheMetrics, CacheMetricsHandle};

type IndexHasher = BuildHasherDefault<Xxh3>;

/// Construction-time configuration for a [`TextureCache`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureCacheConfig {
    /// Defaults consulted for options a call site leaves unset
    pub default_options: TextureOptionsOverride,
    /// Upper bound on GPU bytes held by the index. Only textures with no
    /// external owner are evicted to honour it.
    pub memory_budget: Option<usize>,
}

/// A memoized texture
struct CachedTexture<G: GpuDevice> {
    texture: Arc<Texture<G>>,
    size: usize,
    last_accessed: u64,
}

enum Slot<G: GpuDevice> {
    Ready(CachedTexture<G>),
    Loading(Arc<Flight<G>>),
}

enum Lookup<G: GpuDevice> {
    Hit(Arc<Texture<G>>),
    Join(Arc<Flight<G>>),
    Own(Arc<Flight<G>>),
}

struct Index<G: GpuDevice> {
    entries: HashMap<String, Slot<G>, IndexHasher>,
    memory_usage: usize,
    clock: u64,
}

impl<G: GpuDevice> Index<G> {
    fn new() -> Self {
        Self {
            entries: HashMap::default(),
            memory_usage: 0,
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Hit, join a flight, or register a new flight, all under one lock
    fn lookup_or_register(&mut self, key: &str) -> Lookup<G> {
        let now = self.tick();
        match self.entries.get_mut(key) {
            Some(Slot::Ready(cached)) => {
                cached.last_accessed = now;
                Lookup::Hit(Arc::clone(&cached.texture))
            }
            Some(Slot::Loading(flight)) => Lookup::Join(Arc::clone(flight)),
            None => {
                let flight = Arc::new(Flight::new());
                self.entries
                    .insert(key.to_string(), Slot::Loading(Arc::clone(&flight)));
                Lookup::Own(flight)
            }
        }
    }

    fn owns_slot(&self, key: &str, flight: &Arc<Flight<G>>) -> bool {
        matches!(self.entries.get(key), Some(Slot::Loading(current)) if Arc::ptr_eq(current, flight))
    }

    /// Remove every memoized entry, leaving in-flight slots alone
    fn drain_ready(&mut self) -> Vec<(String, Arc<Texture<G>>)> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(key, _)| key.clone())
            .collect();

        let mut released = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(Slot::Ready(cached)) = self.entries.remove(&key) {
                self.memory_usage -= cached.size;
                released.push((key, cached.texture));
            }
        }
        released
    }

    /// Drop least recently used, unreferenced entries until within `budget`
    fn evict_to_budget(&mut self, budget: usize) -> Vec<(String, Arc<Texture<G>>)> {
        let mut released = Vec::new();
        while self.memory_usage > budget {
            let victim = self
                .entries
                .iter()
                .filter_map(|(key, slot)| match slot {
                    Slot::Ready(cached) if Arc::strong_count(&cached.texture) == 1 => {
                        Some((key, cached.last_accessed))
                    }
                    _ => None,
                })
                .min_by_key(|(_, last_accessed)| *last_accessed)
                .map(|(key, _)| key.clone());

            let Some(key) = victim else { break };
            if let Some(Slot::Ready(cached)) = self.entries.remove(&key) {
                self.memory_usage -= cached.size;
                released.push((key, cached.texture));
            }
        }
        released
    }
}

/// Thread-safe texture cache
///
/// Generic over the GPU device type for maximum flexibility.
pub struct TextureCache<G: GpuDevice = MockGpu> {
    index: Mutex<Index<G>>,
    default_options: RwLock<TextureOptionsOverride>,
    memory_budget: Option<usize>,
    gpu: G,
    resolver: Arc<dyn FileResolver>,
    decoder: Arc<dyn ImageDecoder>,
    none: Arc<Texture<G>>,
    metrics: CacheMetricsHandle,
}

impl<G: GpuDevice> fmt::Debug for TextureCache<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self.index.lock();
        f.debug_struct("TextureCache")
            .field("backend", &self.gpu.backend_name())
            .field("entries", &index.entries.len())
            .field("memory_usage", &index.memory_usage)
            .field("memory_budget", &self.memory_budget)
            .field("resolver", &self.resolver)
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl<G: GpuDevice> TextureCache<G> {
    /// Create a cache resolving file names against the working directory
    pub fn new(gpu: G) -> Self {
        Self::with_config(gpu, TextureCacheConfig::default())
    }

    pub fn with_config(gpu: G, config: TextureCacheConfig) -> Self {
        Self {
            index: Mutex::new(Index::new()),
            default_options: RwLock::new(config.default_options),
            memory_budget: config.memory_budget,
            gpu,
            resolver: Arc::new(DirectoryResolver::default()),
            decoder: Arc::new(DefaultImageDecoder::new()),
            none: Arc::new(Texture::none()),
            metrics: CacheMetricsHandle::new(),
        }
    }

    /// Replace the file resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn FileResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the image decoder used for non-container files
    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Get a reference to the GPU device
    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Get a reference to the metrics handle
    pub fn metrics(&self) -> &CacheMetricsHandle {
        &self.metrics
    }

    /// Replace the default options wholesale
    ///
    /// Textures already in the cache keep the options they were built with.
    pub fn set_default_options(&self, options: TextureOptionsOverride) {
        *self.default_options.write() = options;
    }

    pub fn default_options(&self) -> TextureOptionsOverride {
        *self.default_options.read()
    }

    /// Resolve call-site options against the current defaults
    pub fn resolve_options(&self, caller: Option<&TextureOptionsOverride>) -> TextureOptions {
        OptionsResolver::resolve(caller, &self.default_options.read())
    }

    /// The shared placeholder texture. Never loads, never indexed.
    pub fn none(&self) -> Arc<Texture<G>> {
        Arc::clone(&self.none)
    }

    /// Fetch `key`, running `loader` on a miss
    ///
    /// Concurrent callers for the same key share one `loader` invocation and
    /// its result. A failed load leaves no trace, so the next call retries.
    ///
    /// A loader must not request its own key: that call fails with
    /// [`TextureError::RecursiveLoad`] instead of waiting on itself. Loaders
    /// that hand their own key to another thread and block on it still
    /// deadlock.
    pub fn texture_for_key<F>(&self, key: &str, loader: F) -> Result<Arc<Texture<G>>>
    where
        F: FnOnce() -> Result<Texture<G>>,
    {
        let lookup = self.index.lock().lookup_or_register(key);
        let flight = match lookup {
            Lookup::Hit(texture) => {
                self.metrics.record_cache_hit();
                return Ok(texture);
            }
            Lookup::Join(flight) => {
                if flight.is_owned_by_current_thread() {
                    log::warn!("Loader for '{key}' requested its own key");
                    return Err(TextureError::RecursiveLoad(key.to_string()));
                }
                self.metrics.record_shared_wait();
                log::trace!("Waiting on in-flight load of '{key}'");
                return flight.wait();
            }
            Lookup::Own(flight) => flight,
        };

        self.metrics.record_cache_miss();
        log::debug!("Cache miss for '{key}', loading");

        let guard = FlightGuard {
            cache: self,
            key,
            flight: &flight,
            armed: true,
        };
        let started = Instant::now();
        let result = loader().map(Arc::new);
        guard.complete(&result, started.elapsed());
        result
    }

    /// Load a texture by logical file name with the default options
    pub fn texture_with_file(&self, name: &str) -> Result<Arc<Texture<G>>> {
        self.texture_with_file_options(name, None)
    }

    /// Load a texture by logical file name
    ///
    /// The cache key is the resolved file location, so the first load of a
    /// file decides the options every later caller shares.
    pub fn texture_with_file_options(
        &self,
        name: &str,
        options: Option<&TextureOptionsOverride>,
    ) -> Result<Arc<Texture<G>>> {
        let options = self.resolve_options(options);
        let file = self.resolver.resolve(name, &options)?;
        let key = file.cache_key();
        self.texture_for_key(&key, || self.load_file(&file, &options))
    }

    /// Decode or parse `file` and upload it
    fn load_file(&self, file: &TextureFile, options: &TextureOptions) -> Result<Texture<G>> {
        let source = file.streamed_source();

        let mut prefix = Vec::with_capacity(pvr::HEADER_LEN);
        source
            .create_decode_source()
            .take(pvr::HEADER_LEN as u64)
            .read_to_end(&mut prefix)?;

        let texture = if PvrLoader::is_pvr(&prefix) {
            PvrLoader::load_from_source(&self.gpu, &source, options)?
        } else {
            let image = self.decoder.decode(&source, options)?;
            Texture::from_image(&self.gpu, &image, options)?
        };
        texture.set_content_scale(file.content_scale);
        Ok(texture)
    }

    /// Drop every cached texture from the index
    ///
    /// Textures nobody else holds are destroyed; textures still held
    /// elsewhere stay valid but the next lookup of their key reloads.
    /// In-flight loads are untouched and still memoize their result.
    /// Returns the number of entries removed.
    pub fn handle_memory_pressure(&self) -> usize {
        let released = self.drain_ready();
        let removed = released.len();
        let destroyed = released
            .iter()
            .filter(|(_, texture)| Arc::strong_count(texture) == 1)
            .count();
        drop(released);

        self.metrics.record_evictions(removed);
        log::debug!(
            "Memory pressure: removed {removed} textures, {destroyed} destroyed, {} still referenced",
            removed - destroyed
        );
        removed
    }

    /// Clears all cached textures
    pub fn clear(&self) {
        let released = self.drain_ready();
        drop(released);
    }

    /// Empty the index and forget per-key metrics of what was removed
    fn drain_ready(&self) -> Vec<(String, Arc<Texture<G>>)> {
        let mut index = self.index.lock();
        let released = index.drain_ready();
        self.metrics
            .forget(released.iter().map(|(key, _)| key.as_str()));
        released
    }

    /// Whether `key` has a memoized texture
    pub fn contains_key(&self, key: &str) -> bool {
        matches!(self.index.lock().entries.get(key), Some(Slot::Ready(_)))
    }

    /// Whether a load of `key` is in flight
    pub fn is_loading(&self, key: &str) -> bool {
        matches!(self.index.lock().entries.get(key), Some(Slot::Loading(_)))
    }

    /// Number of memoized textures
    pub fn len(&self) -> usize {
        self.index
            .lock()
            .entries
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// GPU bytes held by memoized textures
    pub fn memory_usage(&self) -> usize {
        self.index.lock().memory_usage
    }

    /// Publish a finished load to the index and to every waiter
    fn finish_flight(
        &self,
        key: &str,
        flight: &Arc<Flight<G>>,
        result: &SharedResult<G>,
        elapsed: Option<Duration>,
    ) {
        let mut evicted = Vec::new();
        {
            let mut index = self.index.lock();
            if index.owns_slot(key, flight) {
                match result {
                    Ok(texture) => {
                        let size = texture.byte_size();
                        let now = index.tick();
                        index.entries.insert(
                            key.to_string(),
                            Slot::Ready(CachedTexture {
                                texture: Arc::clone(texture),
                                size,
                                last_accessed: now,
                            }),
                        );
                        index.memory_usage += size;
                        if let Some(budget) = self.memory_budget {
                            evicted = index.evict_to_budget(budget);
                        }
                    }
                    Err(_) => {
                        index.entries.remove(key);
                    }
                }
            }
            // Per-key metrics change under the index lock so they track its entries
            if let (Ok(_), Some(elapsed)) = (result, elapsed) {
                self.metrics.record_load(key, elapsed);
            }
            self.metrics
                .forget(evicted.iter().map(|(key, _)| key.as_str()));
        }
        flight.complete(result.clone());

        if let Err(err) = result {
            self.metrics.record_load_failure();
            log::debug!("Load of '{key}' failed: {err}");
        }

        if !evicted.is_empty() {
            self.metrics.record_evictions(evicted.len());
            log::debug!(
                "Evicted {} textures to fit memory budget of {:?} bytes",
                evicted.len(),
                self.memory_budget
            );
        }
    }
}

impl<G: GpuDevice> TextureCache<G> {
    /// Load `names` in the background through the normal single-flight path
    ///
    /// Failures are logged, not returned; a later `texture_with_file` call
    /// retries them.
    pub fn preload<S, I>(self: &Arc<Self>, spawner: &S, names: I) -> Vec<JoinHandle>
    where
        S: TaskSpawner,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        names
            .into_iter()
            .map(|name| {
                let name: String = name.into();
                let cache = Arc::clone(self);
                spawner.spawn_blocking(move || {
                    if let Err(err) = cache.texture_with_file(&name) {
                        log::warn!("Preload of '{name}' failed: {err}");
                    }
                })
            })
            .collect()
    }
}

// Async methods (require tokio feature)
#[cfg(feature = "runtime-tokio")]
impl<G: GpuDevice> TextureCache<G> {
    /// Load a texture by file name on Tokio's blocking pool
    pub async fn texture_with_file_async(self: &Arc<Self>, name: &str) -> Result<Arc<Texture<G>>> {
        let cache = Arc::clone(self);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || cache.texture_with_file(&name))
            .await
            .map_err(|e| TextureError::LoadInterrupted(e.to_string()))?
    }
}

/// Completes a flight even if the loader unwinds
struct FlightGuard<'a, G: GpuDevice> {
    cache: &'a TextureCache<G>,
    key: &'a str,
    flight: &'a Arc<Flight<G>>,
    armed: bool,
}

impl<G: GpuDevice> FlightGuard<'_, G> {
    fn complete(mut self, result: &SharedResult<G>, elapsed: Duration) {
        self.armed = false;
        self.cache
            .finish_flight(self.key, self.flight, result, Some(elapsed));
    }
}

impl<G: GpuDevice> Drop for FlightGuard<'_, G> {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Loader for '{}' panicked", self.key);
            let result = Err(TextureError::LoadInterrupted(format!(
                "loader for '{}' panicked",
                self.key
            )));
            self.cache.finish_flight(self.key, self.flight, &result, None);
        }
    }
}
