//! Basic loading example for archetype_texture

use archetype_texture::{
    DirectoryResolver, MockGpu, TextureCache, TextureOptionsOverride, ThreadSpawner,
};
use std::sync::Arc;

fn write_png(path: &std::path::Path, size: u32) -> anyhow::Result<()> {
    let img = image::RgbaImage::from_fn(size, size, |x, y| {
        image::Rgba([(x * 255 / size) as u8, (y * 255 / size) as u8, 128, 255])
    });
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Create a mock GPU device (no real hardware needed)
    let gpu = MockGpu::new().with_power_of_two_requirement();

    // Some textures on disk, one with a high-resolution variant
    let dir = tempfile::tempdir()?;
    write_png(&dir.path().join("hero.png"), 24)?;
    write_png(&dir.path().join("hero-2x.png"), 48)?;
    write_png(&dir.path().join("tile.png"), 32)?;

    let resolver = DirectoryResolver::new(dir.path()).with_resolution_tag("-2x", 2.0);
    let cache = Arc::new(TextureCache::new(gpu.clone()).with_resolver(Arc::new(resolver)));
    cache.set_default_options(TextureOptionsOverride::new().with_generate_mipmaps(true));

    println!("archetype_texture v{}", archetype_texture::VERSION);

    // Warm the cache in the background
    for handle in cache.preload(&ThreadSpawner::new(), ["tile.png", "hero.png"]) {
        if let Some(thread) = handle.downcast::<std::thread::JoinHandle<()>>() {
            let _ = thread.join();
        }
    }

    let hero = cache.texture_with_file("hero.png")?;
    println!(
        "hero: {:?} px, allocated {:?} px, {:?} points, {} mips",
        hero.size_in_pixels(),
        hero.content_size_in_pixels(),
        hero.size_in_points(),
        hero.mip_level_count()
    );

    let metrics = cache.metrics();
    println!("Cache memory usage: {} bytes", cache.memory_usage());
    println!(
        "Hits: {}, misses: {}, hit rate: {:.0}%",
        metrics.cache_hits(),
        metrics.cache_misses(),
        metrics.cache_hit_rate()
    );

    let removed = cache.handle_memory_pressure();
    println!("Memory pressure released {removed} textures, GPU now holds {} bytes", gpu.allocated_bytes());

    println!("Basic loading example complete!");
    Ok(())
}
