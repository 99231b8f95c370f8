//! Benchmark: Cache hit performance

use archetype_texture::{DecodedImage, GpuTextureFormat, MockGpu, Texture, TextureCache, TextureOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn solid(gpu: &MockGpu) -> archetype_texture::Result<Texture<MockGpu>> {
    let image = DecodedImage {
        width: 16,
        height: 16,
        format: GpuTextureFormat::Rgba8Unorm,
        data: vec![0; 16 * 16 * 4],
    };
    Texture::from_image(gpu, &image, &TextureOptions::default())
}

fn cache_hit_perf_benchmark(c: &mut Criterion) {
    let gpu = MockGpu::new();
    let cache = TextureCache::new(gpu.clone());

    let keys: Vec<String> = (0..256).map(|i| format!("sprites/tile_{i}.png")).collect();
    for key in &keys {
        // Loaded once; every later lookup is a hit
        let _ = cache.texture_for_key(key, || solid(&gpu));
    }

    c.bench_function("cache_hit_single_key", |b| {
        b.iter(|| {
            black_box(cache.texture_for_key(black_box(&keys[0]), || solid(&gpu)))
        })
    });

    c.bench_function("cache_hit_256_keys", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(cache.texture_for_key(key, || solid(&gpu)).is_ok());
            }
        })
    });

    c.bench_function("cache_memory_usage", |b| {
        b.iter(|| black_box(cache.memory_usage()))
    });
}

criterion_group!(benches, cache_hit_perf_benchmark);
criterion_main!(benches);
