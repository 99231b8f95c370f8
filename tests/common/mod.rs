//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use archetype_texture::{GpuTextureFormat, MockGpu, Texture, TextureOptions};

pub const RGBA8_CODE: u64 = 0x0808_0808_6162_6772;

/// A PVR v3 container with a zeroed payload of the right length
pub fn pvr3_bytes(format_code: u64, width: u32, height: u32, mips: u32, faces: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    for field in [0x0352_5650u32, 0] {
        bytes.extend_from_slice(&field.to_le_bytes());
    }
    bytes.extend_from_slice(&format_code.to_le_bytes());
    for field in [0u32, 0, height, width, 1, 1, faces, mips, 0] {
        bytes.extend_from_slice(&field.to_le_bytes());
    }

    let format = GpuTextureFormat::Rgba8Unorm;
    let per_face: usize = (0..mips)
        .map(|level| {
            let (w, h) = archetype_texture::gpu::mip_dimensions(width, height, level);
            format.level_size(w, h)
        })
        .sum();
    bytes.resize(bytes.len() + per_face * faces as usize, 0);
    bytes
}

/// PNG bytes of a solid-color RGBA image
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut data = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut data), image::ImageFormat::Png)
        .expect("Failed to encode test image");
    data
}

/// A directly built RGBA texture of `size` x `size`
pub fn solid_texture(gpu: &MockGpu, size: u32) -> archetype_texture::Result<Texture<MockGpu>> {
    let image = archetype_texture::DecodedImage {
        width: size,
        height: size,
        format: GpuTextureFormat::Rgba8Unorm,
        data: vec![0xff; (size * size * 4) as usize],
    };
    Texture::from_image(gpu, &image, &TextureOptions::default())
}
