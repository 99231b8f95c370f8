//! General image decoding (PNG and JPEG)

use image::io::Reader as ImageReader;
use image::ImageFormat;
use std::fmt;
use std::io::BufReader;

use crate::error::{Result, TextureError};
use crate::gpu::GpuTextureFormat;
use crate::loader::stream::StreamedImageSource;
use crate::options::TextureOptions;

/// Pixels decoded from a general image file, ready for upload
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
    /// Tightly packed rows, top row first
    pub data: Vec<u8>,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Decodes non-container images into raw pixels
pub trait ImageDecoder: Send + Sync + fmt::Debug {
    fn decode(&self, source: &StreamedImageSource, options: &TextureOptions) -> Result<DecodedImage>;
}

/// Decoder backed by the `image` crate
///
/// Accepts PNG and JPEG and always produces RGBA8.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultImageDecoder;

impl DefaultImageDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode an in-memory image
    pub fn decode_bytes(&self, data: &[u8]) -> Result<DecodedImage> {
        let reader = ImageReader::new(std::io::Cursor::new(data))
            .with_guessed_format()
            .map_err(TextureError::from)?;
        Self::decode_reader(reader)
    }

    fn decode_reader<R: std::io::BufRead + std::io::Seek>(
        reader: ImageReader<R>,
    ) -> Result<DecodedImage> {
        match reader.format() {
            Some(ImageFormat::Jpeg | ImageFormat::Png) => {}
            Some(other) => {
                return Err(TextureError::UnsupportedImageFormat(format!(
                    "Only JPG/JPEG and PNG formats are supported, got {:?}",
                    other.extensions_str()
                )))
            }
            None => {
                return Err(TextureError::UnsupportedImageFormat(
                    "unrecognized image signature".to_string(),
                ))
            }
        }

        let img = reader
            .decode()
            .map_err(|e| TextureError::Decode(e.to_string()))?;

        let rgba_img = img.into_rgba8();
        let (width, height) = rgba_img.dimensions();

        Ok(DecodedImage {
            width,
            height,
            format: GpuTextureFormat::Rgba8Unorm,
            data: rgba_img.into_raw(),
        })
    }
}

impl ImageDecoder for DefaultImageDecoder {
    fn decode(&self, source: &StreamedImageSource, _options: &TextureOptions) -> Result<DecodedImage> {
        let reader = ImageReader::new(BufReader::new(source.create_decode_source()))
            .with_guessed_format()
            .map_err(TextureError::from)?;
        Self::decode_reader(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(img: &image::DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut data = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut data), format)
            .expect("Failed to encode test image");
        data
    }

    #[test]
    fn test_decode_png_from_source() {
        let mut img = image::RgbaImage::new(3, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        let png = encode(&image::DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let source = StreamedImageSource::from_bytes(png);
        let decoded = DefaultImageDecoder::new()
            .decode(&source, &TextureOptions::default())
            .unwrap();

        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.format, GpuTextureFormat::Rgba8Unorm);
        assert_eq!(decoded.data.len(), 3 * 2 * 4);
        assert_eq!(&decoded.data[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_decode_jpeg_bytes() {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        let jpeg = encode(&image::DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let decoded = DefaultImageDecoder::new().decode_bytes(&jpeg).unwrap();
        assert_eq!((decoded.width, decoded.height), (4, 4));
        assert_eq!(decoded.data.len(), 64);
    }

    #[test]
    fn test_unrecognized_bytes() {
        let result = DefaultImageDecoder::new().decode_bytes(b"definitely not an image");
        assert!(matches!(result, Err(TextureError::UnsupportedImageFormat(_))));
    }

    #[test]
    fn test_corrupt_png_is_decode_error() {
        let img = image::RgbaImage::new(8, 8);
        let mut png = encode(&image::DynamicImage::ImageRgba8(img), ImageFormat::Png);
        png.truncate(png.len() / 2);

        let result = DefaultImageDecoder::new().decode_bytes(&png);
        assert!(matches!(result, Err(TextureError::Decode(_))));
    }
}
