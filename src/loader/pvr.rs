//! PVR texture container loading
//!
//! Parses PVR v3 and legacy PVR v2 containers into a [`ContainerDescriptor`]
//! plus the raw payload, then uploads every face and mip level directly.
//! [`PvrLoader::load_texture`] reads one level at a time, so no more than a
//! single level is buffered during an upload.
//!
//! Both header generations are 52 bytes, little endian. v3 stores its
//! payload level-major (every face of level 0, then level 1, ...); v2 stores
//! it face-major. Uploads are always issued face-major with ascending mips.

use std::borrow::Cow;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Result, TextureError};
use crate::gpu::{full_mip_chain, mip_dimensions, GpuDevice, GpuTextureFormat};
use crate::loader::stream::{ReadSizeHintExt, StreamedImageSource};
use crate::options::TextureOptions;
use crate::texture::{Texture, TextureType};

/// Size of both header generations
pub const HEADER_LEN: usize = 52;

/// v3 version field, "PVR\x03"
pub const PVR3_MAGIC: u32 = 0x0352_5650;
/// v3 version field written by a big-endian producer
const PVR3_MAGIC_SWAPPED: u32 = 0x5056_5203;
/// v2 tag at offset 44, "PVR!"
pub const PVR2_TAG: u32 = 0x2152_5650;

const PVR3_FLAG_PREMULTIPLIED: u32 = 0x02;
const PVR2_FLAG_CUBEMAP: u32 = 0x1000;
const PVR2_PIXEL_TYPE_MASK: u32 = 0xff;

/// Largest accepted width or height
pub const MAX_DIMENSION: u32 = 1 << 15;

/// Header generation of a parsed container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerVersion {
    V2,
    V3,
}

/// Payload order declared by the header generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadOrder {
    LevelMajor,
    FaceMajor,
}

/// Byte range of one (level, face) image within the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    pub level: u32,
    pub face: u32,
    pub offset: usize,
    pub length: usize,
}

/// Parsed container header and payload layout
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDescriptor {
    pub version: ContainerVersion,
    pub pixel_format: GpuTextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
    /// 1, or 6 for cubemaps
    pub face_count: u32,
    pub premultiplied_alpha: bool,
    /// Ranges in payload order: strictly increasing, contiguous offsets
    pub ranges: Vec<LevelRange>,
    /// Sum of all range lengths
    pub data_length: usize,
}

impl ContainerDescriptor {
    pub fn texture_type(&self) -> TextureType {
        if self.face_count == 6 {
            TextureType::Cubemap
        } else {
            TextureType::Flat2D
        }
    }

    /// Ranges ordered for upload: each face's full mip chain before the next face
    pub fn upload_order(&self) -> Vec<&LevelRange> {
        let mut order: Vec<&LevelRange> = self.ranges.iter().collect();
        order.sort_by_key(|range| (range.face, range.level));
        order
    }
}

/// A descriptor together with its payload bytes
#[derive(Debug, Clone)]
pub struct PvrContainer {
    pub descriptor: ContainerDescriptor,
    pub payload: Vec<u8>,
}

impl PvrContainer {
    /// Bytes of one level
    pub fn level_bytes(&self, range: &LevelRange) -> Result<&[u8]> {
        self.payload
            .get(range.offset..range.offset + range.length)
            .ok_or(TextureError::TruncatedData {
                expected: range.offset + range.length,
                actual: self.payload.len(),
            })
    }
}

/// Loads PVR containers
#[derive(Debug, Default, Clone, Copy)]
pub struct PvrLoader;

impl PvrLoader {
    /// Whether `prefix` (the first bytes of a file) looks like a PVR container
    pub fn is_pvr(prefix: &[u8]) -> bool {
        if prefix.len() >= 4 && u32_at(prefix, 0) == PVR3_MAGIC {
            return true;
        }
        prefix.len() >= HEADER_LEN
            && u32_at(prefix, 44) == PVR2_TAG
            && u32_at(prefix, 0) as usize == HEADER_LEN
    }

    /// Parse the header and any metadata, leaving `reader` at the payload
    pub fn read_descriptor<R: Read>(reader: &mut R) -> Result<ContainerDescriptor> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                TextureError::MalformedContainer("stream shorter than header".to_string())
            }
            _ => e.into(),
        })?;

        let version = u32_at(&header, 0);
        if version == PVR3_MAGIC {
            let (descriptor, metadata_len) = parse_v3(&header)?;
            skip_metadata(reader, metadata_len)?;
            Ok(descriptor)
        } else if version == PVR3_MAGIC_SWAPPED {
            Err(TextureError::MalformedContainer(
                "big-endian PVR containers are not supported".to_string(),
            ))
        } else if u32_at(&header, 44) == PVR2_TAG && version as usize == HEADER_LEN {
            parse_v2(&header)
        } else {
            Err(TextureError::MalformedContainer(format!(
                "unrecognized magic {version:#010x}"
            )))
        }
    }

    /// Read the payload described by `descriptor`
    ///
    /// The stream must end exactly where the layout does.
    pub fn read_payload<R: Read>(reader: &mut R, descriptor: &ContainerDescriptor) -> Result<Vec<u8>> {
        let payload = reader.load_data_with_size_hint(descriptor.data_length)?;
        if payload.len() != descriptor.data_length {
            return Err(TextureError::TruncatedData {
                expected: descriptor.data_length,
                actual: payload.len(),
            });
        }
        Ok(payload)
    }

    /// Parse a whole container
    pub fn read_container<R: Read>(mut reader: R) -> Result<PvrContainer> {
        let descriptor = Self::read_descriptor(&mut reader)?;
        let payload = Self::read_payload(&mut reader, &descriptor)?;
        Ok(PvrContainer {
            descriptor,
            payload,
        })
    }

    /// Parse a container and upload it as a texture
    ///
    /// The payload is not read when the device cannot sample the format. The
    /// stream length is checked against the layout before the GPU texture is
    /// allocated, then each level is read and uploaded on its own.
    pub fn load_texture<G: GpuDevice, R: Read + Seek>(
        gpu: &G,
        mut reader: R,
        options: &TextureOptions,
    ) -> Result<Texture<G>> {
        let descriptor = Self::read_descriptor(&mut reader)?;
        if !gpu.supports_format(descriptor.pixel_format) {
            return Err(TextureError::UnsupportedPixelFormat(format!(
                "{:?} is not supported by {}",
                descriptor.pixel_format,
                gpu.backend_name()
            )));
        }

        log::debug!(
            "PVR {:?}: {}x{} {:?}, {} mips, {} faces",
            descriptor.version,
            descriptor.width,
            descriptor.height,
            descriptor.pixel_format,
            descriptor.mip_level_count,
            descriptor.face_count
        );

        let mut levels = LevelReader::new(&mut reader, descriptor.data_length)?;
        Texture::from_container_levels(gpu, &descriptor, options, |range| {
            levels.read(range).map(Cow::Owned)
        })
    }

    /// Load from a fresh decode source of `source`
    pub fn load_from_source<G: GpuDevice>(
        gpu: &G,
        source: &StreamedImageSource,
        options: &TextureOptions,
    ) -> Result<Texture<G>> {
        Self::load_texture(gpu, source.create_decode_source(), options)
    }
}

/// Reads single levels out of a seekable payload
struct LevelReader<'r, R> {
    reader: &'r mut R,
    payload_start: u64,
    data_length: usize,
}

impl<'r, R: Read + Seek> LevelReader<'r, R> {
    /// Requires the stream to hold exactly `data_length` bytes past its position
    fn new(reader: &'r mut R, data_length: usize) -> Result<Self> {
        let payload_start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        let available = end.saturating_sub(payload_start) as usize;
        if available != data_length {
            return Err(TextureError::TruncatedData {
                expected: data_length,
                actual: available,
            });
        }
        reader.seek(SeekFrom::Start(payload_start))?;
        Ok(Self {
            reader,
            payload_start,
            data_length,
        })
    }

    fn read(&mut self, range: &LevelRange) -> Result<Vec<u8>> {
        self.reader
            .seek(SeekFrom::Start(self.payload_start + range.offset as u64))?;
        let data = self
            .reader
            .by_ref()
            .take(range.length as u64)
            .load_data_with_size_hint(range.length)?;
        if data.len() != range.length {
            return Err(TextureError::TruncatedData {
                expected: self.data_length,
                actual: range.offset + data.len(),
            });
        }
        Ok(data)
    }
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    u64::from(u32_at(bytes, offset)) | (u64::from(u32_at(bytes, offset + 4)) << 32)
}

fn parse_v3(header: &[u8; HEADER_LEN]) -> Result<(ContainerDescriptor, usize)> {
    let flags = u32_at(header, 4);
    let format_code = u64_at(header, 8);
    let height = u32_at(header, 24);
    let width = u32_at(header, 28);
    let depth = u32_at(header, 32);
    let surfaces = u32_at(header, 36);
    let faces = u32_at(header, 40);
    let mips = u32_at(header, 44);
    let metadata_len = u32_at(header, 48) as usize;

    let pixel_format = v3_pixel_format(format_code).ok_or_else(|| {
        TextureError::UnsupportedPixelFormat(format!("PVR v3 format code {format_code:#018x}"))
    })?;

    if depth != 1 {
        return Err(TextureError::MalformedContainer(format!(
            "volume textures are not supported (depth {depth})"
        )));
    }
    if surfaces != 1 {
        return Err(TextureError::MalformedContainer(format!(
            "texture arrays are not supported ({surfaces} surfaces)"
        )));
    }

    let descriptor = build_descriptor(
        ContainerVersion::V3,
        pixel_format,
        width,
        height,
        mips,
        faces,
        flags & PVR3_FLAG_PREMULTIPLIED != 0,
        PayloadOrder::LevelMajor,
    )?;
    Ok((descriptor, metadata_len))
}

fn parse_v2(header: &[u8; HEADER_LEN]) -> Result<ContainerDescriptor> {
    let height = u32_at(header, 4);
    let width = u32_at(header, 8);
    let extra_mips = u32_at(header, 12);
    let flags = u32_at(header, 16);
    let declared_length = u32_at(header, 20) as usize;
    let alpha_mask = u32_at(header, 40);
    let surfaces = u32_at(header, 48).max(1);

    let pixel_type = flags & PVR2_PIXEL_TYPE_MASK;
    let pixel_format = v2_pixel_format(pixel_type, alpha_mask != 0).ok_or_else(|| {
        TextureError::UnsupportedPixelFormat(format!("PVR v2 pixel type {pixel_type:#04x}"))
    })?;

    let faces = if flags & PVR2_FLAG_CUBEMAP != 0 { 6 } else { 1 };
    if surfaces != faces {
        return Err(TextureError::MalformedContainer(format!(
            "{surfaces} surfaces declared for {faces} faces"
        )));
    }

    let descriptor = build_descriptor(
        ContainerVersion::V2,
        pixel_format,
        width,
        height,
        extra_mips.saturating_add(1),
        faces,
        false,
        PayloadOrder::FaceMajor,
    )?;

    if descriptor.data_length != declared_length {
        return Err(TextureError::MalformedContainer(format!(
            "declared data length {declared_length} does not match layout of {} bytes",
            descriptor.data_length
        )));
    }
    Ok(descriptor)
}

#[allow(clippy::too_many_arguments)]
fn build_descriptor(
    version: ContainerVersion,
    pixel_format: GpuTextureFormat,
    width: u32,
    height: u32,
    mip_level_count: u32,
    face_count: u32,
    premultiplied_alpha: bool,
    order: PayloadOrder,
) -> Result<ContainerDescriptor> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(TextureError::MalformedContainer(format!(
            "invalid dimensions {width}x{height}"
        )));
    }
    if face_count != 1 && face_count != 6 {
        return Err(TextureError::MalformedContainer(format!(
            "face count must be 1 or 6, got {face_count}"
        )));
    }
    if face_count == 6 && width != height {
        return Err(TextureError::MalformedContainer(format!(
            "cubemap faces must be square, got {width}x{height}"
        )));
    }
    if mip_level_count == 0 || mip_level_count > full_mip_chain(width, height) {
        return Err(TextureError::MalformedContainer(format!(
            "invalid mip level count {mip_level_count} for {width}x{height}"
        )));
    }

    let level_length = |level: u32| {
        let (w, h) = mip_dimensions(width, height, level);
        pixel_format.level_size(w, h)
    };

    let mut ranges = Vec::with_capacity((mip_level_count * face_count) as usize);
    let mut offset = 0usize;
    let mut push = |level: u32, face: u32| {
        let length = level_length(level);
        ranges.push(LevelRange {
            level,
            face,
            offset,
            length,
        });
        offset += length;
    };
    match order {
        PayloadOrder::LevelMajor => {
            for level in 0..mip_level_count {
                for face in 0..face_count {
                    push(level, face);
                }
            }
        }
        PayloadOrder::FaceMajor => {
            for face in 0..face_count {
                for level in 0..mip_level_count {
                    push(level, face);
                }
            }
        }
    }

    Ok(ContainerDescriptor {
        version,
        pixel_format,
        width,
        height,
        mip_level_count,
        face_count,
        premultiplied_alpha,
        ranges,
        data_length: offset,
    })
}

fn skip_metadata<R: Read>(reader: &mut R, len: usize) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    let skipped = io::copy(&mut reader.by_ref().take(len as u64), &mut io::sink())?;
    if skipped as usize != len {
        return Err(TextureError::TruncatedData {
            expected: len,
            actual: skipped as usize,
        });
    }
    Ok(())
}

/// v3 pixel format codes
///
/// Codes with a zero high word are compressed formats; the rest pack four
/// channel names in the low word and their bit widths in the high word.
fn v3_pixel_format(code: u64) -> Option<GpuTextureFormat> {
    use GpuTextureFormat::*;
    let format = match code {
        0 => Pvrtc2bppRgb,
        1 => Pvrtc2bppRgba,
        2 => Pvrtc4bppRgb,
        3 => Pvrtc4bppRgba,
        6 => Etc1,
        7 => Bc1,
        9 => Bc2,
        11 => Bc3,
        0x0808_0808_6162_6772 => Rgba8Unorm,
        0x0808_0808_6172_6762 => Bgra8Unorm,
        0x0008_0808_0062_6772 => Rgb8Unorm,
        0x0005_0605_0062_6772 => Rgb565,
        0x0404_0404_6162_6772 => Rgba4444,
        0x0105_0505_6162_6772 => Rgba5551,
        0x0000_0008_0000_006c => L8,
        0x0000_0008_0000_0061 => A8,
        0x0000_0808_0000_616c => La88,
        _ => return None,
    };
    Some(format)
}

/// v2 OpenGL pixel types
fn v2_pixel_format(pixel_type: u32, has_alpha: bool) -> Option<GpuTextureFormat> {
    use GpuTextureFormat::*;
    let format = match pixel_type {
        0x10 => Rgba4444,
        0x11 => Rgba5551,
        0x12 => Rgba8Unorm,
        0x13 => Rgb565,
        0x15 => Rgb8Unorm,
        0x16 => L8,
        0x17 => La88,
        0x18 if has_alpha => Pvrtc2bppRgba,
        0x18 => Pvrtc2bppRgb,
        0x19 if has_alpha => Pvrtc4bppRgba,
        0x19 => Pvrtc4bppRgb,
        0x1a => Bgra8Unorm,
        0x1b => A8,
        _ => return None,
    };
    Some(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::MockGpu;
    use std::io::Cursor;

    const RGBA8: u64 = 0x0808_0808_6162_6772;

    fn v3_header(format: u64, width: u32, height: u32, mips: u32, faces: u32, metadata: u32) -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(&PVR3_MAGIC.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // flags
        header.extend_from_slice(&format.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // colour space
        header.extend_from_slice(&0u32.to_le_bytes()); // channel type
        header.extend_from_slice(&height.to_le_bytes());
        header.extend_from_slice(&width.to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes()); // depth
        header.extend_from_slice(&1u32.to_le_bytes()); // surfaces
        header.extend_from_slice(&faces.to_le_bytes());
        header.extend_from_slice(&mips.to_le_bytes());
        header.extend_from_slice(&metadata.to_le_bytes());
        header
    }

    fn v2_header(pixel_type: u32, width: u32, height: u32, extra_mips: u32, cubemap: bool, data_len: u32) -> Vec<u8> {
        let flags = pixel_type | if cubemap { PVR2_FLAG_CUBEMAP } else { 0 };
        let surfaces: u32 = if cubemap { 6 } else { 1 };
        let fields = [
            HEADER_LEN as u32,
            height,
            width,
            extra_mips,
            flags,
            data_len,
            32,
            0xff,
            0xff00,
            0xff_0000,
            0xff00_0000,
            PVR2_TAG,
            surfaces,
        ];
        fields.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Payload where every byte of a range holds `face * 16 + level`
    fn tagged_payload(descriptor: &ContainerDescriptor) -> Vec<u8> {
        let mut payload = Vec::with_capacity(descriptor.data_length);
        for range in &descriptor.ranges {
            payload.extend(std::iter::repeat((range.face * 16 + range.level) as u8).take(range.length));
        }
        payload
    }

    #[test]
    fn test_flat_rgba_container() {
        let mut bytes = v3_header(RGBA8, 64, 64, 1, 1, 0);
        bytes.extend(vec![0u8; 64 * 64 * 4]);

        let gpu = MockGpu::new();
        let texture =
            PvrLoader::load_texture(&gpu, Cursor::new(bytes), &TextureOptions::default()).unwrap();

        assert_eq!(texture.size_in_pixels(), glam::UVec2::new(64, 64));
        assert_eq!(texture.texture_type(), TextureType::Flat2D);
        assert_eq!(texture.format(), GpuTextureFormat::Rgba8Unorm);
        assert_eq!(gpu.uploads().len(), 1);
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = v3_header(RGBA8, 64, 64, 1, 1, 0);
        bytes.extend(vec![0u8; 64 * 64 * 4 - 1]);

        let gpu = MockGpu::new();
        let result = PvrLoader::load_texture(&gpu, Cursor::new(bytes), &TextureOptions::default());
        assert!(matches!(
            result,
            Err(TextureError::TruncatedData {
                expected: 16384,
                actual: 16383
            })
        ));
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = v3_header(RGBA8, 4, 4, 1, 1, 0);
        bytes.extend(vec![0u8; 4 * 4 * 4 + 1]);
        let result = PvrLoader::read_container(Cursor::new(bytes));
        assert!(matches!(result, Err(TextureError::TruncatedData { .. })));
    }

    #[test]
    fn test_huge_declared_layout_with_short_body() {
        let mut bytes = v3_header(RGBA8, MAX_DIMENSION, MAX_DIMENSION, 16, 6, 0);
        let data_length = PvrLoader::read_descriptor(&mut Cursor::new(bytes.clone()))
            .unwrap()
            .data_length;
        bytes.extend(vec![0u8; 100]);

        let result = PvrLoader::read_container(Cursor::new(bytes.clone()));
        assert!(matches!(
            result,
            Err(TextureError::TruncatedData { expected, actual: 100 }) if expected == data_length
        ));

        let gpu = MockGpu::new();
        let result = PvrLoader::load_texture(&gpu, Cursor::new(bytes), &TextureOptions::default());
        assert!(matches!(
            result,
            Err(TextureError::TruncatedData { expected, actual: 100 }) if expected == data_length
        ));
        assert_eq!(gpu.live_textures(), 0);
    }

    /// Cursor that remembers the largest buffer it was asked to fill
    struct RecordingReader {
        inner: Cursor<Vec<u8>>,
        largest_read: usize,
    }

    impl Read for RecordingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.largest_read = self.largest_read.max(buf.len());
            self.inner.read(buf)
        }
    }

    impl Seek for RecordingReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_levels_are_read_one_at_a_time() {
        let header = v3_header(RGBA8, 64, 64, 7, 1, 0);
        let descriptor = PvrLoader::read_descriptor(&mut Cursor::new(header.clone())).unwrap();
        let mut bytes = header;
        bytes.extend(tagged_payload(&descriptor));

        let mut reader = RecordingReader {
            inner: Cursor::new(bytes),
            largest_read: 0,
        };
        let gpu = MockGpu::new();
        let texture =
            PvrLoader::load_texture(&gpu, &mut reader, &TextureOptions::default()).unwrap();

        assert!(descriptor.data_length > 64 * 64 * 4);
        assert!(reader.largest_read <= 64 * 64 * 4);
        assert_eq!(texture.mip_level_count(), 7);
        let gpu_texture = texture.gpu_texture().unwrap();
        assert_eq!(gpu_texture.level_data(0, 2).unwrap(), vec![2; 16 * 16 * 4]);
        assert_eq!(gpu_texture.level_data(0, 6).unwrap(), vec![6; 4]);
    }

    #[test]
    fn test_cubemap_from_rewindable_source() {
        let header = v3_header(RGBA8, 4, 4, 3, 6, 0);
        let descriptor = PvrLoader::read_descriptor(&mut Cursor::new(header.clone())).unwrap();
        let mut bytes = header;
        bytes.extend(tagged_payload(&descriptor));

        let source = StreamedImageSource::from_bytes(bytes);
        let gpu = MockGpu::new();
        let texture =
            PvrLoader::load_from_source(&gpu, &source, &TextureOptions::default()).unwrap();

        let gpu_texture = texture.gpu_texture().unwrap();
        for face in 0..6 {
            for level in 0..3 {
                let data = gpu_texture.level_data(face, level).unwrap();
                assert!(data.iter().all(|&b| b == (face * 16 + level) as u8));
            }
        }
    }

    #[test]
    fn test_npot_container_padded_for_pot_device() {
        let mut bytes = v3_header(RGBA8, 3, 5, 3, 1, 0);
        bytes.extend(vec![0xff; 3 * 5 * 4 + 2 * 4 + 4]);

        let gpu = MockGpu::new().with_power_of_two_requirement();
        let texture =
            PvrLoader::load_texture(&gpu, Cursor::new(bytes), &TextureOptions::default()).unwrap();

        assert_eq!(texture.size_in_pixels(), glam::UVec2::new(3, 5));
        assert_eq!(texture.content_size_in_pixels(), glam::UVec2::new(4, 8));
        assert_eq!(texture.mip_level_count(), 3);
        let lens: Vec<usize> = gpu.uploads().iter().map(|u| u.len).collect();
        assert_eq!(lens, vec![4 * 8 * 4, 2 * 4 * 4, 2 * 4]);

        let level0 = texture.gpu_texture().unwrap().level_data(0, 0).unwrap();
        assert_eq!(&level0[8..12], &[0xff; 4]);
        assert_eq!(&level0[12..16], &[0; 4]);
        assert!(level0[5 * 16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unpaddable_npot_containers_rejected_on_pot_device() {
        // BC1, 12x12: 3x3 blocks of 8 bytes
        let mut compressed = v3_header(7, 12, 12, 1, 1, 0);
        compressed.extend(vec![0u8; 72]);
        let mut cubemap = v3_header(RGBA8, 3, 3, 1, 6, 0);
        cubemap.extend(vec![0u8; 3 * 3 * 4 * 6]);

        for bytes in [compressed, cubemap] {
            let gpu = MockGpu::new().with_power_of_two_requirement();
            let result =
                PvrLoader::load_texture(&gpu, Cursor::new(bytes), &TextureOptions::default());
            assert!(matches!(result, Err(TextureError::UnsupportedPixelFormat(_))));
            assert_eq!(gpu.live_textures(), 0);
            assert!(gpu.uploads().is_empty());
        }
    }

    #[test]
    fn test_short_header_is_malformed() {
        let result = PvrLoader::read_container(Cursor::new(vec![0x50, 0x56, 0x52, 0x03, 0, 0]));
        assert!(matches!(result, Err(TextureError::MalformedContainer(_))));
    }

    #[test]
    fn test_bad_magic_is_malformed() {
        let mut bytes = v3_header(RGBA8, 4, 4, 1, 1, 0);
        bytes[0] = 0x42;
        bytes.extend(vec![0u8; 64]);
        let result = PvrLoader::read_container(Cursor::new(bytes));
        assert!(matches!(result, Err(TextureError::MalformedContainer(_))));
    }

    #[test]
    fn test_face_count_validation() {
        for faces in [0u32, 2, 3, 5, 7] {
            let bytes = v3_header(RGBA8, 4, 4, 1, faces, 0);
            let result = PvrLoader::read_container(Cursor::new(bytes));
            assert!(
                matches!(result, Err(TextureError::MalformedContainer(_))),
                "faces={faces}"
            );
        }
    }

    #[test]
    fn test_unknown_format_code() {
        let bytes = v3_header(0xdead_beef, 4, 4, 1, 1, 0);
        let result = PvrLoader::read_container(Cursor::new(bytes));
        assert!(matches!(result, Err(TextureError::UnsupportedPixelFormat(_))));
    }

    #[test]
    fn test_device_unsupported_format_skips_payload() {
        let gpu = MockGpu::new().with_unsupported_format(GpuTextureFormat::Pvrtc4bppRgba);
        let mut bytes = v3_header(3, 8, 8, 1, 1, 0);
        bytes.extend(vec![0u8; 32]);

        let result = PvrLoader::load_texture(&gpu, Cursor::new(bytes), &TextureOptions::default());
        assert!(matches!(result, Err(TextureError::UnsupportedPixelFormat(_))));
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn test_too_many_mips_is_malformed() {
        let bytes = v3_header(RGBA8, 4, 4, 4, 1, 0);
        let result = PvrLoader::read_container(Cursor::new(bytes));
        assert!(matches!(result, Err(TextureError::MalformedContainer(_))));
    }

    #[test]
    fn test_layout_is_contiguous() {
        let bytes = v3_header(RGBA8, 8, 4, 4, 6, 0);
        let descriptor = PvrLoader::read_descriptor(&mut Cursor::new(bytes));
        // 8x4 is not square, so this cubemap is rejected
        assert!(descriptor.is_err());

        let bytes = v3_header(RGBA8, 8, 8, 4, 6, 0);
        let descriptor = PvrLoader::read_descriptor(&mut Cursor::new(bytes)).unwrap();
        let mut expected_offset = 0;
        for range in &descriptor.ranges {
            assert_eq!(range.offset, expected_offset);
            assert!(range.length > 0);
            expected_offset += range.length;
        }
        assert_eq!(expected_offset, descriptor.data_length);
        assert_eq!(descriptor.data_length, (256 + 64 + 16 + 4) * 6);
    }

    #[test]
    fn test_cubemap_uploads_face_major() {
        let header = v3_header(RGBA8, 4, 4, 2, 6, 0);
        let descriptor = PvrLoader::read_descriptor(&mut Cursor::new(header.clone())).unwrap();
        let mut bytes = header;
        bytes.extend(tagged_payload(&descriptor));

        let gpu = MockGpu::new();
        let texture =
            PvrLoader::load_texture(&gpu, Cursor::new(bytes), &TextureOptions::default()).unwrap();
        assert_eq!(texture.texture_type(), TextureType::Cubemap);

        let order: Vec<(u32, u32)> = gpu.uploads().iter().map(|u| (u.face, u.level)).collect();
        let expected: Vec<(u32, u32)> = (0..6).flat_map(|f| (0..2).map(move |l| (f, l))).collect();
        assert_eq!(order, expected);

        let gpu_texture = texture.gpu_texture().unwrap();
        assert_eq!(gpu_texture.level_data(3, 1).unwrap(), vec![3 * 16 + 1; 16]);
        assert_eq!(gpu_texture.level_data(5, 0).unwrap(), vec![5 * 16; 64]);
    }

    #[test]
    fn test_container_mips_override_generation() {
        let mut bytes = v3_header(RGBA8, 4, 4, 3, 1, 0);
        bytes.extend(vec![0u8; 64 + 16 + 4]);
        let options = TextureOptions {
            generate_mipmaps: true,
            ..TextureOptions::default()
        };

        let gpu = MockGpu::new();
        let texture = PvrLoader::load_texture(&gpu, Cursor::new(bytes), &options).unwrap();
        assert_eq!(texture.mip_level_count(), 3);
        assert_eq!(gpu.mipmap_generations(), 0);
    }

    #[test]
    fn test_single_level_container_generates_mips() {
        let mut bytes = v3_header(RGBA8, 4, 4, 1, 1, 0);
        bytes.extend(vec![0u8; 64]);
        let options = TextureOptions {
            generate_mipmaps: true,
            ..TextureOptions::default()
        };

        let gpu = MockGpu::new();
        let texture = PvrLoader::load_texture(&gpu, Cursor::new(bytes), &options).unwrap();
        assert_eq!(texture.mip_level_count(), 3);
        assert_eq!(gpu.mipmap_generations(), 1);
    }

    #[test]
    fn test_metadata_is_skipped() {
        let mut bytes = v3_header(RGBA8, 2, 2, 1, 1, 12);
        bytes.extend(vec![0xaa; 12]);
        bytes.extend(vec![0x11; 16]);

        let container = PvrLoader::read_container(Cursor::new(bytes)).unwrap();
        assert_eq!(container.payload, vec![0x11; 16]);
    }

    #[test]
    fn test_v2_container_with_mips() {
        let data_len = 16 * 16 * 4 + 8 * 8 * 4;
        let mut bytes = v2_header(0x12, 16, 16, 1, false, data_len);
        bytes.extend(vec![0u8; data_len as usize]);

        let container = PvrLoader::read_container(Cursor::new(bytes)).unwrap();
        assert_eq!(container.descriptor.version, ContainerVersion::V2);
        assert_eq!(container.descriptor.mip_level_count, 2);
        assert_eq!(container.descriptor.pixel_format, GpuTextureFormat::Rgba8Unorm);
    }

    #[test]
    fn test_v2_cubemap_is_face_major() {
        let data_len = (4 * 4 * 4 + 2 * 2 * 4 + 4) * 6;
        let bytes = v2_header(0x12, 4, 4, 2, true, data_len);
        let descriptor = PvrLoader::read_descriptor(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(descriptor.texture_type(), TextureType::Cubemap);
        let first_two: Vec<(u32, u32)> = descriptor.ranges[..4]
            .iter()
            .map(|r| (r.face, r.level))
            .collect();
        assert_eq!(first_two, vec![(0, 0), (0, 1), (0, 2), (1, 0)]);
    }

    #[test]
    fn test_v2_declared_length_mismatch() {
        let bytes = v2_header(0x12, 4, 4, 0, false, 63);
        let result = PvrLoader::read_descriptor(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(TextureError::MalformedContainer(_))));
    }

    #[test]
    fn test_v2_pvrtc_alpha_from_mask() {
        assert_eq!(v2_pixel_format(0x19, true), Some(GpuTextureFormat::Pvrtc4bppRgba));
        assert_eq!(v2_pixel_format(0x19, false), Some(GpuTextureFormat::Pvrtc4bppRgb));
        assert_eq!(v2_pixel_format(0x14, true), None);
    }

    #[test]
    fn test_is_pvr() {
        assert!(PvrLoader::is_pvr(&v3_header(RGBA8, 1, 1, 1, 1, 0)));
        assert!(PvrLoader::is_pvr(&v2_header(0x12, 1, 1, 0, false, 4)));
        assert!(!PvrLoader::is_pvr(b"\x89PNG\r\n\x1a\n"));
        assert!(!PvrLoader::is_pvr(&[]));
    }
}
