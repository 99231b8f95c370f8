//! Loader module for texture source handling
//!
//! Contains the streamed byte source, the PVR container loader, the general
//! image decoder and file resolution.

pub mod file;
pub mod image;
pub mod pvr;
pub mod stream;

// Re-export common types
pub use self::file::{DirectoryResolver, FileResolver, TextureFile};
pub use self::image::{DecodedImage, DefaultImageDecoder, ImageDecoder};
pub use self::pvr::{ContainerDescriptor, LevelRange, PvrContainer, PvrLoader};
pub use self::stream::{DecodeSource, ReadSizeHintExt, StreamedImageSource};
