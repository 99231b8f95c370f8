//! Mapping logical texture names to files on disk

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, TextureError};
use crate::loader::stream::StreamedImageSource;
use crate::options::TextureOptions;

/// A resolved texture file
#[derive(Debug, Clone, PartialEq)]
pub struct TextureFile {
    /// Logical name the file was requested by
    pub name: String,
    /// Location of the file; its string form is the cache key
    pub url: PathBuf,
    /// Pixels per point of the file's contents
    pub content_scale: f32,
    /// Whether the file was picked through a resolution tag such as `-2x`
    pub has_resolution_tag: bool,
}

impl TextureFile {
    /// A file at `url` with no resolution tag
    pub fn untagged(name: impl Into<String>, url: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            content_scale: 1.0,
            has_resolution_tag: false,
        }
    }

    /// Open the file as a rewindable source
    pub fn streamed_source(&self) -> StreamedImageSource {
        StreamedImageSource::from_path(self.url.clone())
    }

    /// Cache key for this file
    pub fn cache_key(&self) -> String {
        self.url.to_string_lossy().into_owned()
    }
}

/// Resolves logical names into files
pub trait FileResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, name: &str, options: &TextureOptions) -> Result<TextureFile>;
}

/// Resolves names relative to a root directory
///
/// Tagged variants are tried first, in the order they were added: with a
/// `-2x` tag, `hero.png` resolves to `hero-2x.png` at content scale 2 when
/// that file exists. Absolute names bypass the root.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
    resolution_tags: Vec<(String, f32)>,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            resolution_tags: Vec::new(),
        }
    }

    /// Add a filename suffix that marks files authored at `content_scale`
    pub fn with_resolution_tag(mut self, tag: impl Into<String>, content_scale: f32) -> Self {
        self.resolution_tags.push((tag.into(), content_scale));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tagged_path(path: &Path, tag: &str) -> Option<PathBuf> {
        let stem = path.file_stem()?.to_str()?;
        let file_name = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{stem}{tag}.{ext}"),
            None => format!("{stem}{tag}"),
        };
        Some(path.with_file_name(file_name))
    }

    /// Scale implied by a tag already present in the file name
    fn embedded_scale(&self, path: &Path) -> Option<f32> {
        let stem = path.file_stem()?.to_str()?;
        self.resolution_tags
            .iter()
            .find(|(tag, _)| stem.ends_with(tag.as_str()))
            .map(|(_, scale)| *scale)
    }
}

impl Default for DirectoryResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileResolver for DirectoryResolver {
    fn resolve(&self, name: &str, _options: &TextureOptions) -> Result<TextureFile> {
        let requested = Path::new(name);
        let base = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };

        for (tag, scale) in &self.resolution_tags {
            if let Some(candidate) = Self::tagged_path(&base, tag) {
                if candidate.is_file() {
                    return Ok(TextureFile {
                        name: name.to_string(),
                        url: candidate,
                        content_scale: *scale,
                        has_resolution_tag: true,
                    });
                }
            }
        }

        if !base.is_file() {
            return Err(TextureError::FileNotFound(name.to_string()));
        }

        let embedded = self.embedded_scale(&base);
        Ok(TextureFile {
            name: name.to_string(),
            url: base,
            content_scale: embedded.unwrap_or(1.0),
            has_resolution_tag: embedded.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_plain_resolution() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hero.png"), b"x").unwrap();

        let resolver = DirectoryResolver::new(dir.path());
        let file = resolver.resolve("hero.png", &TextureOptions::default()).unwrap();

        assert_eq!(file.url, dir.path().join("hero.png"));
        assert_eq!(file.content_scale, 1.0);
        assert!(!file.has_resolution_tag);
    }

    #[test]
    fn test_tagged_variant_preferred() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hero.png"), b"x").unwrap();
        fs::write(dir.path().join("hero-2x.png"), b"x").unwrap();

        let resolver = DirectoryResolver::new(dir.path())
            .with_resolution_tag("-4x", 4.0)
            .with_resolution_tag("-2x", 2.0);
        let file = resolver.resolve("hero.png", &TextureOptions::default()).unwrap();

        assert_eq!(file.url, dir.path().join("hero-2x.png"));
        assert_eq!(file.content_scale, 2.0);
        assert!(file.has_resolution_tag);
    }

    #[test]
    fn test_tag_in_requested_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bg-2x.pvr"), b"x").unwrap();

        let resolver = DirectoryResolver::new(dir.path()).with_resolution_tag("-2x", 2.0);
        let file = resolver.resolve("bg-2x.pvr", &TextureOptions::default()).unwrap();
        assert_eq!(file.content_scale, 2.0);
        assert!(file.has_resolution_tag);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(dir.path());
        let result = resolver.resolve("nope.png", &TextureOptions::default());
        assert!(matches!(result, Err(TextureError::FileNotFound(name)) if name == "nope.png"));
    }
}
