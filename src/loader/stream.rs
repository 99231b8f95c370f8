//! Rewindable decode sources over single-pass byte streams.
//!
//! A [`StreamedImageSource`] holds a factory that opens a fresh stream on
//! demand. Each [`DecodeSource`] it hands out opens its stream lazily and
//! implements `Seek` by reopening and skipping forward, so decoders that
//! need to rewind never force the whole file into memory.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, TextureError};

/// Buffer size used when a caller has no better estimate
pub const DEFAULT_READ_CHUNK: usize = 64 * 1024;

/// Largest buffer reserved up front from a size hint
///
/// Hints usually come from container headers, which are untrusted. Reads
/// past this size grow the buffer as bytes actually arrive.
pub const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Boxed byte stream produced by a source factory
pub type ByteStream = Box<dyn Read + Send>;

type StreamFactory = dyn Fn() -> io::Result<ByteStream> + Send + Sync;

/// Read-to-end with an initial capacity hint
pub trait ReadSizeHintExt: Read {
    /// Read until end of stream, starting from a buffer of `size_hint` bytes
    ///
    /// A hint of zero falls back to [`DEFAULT_READ_CHUNK`]; larger hints are
    /// capped at [`MAX_PREALLOC`]. Read errors other than interruptions
    /// surface as [`TextureError::StreamReadFailure`].
    fn load_data_with_size_hint(&mut self, size_hint: usize) -> Result<Vec<u8>> {
        let capacity = if size_hint == 0 {
            DEFAULT_READ_CHUNK
        } else {
            size_hint.min(MAX_PREALLOC)
        };
        let mut data = Vec::with_capacity(capacity);
        self.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl<R: Read + ?Sized> ReadSizeHintExt for R {}

/// Factory-backed image source
#[derive(Clone)]
pub struct StreamedImageSource {
    factory: Arc<StreamFactory>,
}

impl fmt::Debug for StreamedImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamedImageSource").finish_non_exhaustive()
    }
}

impl StreamedImageSource {
    /// Create a source from a stream-opening factory
    ///
    /// The factory may be called more than once and must return a stream
    /// positioned at the start each time.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> io::Result<ByteStream> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Source reading a file from disk
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(move || Ok(Box::new(File::open(&path)?) as ByteStream))
    }

    /// Source over an in-memory buffer
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self::new(move || Ok(Box::new(io::Cursor::new(SharedBytes(bytes.clone()))) as ByteStream))
    }

    /// Hand out a new decode source positioned at the start of the stream
    ///
    /// The stream is opened on first read.
    pub fn create_decode_source(&self) -> DecodeSource {
        DecodeSource {
            factory: Arc::clone(&self.factory),
            stream: None,
            position: 0,
            len: None,
        }
    }

    /// Read the whole stream from a fresh open
    pub fn load_data(&self, size_hint: usize) -> Result<Vec<u8>> {
        self.create_decode_source()
            .load_data_with_size_hint(size_hint)
    }
}

struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A lazily opened, seekable view of a [`StreamedImageSource`]
pub struct DecodeSource {
    factory: Arc<StreamFactory>,
    stream: Option<ByteStream>,
    position: u64,
    len: Option<u64>,
}

impl fmt::Debug for DecodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeSource")
            .field("opened", &self.stream.is_some())
            .field("position", &self.position)
            .field("len", &self.len)
            .finish()
    }
}

impl DecodeSource {
    /// Current read position
    pub fn position(&self) -> u64 {
        self.position
    }

    fn stream(&mut self) -> io::Result<&mut ByteStream> {
        if self.stream.is_none() {
            self.stream = Some((self.factory)()?);
            self.position = 0;
        }
        // Opened just above
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stream unavailable"))
    }

    fn rewind_stream(&mut self) {
        self.stream = None;
        self.position = 0;
    }

    /// Discard bytes until `target` or end of stream, returning the new position
    fn skip_to(&mut self, target: u64) -> io::Result<u64> {
        let remaining = target.saturating_sub(self.position);
        let stream = self.stream()?;
        let skipped = io::copy(&mut stream.take(remaining), &mut io::sink())?;
        self.position += skipped;
        Ok(self.position)
    }

    fn total_len(&mut self) -> io::Result<u64> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let len = self.skip_to(u64::MAX)?;
        self.len = Some(len);
        Ok(len)
    }
}

impl Read for DecodeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stream()?.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for DecodeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.total_len()?.checked_add_signed(delta),
        }
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;

        if target < self.position {
            self.rewind_stream();
        }
        if target == self.position {
            return Ok(target);
        }

        let reached = self.skip_to(target)?;
        if reached < target {
            // Past the end: later reads return 0 until the next seek
            self.position = target;
        }
        Ok(target)
    }
}
