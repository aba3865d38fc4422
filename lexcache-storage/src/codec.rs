//! Payload codec: optional zlib compression.
//!
//! Stored payloads carry no marker telling compressed and plain data apart.
//! Toggling compression on an index that already holds entries makes the
//! older ones undecodable; flush the cache when changing it.

use lexcache_core::{CacheError, CacheResult};

/// zlib level meaning "library default".
pub const DEFAULT_COMPRESSION_LEVEL: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadCodec {
    compression: bool,
    level: i32,
}

impl PayloadCodec {
    /// Pass-through codec.
    pub fn plain() -> Self {
        Self {
            compression: false,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Build a codec, failing when compression is requested on a build
    /// without the `compression` feature.
    pub fn new(compression: bool, level: i32) -> CacheResult<Self> {
        if compression && !cfg!(feature = "compression") {
            return Err(CacheError::CompressionUnsupported);
        }
        Ok(Self { compression, level })
    }

    pub fn compresses(&self) -> bool {
        self.compression
    }

    pub fn encode(&self, content: &[u8]) -> CacheResult<Vec<u8>> {
        if !self.compression {
            return Ok(content.to_vec());
        }
        compress(content, self.level)
    }

    pub fn decode(&self, stored: &[u8]) -> CacheResult<Vec<u8>> {
        if !self.compression {
            return Ok(stored.to_vec());
        }
        decompress(stored)
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::plain()
    }
}

#[cfg(feature = "compression")]
fn compress(content: &[u8], level: i32) -> CacheResult<Vec<u8>> {
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    let level = match u32::try_from(level) {
        Ok(level) if level <= 9 => Compression::new(level),
        _ => Compression::default(),
    };

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(content.len() / 2), level);
    encoder
        .write_all(content)
        .map_err(|e| CacheError::compression(format!("Compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CacheError::compression(format!("Compression finalization failed: {}", e)))
}

#[cfg(feature = "compression")]
fn decompress(stored: &[u8]) -> CacheResult<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut decoder = ZlibDecoder::new(stored);
    let mut content = Vec::new();
    decoder
        .read_to_end(&mut content)
        .map_err(|e| CacheError::compression(format!("Decompression failed: {}", e)))?;
    Ok(content)
}

#[cfg(not(feature = "compression"))]
fn compress(_content: &[u8], _level: i32) -> CacheResult<Vec<u8>> {
    Err(CacheError::CompressionUnsupported)
}

#[cfg(not(feature = "compression"))]
fn decompress(_stored: &[u8]) -> CacheResult<Vec<u8>> {
    Err(CacheError::CompressionUnsupported)
}
