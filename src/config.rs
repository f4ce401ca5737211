//! Tunables shared by the read and write pipelines.

use crate::codec::MAX_MAGIC_LEN;

/// Default size of every buffer layer: 64 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
/// Default gzip level (flate2 scale 0-9).
pub const DEFAULT_GZIP_LEVEL:  u32   = 6;
/// Default xz preset (0-9).
pub const DEFAULT_XZ_LEVEL:    u32   = 6;
/// Default zstd level (matches libzstd's own default).
pub const DEFAULT_ZSTD_LEVEL:  i32   = 3;

/// Configuration for [`Reader`](crate::Reader) and [`Writer`](crate::Writer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Capacity of each buffer layer. Never smaller than the longest magic.
    pub buffer_size: usize,
    pub gzip_level:  u32,
    pub xz_level:    u32,
    pub zstd_level:  i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            gzip_level:  DEFAULT_GZIP_LEVEL,
            xz_level:    DEFAULT_XZ_LEVEL,
            zstd_level:  DEFAULT_ZSTD_LEVEL,
        }
    }
}

impl Config {
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Apply one level to every codec, clamped to each codec's range.
    pub fn with_level(mut self, level: i32) -> Self {
        self.gzip_level = level.clamp(0, 9) as u32;
        self.xz_level   = level.clamp(0, 9) as u32;
        self.zstd_level = level.clamp(1, 22);
        self
    }

    pub(crate) fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(MAX_MAGIC_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.buffer_size, 65536);
        assert_eq!(cfg.zstd_level, 3);
    }

    #[test]
    fn tiny_buffer_is_raised_to_magic_len() {
        let cfg = Config::default().with_buffer_size(1);
        assert_eq!(cfg.effective_buffer_size(), MAX_MAGIC_LEN);
    }

    #[test]
    fn level_is_clamped_per_codec() {
        let cfg = Config::default().with_level(19);
        assert_eq!(cfg.gzip_level, 9);
        assert_eq!(cfg.xz_level, 9);
        assert_eq!(cfg.zstd_level, 19);
    }
}
