//! Format tags, magic-byte sniffing and the codec stream layers.
//!
//! # Detection rules
//! Reads are classified by content: the first bytes of the stream are
//! peeked (never consumed) and compared against the known signatures in a
//! fixed priority order, first match wins. Writes are classified by name:
//! the lowercased destination suffix picks the encoder. The two rules are
//! independent: a mislabelled file still reads correctly.

use std::io::{self, BufRead, Read, Write};

use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use xz2::bufread::XzDecoder;
use xz2::write::XzEncoder;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

// ── Signatures ──────────────────────────────────────────────────────────────

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const XZ_MAGIC:   [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Length of the longest signature; every peek buffer must hold this much.
pub const MAX_MAGIC_LEN: usize = XZ_MAGIC.len();

// ── Format ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    None,
    Gzip,
    Xz,
    Zstd,
}

impl Format {
    /// Sniff order. `None` has no signature and is the fallback.
    pub const COMPRESSED: [Format; 3] = [Format::Gzip, Format::Xz, Format::Zstd];

    pub fn magic(self) -> Option<&'static [u8]> {
        match self {
            Format::None => None,
            Format::Gzip => Some(&GZIP_MAGIC),
            Format::Xz   => Some(&XZ_MAGIC),
            Format::Zstd => Some(&ZSTD_MAGIC),
        }
    }

    /// Suffix that selects this format on write (lowercase, with dot).
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Format::None => None,
            Format::Gzip => Some(".gz"),
            Format::Xz   => Some(".xz"),
            Format::Zstd => Some(".zst"),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::None => "none",
            Format::Gzip => "gzip",
            Format::Xz   => "xz",
            Format::Zstd => "zstd",
        }
    }

    /// Write-side selection: case-insensitive suffix match on the descriptor.
    pub fn from_name(descriptor: &str) -> Self {
        let lower = descriptor.to_lowercase();
        Self::COMPRESSED
            .into_iter()
            .find(|f| f.suffix().is_some_and(|s| lower.ends_with(s)))
            .unwrap_or(Format::None)
    }

    /// Read-side selection: content sniffing, gzip then xz then zstd.
    ///
    /// A stream too short for a signature is not a match for it; the
    /// remaining (shorter) signatures are still tried. Only a real I/O
    /// failure is returned as an error.
    pub fn sniff<R: Read>(reader: &mut PeekReader<R>) -> Result<Self> {
        for format in Self::COMPRESSED {
            let magic = format.magic().unwrap_or_default();
            match check_bytes(reader, magic) {
                Ok(true)              => return Ok(format),
                Ok(false)             => {}
                Err(Error::NoContent) => {}
                Err(e)                => return Err(e),
            }
        }
        Ok(Format::None)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Sniffing ────────────────────────────────────────────────────────────────

/// Peek `expected.len()` bytes and compare them with `expected`.
///
/// Returns [`Error::NoContent`] when fewer bytes are available, so an empty
/// or truncated stream is distinguishable from a real read failure. The
/// stream position is unchanged either way.
pub fn check_bytes<R: Read>(reader: &mut PeekReader<R>, expected: &[u8]) -> Result<bool> {
    let head = reader.peek(expected.len())?;
    if head.len() < expected.len() {
        return Err(Error::NoContent);
    }
    Ok(head == expected)
}

pub fn is_gzip<R: Read>(reader: &mut PeekReader<R>) -> Result<bool> {
    check_bytes(reader, &GZIP_MAGIC)
}

pub fn is_xz<R: Read>(reader: &mut PeekReader<R>) -> Result<bool> {
    check_bytes(reader, &XZ_MAGIC)
}

pub fn is_zst<R: Read>(reader: &mut PeekReader<R>) -> Result<bool> {
    check_bytes(reader, &ZSTD_MAGIC)
}

// ── Decoding layer ──────────────────────────────────────────────────────────

/// A decompressing transform that owns the buffered reader beneath it.
pub enum Decoder<R: BufRead> {
    Gzip(MultiGzDecoder<R>),
    Xz(XzDecoder<R>),
    Zstd(zstd::stream::read::Decoder<'static, R>),
}

impl<R: BufRead> Decoder<R> {
    /// Wrap `inner` in the decoder for a compressed `format`.
    pub fn new(format: Format, inner: R) -> io::Result<Self> {
        Ok(match format {
            Format::None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "uncompressed data has no decoder",
                ))
            }
            Format::Gzip => Decoder::Gzip(MultiGzDecoder::new(inner)),
            Format::Xz   => Decoder::Xz(XzDecoder::new_multi_decoder(inner)),
            Format::Zstd => Decoder::Zstd(zstd::stream::read::Decoder::with_buffer(inner)?),
        })
    }

    pub fn format(&self) -> Format {
        match self {
            Decoder::Gzip(_) => Format::Gzip,
            Decoder::Xz(_)   => Format::Xz,
            Decoder::Zstd(_) => Format::Zstd,
        }
    }

    /// Tear down the codec state and hand back the reader it owned.
    pub fn into_inner(self) -> R {
        match self {
            Decoder::Gzip(d) => d.into_inner(),
            Decoder::Xz(d)   => d.into_inner(),
            Decoder::Zstd(d) => d.finish(),
        }
    }
}

impl<R: BufRead> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Gzip(d) => d.read(buf),
            Decoder::Xz(d)   => d.read(buf),
            Decoder::Zstd(d) => d.read(buf),
        }
    }
}

// ── Encoding layer ──────────────────────────────────────────────────────────

/// Zero or one compressing transform over a sink.
pub enum Encoder<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Xz(XzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(format: Format, sink: W, config: &Config) -> io::Result<Self> {
        Ok(match format {
            Format::None => Encoder::Plain(sink),
            Format::Gzip => Encoder::Gzip(GzEncoder::new(
                sink,
                flate2::Compression::new(config.gzip_level.min(9)),
            )),
            Format::Xz   => Encoder::Xz(XzEncoder::new(sink, config.xz_level.min(9))),
            Format::Zstd => Encoder::Zstd(zstd::stream::write::Encoder::new(sink, config.zstd_level)?),
        })
    }

    pub fn format(&self) -> Format {
        match self {
            Encoder::Plain(_) => Format::None,
            Encoder::Gzip(_)  => Format::Gzip,
            Encoder::Xz(_)    => Format::Xz,
            Encoder::Zstd(_)  => Format::Zstd,
        }
    }

    /// Write the trailer, keeping the sink in place whether or not it
    /// succeeds. Calling it again after success writes nothing.
    pub fn try_finish(&mut self) -> io::Result<()> {
        match self {
            Encoder::Plain(_) => Ok(()),
            Encoder::Gzip(e)  => e.try_finish(),
            Encoder::Xz(e)    => e.try_finish(),
            Encoder::Zstd(e)  => e.do_finish(),
        }
    }

    pub fn get_mut(&mut self) -> &mut W {
        match self {
            Encoder::Plain(w) => w,
            Encoder::Gzip(e)  => e.get_mut(),
            Encoder::Xz(e)    => e.get_mut(),
            Encoder::Zstd(e)  => e.get_mut(),
        }
    }

    /// Write the trailer and return the sink. On failure the sink is
    /// dropped together with the encoder; use [`Encoder::try_finish`] to
    /// keep it.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Plain(w) => Ok(w),
            Encoder::Gzip(e)  => e.finish(),
            Encoder::Xz(e)    => e.finish(),
            Encoder::Zstd(e)  => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Plain(w) => w.write(buf),
            Encoder::Gzip(e)  => e.write(buf),
            Encoder::Xz(e)    => e.write(buf),
            Encoder::Zstd(e)  => e.write(buf),
        }
    }

    /// Drain the compressor's internal buffer into the sink.
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Plain(w) => w.flush(),
            Encoder::Gzip(e)  => e.flush(),
            Encoder::Xz(e)    => e.flush(),
            Encoder::Zstd(e)  => e.flush(),
        }
    }
}
