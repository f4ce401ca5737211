//! Decoding pipeline and the composite [`Reader`].
//!
//! # Layers
//! ```text
//! PeekReader ── Decoder ── PeekReader ── RawSource     (gzip / xz / zstd)
//! PeekReader ───────────────────────────  RawSource     (uncompressed)
//! ```
//! The inner buffer is the one the format is sniffed from; the outer buffer
//! is the one the byte-order mark is checked on. Closing unwinds the chain
//! from the outside: the decoder state is released first, then the raw
//! source, each exactly once.

use std::io::{self, BufRead, Read};

use tracing::{debug, warn};

use crate::codec::{Decoder, Format};
use crate::config::Config;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::peek::PeekReader;
use crate::source::{self, RawSource};

/// UTF-8 encoding of U+FEFF.
pub const BOM: [u8; 3] = [0xef, 0xbb, 0xbf];

enum Layers {
    Plain(PeekReader<RawSource>),
    Decoded(PeekReader<Decoder<PeekReader<RawSource>>>),
}

impl Layers {
    fn close(self, label: &str) -> io::Result<()> {
        let mut raw = match self {
            Layers::Plain(outer) => outer.into_inner(),
            Layers::Decoded(outer) => {
                let decoder = outer.into_inner();
                let format  = decoder.format();
                let inner   = decoder.into_inner();
                debug!(source = label, %format, "decoder released");
                inner.into_inner()
            }
        };
        raw.close()
    }
}

/// A buffered, decoded byte stream over any supported source.
///
/// Implements [`Read`] and [`BufRead`]. Call [`Reader::close`] to release
/// every layer; dropping an open reader does the same and logs failures.
pub struct Reader {
    label:  String,
    format: Format,
    layers: Option<Layers>,
}

impl Reader {
    /// Run the decoding pipeline over a caller-owned stream with the
    /// default configuration. The stream is released, not closed.
    pub fn new<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        Self::with_config(reader, &Config::default())
    }

    pub fn with_config<R: Read + Send + 'static>(reader: R, config: &Config) -> Result<Self> {
        Self::from_source(RawSource::borrowed("<stream>", reader), config)
    }

    /// Resolve `descriptor` and open it for reading.
    pub fn open(descriptor: &str, config: &Config) -> Result<Self> {
        let parsed = Descriptor::parse(descriptor);
        debug!(descriptor = %parsed, "opening for read");
        let source = source::resolve(&parsed)?;
        Self::from_source(source, config)
    }

    /// Sniff, decode, re-buffer and strip a leading BOM.
    pub fn from_source(source: RawSource, config: &Config) -> Result<Self> {
        let size  = config.effective_buffer_size();
        let label = source.label().to_owned();

        let mut raw = PeekReader::with_capacity(size, source);
        let format = match Format::sniff(&mut raw) {
            Ok(f)  => f,
            Err(e) => {
                release(Layers::Plain(raw), &label);
                return Err(e);
            }
        };
        debug!(source = %label, %format, "detected format");

        let mut layers = match format {
            Format::None => Layers::Plain(raw),
            compressed   => match Decoder::new(compressed, raw) {
                Ok(decoder) => Layers::Decoded(PeekReader::with_capacity(size, decoder)),
                Err(e)      => {
                    // The raw source went down with the failed decoder and
                    // was torn down by its own drop.
                    warn!(source = %label, %format, error = %e, "decoder setup failed");
                    return Err(e.into());
                }
            },
        };

        let bom = match &mut layers {
            Layers::Plain(outer)   => skip_bom(outer),
            Layers::Decoded(outer) => skip_bom(outer),
        };
        match bom {
            Ok(true)  => debug!(source = %label, "skipped byte-order mark"),
            Ok(false) => {}
            Err(e)    => {
                release(layers, &label);
                return Err(e);
            }
        }

        Ok(Self { label, format, layers: Some(layers) })
    }

    /// Format detected from the stream content.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.layers.is_none()
    }

    /// Tear down the decoder, then the raw source. Calling it again is a
    /// no-op; reads after close fail.
    pub fn close(&mut self) -> Result<()> {
        match self.layers.take() {
            Some(layers) => layers.close(&self.label).map_err(Error::from_io),
            None         => Ok(()),
        }
    }

    fn layers_mut(&mut self) -> io::Result<&mut Layers> {
        self.layers.as_mut().ok_or_else(closed)
    }
}

/// Open `descriptor` for buffered reading with the default configuration.
pub fn ropen(descriptor: &str) -> Result<Reader> {
    Reader::open(descriptor, &Config::default())
}

/// Consume a leading BOM. Fails with `NoContent` on an empty stream.
fn skip_bom<R: Read>(outer: &mut PeekReader<R>) -> Result<bool> {
    let head = outer.peek(BOM.len())?;
    if head.is_empty() {
        return Err(Error::NoContent);
    }
    if head == BOM {
        outer.consume(BOM.len());
        return Ok(true);
    }
    Ok(false)
}

fn release(layers: Layers, label: &str) {
    if let Err(e) = layers.close(label) {
        warn!(source = label, error = %e, "teardown after failed open");
    }
}

fn closed() -> io::Error {
    io::Error::other("reader is closed")
}

impl Read for Reader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.layers_mut()? {
            Layers::Plain(r)   => r.read(buf),
            Layers::Decoded(r) => r.read(buf),
        }
    }
}

impl BufRead for Reader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self.layers_mut()? {
            Layers::Plain(r)   => r.fill_buf(),
            Layers::Decoded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self.layers.as_mut() {
            Some(Layers::Plain(r))   => r.consume(amt),
            Some(Layers::Decoded(r)) => r.consume(amt),
            None                     => {}
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(source = %self.label, error = %e, "error closing reader");
        }
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("label", &self.label)
            .field("format", &self.format)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::codec::Encoder;

    fn compress(format: Format, data: &[u8]) -> Vec<u8> {
        let mut enc = Encoder::new(format, Vec::new(), &Config::default()).unwrap();
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn read_all(mut r: Reader) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        r.close().unwrap();
        out
    }

    #[test]
    fn plain_stream_passes_through() {
        let r = Reader::new(io::Cursor::new(b"abc\ndef\n".to_vec())).unwrap();
        assert_eq!(r.format(), Format::None);
        assert_eq!(read_all(r), b"abc\ndef\n");
    }

    #[test]
    fn compressed_streams_are_decoded() {
        let data = b"line one\nline two\n".repeat(100);
        for format in Format::COMPRESSED {
            let r = Reader::new(io::Cursor::new(compress(format, &data))).unwrap();
            assert_eq!(r.format(), format);
            assert_eq!(read_all(r), data);
        }
    }

    #[test]
    fn empty_stream_is_no_content() {
        let err = Reader::new(io::empty()).unwrap_err();
        assert!(err.is_no_content());
    }

    #[test]
    fn compressed_empty_payload_is_no_content() {
        let err = Reader::new(io::Cursor::new(compress(Format::Gzip, b""))).unwrap_err();
        assert!(err.is_no_content());
    }

    #[test]
    fn short_plain_stream_is_kept() {
        let r = Reader::new(io::Cursor::new(b"ab".to_vec())).unwrap();
        assert_eq!(read_all(r), b"ab");
    }

    #[test]
    fn streams_shorter_than_a_signature_read_as_plain() {
        for data in [&b"a"[..], b"ab", b"\x1f", b"\xfd7zX", b"\x28\xb5\x2f"] {
            let r = Reader::new(io::Cursor::new(data.to_vec())).unwrap();
            assert_eq!(r.format(), Format::None);
            assert_eq!(read_all(r), data);
        }
    }

    /// Serves `data` while keeping a shared token alive.
    struct Held(std::sync::Arc<()>, io::Cursor<Vec<u8>>);

    impl Read for Held {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.1.read(buf)
        }
    }

    #[test]
    fn failed_open_releases_the_source() {
        let token = std::sync::Arc::new(());

        let err = Reader::new(Held(token.clone(), io::Cursor::new(Vec::new()))).unwrap_err();
        assert!(err.is_no_content());
        assert_eq!(std::sync::Arc::strong_count(&token), 1);

        let broken = vec![0x1f, 0x8b, 0xff, 0xff, 0x00];
        assert!(Reader::new(Held(token.clone(), io::Cursor::new(broken))).is_err());
        assert_eq!(std::sync::Arc::strong_count(&token), 1);
    }

    #[test]
    fn close_releases_the_source() {
        let token = std::sync::Arc::new(());
        let packed = compress(Format::Gzip, b"held");
        let r = Reader::new(Held(token.clone(), io::Cursor::new(packed))).unwrap();
        assert_eq!(std::sync::Arc::strong_count(&token), 2);
        assert_eq!(read_all(r), b"held");
        assert_eq!(std::sync::Arc::strong_count(&token), 1);
    }

    #[test]
    fn bom_is_stripped_once() {
        let mut data = BOM.to_vec();
        data.extend_from_slice(&BOM);
        data.extend_from_slice(b"x");
        let r = Reader::new(io::Cursor::new(data)).unwrap();
        assert_eq!(read_all(r), [&BOM[..], b"x"].concat());
    }

    #[test]
    fn bom_inside_compressed_stream_is_stripped() {
        let packed = compress(Format::Zstd, &[&BOM[..], b"hi"].concat());
        let r = Reader::new(io::Cursor::new(packed)).unwrap();
        assert_eq!(read_all(r), b"hi");
    }

    #[test]
    fn bom_only_stream_reads_empty() {
        let r = Reader::new(io::Cursor::new(BOM.to_vec())).unwrap();
        assert!(read_all(r).is_empty());
    }

    #[test]
    fn malformed_gzip_surfaces_codec_error() {
        let err = Reader::new(io::Cursor::new(vec![0x1f, 0x8b, 0xff, 0xff, 0x00])).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }

    #[test]
    fn close_is_idempotent_and_blocks_reads() {
        let mut r = Reader::new(io::Cursor::new(b"data".to_vec())).unwrap();
        r.close().unwrap();
        r.close().unwrap();
        assert!(r.is_closed());
        let mut buf = [0u8; 4];
        assert!(r.read(&mut buf).is_err());
        assert!(r.fill_buf().is_err());
    }

    #[test]
    fn lines_work_through_bufread() {
        let packed = compress(Format::Gzip, b"a\nb\nc\n");
        let r = Reader::new(io::Cursor::new(packed)).unwrap();
        let lines: Vec<String> = r.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, ["a", "b", "c"]);
    }

    #[test]
    fn tiny_buffer_still_sniffs() {
        let cfg = Config::default().with_buffer_size(1);
        let packed = compress(Format::Xz, b"payload");
        let r = Reader::with_config(io::Cursor::new(packed), &cfg).unwrap();
        assert_eq!(r.format(), Format::Xz);
        assert_eq!(read_all(r), b"payload");
    }
}
