//! Encoding pipeline and the composite [`Writer`].
//!
//! ```text
//! BufWriter ── Encoder (gzip | xz | zstd | plain) ── RawSink
//! ```
//! `close` always runs the same three steps in order: drain the buffer into
//! the encoder, finish the encoder, close the sink. A failing step does not
//! stop the later ones.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};

use tracing::{debug, warn};

use crate::codec::{Encoder, Format};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sink::{self, RawSink};

/// Permission bits used by [`wopen`] for new files (before umask).
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// A buffered, optionally compressing destination.
pub struct Writer {
    label:  String,
    format: Format,
    inner:  Option<BufWriter<Encoder<RawSink>>>,
}

impl Writer {
    /// Wrap a caller-owned sink, compressing with `format`.
    pub fn new<W: Write + Send + 'static>(sink: W, format: Format) -> Result<Self> {
        Self::with_config(sink, format, &Config::default())
    }

    pub fn with_config<W: Write + Send + 'static>(
        sink:   W,
        format: Format,
        config: &Config,
    ) -> Result<Self> {
        Self::from_sink(RawSink::stream("<stream>", sink), format, config)
    }

    /// Resolve `descriptor` and open it for writing; the suffix picks the
    /// encoder.
    pub fn create(descriptor: &str, options: &OpenOptions, mode: u32, config: &Config) -> Result<Self> {
        let sink   = sink::resolve(descriptor, options, mode)?;
        let format = Format::from_name(descriptor);
        Self::from_sink(sink, format, config)
    }

    pub fn from_sink(sink: RawSink, format: Format, config: &Config) -> Result<Self> {
        let label   = sink.label().to_owned();
        let encoder = Encoder::new(format, sink, config)?;
        debug!(sink = %label, %format, "selected encoder");
        Ok(Self {
            label,
            format,
            inner: Some(BufWriter::with_capacity(config.effective_buffer_size(), encoder)),
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Drain the buffer, finish the encoder and close the sink.
    ///
    /// Every step is attempted; each failure is logged and the last one is
    /// returned. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(buffered) = self.inner.take() else {
            return Ok(());
        };
        let mut last: Option<io::Error> = None;
        let mut record = |step: &str, e: io::Error| {
            warn!(sink = %self.label, step, error = %e, "close step failed");
            last = Some(e);
        };

        let (mut encoder, pending) = buffered.into_parts();
        match pending {
            Ok(bytes) => {
                if let Err(e) = encoder.write_all(&bytes) {
                    record("drain buffer", e);
                }
            }
            Err(_) => record("drain buffer", io::Error::other("buffered writer panicked")),
        }

        if let Err(e) = encoder.try_finish() {
            record("finish encoder", e);
        }
        if let Err(e) = encoder.get_mut().close() {
            record("close sink", e);
        }
        drop(encoder);

        debug!(sink = %self.label, format = %self.format, "writer closed");
        match last {
            Some(e) => Err(Error::from_io(e)),
            None    => Ok(()),
        }
    }

    fn inner_mut(&mut self) -> io::Result<&mut BufWriter<Encoder<RawSink>>> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::other("writer is closed"))
    }
}

/// Open `descriptor` for buffered writing: create, truncate, mode 0666.
pub fn wopen(descriptor: &str) -> Result<Writer> {
    wopen_file(descriptor, &sink::default_open_options(), DEFAULT_FILE_MODE)
}

/// Open `descriptor` for buffered writing with explicit flags and mode.
pub fn wopen_file(descriptor: &str, options: &OpenOptions, mode: u32) -> Result<Writer> {
    Writer::create(descriptor, options, mode, &Config::default())
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner_mut()?.write(buf)
    }

    /// Buffer, then compressor, then sink.
    fn flush(&mut self) -> io::Result<()> {
        self.inner_mut()?.flush()
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(sink = %self.label, error = %e, "error closing writer");
        }
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("label", &self.label)
            .field("format", &self.format)
            .field("closed", &self.is_closed())
            .finish()
    }
}
