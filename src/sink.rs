//! Sink resolver: descriptor → raw byte-consuming handle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::path::expand_user;

/// Permission bits for directories created on the way to a sink.
pub const DIR_MODE: u32 = 0o755;

enum Target {
    File(File),
    Stdout(io::Stdout),
    Stream(Box<dyn Write + Send>),
}

/// The innermost destination: a file, the stdout proxy, or a caller stream.
pub struct RawSink {
    label:  String,
    target: Option<Target>,
}

impl RawSink {
    pub fn stdout() -> Self {
        Self { label: "-".to_owned(), target: Some(Target::Stdout(io::stdout())) }
    }

    pub fn file(path: &Path, file: File) -> Self {
        Self { label: path.display().to_string(), target: Some(Target::File(file)) }
    }

    pub fn stream<W: Write + Send + 'static>(label: impl Into<String>, w: W) -> Self {
        Self { label: label.into(), target: Some(Target::Stream(Box::new(w))) }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.target.is_none()
    }

    /// Flush and release. Files are closed; stdout is only flushed. The
    /// target is let go even when the flush fails, and later writes fail.
    pub fn close(&mut self) -> io::Result<()> {
        let Some(target) = self.target.take() else {
            return Ok(());
        };
        match target {
            Target::File(mut f) => {
                f.flush()?;
                drop(f);
                debug!(sink = %self.label, "file closed");
            }
            Target::Stdout(mut s) => {
                s.flush()?;
                debug!(sink = %self.label, "stdout flushed");
            }
            Target::Stream(mut w) => {
                w.flush()?;
                debug!(sink = %self.label, "stream released");
            }
        }
        Ok(())
    }

    fn target_mut(&mut self) -> io::Result<&mut Target> {
        self.target.as_mut().ok_or_else(|| io::Error::other("sink is closed"))
    }
}

impl Write for RawSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.target_mut()? {
            Target::File(f)   => f.write(buf),
            Target::Stdout(s) => s.write(buf),
            Target::Stream(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.target_mut()? {
            Target::File(f)   => f.flush(),
            Target::Stdout(s) => s.flush(),
            Target::Stream(w) => w.flush(),
        }
    }
}

/// Options used by [`wopen`](crate::wopen): write, create, truncate.
pub fn default_open_options() -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    opts
}

/// Resolve `descriptor` for writing.
///
/// `-` is stdout. Anything else is a path (with `~` expanded) whose parent
/// directories are created when missing. If any existing ancestor is not a
/// directory the call fails before a file is opened.
pub fn resolve(descriptor: &str, options: &OpenOptions, mode: u32) -> Result<RawSink> {
    if descriptor == "-" {
        return Ok(RawSink::stdout());
    }
    let path = expand_user(descriptor)?;
    prepare_parent(&path)?;

    let mut opts = options.clone();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let file = opts
        .open(&path)
        .map_err(|source| Error::Create { path: path.clone(), source })?;
    debug!(sink = %path.display(), "opened for write");
    Ok(RawSink::file(&path, file))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _                                     => PathBuf::from("."),
    }
}

fn prepare_parent(path: &Path) -> Result<()> {
    let dir = parent_dir(path);
    for ancestor in dir.ancestors().filter(|a| !a.as_os_str().is_empty()) {
        match fs::metadata(ancestor) {
            Ok(meta) if meta.is_dir() => break,
            Ok(_)  => return Err(Error::NotADirectory { path: ancestor.to_path_buf() }),
            Err(_) => continue,
        }
    }
    if !dir.is_dir() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(DIR_MODE);
        }
        builder
            .create(&dir)
            .map_err(|source| Error::Create { path: dir.clone(), source })?;
        debug!(dir = %dir.display(), "created parent directories");
    }
    Ok(())
}
