//! Source resolver: descriptor → raw byte-producing handle.
//!
//! Every [`RawSource`] carries a [`Teardown`] flag set here, at resolve
//! time, saying whether the composite reader owns the underlying resource
//! (files, process pipes, HTTP bodies) or merely borrows it (stdin, streams
//! handed in by the caller).

use std::fs::File;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::path::{expand_user, is_stdin};

/// What to do with the underlying resource when the reader is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The resource belongs to this handle and is closed with it.
    Close,
    /// The resource is owned elsewhere; only our handle to it is dropped.
    Release,
}

/// The innermost, unwrapped transport.
///
/// Closed explicitly through [`RawSource::close`] or, failing that, when
/// dropped; teardown runs once either way.
pub struct RawSource {
    label:    String,
    reader:   Option<Box<dyn Read + Send>>,
    child:    Option<Child>,
    teardown: Teardown,
}

impl RawSource {
    pub fn owned<R: Read + Send + 'static>(label: impl Into<String>, reader: R) -> Self {
        Self::new(label.into(), Box::new(reader), None, Teardown::Close)
    }

    pub fn borrowed<R: Read + Send + 'static>(label: impl Into<String>, reader: R) -> Self {
        Self::new(label.into(), Box::new(reader), None, Teardown::Release)
    }

    fn process(label: String, child: Child, stdout: std::process::ChildStdout) -> Self {
        Self::new(label, Box::new(stdout), Some(child), Teardown::Close)
    }

    fn new(label: String, reader: Box<dyn Read + Send>, child: Option<Child>, teardown: Teardown) -> Self {
        Self { label, reader: Some(reader), child, teardown }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn teardown(&self) -> Teardown {
        self.teardown
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Drop our handle to the transport, then reap the child if any.
    ///
    /// The stream was moved in, so both teardown kinds drop it here. The
    /// flag records what that drop means: with `Close` it ends the
    /// resource (file, pipe, response body); with `Release` it only lets
    /// go of a handle whose resource lives on (stdin, a caller stream).
    /// A spawned process is reaped only if it has already exited; a
    /// still-running child is left running. Later calls are no-ops.
    pub fn close(&mut self) -> io::Result<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        drop(reader);
        match self.teardown {
            Teardown::Close   => debug!(source = %self.label, "raw source closed"),
            Teardown::Release => debug!(source = %self.label, "raw source released"),
        }
        if let Some(mut child) = self.child.take() {
            match child.try_wait()? {
                Some(status) => debug!(source = %self.label, %status, "subprocess exited"),
                None         => debug!(source = %self.label, pid = child.id(), "subprocess still running"),
            }
        }
        Ok(())
    }
}

impl Read for RawSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(r) => r.read(buf),
            None    => Err(io::Error::other("source is closed")),
        }
    }
}

impl Drop for RawSource {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(source = %self.label, error = %e, "error closing raw source");
        }
    }
}

impl std::fmt::Debug for RawSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSource")
            .field("label", &self.label)
            .field("teardown", &self.teardown)
            .field("child", &self.child.as_ref().map(Child::id))
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Resolve a parsed descriptor into an open raw source.
pub fn resolve(descriptor: &Descriptor) -> Result<RawSource> {
    match descriptor {
        Descriptor::Stdio                     => open_stdin(),
        Descriptor::Command { program, args } => spawn(program, args),
        Descriptor::Remote(url)               => fetch(url),
        Descriptor::Path(path)                => open_path(path),
    }
}

fn open_stdin() -> Result<RawSource> {
    if !is_stdin() {
        return Err(Error::StdinNotDetected);
    }
    Ok(RawSource::borrowed("-", io::stdin()))
}

fn spawn(program: &str, args: &[String]) -> Result<RawSource> {
    if program.is_empty() {
        return Err(Error::EmptyCommand);
    }
    let label = Descriptor::Command { program: program.to_owned(), args: args.to_vec() }.to_string();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| Error::Spawn { command: label.clone(), source })?;
    debug!(command = %label, pid = child.id(), "spawned subprocess");

    let stdout = child.stdout.take().ok_or_else(|| Error::Spawn {
        command: label.clone(),
        source:  io::Error::other("child stdout was not captured"),
    })?;
    Ok(RawSource::process(label, child, stdout))
}

#[cfg(feature = "http")]
fn fetch(url: &str) -> Result<RawSource> {
    // No client-side deadline.
    let client = reqwest::blocking::Client::builder()
        .timeout(None::<std::time::Duration>)
        .build()
        .map_err(|source| Error::Http { url: url.to_owned(), source })?;
    let response = client
        .get(url)
        .send()
        .map_err(|source| Error::Http { url: url.to_owned(), source })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(Error::HttpStatus { url: url.to_owned(), status: status.to_string() });
    }
    debug!(url, %status, "opened remote source");
    Ok(RawSource::owned(url, response))
}

#[cfg(not(feature = "http"))]
fn fetch(url: &str) -> Result<RawSource> {
    Err(Error::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{url}: built without the `http` feature"),
    )))
}

fn open_path(path: &str) -> Result<RawSource> {
    let expanded = expand_user(path)?;
    let meta = std::fs::metadata(&expanded)
        .map_err(|source| Error::Open { path: expanded.clone(), source })?;
    if meta.is_dir() {
        return Err(Error::IsDirectory { path: expanded });
    }
    let file = File::open(&expanded)
        .map_err(|source| Error::Open { path: expanded.clone(), source })?;
    Ok(RawSource::owned(expanded.display().to_string(), file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let d = Descriptor::parse(dir.path().to_str().unwrap());
        assert!(matches!(resolve(&d), Err(Error::IsDirectory { .. })));
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let d = Descriptor::parse(dir.path().join("nope").to_str().unwrap());
        match resolve(&d) {
            Err(Error::Open { source, .. }) => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn files_are_owned() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut src = resolve(&Descriptor::parse(file.path().to_str().unwrap())).unwrap();
        assert_eq!(src.teardown(), Teardown::Close);
        src.close().unwrap();
    }

    #[test]
    fn caller_streams_are_borrowed() {
        let src = RawSource::borrowed("mem", io::empty());
        assert_eq!(src.teardown(), Teardown::Release);
        assert_eq!(src.label(), "mem");
    }

    /// Empty stream that keeps a shared token alive while it exists.
    struct Held(std::sync::Arc<()>);

    impl Read for Held {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn close_lets_go_of_the_stream_once() {
        let token = std::sync::Arc::new(());
        let mut src = RawSource::borrowed("held", Held(token.clone()));
        assert_eq!(std::sync::Arc::strong_count(&token), 2);

        src.close().unwrap();
        assert!(src.is_closed());
        assert_eq!(std::sync::Arc::strong_count(&token), 1);
        src.close().unwrap();

        let mut buf = [0u8; 1];
        assert!(src.read(&mut buf).is_err());
    }

    #[test]
    fn dropping_an_open_source_tears_it_down() {
        let token = std::sync::Arc::new(());
        let src = RawSource::owned("held", Held(token.clone()));
        drop(src);
        assert_eq!(std::sync::Arc::strong_count(&token), 1);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(resolve(&Descriptor::parse("|  ")), Err(Error::EmptyCommand)));
    }

    #[test]
    fn unknown_program_fails_to_spawn() {
        let d = Descriptor::parse("|definitely-not-a-real-program-xq7 arg");
        match resolve(&d) {
            Err(Error::Spawn { command, .. }) => assert!(command.contains("xq7")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_stdout_is_the_source() {
        let mut src = resolve(&Descriptor::parse("|echo hello world")).unwrap();
        let mut out = String::new();
        src.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world\n");
        src.close().unwrap();
    }
}
