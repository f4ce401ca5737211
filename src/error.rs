//! Classified errors for every open, read, write and close path.
//!
//! Callers are expected to branch on a few of these: [`Error::NoContent`]
//! is recoverable (an empty file is often valid), while
//! [`Error::IsDirectory`] and [`Error::StdinNotDetected`] are always fatal
//! for a read-open.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The stream ended before the requested bytes were available.
    #[error("xopen: no content")]
    NoContent,

    #[error("xopen: input is a directory: {}", path.display())]
    IsDirectory { path: PathBuf },

    #[error("xopen: stdin not detected")]
    StdinNotDetected,

    /// A path segment that must be a directory is occupied by something else.
    #[error("can not write file into a non-directory path: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("unknown user: {name}")]
    UnknownUser { name: String },

    #[error("{}: {source}", path.display())]
    Open {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Create {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source:  io::Error,
    },

    #[error("empty command in pipe descriptor")]
    EmptyCommand,

    #[cfg(feature = "http")]
    #[error("http error downloading {url}: {source}")]
    Http {
        url:    String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with anything other than 200 OK.
    #[error("http error downloading {url}. status: {status}")]
    HttpStatus { url: String, status: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Specialized `Result` type for xopen operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the distinguished empty-stream condition.
    pub fn is_no_content(&self) -> bool {
        matches!(self, Error::NoContent)
    }

    /// Recover a classified error that travelled through an `io::Error`
    /// (e.g. out of a `Read` impl).
    pub fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            match err.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(classified)) => *classified,
                Some(Err(other))     => Error::Io(io::Error::other(other)),
                None                 => Error::Io(io::Error::other("unknown error")),
            }
        } else {
            Error::Io(err)
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Io(source) => return io::Error::new(source.kind(), err),
            Error::Open { source, .. }
            | Error::Create { source, .. }
            | Error::Spawn { source, .. } => source.kind(),
            Error::NoContent => io::ErrorKind::UnexpectedEof,
            Error::IsDirectory { .. }
            | Error::NotADirectory { .. }
            | Error::StdinNotDetected
            | Error::EmptyCommand
            | Error::UnknownUser { .. } => io::ErrorKind::InvalidInput,
            #[cfg(feature = "http")]
            Error::Http { .. } => io::ErrorKind::Other,
            Error::HttpStatus { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
