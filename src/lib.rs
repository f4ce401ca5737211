//! Buffered readers and writers over files, stdin/stdout, subprocesses and
//! URLs, with transparent gzip, xz and zstd.
//!
//! ```no_run
//! use std::io::{BufRead, Write};
//!
//! // Read: the format is sniffed from the content, whatever the name says.
//! let reader = xopen::ropen("reads.fastq.gz")?;
//! for line in reader.lines() {
//!     println!("{}", line?);
//! }
//!
//! // Write: the format is chosen by suffix.
//! let mut w = xopen::wopen("out/counts.tsv.zst")?;
//! writeln!(w, "a\t1")?;
//! w.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Descriptors: `-` (stdin/stdout), `|cmd args` (subprocess stdout, read
//! only), `http://` and `https://` (read only), `~`/`~user` paths, plain
//! paths.

pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod path;
pub mod peek;
pub mod reader;
pub mod sink;
pub mod source;
pub mod writer;

pub use codec::{check_bytes, is_gzip, is_xz, is_zst, Format};
pub use config::{Config, DEFAULT_BUFFER_SIZE};
pub use descriptor::Descriptor;
pub use error::{Error, Result};
pub use path::{exists, expand_user, is_stdin};
pub use reader::{ropen, Reader};
pub use sink::RawSink;
pub use source::{RawSource, Teardown};
pub use writer::{wopen, wopen_file, Writer};
