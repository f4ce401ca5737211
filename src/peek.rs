//! Buffered reader with a non-consuming multi-byte `peek`.
//!
//! `std::io::BufReader` only refills once its buffer is drained, so it can
//! hand back fewer bytes than a signature needs when the underlying stream
//! delivers in small pieces (pipes, chunked HTTP bodies, decoders). Unlike
//! `BufReader`, [`PeekReader::peek`] keeps reading until the requested
//! number of bytes is buffered or the stream ends.

use std::io::{self, BufRead, Read};

pub struct PeekReader<R: Read> {
    inner:  R,
    buf:    Box<[u8]>,
    pos:    usize,
    filled: usize,
}

impl<R: Read> PeekReader<R> {
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner,
            buf:    vec![0u8; capacity.max(1)].into_boxed_slice(),
            pos:    0,
            filled: 0,
        }
    }

    /// Unwrap the inner reader. Buffered bytes are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    /// Return up to `n` upcoming bytes without consuming them.
    ///
    /// The slice is shorter than `n` only when the stream ended first.
    /// `n` must not exceed the buffer capacity.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if n > self.buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("peek of {n} bytes exceeds buffer capacity {}", self.buf.len()),
            ));
        }
        if self.buffered() < n && self.pos + n > self.buf.len() {
            // Slide the unread tail to the front to make room.
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }
        while self.buffered() < n {
            match self.inner.read(&mut self.buf[self.filled..]) {
                Ok(0) => break,
                Ok(k) => self.filled += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let end = self.filled.min(self.pos + n);
        Ok(&self.buf[self.pos..end])
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        // Large reads with nothing buffered go straight through.
        if self.buffered() == 0 && out.len() >= self.buf.len() {
            return self.inner.read(out);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for PeekReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            let n = loop {
                match self.inner.read(&mut self.buf) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other?,
                }
            };
            self.pos = 0;
            self.filled = n;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out one byte per read call.
    struct Trickle(Vec<u8>, usize);

    impl Read for Trickle {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.1 >= self.0.len() || out.is_empty() {
                return Ok(0);
            }
            out[0] = self.0[self.1];
            self.1 += 1;
            Ok(1)
        }
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = PeekReader::with_capacity(16, &b"hello world"[..]);
        assert_eq!(r.peek(5).unwrap(), b"hello");
        assert_eq!(r.peek(2).unwrap(), b"he");
        let mut s = String::new();
        r.read_to_string(&mut s).unwrap();
        assert_eq!(s, "hello world");
    }

    #[test]
    fn peek_accumulates_across_short_reads() {
        let mut r = PeekReader::with_capacity(8, Trickle(b"\xfd7zXZ\x00rest".to_vec(), 0));
        assert_eq!(r.peek(6).unwrap(), b"\xfd7zXZ\x00");
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"\xfd7zXZ\x00rest");
    }

    #[test]
    fn peek_short_at_eof() {
        let mut r = PeekReader::with_capacity(8, &b"ab"[..]);
        assert_eq!(r.peek(4).unwrap(), b"ab");
        let mut empty = PeekReader::with_capacity(8, &b""[..]);
        assert!(empty.peek(2).unwrap().is_empty());
    }

    #[test]
    fn peek_compacts_near_end_of_buffer() {
        let mut r = PeekReader::with_capacity(4, &b"abcdefgh"[..]);
        let mut head = [0u8; 3];
        r.read_exact(&mut head).unwrap();
        assert_eq!(r.peek(3).unwrap(), b"def");
    }

    #[test]
    fn peek_larger_than_capacity_is_rejected() {
        let mut r = PeekReader::with_capacity(2, &b"abc"[..]);
        assert_eq!(r.peek(3).unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }
}
