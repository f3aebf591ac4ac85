//! Buffered character source with one character of lookahead
//!
//! The scanner pulls fixed-size blocks from any `Read` and decodes UTF-8
//! one character at a time. `peek()` never consumes; `next()` consumes.
//! Both return `None` once the source is exhausted.

use sha2::{Digest, Sha256};
use std::io::{self, ErrorKind, Read};

/// Size of one refill block
pub const BLOCK_SIZE: usize = 4096;

pub struct Scanner<R> {
    source: R,
    buf: Vec<u8>,
    /// Read cursor into `buf`
    pos: usize,
    /// Number of valid bytes in `buf`
    filled: usize,
    peeked: Option<char>,
    eof: bool,
    hasher: Sha256,
}

impl<'a> Scanner<&'a [u8]> {
    /// Scan in-memory text
    pub fn from_str(text: &'a str) -> Self {
        Scanner::new(text.as_bytes())
    }
}

impl<R: Read> Scanner<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: vec![0; BLOCK_SIZE],
            pos: 0,
            filled: 0,
            peeked: None,
            eof: false,
            hasher: Sha256::new(),
        }
    }

    /// Consume and return the next character
    pub fn next(&mut self) -> io::Result<Option<char>> {
        if let Some(c) = self.peeked.take() {
            return Ok(Some(c));
        }
        self.read_char()
    }

    /// Return the next character without consuming it
    pub fn peek(&mut self) -> io::Result<Option<char>> {
        if self.peeked.is_none() {
            self.peeked = self.read_char()?;
        }
        Ok(self.peeked)
    }

    /// Hex SHA-256 of every byte pulled from the source so far
    pub fn digest(&self) -> String {
        format!("{:x}", self.hasher.clone().finalize())
    }

    fn read_char(&mut self) -> io::Result<Option<char>> {
        if self.pos == self.filled && self.fill()? == 0 {
            return Ok(None);
        }

        let width = utf8_width(self.buf[self.pos]);
        if width == 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("invalid UTF-8 lead byte 0x{:02x}", self.buf[self.pos]),
            ));
        }

        while self.filled - self.pos < width {
            if self.fill()? == 0 {
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    "truncated UTF-8 sequence at end of input",
                ));
            }
        }

        let bytes = &self.buf[self.pos..self.pos + width];
        let c = std::str::from_utf8(bytes)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?
            .chars()
            .next();
        self.pos += width;
        Ok(c)
    }

    /// Shift unread bytes to the front and read one more block.
    /// Returns the number of bytes read; 0 marks end of input.
    fn fill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }

        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }

        loop {
            match self.source.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(n) => {
                    self.hasher.update(&self.buf[self.filled..self.filled + n]);
                    self.filled += n;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => 0,
    }
}
