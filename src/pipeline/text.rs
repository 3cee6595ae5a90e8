use std::io;

use crate::errors::Result;
use crate::pipeline::{Filter, Teardown};

/// Canonicalizes line endings to CRLF.
///
/// A lone CR and a lone LF both become CRLF, an existing CRLF is kept as is.
/// The state carries over between calls, so a CRLF split across two buffers
/// is recognized.
#[derive(Debug, Default)]
pub struct TextFilter {
    prev_cr: bool,
    /// The LF of a CRLF that did not fit the last read buffer.
    pending_lf: bool,
}

impl TextFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn canonicalize(&mut self, buf: &[u8], out: &mut Vec<u8>) {
        for &b in buf {
            match b {
                b'\r' => {
                    out.extend_from_slice(b"\r\n");
                    self.prev_cr = true;
                }
                b'\n' => {
                    if !self.prev_cr {
                        out.extend_from_slice(b"\r\n");
                    }
                    self.prev_cr = false;
                }
                b => {
                    out.push(b);
                    self.prev_cr = false;
                }
            }
        }
    }
}

impl Filter for TextFilter {
    fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()> {
        let mut out = Vec::with_capacity(buf.len() + buf.len() / 16 + 2);
        self.canonicalize(buf, &mut out);
        downstream.write_all(&out)?;
        Ok(())
    }

    fn underflow(&mut self, upstream: &mut dyn io::Read, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut n = 0;
        if self.pending_lf {
            buf[0] = b'\n';
            self.pending_lf = false;
            n = 1;
        }

        // every input byte expands to at most two output bytes
        let want = (buf.len() - n) / 2;
        if want == 0 {
            if n > 0 {
                return Ok(n);
            }
            // room for a single byte only
            let mut one = [0u8; 1];
            let read = upstream.read(&mut one)?;
            if read == 0 {
                return Ok(0);
            }
            let mut out = Vec::with_capacity(2);
            self.canonicalize(&one, &mut out);
            match out.len() {
                0 => return self.underflow(upstream, buf),
                1 => buf[0] = out[0],
                _ => {
                    buf[0] = out[0];
                    self.pending_lf = true;
                }
            }
            return Ok(1);
        }

        let mut raw = vec![0u8; want];
        loop {
            let read = upstream.read(&mut raw)?;
            if read == 0 {
                return Ok(n);
            }
            let mut out = Vec::with_capacity(read * 2);
            self.canonicalize(&raw[..read], &mut out);
            buf[n..n + out.len()].copy_from_slice(&out);
            n += out.len();
            // a chunk that was only the LF of a CRLF produces nothing
            if n > 0 {
                return Ok(n);
            }
        }
    }

    fn free(&mut self, _downstream: &mut dyn io::Write, _teardown: Teardown) -> Result<()> {
        self.prev_cr = false;
        self.pending_lf = false;
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "text_filter"
    }
}
