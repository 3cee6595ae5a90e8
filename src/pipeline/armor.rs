use std::hash::Hasher;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::{general_purpose, Engine as _, GeneralPurpose};
use base64::write::EncoderWriter;
use crc24::Crc24Hasher;

use crate::errors::{bail, Result};
use crate::pipeline::{Filter, Teardown};

/// Characters per line of base64 output.
const LINE_LEN: usize = 64;

/// Armor block types.
#[derive(Debug, PartialEq, Eq, Clone, Copy, derive_more::Display)]
pub enum BlockType {
    #[display("PGP MESSAGE")]
    Message,
}

/// Breaks base64 output into lines, collecting them for the filter to pass on.
#[derive(Debug)]
struct LineWrapper {
    lines: Arc<Mutex<Vec<u8>>>,
    /// Characters in the current output line.
    column: usize,
}

impl Write for LineWrapper {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rest = buf;
        while !rest.is_empty() {
            let take = (LINE_LEN - self.column).min(rest.len());
            lines.extend_from_slice(&rest[..take]);
            self.column += take;
            rest = &rest[take..];
            if self.column == LINE_LEN {
                lines.push(b'\n');
                self.column = 0;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// ASCII armor encoding, see <https://www.rfc-editor.org/rfc/rfc9580.html#name-forming-ascii-armor>
///
/// The header line is written with the first data. The base64 encoder holds
/// back at most two input bytes, everything else goes downstream right away.
#[derive(derive_more::Debug)]
pub struct ArmorFilter {
    typ: BlockType,
    comments: Vec<String>,
    header_written: bool,
    #[debug(skip)]
    encoder: Option<EncoderWriter<'static, GeneralPurpose, LineWrapper>>,
    #[debug(skip)]
    lines: Arc<Mutex<Vec<u8>>>,
    #[debug(skip)]
    crc: Crc24Hasher,
    done: bool,
}

impl ArmorFilter {
    pub fn new(typ: BlockType, comments: Vec<String>) -> Self {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let wrapper = LineWrapper {
            lines: lines.clone(),
            column: 0,
        };
        ArmorFilter {
            typ,
            comments,
            header_written: false,
            encoder: Some(EncoderWriter::new(wrapper, &general_purpose::STANDARD)),
            lines,
            crc: Crc24Hasher::new(),
            done: false,
        }
    }

    fn write_header(&mut self, out: &mut Vec<u8>) {
        if self.header_written {
            return;
        }
        out.extend_from_slice(format!("-----BEGIN {}-----\n", self.typ).as_bytes());
        for comment in &self.comments {
            // a comment may not span lines
            for line in comment.lines().filter(|l| !l.trim().is_empty()) {
                out.extend_from_slice(b"Comment: ");
                out.extend_from_slice(line.trim_end().as_bytes());
                out.push(b'\n');
            }
        }
        out.push(b'\n');
        self.header_written = true;
    }

    /// Moves the lines produced so far to `out`.
    fn drain_lines(&self, out: &mut Vec<u8>) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        out.append(&mut lines);
    }
}

impl Filter for ArmorFilter {
    fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()> {
        let mut out = Vec::with_capacity(buf.len() * 4 / 3 + buf.len() / 48 + 64);
        self.write_header(&mut out);
        self.crc.write(buf);

        match self.encoder {
            Some(ref mut encoder) => encoder.write_all(buf)?,
            None => bail!("armor_filter already freed"),
        }
        self.drain_lines(&mut out);

        downstream.write_all(&out)?;
        Ok(())
    }

    fn free(&mut self, downstream: &mut dyn io::Write, teardown: Teardown) -> Result<()> {
        if self.done || teardown == Teardown::Cancel {
            self.done = true;
            self.encoder = None;
            self.lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            return Ok(());
        }
        self.done = true;

        let mut out = Vec::with_capacity(128);
        self.write_header(&mut out);
        if let Some(mut encoder) = self.encoder.take() {
            let wrapper = encoder.finish()?;
            self.drain_lines(&mut out);
            if wrapper.column > 0 {
                out.push(b'\n');
            }
        }

        let crc = self.crc.finish() as u32;
        let crc_buf = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];
        out.push(b'=');
        out.extend_from_slice(general_purpose::STANDARD.encode(crc_buf).as_bytes());
        out.push(b'\n');

        out.extend_from_slice(format!("-----END {}-----\n", self.typ).as_bytes());
        downstream.write_all(&out)?;
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "armor_filter"
    }
}
