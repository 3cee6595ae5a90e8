use std::io;

use log::debug;
use zeroize::Zeroizing;

use crate::errors::{bail, ensure, Result};
use crate::types::{PacketHeaderVersion, PacketLength, Tag, MAX_PARTIAL_LEN, MIN_FIRST_PARTIAL_LEN};

/// The chunk size when generating partial packets
pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 512;

/// How the length of a packet body is stated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketFraming {
    /// The body length is known upfront.
    Fixed(u32),
    /// New style partial body lengths, using chunks of the given size.
    Partial(u32),
    /// Old style header without a length, the packet extends to the end of the data.
    Indeterminate,
}

impl PacketFraming {
    /// Picks the framing for a body of the given length.
    ///
    /// Unknown lengths use partial chunks with new style headers and an
    /// indeterminate length with old style headers.
    pub fn select(version: PacketHeaderVersion, len: Option<u32>, chunk_size: u32) -> Self {
        match (len, version) {
            (Some(len), _) => PacketFraming::Fixed(len),
            (None, PacketHeaderVersion::New) => PacketFraming::Partial(chunk_size),
            (None, PacketHeaderVersion::Old) => PacketFraming::Indeterminate,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, PacketFraming::Fixed(_))
    }
}

/// Checks that `chunk_size` can be used for partial body lengths.
pub(crate) fn check_chunk_size(chunk_size: u32) -> Result<()> {
    ensure!(
        chunk_size.is_power_of_two(),
        "partial chunk size {} is not a power of two",
        chunk_size
    );
    ensure!(
        (MIN_FIRST_PARTIAL_LEN..=MAX_PARTIAL_LEN).contains(&chunk_size),
        "partial chunk size {} must be between {} and {}",
        chunk_size,
        MIN_FIRST_PARTIAL_LEN,
        MAX_PARTIAL_LEN
    );
    Ok(())
}

/// Frames the body of a single packet while it is being streamed.
///
/// The writer does not own its output, every call gets the stream the
/// framed bytes go to. The header is written together with the first bytes.
#[derive(derive_more::Debug)]
pub struct PacketBodyWriter {
    version: PacketHeaderVersion,
    tag: Tag,
    framing: PacketFraming,
    header_written: bool,
    /// Bytes still expected for fixed framing.
    remaining: u32,
    /// Pending chunk for partial framing.
    #[debug("{} bytes", buffer.len())]
    buffer: Zeroizing<Vec<u8>>,
}

impl PacketBodyWriter {
    pub fn new(version: PacketHeaderVersion, tag: Tag, framing: PacketFraming) -> Result<Self> {
        debug!("packet body {:?} {:?} {:?}", version, tag, framing);

        let (remaining, buffer) = match framing {
            PacketFraming::Fixed(len) => (len, Vec::new()),
            PacketFraming::Partial(chunk_size) => {
                ensure!(
                    version == PacketHeaderVersion::New,
                    "partial lengths need a new style packet header"
                );
                check_chunk_size(chunk_size)?;
                (0, Vec::with_capacity(chunk_size as usize))
            }
            PacketFraming::Indeterminate => {
                ensure!(
                    version == PacketHeaderVersion::Old,
                    "indeterminate lengths need an old style packet header"
                );
                (0, Vec::new())
            }
        };

        Ok(PacketBodyWriter {
            version,
            tag,
            framing,
            header_written: false,
            remaining,
            buffer: Zeroizing::new(buffer),
        })
    }

    /// Creates a writer for a body of the given length, see [`PacketFraming::select`].
    pub fn for_length(
        version: PacketHeaderVersion,
        tag: Tag,
        len: Option<u32>,
        chunk_size: u32,
    ) -> Result<Self> {
        Self::new(version, tag, PacketFraming::select(version, len, chunk_size))
    }

    pub fn framing(&self) -> PacketFraming {
        self.framing
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn write(&mut self, out: &mut dyn io::Write, mut data: &[u8]) -> Result<()> {
        match self.framing {
            PacketFraming::Fixed(len) => {
                ensure!(
                    data.len() <= self.remaining as usize,
                    "{:?} body exceeds its declared length of {}",
                    self.tag,
                    len
                );
                self.ensure_header(out)?;
                out.write_all(data)?;
                // checked above
                self.remaining -= data.len() as u32;
            }
            PacketFraming::Indeterminate => {
                self.ensure_header(out)?;
                out.write_all(data)?;
            }
            PacketFraming::Partial(chunk_size) => {
                let chunk_size = chunk_size as usize;
                while !data.is_empty() {
                    if self.buffer.len() == chunk_size {
                        self.write_chunk(out, PacketLength::Partial(chunk_size as u32))?;
                    }
                    let take = (chunk_size - self.buffer.len()).min(data.len());
                    self.buffer.extend_from_slice(&data[..take]);
                    data = &data[take..];
                }
            }
        }
        Ok(())
    }

    /// Completes the packet. Partial framing writes the final chunk.
    pub fn finish(mut self, out: &mut dyn io::Write) -> Result<()> {
        match self.framing {
            PacketFraming::Fixed(_) => {
                if self.remaining != 0 {
                    bail!(
                        "{:?} body ended {} bytes short of its declared length",
                        self.tag,
                        self.remaining
                    );
                }
                self.ensure_header(out)?;
            }
            PacketFraming::Indeterminate => {
                self.ensure_header(out)?;
            }
            PacketFraming::Partial(_) => {
                let len = self.buffer.len().try_into()?;
                self.write_chunk(out, PacketLength::Fixed(len))?;
            }
        }
        Ok(())
    }

    fn ensure_header(&mut self, out: &mut dyn io::Write) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        match self.framing {
            PacketFraming::Fixed(len) => {
                self.version.write_header(out, self.tag, len as usize)?;
            }
            PacketFraming::Indeterminate | PacketFraming::Partial(_) => {
                self.version.write_open_header(out, self.tag)?;
            }
        }
        self.header_written = true;
        Ok(())
    }

    fn write_chunk(&mut self, out: &mut dyn io::Write, length: PacketLength) -> Result<()> {
        if self.header_written {
            length.to_writer_new(out)?;
        } else if let PacketLength::Fixed(len) = length {
            // everything fit into the first chunk
            self.version.write_header(out, self.tag, len as usize)?;
            self.header_written = true;
        } else {
            self.ensure_header(out)?;
            length.to_writer_new(out)?;
        }
        debug!("packet chunk {:?} {:?}", self.tag, length);

        out.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn framed(framing: PacketFraming, version: PacketHeaderVersion, data: &[u8], piece: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = PacketBodyWriter::new(version, Tag::LiteralData, framing).unwrap();
        for chunk in data.chunks(piece.max(1)) {
            writer.write(&mut out, chunk).unwrap();
        }
        writer.finish(&mut out).unwrap();
        out
    }

    /// Reassembles a new style packet body from partial chunks.
    fn unframe_partial(mut input: &[u8]) -> Vec<u8> {
        assert_eq!(input[0], 0xC0 | 11);
        input = &input[1..];
        let mut body = Vec::new();
        loop {
            let o = input[0];
            let (len, rest, last) = match o {
                0..=191 => (o as usize, &input[1..], true),
                192..=223 => (
                    ((o as usize - 192) << 8) + input[1] as usize + 192,
                    &input[2..],
                    true,
                ),
                224..=254 => (1usize << (o & 0x1F), &input[1..], false),
                255 => (
                    u32::from_be_bytes([input[1], input[2], input[3], input[4]]) as usize,
                    &input[5..],
                    true,
                ),
            };
            body.extend_from_slice(&rest[..len]);
            input = &rest[len..];
            if last {
                assert!(input.is_empty());
                return body;
            }
        }
    }

    #[test]
    fn fixed() {
        let out = framed(PacketFraming::Fixed(3), PacketHeaderVersion::New, b"abc", 1);
        assert_eq!(out, b"\xcb\x03abc");

        let out = framed(PacketFraming::Fixed(0), PacketHeaderVersion::Old, b"", 1);
        assert_eq!(out, [0xac, 0x00]);
    }

    #[test]
    fn fixed_length_is_enforced() {
        let mut out = Vec::new();
        let mut writer =
            PacketBodyWriter::new(PacketHeaderVersion::New, Tag::LiteralData, PacketFraming::Fixed(2))
                .unwrap();
        assert!(writer.write(&mut out, b"abc").is_err());
        writer.write(&mut out, b"a").unwrap();
        assert!(writer.finish(&mut out).is_err());
    }

    #[test]
    fn indeterminate() {
        let out = framed(
            PacketFraming::Indeterminate,
            PacketHeaderVersion::Old,
            b"hello",
            2,
        );
        assert_eq!(out, b"\xafhello");

        let out = framed(PacketFraming::Indeterminate, PacketHeaderVersion::Old, b"", 2);
        assert_eq!(out, [0xaf]);
    }

    #[test]
    fn partial_small_body_is_fixed() {
        let out = framed(PacketFraming::Partial(512), PacketHeaderVersion::New, &[7u8; 100], 33);
        assert_eq!(&out[..2], &[0xcb, 100]);
        assert_eq!(out.len(), 102);

        let out = framed(PacketFraming::Partial(512), PacketHeaderVersion::New, &[7u8; 512], 512);
        assert_eq!(&out[..3], &[0xcb, 0xc1, 0x40]);
        assert_eq!(out.len(), 3 + 512);
    }

    #[test]
    fn partial_chunks() {
        let data: Vec<u8> = (0..1500u32).map(|i| i as u8).collect();
        let out = framed(PacketFraming::Partial(512), PacketHeaderVersion::New, &data, 100);
        assert_eq!(&out[..2], &[0xcb, 224 + 9]);
        assert_eq!(out[2 + 512], 224 + 9);
        assert_eq!(unframe_partial(&out), data);
    }

    #[test]
    fn invalid_configurations() {
        assert!(PacketBodyWriter::new(
            PacketHeaderVersion::Old,
            Tag::LiteralData,
            PacketFraming::Partial(512)
        )
        .is_err());
        assert!(PacketBodyWriter::new(
            PacketHeaderVersion::New,
            Tag::LiteralData,
            PacketFraming::Partial(256)
        )
        .is_err());
        assert!(PacketBodyWriter::new(
            PacketHeaderVersion::New,
            Tag::LiteralData,
            PacketFraming::Partial(1000)
        )
        .is_err());
        assert!(PacketBodyWriter::new(
            PacketHeaderVersion::New,
            Tag::LiteralData,
            PacketFraming::Indeterminate
        )
        .is_err());
    }

    #[test]
    fn select() {
        assert_eq!(
            PacketFraming::select(PacketHeaderVersion::New, Some(5), 512),
            PacketFraming::Fixed(5)
        );
        assert_eq!(
            PacketFraming::select(PacketHeaderVersion::New, None, 1024),
            PacketFraming::Partial(1024)
        );
        assert_eq!(
            PacketFraming::select(PacketHeaderVersion::Old, None, 1024),
            PacketFraming::Indeterminate
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn partial_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..5000), piece in 1usize..2000) {
            let out = framed(PacketFraming::Partial(1024), PacketHeaderVersion::New, &data, piece);
            prop_assert_eq!(unframe_partial(&out), data);
        }
    }
}
