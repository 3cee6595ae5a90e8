use std::io::{self, Write};

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use log::debug;

use crate::errors::{unsupported_err, Result};
use crate::packet::PacketBodyWriter;
use crate::pipeline::{Filter, Teardown};
use crate::types::{CompressionAlgorithm, PacketHeaderVersion, Tag};

#[derive(derive_more::Debug)]
enum Compressor {
    Uncompressed(#[debug(skip)] Vec<u8>),
    Zip(#[debug(skip)] DeflateEncoder<Vec<u8>>),
    Zlib(#[debug(skip)] ZlibEncoder<Vec<u8>>),
    #[cfg(feature = "bzip2")]
    Bzip2(#[debug(skip)] bzip2::write::BzEncoder<Vec<u8>>),
}

impl Compressor {
    fn new(alg: CompressionAlgorithm) -> Result<Self> {
        let c = match alg {
            CompressionAlgorithm::Uncompressed => Compressor::Uncompressed(Vec::new()),
            CompressionAlgorithm::ZIP => {
                Compressor::Zip(DeflateEncoder::new(Vec::new(), Compression::default()))
            }
            CompressionAlgorithm::ZLIB => {
                Compressor::Zlib(ZlibEncoder::new(Vec::new(), Compression::default()))
            }
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2 => Compressor::Bzip2(bzip2::write::BzEncoder::new(
                Vec::new(),
                bzip2::Compression::default(),
            )),
            _ => unsupported_err!("compression algorithm {}", alg),
        };
        Ok(c)
    }

    /// Compresses `buf` and returns what the compressor produced so far.
    fn compress(&mut self, buf: &[u8]) -> io::Result<Vec<u8>> {
        let out = match self {
            Compressor::Uncompressed(out) => {
                out.extend_from_slice(buf);
                out
            }
            Compressor::Zip(enc) => {
                enc.write_all(buf)?;
                enc.get_mut()
            }
            Compressor::Zlib(enc) => {
                enc.write_all(buf)?;
                enc.get_mut()
            }
            #[cfg(feature = "bzip2")]
            Compressor::Bzip2(enc) => {
                enc.write_all(buf)?;
                enc.get_mut()
            }
        };
        Ok(std::mem::take(out))
    }

    fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Compressor::Uncompressed(out) => Ok(out),
            Compressor::Zip(enc) => enc.finish(),
            Compressor::Zlib(enc) => enc.finish(),
            #[cfg(feature = "bzip2")]
            Compressor::Bzip2(enc) => enc.finish(),
        }
    }
}

/// Wraps everything written into a Compressed Data Packet.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-compressed-data-packet-type>
///
/// The body length is never known, so new style headers use partial lengths
/// and old style headers an indeterminate length.
#[derive(derive_more::Debug)]
pub struct CompressFilter {
    alg: CompressionAlgorithm,
    compressor: Option<Compressor>,
    body: Option<PacketBodyWriter>,
    started: bool,
}

impl CompressFilter {
    pub fn new(alg: CompressionAlgorithm, version: PacketHeaderVersion, chunk_size: u32) -> Result<Self> {
        debug!("compress with {}", alg);
        let compressor = Compressor::new(alg)?;
        let body = PacketBodyWriter::for_length(version, Tag::CompressedData, None, chunk_size)?;

        Ok(CompressFilter {
            alg,
            compressor: Some(compressor),
            body: Some(body),
            started: false,
        })
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.alg
    }

    fn write_body(&mut self, downstream: &mut dyn io::Write, data: &[u8]) -> Result<()> {
        let Some(body) = self.body.as_mut() else {
            unsupported_err!("compress_filter already freed");
        };
        if !self.started {
            body.write(downstream, &[u8::from(self.alg)])?;
            self.started = true;
        }
        if !data.is_empty() {
            body.write(downstream, data)?;
        }
        Ok(())
    }
}

impl Filter for CompressFilter {
    fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()> {
        let Some(compressor) = self.compressor.as_mut() else {
            unsupported_err!("compress_filter already freed");
        };
        let out = compressor.compress(buf)?;
        self.write_body(downstream, &out)
    }

    fn free(&mut self, downstream: &mut dyn io::Write, teardown: Teardown) -> Result<()> {
        let compressor = self.compressor.take();
        if teardown == Teardown::Cancel {
            self.body = None;
            return Ok(());
        }

        if let Some(compressor) = compressor {
            let rest = compressor.finish()?;
            self.write_body(downstream, &rest)?;
        }
        if let Some(body) = self.body.take() {
            body.finish(downstream)?;
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "compress_filter"
    }
}
