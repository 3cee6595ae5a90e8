use std::io;

use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::sym::{StreamEncryptor, SymmetricKeyAlgorithm};
use crate::errors::{format_err, unsupported_err, Result};
use crate::packet::PacketBodyWriter;
use crate::pipeline::{Filter, Teardown};
use crate::types::{PacketHeaderVersion, Tag};

/// Version of the Sym. Encrypted Integrity Protected Data packet we write.
const SEIPD_VERSION: u8 = 1;

/// Encrypts everything written into an encrypted data packet.
///
/// With modification detection the output is a
/// Sym. Encrypted Integrity Protected Data packet (tag 18) which always uses
/// a new style header, otherwise a Symmetrically Encrypted Data packet (tag 9).
///
/// When the length of the plaintext is known upfront the packet gets a fixed
/// length, else it is framed according to the header version.
#[derive(derive_more::Debug)]
pub struct CipherFilter {
    alg: SymmetricKeyAlgorithm,
    encryptor: Option<StreamEncryptor>,
    body: Option<PacketBodyWriter>,
    started: bool,
}

impl CipherFilter {
    pub fn new<R: Rng + CryptoRng>(
        rng: R,
        alg: SymmetricKeyAlgorithm,
        key: &[u8],
        mdc: bool,
        datalen: Option<u32>,
        version: PacketHeaderVersion,
        chunk_size: u32,
    ) -> Result<Self> {
        if !alg.is_supported() {
            unsupported_err!("cipher algorithm {}", alg);
        }
        let encryptor = alg.stream_encryptor(rng, key, mdc)?;

        let (tag, version) = if mdc {
            (Tag::SymEncryptedProtectedData, PacketHeaderVersion::New)
        } else {
            (Tag::SymEncryptedData, version)
        };

        let body_len = match datalen {
            Some(len) => {
                let overhead = alg.encrypted_overhead(mdc) + usize::from(mdc);
                let total = u32::try_from(overhead)
                    .ok()
                    .and_then(|o| o.checked_add(len))
                    .ok_or_else(|| format_err!("encrypted packet of {} bytes is too large", len))?;
                Some(total)
            }
            None => None,
        };
        debug!("cipher {} {:?} len {:?}", alg, tag, body_len);

        let body = PacketBodyWriter::for_length(version, tag, body_len, chunk_size)?;

        Ok(CipherFilter {
            alg,
            encryptor: Some(encryptor),
            body: Some(body),
            started: false,
        })
    }

    pub fn algorithm(&self) -> SymmetricKeyAlgorithm {
        self.alg
    }

    fn start(&mut self, downstream: &mut dyn io::Write) -> Result<()> {
        if self.started {
            return Ok(());
        }
        let (Some(body), Some(encryptor)) = (self.body.as_mut(), self.encryptor.as_ref()) else {
            unsupported_err!("cipher_filter already freed");
        };
        if encryptor.is_protected() {
            body.write(downstream, &[SEIPD_VERSION])?;
        }
        body.write(downstream, encryptor.prefix())?;
        self.started = true;
        Ok(())
    }
}

impl Filter for CipherFilter {
    fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()> {
        self.start(downstream)?;
        let (Some(body), Some(encryptor)) = (self.body.as_mut(), self.encryptor.as_mut()) else {
            unsupported_err!("cipher_filter already freed");
        };

        let mut data = Zeroizing::new(buf.to_vec());
        encryptor.encrypt(&mut data);
        body.write(downstream, &data)?;
        Ok(())
    }

    fn free(&mut self, downstream: &mut dyn io::Write, teardown: Teardown) -> Result<()> {
        if teardown == Teardown::Cancel {
            self.encryptor = None;
            self.body = None;
            return Ok(());
        }

        self.start(downstream)?;
        let (Some(mut body), Some(encryptor)) = (self.body.take(), self.encryptor.take()) else {
            return Ok(());
        };
        if let Some(mdc) = encryptor.finish() {
            body.write(downstream, &mdc)?;
        }
        body.finish(downstream)
    }

    fn describe(&self) -> &'static str {
        "cipher_filter"
    }
}
