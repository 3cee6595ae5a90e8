use std::io;

use byteorder::WriteBytesExt;
use bytes::Bytes;
use log::debug;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, Result};
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{SkeskVersion, StringToKey, Tag};

/// Symmetric-Key Encrypted Session Key Packet (SKESK), version 4
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-version-4-symmetric-key-enc>
///
/// Without an encrypted key the key derived from the passphrase is the
/// session key itself.
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct SymKeyEncryptedSessionKey {
    sym_algorithm: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    #[debug("{:?}", encrypted_key.as_ref().map(hex::encode))]
    encrypted_key: Option<Bytes>,
}

impl SymKeyEncryptedSessionKey {
    /// A packet that only announces how the session key is derived from the passphrase.
    pub fn new_derived(sym_algorithm: SymmetricKeyAlgorithm, s2k: StringToKey) -> Self {
        SymKeyEncryptedSessionKey {
            sym_algorithm,
            s2k,
            encrypted_key: None,
        }
    }

    /// Encrypt a session key to a passphrase as a Version 4 Symmetric Key Encrypted Session Key Packet.
    ///
    /// `alg` is used both to encrypt the session key and as the algorithm of
    /// the session key itself.
    pub fn encrypt_v4(
        passphrase: &[u8],
        session_key: &[u8],
        s2k: StringToKey,
        alg: SymmetricKeyAlgorithm,
    ) -> Result<Self> {
        ensure!(
            session_key.len() == alg.key_size(),
            "session key of {} bytes does not fit {}",
            session_key.len(),
            alg
        );
        debug!("encrypting session key with {} {:?}", alg, s2k.typ());

        let key = s2k.derive_key(passphrase, alg.key_size())?;

        let mut private_key = zeroize::Zeroizing::new(Vec::with_capacity(1 + session_key.len()));
        private_key.push(u8::from(alg));
        private_key.extend_from_slice(session_key);

        let iv = vec![0u8; alg.block_size()];
        let mut encrypted_key = private_key.to_vec();
        alg.encrypt_with_iv_regular(&key, &iv, &mut encrypted_key)?;

        Ok(SymKeyEncryptedSessionKey {
            sym_algorithm: alg,
            s2k,
            encrypted_key: Some(encrypted_key.into()),
        })
    }

    pub fn sym_algorithm(&self) -> SymmetricKeyAlgorithm {
        self.sym_algorithm
    }

    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }

    pub fn encrypted_key(&self) -> Option<&[u8]> {
        self.encrypted_key.as_deref()
    }

    pub fn version(&self) -> SkeskVersion {
        SkeskVersion::V4
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version().into())?;
        writer.write_u8(self.sym_algorithm.into())?;
        self.s2k.to_writer(writer)?;
        if let Some(ref key) = self.encrypted_key {
            writer.write_all(key)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = 1 + 1 + self.s2k.write_len();
        if let Some(ref key) = self.encrypted_key {
            sum += key.len();
        }
        sum
    }
}

impl PacketTrait for SymKeyEncryptedSessionKey {
    fn tag(&self) -> Tag {
        Tag::SymKeyEncryptedSessionKey
    }
}
