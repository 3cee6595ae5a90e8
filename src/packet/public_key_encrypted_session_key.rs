use std::io;

use byteorder::WriteBytesExt;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{KeyId, PkeskBytes, PkeskVersion, Tag};

/// Public Key Encrypted Session Key Packet (PKESK), version 3
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-public-key-encrypted-sessio>
///
/// Holds the session key frame after it went through the recipient's public
/// key operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    id: KeyId,
    pk_algo: PublicKeyAlgorithm,
    values: PkeskBytes,
}

impl PublicKeyEncryptedSessionKey {
    pub fn from_parts(id: KeyId, pk_algo: PublicKeyAlgorithm, values: PkeskBytes) -> Self {
        PublicKeyEncryptedSessionKey {
            id,
            pk_algo,
            values,
        }
    }

    /// The Key ID in this PKESK.
    ///
    /// The Key ID consists of all zero bytes for anonymous recipients.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    /// The raw encrypted session key data inside this PKESK.
    pub fn values(&self) -> &PkeskBytes {
        &self.values
    }

    pub fn version(&self) -> PkeskVersion {
        PkeskVersion::V3
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version().into())?;
        writer.write_all(self.id.as_ref())?;
        writer.write_u8(self.pk_algo.into())?;
        self.values.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 8 + 1 + self.values.write_len()
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn tag(&self) -> Tag {
        Tag::PublicKeyEncryptedSessionKey
    }
}
