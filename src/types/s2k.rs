use std::io;

use byteorder::WriteBytesExt;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ensure, unsupported_err, Result};
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;
const DEFAULT_ITER_SALTED_COUNT: u8 = 224;

/// Available String-To-Key types
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-string-to-key-s2k-specifier>
#[derive(Debug, PartialEq, Eq, Copy, Clone, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum StringToKeyType {
    Simple = 0,
    Salted = 1,
    IteratedAndSalted = 3,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    Other(u8),
}

/// A String-To-Key specifier, describes how a passphrase is turned into key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringToKey {
    Simple {
        hash_alg: HashAlgorithm,
    },
    Salted {
        hash_alg: HashAlgorithm,
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash_alg: HashAlgorithm,
        salt: [u8; 8],
        /// Coded count, see [`StringToKey::decode_count`].
        count: u8,
    },
}

impl StringToKey {
    /// Iterated and salted SHA256 with the default count.
    pub fn new_default<R: CryptoRng + Rng>(rng: R) -> Self {
        StringToKey::new_iterated(rng, HashAlgorithm::default(), DEFAULT_ITER_SALTED_COUNT)
    }

    pub fn new_iterated<R: CryptoRng + Rng>(mut rng: R, hash_alg: HashAlgorithm, count: u8) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt[..]);

        StringToKey::IteratedAndSalted {
            hash_alg,
            salt,
            count,
        }
    }

    pub fn new_salted<R: CryptoRng + Rng>(mut rng: R, hash_alg: HashAlgorithm) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt[..]);

        StringToKey::Salted { hash_alg, salt }
    }

    /// Builds a specifier of the requested type, generating a fresh salt if one is needed.
    pub fn from_type<R: CryptoRng + Rng>(
        rng: R,
        typ: StringToKeyType,
        hash_alg: HashAlgorithm,
        count: u8,
    ) -> Result<Self> {
        match typ {
            StringToKeyType::Simple => Ok(StringToKey::Simple { hash_alg }),
            StringToKeyType::Salted => Ok(StringToKey::new_salted(rng, hash_alg)),
            StringToKeyType::IteratedAndSalted => Ok(StringToKey::new_iterated(rng, hash_alg, count)),
            StringToKeyType::Other(t) => unsupported_err!("s2k mode {}", t),
        }
    }

    pub fn typ(&self) -> StringToKeyType {
        match self {
            Self::Simple { .. } => StringToKeyType::Simple,
            Self::Salted { .. } => StringToKeyType::Salted,
            Self::IteratedAndSalted { .. } => StringToKeyType::IteratedAndSalted,
        }
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        match self {
            Self::Simple { hash_alg }
            | Self::Salted { hash_alg, .. }
            | Self::IteratedAndSalted { hash_alg, .. } => *hash_alg,
        }
    }

    pub fn salt(&self) -> Option<&[u8; 8]> {
        match self {
            Self::Simple { .. } => None,
            Self::Salted { salt, .. } | Self::IteratedAndSalted { salt, .. } => Some(salt),
        }
    }

    /// Converts a coded count into the count.
    /// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-iterated-and-salted-s2k>
    pub fn decode_count(c: u8) -> usize {
        ((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize
    }

    /// Derives `key_size` bytes of key material from the passphrase.
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let hash_alg = self.hash_alg();
        let Some(digest_size) = hash_alg.digest_size() else {
            unsupported_err!("s2k hash algorithm {:?}", hash_alg);
        };
        ensure!(key_size > 0, "can not derive an empty key");

        let rounds = key_size.div_ceil(digest_size);
        let mut key = Zeroizing::new(Vec::with_capacity(rounds * digest_size));
        let zeros = vec![0u8; rounds];

        for round in 0..rounds {
            let mut hasher = hash_alg.new_hasher()?;

            // preload with zeros for every round after the first
            hasher.update(&zeros[..round]);

            match self {
                Self::Simple { .. } => {
                    hasher.update(passphrase);
                }
                Self::Salted { salt, .. } => {
                    hasher.update(salt);
                    hasher.update(passphrase);
                }
                Self::IteratedAndSalted { salt, count, .. } => {
                    let data_size = salt.len() + passphrase.len();
                    // the whole salt and passphrase are hashed at least once
                    let mut remaining = Self::decode_count(*count).max(data_size);

                    while remaining > 0 {
                        let take = remaining.min(salt.len());
                        hasher.update(&salt[..take]);
                        remaining -= take;

                        let take = remaining.min(passphrase.len());
                        hasher.update(&passphrase[..take]);
                        remaining -= take;
                    }
                }
            }

            key.extend_from_slice(&hasher.finalize_reset());
        }

        key.truncate(key_size);
        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.typ().into())?;
        writer.write_u8(self.hash_alg().into())?;

        if let Some(salt) = self.salt() {
            writer.write_all(salt)?;
        }

        if let Self::IteratedAndSalted { count, .. } = self {
            writer.write_u8(*count)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            // 1 octet type, 1 octet hash algorithm.
            Self::Simple { .. } => 2,
            // Salted also has 8 octets salt value.
            Self::Salted { .. } => 10,
            // Salted and iterated also has 1 octet count.
            Self::IteratedAndSalted { .. } => 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn decode_count() {
        assert_eq!(StringToKey::decode_count(0), 1024);
        assert_eq!(StringToKey::decode_count(96), 65536);
        assert_eq!(StringToKey::decode_count(224), 16_777_216);
        assert_eq!(StringToKey::decode_count(255), 65_011_712);
    }

    #[test]
    fn simple_sha1_vector() {
        // SHA1("hello")
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Sha1,
        };
        let key = s2k.derive_key(b"hello", 16).unwrap();
        assert_eq!(hex::encode(&key[..]), "aaf4c61ddcc5e8a2dabede0f3b482cd9");
    }

    #[test]
    fn long_key_uses_multiple_rounds() {
        let s2k = StringToKey::Salted {
            hash_alg: HashAlgorithm::Sha1,
            salt: [1, 2, 3, 4, 5, 6, 7, 8],
        };
        let key = s2k.derive_key(b"secret", 32).unwrap();
        assert_eq!(key.len(), 32);

        // the second round is prefixed with a single zero byte
        let mut second = HashAlgorithm::Sha1.new_hasher().unwrap();
        second.update(&[0]);
        second.update(&[1, 2, 3, 4, 5, 6, 7, 8]);
        second.update(b"secret");
        assert_eq!(&key[20..], &second.finalize()[..12]);
    }

    #[test]
    fn iterated_hashes_count_bytes() {
        let salt = [9u8; 8];
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt,
            count: 0,
        };
        let key = s2k.derive_key(b"pw", 16).unwrap();

        let mut data = Vec::new();
        while data.len() < 1024 {
            data.extend_from_slice(&salt);
            data.extend_from_slice(b"pw");
        }
        data.truncate(1024);
        let expected = HashAlgorithm::Sha256.digest(&data).unwrap();
        assert_eq!(&key[..], &expected[..16]);
    }

    #[test]
    fn empty_key_is_rejected() {
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Sha256,
        };
        assert!(s2k.derive_key(b"x", 0).is_err());
    }

    #[test]
    fn serialize_iterated() {
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt: [0xAA; 8],
            count: 96,
        };
        let bytes = s2k.to_bytes().unwrap();
        assert_eq!(hex::encode(&bytes), "0308aaaaaaaaaaaaaaaa60");
        assert_eq!(bytes.len(), s2k.write_len());
    }

    proptest! {
        #[test]
        fn write_len(typ: StringToKeyType, seed: u64) {
            let rng = ChaCha8Rng::seed_from_u64(seed);
            let s2k = StringToKey::from_type(rng, typ, HashAlgorithm::Sha256, 96).unwrap();
            prop_assert_eq!(s2k.to_bytes().unwrap().len(), s2k.write_len());
            prop_assert_eq!(s2k.typ(), typ);
        }
    }
}
