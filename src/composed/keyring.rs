use log::{debug, warn};
use zeroize::Zeroizing;

use crate::errors::{Error, Result};
use crate::types::{KeyId, Password, RecipientKey, RecipientList};

/// Source of the passphrase for symmetric encryption.
///
/// Returning `None` means no passphrase is available, e.g. a prompt was cancelled.
pub trait PassphraseProvider {
    fn obtain_passphrase(&self) -> Option<Zeroizing<Vec<u8>>>;
}

impl PassphraseProvider for Password {
    fn obtain_passphrase(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.read()
    }
}

impl<F> PassphraseProvider for F
where
    F: Fn() -> Option<Zeroizing<Vec<u8>>>,
{
    fn obtain_passphrase(&self) -> Option<Zeroizing<Vec<u8>>> {
        self()
    }
}

/// Resolves recipient names to public keys.
pub trait KeyDatabase {
    /// Looks up a key by id or user id.
    ///
    /// Fails with [`Error::KeyResolution`] if no usable key is found.
    fn lookup(&self, identifier: &str) -> Result<RecipientKey>;

    /// Resolves all `identifiers`, in order. Duplicate keys are only kept once.
    fn resolve(&self, identifiers: &[String]) -> Result<RecipientList> {
        let mut keys: Vec<RecipientKey> = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let key = self.lookup(identifier)?;
            if keys.iter().any(|k| k.key_id == key.key_id) {
                warn!("{}: skipped: public key already present", identifier);
                continue;
            }
            debug!("{} resolved to {}", identifier, key.key_id);
            keys.push(key);
        }
        if keys.is_empty() {
            return Err(Error::KeyResolution {
                identifier: String::new(),
                message: "no valid addressees".to_string(),
            });
        }
        Ok(RecipientList::new(keys))
    }
}

/// In memory key database.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: Vec<RecipientKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: RecipientKey) {
        self.keys.push(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn find(&self, identifier: &str) -> Option<&RecipientKey> {
        if let Some(id) = parse_key_id(identifier) {
            return self.keys.iter().find(|k| match id {
                KeyIdQuery::Long(id) => k.key_id == id,
                KeyIdQuery::Short(short) => k.key_id.as_ref()[4..] == short,
            });
        }

        let needle = identifier.to_lowercase();
        self.keys.iter().find(|k| {
            k.user_ids
                .iter()
                .any(|uid| uid.to_lowercase().contains(&needle))
        })
    }
}

impl FromIterator<RecipientKey> for Keyring {
    fn from_iter<T: IntoIterator<Item = RecipientKey>>(iter: T) -> Self {
        Keyring {
            keys: iter.into_iter().collect(),
        }
    }
}

impl KeyDatabase for Keyring {
    fn lookup(&self, identifier: &str) -> Result<RecipientKey> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(Error::KeyResolution {
                identifier: identifier.to_string(),
                message: "empty user id".to_string(),
            });
        }

        let key = self.find(identifier).ok_or_else(|| Error::KeyResolution {
            identifier: identifier.to_string(),
            message: "public key not found".to_string(),
        })?;

        if !key.algorithm.can_encrypt() || !key.flags.can_encrypt() {
            return Err(Error::KeyResolution {
                identifier: identifier.to_string(),
                message: format!("unusable public key ({})", key.algorithm),
            });
        }

        Ok(key.clone())
    }
}

#[derive(Clone, Copy)]
enum KeyIdQuery {
    Long(KeyId),
    Short([u8; 4]),
}

/// Parses `0x`-prefixed or bare hex key ids of 8 or 16 digits.
fn parse_key_id(identifier: &str) -> Option<KeyIdQuery> {
    let hex_part = identifier
        .strip_prefix("0x")
        .or_else(|| identifier.strip_prefix("0X"))
        .unwrap_or(identifier);
    if !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    match hex_part.len() {
        16 => {
            let mut id = [0u8; 8];
            hex::decode_to_slice(hex_part, &mut id).ok()?;
            Some(KeyIdQuery::Long(KeyId::from(id)))
        }
        8 => {
            let mut id = [0u8; 4];
            hex::decode_to_slice(hex_part, &mut id).ok()?;
            Some(KeyIdQuery::Short(id))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use num_bigint::BigUint;

    use super::*;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::types::{ElgamalPublicParams, KeyFlags, PublicParams, RecipientKeyBuilder};

    fn key(id: u8, uid: &str, algorithm: PublicKeyAlgorithm) -> RecipientKey {
        RecipientKeyBuilder::default()
            .key_id(KeyId::from([0xA0, 0, 0, 0, 0xB0, 0, 0, id]))
            .algorithm(algorithm)
            .params(PublicParams::Elgamal(ElgamalPublicParams {
                p: BigUint::from(23u32),
                g: BigUint::from(5u32),
                y: BigUint::from(8u32),
            }))
            .user_ids(vec![uid.to_string()])
            .build()
            .unwrap()
    }

    fn keyring() -> Keyring {
        [
            key(1, "Alice <alice@example.org>", PublicKeyAlgorithm::ElgamalEncrypt),
            key(2, "Bob <bob@example.org>", PublicKeyAlgorithm::Elgamal),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn lookup_by_user_id() {
        let ring = keyring();
        assert_eq!(ring.len(), 2);
        let k = ring.lookup("BOB@example").unwrap();
        assert_eq!(k.key_id.as_ref()[7], 2);
    }

    #[test]
    fn lookup_by_key_id() {
        let ring = keyring();
        let k = ring.lookup("0xA0000000B0000001").unwrap();
        assert_eq!(k.key_id.as_ref()[7], 1);
        let k = ring.lookup("b0000002").unwrap();
        assert_eq!(k.key_id.as_ref()[7], 2);
    }

    #[test]
    fn lookup_failures() {
        let ring = keyring();
        let err = ring.lookup("carol").unwrap_err();
        assert!(matches!(err, Error::KeyResolution { .. }));
        assert_eq!(err.to_string(), "carol: skipped: public key not found");
        assert!(ring.lookup("  ").is_err());
    }

    #[test]
    fn unusable_keys_are_rejected() {
        let mut ring = keyring();
        let mut signing_only = key(3, "Dave", PublicKeyAlgorithm::Elgamal);
        signing_only.flags = KeyFlags {
            sign: true,
            ..Default::default()
        };
        ring.add(signing_only);
        let err = ring.lookup("dave").unwrap_err();
        assert!(err.to_string().contains("unusable public key"), "{}", err);
    }

    #[test]
    fn resolve_dedups() {
        let ring = keyring();
        let list = ring
            .resolve(&["alice".to_string(), "bob".to_string(), "Alice".to_string()])
            .unwrap();
        assert_eq!(list.len(), 2);

        assert!(ring.resolve(&[]).is_err());
        assert!(ring.resolve(&["alice".to_string(), "nobody".to_string()]).is_err());
    }

    #[test]
    fn passphrase_providers() {
        let pw = Password::from("secret");
        assert_eq!(pw.obtain_passphrase().unwrap().as_slice(), b"secret");

        let cancelled = || -> Option<Zeroizing<Vec<u8>>> { None };
        assert!(cancelled.obtain_passphrase().is_none());
    }
}
