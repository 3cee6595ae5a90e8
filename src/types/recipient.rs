use derive_builder::Builder;
use num_bigint::BigUint;
use rsa::traits::PublicKeyParts;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::types::{CompressionAlgorithm, KeyId, MpiBytes};

/// Upper bound for accepted RSA moduli.
pub const MAX_RSA_KEY_SIZE: usize = 16384;

/// Version of the recipient's key, which changes the implicit algorithm preferences.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Default)]
pub enum KeyVersion {
    V2,
    V3,
    #[default]
    V4,
}

/// What a key may be used for.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct KeyFlags {
    pub certify: bool,
    pub sign: bool,
    pub encrypt_comms: bool,
    pub encrypt_storage: bool,
}

impl KeyFlags {
    pub fn encryption() -> Self {
        KeyFlags {
            encrypt_comms: true,
            encrypt_storage: true,
            ..Default::default()
        }
    }

    pub fn can_encrypt(&self) -> bool {
        self.encrypt_comms || self.encrypt_storage
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RsaPublicParams {
    pub key: rsa::RsaPublicKey,
}

impl RsaPublicParams {
    pub fn try_from_mpi(n: &MpiBytes, e: &MpiBytes) -> Result<Self> {
        let key = rsa::RsaPublicKey::new_with_max_size(
            BigUint::from(n),
            BigUint::from(e),
            MAX_RSA_KEY_SIZE,
        )?;

        Ok(RsaPublicParams { key })
    }

    pub fn n(&self) -> &BigUint {
        self.key.n()
    }

    pub fn e(&self) -> &BigUint {
        self.key.e()
    }
}

impl From<rsa::RsaPublicKey> for RsaPublicParams {
    fn from(key: rsa::RsaPublicKey) -> Self {
        RsaPublicParams { key }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ElgamalPublicParams {
    /// Elgamal prime p
    pub p: BigUint,
    /// Elgamal group generator g
    pub g: BigUint,
    /// Elgamal public key value y (= g**x mod p where x is secret)
    pub y: BigUint,
}

impl ElgamalPublicParams {
    pub fn try_from_mpi(p: &MpiBytes, g: &MpiBytes, y: &MpiBytes) -> Result<Self> {
        let params = ElgamalPublicParams {
            p: p.into(),
            g: g.into(),
            y: y.into(),
        };
        let one = BigUint::from(1u8);
        if params.p <= one || params.g <= one || params.y >= params.p || params.g >= params.p {
            return Err(Error::InvalidInput);
        }

        Ok(params)
    }
}

/// Represent the public parameters of the key algorithms we can encrypt to.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum PublicParams {
    RSA(RsaPublicParams),
    Elgamal(ElgamalPublicParams),
}

/// A resolved recipient: everything needed to encrypt a session key to it and
/// to take part in the algorithm negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "Error", validate = "Self::validate"))]
pub struct RecipientKey {
    pub key_id: KeyId,
    pub algorithm: PublicKeyAlgorithm,
    pub params: PublicParams,
    #[builder(default)]
    pub version: KeyVersion,
    #[builder(default = "KeyFlags::encryption()")]
    pub flags: KeyFlags,
    /// List of symmetric algorithms that indicate which algorithms the key holder prefers to use.
    #[builder(default)]
    pub preferred_symmetric_algorithms: Vec<SymmetricKeyAlgorithm>,
    /// List of compression algorithms that indicate which algorithms the key holder prefers to use.
    #[builder(default)]
    pub preferred_compression_algorithms: Vec<CompressionAlgorithm>,
    /// Whether the key holder's software can verify modification detection codes.
    #[builder(default)]
    pub supports_mdc: bool,
    #[builder(default)]
    pub user_ids: Vec<String>,
}

impl RecipientKeyBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        match (&self.algorithm, &self.params) {
            (Some(alg), Some(PublicParams::RSA(_))) if !alg.is_rsa() => {
                Err(format!("RSA parameters do not match algorithm {:?}", alg))
            }
            (Some(alg), Some(PublicParams::Elgamal(_))) if !alg.is_elgamal() => {
                Err(format!("Elgamal parameters do not match algorithm {:?}", alg))
            }
            _ => Ok(()),
        }
    }
}

impl RecipientKey {
    /// The primary user id, or the key id if there is none.
    pub fn display_name(&self) -> String {
        self.user_ids
            .first()
            .cloned()
            .unwrap_or_else(|| format!("[{}]", self.key_id))
    }

    /// Symmetric preferences including the ones every key of this version implies.
    pub fn effective_symmetric_preferences(&self) -> Vec<SymmetricKeyAlgorithm> {
        let mut prefs = self.preferred_symmetric_algorithms.clone();
        if self.version >= KeyVersion::V4 && !prefs.contains(&SymmetricKeyAlgorithm::TripleDES) {
            prefs.push(SymmetricKeyAlgorithm::TripleDES);
        }
        prefs
    }

    /// Compression preferences including the ones every key of this version implies.
    pub fn effective_compression_preferences(&self) -> Vec<CompressionAlgorithm> {
        let mut prefs = self.preferred_compression_algorithms.clone();
        if self.version >= KeyVersion::V4 && !prefs.contains(&CompressionAlgorithm::ZIP) {
            prefs.push(CompressionAlgorithm::ZIP);
        }
        prefs
    }
}

/// The ordered recipients of one encryption operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecipientList(Vec<RecipientKey>);

impl RecipientList {
    pub fn new(keys: Vec<RecipientKey>) -> Self {
        RecipientList(keys)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecipientKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&RecipientKey> {
        self.0.first()
    }
}

impl FromIterator<RecipientKey> for RecipientList {
    fn from_iter<T: IntoIterator<Item = RecipientKey>>(iter: T) -> Self {
        RecipientList(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RecipientList {
    type Item = &'a RecipientKey;
    type IntoIter = std::slice::Iter<'a, RecipientKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elgamal_params() -> PublicParams {
        PublicParams::Elgamal(ElgamalPublicParams {
            p: BigUint::from(23u32),
            g: BigUint::from(5u32),
            y: BigUint::from(8u32),
        })
    }

    #[test]
    fn builder_defaults() {
        let key = RecipientKeyBuilder::default()
            .key_id(KeyId::from([1u8; 8]))
            .algorithm(PublicKeyAlgorithm::Elgamal)
            .params(elgamal_params())
            .build()
            .unwrap();

        assert_eq!(key.version, KeyVersion::V4);
        assert!(key.flags.can_encrypt());
        assert!(!key.supports_mdc);
        assert_eq!(key.display_name(), "[0101010101010101]");
        assert_eq!(
            key.effective_symmetric_preferences(),
            vec![SymmetricKeyAlgorithm::TripleDES]
        );
        assert_eq!(
            key.effective_compression_preferences(),
            vec![CompressionAlgorithm::ZIP]
        );
    }

    #[test]
    fn builder_rejects_mismatched_params() {
        let err = RecipientKeyBuilder::default()
            .key_id(KeyId::from([1u8; 8]))
            .algorithm(PublicKeyAlgorithm::RSA)
            .params(elgamal_params())
            .build();
        assert!(err.is_err());

        let missing = RecipientKeyBuilder::default()
            .algorithm(PublicKeyAlgorithm::Elgamal)
            .params(elgamal_params())
            .build();
        assert!(missing.is_err());
    }

    #[test]
    fn v3_keys_have_no_implicit_preferences() {
        let key = RecipientKeyBuilder::default()
            .key_id(KeyId::from([2u8; 8]))
            .algorithm(PublicKeyAlgorithm::Elgamal)
            .params(elgamal_params())
            .version(KeyVersion::V3)
            .preferred_symmetric_algorithms(vec![SymmetricKeyAlgorithm::IDEA])
            .build()
            .unwrap();

        assert_eq!(
            key.effective_symmetric_preferences(),
            vec![SymmetricKeyAlgorithm::IDEA]
        );
        assert!(key.effective_compression_preferences().is_empty());
    }

    #[test]
    fn elgamal_params_are_checked() {
        let p = MpiBytes::from(BigUint::from(23u32));
        let g = MpiBytes::from(BigUint::from(5u32));
        let y = MpiBytes::from(BigUint::from(42u32));
        assert!(ElgamalPublicParams::try_from_mpi(&p, &g, &y).is_err());

        let y = MpiBytes::from(BigUint::from(8u32));
        assert!(ElgamalPublicParams::try_from_mpi(&p, &g, &y).is_ok());
    }
}
