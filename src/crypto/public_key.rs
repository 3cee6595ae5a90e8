use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, RngCore};

use crate::crypto::{elgamal, rsa};
use crate::errors::{unsupported_err, Result};
use crate::types::{PkeskBytes, PublicParams};

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    RSA = 1,
    /// DEPRECATED: RSA (Encrypt-Only)
    RSAEncrypt = 2,
    /// DEPRECATED: RSA (Sign-Only)
    RSASign = 3,
    /// Elgamal (Encrypt-Only)
    ElgamalEncrypt = 16,
    /// DSA (Digital Signature Algorithm)
    DSA = 17,
    /// Elliptic Curve: RFC-6637
    ECDH = 18,
    /// ECDSA: RFC-6637
    ECDSA = 19,
    /// DEPRECATED: Elgamal (Encrypt and Sign)
    Elgamal = 20,
    /// Reserved for Diffie-Hellman (X9.42, as defined for IETF-S/MIME)
    DiffieHellman = 21,
    /// EdDSA legacy format
    EdDSALegacy = 22,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    Unknown(u8),
}

impl PublicKeyAlgorithm {
    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt
        )
    }

    pub fn is_elgamal(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::ElgamalEncrypt | PublicKeyAlgorithm::Elgamal
        )
    }

    /// Can session keys be encrypted with this algorithm?
    pub fn can_encrypt(self) -> bool {
        self.is_rsa() || self.is_elgamal()
    }
}

impl std::fmt::Display for PublicKeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt => f.write_str("RSA"),
            PublicKeyAlgorithm::RSASign => f.write_str("RSA-S"),
            PublicKeyAlgorithm::ElgamalEncrypt => f.write_str("ELG-E"),
            PublicKeyAlgorithm::DSA => f.write_str("DSA"),
            PublicKeyAlgorithm::ECDH => f.write_str("ECDH"),
            PublicKeyAlgorithm::ECDSA => f.write_str("ECDSA"),
            PublicKeyAlgorithm::Elgamal => f.write_str("ELG"),
            PublicKeyAlgorithm::DiffieHellman => f.write_str("DH"),
            PublicKeyAlgorithm::EdDSALegacy => f.write_str("EDDSA"),
            PublicKeyAlgorithm::Unknown(v) => write!(f, "?{}", v),
        }
    }
}

/// Object safe combination of [`RngCore`] and [`CryptoRng`].
pub trait CryptoRngCore: RngCore + CryptoRng {}

impl<T: RngCore + CryptoRng> CryptoRngCore for T {}

/// The raw public key operation used to protect a session key frame.
///
/// The frame is the already padded integer in big endian encoding, the
/// transform only performs the modular arithmetic.
pub trait PublicKeyTransform {
    /// Size of the modulus in bits, the frame must be `(bits + 7) / 8` octets.
    fn key_bit_length(&self, alg: PublicKeyAlgorithm, params: &PublicParams) -> Result<usize>;

    fn encrypt(
        &self,
        alg: PublicKeyAlgorithm,
        frame: &[u8],
        params: &PublicParams,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<PkeskBytes>;
}

/// RSA and Elgamal on top of `num-bigint-dig`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardTransform;

impl PublicKeyTransform for StandardTransform {
    fn key_bit_length(&self, alg: PublicKeyAlgorithm, params: &PublicParams) -> Result<usize> {
        match (alg, params) {
            (alg, PublicParams::RSA(params)) if alg.is_rsa() => Ok(params.n().bits()),
            (alg, PublicParams::Elgamal(params)) if alg.is_elgamal() => Ok(params.p.bits()),
            _ => unsupported_err!("encryption with {:?}", alg),
        }
    }

    fn encrypt(
        &self,
        alg: PublicKeyAlgorithm,
        frame: &[u8],
        params: &PublicParams,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<PkeskBytes> {
        match (alg, params) {
            (alg, PublicParams::RSA(params)) if alg.is_rsa() => rsa::encrypt(params, frame),
            (alg, PublicParams::Elgamal(params)) if alg.is_elgamal() => {
                elgamal::encrypt(rng, params, frame)
            }
            _ => unsupported_err!("encryption with {:?}", alg),
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::types::ElgamalPublicParams;

    #[test]
    fn display_names() {
        assert_eq!(PublicKeyAlgorithm::RSA.to_string(), "RSA");
        assert_eq!(PublicKeyAlgorithm::ElgamalEncrypt.to_string(), "ELG-E");
        assert_eq!(PublicKeyAlgorithm::Unknown(99).to_string(), "?99");
    }

    #[test]
    fn transform_rejects_mismatch() {
        let params = PublicParams::Elgamal(ElgamalPublicParams {
            p: BigUint::from(23u32),
            g: BigUint::from(5u32),
            y: BigUint::from(8u32),
        });
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert!(StandardTransform
            .key_bit_length(PublicKeyAlgorithm::RSA, &params)
            .is_err());
        assert_eq!(
            StandardTransform
                .key_bit_length(PublicKeyAlgorithm::ElgamalEncrypt, &params)
                .unwrap(),
            5
        );
        assert!(StandardTransform
            .encrypt(PublicKeyAlgorithm::DSA, &[1], &params, &mut rng)
            .is_err());
    }

    proptest! {
        #[test]
        fn roundtrip_u8(alg: PublicKeyAlgorithm) {
            prop_assert_eq!(PublicKeyAlgorithm::from(u8::from(alg)), alg);
        }
    }
}
