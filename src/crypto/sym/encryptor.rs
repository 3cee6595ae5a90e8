use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::BufEncryptor;
use cipher::{BlockCipher, BlockEncryptMut};
use des::TdesEde3;
use idea::Idea;
use log::debug;
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};
use twofish::Twofish;
use zeroize::Zeroizing;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, unsupported_err, Result};

/// MDC is 1 byte packet tag, 1 byte length prefix and 20 bytes SHA1 hash.
pub const MDC_LEN: usize = 22;

const MDC_HEADER: [u8; 2] = [0xD3, 0x14];

/// Plain CFB over any of the supported block ciphers, keeping its state
/// between calls so data can be encrypted in arbitrary pieces.
#[derive(derive_more::Debug)]
pub enum CfbEncryptor {
    Idea(#[debug("BufEncryptor")] BufEncryptor<Idea>),
    TripleDes(#[debug("BufEncryptor")] BufEncryptor<TdesEde3>),
    Cast5(#[debug("BufEncryptor")] BufEncryptor<Cast5>),
    Blowfish(#[debug("BufEncryptor")] BufEncryptor<Blowfish>),
    Aes128(#[debug("BufEncryptor")] BufEncryptor<Aes128>),
    Aes192(#[debug("BufEncryptor")] BufEncryptor<Aes192>),
    Aes256(#[debug("BufEncryptor")] BufEncryptor<Aes256>),
    Twofish(#[debug("BufEncryptor")] BufEncryptor<Twofish>),
    Camellia128(#[debug("BufEncryptor")] BufEncryptor<Camellia128>),
    Camellia192(#[debug("BufEncryptor")] BufEncryptor<Camellia192>),
    Camellia256(#[debug("BufEncryptor")] BufEncryptor<Camellia256>),
}

fn buf_encryptor<M>(key: &[u8], iv: &[u8]) -> Result<BufEncryptor<M>>
where
    M: BlockEncryptMut + BlockCipher,
    BufEncryptor<M>: KeyIvInit,
{
    Ok(BufEncryptor::<M>::new_from_slices(key, iv)?)
}

impl CfbEncryptor {
    pub fn new(alg: SymmetricKeyAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let enc = match alg {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => CfbEncryptor::Idea(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::TripleDES => CfbEncryptor::TripleDes(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::CAST5 => CfbEncryptor::Cast5(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::Blowfish => CfbEncryptor::Blowfish(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::AES128 => CfbEncryptor::Aes128(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::AES192 => CfbEncryptor::Aes192(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::AES256 => CfbEncryptor::Aes256(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::Twofish => CfbEncryptor::Twofish(buf_encryptor(key, iv)?),
            SymmetricKeyAlgorithm::Camellia128 => {
                CfbEncryptor::Camellia128(buf_encryptor(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia192 => {
                CfbEncryptor::Camellia192(buf_encryptor(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia256 => {
                CfbEncryptor::Camellia256(buf_encryptor(key, iv)?)
            }
            SymmetricKeyAlgorithm::Private10 | SymmetricKeyAlgorithm::Other(_) => {
                unsupported_err!("SymmetricKeyAlgorithm {:?}", alg)
            }
        };
        Ok(enc)
    }

    /// Encrypts `data` in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        match self {
            Self::Idea(ref mut i) => i.encrypt(data),
            Self::TripleDes(ref mut i) => i.encrypt(data),
            Self::Cast5(ref mut i) => i.encrypt(data),
            Self::Blowfish(ref mut i) => i.encrypt(data),
            Self::Aes128(ref mut i) => i.encrypt(data),
            Self::Aes192(ref mut i) => i.encrypt(data),
            Self::Aes256(ref mut i) => i.encrypt(data),
            Self::Twofish(ref mut i) => i.encrypt(data),
            Self::Camellia128(ref mut i) => i.encrypt(data),
            Self::Camellia192(ref mut i) => i.encrypt(data),
            Self::Camellia256(ref mut i) => i.encrypt(data),
        }
    }
}

/// OpenPGP CFB encryption of a data stream.
///
/// Construction yields the encrypted random prefix, after that plaintext is
/// encrypted piece by piece with [`StreamEncryptor::encrypt`] and the trailer
/// (the encrypted MDC packet for protected streams) is produced by
/// [`StreamEncryptor::finish`].
#[derive(derive_more::Debug)]
pub struct StreamEncryptor {
    encryptor: CfbEncryptor,
    /// Running MDC over the plaintext, only set for protected streams.
    #[debug("{}", if hasher.is_some() { "Sha1" } else { "none" })]
    hasher: Option<Sha1>,
    #[debug("{}", hex::encode(&prefix[..]))]
    prefix: Vec<u8>,
}

impl StreamEncryptor {
    pub fn new<R: Rng + CryptoRng>(
        mut rng: R,
        alg: SymmetricKeyAlgorithm,
        key: &[u8],
        protected: bool,
    ) -> Result<Self> {
        debug!("encrypt stream {:?} protected: {}", alg, protected);

        let bs = alg.block_size();
        if bs == 0 {
            unsupported_err!("SymmetricKeyAlgorithm {:?}", alg);
        }
        let mut prefix = Zeroizing::new(vec![0u8; bs + 2]);

        // prefix
        rng.fill_bytes(&mut prefix[..bs]);

        // add quick check
        prefix[bs] = prefix[bs - 2];
        prefix[bs + 1] = prefix[bs - 1];

        // IV is all zeroes
        let iv_vec = vec![0u8; bs];
        let mut encryptor = CfbEncryptor::new(alg, key, &iv_vec)?;

        let mut encrypted_prefix = prefix.to_vec();

        let hasher = if protected {
            // checksum over unencrypted data
            let mut hasher = Sha1::default();
            hasher.update(&prefix[..]);
            encryptor.encrypt(&mut encrypted_prefix);
            Some(hasher)
        } else {
            encryptor.encrypt(&mut encrypted_prefix);
            // resync
            encryptor = CfbEncryptor::new(alg, key, &encrypted_prefix[2..])?;
            None
        };

        Ok(StreamEncryptor {
            encryptor,
            hasher,
            prefix: encrypted_prefix,
        })
    }

    /// The encrypted random prefix, to be written before any data.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn is_protected(&self) -> bool {
        self.hasher.is_some()
    }

    /// Encrypts `data` in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        if let Some(ref mut hasher) = self.hasher {
            hasher.update(&*data);
        }
        self.encryptor.encrypt(data);
    }

    /// Returns the encrypted MDC packet for protected streams.
    pub fn finish(self) -> Option<[u8; MDC_LEN]> {
        let Self {
            mut encryptor,
            hasher,
            ..
        } = self;

        hasher.map(|mut hasher| {
            hasher.update(MDC_HEADER);

            let mut mdc = [0u8; MDC_LEN];
            mdc[..2].copy_from_slice(&MDC_HEADER);
            mdc[2..].copy_from_slice(&hasher.finalize()[..20]);

            encryptor.encrypt(&mut mdc[..]);
            mdc
        })
    }
}

#[cfg(test)]
mod tests {
    use cfb_mode::cipher::AsyncStreamCipher;
    use cfb_mode::Decryptor;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn decrypt_aes128(key: &[u8], iv: &[u8], data: &mut [u8]) {
        Decryptor::<Aes128>::new_from_slices(key, iv)
            .unwrap()
            .decrypt(data);
    }

    fn wiped_on_drop<T: zeroize::ZeroizeOnDrop>() {}

    #[test]
    fn key_schedules_are_wiped_on_drop() {
        wiped_on_drop::<Idea>();
        wiped_on_drop::<TdesEde3>();
        wiped_on_drop::<Cast5>();
        wiped_on_drop::<Blowfish>();
        wiped_on_drop::<Aes128>();
        wiped_on_drop::<Aes192>();
        wiped_on_drop::<Aes256>();
        wiped_on_drop::<Twofish>();
        wiped_on_drop::<Camellia128>();
        wiped_on_drop::<Camellia256>();
        wiped_on_drop::<BufEncryptor<Aes128>>();
    }

    #[test]
    fn protected_stream_in_pieces() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let key = [3u8; 16];
        let plaintext = b"hello world, this is a somewhat longer message".to_vec();

        let mut enc =
            StreamEncryptor::new(&mut rng, SymmetricKeyAlgorithm::AES128, &key, true).unwrap();
        let mut out = enc.prefix().to_vec();
        for chunk in plaintext.chunks(7) {
            let mut chunk = chunk.to_vec();
            enc.encrypt(&mut chunk);
            out.extend_from_slice(&chunk);
        }
        out.extend_from_slice(&enc.finish().unwrap());

        assert_eq!(out.len(), 18 + plaintext.len() + MDC_LEN);

        decrypt_aes128(&key, &[0u8; 16], &mut out);
        assert_eq!(out[14..16], out[16..18]);
        assert_eq!(&out[18..18 + plaintext.len()], &plaintext[..]);

        let mdc_start = out.len() - MDC_LEN;
        assert_eq!(out[mdc_start..mdc_start + 2], MDC_HEADER);
        let expected = Sha1::digest(&out[..mdc_start + 2]);
        assert_eq!(&out[mdc_start + 2..], &expected[..]);
    }

    #[test]
    fn unprotected_stream_resyncs() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key = [9u8; 16];
        let plaintext = b"resync me".to_vec();

        let mut enc =
            StreamEncryptor::new(&mut rng, SymmetricKeyAlgorithm::AES128, &key, false).unwrap();
        let prefix = enc.prefix().to_vec();
        let mut data = plaintext.clone();
        enc.encrypt(&mut data);
        assert!(enc.finish().is_none());

        let mut p = prefix.clone();
        decrypt_aes128(&key, &[0u8; 16], &mut p);
        assert_eq!(p[14..16], p[16..18]);

        decrypt_aes128(&key, &prefix[2..], &mut data);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn rejects_unknown_cipher() {
        let rng = ChaCha8Rng::seed_from_u64(1);
        assert!(StreamEncryptor::new(rng, SymmetricKeyAlgorithm::Other(99), &[0u8; 16], true).is_err());
    }
}
