//! Creation, negotiation and per recipient encoding of the data encryption key.

use log::{debug, warn};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::composed::PassphraseProvider;
use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyTransform;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, ensure, unsupported_err, Error, Result};
use crate::packet::{PublicKeyEncryptedSessionKey, SymKeyEncryptedSessionKey};
use crate::types::{CompressionAlgorithm, KeyId, RecipientKey, RecipientList, StringToKey};

/// Cipher used when the recipients have no algorithm in common.
pub const FALLBACK_CIPHER: SymmetricKeyAlgorithm = SymmetricKeyAlgorithm::TripleDES;

/// Minimum number of random padding octets in a PKCS#1 v1.5 frame.
const MIN_PADDING: usize = 8;

/// The data encryption key (DEK) of one message.
#[derive(derive_more::Debug, Clone)]
pub struct SessionKey {
    alg: SymmetricKeyAlgorithm,
    #[debug("***")]
    key: Zeroizing<Vec<u8>>,
    mdc: bool,
}

impl SessionKey {
    /// A fresh random key for `alg`.
    pub fn generate<R: Rng + CryptoRng>(rng: R, alg: SymmetricKeyAlgorithm) -> Result<Self> {
        if !alg.is_supported() {
            unsupported_err!("cipher algorithm {}", alg);
        }
        let key = alg.new_session_key(rng);
        debug!("generated {} session key", alg);

        Ok(SessionKey {
            alg,
            key,
            mdc: false,
        })
    }

    /// Derives the key from a passphrase.
    pub fn derive_from_passphrase(
        s2k: &StringToKey,
        alg: SymmetricKeyAlgorithm,
        provider: &dyn PassphraseProvider,
    ) -> Result<Self> {
        if !alg.is_supported() {
            unsupported_err!("cipher algorithm {}", alg);
        }
        let passphrase = provider.obtain_passphrase().ok_or_else(|| Error::Passphrase {
            message: "no passphrase given".to_string(),
        })?;

        let key = s2k.derive_key(&passphrase, alg.key_size())?;
        if key.is_empty() {
            return Err(Error::Passphrase {
                message: "derived key is empty".to_string(),
            });
        }

        Ok(SessionKey {
            alg,
            key,
            mdc: false,
        })
    }

    /// Builds a session key from existing key material.
    pub fn from_parts(alg: SymmetricKeyAlgorithm, key: Zeroizing<Vec<u8>>, mdc: bool) -> Result<Self> {
        ensure!(
            key.len() == alg.key_size(),
            "{} needs a {} byte key, got {}",
            alg,
            alg.key_size(),
            key.len()
        );
        Ok(SessionKey { alg, key, mdc })
    }

    pub fn with_mdc(mut self, mdc: bool) -> Self {
        self.mdc = mdc;
        self
    }

    pub fn algorithm(&self) -> SymmetricKeyAlgorithm {
        self.alg
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Whether the data is integrity protected.
    pub fn mdc(&self) -> bool {
        self.mdc
    }
}

/// Picks the algorithm all preference lists agree on.
///
/// The first recipient's order wins. Without a preferred common candidate the
/// lowest numbered acceptable one is used.
fn negotiate<T, F, A>(recipients: &RecipientList, prefs: F, acceptable: A) -> Option<T>
where
    T: Copy + PartialEq + Into<u8>,
    F: Fn(&RecipientKey) -> Vec<T>,
    A: Fn(T) -> bool,
{
    let mut lists = recipients.iter().map(prefs);
    let first = lists.next()?;
    let mut common: Vec<T> = first.clone();
    for list in lists {
        common.retain(|alg| list.contains(alg));
    }

    if let Some(alg) = first
        .iter()
        .copied()
        .find(|alg| common.contains(alg) && acceptable(*alg))
    {
        return Some(alg);
    }

    common
        .into_iter()
        .filter(|alg| acceptable(*alg))
        .min_by_key(|alg| Into::<u8>::into(*alg))
}

/// Selects the cipher for a message to all `recipients`.
///
/// Never fails, an empty intersection results in [`FALLBACK_CIPHER`].
pub fn negotiate_cipher(recipients: &RecipientList) -> SymmetricKeyAlgorithm {
    match negotiate(
        recipients,
        RecipientKey::effective_symmetric_preferences,
        SymmetricKeyAlgorithm::is_supported,
    ) {
        Some(alg) => {
            debug!("negotiated cipher {}", alg);
            alg
        }
        None => {
            debug!("no common cipher, falling back to {}", FALLBACK_CIPHER);
            FALLBACK_CIPHER
        }
    }
}

/// Selects the compression algorithm, `None` disables compression.
pub fn negotiate_compression(recipients: &RecipientList) -> Option<CompressionAlgorithm> {
    let alg = negotiate(
        recipients,
        RecipientKey::effective_compression_preferences,
        CompressionAlgorithm::is_supported,
    );
    debug!("negotiated compression {:?}", alg);
    match alg {
        Some(CompressionAlgorithm::Uncompressed) | None => None,
        Some(alg) => Some(alg),
    }
}

/// Integrity protection is only used if every recipient can check it.
pub fn select_mdc(recipients: &RecipientList) -> bool {
    !recipients.is_empty() && recipients.iter().all(|r| r.supports_mdc)
}

/// Builds the PKCS#1 v1.5 type 2 frame `00 02 PS 00 ALG KEY CSUM` of `len` octets.
pub fn pkcs1_frame<R: Rng + CryptoRng>(
    mut rng: R,
    dek: &SessionKey,
    len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut data = Zeroizing::new(Vec::with_capacity(dek.key().len() + 3));
    data.push(u8::from(dek.algorithm()));
    data.extend_from_slice(dek.key());
    checksum::append_simple(dek.key(), &mut data);

    // 00 02 ... 00
    let Some(padding) = len.checked_sub(data.len() + 3) else {
        bail!("key of {} octets too small for the session key", len);
    };
    ensure!(
        padding >= MIN_PADDING,
        "key of {} octets too small for the session key",
        len
    );

    let mut frame = Zeroizing::new(Vec::with_capacity(len));
    frame.push(0x00);
    frame.push(0x02);
    for _ in 0..padding {
        // non-zero random bytes
        frame.push(rng.gen_range(1..=255u8));
    }
    frame.push(0x00);
    frame.extend_from_slice(&data);

    Ok(frame)
}

/// Encrypts the session key to one recipient.
///
/// With `anonymous` set the key id in the packet is all zeros.
pub fn encode_for_recipient<R: Rng + CryptoRng>(
    mut rng: R,
    dek: &SessionKey,
    recipient: &RecipientKey,
    transform: &dyn PublicKeyTransform,
    anonymous: bool,
) -> Result<PublicKeyEncryptedSessionKey> {
    let key_id = recipient.key_id;
    let to_key_error = |err: Error| Error::KeyEncryption {
        key_id,
        message: err.to_string(),
    };

    let bits = transform
        .key_bit_length(recipient.algorithm, &recipient.params)
        .map_err(to_key_error)?;
    let frame = pkcs1_frame(&mut rng, dek, (bits + 7) / 8).map_err(to_key_error)?;
    let values = transform
        .encrypt(recipient.algorithm, &frame, &recipient.params, &mut rng)
        .map_err(to_key_error)?;

    let id = if anonymous { KeyId::WILDCARD } else { key_id };
    Ok(PublicKeyEncryptedSessionKey::from_parts(
        id,
        recipient.algorithm,
        values,
    ))
}

/// Encrypts the session key to a passphrase.
///
/// The legacy format has no packet for this, the passphrase derived key is
/// the session key itself.
pub fn encode_for_passphrase(
    dek: &SessionKey,
    s2k: &StringToKey,
    passphrase: &[u8],
    legacy: bool,
) -> Result<Option<SymKeyEncryptedSessionKey>> {
    if legacy {
        return Ok(None);
    }
    if passphrase.is_empty() {
        warn!("encrypting the session key with an empty passphrase");
    }
    let skesk =
        SymKeyEncryptedSessionKey::encrypt_v4(passphrase, dek.key(), s2k.clone(), dek.algorithm())?;
    Ok(Some(skesk))
}
