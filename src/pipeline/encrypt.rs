use std::io;
use std::sync::Arc;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{CryptoRng, Rng, SeedableRng};
use zeroize::Zeroizing;

use crate::composed::session_key::{
    encode_for_passphrase, encode_for_recipient, negotiate_cipher, select_mdc, SessionKey,
};
use crate::crypto::public_key::PublicKeyTransform;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Error, Result};
use crate::packet::PacketTrait;
use crate::pipeline::{CipherFilter, Filter, Teardown};
use crate::types::{PacketHeaderVersion, RecipientList, StringToKey};

/// Everything the [`EncryptFilter`] needs to write the session key packets.
#[derive(derive_more::Debug)]
pub struct EncryptParams {
    pub recipients: RecipientList,
    #[debug(skip)]
    pub transform: Arc<dyn PublicKeyTransform + Send + Sync>,
    /// Overrides the negotiated cipher.
    pub cipher: Option<SymmetricKeyAlgorithm>,
    /// Use modification detection even if not every recipient announced support.
    pub force_mdc: bool,
    /// Write zero key ids.
    pub throw_keyid: bool,
    /// Additionally encrypt the session key to this passphrase.
    #[debug("{}", if passphrase.is_some() { "Some(***)" } else { "None" })]
    pub passphrase: Option<(StringToKey, Zeroizing<Vec<u8>>)>,
    /// Use this session key instead of generating one.
    pub session_key: Option<SessionKey>,
    /// Length of the data that will be written, if known.
    pub datalen: Option<u32>,
    pub version: PacketHeaderVersion,
    pub chunk_size: u32,
}

#[derive(derive_more::Debug)]
enum State {
    /// Nothing was written yet.
    AwaitingHeader(Box<EncryptParams>),
    /// The session key packets are out, data goes through the cipher.
    Streaming(CipherFilter),
    Done,
}

/// Encrypts to a list of public keys.
///
/// The session key packets are written right before the first data, the
/// cipher is chosen at that point as well.
#[derive(derive_more::Debug)]
pub struct EncryptFilter {
    #[debug(skip)]
    rng: StdRng,
    state: State,
}

impl EncryptFilter {
    pub fn new<R: Rng + CryptoRng>(mut rng: R, params: EncryptParams) -> Self {
        EncryptFilter {
            rng: StdRng::from_seed(rng.gen()),
            state: State::AwaitingHeader(Box::new(params)),
        }
    }

    /// Whether the session key packets were written.
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, State::Streaming(_))
    }

    fn write_header(&mut self, params: EncryptParams, downstream: &mut dyn io::Write) -> Result<CipherFilter> {
        let EncryptParams {
            recipients,
            transform,
            cipher,
            force_mdc,
            throw_keyid,
            passphrase,
            session_key,
            datalen,
            version,
            chunk_size,
        } = params;

        let dek = match session_key {
            Some(dek) => dek,
            None => {
                let alg = cipher.unwrap_or_else(|| negotiate_cipher(&recipients));
                let mdc = force_mdc || select_mdc(&recipients);
                SessionKey::generate(&mut self.rng, alg)?.with_mdc(mdc)
            }
        };
        debug!("encrypt_filter: {} mdc {}", dek.algorithm(), dek.mdc());

        let mut out = downstream;
        for recipient in &recipients {
            let pkesk = encode_for_recipient(
                &mut self.rng,
                &dek,
                recipient,
                transform.as_ref(),
                throw_keyid,
            )?;
            pkesk
                .to_writer_with_header(version, &mut out)
                .map_err(|err| Error::PacketBuild {
                    source: Box::new(err),
                })?;
            info!(
                "{}/{} encrypted for: \"{}\"",
                recipient.algorithm,
                dek.algorithm(),
                recipient.display_name()
            );
        }

        if let Some((s2k, passphrase)) = passphrase {
            if let Some(skesk) = encode_for_passphrase(&dek, &s2k, &passphrase, false)? {
                skesk
                    .to_writer_with_header(version, &mut out)
                    .map_err(|err| Error::PacketBuild {
                        source: Box::new(err),
                    })?;
            }
        }

        CipherFilter::new(
            &mut self.rng,
            dek.algorithm(),
            dek.key(),
            dek.mdc(),
            datalen,
            version,
            chunk_size,
        )
    }

    /// Moves from [`State::AwaitingHeader`] to [`State::Streaming`].
    fn start(&mut self, downstream: &mut dyn io::Write) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::AwaitingHeader(params) => {
                let cipher = self.write_header(*params, downstream)?;
                self.state = State::Streaming(cipher);
            }
            state => self.state = state,
        }
        Ok(())
    }
}

impl Filter for EncryptFilter {
    fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()> {
        self.start(downstream)?;
        match self.state {
            State::Streaming(ref mut cipher) => cipher.flush(buf, downstream),
            _ => unsupported_err!("encrypt_filter already freed"),
        }
    }

    fn free(&mut self, downstream: &mut dyn io::Write, teardown: Teardown) -> Result<()> {
        if teardown == Teardown::Cancel {
            if let State::Streaming(ref mut cipher) = self.state {
                cipher.free(downstream, teardown)?;
            }
            self.state = State::Done;
            return Ok(());
        }

        // an empty message still gets its session key packets
        self.start(downstream)?;
        let result = match self.state {
            State::Streaming(ref mut cipher) => cipher.free(downstream, teardown),
            _ => Ok(()),
        };
        self.state = State::Done;
        result
    }

    fn describe(&self) -> &'static str {
        "encrypt_filter"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::public_key::{PublicKeyAlgorithm, StandardTransform};
    use crate::types::{KeyId, PublicParams, RecipientKey, RecipientKeyBuilder, RsaPublicParams};

    fn rsa_recipient(rng: &mut ChaCha8Rng, id: u8, mdc: bool) -> RecipientKey {
        let priv_key = rsa::RsaPrivateKey::new(rng, 1024).unwrap();
        RecipientKeyBuilder::default()
            .key_id(KeyId::from([id; 8]))
            .algorithm(PublicKeyAlgorithm::RSA)
            .params(PublicParams::RSA(RsaPublicParams::from(
                priv_key.to_public_key(),
            )))
            .preferred_symmetric_algorithms(vec![SymmetricKeyAlgorithm::AES128])
            .supports_mdc(mdc)
            .user_ids(vec![format!("user {}", id)])
            .build()
            .unwrap()
    }

    fn params(recipients: Vec<RecipientKey>) -> EncryptParams {
        EncryptParams {
            recipients: RecipientList::new(recipients),
            transform: Arc::new(StandardTransform),
            cipher: None,
            force_mdc: false,
            throw_keyid: false,
            passphrase: None,
            session_key: None,
            datalen: None,
            version: PacketHeaderVersion::New,
            chunk_size: 512,
        }
    }

    /// Splits a stream of new style packets with fixed lengths into (tag, body) pairs,
    /// stopping at the first packet with an open length.
    fn fixed_packets(mut data: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut packets = Vec::new();
        while !data.is_empty() {
            let tag = data[0] & 0x3F;
            let (len, rest) = match data[1] {
                l @ 0..=191 => (l as usize, &data[2..]),
                l @ 192..=223 => ((((l as usize) - 192) << 8) + data[2] as usize + 192, &data[3..]),
                _ => break,
            };
            packets.push((tag, rest[..len].to_vec()));
            data = &rest[len..];
        }
        packets
    }

    #[test]
    fn header_is_written_lazily() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let r1 = rsa_recipient(&mut rng, 1, true);
        let r2 = rsa_recipient(&mut rng, 2, true);

        let mut f = EncryptFilter::new(&mut rng, params(vec![r1, r2]));
        assert!(!f.is_streaming());

        let mut out = Vec::new();
        f.flush(b"", &mut out).unwrap();
        assert!(f.is_streaming());
        let header_len = out.len();
        assert!(header_len > 0);

        f.flush(b"hello", &mut out).unwrap();
        f.free(&mut out, Teardown::Close).unwrap();

        let packets = fixed_packets(&out);
        assert_eq!(packets[0].0, 1);
        assert_eq!(packets[1].0, 1);
        assert_eq!(&packets[0].1[1..9], &[1u8; 8]);
        assert_eq!(&packets[1].1[1..9], &[2u8; 8]);
        assert_ne!(packets[0].1[10..], packets[1].1[10..]);
        // both support mdc
        assert_eq!(packets[2].0, 18);
    }

    #[test]
    fn empty_message_gets_packets() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let r1 = rsa_recipient(&mut rng, 1, false);

        let mut p = params(vec![r1]);
        p.throw_keyid = true;
        p.passphrase = Some((
            StringToKey::Simple {
                hash_alg: crate::crypto::hash::HashAlgorithm::Sha1,
            },
            Zeroizing::new(b"pw".to_vec()),
        ));
        let mut f = EncryptFilter::new(&mut rng, p);

        let mut out = Vec::new();
        f.free(&mut out, Teardown::Close).unwrap();

        let packets = fixed_packets(&out);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].0, 1);
        assert_eq!(&packets[0].1[1..9], &[0u8; 8]);
        assert_eq!(packets[1].0, 3);
        // no mdc support
        assert_eq!(packets[2].0, 9);
        assert_eq!(packets[2].1.len(), 16 + 2);
    }

    #[test]
    fn cancel_before_start_writes_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let mut f = EncryptFilter::new(&mut rng, params(vec![]));
        let mut out = Vec::new();
        f.free(&mut out, Teardown::Cancel).unwrap();
        assert!(out.is_empty());
        assert_eq!(f.describe(), "encrypt_filter");
    }
}
