use std::path::PathBuf;

use chrono::{DateTime, Utc};
use derive_builder::Builder;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{check_chunk_size, DEFAULT_CHUNK_SIZE};
use crate::types::{CompressionAlgorithm, PacketHeaderVersion, StringToKeyType, Timestamp};

/// Default coded S2K iteration count (65536 bytes).
pub const DEFAULT_S2K_COUNT: u8 = 96;

/// Settings for one or more encryption operations.
///
/// Built with [`EncryptConfigBuilder`], immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "Error", validate = "Self::validate"))]
pub struct EncryptConfig {
    /// ASCII armor the output.
    #[builder(default)]
    pub armor: bool,
    /// Compress the literal data.
    #[builder(default = "true")]
    pub compress: bool,
    /// Treat the input as text: canonical line endings and literal mode `t`.
    #[builder(default)]
    pub textmode: bool,

    // -- Algorithm overrides
    /// Cipher to use instead of the negotiated or S2K one.
    #[builder(default)]
    pub cipher: Option<SymmetricKeyAlgorithm>,
    /// Hash to use for the S2K instead of `s2k_digest`.
    #[builder(default)]
    pub digest: Option<HashAlgorithm>,
    /// Compression to use instead of the negotiated one.
    #[builder(default)]
    pub compression: Option<CompressionAlgorithm>,

    // -- Passphrase derivation
    #[builder(default = "StringToKeyType::IteratedAndSalted")]
    pub s2k_mode: StringToKeyType,
    #[builder(default = "HashAlgorithm::Sha1")]
    pub s2k_digest: HashAlgorithm,
    #[builder(default = "SymmetricKeyAlgorithm::AES128")]
    pub s2k_cipher: SymmetricKeyAlgorithm,
    /// Coded iteration count.
    #[builder(default = "DEFAULT_S2K_COUNT")]
    pub s2k_count: u8,

    /// Produce RFC 1991 style messages.
    #[builder(default)]
    pub rfc1991: bool,
    /// Copy the input without a literal data packet.
    #[builder(default)]
    pub no_literal: bool,
    /// Hide the recipients' key ids.
    #[builder(default)]
    pub throw_keyid: bool,
    /// Use modification detection regardless of the recipients' features.
    #[builder(default)]
    pub force_mdc: bool,

    #[builder(default)]
    pub output: Option<PathBuf>,
    /// File name stored in the literal data packet.
    #[builder(default)]
    pub set_filename: Option<String>,
    /// Declared input size, for inputs whose size can not be determined.
    #[builder(default)]
    pub set_filesize: Option<u64>,
    /// Armor `Comment:` headers, or comment packets when not armoring.
    #[builder(default)]
    pub comments: Vec<String>,
    /// Chunk size for partial body lengths.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    pub chunk_size: u32,
    /// Creation time of the literal data, defaults to now.
    #[builder(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl EncryptConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(chunk_size) = self.chunk_size {
            check_chunk_size(chunk_size).map_err(|err| err.to_string())?;
        }
        if let Some(StringToKeyType::Other(mode)) = self.s2k_mode {
            return Err(format!("unknown s2k mode {}", mode));
        }
        if let Some(Some(cipher)) = self.cipher {
            if !cipher.is_supported() {
                return Err(format!("cipher {} can not be used for encryption", cipher));
            }
        }
        Ok(())
    }
}

impl Default for EncryptConfig {
    fn default() -> Self {
        EncryptConfig {
            armor: false,
            compress: true,
            textmode: false,
            cipher: None,
            digest: None,
            compression: None,
            s2k_mode: StringToKeyType::IteratedAndSalted,
            s2k_digest: HashAlgorithm::Sha1,
            s2k_cipher: SymmetricKeyAlgorithm::AES128,
            s2k_count: DEFAULT_S2K_COUNT,
            rfc1991: false,
            no_literal: false,
            throw_keyid: false,
            force_mdc: false,
            output: None,
            set_filename: None,
            set_filesize: None,
            comments: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timestamp: None,
        }
    }
}

impl EncryptConfig {
    /// Header format of the produced packets.
    pub fn header_version(&self) -> PacketHeaderVersion {
        if self.rfc1991 {
            PacketHeaderVersion::Old
        } else {
            PacketHeaderVersion::New
        }
    }

    /// The S2K mode, legacy messages only know the simple one.
    pub fn effective_s2k_mode(&self) -> StringToKeyType {
        if self.rfc1991 {
            StringToKeyType::Simple
        } else {
            self.s2k_mode
        }
    }

    pub fn effective_s2k_digest(&self) -> HashAlgorithm {
        self.digest.unwrap_or(self.s2k_digest)
    }

    pub fn effective_s2k_cipher(&self) -> SymmetricKeyAlgorithm {
        self.cipher.unwrap_or(self.s2k_cipher)
    }

    /// Compression is never used for legacy messages.
    pub fn compression_enabled(&self) -> bool {
        self.compress && !self.rfc1991
    }

    pub fn literal_timestamp(&self) -> Result<Timestamp> {
        match self.timestamp {
            Some(ts) => Timestamp::try_from(ts).map_err(|err| Error::Message {
                message: err.to_string(),
            }),
            None => Ok(Timestamp::now()),
        }
    }
}
