use num_enum::{FromPrimitive, IntoPrimitive};

/// Available compression algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-compression-algorithms>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
#[non_exhaustive]
pub enum CompressionAlgorithm {
    #[display("Uncompressed")]
    Uncompressed = 0,
    #[display("ZIP")]
    ZIP = 1,
    #[display("ZLIB")]
    ZLIB = 2,
    #[display("BZIP2")]
    BZip2 = 3,
    /// Do not use, just for compatibility with GnuPG.
    #[display("Private10")]
    Private10 = 110,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    #[display("Other({_0})")]
    Other(u8),
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::ZIP
    }
}

impl CompressionAlgorithm {
    /// Whether this crate can produce data compressed with this algorithm.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Uncompressed | Self::ZIP | Self::ZLIB => true,
            Self::BZip2 => cfg!(feature = "bzip2"),
            Self::Private10 | Self::Other(_) => false,
        }
    }
}
