mod compression;
mod key_id;
mod mpi;
mod packet;
mod password;
mod pkesk;
mod recipient;
mod s2k;
mod timestamp;

pub use self::{
    compression::CompressionAlgorithm,
    key_id::KeyId,
    mpi::MpiBytes,
    packet::*,
    password::Password,
    pkesk::PkeskBytes,
    recipient::{
        ElgamalPublicParams, KeyFlags, KeyVersion, PublicParams, RecipientKey,
        RecipientKeyBuilder, RecipientList, RsaPublicParams, MAX_RSA_KEY_SIZE,
    },
    s2k::{StringToKey, StringToKeyType},
    timestamp::{Timestamp, TimestampError},
};
