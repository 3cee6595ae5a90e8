//! # Packet module
//!
//! Construction and serialization of the packets an encrypted message is
//! made of. Key packets are small and always written with a fixed length,
//! the streaming containers go through a [`PacketBodyWriter`].

use std::io;

use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

mod body_writer;
mod comment;
mod literal_data;
mod public_key_encrypted_session_key;
mod sym_key_encrypted_session_key;

pub(crate) use self::body_writer::check_chunk_size;
pub use self::body_writer::{PacketBodyWriter, PacketFraming, DEFAULT_CHUNK_SIZE};
pub use self::comment::Comment;
pub use self::literal_data::{DataMode, LiteralDataHeader, LiteralLength, FILE_LENGTH_LIMIT};
pub use self::public_key_encrypted_session_key::PublicKeyEncryptedSessionKey;
pub use self::sym_key_encrypted_session_key::SymKeyEncryptedSessionKey;

pub trait PacketTrait: Serialize {
    /// Returns the tag for this packet type.
    fn tag(&self) -> Tag;

    /// Writes the packet including a fixed length header.
    fn to_writer_with_header<W: io::Write>(
        &self,
        version: PacketHeaderVersion,
        writer: &mut W,
    ) -> Result<()> {
        version.write_header(writer, self.tag(), self.write_len())?;
        self.to_writer(writer)
    }
}
