use std::io;

use bytes::Bytes;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// Comment Packet
///
/// Free text in front of a message that is not armored. The tag is taken from
/// the private range, readers skip it. It does not fit an old style header, so
/// it is always written with a new one.
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    #[debug("{:?}", String::from_utf8_lossy(text))]
    text: Bytes,
}

impl Comment {
    pub fn new(text: impl Into<Bytes>) -> Self {
        Comment { text: text.into() }
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Writes the packet, always with a new style header.
    pub fn to_writer_with_new_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.to_writer_with_header(PacketHeaderVersion::New, writer)
    }
}

impl Serialize for Comment {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.text)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.text.len()
    }
}

impl PacketTrait for Comment {
    fn tag(&self) -> Tag {
        Tag::Comment
    }
}
