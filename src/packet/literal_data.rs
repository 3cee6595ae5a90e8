use std::io;

use byteorder::WriteBytesExt;
use bytes::Bytes;
use log::warn;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{Tag, Timestamp};

/// Files this large (or larger) are written with an unknown length.
pub const FILE_LENGTH_LIMIT: u64 = u32::MAX as u64;

/// The longest file name a literal data packet can carry.
const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
}

/// Declared length of the literal data body.
///
/// A zero or too large file length can not be stated in the header, the
/// packet is then framed without a known length.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LiteralLength {
    Known(u32),
    Unknown,
}

impl LiteralLength {
    pub fn from_file_len(len: u64) -> Self {
        if len == 0 || len >= FILE_LENGTH_LIMIT {
            LiteralLength::Unknown
        } else {
            // checked by the limit above
            LiteralLength::Known(len as u32)
        }
    }

    pub fn known(self) -> Option<u32> {
        match self {
            LiteralLength::Known(len) => Some(len),
            LiteralLength::Unknown => None,
        }
    }
}

/// The metadata part of a Literal Data Packet
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-literal-data-packet-type-id>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct LiteralDataHeader {
    mode: DataMode,
    /// The filename, may contain non utf-8 bytes
    #[debug("{}", hex::encode(file_name))]
    file_name: Bytes,
    created: Timestamp,
    body_len: Option<u32>,
}

impl LiteralDataHeader {
    /// Creates the header. Names longer than 255 bytes are cut.
    pub fn new(
        mode: DataMode,
        file_name: impl Into<Bytes>,
        created: Timestamp,
        body_len: Option<u32>,
    ) -> Self {
        let mut file_name: Bytes = file_name.into();
        if file_name.len() > MAX_NAME_LEN {
            warn!(
                "file name too long, cutting to {} bytes: {}",
                MAX_NAME_LEN,
                String::from_utf8_lossy(&file_name)
            );
            file_name.truncate(MAX_NAME_LEN);
        }

        LiteralDataHeader {
            mode,
            file_name,
            created,
            body_len,
        }
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }

    /// The declared length of the body, `None` if it is not known upfront.
    pub fn body_len(&self) -> Option<u32> {
        self.body_len
    }

    /// Total length of the packet body, metadata included, if it can be stated.
    pub fn packet_len(&self) -> Option<u32> {
        let body_len = self.body_len?;
        u32::try_from(self.write_len()).ok()?.checked_add(body_len)
    }
}

impl Serialize for LiteralDataHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.mode.into())?;
        writer.write_u8(self.file_name.len().try_into()?)?;
        writer.write_all(&self.file_name)?;
        self.created.to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4
    }
}

impl PacketTrait for LiteralDataHeader {
    fn tag(&self) -> Tag {
        Tag::LiteralData
    }
}
