use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use num_bigint::BigUint;

use crate::errors::Result;
use crate::ser::Serialize;

/// Represents an owned MPI value.
/// The inner value is ready to be serialized, without the need to strip leading zeros.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-multiprecision-integers>
#[derive(Default, Clone, PartialEq, Eq, derive_more::Debug)]
pub struct MpiBytes(#[debug("{}", hex::encode(_0))] Bytes);

impl MpiBytes {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Represent the data in `raw` as an Mpi.
    /// Note that `raw` is not expected to be length-prefixed!
    ///
    /// Strips leading zeros.
    pub fn from_slice(raw: &[u8]) -> Self {
        Self(strip_leading_zeros(raw).to_vec().into())
    }

    /// Number of significant bits.
    pub fn bit_len(&self) -> usize {
        bit_size(&self.0)
    }
}

/// Returns the bit length of a given slice.
#[inline]
fn bit_size(val: &[u8]) -> usize {
    if val.is_empty() {
        0
    } else {
        (val.len() * 8) - val[0].leading_zeros() as usize
    }
}

#[inline]
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    bytes
        .iter()
        .position(|b| b != &0)
        .map_or(&[], |offset| &bytes[offset..])
}

impl AsRef<[u8]> for MpiBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Serialize for MpiBytes {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        let bytes = &self.0;
        let size = bit_size(bytes);
        w.write_u16::<BigEndian>(size.try_into()?)?;
        w.write_all(bytes)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.0.len()
    }
}

impl From<BigUint> for MpiBytes {
    fn from(other: BigUint) -> Self {
        Self::from(&other)
    }
}

impl From<&BigUint> for MpiBytes {
    fn from(other: &BigUint) -> Self {
        // `to_bytes_be` yields a single zero byte for zero
        MpiBytes::from_slice(&other.to_bytes_be())
    }
}

impl From<&MpiBytes> for BigUint {
    fn from(other: &MpiBytes) -> Self {
        BigUint::from_bytes_be(other.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    impl Arbitrary for MpiBytes {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            proptest::collection::vec(0u8..255, 1..500)
                .prop_map(|v| MpiBytes::from_slice(&v))
                .boxed()
        }
    }

    #[test]
    fn mpi_bits() {
        let mpi = MpiBytes::from_slice(&[0x00, 0x01, 0xff]);
        assert_eq!(mpi.as_ref(), &[0x01, 0xff]);
        assert_eq!(mpi.to_bytes().unwrap(), vec![0x00, 0x09, 0x01, 0xff]);

        let zero = MpiBytes::from(BigUint::from(0u32));
        assert!(zero.is_empty());
        assert_eq!(zero.to_bytes().unwrap(), vec![0x00, 0x00]);
    }

    proptest! {
        #[test]
        fn write_len(mpi: MpiBytes) {
            prop_assert_eq!(mpi.to_bytes().unwrap().len(), mpi.write_len());
        }

        #[test]
        fn biguint_roundtrip(mpi: MpiBytes) {
            let n = BigUint::from(&mpi);
            prop_assert_eq!(MpiBytes::from(n), mpi);
        }
    }
}
