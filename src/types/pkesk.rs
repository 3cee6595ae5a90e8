use crate::{errors::Result, ser::Serialize, types::MpiBytes};

/// Values comprising a Public Key Encrypted Session Key
#[derive(Clone, derive_more::Debug, Eq, PartialEq)]
pub enum PkeskBytes {
    Rsa { mpi: MpiBytes },
    Elgamal { first: MpiBytes, second: MpiBytes },
}

impl PkeskBytes {
    /// Number of algorithm specific integers.
    pub fn mpi_count(&self) -> usize {
        match self {
            PkeskBytes::Rsa { .. } => 1,
            PkeskBytes::Elgamal { .. } => 2,
        }
    }
}

impl Serialize for PkeskBytes {
    fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PkeskBytes::Rsa { mpi } => {
                mpi.to_writer(writer)?;
            }
            PkeskBytes::Elgamal { first, second } => {
                first.to_writer(writer)?;
                second.to_writer(writer)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PkeskBytes::Rsa { mpi } => mpi.write_len(),
            PkeskBytes::Elgamal { first, second } => first.write_len() + second.write_len(),
        }
    }
}
