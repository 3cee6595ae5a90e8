use log::debug;
use num_bigint::BigUint;

use crate::errors::{ensure, Result};
use crate::types::{MpiBytes, PkeskBytes, RsaPublicParams};

/// Raw RSA encryption of an already padded frame: `c = m^e mod n`.
pub fn encrypt(key: &RsaPublicParams, frame: &[u8]) -> Result<PkeskBytes> {
    debug!("RSA encrypt ({} bit modulus)", key.n().bits());

    let m = BigUint::from_bytes_be(frame);
    ensure!(&m < key.n(), "message representative out of range");

    let c = m.modpow(key.e(), key.n());

    Ok(PkeskBytes::Rsa { mpi: c.into() })
}

/// The MPI encoding of the public parameters, `n` followed by `e`.
pub fn public_mpis(key: &RsaPublicParams) -> (MpiBytes, MpiBytes) {
    (key.n().into(), key.e().into())
}
