use log::debug;
use num_bigint::{BigUint, RandBigInt};

use crate::crypto::public_key::CryptoRngCore;
use crate::errors::{ensure, Result};
use crate::types::{ElgamalPublicParams, PkeskBytes};

/// Elgamal encryption of an already padded frame.
///
/// A fresh `k` in `[2, p - 1)` gives `a = g^k mod p` and `b = m * y^k mod p`.
pub fn encrypt(
    rng: &mut dyn CryptoRngCore,
    key: &ElgamalPublicParams,
    frame: &[u8],
) -> Result<PkeskBytes> {
    debug!("Elgamal encrypt ({} bit prime)", key.p.bits());

    let m = BigUint::from_bytes_be(frame);
    ensure!(m < key.p, "message representative out of range");

    let two = BigUint::from(2u8);
    let p_minus_one = &key.p - BigUint::from(1u8);
    ensure!(p_minus_one > two, "Elgamal prime too small");

    let k = rng.gen_biguint_range(&two, &p_minus_one);

    let a = key.g.modpow(&k, &key.p);
    let b = (m * key.y.modpow(&k, &key.p)) % &key.p;

    Ok(PkeskBytes::Elgamal {
        first: a.into(),
        second: b.into(),
    })
}
