//! # Cryptography module

// Symmetric

pub mod sym;

// Encryption

pub mod elgamal;
pub mod rsa;

// Misc

pub mod checksum;
pub mod hash;
pub mod public_key;
