//! # pgp-encode
//!
//! The encryption side of an OpenPGP message processor.
//!
//! Plaintext from a file or a stream is turned into an OpenPGP message that is
//! either only stored (literal data), encrypted with a passphrase, or encrypted
//! to one or more public keys (optionally mixed with a passphrase). Compression
//! and ASCII armor are optional.
//!
//! The bytes flow through a chain of [`pipeline::Filter`] stages which are
//! driven by a handful of control signals, so messages of any size are
//! produced without buffering them in memory.
//!
//! ```rust
//! use pgp_encode::composed::{encrypt_symmetric_to_writer, EncryptConfigBuilder};
//! use pgp_encode::types::Password;
//! use rand::thread_rng;
//!
//! let config = EncryptConfigBuilder::default().armor(true).build().unwrap();
//! let mut out = Vec::new();
//! encrypt_symmetric_to_writer(
//!     thread_rng(),
//!     &config,
//!     &b"hello world\n"[..],
//!     &mut out,
//!     &Password::from("secret"),
//! )
//! .unwrap();
//!
//! assert!(out.starts_with(b"-----BEGIN PGP MESSAGE-----"));
//! ```

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::style,
    clippy::perf,
    clippy::complexity,
    clippy::correctness,
    clippy::unwrap_used,
    rust_2018_idioms
)]
#![allow(clippy::missing_const_for_fn, clippy::use_self)]

pub mod composed;
pub mod crypto;
pub mod errors;
pub mod packet;
pub mod pipeline;
pub mod ser;
pub mod types;

pub use self::composed::{
    encrypt_files, encrypt_public_key, encrypt_store, encrypt_symmetric, BatchReport,
    EncryptConfig, EncryptConfigBuilder, Encoder, Input, Mode, Output,
};
