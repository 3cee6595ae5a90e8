//! Encryption operations that tie inputs, keys, stages and outputs together.
//!
//! The [`Encoder`] runs one operation in one of three [`Mode`]s:
//!
//! - [`Mode::Store`] only wraps the data in a literal data packet,
//! - [`Mode::Symmetric`] encrypts to a passphrase,
//! - [`Mode::PublicKey`] encrypts to the keys a [`KeyDatabase`] resolves,
//!   optionally to a passphrase as well.
//!
//! [`encrypt_files`] runs public key encryption over many files, reporting
//! progress through a [`StatusSink`].
//!
//! See <https://www.rfc-editor.org/rfc/rfc4880#section-11.3> for the message layout.

mod batch;
mod config;
mod encoder;
mod keyring;
pub mod session_key;
mod sink;
mod source;
mod status;

pub use self::batch::{encrypt_files, encrypt_files_from_reader, BatchReport, MAX_LINE_LEN};
pub use self::config::{EncryptConfig, EncryptConfigBuilder, DEFAULT_S2K_COUNT};
pub use self::encoder::{
    encrypt_public_key, encrypt_store, encrypt_symmetric, encrypt_symmetric_to_writer, Encoder,
    Input, Mode, Output, State,
};
pub use self::keyring::{KeyDatabase, Keyring, PassphraseProvider};
pub use self::session_key::SessionKey;
pub use self::sink::{output_path_for, FileSink, WriterSink};
pub use self::source::{is_compressed_magic, FileSource, ReaderSource, Source, StdinSource, STDIN_NAME};
pub use self::status::{LogStatus, StatusEvent, StatusRecorder, StatusSink};
pub use crate::pipeline::Sink;
