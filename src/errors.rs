use std::num::TryFromIntError;
use std::path::PathBuf;

use snafu::Snafu;

use crate::types::KeyId;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Error types
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The input or output could not be opened.
    #[snafu(display("can't open {}: {source}", path.display()))]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No passphrase was obtained, or the derived key is empty.
    #[snafu(display("error creating passphrase: {message}"))]
    Passphrase { message: String },
    /// A recipient could not be resolved, or is not usable for encryption.
    #[snafu(display("{identifier}: skipped: {message}"))]
    KeyResolution { identifier: String, message: String },
    /// The public-key transform rejected the encoded session key.
    #[snafu(display("pubkey_encrypt failed for {key_id:?}: {message}"))]
    KeyEncryption { key_id: KeyId, message: String },
    /// Serializing a packet into the stream failed.
    #[snafu(display("build_packet failed: {source}"))]
    PacketBuild { source: Box<Error> },
    /// The sink rejected bytes.
    #[snafu(display("write error: {source}"))]
    Write { source: std::io::Error },
    #[snafu(display("invalid input"))]
    InvalidInput,
    #[snafu(transparent)]
    IO { source: std::io::Error },
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength,
    #[snafu(display("Not yet implemented: {message}"))]
    Unimplemented { message: String },
    /// Signals algorithms and parameters we don't support
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
}

impl Error {
    /// Wraps a crate error so it can travel through an [`std::io::Write`] chain.
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            Error::IO { source } | Error::Write { source } => source,
            other => std::io::Error::other(other),
        }
    }

    /// Recovers a crate error that was wrapped by [`Error::into_io`].
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        if err.get_ref().map(|e| e.is::<Error>()).unwrap_or(false) {
            if let Some(inner) = err.into_inner() {
                if let Ok(err) = inner.downcast::<Error>() {
                    return *err;
                }
            }
            return Error::InvalidInput;
        }
        Error::Write { source: err }
    }

    /// Restores crate errors that were carried by an [`Error::IO`] through a write chain.
    pub(crate) fn flatten_io(self) -> Self {
        match self {
            Error::IO { source } => Error::from_io(source),
            err => err,
        }
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::Message { message: err }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::Message {
            message: err.to_string(),
        }
    }
}

macro_rules! unimplemented_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unimplemented { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unimplemented { message: format!($fmt, $($arg)+)})
    };
}

macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string()})
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message { message: format!($fmt, $($arg)+) }
    };
}

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            $crate::errors::bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::errors::bail!($fmt, $($arg)+);
        }
    };
}

macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

pub(crate) use {bail, ensure, ensure_eq, format_err, unimplemented_err, unsupported_err};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_roundtrip_keeps_error() {
        let err = Error::Passphrase {
            message: "no passphrase given".into(),
        };
        let io = err.into_io();
        let back = Error::from_io(io);
        assert!(matches!(back, Error::Passphrase { .. }), "{:?}", back);
    }

    #[test]
    fn plain_io_error_becomes_write_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err = Error::from_io(io);
        assert!(matches!(err, Error::Write { .. }), "{:?}", err);
    }

    #[test]
    fn ensure_macros() {
        fn check(a: u8) -> Result<()> {
            ensure!(a > 1, "too small: {}", a);
            ensure_eq!(a, 3, "not three");
            Ok(())
        }

        assert!(check(0).is_err());
        assert!(check(2).is_err());
        assert!(check(3).is_ok());
    }
}
