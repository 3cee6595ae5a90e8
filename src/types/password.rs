use zeroize::Zeroizing;

/// A passphrase, either known up front or obtained through a callback.
///
/// The callback may decline to produce a passphrase (e.g. a cancelled prompt)
/// by returning `None`.
#[derive(derive_more::Debug)]
pub enum Password {
    Dynamic(
        #[debug("Box<Fn>")]
        Box<dyn Fn() -> Option<Zeroizing<Vec<u8>>> + 'static + Send + Sync>,
    ),
    Static(#[debug("***")] Zeroizing<Vec<u8>>),
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::Static(value.as_bytes().to_vec().into())
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::Static(value.as_bytes().to_vec().into())
    }
}

impl From<&[u8]> for Password {
    fn from(value: &[u8]) -> Self {
        Self::Static(value.to_vec().into())
    }
}

impl Default for Password {
    fn default() -> Self {
        Self::empty()
    }
}

impl Password {
    /// Creates an empty password.
    pub fn empty() -> Self {
        Self::Static(Vec::new().into())
    }

    /// Creates a password that is obtained by calling `f` whenever it is needed.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Option<Zeroizing<Vec<u8>>> + 'static + Send + Sync,
    {
        Self::Dynamic(Box::new(f))
    }

    /// Executes the callback and returns the result.
    pub fn read(&self) -> Option<Zeroizing<Vec<u8>>> {
        match self {
            Self::Dynamic(ref f) => f(),
            Self::Static(ref s) => Some(s.clone()),
        }
    }
}
