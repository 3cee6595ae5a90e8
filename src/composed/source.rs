use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::{Error, Result};

/// Name used in messages for standard input.
pub const STDIN_NAME: &str = "[stdin]";

/// Signatures of formats that are compressed already.
const COMPRESSED_MAGIC: &[&[u8]] = &[
    // gzip
    &[0x1f, 0x8b],
    // compress
    &[0x1f, 0x9d],
    // bzip2
    b"BZh",
    // pkzip
    b"PK\x03\x04",
];

/// Returns true if `data` starts like the output of a common compressor.
pub fn is_compressed_magic(data: &[u8]) -> bool {
    COMPRESSED_MAGIC.iter().any(|magic| data.starts_with(magic))
}

/// The plaintext input of an encryption.
pub trait Source: BufRead {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// The path of the input file, if it is one.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Length of the input, if known.
    fn file_len(&self) -> Option<u64> {
        None
    }

    /// Releases the input. Called exactly once per operation.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Peeks at the start of the data to detect compressed formats.
    fn is_compressed(&mut self) -> Result<bool> {
        let buf = self.fill_buf()?;
        Ok(is_compressed_magic(buf))
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn path(&self) -> Option<&Path> {
        (**self).path()
    }

    fn file_len(&self) -> Option<u64> {
        (**self).file_len()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_compressed(&mut self) -> Result<bool> {
        (**self).is_compressed()
    }
}

/// A file on disk.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    len: Option<u64>,
    reader: Option<BufReader<File>>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let metadata = file.metadata().map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let len = metadata.is_file().then(|| metadata.len());
        debug!("opened {} ({:?} bytes)", path.display(), len);

        Ok(FileSource {
            name: path.display().to_string(),
            path,
            len,
            reader: Some(BufReader::new(file)),
        })
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader {
            Some(ref mut r) => r.read(buf),
            None => Ok(0),
        }
    }
}

impl BufRead for FileSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self.reader {
            Some(ref mut r) => r.fill_buf(),
            None => Ok(&[]),
        }
    }

    fn consume(&mut self, amt: usize) {
        if let Some(ref mut r) = self.reader {
            r.consume(amt);
        }
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn file_len(&self) -> Option<u64> {
        self.len
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

/// Standard input.
#[derive(Debug)]
pub struct StdinSource {
    stdin: io::StdinLock<'static>,
}

impl StdinSource {
    pub fn new() -> Self {
        StdinSource {
            stdin: io::stdin().lock(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for StdinSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdin.read(buf)
    }
}

impl BufRead for StdinSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.stdin.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.stdin.consume(amt)
    }
}

impl Source for StdinSource {
    fn name(&self) -> &str {
        STDIN_NAME
    }
}

/// Any reader, e.g. in memory data.
#[derive(derive_more::Debug)]
pub struct ReaderSource<R: Read> {
    name: String,
    len: Option<u64>,
    #[debug(skip)]
    reader: BufReader<R>,
}

impl<R: Read> ReaderSource<R> {
    /// A stream of unknown length, reported as standard input.
    pub fn new(reader: R) -> Self {
        ReaderSource {
            name: STDIN_NAME.to_string(),
            len: None,
            reader: BufReader::new(reader),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }
}

impl<R: Read> Read for ReaderSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read> BufRead for ReaderSource<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl<R: Read> Source for ReaderSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_len(&self) -> Option<u64> {
        self.len
    }
}
