use std::ffi::OsString;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::errors::{Error, Result};
use crate::pipeline::Sink;

/// The default output file for `input`: `.asc` is appended when armoring, `.gpg` otherwise.
pub fn output_path_for(input: &Path, armor: bool) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(if armor { ".asc" } else { ".gpg" });
    PathBuf::from(name)
}

/// Writes to a temporary file next to the target, which replaces the target
/// only once the output is committed.
///
/// A cancelled or dropped sink removes the temporary file and leaves an
/// existing target untouched.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<NamedTempFile>>,
    committed: bool,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let file = NamedTempFile::new_in(dir).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        debug!("writing to {} via {}", path.display(), file.path().display());

        Ok(FileSink {
            path,
            file: Some(BufWriter::new(file)),
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn discard(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => match file.into_inner() {
                Ok(file) => file.close().map_err(|source| Error::Write { source }),
                // the temporary file goes away with the writer
                Err(_) => Ok(()),
            },
            None => Ok(()),
        }
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file {
            Some(ref mut f) => f.write(buf),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "output already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file {
            Some(ref mut f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl Sink for FileSink {
    fn finish(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            let file = file.into_inner().map_err(|err| Error::Write {
                source: err.into_error(),
            })?;
            file.as_file()
                .sync_all()
                .map_err(|source| Error::Write { source })?;
            file.persist(&self.path).map_err(|err| Error::Write {
                source: err.error,
            })?;
        }
        self.committed = true;
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        if self.committed {
            return Ok(());
        }
        debug!("discarding output for {}", self.path.display());
        self.discard()
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(err) = self.discard() {
                warn!("{}: can't remove partial output: {}", self.path.display(), err);
            }
        }
    }
}

/// Writes to any [`Write`]. Cancelling can not take back what was written.
#[derive(derive_more::Debug)]
pub struct WriterSink<W: Write> {
    #[debug(skip)]
    inner: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        WriterSink { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        WriterSink::new(io::stdout())
    }
}

impl<W: Write> Write for WriterSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Sink for WriterSink<W> {}
