//! # Stream transform pipeline
//!
//! A [`Pipeline`] is a stack of [`Stage`]s on top of a [`Sink`]. Bytes written
//! to the pipeline enter the most recently pushed stage, every stage pushes
//! its output into the rest of the chain. Closing the pipeline frees the
//! stages from the top down, so trailers end up in front of the trailers of
//! the stages below. Cancelling it frees them without writing anything and
//! discards the sink.
//!
//! [`InputPipeline`] is the read side counterpart, its stages are pulled from.

use std::io;

use log::debug;

use crate::errors::{unsupported_err, Error, Result};

mod armor;
mod cipher;
mod compress;
mod encrypt;
mod text;

pub use self::armor::{ArmorFilter, BlockType};
pub use self::cipher::CipherFilter;
pub use self::compress::CompressFilter;
pub use self::encrypt::{EncryptFilter, EncryptParams};
pub use self::text::TextFilter;

/// Size of the buffer used to copy data into a pipeline.
pub const COPY_BUFFER_SIZE: usize = 4096;

/// How the owning stream is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Regular end of data, trailers are written.
    Close,
    /// The operation failed, nothing more is written.
    Cancel,
}

/// A byte stream transform with lifecycle control.
pub trait Filter {
    /// Pushes `buf` through this stage into `downstream`.
    fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()>;

    /// Pulls transformed bytes from `upstream` into `buf`.
    ///
    /// Returns the number of bytes produced, `0` signals the end of the data.
    fn underflow(&mut self, _upstream: &mut dyn io::Read, _buf: &mut [u8]) -> Result<usize> {
        unsupported_err!("{} can not be read from", self.describe())
    }

    /// Releases the stage. Called exactly once.
    fn free(&mut self, downstream: &mut dyn io::Write, teardown: Teardown) -> Result<()>;

    /// Static tag used in diagnostics.
    fn describe(&self) -> &'static str;
}

/// All available filters.
#[derive(derive_more::Debug)]
pub enum Stage {
    Text(TextFilter),
    Compress(CompressFilter),
    Cipher(CipherFilter),
    Encrypt(EncryptFilter),
    Armor(ArmorFilter),
}

impl Filter for Stage {
    fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()> {
        match self {
            Stage::Text(f) => f.flush(buf, downstream),
            Stage::Compress(f) => f.flush(buf, downstream),
            Stage::Cipher(f) => f.flush(buf, downstream),
            Stage::Encrypt(f) => f.flush(buf, downstream),
            Stage::Armor(f) => f.flush(buf, downstream),
        }
    }

    fn underflow(&mut self, upstream: &mut dyn io::Read, buf: &mut [u8]) -> Result<usize> {
        match self {
            Stage::Text(f) => f.underflow(upstream, buf),
            Stage::Compress(f) => f.underflow(upstream, buf),
            Stage::Cipher(f) => f.underflow(upstream, buf),
            Stage::Encrypt(f) => f.underflow(upstream, buf),
            Stage::Armor(f) => f.underflow(upstream, buf),
        }
    }

    fn free(&mut self, downstream: &mut dyn io::Write, teardown: Teardown) -> Result<()> {
        match self {
            Stage::Text(f) => f.free(downstream, teardown),
            Stage::Compress(f) => f.free(downstream, teardown),
            Stage::Cipher(f) => f.free(downstream, teardown),
            Stage::Encrypt(f) => f.free(downstream, teardown),
            Stage::Armor(f) => f.free(downstream, teardown),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Stage::Text(f) => f.describe(),
            Stage::Compress(f) => f.describe(),
            Stage::Cipher(f) => f.describe(),
            Stage::Encrypt(f) => f.describe(),
            Stage::Armor(f) => f.describe(),
        }
    }
}

macro_rules! impl_into_stage {
    ($($variant:ident => $filter:ty),+ $(,)?) => {
        $(
            impl From<$filter> for Stage {
                fn from(f: $filter) -> Self {
                    Stage::$variant(f)
                }
            }
        )+
    };
}

impl_into_stage!(
    Text => TextFilter,
    Compress => CompressFilter,
    Cipher => CipherFilter,
    Encrypt => EncryptFilter,
    Armor => ArmorFilter,
);

/// The final destination of a pipeline.
pub trait Sink: io::Write {
    /// Commits the written data.
    fn finish(&mut self) -> Result<()> {
        self.flush()?;
        Ok(())
    }

    /// Discards the written data, as far as possible.
    fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Sink for Vec<u8> {}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn cancel(&mut self) -> Result<()> {
        (**self).cancel()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn cancel(&mut self) -> Result<()> {
        (**self).cancel()
    }
}

/// The part of the chain below a stage.
struct Downstream<'a, W: io::Write + ?Sized> {
    stages: &'a mut [Stage],
    sink: &'a mut W,
}

impl<W: io::Write + ?Sized> io::Write for Downstream<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.stages.split_last_mut() {
            Some((top, rest)) => {
                let mut next = Downstream {
                    stages: rest,
                    sink: &mut *self.sink,
                };
                top.flush(buf, &mut next).map_err(Error::into_io)
            }
            None => self.sink.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A write side chain of stages on top of a sink.
#[derive(derive_more::Debug)]
pub struct Pipeline<W: Sink> {
    /// Bottom first, data enters at the end.
    stages: Vec<Stage>,
    #[debug(skip)]
    sink: W,
}

impl<W: Sink> Pipeline<W> {
    pub fn new(sink: W) -> Self {
        Pipeline {
            stages: Vec::new(),
            sink,
        }
    }

    /// Attaches `stage` on top of the chain.
    pub fn push(&mut self, stage: impl Into<Stage>) {
        let stage = stage.into();
        debug!("push {}", stage.describe());
        self.stages.push(stage);
    }

    /// The tags of all stages, in the order data passes them.
    pub fn describe(&self) -> Vec<&'static str> {
        self.stages.iter().rev().map(|s| s.describe()).collect()
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Pushes `buf` through the whole chain.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut chain = Downstream {
            stages: &mut self.stages[..],
            sink: &mut self.sink,
        };
        io::Write::write_all(&mut chain, buf).map_err(Error::from_io)
    }

    /// Frees all stages with [`Teardown::Close`] and commits the sink.
    ///
    /// If any stage fails the remaining stages are cancelled and so is the sink.
    pub fn close(mut self) -> Result<W> {
        let mut failure = None;
        while let Some(mut stage) = self.stages.pop() {
            let teardown = if failure.is_some() {
                Teardown::Cancel
            } else {
                Teardown::Close
            };
            debug!("free {} {:?}", stage.describe(), teardown);

            let mut below = Downstream {
                stages: &mut self.stages[..],
                sink: &mut self.sink,
            };
            if let Err(err) = stage.free(&mut below, teardown) {
                failure.get_or_insert(err.flatten_io());
            }
        }

        match failure {
            None => {
                self.sink.finish()?;
                Ok(self.sink)
            }
            Some(err) => {
                if let Err(cancel_err) = self.sink.cancel() {
                    debug!("cancel after failed close: {:?}", cancel_err);
                }
                Err(err)
            }
        }
    }

    /// Frees all stages with [`Teardown::Cancel`] and discards the sink.
    pub fn cancel(mut self) -> Result<()> {
        let mut failure = None;
        while let Some(mut stage) = self.stages.pop() {
            debug!("free {} {:?}", stage.describe(), Teardown::Cancel);
            let mut below = Downstream {
                stages: &mut self.stages[..],
                sink: &mut self.sink,
            };
            if let Err(err) = stage.free(&mut below, Teardown::Cancel) {
                failure.get_or_insert(err.flatten_io());
            }
        }
        self.sink.cancel()?;

        match failure {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl<W: Sink> io::Write for Pipeline<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf).map_err(Error::into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The part of the chain above a stage on the read side.
struct Upstream<'a, R: io::Read + ?Sized> {
    stages: &'a mut [Stage],
    source: &'a mut R,
}

impl<R: io::Read + ?Sized> io::Read for Upstream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stages.split_last_mut() {
            Some((top, rest)) => {
                let mut next = Upstream {
                    stages: rest,
                    source: &mut *self.source,
                };
                top.underflow(&mut next, buf).map_err(Error::into_io)
            }
            None => self.source.read(buf),
        }
    }
}

/// A read side chain of stages on top of a source.
///
/// Reading pulls from the most recently pushed stage, which pulls from the
/// stages below it and finally from the source.
#[derive(derive_more::Debug)]
pub struct InputPipeline<R: io::Read> {
    stages: Vec<Stage>,
    #[debug(skip)]
    source: R,
}

impl<R: io::Read> InputPipeline<R> {
    pub fn new(source: R) -> Self {
        InputPipeline {
            stages: Vec::new(),
            source,
        }
    }

    pub fn push(&mut self, stage: impl Into<Stage>) {
        let stage = stage.into();
        debug!("push input {}", stage.describe());
        self.stages.push(stage);
    }

    pub fn describe(&self) -> Vec<&'static str> {
        self.stages.iter().rev().map(|s| s.describe()).collect()
    }

    /// Frees the stages and hands back the source.
    pub fn into_inner(mut self) -> R {
        while let Some(mut stage) = self.stages.pop() {
            if let Err(err) = stage.free(&mut io::sink(), Teardown::Close) {
                debug!("free {}: {:?}", stage.describe(), err);
            }
        }
        self.source
    }
}

impl<R: io::Read> io::Read for InputPipeline<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut chain = Upstream {
            stages: &mut self.stages[..],
            source: &mut self.source,
        };
        chain.read(buf)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Read;

    use super::*;
    use crate::errors::bail;

    /// Sink that records how it was torn down.
    #[derive(Debug, Default)]
    struct RecordingSink {
        data: Vec<u8>,
        finished: bool,
        cancelled: bool,
        fail_after: Option<usize>,
    }

    impl io::Write for RecordingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(limit) = self.fail_after {
                if self.data.len() + buf.len() > limit {
                    return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
                }
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink for RecordingSink {
        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }

        fn cancel(&mut self) -> Result<()> {
            self.cancelled = true;
            Ok(())
        }
    }

    #[test]
    fn empty_pipeline_passes_through() {
        let mut pipeline = Pipeline::new(Vec::new());
        pipeline.write_all(b"hello").unwrap();
        assert!(pipeline.describe().is_empty());
        let out = pipeline.close().unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn stages_are_applied_top_down() {
        let mut pipeline = Pipeline::new(RecordingSink::default());
        pipeline.push(ArmorFilter::new(BlockType::Message, Vec::new()));
        pipeline.push(TextFilter::new());
        assert_eq!(pipeline.describe(), vec!["text_filter", "armor_filter"]);

        pipeline.write_all(b"a\nb").unwrap();
        let sink = pipeline.close().unwrap();
        assert!(sink.finished);
        assert!(!sink.cancelled);

        let text = String::from_utf8(sink.data).unwrap();
        assert!(text.starts_with("-----BEGIN PGP MESSAGE-----\n\n"));
        // "a\r\nb" in base64
        assert!(text.contains("YQ0KYg==\n"), "{}", text);
        assert!(text.ends_with("-----END PGP MESSAGE-----\n"));
    }

    #[test]
    fn sink_failure_is_a_write_error() {
        let mut pipeline = Pipeline::new(RecordingSink {
            fail_after: Some(4),
            ..Default::default()
        });
        pipeline.push(TextFilter::new());
        let err = pipeline.write_all(b"hello world").unwrap_err();
        assert!(matches!(err, Error::Write { .. }), "{:?}", err);
        pipeline.cancel().unwrap();
    }

    #[derive(Debug)]
    struct FailingFree;

    impl Filter for FailingFree {
        fn flush(&mut self, buf: &[u8], downstream: &mut dyn io::Write) -> Result<()> {
            downstream.write_all(buf)?;
            Ok(())
        }

        fn free(&mut self, _downstream: &mut dyn io::Write, _teardown: Teardown) -> Result<()> {
            bail!("trailer failed")
        }

        fn describe(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn default_underflow_is_unsupported() {
        let mut f = FailingFree;
        let mut buf = [0u8; 4];
        let err = f.underflow(&mut io::empty(), &mut buf).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn errors_keep_their_type_through_the_chain() {
        use rand::SeedableRng;

        let mut pipeline = Pipeline::new(RecordingSink::default());
        pipeline.push(ArmorFilter::new(BlockType::Message, Vec::new()));
        pipeline.push(
            CipherFilter::new(
                rand_chacha::ChaCha8Rng::seed_from_u64(0),
                crate::crypto::sym::SymmetricKeyAlgorithm::AES128,
                &[0u8; 16],
                true,
                Some(1),
                crate::types::PacketHeaderVersion::New,
                crate::packet::DEFAULT_CHUNK_SIZE,
            )
            .unwrap(),
        );
        pipeline.push(TextFilter::new());
        let err = pipeline.write_all(b"more than one byte").unwrap_err();
        assert!(matches!(err, Error::Message { .. }), "{:?}", err);

        let sink = pipeline.cancel();
        assert!(sink.is_ok());
    }

    #[test]
    fn input_pipeline_reads_through_text_filter() {
        let mut input = InputPipeline::new(&b"one\ntwo\r\nthree\r"[..]);
        input.push(TextFilter::new());
        assert_eq!(input.describe(), vec!["text_filter"]);

        let mut out = Vec::new();
        input.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"one\r\ntwo\r\nthree\r\n");
        let _ = input.into_inner();
    }

    #[test]
    fn cancel_discards() {
        let mut pipeline = Pipeline::new(RecordingSink::default());
        pipeline.push(ArmorFilter::new(BlockType::Message, Vec::new()));
        pipeline.write_all(b"abc").unwrap();
        pipeline.cancel().unwrap();
    }

    #[test]
    fn failing_close_cancels_the_rest() {
        use rand::SeedableRng;

        let mut sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(&mut sink);
        pipeline.push(ArmorFilter::new(BlockType::Message, Vec::new()));
        pipeline.push(
            CipherFilter::new(
                rand_chacha::ChaCha8Rng::seed_from_u64(0),
                crate::crypto::sym::SymmetricKeyAlgorithm::AES128,
                &[0u8; 16],
                false,
                Some(10),
                crate::types::PacketHeaderVersion::New,
                crate::packet::DEFAULT_CHUNK_SIZE,
            )
            .unwrap(),
        );
        pipeline.write_all(b"short").unwrap();
        // the cipher packet is five bytes short
        assert!(pipeline.close().is_err());

        assert!(sink.cancelled);
        assert!(!sink.finished);
        let text = String::from_utf8(sink.data.clone()).unwrap();
        assert!(!text.contains("-----END"));
    }
}
