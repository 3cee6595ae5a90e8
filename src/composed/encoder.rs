//! Sequences input, key setup, output and the stage chain of one encryption.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, info, warn};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::composed::session_key::{encode_for_passphrase, negotiate_compression, SessionKey};
use crate::composed::sink::{output_path_for, FileSink, WriterSink};
use crate::composed::source::{FileSource, ReaderSource, Source, StdinSource};
use crate::composed::status::{LogStatus, StatusEvent, StatusSink};
use crate::composed::{EncryptConfig, KeyDatabase, PassphraseProvider};
use crate::crypto::public_key::{PublicKeyTransform, StandardTransform};
use crate::errors::{Error, Result};
use crate::packet::{
    Comment, DataMode, LiteralDataHeader, LiteralLength, PacketBodyWriter, PacketTrait,
    SymKeyEncryptedSessionKey,
};
use crate::pipeline::{
    ArmorFilter, BlockType, CipherFilter, CompressFilter, EncryptFilter, EncryptParams,
    InputPipeline, Pipeline, Sink, TextFilter, COPY_BUFFER_SIZE,
};
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, PacketHeaderVersion, StringToKey, Tag};

/// Compression used when nothing else is configured or negotiated.
const DEFAULT_COMPRESSION: CompressionAlgorithm = CompressionAlgorithm::ZIP;

static LOG_STATUS: LogStatus = LogStatus;

/// Progress of a single [`Encoder::encode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    InputOpened,
    KeyReady,
    OutputOpened,
    PipelineAttached,
    Emitting,
    Finalized,
    Aborted,
}

/// How the message is protected.
#[derive(derive_more::Debug)]
pub enum Mode<'a> {
    /// No encryption, only the literal data (optionally compressed and armored).
    Store,
    /// Encryption to a passphrase.
    Symmetric {
        #[debug(skip)]
        passphrase: &'a dyn PassphraseProvider,
    },
    /// Encryption to public keys, optionally also to a passphrase.
    PublicKey {
        recipients: &'a [String],
        #[debug(skip)]
        keydb: &'a dyn KeyDatabase,
        #[debug(skip)]
        passphrase: Option<&'a dyn PassphraseProvider>,
    },
}

impl Mode<'_> {
    fn is_store(&self) -> bool {
        matches!(self, Mode::Store)
    }
}

/// Where the plaintext comes from.
#[derive(derive_more::Debug)]
pub enum Input<'a> {
    Path(PathBuf),
    Stdin,
    Source(#[debug(skip)] Box<dyn Source + 'a>),
}

impl<'a> Input<'a> {
    fn open(self) -> Result<Box<dyn Source + 'a>> {
        match self {
            Input::Path(path) => Ok(Box::new(FileSource::open(path)?)),
            Input::Stdin => Ok(Box::new(StdinSource::new())),
            Input::Source(source) => Ok(source),
        }
    }
}

/// Where the message goes.
#[derive(derive_more::Debug)]
pub enum Output<'a> {
    /// The configured output, else a file next to the input, else stdout.
    Auto,
    Path(PathBuf),
    Sink(#[debug(skip)] Box<dyn Sink + 'a>),
}

/// Session key material prepared before the output is opened.
enum KeyPlan {
    Store,
    Symmetric {
        dek: SessionKey,
        skesk: Option<SymKeyEncryptedSessionKey>,
    },
    PublicKey(Box<EncryptParams>),
}

struct Setup<'s> {
    plan: KeyPlan,
    sink: Box<dyn Sink + 's>,
    compress: bool,
    length: LiteralLength,
    file_name: Bytes,
}

/// Runs encryptions with one configuration.
#[derive(derive_more::Debug)]
pub struct Encoder<'a> {
    config: &'a EncryptConfig,
    #[debug(skip)]
    status: &'a dyn StatusSink,
    #[debug(skip)]
    transform: Arc<dyn PublicKeyTransform + Send + Sync>,
    state: State,
}

impl<'a> Encoder<'a> {
    /// An encoder reporting to the `log` facade and using the built in public key algorithms.
    pub fn new(config: &'a EncryptConfig) -> Self {
        Encoder {
            config,
            status: &LOG_STATUS,
            transform: Arc::new(StandardTransform),
            state: State::Idle,
        }
    }

    pub fn with_status(mut self, status: &'a dyn StatusSink) -> Self {
        self.status = status;
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn PublicKeyTransform + Send + Sync>) -> Self {
        self.transform = transform;
        self
    }

    pub fn config(&self) -> &EncryptConfig {
        self.config
    }

    /// Where the last operation ended, or got to.
    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        debug!("encoder: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Encrypts `input` to `output`.
    ///
    /// On failure the input is closed and the output cancelled, a partially
    /// written output file is removed.
    pub fn encode<R: Rng + CryptoRng>(
        &mut self,
        mut rng: R,
        mode: Mode<'_>,
        input: Input<'_>,
        output: Output<'_>,
    ) -> Result<()> {
        self.state = State::Idle;

        let mut source = match input.open() {
            Ok(source) => source,
            Err(err) => {
                self.transition(State::Aborted);
                return Err(err);
            }
        };
        self.transition(State::InputOpened);
        info!("reading from `{}'", source.name());

        let name = source.name().to_string();
        match self.encode_opened(&mut rng, &mode, &mut *source, output) {
            Ok(()) => {
                self.transition(State::Finalized);
                if !mode.is_store() {
                    self.status.emit(StatusEvent::EndEncryption);
                }
                Ok(())
            }
            Err(err) => {
                self.transition(State::Aborted);
                error!("{}: encryption failed: {}", name, err);
                Err(err)
            }
        }
    }

    /// Everything after the input is open. The input is closed on every path.
    fn encode_opened<R: Rng + CryptoRng>(
        &mut self,
        rng: &mut R,
        mode: &Mode<'_>,
        source: &mut dyn Source,
        output: Output<'_>,
    ) -> Result<()> {
        let setup = match self.setup(rng, mode, source, output) {
            Ok(setup) => setup,
            Err(err) => {
                close_source(source);
                return Err(err);
            }
        };

        let mut pipeline = Pipeline::new(setup.sink);
        let result = self
            .attach(
                rng,
                &mut pipeline,
                setup.plan,
                setup.compress,
                setup.length,
                setup.file_name,
            )
            .and_then(|header| {
                self.transition(State::Emitting);
                self.emit(&mut pipeline, source, header)
            });
        close_source(source);

        match result {
            Ok(()) => {
                pipeline.close()?;
                Ok(())
            }
            Err(err) => {
                if let Err(cancel_err) = pipeline.cancel() {
                    debug!("cancel after failure: {:?}", cancel_err);
                }
                Err(err)
            }
        }
    }

    /// Inspects the input, prepares the key material and opens the output.
    fn setup<'s, R: Rng + CryptoRng>(
        &mut self,
        rng: &mut R,
        mode: &Mode<'_>,
        source: &mut dyn Source,
        output: Output<'s>,
    ) -> Result<Setup<'s>> {
        let mut compress = self.config.compression_enabled();
        if compress && source.is_compressed()? {
            self.status.emit(StatusEvent::Warning {
                message: format!("{}: already compressed", source.name()),
            });
            compress = false;
        }
        let length = self.literal_length(source);
        let file_name = literal_name(self.config.set_filename.as_deref(), source.path());

        let plan = self.prepare_key(rng, mode)?;
        self.transition(State::KeyReady);

        let sink = self.open_output(source, output)?;
        self.transition(State::OutputOpened);

        Ok(Setup {
            plan,
            sink,
            compress,
            length,
            file_name,
        })
    }

    /// The declared length of the literal data. Text mode changes the length, it is never declared.
    fn literal_length(&self, source: &dyn Source) -> LiteralLength {
        let file_len = source.file_len();
        if file_len == Some(0) {
            self.status.emit(StatusEvent::Warning {
                message: format!("{}: WARNING: empty file", source.name()),
            });
        }
        if self.config.textmode {
            return LiteralLength::Unknown;
        }
        LiteralLength::from_file_len(file_len.or(self.config.set_filesize).unwrap_or(0))
    }

    fn s2k<R: Rng + CryptoRng>(&self, rng: &mut R) -> Result<StringToKey> {
        StringToKey::from_type(
            rng,
            self.config.effective_s2k_mode(),
            self.config.effective_s2k_digest(),
            self.config.s2k_count,
        )
    }

    fn prepare_key<R: Rng + CryptoRng>(&self, rng: &mut R, mode: &Mode<'_>) -> Result<KeyPlan> {
        let config = self.config;
        match *mode {
            Mode::Store => Ok(KeyPlan::Store),
            Mode::Symmetric { passphrase } => {
                let s2k = self.s2k(rng)?;
                let alg = config.effective_s2k_cipher();
                if config.rfc1991 {
                    let dek = SessionKey::derive_from_passphrase(&s2k, alg, passphrase)?;
                    return Ok(KeyPlan::Symmetric { dek, skesk: None });
                }

                let secret = passphrase.obtain_passphrase().ok_or_else(|| Error::Passphrase {
                    message: "no passphrase given".to_string(),
                })?;
                let dek = SessionKey::generate(&mut *rng, alg)?.with_mdc(true);
                let skesk = encode_for_passphrase(&dek, &s2k, &secret, false)?;
                Ok(KeyPlan::Symmetric { dek, skesk })
            }
            Mode::PublicKey {
                recipients,
                keydb,
                passphrase,
            } => {
                let recipients = keydb.resolve(recipients)?;
                let passphrase = match passphrase {
                    Some(provider) => {
                        let secret = provider.obtain_passphrase().ok_or_else(|| Error::Passphrase {
                            message: "no passphrase given".to_string(),
                        })?;
                        Some((self.s2k(rng)?, secret))
                    }
                    None => None,
                };

                Ok(KeyPlan::PublicKey(Box::new(EncryptParams {
                    recipients,
                    transform: self.transform.clone(),
                    cipher: config.cipher,
                    force_mdc: config.force_mdc,
                    throw_keyid: config.throw_keyid,
                    passphrase,
                    session_key: None,
                    datalen: None,
                    version: config.header_version(),
                    chunk_size: config.chunk_size,
                })))
            }
        }
    }

    fn open_output<'s>(&self, source: &dyn Source, output: Output<'s>) -> Result<Box<dyn Sink + 's>> {
        let path = match output {
            Output::Sink(sink) => return Ok(sink),
            Output::Path(path) => path,
            Output::Auto => match (&self.config.output, source.path()) {
                (Some(path), _) => path.clone(),
                (None, Some(input)) => output_path_for(input, self.config.armor),
                (None, None) => {
                    debug!("writing to stdout");
                    return Ok(Box::new(WriterSink::stdout()));
                }
            },
        };
        Ok(Box::new(FileSink::create(path)?))
    }

    /// Pushes the stages and writes the packets that go in front of the data.
    ///
    /// Returns the literal data header, if the data is wrapped in one.
    fn attach<R: Rng + CryptoRng, W: Sink>(
        &mut self,
        rng: &mut R,
        pipeline: &mut Pipeline<W>,
        plan: KeyPlan,
        compress: bool,
        length: LiteralLength,
        file_name: Bytes,
    ) -> Result<Option<LiteralDataHeader>> {
        let config = self.config;
        let version = config.header_version();

        let header = if config.no_literal {
            None
        } else {
            let mode = if config.textmode {
                DataMode::Text
            } else {
                DataMode::Binary
            };
            Some(LiteralDataHeader::new(
                mode,
                file_name,
                config.literal_timestamp()?,
                length.known(),
            ))
        };

        let compression = match (&plan, compress) {
            (_, false) => None,
            (KeyPlan::PublicKey(params), true) => match config.compression {
                Some(alg) => Some(alg),
                None => negotiate_compression(&params.recipients),
            },
            (_, true) => Some(config.compression.unwrap_or(DEFAULT_COMPRESSION)),
        }
        .filter(|alg| *alg != CompressionAlgorithm::Uncompressed);

        // the cipher can state its length only if the literal packet goes in unchanged
        let datalen = match (&header, compression) {
            (Some(header), None) => header.packet_len().and_then(|len| {
                let total = version.header_len(len as usize) as u64 + u64::from(len);
                u32::try_from(total).ok()
            }),
            _ => None,
        };

        if config.armor {
            pipeline.push(ArmorFilter::new(BlockType::Message, config.comments.clone()));
        } else {
            for text in &config.comments {
                Comment::new(text.clone())
                    .to_writer_with_new_header(&mut *pipeline)
                    .map_err(packet_build_error)?;
            }
        }

        match plan {
            KeyPlan::Store => {}
            KeyPlan::Symmetric { dek, skesk } => {
                if let Some(skesk) = skesk {
                    skesk
                        .to_writer_with_header(version, &mut *pipeline)
                        .map_err(packet_build_error)?;
                }
                pipeline.push(CipherFilter::new(
                    &mut *rng,
                    dek.algorithm(),
                    dek.key(),
                    dek.mdc(),
                    datalen,
                    version,
                    config.chunk_size,
                )?);
            }
            KeyPlan::PublicKey(mut params) => {
                params.datalen = datalen;
                pipeline.push(EncryptFilter::new(&mut *rng, *params));
            }
        }

        if let Some(alg) = compression {
            pipeline.push(CompressFilter::new(alg, version, config.chunk_size)?);
        }

        self.transition(State::PipelineAttached);
        debug!("stages: {:?}", pipeline.describe());
        Ok(header)
    }

    /// Copies the input into the pipeline.
    fn emit<W: Sink>(
        &mut self,
        pipeline: &mut Pipeline<W>,
        source: &mut dyn Source,
        header: Option<LiteralDataHeader>,
    ) -> Result<()> {
        let mut reader: Box<dyn Read + '_> = if self.config.textmode {
            let mut input = InputPipeline::new(source);
            input.push(TextFilter::new());
            Box::new(input)
        } else {
            Box::new(source)
        };
        let mut buf = Zeroizing::new(vec![0u8; COPY_BUFFER_SIZE]);

        let Some(header) = header else {
            loop {
                let n = read_some(reader.as_mut(), &mut buf)?;
                if n == 0 {
                    return Ok(());
                }
                pipeline.write_all(&buf[..n])?;
            }
        };

        let version = self.config.header_version();
        let mut body = PacketBodyWriter::for_length(
            version,
            Tag::LiteralData,
            header.packet_len(),
            self.config.chunk_size,
        )?;
        body.write(pipeline, &header.to_bytes()?)
            .map_err(packet_build_error)?;

        loop {
            let n = read_some(reader.as_mut(), &mut buf)?;
            if n == 0 {
                break;
            }
            body.write(pipeline, &buf[..n]).map_err(Error::flatten_io)?;
        }
        body.finish(pipeline).map_err(Error::flatten_io)
    }
}

/// The file name stored in the literal packet: the base name only.
fn literal_name(explicit: Option<&str>, path: Option<&Path>) -> Bytes {
    explicit
        .map(Path::new)
        .or(path)
        .and_then(Path::file_name)
        .map(|name| Bytes::from(name.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// Output failures while a packet is written become [`Error::PacketBuild`].
///
/// Errors raised by a stage, such as a recipient key rejecting the session
/// key, keep their own kind.
fn packet_build_error(err: Error) -> Error {
    match err.flatten_io() {
        err @ (Error::Write { .. } | Error::IO { .. }) => Error::PacketBuild {
            source: Box::new(err),
        },
        err => err,
    }
}

fn read_some(reader: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

fn close_source(source: &mut dyn Source) {
    if let Err(err) = source.close() {
        warn!("{}: closing input failed: {}", source.name(), err);
    }
}

/// Writes the literal data without encryption.
pub fn encrypt_store<R: Rng + CryptoRng>(
    rng: R,
    config: &EncryptConfig,
    input: Input<'_>,
    output: Output<'_>,
) -> Result<()> {
    Encoder::new(config).encode(rng, Mode::Store, input, output)
}

/// Encrypts to a passphrase.
pub fn encrypt_symmetric<R: Rng + CryptoRng>(
    rng: R,
    config: &EncryptConfig,
    input: Input<'_>,
    output: Output<'_>,
    passphrase: &dyn PassphraseProvider,
) -> Result<()> {
    Encoder::new(config).encode(rng, Mode::Symmetric { passphrase }, input, output)
}

/// Encrypts to the keys found for `recipients` in `keydb`.
pub fn encrypt_public_key<R: Rng + CryptoRng>(
    rng: R,
    config: &EncryptConfig,
    input: Input<'_>,
    output: Output<'_>,
    recipients: &[String],
    keydb: &dyn KeyDatabase,
) -> Result<()> {
    let mode = Mode::PublicKey {
        recipients,
        keydb,
        passphrase: None,
    };
    Encoder::new(config).encode(rng, mode, input, output)
}

/// Encrypts everything `reader` yields to a passphrase, writing the message to `writer`.
pub fn encrypt_symmetric_to_writer<R, I, W>(
    rng: R,
    config: &EncryptConfig,
    reader: I,
    writer: W,
    passphrase: &dyn PassphraseProvider,
) -> Result<()>
where
    R: Rng + CryptoRng,
    I: Read,
    W: io::Write,
{
    let input = Input::Source(Box::new(ReaderSource::new(reader)));
    let output = Output::Sink(Box::new(WriterSink::new(writer)));
    encrypt_symmetric(rng, config, input, output, passphrase)
}
