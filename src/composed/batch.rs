use std::io::{BufRead, Read};
use std::path::PathBuf;

use log::debug;
use rand::{CryptoRng, Rng};

use crate::composed::encoder::{Encoder, Input, Mode, Output};
use crate::composed::status::{StatusEvent, StatusSink};
use crate::composed::{EncryptConfig, KeyDatabase};
use crate::errors::{ensure, Result};

/// Longest accepted line of a file list, line feed included.
pub const MAX_LINE_LEN: usize = 2047;

/// Outcome of a batch encryption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub successes: Vec<String>,
    /// File name and reason.
    pub failures: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Encrypts every file in `names` to `recipients`, each to its own output file.
///
/// A failing file is reported and skipped, the remaining files are still encrypted.
pub fn encrypt_files<R, I, S>(
    mut rng: R,
    config: &EncryptConfig,
    names: I,
    recipients: &[String],
    keydb: &dyn KeyDatabase,
    status: &dyn StatusSink,
) -> Result<BatchReport>
where
    R: Rng + CryptoRng,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    check_config(config)?;

    let mut report = BatchReport::default();
    for name in names {
        encrypt_one(&mut rng, config, name.as_ref(), recipients, keydb, status, &mut report);
    }
    Ok(report)
}

/// Like [`encrypt_files`], with one file name per line of `reader`.
///
/// A line longer than [`MAX_LINE_LEN`] or without a final line feed stops the batch.
pub fn encrypt_files_from_reader<R, B>(
    mut rng: R,
    config: &EncryptConfig,
    mut reader: B,
    recipients: &[String],
    keydb: &dyn KeyDatabase,
    status: &dyn StatusSink,
) -> Result<BatchReport>
where
    R: Rng + CryptoRng,
    B: BufRead,
{
    check_config(config)?;

    let mut report = BatchReport::default();
    let mut line = Vec::with_capacity(MAX_LINE_LEN);
    let mut lnr = 0u32;
    loop {
        line.clear();
        let n = (&mut reader).take(MAX_LINE_LEN as u64).read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        lnr += 1;
        ensure!(
            line.last() == Some(&b'\n'),
            "input line {} too long or missing LF",
            lnr
        );
        line.pop();

        let name = String::from_utf8_lossy(&line);
        if name.is_empty() {
            debug!("line {}: no file name", lnr);
            continue;
        }
        encrypt_one(&mut rng, config, &name, recipients, keydb, status, &mut report);
    }
    Ok(report)
}

fn check_config(config: &EncryptConfig) -> Result<()> {
    ensure!(
        config.output.is_none(),
        "an output file can not be used when encrypting multiple files"
    );
    Ok(())
}

fn encrypt_one<R: Rng + CryptoRng>(
    rng: &mut R,
    config: &EncryptConfig,
    name: &str,
    recipients: &[String],
    keydb: &dyn KeyDatabase,
    status: &dyn StatusSink,
    report: &mut BatchReport,
) {
    status.emit(StatusEvent::FileStart {
        name: name.to_string(),
    });

    let mode = Mode::PublicKey {
        recipients,
        keydb,
        passphrase: None,
    };
    let result = Encoder::new(config).with_status(status).encode(
        &mut *rng,
        mode,
        Input::Path(PathBuf::from(name)),
        Output::Auto,
    );

    match result {
        Ok(()) => {
            status.emit(StatusEvent::FileDone {
                name: name.to_string(),
            });
            report.successes.push(name.to_string());
        }
        Err(err) => {
            let reason = err.to_string();
            status.emit(StatusEvent::FileFailed {
                name: name.to_string(),
                reason: reason.clone(),
            });
            report.failures.push((name.to_string(), reason));
        }
    }
}
