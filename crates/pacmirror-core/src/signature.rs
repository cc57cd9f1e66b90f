//! Detached signature verification.
//!
//! Verification itself is delegated to a [`SignatureBackend`]; the default
//! [`GpgBackend`] shells out to GnuPG against a dedicated keyring. The
//! verifier then reads the signing time out of the backend transcript so
//! callers can compare it with the age of what they already trust.

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::error::{ErrorContext, MirrorError, Result};

const SIGNATURE_MADE: &str = "Signature made ";

/// Where a detached signature comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureRef {
    /// A file in the destination directory.
    File(String),
    /// Signature bytes held in memory.
    Inline(Vec<u8>),
}

/// Signature handed to a backend, resolved to a path or borrowed bytes.
#[derive(Clone, Copy, Debug)]
pub enum SignatureData<'a> {
    File(&'a Path),
    Inline(&'a [u8]),
}

/// Raw outcome of a backend run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub success: bool,
    pub transcript: String,
}

pub trait SignatureBackend {
    /// Checks `signature` against the file at `data`.
    ///
    /// A signature that does not verify is reported through
    /// [`Verification::success`]; an `Err` means the check could not be run.
    fn verify(&self, data: &Path, signature: SignatureData<'_>) -> Result<Verification>;
}

/// Runs `gpg --homedir <trust_store> --verify <sig> <file>` with `LC_ALL=C`.
#[derive(Clone, Debug)]
pub struct GpgBackend {
    gpg_bin: String,
    trust_store: PathBuf,
}

impl GpgBackend {
    pub fn new(gpg_bin: impl Into<String>, trust_store: impl Into<PathBuf>) -> Self {
        Self {
            gpg_bin: gpg_bin.into(),
            trust_store: trust_store.into(),
        }
    }
}

impl SignatureBackend for GpgBackend {
    fn verify(&self, data: &Path, signature: SignatureData<'_>) -> Result<Verification> {
        let mut cmd = Command::new(&self.gpg_bin);
        cmd.arg("--homedir")
            .arg(&self.trust_store)
            .arg("--verify")
            .env("LC_ALL", "C")
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        match signature {
            SignatureData::File(path) => cmd.arg(path).stdin(Stdio::null()),
            SignatureData::Inline(_) => cmd.arg("-").stdin(Stdio::piped()),
        };
        cmd.arg(data);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("running {}", self.gpg_bin))?;

        if let (SignatureData::Inline(bytes), Some(mut stdin)) = (signature, child.stdin.take()) {
            stdin
                .write_all(bytes)
                .with_context(|| format!("writing signature to {}", self.gpg_bin))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for {}", self.gpg_bin))?;

        Ok(Verification {
            success: output.status.success(),
            transcript: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Verifies files of one destination directory.
pub struct SignatureVerifier {
    destdir: PathBuf,
    backend: Box<dyn SignatureBackend>,
}

impl SignatureVerifier {
    pub fn new(destdir: impl Into<PathBuf>, backend: Box<dyn SignatureBackend>) -> Self {
        Self {
            destdir: destdir.into(),
            backend,
        }
    }

    /// Verifies `data_name` against `signature` and returns the signing time.
    ///
    /// # Errors
    ///
    /// * [`MirrorError::SignatureInvalid`] if the backend rejects the signature.
    /// * [`MirrorError::SignatureTimestamp`] if the signing time cannot be read.
    /// * [`MirrorError::IoError`] if the backend cannot be run.
    pub fn verify(&self, data_name: &str, signature: &SignatureRef) -> Result<DateTime<Utc>> {
        let data = self.destdir.join(data_name);
        let (sig_name, sig_path);
        let sig_data = match signature {
            SignatureRef::File(name) => {
                sig_name = name.clone();
                sig_path = self.destdir.join(name);
                SignatureData::File(&sig_path)
            }
            SignatureRef::Inline(bytes) => {
                sig_name = format!("{data_name} (inline signature)");
                SignatureData::Inline(bytes)
            }
        };

        let verification = self.backend.verify(&data, sig_data)?;
        if !verification.success {
            return Err(MirrorError::SignatureInvalid {
                file: data_name.to_string(),
                transcript: verification.transcript.trim_end().to_string(),
            });
        }
        debug!("{sig_name}: {}", verification.transcript.trim_end());

        parse_signature_time(&verification.transcript).ok_or_else(|| {
            MirrorError::SignatureTimestamp {
                file: sig_name,
                line: first_line(&verification.transcript).to_string(),
            }
        })
    }
}

fn first_line(transcript: &str) -> &str {
    transcript.lines().next().unwrap_or_default().trim_end()
}

/// Reads the signing time from the first line of a GnuPG transcript.
///
/// The line has the form `gpg: Signature made Wed May  1 12:00:00 2024 UTC`;
/// the `gpg: ` prefix and the zone are optional. `UTC` and `GMT` are read as
/// UTC, anything else as local time.
pub fn parse_signature_time(transcript: &str) -> Option<DateTime<Utc>> {
    let line = first_line(transcript);
    let rest = line.strip_prefix("gpg: ").unwrap_or(line);
    let rest = rest.strip_prefix(SIGNATURE_MADE)?;

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }
    let naive =
        NaiveDateTime::parse_from_str(&tokens[..5].join(" "), "%a %b %d %H:%M:%S %Y").ok()?;

    match tokens.get(5) {
        Some(&"UTC") | Some(&"GMT") => Some(Utc.from_utc_datetime(&naive)),
        _ => {
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
        }
    }
}
