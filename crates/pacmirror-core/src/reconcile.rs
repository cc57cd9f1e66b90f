//! Reconciling the package files of a destination directory with its index.
//!
//! Packages the index no longer lists are moved to `archive/`. Every listed
//! package is obtained (from disk or the package mirrors) and accepted if
//! its SHA-256 matches the index, or if its detached signature verifies and
//! was made no earlier than the package build date. Anything else is moved
//! to `corrupt/`. Files are never deleted.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use pacmirror_dl::{
    fetch::MirrorFetcher,
    mirror::MirrorList,
    types::{Discard, FileSource},
};
use pacmirror_registry::RepositoryDatabase;
use pacmirror_utils::{
    fs::{ensure_dir_exists, move_into_dir},
    hash::{checksum_matches, StreamHasher},
};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    error::{ErrorContext, MirrorError, Result},
    signature::{SignatureRef, SignatureVerifier},
};

pub const ARCHIVE_DIR: &str = "archive";
pub const CORRUPT_DIR: &str = "corrupt";

/// How a package file was judged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    VerifiedByHash,
    VerifiedBySignature,
    Corrupt,
}

/// A package that could not be obtained.
#[derive(Debug)]
pub struct Failure {
    pub file: String,
    pub error: MirrorError,
}

/// What a reconciliation pass did, by file name.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Packages and signatures moved to `archive/` because the index no longer lists them.
    pub archived: Vec<String>,
    pub verified: Vec<(String, Verdict)>,
    /// Packages moved to `corrupt/`.
    pub corrupt: Vec<String>,
    pub failed: Vec<Failure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty() && self.failed.is_empty()
    }

    fn fail(&mut self, file: &str, error: impl Into<MirrorError>) {
        let error = error.into();
        warn!("{file}: {error}");
        self.failed.push(Failure {
            file: file.to_string(),
            error,
        });
    }
}

fn package_re() -> &'static Regex {
    static PACKAGE_RE: OnceLock<Regex> = OnceLock::new();
    PACKAGE_RE.get_or_init(|| Regex::new(r"\.tar\.[^.]+$").unwrap())
}

fn signature_re() -> &'static Regex {
    static SIGNATURE_RE: OnceLock<Regex> = OnceLock::new();
    SIGNATURE_RE.get_or_init(|| Regex::new(r"\.tar\.[^.]+\.sig$").unwrap())
}

/// Package files and package signatures present in a directory.
#[derive(Debug, Default)]
struct LocalFiles {
    packages: BTreeSet<String>,
    signatures: BTreeSet<String>,
}

fn scan_local(dir: &Path) -> Result<LocalFiles> {
    let mut local = LocalFiles::default();
    let entries = fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry of {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("inspecting {}", entry.path().display()))?;
        if !file_type.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };

        if package_re().is_match(&name) {
            local.packages.insert(name);
        } else if signature_re().is_match(&name) {
            local.signatures.insert(name);
        }
    }

    Ok(local)
}

pub struct CacheReconciler<'a> {
    fetcher: &'a MirrorFetcher,
    verifier: &'a SignatureVerifier,
    pkg_mirrors: &'a MirrorList,
    meta_mirrors: &'a MirrorList,
    mirror_signatures: bool,
}

impl<'a> CacheReconciler<'a> {
    pub fn new(
        fetcher: &'a MirrorFetcher,
        verifier: &'a SignatureVerifier,
        pkg_mirrors: &'a MirrorList,
        meta_mirrors: &'a MirrorList,
    ) -> Self {
        Self {
            fetcher,
            verifier,
            pkg_mirrors,
            meta_mirrors,
            mirror_signatures: true,
        }
    }

    /// Also fetch the signature of packages accepted by checksum.
    pub fn mirror_signatures(mut self, enabled: bool) -> Self {
        self.mirror_signatures = enabled;
        self
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.fetcher.destdir().join(ARCHIVE_DIR)
    }

    pub fn corrupt_dir(&self) -> PathBuf {
        self.fetcher.destdir().join(CORRUPT_DIR)
    }

    /// Brings the destination directory in line with `database`.
    ///
    /// With `local_only`, missing packages and signatures are not fetched.
    /// A file that cannot be obtained, judged or moved is recorded in
    /// [`ReconcileReport::failed`], left where it is, and the pass goes on.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lists an unusable file name or the
    /// destination directory cannot be prepared or read.
    pub fn reconcile(
        &self,
        database: &RepositoryDatabase,
        local_only: bool,
    ) -> Result<ReconcileReport> {
        let destdir = self.fetcher.destdir();
        let (archive_dir, corrupt_dir) = (self.archive_dir(), self.corrupt_dir());
        ensure_dir_exists(&archive_dir)?;
        ensure_dir_exists(&corrupt_dir)?;

        let remote = database.remote_files()?;
        let local = scan_local(destdir)?;
        let mut report = ReconcileReport::default();

        let obsolete_packages = local
            .packages
            .iter()
            .filter(|name| !remote.contains_key(name.as_str()));
        let obsolete_signatures = local.signatures.iter().filter(|name| {
            let package = name.strip_suffix(".sig").unwrap_or(name.as_str());
            !remote.contains_key(package)
        });
        for name in obsolete_packages.chain(obsolete_signatures) {
            match move_into_dir(destdir.join(name), &archive_dir) {
                Ok(target) => {
                    debug!("{name}: archived as {}", target.display());
                    report.archived.push(name.clone());
                }
                Err(err) => report.fail(name, err),
            }
        }
        if !report.archived.is_empty() {
            info!("archived {} files", report.archived.len());
        }

        for (&filename, desc) in &remote {
            let (expected, build_date) = match (desc.sha256sum(), desc.build_date()) {
                (Ok(sha), Ok(date)) => (sha, date),
                (Err(err), _) | (_, Err(err)) => {
                    report.fail(filename, err);
                    continue;
                }
            };

            let source = if local_only || local.packages.contains(filename) {
                FileSource::Local
            } else {
                FileSource::Remote(self.pkg_mirrors)
            };
            let mut hasher = StreamHasher::new();
            if let Err(err) = self.fetcher.fetch(filename, source, &mut hasher) {
                report.fail(filename, err);
                continue;
            }

            if let Some(csize) = desc.integer("CSIZE") {
                if hasher.bytes() != csize as u64 {
                    debug!("{filename}: {} bytes, index says {csize}", hasher.bytes());
                }
            }
            let actual = hasher.finalize_hex();
            let verdict = match self.judge(filename, &actual, expected, build_date, local_only) {
                Ok(verdict) => verdict,
                Err(err) => {
                    report.fail(filename, err);
                    continue;
                }
            };

            match verdict {
                Verdict::Corrupt => {
                    match self.quarantine(filename) {
                        Ok(()) => report.corrupt.push(filename.to_string()),
                        Err(err) => report.fail(filename, err),
                    }
                }
                Verdict::VerifiedByHash => {
                    if self.mirror_signatures && !local_only {
                        self.complete_signature(filename);
                    }
                    report.verified.push((filename.to_string(), verdict));
                }
                Verdict::VerifiedBySignature => {
                    report.verified.push((filename.to_string(), verdict));
                }
            }
        }

        Ok(report)
    }

    /// Decides whether the bytes just read for `filename` can be trusted.
    ///
    /// A checksum match wins outright. Otherwise the detached signature
    /// `<filename>.sig` is obtained and must verify with a signing time at or
    /// after `build_date`.
    pub fn judge(
        &self,
        filename: &str,
        actual_sha256: &str,
        expected_sha256: &str,
        build_date: i64,
        local_only: bool,
    ) -> Result<Verdict> {
        if checksum_matches(actual_sha256, expected_sha256) {
            return Ok(Verdict::VerifiedByHash);
        }
        debug!("{filename}: checksum mismatch, checking signature");

        let sig_name = format!("{filename}.sig");
        let source = if local_only || self.fetcher.path_of(&sig_name).exists() {
            FileSource::Local
        } else {
            FileSource::Remote(self.meta_mirrors)
        };
        if let Err(err) = self.fetcher.fetch(&sig_name, source, &mut Discard) {
            warn!("{sig_name}: {err}");
            return Ok(Verdict::Corrupt);
        }

        match self.verifier.verify(filename, &SignatureRef::File(sig_name)) {
            Ok(signed) if signed.timestamp() >= build_date => Ok(Verdict::VerifiedBySignature),
            Ok(signed) => {
                warn!("{filename} was signed at {signed}, before its build date");
                Ok(Verdict::Corrupt)
            }
            Err(err) if err.is_signature_failure() => {
                warn!("{err}");
                Ok(Verdict::Corrupt)
            }
            Err(err) => Err(err),
        }
    }

    /// Moves a corrupt package to `corrupt/` and its signature, if any, to `archive/`.
    fn quarantine(&self, filename: &str) -> Result<()> {
        let target = move_into_dir(self.fetcher.path_of(filename), self.corrupt_dir())?;
        warn!("{filename} is corrupt, moved to {}", target.display());

        let sig = self.fetcher.path_of(&format!("{filename}.sig"));
        if sig.exists() {
            move_into_dir(&sig, self.archive_dir())?;
        }
        Ok(())
    }

    fn complete_signature(&self, filename: &str) {
        let sig_name = format!("{filename}.sig");
        if self.fetcher.path_of(&sig_name).exists() {
            return;
        }
        if let Err(err) =
            self.fetcher
                .fetch(&sig_name, FileSource::Remote(self.meta_mirrors), &mut Discard)
        {
            warn!("{sig_name}: {err}");
        }
    }
}
