//! Fetching and authenticating a repository index.
//!
//! Each checked archive (`<repo>.db`, then `<repo>.files`) is replaced only by
//! a copy whose detached signature verifies and is not older than the copy
//! already on disk. The previous copy is kept as `<name>.old` while the new
//! one is checked, and put back if anything goes wrong.

use std::{fs, io, path::PathBuf};

use chrono::{DateTime, Utc};
use pacmirror_dl::{
    fetch::MirrorFetcher,
    mirror::MirrorList,
    types::{Discard, FileSource},
};
use pacmirror_registry::{read_database, RepositoryDatabase};
use pacmirror_utils::fs::{rename, safe_remove};
use tracing::{debug, info, warn};

use crate::{
    error::{ErrorContext, MirrorError, Result},
    signature::{SignatureRef, SignatureVerifier},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Verifying,
    /// The index was authenticated and decoded.
    Accepted,
    /// A check failed and the previous copy was put back.
    RolledBack,
    /// A check failed with no previous copy to restore.
    Failed,
}

/// An active file moved aside to `<name>.old`.
struct Backup {
    active: PathBuf,
    old: PathBuf,
}

pub struct DatabaseSync<'a> {
    name: String,
    fetcher: &'a MirrorFetcher,
    verifier: &'a SignatureVerifier,
    meta_mirrors: &'a MirrorList,
    state: SyncState,
}

impl<'a> DatabaseSync<'a> {
    /// Creates a sync for repository `name`, whose index is `<name>.db`.
    pub fn new(
        name: impl Into<String>,
        fetcher: &'a MirrorFetcher,
        verifier: &'a SignatureVerifier,
        meta_mirrors: &'a MirrorList,
    ) -> Self {
        Self {
            name: name.into(),
            fetcher,
            verifier,
            meta_mirrors,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn db_name(&self) -> String {
        format!("{}.db", self.name)
    }

    pub fn files_name(&self) -> String {
        format!("{}.files", self.name)
    }

    /// Brings the index up to date and decodes it.
    ///
    /// Remotely, `<name>.db` and `<name>.files` are fetched with their
    /// signatures from the metadata mirrors. Each must verify with a signing
    /// time no older than the modification time of the copy it replaces.
    ///
    /// With `local_only`, the existing `<name>.db` and its signature are
    /// verified as they are, without a freshness check.
    ///
    /// # Errors
    ///
    /// * [`MirrorError::StaleIndex`] if a mirror serves an older index.
    /// * [`MirrorError::SignatureInvalid`] or [`MirrorError::SignatureTimestamp`]
    ///   if an archive does not verify.
    /// * [`MirrorError::Download`] if an archive cannot be obtained.
    /// * [`MirrorError::Registry`] if the index cannot be decoded.
    pub fn refresh(&mut self, local_only: bool) -> Result<RepositoryDatabase> {
        let db_name = self.db_name();

        if local_only {
            self.check_local(&db_name)?;
        } else {
            let files_name = self.files_name();
            self.refresh_checked(&db_name)?;
            self.refresh_checked(&files_name)?;
        }

        match read_database(self.fetcher.path_of(&db_name)) {
            Ok(database) => {
                self.state = SyncState::Accepted;
                info!("{db_name}: {} packages", database.len());
                Ok(database)
            }
            Err(err) => {
                self.state = SyncState::Failed;
                Err(err.into())
            }
        }
    }

    fn check_local(&mut self, name: &str) -> Result<()> {
        let sig_name = format!("{name}.sig");
        if let Err(err) = self.verify_local(name, &sig_name) {
            self.state = SyncState::Failed;
            return Err(err);
        }
        Ok(())
    }

    fn verify_local(&mut self, name: &str, sig_name: &str) -> Result<()> {
        self.state = SyncState::Fetching;
        self.fetcher.fetch(name, FileSource::Local, &mut Discard)?;
        self.fetcher.fetch(sig_name, FileSource::Local, &mut Discard)?;

        self.state = SyncState::Verifying;
        self.verifier
            .verify(name, &SignatureRef::File(sig_name.to_string()))?;
        Ok(())
    }

    fn refresh_checked(&mut self, name: &str) -> Result<()> {
        let sig_name = format!("{name}.sig");
        let path = self.fetcher.path_of(name);

        let ts_old = match fs::metadata(&path) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .with_context(|| format!("reading modification time of {name}"))?;
                Some(DateTime::<Utc>::from(modified))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(MirrorError::IoError {
                    action: format!("inspecting {}", path.display()),
                    source: err,
                })
            }
        };

        let mut backups: Vec<Backup> = Vec::new();
        if ts_old.is_some() {
            for file in [name, sig_name.as_str()] {
                let active = self.fetcher.path_of(file);
                if !active.exists() {
                    continue;
                }
                let old = self.fetcher.path_of(&format!("{file}.old"));
                if let Err(err) = rename(&active, &old) {
                    for backup in &backups {
                        rename(&backup.old, &backup.active)?;
                    }
                    self.state = SyncState::Failed;
                    return Err(err.into());
                }
                debug!("{file}: kept previous copy as {}", old.display());
                backups.push(Backup {
                    active,
                    old,
                });
            }
        }

        match self.fetch_and_verify(name, &sig_name, ts_old) {
            Ok(()) => {
                for backup in &backups {
                    safe_remove(&backup.old)?;
                }
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = self.roll_back(name, &sig_name, &backups) {
                    warn!("{name}: {err}");
                    return Err(rollback_err);
                }
                Err(err)
            }
        }
    }

    fn fetch_and_verify(
        &mut self,
        name: &str,
        sig_name: &str,
        ts_old: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let source = FileSource::Remote(self.meta_mirrors);

        self.state = SyncState::Fetching;
        self.fetcher.fetch(name, source, &mut Discard)?;
        self.fetcher.fetch(sig_name, source, &mut Discard)?;

        self.state = SyncState::Verifying;
        let ts_new = self
            .verifier
            .verify(name, &SignatureRef::File(sig_name.to_string()))?;

        if let Some(previous) = ts_old {
            if ts_new < previous {
                return Err(MirrorError::StaleIndex {
                    file: name.to_string(),
                    previous,
                    current: ts_new,
                });
            }
        }

        debug!("{name}: signed at {ts_new}");
        Ok(())
    }

    /// Drops whatever was fetched for `name` and restores `backups`.
    fn roll_back(&mut self, name: &str, sig_name: &str, backups: &[Backup]) -> Result<()> {
        self.state = SyncState::Failed;

        safe_remove(self.fetcher.path_of(name))?;
        safe_remove(self.fetcher.path_of(sig_name))?;
        for backup in backups {
            rename(&backup.old, &backup.active)?;
        }

        if !backups.is_empty() {
            info!("{name}: restored previous copy");
            self.state = SyncState::RolledBack;
        }
        Ok(())
    }
}
