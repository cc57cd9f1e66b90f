use std::path::{Path, PathBuf};

use pacmirror_config::{config::Config, repository::Repository};
use pacmirror_dl::{fetch::MirrorFetcher, http_client::ClientConfig, mirror::MirrorList};
use pacmirror_utils::fs::ensure_dir_exists;
use tracing::info;

use crate::{
    error::Result,
    reconcile::{CacheReconciler, ReconcileReport},
    signature::{GpgBackend, SignatureBackend, SignatureVerifier},
    sync::DatabaseSync,
};

/// One configured repository bound to its local directory.
pub struct RepositoryMirror {
    name: String,
    fetcher: MirrorFetcher,
    verifier: SignatureVerifier,
    meta_mirrors: MirrorList,
    pkg_mirrors: MirrorList,
    mirror_signatures: bool,
}

impl RepositoryMirror {
    /// Binds `repo` to its directory below `root`, verifying with GnuPG as configured.
    pub fn new(
        repo: &Repository,
        root: &Path,
        config: &Config,
        client: &ClientConfig,
    ) -> Result<Self> {
        let backend = GpgBackend::new(config.gpg_bin(), config.trust_store()?);
        Ok(Self::with_backend(repo, root, client, Box::new(backend))?
            .mirror_signatures(config.mirror_signatures()))
    }

    pub fn with_backend(
        repo: &Repository,
        root: &Path,
        client: &ClientConfig,
        backend: Box<dyn SignatureBackend>,
    ) -> Result<Self> {
        let destdir = repo.get_path(root);
        Ok(Self {
            name: repo.name.clone(),
            fetcher: MirrorFetcher::new(&destdir, client),
            verifier: SignatureVerifier::new(&destdir, backend),
            meta_mirrors: MirrorList::new(&repo.meta_mirrors)?,
            pkg_mirrors: MirrorList::new(&repo.pkg_mirrors)?,
            mirror_signatures: true,
        })
    }

    pub fn mirror_signatures(mut self, enabled: bool) -> Self {
        self.mirror_signatures = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destdir(&self) -> PathBuf {
        self.fetcher.destdir().to_path_buf()
    }

    /// Refreshes the index, then reconciles the package files against it.
    ///
    /// With `local_only` nothing is fetched: the index and packages already on
    /// disk are verified as they are.
    pub fn run(&self, local_only: bool) -> Result<ReconcileReport> {
        ensure_dir_exists(self.fetcher.destdir())?;
        info!("{}: {}", self.name, self.fetcher.destdir().display());

        let mut sync = DatabaseSync::new(
            &self.name,
            &self.fetcher,
            &self.verifier,
            &self.meta_mirrors,
        );
        let database = sync.refresh(local_only)?;

        let report = CacheReconciler::new(
            &self.fetcher,
            &self.verifier,
            &self.pkg_mirrors,
            &self.meta_mirrors,
        )
        .mirror_signatures(self.mirror_signatures)
        .reconcile(&database, local_only)?;

        info!(
            "{}: {} verified, {} archived, {} corrupt, {} failed",
            self.name,
            report.verified.len(),
            report.archived.len(),
            report.corrupt.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use chrono::{TimeZone, Utc};
    use pacmirror_dl::testing::TestServer;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        error::MirrorError,
        reconcile::Verdict,
        testing::{desc_text, good_signature, index_archive, sha256_hex, FakeBackend},
    };

    fn client() -> ClientConfig {
        ClientConfig {
            user_agent: None,
            proxy: None,
            timeout: Some(Duration::from_secs(5)),
            download_timeout: Some(Duration::from_secs(5)),
        }
    }

    fn repository(server: &TestServer) -> Repository {
        let mut config = Config::from_toml(&format!(
            r#"
            [[repositories]]
            name = "msys"
            path = "msys/x86_64"
            meta_mirrors = ["{}"]
            pkg_mirrors = ["{}"]
            "#,
            server.url("meta"),
            server.url("pkg"),
        ))
        .unwrap();
        config.resolve().unwrap();
        config.repositories.remove(0)
    }

    const VIM: &str = "vim-9.0-1-x86_64.pkg.tar.zst";

    fn serve_repository(server: &TestServer) {
        let signed = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let index = index_archive(&[(
            "vim-9.0-1",
            desc_text(VIM, &sha256_hex(b"vim package"), 1_714_564_800),
        )]);
        server.serve("meta/msys.db", index);
        server.serve("meta/msys.db.sig", good_signature(signed));
        server.serve("meta/msys.files", "files");
        server.serve("meta/msys.files.sig", good_signature(signed));
        server.serve(&format!("meta/{VIM}"), "vim package");
        server.serve(&format!("meta/{VIM}.sig"), good_signature(signed));
    }

    #[test]
    fn test_full_run_then_local_run() {
        let root = tempdir().unwrap();
        let server = TestServer::start();
        serve_repository(&server);
        let repo = repository(&server);

        let mirror =
            RepositoryMirror::with_backend(&repo, root.path(), &client(), Box::new(FakeBackend))
                .unwrap();
        assert_eq!(mirror.destdir(), root.path().join("msys/x86_64"));

        let report = mirror.run(false).unwrap();
        assert_eq!(report.verified, vec![(VIM.to_string(), Verdict::VerifiedByHash)]);

        let destdir = mirror.destdir();
        for file in ["msys.db", "msys.db.sig", "msys.files", "msys.files.sig", VIM] {
            assert!(destdir.join(file).exists(), "{file} missing");
        }
        assert!(destdir.join(format!("{VIM}.sig")).exists());
        assert!(destdir.join("archive").is_dir());
        assert!(destdir.join("corrupt").is_dir());

        // the package mirror has nothing; the metadata mirror is its fallback
        assert!(server.hits().contains(&format!("/pkg/{VIM}")));

        let hits = server.hits().len();
        let report = mirror.run(true).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.verified.len(), 1);
        assert_eq!(server.hits().len(), hits);
    }

    #[test]
    fn test_run_fails_on_unavailable_index() {
        let root = tempdir().unwrap();
        let server = TestServer::start();
        let repo = repository(&server);

        let mirror =
            RepositoryMirror::with_backend(&repo, root.path(), &client(), Box::new(FakeBackend))
                .unwrap();
        let err = mirror.run(false).unwrap_err();
        assert!(matches!(err, MirrorError::Download(_)));
        assert!(fs::read_dir(mirror.destdir()).unwrap().next().is_none());
    }
}
