use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use pacmirror_utils::{
    path::{resolve_path, xdg_config_home},
    time::parse_duration,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    repository::{get_default_repositories, Repository},
};

pub const DEFAULT_TIMEOUT: &str = "30s";
pub const DEFAULT_DOWNLOAD_TIMEOUT: &str = "30m";
pub const DEFAULT_TRUST_STORE: &str = "/etc/pacman.d/gnupg";
pub const DEFAULT_GPG_BIN: &str = "gpg";

/// Application's configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// GnuPG executable used to verify detached signatures.
    /// Default: gpg
    pub gpg_bin: Option<String>,

    /// GnuPG home directory holding the trusted keyring.
    /// Default: /etc/pacman.d/gnupg
    pub trust_store: Option<String>,

    /// Per-request network timeout (e.g., "30s", "1m").
    /// Default: "30s"
    pub timeout: Option<String>,

    /// Limit on transferring one file body, so a stalled mirror is abandoned.
    /// Default: "30m"
    pub download_timeout: Option<String>,

    /// User agent sent with every request.
    pub user_agent: Option<String>,

    /// Also fetch the `.sig` of packages accepted by checksum, so the mirror
    /// carries every signature its clients may ask for.
    /// Default: true
    pub mirror_signatures: Option<bool>,

    /// List of mirrored repositories, processed in order.
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Location of the configuration file when none is given on the command line.
///
/// `PACMIRROR_CONFIG` wins when set, otherwise `$XDG_CONFIG_HOME/pacmirror/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    match std::env::var("PACMIRROR_CONFIG") {
        Ok(path) => Ok(resolve_path(&path)?),
        Err(_) => Ok(xdg_config_home()?.join("pacmirror").join("config.toml")),
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            gpg_bin: Some(DEFAULT_GPG_BIN.to_string()),
            trust_store: Some(DEFAULT_TRUST_STORE.to_string()),
            timeout: Some(DEFAULT_TIMEOUT.to_string()),
            download_timeout: Some(DEFAULT_DOWNLOAD_TIMEOUT.to_string()),
            user_agent: None,
            mirror_signatures: Some(true),
            repositories: get_default_repositories()
                .into_iter()
                .map(Repository::from)
                .collect(),
        }
    }

    /// Loads the configuration from `path`, or from [`default_config_path`] when `None`.
    /// A missing file yields the default configuration. The result is resolved.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        let mut config = match fs::read_to_string(&config_path) {
            Ok(content) => {
                debug!("Loading configuration from {}", config_path.display());
                Self::from_toml(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && path.is_none() => {
                debug!(
                    "No configuration at {}, using defaults",
                    config_path.display()
                );
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn resolve(&mut self) -> Result<()> {
        self.timeout()?;
        self.download_timeout()?;

        let mut seen_repos = HashSet::new();
        for repo in &mut self.repositories {
            repo.resolve()?;
            if !seen_repos.insert(repo.name.clone()) {
                return Err(ConfigError::DuplicateRepositoryName(repo.name.clone()));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Result<Duration> {
        positive_duration(self.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn download_timeout(&self) -> Result<Duration> {
        positive_duration(
            self.download_timeout
                .as_deref()
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
        )
    }

    pub fn gpg_bin(&self) -> &str {
        self.gpg_bin.as_deref().unwrap_or(DEFAULT_GPG_BIN)
    }

    pub fn trust_store(&self) -> Result<PathBuf> {
        Ok(resolve_path(
            self.trust_store.as_deref().unwrap_or(DEFAULT_TRUST_STORE),
        )?)
    }

    pub fn mirror_signatures(&self) -> bool {
        self.mirror_signatures.unwrap_or(true)
    }

    pub fn enabled_repositories(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.iter().filter(|repo| repo.is_enabled())
    }
}

fn positive_duration(value: &str) -> Result<Duration> {
    match parse_duration(value) {
        Some(ms) if ms > 0 => Ok(Duration::from_millis(ms as u64)),
        _ => Err(ConfigError::InvalidTimeout(value.to_string())),
    }
}
