use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, Result};

/// A remote repository mirrored into a subdirectory of the destination root.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Repository {
    /// Repository (database) name, e.g. `msys` for `msys.db`.
    pub name: String,

    /// Directory relative to the destination root.
    /// Default: the repository name
    pub path: Option<String>,

    /// Mirror base URLs for the database, `.files` archive and signatures,
    /// tried in order.
    pub meta_mirrors: Vec<String>,

    /// Mirror base URLs for the package files, tried in order.
    /// The metadata mirrors are appended as a last resort.
    #[serde(default)]
    pub pkg_mirrors: Vec<String>,

    /// Whether the repository is mirrored.
    /// Default: true
    pub enabled: Option<bool>,
}

impl Repository {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Local directory of this repository under `root`.
    pub fn get_path(&self, root: &Path) -> PathBuf {
        root.join(self.path.as_deref().unwrap_or(&self.name))
    }

    pub(crate) fn resolve(&mut self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyRepositoryName);
        }
        if self.meta_mirrors.is_empty() {
            return Err(ConfigError::NoMetadataMirrors(self.name.clone()));
        }

        for url in self.meta_mirrors.iter().chain(&self.pkg_mirrors) {
            Url::parse(url).map_err(|source| {
                ConfigError::InvalidMirrorUrl {
                    repo: self.name.clone(),
                    url: url.clone(),
                    source,
                }
            })?;
        }

        for url in &self.meta_mirrors {
            if !self.pkg_mirrors.contains(url) {
                self.pkg_mirrors.push(url.clone());
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct DefaultRepositoryInfo {
    pub name: &'static str,
    pub path: &'static str,
}

const MSYS2_META_MIRROR: &str = "https://repo.msys2.org";

const MSYS2_PKG_MIRRORS: &[&str] = &[
    "https://mirror.yandex.ru/mirrors/msys2",
    "https://mirror.tuna.tsinghua.edu.cn/msys2",
    "https://mirror.msys2.org",
];

pub fn get_default_repositories() -> Vec<DefaultRepositoryInfo> {
    vec![
        DefaultRepositoryInfo {
            name: "msys",
            path: "msys/x86_64",
        },
        DefaultRepositoryInfo {
            name: "mingw64",
            path: "mingw/x86_64",
        },
    ]
}

impl From<DefaultRepositoryInfo> for Repository {
    fn from(info: DefaultRepositoryInfo) -> Self {
        Repository {
            name: info.name.to_string(),
            path: Some(info.path.to_string()),
            meta_mirrors: vec![format!("{MSYS2_META_MIRROR}/{}", info.path)],
            pkg_mirrors: MSYS2_PKG_MIRRORS
                .iter()
                .map(|base| format!("{base}/{}", info.path))
                .collect(),
            enabled: Some(true),
        }
    }
}
