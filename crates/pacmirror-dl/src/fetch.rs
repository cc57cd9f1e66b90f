use std::{
    fs::{File, OpenOptions},
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
    time::SystemTime,
};

use pacmirror_utils::{fs::safe_remove, time::parse_http_date};
use tracing::{info, warn};
use ureq::{
    http::header::{CONTENT_LENGTH, LAST_MODIFIED},
    Agent,
};

use crate::{
    error::{DownloadError, Result},
    http_client::ClientConfig,
    mirror::MirrorList,
    types::{ChunkSink, FileSource},
};

/// Chunk size used when re-reading a local file.
pub const LOCAL_CHUNK_SIZE: usize = 1024 * 1024;

/// Chunk size used when streaming a response body to disk.
pub const REMOTE_CHUNK_SIZE: usize = 64 * 1024;

/// Why a single mirror attempt failed.
enum AttemptError {
    /// The mirror misbehaved; the next one may do better.
    Remote(DownloadError),
    /// Writing locally failed; no mirror can fix that.
    Local(DownloadError),
}

/// Fetches named files into a destination directory.
pub struct MirrorFetcher {
    agent: Agent,
    destdir: PathBuf,
}

impl MirrorFetcher {
    pub fn new(destdir: impl Into<PathBuf>, client: &ClientConfig) -> Self {
        Self {
            agent: client.build(),
            destdir: destdir.into(),
        }
    }

    pub fn destdir(&self) -> &Path {
        &self.destdir
    }

    /// Path of `name` inside the destination directory.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.destdir.join(name)
    }

    /// Obtains `name` from `source`, streaming its bytes through `sink`.
    ///
    /// With [`FileSource::Local`] the existing file is read in [`LOCAL_CHUNK_SIZE`] chunks.
    /// With [`FileSource::Remote`] each mirror is tried in order; the first one that answers
    /// with a success status and delivers the whole body wins. The body is written to
    /// `<name>.part` and renamed over `<name>` once complete, and the file's modification time
    /// is taken from `Last-Modified` when the server sends one.
    ///
    /// # Errors
    ///
    /// * [`DownloadError::MirrorExhausted`] if every mirror failed.
    /// * [`DownloadError::Io`] if the local file cannot be read or the download cannot be
    ///   written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pacmirror_dl::{
    ///     fetch::MirrorFetcher, http_client::ClientConfig, mirror::MirrorList,
    ///     types::{Discard, FileSource},
    /// };
    ///
    /// let fetcher = MirrorFetcher::new("/srv/mirror/msys/x86_64", &ClientConfig::default());
    /// let mirrors = MirrorList::new(["https://repo.msys2.org/msys/x86_64"]).unwrap();
    /// let path = fetcher
    ///     .fetch("msys.db", FileSource::Remote(&mirrors), &mut Discard)
    ///     .unwrap();
    /// println!("{}", path.display());
    /// ```
    pub fn fetch(
        &self,
        name: &str,
        source: FileSource<'_>,
        sink: &mut dyn ChunkSink,
    ) -> Result<PathBuf> {
        match source {
            FileSource::Local => self.read_local(name, sink),
            FileSource::Remote(mirrors) => self.download(name, mirrors, sink),
        }
    }

    fn read_local(&self, name: &str, sink: &mut dyn ChunkSink) -> Result<PathBuf> {
        let path = self.path_of(name);
        info!("{name} (local)");

        let mut file = File::open(&path)?;
        let total = file.metadata()?.len();

        sink.begin(Some(total));
        let mut buffer = vec![0u8; LOCAL_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            sink.chunk(&buffer[..n]);
        }

        Ok(path)
    }

    fn download(
        &self,
        name: &str,
        mirrors: &MirrorList,
        sink: &mut dyn ChunkSink,
    ) -> Result<PathBuf> {
        if mirrors.is_empty() {
            return Err(DownloadError::NoMirrors {
                file: name.to_string(),
            });
        }

        let path = self.path_of(name);
        let part = self.path_of(&format!("{name}.part"));

        for (i, base) in mirrors.bases().iter().enumerate() {
            let url = mirrors.file_url(base, name)?;

            match self.try_mirror(url.as_str(), name, i, &part, sink) {
                Ok(last_modified) => {
                    if let Err(err) = std::fs::rename(&part, &path) {
                        safe_remove(&part)?;
                        return Err(err.into());
                    }
                    if let Some(mtime) = last_modified {
                        set_mtime(&path, mtime)?;
                    }
                    return Ok(path);
                }
                Err(AttemptError::Remote(err)) => {
                    safe_remove(&part)?;
                    warn!("{name}: {url}: {err}");
                }
                Err(AttemptError::Local(err)) => {
                    safe_remove(&part)?;
                    return Err(err);
                }
            }
        }

        Err(DownloadError::MirrorExhausted {
            file: name.to_string(),
        })
    }

    /// Downloads `url` into `part`. Returns the `Last-Modified` time when present.
    fn try_mirror(
        &self,
        url: &str,
        name: &str,
        index: usize,
        part: &Path,
        sink: &mut dyn ChunkSink,
    ) -> std::result::Result<Option<SystemTime>, AttemptError> {
        let resp = self
            .agent
            .get(url)
            .call()
            .map_err(|err| AttemptError::Remote(classify(err, url)))?;

        let total = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|h| h.to_str().ok())
            .and_then(|len| len.parse::<u64>().ok());
        let last_modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_http_date);

        match (total, index) {
            (Some(len), 0) => info!("{name} ({len} bytes)"),
            (Some(len), i) => info!("{name} ({len} bytes) (mirror {})", i + 1),
            (None, 0) => info!("{name}"),
            (None, i) => info!("{name} (mirror {})", i + 1),
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(part)
            .map_err(|e| AttemptError::Local(e.into()))?;

        sink.begin(total);
        let mut reader = resp.into_body().into_reader();
        let mut buffer = vec![0u8; REMOTE_CHUNK_SIZE];
        loop {
            let n = reader
                .read(&mut buffer)
                .map_err(|e| AttemptError::Remote(e.into()))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])
                .map_err(|e| AttemptError::Local(e.into()))?;
            sink.chunk(&buffer[..n]);
        }
        file.flush().map_err(|e| AttemptError::Local(e.into()))?;

        Ok(last_modified)
    }
}

fn classify(err: ureq::Error, url: &str) -> DownloadError {
    match err {
        ureq::Error::StatusCode(status) => {
            DownloadError::HttpError {
                status,
                url: url.to_string(),
            }
        }
        other => other.into(),
    }
}

fn set_mtime(path: &Path, mtime: SystemTime) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(mtime)?;
    Ok(())
}
