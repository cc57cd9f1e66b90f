use miette::Diagnostic;
use pacmirror_utils::error::FileSystemError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(pacmirror_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(pacmirror_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(pacmirror_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("I/O error: {0}")]
    #[diagnostic(code(pacmirror_dl::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(pacmirror_dl::fs))]
    FileSystem(#[from] FileSystemError),

    #[error("{file} is unavailable in mirrors")]
    #[diagnostic(
        code(pacmirror_dl::mirror_exhausted),
        help("Every mirror failed for this file; check the mirror list or try again later")
    )]
    MirrorExhausted { file: String },

    #[error("No mirrors configured for {file}")]
    #[diagnostic(code(pacmirror_dl::no_mirrors))]
    NoMirrors { file: String },
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl From<ureq::Error> for DownloadError {
    /// Converts a `ureq::Error` into a `DownloadError::Network` variant.
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

impl DownloadError {
    /// Whether the error is a missing local file rather than a broken one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_exhausted_names_file() {
        let err = DownloadError::MirrorExhausted {
            file: "msys.db".to_string(),
        };
        assert_eq!(err.to_string(), "msys.db is unavailable in mirrors");
    }

    #[test]
    fn test_download_error_http_error() {
        let err = DownloadError::HttpError {
            status: 404,
            url: "https://example.com/notfound".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("HTTP 404"));
        assert!(msg.contains("https://example.com/notfound"));
    }

    #[test]
    fn test_download_error_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DownloadError::Io(io_err);
        assert!(err.to_string().contains("I/O error"));
        assert!(err.is_not_found());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_ureq_error() {
        let download_err: DownloadError = ureq::Error::ConnectionFailed.into();
        assert!(matches!(download_err, DownloadError::Network(_)));
        assert!(!download_err.is_not_found());
    }
}
