//! Error types for pacmirror-core.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use pacmirror_config::error::ConfigError;
use pacmirror_dl::error::DownloadError;
use pacmirror_registry::RegistryError;
use pacmirror_utils::error::FileSystemError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(
        code(pacmirror::fs),
        help("Check permissions and free space in the destination directory")
    )]
    FileSystem(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(pacmirror::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bad signature for {file}")]
    #[diagnostic(
        code(pacmirror::signature_invalid),
        help("{transcript}")
    )]
    SignatureInvalid { file: String, transcript: String },

    #[error("Cannot read the signing time of {file} from {line:?}")]
    #[diagnostic(
        code(pacmirror::signature_timestamp),
        help("The verifier must run with a C/English locale")
    )]
    SignatureTimestamp { file: String, line: String },

    #[error("{file} was signed at {current}, before the current copy ({previous})")]
    #[diagnostic(
        code(pacmirror::stale_index),
        help("The mirror serves an outdated index; the previous copy has been kept")
    )]
    StaleIndex {
        file: String,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

impl MirrorError {
    /// Whether the error says the signature could not be trusted.
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid { .. } | Self::SignatureTimestamp { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            MirrorError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_stale_index_display() {
        let err = MirrorError::StaleIndex {
            file: "msys.db".into(),
            previous: Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
            current: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("msys.db was signed at 2024-05-01"));
        assert!(msg.contains("2024-05-02"));
    }

    #[test]
    fn test_signature_failure_kinds() {
        let invalid = MirrorError::SignatureInvalid {
            file: "a.sig".into(),
            transcript: "gpg: BAD signature".into(),
        };
        let timestamp = MirrorError::SignatureTimestamp {
            file: "a.sig".into(),
            line: "gpg: Unterschrift vom".into(),
        };
        let download = MirrorError::Download(DownloadError::MirrorExhausted {
            file: "a".into(),
        });
        assert!(invalid.is_signature_failure());
        assert!(timestamp.is_signature_failure());
        assert!(!download.is_signature_failure());
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = result
            .with_context(|| "running gpg".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while running gpg");
    }
}
