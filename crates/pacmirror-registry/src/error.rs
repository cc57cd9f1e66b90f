//! Error types for the registry crate.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while parsing descriptors or decoding an index archive.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(pacmirror_registry::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Malformed descriptor key on line {line}: {text:?}")]
    #[diagnostic(
        code(pacmirror_registry::malformed_key),
        help("Descriptor keys are written as %KEY% on a line of their own")
    )]
    MalformedKey { line: usize, text: String },

    #[error("Invalid integer for %{key}%: {value:?}")]
    #[diagnostic(code(pacmirror_registry::invalid_integer))]
    InvalidInteger {
        key: String,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("Descriptor has no %{0}% field")]
    #[diagnostic(
        code(pacmirror_registry::missing_field),
        help("The repository index may be corrupted or produced by an incompatible tool")
    )]
    MissingField(String),

    #[error("Invalid descriptor {entry}")]
    #[diagnostic(code(pacmirror_registry::invalid_entry))]
    InvalidEntry {
        entry: String,
        #[source]
        source: Box<RegistryError>,
    },

    #[error("Descriptor {entry} is not valid UTF-8")]
    #[diagnostic(code(pacmirror_registry::encoding))]
    Encoding {
        entry: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
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
            RegistryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::MissingField("SHA256SUM".into());
        assert_eq!(err.to_string(), "Descriptor has no %SHA256SUM% field");

        let err = RegistryError::MalformedKey {
            line: 3,
            text: "FILENAME".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed descriptor key on line 3: \"FILENAME\""
        );
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result
            .with_context(|| "opening msys.db".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while opening msys.db: missing");
    }

    #[test]
    fn test_invalid_entry_keeps_source() {
        let err = RegistryError::InvalidEntry {
            entry: "foo-1.0-1/desc".into(),
            source: Box::new(RegistryError::MissingField("NAME".into())),
        };
        assert!(err.to_string().contains("foo-1.0-1/desc"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
