use miette::Diagnostic;
use pacmirror_utils::error::PathError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(pacmirror_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Repository name cannot be empty")]
    #[diagnostic(
        code(pacmirror_config::empty_repository_name),
        help("Give every [[repositories]] entry a `name`")
    )]
    EmptyRepositoryName,

    #[error("Duplicate repository name: {0}")]
    #[diagnostic(
        code(pacmirror_config::duplicate_repo),
        help("Each repository must have a unique name")
    )]
    DuplicateRepositoryName(String),

    #[error("Repository '{0}' has no metadata mirrors")]
    #[diagnostic(
        code(pacmirror_config::no_metadata_mirrors),
        help("Add at least one URL to `meta_mirrors`; the database and signatures are fetched from it")
    )]
    NoMetadataMirrors(String),

    #[error("Invalid mirror URL for repository '{repo}': {url}")]
    #[diagnostic(
        code(pacmirror_config::invalid_mirror_url),
        help("Mirror URLs must be absolute http(s) URLs")
    )]
    InvalidMirrorUrl {
        repo: String,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid timeout: {0}")]
    #[diagnostic(
        code(pacmirror_config::invalid_timeout),
        help("Use a duration such as `30s`, `1m` or `1m30s`")
    )]
    InvalidTimeout(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(pacmirror_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(pacmirror_config::path))]
    Path(#[from] PathError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ConfigError::NoMetadataMirrors("msys".into()).to_string(),
            "Repository 'msys' has no metadata mirrors"
        );
        assert_eq!(
            ConfigError::from(PathError::Empty).to_string(),
            "Path is empty"
        );
    }
}
