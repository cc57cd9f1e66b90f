use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::{DownloadError, Result};

/// Characters kept verbatim in a file name path segment. Everything else, notably the `:` of
/// package epochs, is percent-encoded.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'+');

/// Ordered mirror base URLs. The first one is the primary; the rest are fallbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirrorList {
    bases: Vec<Url>,
}

impl MirrorList {
    /// Builds a mirror list from base URLs, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for the first URL that does not parse.
    ///
    /// # Examples
    ///
    /// ```
    /// use pacmirror_dl::mirror::MirrorList;
    ///
    /// let mirrors = MirrorList::new(["https://repo.msys2.org/msys/x86_64"]).unwrap();
    /// assert_eq!(
    ///     mirrors.file_url(&mirrors.bases()[0], "msys.db").unwrap().as_str(),
    ///     "https://repo.msys2.org/msys/x86_64/msys.db"
    /// );
    /// ```
    pub fn new<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bases = urls
            .into_iter()
            .map(|url| {
                let url = url.as_ref();
                let with_slash = if url.ends_with('/') {
                    url.to_string()
                } else {
                    format!("{url}/")
                };
                Url::parse(&with_slash).map_err(|source| {
                    DownloadError::InvalidUrl {
                        url: url.to_string(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bases,
        })
    }

    pub fn bases(&self) -> &[Url] {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// URL of `name` below `base`, with the name encoded as a single path segment.
    pub fn file_url(&self, base: &Url, name: &str) -> Result<Url> {
        let encoded = utf8_percent_encode(name, FILE_NAME).to_string();
        base.join(&encoded).map_err(|source| {
            DownloadError::InvalidUrl {
                url: format!("{base}{encoded}"),
                source,
            }
        })
    }
}
