//! Fixtures shared by the tests of this crate.

use std::{fs, path::Path, time::SystemTime};

use chrono::{DateTime, Utc};
use pacmirror_utils::hash::StreamHasher;
use tar::{Builder, EntryType, Header};

use crate::{
    error::{ErrorContext, Result},
    signature::{SignatureBackend, SignatureData, Verification},
};

/// Accepts signatures whose content starts with `GOOD `; the rest of the
/// content becomes the transcript.
pub(crate) struct FakeBackend;

impl SignatureBackend for FakeBackend {
    fn verify(&self, data: &Path, signature: SignatureData<'_>) -> Result<Verification> {
        fs::metadata(data).with_context(|| format!("checking {}", data.display()))?;
        let content = match signature {
            SignatureData::File(path) => {
                fs::read(path).with_context(|| format!("reading {}", path.display()))?
            }
            SignatureData::Inline(bytes) => bytes.to_vec(),
        };
        let content = String::from_utf8_lossy(&content).into_owned();

        Ok(match content.strip_prefix("GOOD ") {
            Some(transcript) => {
                Verification {
                    success: true,
                    transcript: transcript.to_string(),
                }
            }
            None => {
                Verification {
                    success: false,
                    transcript: "gpg: BAD signature".to_string(),
                }
            }
        })
    }
}

/// Content of a signature the fake backend accepts, signed at `at`.
pub(crate) fn good_signature(at: DateTime<Utc>) -> String {
    format!(
        "GOOD gpg: Signature made {} UTC\ngpg:                using RSA key 0123\n",
        at.format("%a %b %e %H:%M:%S %Y")
    )
}

pub(crate) fn bad_signature() -> String {
    "forged".to_string()
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = StreamHasher::new();
    hasher.update(data);
    hasher.finalize_hex()
}

pub(crate) fn desc_text(filename: &str, sha256: &str, builddate: i64) -> String {
    format!(
        "%FILENAME%\n{filename}\n\n%NAME%\n{}\n\n%SHA256SUM%\n{sha256}\n\n%BUILDDATE%\n{builddate}\n\n",
        filename.split('-').next().unwrap_or(filename)
    )
}

/// A zstd compressed index holding one `desc` per `(directory, text)` pair.
pub(crate) fn index_archive(entries: &[(&str, String)]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());
    for (dir, text) in entries {
        let mut header = Header::new_gnu();
        header.set_size(text.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder
            .append_data(&mut header, format!("{dir}/desc"), text.as_bytes())
            .unwrap();
    }
    let tar = builder.into_inner().unwrap();
    zstd::encode_all(&tar[..], 3).unwrap()
}

/// Writes `content` to `path` and sets its modification time to `at`.
pub(crate) fn write_with_mtime(path: &Path, content: impl AsRef<[u8]>, at: DateTime<Utc>) {
    fs::write(path, content).unwrap();
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::from(at)).unwrap();
}
