//! Decoding of repository index archives.

use std::{
    collections::{btree_map, BTreeMap},
    ffi::OsStr,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::debug;

use crate::{
    desc::{parse_desc, PackageDescriptor},
    error::{ErrorContext, RegistryError, Result},
};

/// Magic bytes for Zstandard compressed files.
pub const ZST_MAGIC_BYTES: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Magic bytes for gzip compressed files.
pub const GZIP_MAGIC_BYTES: [u8; 2] = [0x1f, 0x8b];

/// Package descriptors of one repository, keyed by archive directory name
/// (`<name>-<version>`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepositoryDatabase {
    packages: BTreeMap<String, PackageDescriptor>,
}

impl RepositoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dir: impl Into<String>, desc: PackageDescriptor) {
        self.packages.insert(dir.into(), desc);
    }

    pub fn get(&self, dir: &str) -> Option<&PackageDescriptor> {
        self.packages.get(dir)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, PackageDescriptor> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Descriptors keyed by package file name. When two records name the same
    /// file, the one from the later directory wins.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEntry`] if a record has no `%FILENAME%`.
    pub fn remote_files(&self) -> Result<BTreeMap<&str, &PackageDescriptor>> {
        let mut files = BTreeMap::new();
        for (dir, desc) in &self.packages {
            let filename = desc.filename().map_err(|err| {
                RegistryError::InvalidEntry {
                    entry: format!("{dir}/desc"),
                    source: Box::new(err),
                }
            })?;
            files.insert(filename, desc);
        }
        Ok(files)
    }
}

impl<'a> IntoIterator for &'a RepositoryDatabase {
    type Item = (&'a String, &'a PackageDescriptor);
    type IntoIter = btree_map::Iter<'a, String, PackageDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Reads an index archive from disk.
///
/// The compression is detected from the leading bytes: zstd, gzip, or an
/// uncompressed tar otherwise. Every regular file named `desc` is parsed and
/// stored under its directory name; other entries are skipped.
///
/// # Errors
///
/// * [`RegistryError::IoError`] if the archive cannot be read or decompressed.
/// * [`RegistryError::InvalidEntry`] naming the entry whose `desc` fails to parse.
pub fn read_database<P: AsRef<Path>>(path: P) -> Result<RepositoryDatabase> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let head = reader
        .fill_buf()
        .with_context(|| format!("reading {}", path.display()))?;
    let (is_zstd, is_gzip) = (
        head.starts_with(&ZST_MAGIC_BYTES),
        head.starts_with(&GZIP_MAGIC_BYTES),
    );

    let decoder: Box<dyn Read> = if is_zstd {
        debug!("{}: zstd index", path.display());
        Box::new(
            zstd::Decoder::with_buffer(reader)
                .with_context(|| format!("decompressing {}", path.display()))?,
        )
    } else if is_gzip {
        debug!("{}: gzip index", path.display());
        Box::new(GzDecoder::new(reader))
    } else {
        debug!("{}: uncompressed index", path.display());
        Box::new(reader)
    };

    decode_archive(decoder, path)
}

fn decode_archive(reader: impl Read, path: &Path) -> Result<RepositoryDatabase> {
    let mut database = RepositoryDatabase::new();
    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .with_context(|| format!("reading entries of {}", path.display()))?;

    for entry in entries {
        let mut entry = entry.with_context(|| format!("reading entry of {}", path.display()))?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }

        let entry_path = entry
            .path()
            .with_context(|| format!("reading entry path in {}", path.display()))?
            .into_owned();
        if entry_path.file_name() != Some(OsStr::new("desc")) {
            continue;
        }
        let entry_name = entry_path.to_string_lossy().into_owned();
        let dir = entry_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("reading {entry_name} in {}", path.display()))?;
        let text = String::from_utf8(bytes).map_err(|source| {
            RegistryError::Encoding {
                entry: entry_name.clone(),
                source,
            }
        })?;

        let desc = parse_desc(&text).map_err(|err| {
            RegistryError::InvalidEntry {
                entry: entry_name.clone(),
                source: Box::new(err),
            }
        })?;
        database.insert(dir, desc);
    }

    debug!("{}: {} packages", path.display(), database.len());
    Ok(database)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};
    use tar::{Builder, Header};
    use tempfile::tempdir;

    use super::*;

    fn desc_text(filename: &str, builddate: i64) -> String {
        format!(
            "%FILENAME%\n{filename}\n\n%SHA256SUM%\n{}\n\n%BUILDDATE%\n{builddate}\n\n",
            "ab".repeat(32)
        )
    }

    fn tar_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        for (path, content) in entries {
            let mut header = Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(EntryType::Regular);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        let mut dir = Header::new_gnu();
        dir.set_size(0);
        dir.set_mode(0o755);
        dir.set_entry_type(EntryType::Directory);
        dir.set_cksum();
        builder
            .append_data(&mut dir, "zzz-dir-1.0-1/", std::io::empty())
            .unwrap();
        builder.into_inner().unwrap()
    }

    fn sample_entries() -> Vec<(String, String)> {
        vec![
            (
                "vim-9.0-1/desc".to_string(),
                desc_text("vim-9.0-1-x86_64.pkg.tar.zst", 100),
            ),
            ("vim-9.0-1/files".to_string(), "%FILES%\nusr/bin/vim\n".into()),
            (
                "bash-5.2-1/desc".to_string(),
                desc_text("bash-5.2-1-x86_64.pkg.tar.zst", 200),
            ),
        ]
    }

    fn as_refs(entries: &[(String, String)]) -> Vec<(&str, &str)> {
        entries
            .iter()
            .map(|(p, c)| (p.as_str(), c.as_str()))
            .collect()
    }

    fn check_sample(db: &RepositoryDatabase) {
        assert_eq!(db.len(), 2);
        assert_eq!(
            db.get("vim-9.0-1").unwrap().filename().unwrap(),
            "vim-9.0-1-x86_64.pkg.tar.zst"
        );
        let files = db.remote_files().unwrap();
        assert_eq!(
            files.keys().copied().collect::<Vec<_>>(),
            vec!["bash-5.2-1-x86_64.pkg.tar.zst", "vim-9.0-1-x86_64.pkg.tar.zst"]
        );
        assert_eq!(
            files["bash-5.2-1-x86_64.pkg.tar.zst"].build_date().unwrap(),
            200
        );
    }

    #[test]
    fn test_read_zstd_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("msys.db");
        let entries = sample_entries();
        let compressed = zstd::encode_all(&tar_bytes(&as_refs(&entries))[..], 3).unwrap();
        std::fs::write(&path, compressed).unwrap();

        check_sample(&read_database(&path).unwrap());
    }

    #[test]
    fn test_read_gzip_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mingw64.db");
        let entries = sample_entries();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes(&as_refs(&entries))).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        check_sample(&read_database(&path).unwrap());
    }

    #[test]
    fn test_read_plain_tar_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.db");
        let entries = sample_entries();
        std::fs::write(&path, tar_bytes(&as_refs(&entries))).unwrap();

        check_sample(&read_database(&path).unwrap());
    }

    #[test]
    fn test_invalid_desc_names_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.db");
        let bytes = tar_bytes(&[("broken-1.0-1/desc", "%CSIZE%\nbig\n\n")]);
        std::fs::write(&path, zstd::encode_all(&bytes[..], 3).unwrap()).unwrap();

        let err = read_database(&path).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidEntry { ref entry, .. } if entry == "broken-1.0-1/desc"
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_database(dir.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, RegistryError::IoError { .. }));
    }

    #[test]
    fn test_remote_files_later_entry_wins() {
        let mut db = RepositoryDatabase::new();
        db.insert("a-1", parse_desc(&desc_text("same.pkg.tar.zst", 1)).unwrap());
        db.insert("b-1", parse_desc(&desc_text("same.pkg.tar.zst", 2)).unwrap());

        let files = db.remote_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["same.pkg.tar.zst"].build_date().unwrap(), 2);
    }

    #[test]
    fn test_remote_files_missing_filename() {
        let mut db = RepositoryDatabase::new();
        db.insert("nameless-1", parse_desc("%NAME%\nnameless\n").unwrap());
        assert!(matches!(
            db.remote_files(),
            Err(RegistryError::InvalidEntry { ref entry, .. }) if entry == "nameless-1/desc"
        ));
    }
}
