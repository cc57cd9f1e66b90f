use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// If the directory already exists, this function does nothing. If the path exists but is not
/// a directory, this function returns an error.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
///
/// # Example
///
/// ```no_run
/// use pacmirror_utils::error::FileSystemResult;
/// use pacmirror_utils::fs::ensure_dir_exists;
///
/// fn main() -> FileSystemResult<()> {
///     ensure_dir_exists("/srv/mirror/msys/x86_64/archive")?;
///     Ok(())
/// }
/// ```
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file safely.
///
/// If the path does not exist, this function returns `Ok(())` without error.
///
/// # Errors
///
/// Returns a [`FileSystemError::File`] if the removal fails for any reason other than
/// the path not existing.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(FileSystemError::File {
                path: path.to_path_buf(),
                action: "remove",
                source: err,
            })
        }
    }
}

/// Renames `from` to `to`, replacing `to` if it exists.
pub fn rename<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> FileSystemResult<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    fs::rename(from, to).map_err(|err| FileSystemError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: err,
    })
}

/// Moves a file into `dir`, keeping its file name.
///
/// An existing file with the same name in `dir` is never replaced: the first free name out of
/// `<name>`, `<name>.1`, `<name>.2`, ... is used instead. Returns the final path.
///
/// # Errors
///
/// * [`FileSystemError::NotADirectory`] if `from` has no file name component.
/// * [`FileSystemError::Move`] if the rename fails.
///
/// # Example
///
/// ```no_run
/// use pacmirror_utils::error::FileSystemResult;
/// use pacmirror_utils::fs::move_into_dir;
///
/// fn main() -> FileSystemResult<()> {
///     let moved = move_into_dir("mirror/zlib-1.3-1-x86_64.pkg.tar.zst", "mirror/archive")?;
///     println!("archived to {}", moved.display());
///     Ok(())
/// }
/// ```
pub fn move_into_dir<P: AsRef<Path>, Q: AsRef<Path>>(from: P, dir: Q) -> FileSystemResult<PathBuf> {
    let (from, dir) = (from.as_ref(), dir.as_ref());
    let name = from
        .file_name()
        .ok_or_else(|| FileSystemError::NotADirectory {
            path: from.to_path_buf(),
        })?
        .to_string_lossy()
        .into_owned();

    let mut target = dir.join(&name);
    let mut n = 0u32;
    while target.exists() {
        n += 1;
        target = dir.join(format!("{name}.{n}"));
    }

    rename(from, &target)?;
    Ok(target)
}
