//! Package metadata for pacman-style repositories.
//!
//! A repository index (`<repo>.db`) is a compressed tar archive holding one
//! `<name>-<version>/desc` file per package. This crate parses those
//! descriptor files and decodes whole index archives.
//!
//! # Example
//!
//! ```no_run
//! use pacmirror_registry::read_database;
//!
//! let db = read_database("/srv/mirror/msys/x86_64/msys.db").unwrap();
//! for (filename, desc) in db.remote_files().unwrap() {
//!     println!("{filename} {}", desc.sha256sum().unwrap());
//! }
//! ```

pub mod database;
pub mod desc;
pub mod error;

pub use database::{read_database, RepositoryDatabase, GZIP_MAGIC_BYTES, ZST_MAGIC_BYTES};
pub use desc::{parse_desc, DescValue, PackageDescriptor};
pub use error::{ErrorContext, RegistryError, Result};
