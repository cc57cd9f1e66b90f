//! Synchronization engine of the pacmirror repository mirror.
//!
//! [`sync::DatabaseSync`] fetches and authenticates a repository index,
//! [`reconcile::CacheReconciler`] brings the package files of the local
//! directory in line with it, and [`repository::RepositoryMirror`] runs both
//! for one configured repository.

pub mod error;
pub mod reconcile;
pub mod repository;
pub mod signature;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorContext, MirrorError, Result};
