//! Mirror-failover downloads for repository files.
//!
//! A [`fetch::MirrorFetcher`] writes a named file into a destination directory, either by
//! downloading it from the first working mirror of a [`mirror::MirrorList`] or by re-reading
//! the copy already on disk. Both paths feed the same [`types::ChunkSink`], so checksum and
//! signature logic does not care where the bytes came from.

pub mod error;
pub mod fetch;
pub mod http_client;
pub mod mirror;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
