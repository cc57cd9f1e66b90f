use pacmirror_utils::hash::StreamHasher;

use crate::mirror::MirrorList;

/// Receives the bytes of a file as it is downloaded or re-read.
///
/// `begin` is called once before the first chunk of every attempt; a download that fails
/// over to the next mirror calls `begin` again, so sinks must start over when it is called.
pub trait ChunkSink {
    fn begin(&mut self, total: Option<u64>);

    fn chunk(&mut self, data: &[u8]);
}

/// Where the bytes of a file come from.
#[derive(Clone, Copy, Debug)]
pub enum FileSource<'a> {
    /// The copy already present in the destination directory.
    Local,
    /// The first mirror of the list that serves the file.
    Remote(&'a MirrorList),
}

/// A sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ChunkSink for Discard {
    fn begin(&mut self, _total: Option<u64>) {}

    fn chunk(&mut self, _data: &[u8]) {}
}

impl ChunkSink for StreamHasher {
    fn begin(&mut self, _total: Option<u64>) {
        self.reset();
    }

    fn chunk(&mut self, data: &[u8]) {
        self.update(data);
    }
}
