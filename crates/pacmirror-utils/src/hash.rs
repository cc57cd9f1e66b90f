use sha2::{Digest, Sha256};

/// Incremental SHA-256 over a stream of chunks.
///
/// The hasher is fed with [`StreamHasher::update`] once per chunk and finalized once with
/// [`StreamHasher::finalize_hex`]. [`StreamHasher::reset`] discards everything fed so far,
/// which callers use when a stream restarts from the beginning.
#[derive(Clone, Default)]
pub struct StreamHasher {
    inner: Sha256,
    bytes: u64,
}

impl StreamHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    pub fn reset(&mut self) {
        self.inner = Sha256::new();
        self.bytes = 0;
    }

    /// Number of bytes hashed since creation or the last reset.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Compares a computed checksum against an expected one, ignoring ASCII case.
pub fn checksum_matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

    #[test]
    fn test_stream_hasher_chunks() {
        let mut hasher = StreamHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world\n");
        assert_eq!(hasher.bytes(), 12);
        assert_eq!(hasher.finalize_hex(), HELLO_SHA256);
    }

    #[test]
    fn test_stream_hasher_reset() {
        let mut hasher = StreamHasher::new();
        hasher.update(b"partial garbage");
        hasher.reset();
        hasher.update(b"hello world\n");
        assert_eq!(hasher.finalize_hex(), HELLO_SHA256);
    }

    #[test]
    fn test_checksum_matches() {
        assert!(checksum_matches(HELLO_SHA256, &HELLO_SHA256.to_uppercase()));
        assert!(!checksum_matches(HELLO_SHA256, "invalid-checksum"));
    }
}
