use orbis_types::ContentId;

/// Domain-separated BLAKE3 hasher for locally minted identifiers.
///
/// The domain tag is prepended to every hash computation, so a file and a
/// directory with identical serialized bytes still get different ids.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for file nodes.
    pub const FILE: Self = Self {
        domain: "orbis-file-v1",
    };
    /// Hasher for directory nodes.
    pub const DIRECTORY: Self = Self {
        domain: "orbis-dir-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentId::from_digest(*hasher.finalize().as_bytes())
    }
}
