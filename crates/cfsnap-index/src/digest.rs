//! Streaming content digests.
//!
//! Hashing is the dominant cost of a snapshot run, so it is modeled as a
//! strategy selected once per run rather than branching inside the
//! extractor. Tests inject a stub to verify hashing happens (or does not)
//! without touching real digests.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read buffer size for hashing. Files are never loaded whole.
const CHUNK_SIZE: usize = 64 * 1024;

/// A content-hashing strategy.
///
/// Implementations must be deterministic: identical byte streams always
/// produce identical output strings.
pub trait ContentHasher: Send + Sync {
    /// Hash an entire byte stream in bounded-size chunks.
    fn hash_stream(&self, reader: &mut dyn Read) -> io::Result<String>;

    /// Open and hash a file.
    fn hash_file(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        self.hash_stream(&mut file)
    }
}

/// SHA-256, the digest the CatalogFS format stores.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn hash_stream(&self, reader: &mut dyn Read) -> io::Result<String> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize().iter().map(|b| format!("{b:02x}")).collect())
    }
}
