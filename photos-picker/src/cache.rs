//! Local content-addressable blob cache for downloaded photo bytes

use std::path::PathBuf;

/// Error type for blob-cache operations
#[derive(Debug)]
pub enum CacheError {
    Unavailable(std::io::Error),
    ReadFailed(std::io::Error),
    WriteFailed(std::io::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Unavailable(e) => write!(f, "Cache directory unavailable: {}", e),
            CacheError::ReadFailed(e) => write!(f, "Cache read failed: {}", e),
            CacheError::WriteFailed(e) => write!(f, "Cache write failed: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

/// Opaque blob store keyed by photo id
pub trait BlobCache: Send + Sync {
    /// Store `bytes` under `key`, overwriting any previous blob, and return
    /// the local location of the stored copy
    fn put(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, CacheError>;

    /// Location of the blob for `key`, if one is cached
    fn get(&self, key: &str) -> Option<PathBuf>;

    fn clear(&self) -> Result<(), CacheError>;

    fn total_size_bytes(&self) -> u64;
}

/// Flat-file blob cache under a single root directory
pub struct FsBlobCache {
    root: PathBuf,
}

impl FsBlobCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(CacheError::Unavailable)?;
        Ok(Self { root })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

impl BlobCache for FsBlobCache {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.blob_path(key);
        std::fs::write(&path, bytes).map_err(CacheError::WriteFailed)?;
        log::debug!("Cached {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    fn get(&self, key: &str) -> Option<PathBuf> {
        let path = self.blob_path(key);
        path.is_file().then_some(path)
    }

    fn clear(&self) -> Result<(), CacheError> {
        std::fs::remove_dir_all(&self.root).map_err(CacheError::WriteFailed)?;
        std::fs::create_dir_all(&self.root).map_err(CacheError::Unavailable)?;
        log::info!("Image cache cleared");
        Ok(())
    }

    fn total_size_bytes(&self) -> u64 {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        entries
            .flatten()
            .filter_map(|entry| entry.metadata().ok())
            .filter(|metadata| metadata.is_file())
            .map(|metadata| metadata.len())
            .sum()
    }
}

/// Photo ids may contain path separators; substitute them so every key maps
/// to a single file name under the cache root
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(name: &str) -> FsBlobCache {
        let root = std::env::temp_dir().join(format!(
            "photos-picker-cache-{}-{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&root);
        FsBlobCache::new(root).unwrap()
    }

    #[test]
    fn test_put_get_byte_fidelity() {
        let cache = temp_cache("fidelity");
        let payload = vec![0u8, 1, 2, 254, 255, 42];

        let location = cache.put("photo-1", &payload).unwrap();
        assert_eq!(cache.get("photo-1"), Some(location.clone()));
        assert_eq!(std::fs::read(location).unwrap(), payload);
    }

    #[test]
    fn test_put_overwrites_instead_of_appending() {
        let cache = temp_cache("overwrite");
        cache.put("photo-1", b"first-longer-payload").unwrap();
        let location = cache.put("photo-1", b"second").unwrap();
        assert_eq!(std::fs::read(location).unwrap(), b"second");
    }

    #[test]
    fn test_get_missing_is_none() {
        let cache = temp_cache("missing");
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_keys_with_path_separators_are_sanitized() {
        let cache = temp_cache("sanitize");
        let location = cache.put("a/b\\c", b"data").unwrap();
        assert!(location.ends_with("a_b_c"));
        assert_eq!(cache.get("a/b\\c"), Some(location));
    }

    #[test]
    fn test_clear_and_total_size() {
        let cache = temp_cache("clear");
        assert_eq!(cache.total_size_bytes(), 0);
        cache.put("p1", &[0u8; 100]).unwrap();
        cache.put("p2", &[0u8; 50]).unwrap();
        assert_eq!(cache.total_size_bytes(), 150);

        cache.clear().unwrap();
        assert_eq!(cache.total_size_bytes(), 0);
        assert_eq!(cache.get("p1"), None);
    }
}
