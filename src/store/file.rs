//! # File-Backed Store
//!
//! One file per key under `<root>/<table>/`. Writes go to a temp file
//! first and are renamed into place so a crashed write never leaves a
//! half-written entry behind. Keys are percent-encoded into file names;
//! the encoding is order-preserving for the key alphabet this crate
//! uses (digits, letters, `.`, `-`, `_`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::contract::{IterateVisitor, KeyValueStore};
use super::errors::{StoreError, StoreResult};

const ENOSPC: i32 = 28;

/// File-per-key table rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the table directory `<root>/<table>`
    pub async fn open(root: &Path, table: &str) -> StoreResult<Self> {
        let dir = root.join(table);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Io(format!("create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    fn encode_key(key: &str) -> String {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'_' => {
                    name.push(byte as char)
                }
                other => name.push_str(&format!("%{:02x}", other)),
            }
        }
        name
    }

    fn decode_key(name: &str) -> Option<String> {
        let bytes = name.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex = bytes.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        String::from_utf8(out).ok()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::encode_key(key))
    }

    fn map_io(err: std::io::Error) -> StoreError {
        if err.raw_os_error() == Some(ENOSPC) {
            StoreError::QuotaExceeded
        } else {
            StoreError::Io(err.to_string())
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::map_io(e)),
        }
    }

    async fn save(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.tmp", Self::encode_key(key)));
        fs::write(&tmp, value).await.map_err(Self::map_io)?;
        fs::rename(&tmp, &path).await.map_err(Self::map_io)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io(e)),
        }
    }

    async fn iterate(&self, visit: IterateVisitor<'_>) -> StoreResult<()> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await.map_err(Self::map_io)?;
        while let Some(entry) = entries.next_entry().await.map_err(Self::map_io)? {
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(".tmp") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        for name in names {
            let key = match Self::decode_key(&name) {
                Some(key) => key,
                None => continue,
            };
            let value = fs::read(self.dir.join(&name)).await.map_err(Self::map_io)?;
            visit(&value, &key);
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        fs::remove_dir_all(&self.dir).await.map_err(Self::map_io)?;
        fs::create_dir_all(&self.dir).await.map_err(Self::map_io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(temp: &TempDir) -> FileStore {
        FileStore::open(temp.path(), "graphs").await.unwrap()
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        store.save("1.graph", b"payload").await.unwrap();
        assert_eq!(
            store.load("1.graph").await.unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[tokio::test]
    async fn test_load_absent() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;
        assert_eq!(store.load("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_then_load() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        store.save("1.graph", b"x").await.unwrap();
        store.delete("1.graph").await.unwrap();
        assert_eq!(store.load("1.graph").await.unwrap(), None);

        // absent delete is not an error
        store.delete("1.graph").await.unwrap();
    }

    #[tokio::test]
    async fn test_iterate_sorted_and_decoded() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        store.save("2.graph", b"b").await.unwrap();
        store.save("1.graph", b"a").await.unwrap();
        store.save("odd key", b"c").await.unwrap();

        let mut seen = Vec::new();
        store
            .iterate(&mut |value, key| seen.push((key.to_string(), value.to_vec())))
            .await
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, "1.graph");
        assert_eq!(seen[1].0, "2.graph");
        assert_eq!(seen[2], ("odd key".to_string(), b"c".to_vec()));
    }

    #[tokio::test]
    async fn test_key_encoding_roundtrip() {
        let key = "title with spaces/and%stuff";
        let encoded = FileStore::encode_key(key);
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('/'));
        assert_eq!(FileStore::decode_key(&encoded).unwrap(), key);
    }

    #[tokio::test]
    async fn test_clear_empties_table() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        store.save("1.graph", b"a").await.unwrap();
        store.clear().await.unwrap();

        let mut count = 0;
        store.iterate(&mut |_, _| count += 1).await.unwrap();
        assert_eq!(count, 0);
    }
}
