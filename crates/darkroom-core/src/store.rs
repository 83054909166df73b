//! Blob-store seam: the pipeline's only I/O boundary.
//!
//! Stages talk to object storage through the object-safe [`BlobStore`]
//! trait so the production client can be swapped without touching pipeline
//! logic. Two implementations ship here:
//!
//! - [`MemoryStore`]: in-process map with call counting and put-failure
//!   injection, used by unit tests.
//! - [`FsStore`]: bucket-per-directory layout on the local filesystem,
//!   used by the CLI and integration tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;

/// A fetched object: bytes plus the store-side metadata the pipeline
/// carries into descriptors.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Last-modified timestamp (RFC 3339), if the store tracks one
    pub last_modified: Option<String>,
    pub user_metadata: BTreeMap<String, String>,
}

/// Options attached to a put.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    /// Hex-encoded SHA-256 of the body, verified/stored by stores that
    /// support content checksums
    pub checksum_sha256: Option<String>,
}

impl PutOptions {
    pub fn content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            checksum_sha256: None,
        }
    }
}

/// Object storage operations consumed by the pipeline.
///
/// A put is all-or-nothing: implementations must never leave a partial
/// object visible under the target key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object's bytes and metadata.
    async fn get(&self, bucket: &str, key: &str) -> Result<FetchedObject, StoreError>;

    /// Write an object.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        opts: &PutOptions,
    ) -> Result<(), StoreError>;
}

/// An object held by [`MemoryStore`], including the put options it was
/// written with so tests can assert on content type and checksum.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub checksum_sha256: Option<String>,
    pub last_modified: Option<String>,
    pub user_metadata: BTreeMap<String, String>,
}

/// In-memory store for tests: counts calls and can inject put failures.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
    /// When set, puts whose key contains this substring fail.
    fail_put_keys_containing: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, bypassing the put counters.
    pub fn insert(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            (bucket.into(), key.into()),
            StoredObject {
                bytes,
                content_type: content_type.map(String::from),
                checksum_sha256: None,
                last_modified: Some("2026-08-01T12:00:00Z".to_string()),
                user_metadata: BTreeMap::new(),
            },
        );
    }

    /// Fetch a stored object for assertions.
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let objects = self.objects.lock().unwrap();
        objects.get(&(bucket.to_string(), key.to_string())).cloned()
    }

    /// All (bucket, key) pairs currently stored.
    pub fn keys(&self) -> Vec<(String, String)> {
        let objects = self.objects.lock().unwrap();
        let mut keys: Vec<_> = objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent puts fail when the key contains `substring`.
    pub fn fail_puts_containing(&self, substring: impl Into<String>) {
        *self.fail_put_keys_containing.lock().unwrap() = Some(substring.into());
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<FetchedObject, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().unwrap();
        match objects.get(&(bucket.to_string(), key.to_string())) {
            Some(obj) => Ok(FetchedObject {
                bytes: obj.bytes.clone(),
                content_type: obj.content_type.clone(),
                last_modified: obj.last_modified.clone(),
                user_metadata: obj.user_metadata.clone(),
            }),
            None => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        opts: &PutOptions,
    ) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = self.fail_put_keys_containing.lock().unwrap().as_deref() {
            if key.contains(needle) {
                return Err(StoreError::Io(std::io::Error::other(
                    "injected put failure",
                )));
            }
        }
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes,
                content_type: opts.content_type.clone(),
                checksum_sha256: opts.checksum_sha256.clone(),
                last_modified: None,
                user_metadata: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

/// Filesystem-backed store: a bucket is a directory under `root`, a key is
/// a relative path inside it.
///
/// Filesystem buckets carry no user metadata; content type is guessed from
/// the key's extension on read and mtime is not propagated.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

/// Guess a content type from a key's extension.
fn guess_content_type(key: &str) -> Option<String> {
    let ext = key.rsplit('.').next()?;
    let content_type = match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(content_type.to_string())
}

#[async_trait]
impl BlobStore for FsStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<FetchedObject, StoreError> {
        let path = self.object_path(bucket, key);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(FetchedObject {
            bytes,
            content_type: guess_content_type(key),
            last_modified: None,
            user_metadata: BTreeMap::new(),
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _opts: &PutOptions,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename keeps the put all-or-nothing: a failed write
        // never leaves a partial object under the target key.
        let mut tmp = path.clone();
        tmp.as_mut_os_string().push(".partial");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
