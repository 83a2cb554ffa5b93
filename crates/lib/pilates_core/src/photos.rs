//! Report photos: an opaque blob storage capability plus the owner-scoped
//! upload/download flow on top of it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::auth::OwnerId;
use crate::models::domain::{NewPhoto, Photo};
use crate::store::{Store, StoreError, StoreResult};

/// Largest accepted photo upload: 10 MiB.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Photo storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unknown locator: {0}")]
    UnknownLocator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage for photo bytes. Locators are opaque to callers.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    async fn retrieve(&self, locator: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove a blob. Removing an unknown locator is not an error.
    async fn delete(&self, locator: &str) -> Result<(), StorageError>;
}

/// Stores each photo as a file under a root directory.
#[derive(Debug, Clone)]
pub struct LocalPhotoStorage {
    root: PathBuf,
}

impl LocalPhotoStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locators are bare file names we generated; anything that could walk
    /// out of the root is rejected.
    fn path_for(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let valid = !locator.is_empty()
            && locator
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !locator.starts_with('.');
        if !valid {
            return Err(StorageError::UnknownLocator(locator.to_string()));
        }
        Ok(self.root.join(locator))
    }
}

#[async_trait]
impl PhotoStorage for LocalPhotoStorage {
    async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let locator = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
        tokio::fs::write(self.root.join(&locator), bytes).await?;
        Ok(locator)
    }

    async fn retrieve(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(locator)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::UnknownLocator(locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let path = self.path_for(locator)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps photo bytes in memory.
#[derive(Debug, Default)]
pub struct MemoryPhotoStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryPhotoStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhotoStorage for MemoryPhotoStorage {
    async fn store(&self, bytes: &[u8], _content_type: &str) -> Result<String, StorageError> {
        let locator = Uuid::new_v4().to_string();
        self.blobs
            .write()
            .await
            .insert(locator.clone(), bytes.to_vec());
        Ok(locator)
    }

    async fn retrieve(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::UnknownLocator(locator.to_string()))
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        self.blobs.write().await.remove(locator);
        Ok(())
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        _ => "bin",
    }
}

/// Owner-scoped photo upload and download.
#[derive(Clone)]
pub struct PhotoService {
    store: Arc<dyn Store>,
    storage: Arc<dyn PhotoStorage>,
}

impl PhotoService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn PhotoStorage>) -> Self {
        Self { store, storage }
    }

    /// Attach a photo to an owned report.
    pub async fn upload(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        content_type: &str,
        bytes: &[u8],
    ) -> StoreResult<Photo> {
        if !content_type.starts_with("image/") {
            return Err(StoreError::Validation(format!(
                "Unsupported photo content type '{content_type}'"
            )));
        }
        if bytes.is_empty() {
            return Err(StoreError::Validation("Photo body is empty".into()));
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(StoreError::Validation(format!(
                "Photo exceeds {MAX_PHOTO_BYTES} bytes"
            )));
        }

        // Check ownership before writing any bytes.
        self.store.get_report(owner, report_id).await?;

        let locator = self.storage.store(bytes, content_type).await?;
        let recorded = self
            .store
            .add_photo(
                owner,
                report_id,
                &NewPhoto {
                    locator: locator.clone(),
                    content_type: content_type.to_string(),
                    size_bytes: bytes.len() as i64,
                },
            )
            .await;
        let photo = match recorded {
            Ok(photo) => photo,
            Err(e) => {
                // The report went away (or the insert failed) after the bytes landed.
                if let Err(cleanup) = self.storage.delete(&locator).await {
                    warn!(%locator, "could not remove orphaned photo: {cleanup}");
                }
                return Err(e);
            }
        };
        info!(owner_id = %owner, %report_id, photo_id = %photo.id, size = photo.size_bytes, "photo uploaded");
        Ok(photo)
    }

    pub async fn list(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<Photo>> {
        self.store.list_photos(owner, report_id).await
    }

    /// Photo metadata and bytes for an owned report.
    pub async fn download(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        photo_id: Uuid,
    ) -> StoreResult<(Photo, Vec<u8>)> {
        let photo = self.store.get_photo(owner, report_id, photo_id).await?;
        let bytes = self.retrieve(&photo).await?;
        Ok((photo, bytes))
    }

    /// Bytes for a photo row. A dangling locator is reported as not found.
    pub(crate) async fn retrieve(&self, photo: &Photo) -> StoreResult<Vec<u8>> {
        match self.storage.retrieve(&photo.locator).await {
            Ok(bytes) => Ok(bytes),
            Err(StorageError::UnknownLocator(_)) => {
                Err(StoreError::NotFound(format!("photo {}", photo.id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path().join("photos"));

        let locator = storage.store(b"\x89PNG", "image/png").await.unwrap();
        assert!(locator.ends_with(".png"));
        assert_eq!(storage.retrieve(&locator).await.unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn local_storage_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());
        for locator in ["../secret", "a/b", "", ".hidden"] {
            assert!(matches!(
                storage.retrieve(locator).await,
                Err(StorageError::UnknownLocator(_))
            ));
        }
    }

    #[tokio::test]
    async fn local_storage_missing_file_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());
        assert!(matches!(
            storage.retrieve("0000.png").await,
            Err(StorageError::UnknownLocator(_))
        ));
    }

    #[tokio::test]
    async fn local_storage_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());
        let locator = storage.store(b"gif", "image/gif").await.unwrap();
        storage.delete(&locator).await.unwrap();
        storage.delete(&locator).await.unwrap();
        assert!(storage.retrieve(&locator).await.is_err());
    }

    /// Storage that deletes the report's client right after the bytes are
    /// written, as a concurrent owner request would.
    struct DeletesReportOnStore {
        inner: MemoryPhotoStorage,
        store: Arc<dyn Store>,
        owner: OwnerId,
        client_id: Uuid,
        stored: RwLock<Vec<String>>,
    }

    #[async_trait]
    impl PhotoStorage for DeletesReportOnStore {
        async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
            let locator = self.inner.store(bytes, content_type).await?;
            self.stored.write().await.push(locator.clone());
            self.store
                .delete_client(&self.owner, self.client_id)
                .await
                .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))?;
            Ok(locator)
        }

        async fn retrieve(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.retrieve(locator).await
        }

        async fn delete(&self, locator: &str) -> Result<(), StorageError> {
            self.inner.delete(locator).await
        }
    }

    #[tokio::test]
    async fn failed_insert_removes_stored_bytes() {
        use crate::auth::seed_owner;
        use crate::models::domain::{NewClient, NewLessonSession, NewReport};
        use crate::store::memory::MemoryStore;

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let owner = seed_owner(store.as_ref(), "anna", "long-enough-pw", None)
            .await
            .unwrap();
        let client = store
            .create_client(
                &owner,
                &NewClient {
                    name: "Lena".into(),
                    phone: None,
                    email: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        let session = store
            .create_session(
                &owner,
                &NewLessonSession {
                    client_id: client.id,
                    session_date: chrono::NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
                    duration_minutes: None,
                    focus: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        let report = store
            .create_report(
                &owner,
                session.id,
                &NewReport {
                    summary: "Footwork".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let storage = Arc::new(DeletesReportOnStore {
            inner: MemoryPhotoStorage::new(),
            store: store.clone(),
            owner,
            client_id: client.id,
            stored: RwLock::new(Vec::new()),
        });
        let service = PhotoService::new(store, storage.clone());

        let err = service
            .upload(&owner, report.id, "image/png", b"png")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let stored = storage.stored.read().await.clone();
        assert_eq!(stored.len(), 1);
        assert!(matches!(
            storage.retrieve(&stored[0]).await,
            Err(StorageError::UnknownLocator(_))
        ));
    }

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemoryPhotoStorage::new();
        let locator = storage.store(b"jpeg-bytes", "image/jpeg").await.unwrap();
        assert_eq!(storage.retrieve(&locator).await.unwrap(), b"jpeg-bytes");
        assert!(storage.retrieve("nope").await.is_err());
    }
}
