use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, MirrorResult};
use crate::storage::Storage;
use crate::types::BlobId;

#[derive(Debug, Default)]
struct Inner {
    blobs: BTreeSet<BlobId>,
    fail_deletes: HashSet<BlobId>,
    deleted: Vec<BlobId>,
}

/// In-memory [`Storage`] used in tests and examples.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    pub async fn insert_blob(&self, blob: BlobId) {
        let mut inner = self.inner.lock().await;
        inner.blobs.insert(blob);
    }

    /// Makes every future deletion of the given blob fail.
    pub async fn fail_delete_of(&self, blob: BlobId) {
        let mut inner = self.inner.lock().await;
        inner.fail_deletes.insert(blob);
    }

    /// Returns the blobs deleted so far, in deletion order.
    pub async fn deleted(&self) -> Vec<BlobId> {
        self.inner.lock().await.deleted.clone()
    }

    /// Returns the blobs currently stored, in name order.
    pub async fn blobs(&self) -> Vec<BlobId> {
        self.inner.lock().await.blobs.iter().cloned().collect()
    }
}

impl Storage for MemoryStorage {
    async fn list_blobs(&self, bucket: &str, prefix: &str) -> MirrorResult<Vec<BlobId>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .blobs
            .iter()
            .filter(|blob| blob.bucket == bucket && blob.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_blob(&self, blob: &BlobId) -> MirrorResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.fail_deletes.contains(blob) {
            bail!(
                ErrorKind::StorageError,
                "failed to delete object",
                blob.clone()
            );
        }

        if !inner.blobs.remove(blob) {
            bail!(
                ErrorKind::StorageError,
                "object does not exist",
                blob.clone()
            );
        }

        inner.deleted.push(blob.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_filters_by_bucket_and_prefix() {
        let storage = MemoryStorage::new();
        storage.insert_blob(BlobId::new("b1", "events/t1/000.avro")).await;
        storage.insert_blob(BlobId::new("b1", "events/t2/000.avro")).await;
        storage.insert_blob(BlobId::new("b2", "events/t1/000.avro")).await;

        let listed = storage.list_blobs("b1", "events/t1/").await.unwrap();

        assert_eq!(listed, vec![BlobId::new("b1", "events/t1/000.avro")]);
    }

    #[tokio::test]
    async fn delete_removes_the_blob() {
        let storage = MemoryStorage::new();
        let blob = BlobId::new("b1", "events/t1/000.avro");
        storage.insert_blob(blob.clone()).await;

        storage.delete_blob(&blob).await.unwrap();

        assert!(storage.blobs().await.is_empty());
        assert_eq!(storage.deleted().await, vec![blob]);
    }

    #[tokio::test]
    async fn deleting_a_missing_blob_is_an_error() {
        let storage = MemoryStorage::new();
        let blob = BlobId::new("b1", "events/t1/000.avro");

        let error = storage.delete_blob(&blob).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::StorageError);
    }

    #[tokio::test]
    async fn scripted_delete_failure_keeps_the_blob() {
        let storage = MemoryStorage::new();
        let blob = BlobId::new("b1", "events/t1/000.avro");
        storage.insert_blob(blob.clone()).await;
        storage.fail_delete_of(blob.clone()).await;

        let error = storage.delete_blob(&blob).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::StorageError);
        assert_eq!(storage.blobs().await, vec![blob]);
    }
}
