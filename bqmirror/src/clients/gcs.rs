use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use tracing::debug;

use crate::error::{ErrorKind, MirrorResult};
use crate::mirror_error;
use crate::storage::Storage;
use crate::types::BlobId;

/// [`Storage`] backed by the GCS API, authenticated through application
/// default credentials.
#[derive(Clone)]
pub struct GcsStorage {
    client: Client,
}

impl GcsStorage {
    pub async fn new() -> MirrorResult<GcsStorage> {
        let config = ClientConfig::default().with_auth().await.map_err(|err| {
            mirror_error!(
                ErrorKind::StorageError,
                "failed to set up GCS authentication",
                err
            )
        })?;

        Ok(GcsStorage {
            client: Client::new(config),
        })
    }
}

impl Storage for GcsStorage {
    async fn list_blobs(&self, bucket: &str, prefix: &str) -> MirrorResult<Vec<BlobId>> {
        let mut blobs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects(&ListObjectsRequest {
                    bucket: bucket.to_string(),
                    prefix: Some(prefix.to_string()),
                    page_token: page_token.take(),
                    ..Default::default()
                })
                .await
                .map_err(|err| {
                    mirror_error!(
                        ErrorKind::StorageError,
                        "failed to list staged objects",
                        format!("{bucket}/{prefix}: {err}")
                    )
                })?;

            if let Some(items) = response.items {
                blobs.extend(
                    items
                        .into_iter()
                        .map(|object| BlobId::new(bucket, object.name)),
                );
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(bucket, prefix, blobs = blobs.len(), "listed staged objects");

        Ok(blobs)
    }

    async fn delete_blob(&self, blob: &BlobId) -> MirrorResult<()> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: blob.bucket.clone(),
                object: blob.name.clone(),
                ..Default::default()
            })
            .await
            .map_err(|err| {
                mirror_error!(
                    ErrorKind::StorageError,
                    "failed to delete a staged object",
                    format!("{blob}: {err}")
                )
            })
    }
}
