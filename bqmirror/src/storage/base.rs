use std::future::Future;

use crate::error::MirrorResult;
use crate::types::BlobId;

/// Object store operations needed to clean up staged table exports.
pub trait Storage {
    /// Lists the objects in a bucket whose names start with `prefix`.
    fn list_blobs(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> impl Future<Output = MirrorResult<Vec<BlobId>>> + Send;

    /// Deletes a single object. Deleting an object that does not exist is an
    /// error.
    fn delete_blob(&self, blob: &BlobId) -> impl Future<Output = MirrorResult<()>> + Send;
}
