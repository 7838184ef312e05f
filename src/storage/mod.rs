// Blob storage data plane
//
// Every operation is authorized by a SAS URL, so no account credentials are
// involved here:
// - Container: parsing and composing container/blob SAS URLs
// - Blob: reqwest-backed implementation of BlobStorageTrait

pub mod blob;
pub mod container;

use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub use blob::BlobClient;
pub use container::{redact, ContainerUrl};

use crate::error::Result;

/// Blob as reported by a container listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    pub name: String,
    pub size: Option<u64>,
}

/// Blob operations used by the upload and export steps
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStorageTrait: Send + Sync {
    /// Upload a local file as a block blob, replacing any blob of the same name
    async fn upload_file(&self, container: &ContainerUrl, blob_name: &str, path: &Path) -> Result<()>;

    /// List every blob in a container
    async fn list_blobs(&self, container: &ContainerUrl) -> Result<Vec<BlobItem>>;

    /// GET `source` and stream it into `path`, returning the number of bytes written
    async fn download_to_file(&self, source: &Url, path: &Path) -> Result<u64>;

    /// Server-side copy `source` into `destination` and wait for it to finish
    async fn copy_from_url(&self, source: &Url, destination: &Url) -> Result<()>;
}

/// Factory for creating blob storage clients
pub struct BlobStorageFactory;

impl BlobStorageFactory {
    /// Create the default REST implementation
    pub fn create_client(client: Client, copy_poll_interval: Duration) -> Arc<dyn BlobStorageTrait> {
        Arc::new(BlobClient::new(client, copy_poll_interval))
    }
}
