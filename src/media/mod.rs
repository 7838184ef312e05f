// Media Services account operations
//
// This module wraps the ARM resources of a single Media Services account:
// - Models: serde representations of transforms, assets and jobs
// - Client: reqwest-backed implementation of MediaServicesTrait
// - Transform / Asset / Job: idempotent provisioning and job polling built on the trait

pub mod asset;
pub mod client;
pub mod job;
pub mod models;
pub mod transform;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;

pub use client::ArmMediaClient;
pub use models::*;

use crate::auth::CredentialTrait;
use crate::config::AccountConfig;
use crate::error::Result;

/// Resource operations on one Media Services account
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaServicesTrait: Send + Sync {
    /// Create or update a transform by name
    async fn create_or_update_transform(&self, name: &str, transform: &Transform) -> Result<ArmResource>;

    /// Delete a transform; missing transforms are not an error
    async fn delete_transform(&self, name: &str) -> Result<()>;

    /// Fetch an asset, failing with a not-found error when it does not exist
    async fn get_asset(&self, name: &str) -> Result<Asset>;

    /// Create or update an asset by name
    async fn create_or_update_asset(&self, name: &str, asset: &Asset) -> Result<Asset>;

    /// Delete an asset; missing assets are not an error
    async fn delete_asset(&self, name: &str) -> Result<()>;

    /// Request SAS URLs for the storage container backing an asset
    async fn list_container_sas(
        &self,
        asset: &str,
        permissions: ContainerPermission,
        expiry: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Create or update a job under a transform
    async fn create_job(&self, transform: &str, name: &str, job: &Job) -> Result<Job>;

    /// Fetch the current representation of a job
    async fn get_job(&self, transform: &str, name: &str) -> Result<Job>;

    /// Delete a job; missing jobs are not an error
    async fn delete_job(&self, transform: &str, name: &str) -> Result<()>;

    /// List every job under a transform
    async fn list_jobs(&self, transform: &str) -> Result<Vec<Job>>;
}

/// Factory for creating Media Services clients
pub struct MediaServicesFactory;

impl MediaServicesFactory {
    /// Create the default ARM REST implementation
    pub fn create_client(
        config: &AccountConfig,
        credential: Arc<dyn CredentialTrait>,
        client: Client,
    ) -> Arc<dyn MediaServicesTrait> {
        Arc::new(ArmMediaClient::new(config, credential, client))
    }
}
