use chrono::{Duration, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{MediaFlowError, Result};
use crate::storage::{BlobStorageTrait, ContainerUrl};
use super::models::{Asset, ContainerPermission};
use super::MediaServicesTrait;

/// Ask the media account for a container SAS on `asset` valid for `lifetime`
pub async fn container_url(
    media: &dyn MediaServicesTrait,
    asset: &str,
    permissions: ContainerPermission,
    lifetime: Duration,
) -> Result<ContainerUrl> {
    let expiry = Utc::now() + lifetime;
    let urls = media.list_container_sas(asset, permissions, expiry).await?;
    let first = urls.first().ok_or_else(|| {
        MediaFlowError::Storage(format!("No container SAS URL returned for asset {}", asset))
    })?;
    ContainerUrl::parse(first)
}

/// Make sure the input asset exists and holds `source` under its file name
///
/// An existing asset of the same name is reused and its blob overwritten.
pub async fn ensure_input_asset(
    media: &dyn MediaServicesTrait,
    storage: &dyn BlobStorageTrait,
    name: &str,
    source: &Path,
    sas_lifetime: Duration,
) -> Result<Asset> {
    if !source.is_file() {
        return Err(MediaFlowError::FileNotFound(source.display().to_string()));
    }
    let blob_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| MediaFlowError::Config(format!("Invalid source file name: {}", source.display())))?;

    let asset = match media.get_asset(name).await {
        Ok(existing) => {
            warn!("Asset {} already exists, its contents will be overwritten", name);
            existing
        }
        Err(e) if e.is_not_found() => {
            info!("Creating input asset {}", name);
            media.create_or_update_asset(name, &Asset::default()).await?
        }
        Err(e) => return Err(e),
    };

    let container = container_url(media, name, ContainerPermission::ReadWrite, sas_lifetime).await?;
    storage.upload_file(&container, &blob_name, source).await?;

    info!("Input asset {} holds {}", name, blob_name);
    Ok(asset)
}

/// Create or update the empty asset receiving encoder output
pub async fn ensure_output_asset(media: &dyn MediaServicesTrait, name: &str) -> Result<Asset> {
    info!("Creating output asset {}", name);
    media.create_or_update_asset(name, &Asset::default()).await
}
