use chrono::Duration;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{ExportConfig, ExportMode};
use crate::error::{MediaFlowError, Result};
use crate::media::asset::container_url;
use crate::media::{ContainerPermission, MediaServicesTrait};
use crate::naming::RunNames;
use crate::storage::{BlobStorageTrait, ContainerUrl};

/// Files written by an export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Folder the files were written under
    pub folder: PathBuf,
    pub files: Vec<PathBuf>,
    pub bytes: u64,
}

/// Map a `/`-separated blob name below `root`
///
/// Empty, `.` and `..` segments are dropped so a blob name can never
/// escape `root`.
pub fn local_path(root: &Path, blob_name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in blob_name.split('/') {
        let segment_path = Path::new(segment);
        let is_plain = matches!(segment_path.components().next(), Some(Component::Normal(_)))
            && segment_path.components().count() == 1;
        if is_plain {
            path.push(segment);
        }
    }
    path
}

/// Map every blob name below `root`, failing before any download when two
/// names land on the same file or one blob's file is another's directory
pub fn plan_targets<'a>(
    root: &Path,
    blob_names: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    let mut owners: BTreeMap<PathBuf, &str> = BTreeMap::new();

    for name in blob_names {
        let target = local_path(root, name);
        if target == root {
            return Err(MediaFlowError::Storage(format!(
                "Blob '{}' has no usable path segment",
                name
            )));
        }
        if let Some(other) = owners.insert(target.clone(), name) {
            return Err(MediaFlowError::Storage(format!(
                "Blobs '{}' and '{}' both map to {}",
                other,
                name,
                target.display()
            )));
        }
        targets.push(target);
    }

    for (target, name) in &owners {
        for ancestor in target.ancestors().skip(1).take_while(|a| *a != root) {
            if let Some(other) = owners.get(ancestor) {
                return Err(MediaFlowError::Storage(format!(
                    "Blob '{}' needs {} as a directory but blob '{}' is stored there",
                    name,
                    ancestor.display(),
                    other
                )));
            }
        }
    }

    Ok(targets)
}

async fn download(storage: &dyn BlobStorageTrait, source: &url::Url, target: &Path, name: &str) -> Result<()> {
    if target.exists() {
        warn!("Overwriting existing {}", target.display());
    }
    storage.download_to_file(source, target).await?;
    info!("Downloaded {}", name);
    Ok(())
}

/// Export the output asset as configured
pub async fn export_results(
    config: &ExportConfig,
    media: &dyn MediaServicesTrait,
    storage: &dyn BlobStorageTrait,
    names: &RunNames,
    output_root: &Path,
) -> Result<ExportReport> {
    let lifetime = Duration::minutes(config.sas_expiry_minutes);

    match config.mode {
        ExportMode::Direct => export_direct(media, storage, &names.output_asset, output_root, lifetime).await,
        ExportMode::Copy => {
            let publish = config.publish_container_url.as_deref().ok_or_else(|| {
                MediaFlowError::Config("export.publish_container_url is required for copy mode".to_string())
            })?;
            let publish = ContainerUrl::parse(publish)?;
            export_via_copy(
                media,
                storage,
                &names.output_asset,
                &publish,
                names.run_id.as_str(),
                output_root,
                lifetime,
            )
            .await
        }
    }
}

/// Download every blob of the output asset into `<output_root>/<asset>`
pub async fn export_direct(
    media: &dyn MediaServicesTrait,
    storage: &dyn BlobStorageTrait,
    output_asset: &str,
    output_root: &Path,
    sas_lifetime: Duration,
) -> Result<ExportReport> {
    let container = container_url(media, output_asset, ContainerPermission::Read, sas_lifetime).await?;

    let folder = output_root.join(output_asset);
    fs::create_dir_all(&folder).await?;
    info!("Downloading output asset {} to {}", output_asset, folder.display());

    let blobs = storage.list_blobs(&container).await?;
    if blobs.is_empty() {
        warn!("Output asset {} contains no blobs", output_asset);
    }

    let targets = plan_targets(&folder, blobs.iter().map(|b| b.name.as_str()))?;
    for (blob, target) in blobs.iter().zip(&targets) {
        download(storage, &container.blob_url(&blob.name), target, &blob.name).await?;
    }

    summarize(output_root, folder)
}

/// Copy every output blob into `<publish>/<run_id>/`, then download the copies
pub async fn export_via_copy(
    media: &dyn MediaServicesTrait,
    storage: &dyn BlobStorageTrait,
    output_asset: &str,
    publish: &ContainerUrl,
    run_id: &str,
    output_root: &Path,
    sas_lifetime: Duration,
) -> Result<ExportReport> {
    let container = container_url(media, output_asset, ContainerPermission::Read, sas_lifetime).await?;
    let blobs = storage.list_blobs(&container).await?;
    if blobs.is_empty() {
        warn!("Output asset {} contains no blobs", output_asset);
    }

    let names: Vec<String> = blobs.iter().map(|b| format!("{}/{}", run_id, b.name)).collect();
    let targets = plan_targets(output_root, names.iter().map(String::as_str))?;

    let mut published = Vec::with_capacity(blobs.len());
    for (blob, name) in blobs.iter().zip(&names) {
        let destination = publish.blob_url(name);
        storage.copy_from_url(&container.blob_url(&blob.name), &destination).await?;
        published.push(destination);
    }
    info!("Published {} blobs to {}/{}", published.len(), publish, run_id);

    fs::create_dir_all(output_root).await?;
    for ((url, target), name) in published.iter().zip(&targets).zip(&names) {
        download(storage, url, target, name).await?;
    }

    summarize(output_root, output_root.join(run_id))
}

fn summarize(output_root: &Path, folder: PathBuf) -> Result<ExportReport> {
    let mut report = ExportReport {
        folder: folder.clone(),
        ..ExportReport::default()
    };

    if !folder.exists() {
        return Ok(report);
    }

    for entry in WalkDir::new(&folder).sort_by_file_name() {
        let entry = entry.map_err(|e| MediaFlowError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        report.bytes += entry.metadata().map_err(|e| MediaFlowError::Io(e.into()))?.len();
        let shown = pathdiff::diff_paths(entry.path(), output_root).unwrap_or_else(|| entry.path().to_path_buf());
        info!("  {}", shown.display());
        report.files.push(entry.into_path());
    }

    info!("Exported {} files ({} bytes) to {}", report.files.len(), report.bytes, folder.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaServicesTrait;
    use crate::naming::RunId;
    use crate::storage::{BlobItem, MockBlobStorageTrait};
    use std::sync::{Arc, Mutex};

    const OUT_SAS: &str = "https://acct.blob.core.windows.net/asset-out?sig=r";
    const PUBLISH: &str = "https://pub.blob.core.windows.net/published?sig=w";

    fn media_with_read_sas() -> MockMediaServicesTrait {
        let mut media = MockMediaServicesTrait::new();
        media
            .expect_list_container_sas()
            .withf(|_, permissions, _| *permissions == ContainerPermission::Read)
            .returning(|_, _, _| Ok(vec![OUT_SAS.to_string()]));
        media
    }

    fn storage_listing(names: &[&str]) -> MockBlobStorageTrait {
        let items: Vec<BlobItem> = names
            .iter()
            .map(|n| BlobItem { name: n.to_string(), size: Some(4) })
            .collect();
        let mut storage = MockBlobStorageTrait::new();
        storage.expect_list_blobs().returning(move |_| Ok(items.clone()));
        storage
            .expect_download_to_file()
            .returning(|_, path| {
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, b"data").unwrap();
                Ok(4)
            });
        storage
    }

    #[test]
    fn test_local_path_maps_separators() {
        let root = Path::new("/tmp/out");
        assert_eq!(local_path(root, "a/b/c.mp4"), root.join("a").join("b").join("c.mp4"));
        assert_eq!(local_path(root, "../../etc/passwd"), root.join("etc").join("passwd"));
        assert_eq!(local_path(root, "x//./y"), root.join("x").join("y"));
    }

    #[test]
    fn test_plan_targets_rejects_colliding_names() {
        let root = Path::new("/tmp/out");
        let err = plan_targets(root, ["a/../b", "b"]).unwrap_err();
        assert!(matches!(err, MediaFlowError::Storage(ref msg) if msg.contains("both map to")));
    }

    #[test]
    fn test_plan_targets_rejects_file_used_as_directory() {
        let root = Path::new("/tmp/out");
        let err = plan_targets(root, ["a/", "a/x.mp4"]).unwrap_err();
        assert!(matches!(err, MediaFlowError::Storage(ref msg) if msg.contains("as a directory")));

        let err = plan_targets(root, ["a/x.mp4", "a"]).unwrap_err();
        assert!(matches!(err, MediaFlowError::Storage(_)));
    }

    #[test]
    fn test_plan_targets_rejects_empty_name() {
        let err = plan_targets(Path::new("/tmp/out"), ["/.."]).unwrap_err();
        assert!(matches!(err, MediaFlowError::Storage(ref msg) if msg.contains("no usable path")));
    }

    #[test]
    fn test_plan_targets_keeps_order() {
        let root = Path::new("/tmp/out");
        let targets = plan_targets(root, ["b.mp4", "thumbs/a.jpg", "a.mp4"]).unwrap();
        assert_eq!(
            targets,
            vec![root.join("b.mp4"), root.join("thumbs").join("a.jpg"), root.join("a.mp4")]
        );
    }

    #[tokio::test]
    async fn test_colliding_blobs_download_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let media = media_with_read_sas();
        let mut storage = MockBlobStorageTrait::new();
        storage.expect_list_blobs().returning(|_| {
            Ok(vec![
                BlobItem { name: "x/../clip.mp4".to_string(), size: None },
                BlobItem { name: "clip.mp4".to_string(), size: None },
            ])
        });
        storage.expect_download_to_file().never();

        let err = export_direct(&media, &storage, "out-asset", dir.path(), Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaFlowError::Storage(_)));
    }

    #[tokio::test]
    async fn test_direct_export_writes_one_file_per_blob() {
        let dir = tempfile::tempdir().unwrap();
        let media = media_with_read_sas();
        let storage = storage_listing(&["Video-input-720p-3600000.mp4", "manifest.json"]);

        let report = export_direct(&media, &storage, "out-asset", dir.path(), Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(report.folder, dir.path().join("out-asset"));
        assert_eq!(
            report.files,
            vec![
                dir.path().join("out-asset").join("Video-input-720p-3600000.mp4"),
                dir.path().join("out-asset").join("manifest.json"),
            ]
        );
        assert_eq!(report.bytes, 8);
    }

    #[tokio::test]
    async fn test_copy_export_publishes_then_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let media = media_with_read_sas();
        let mut storage = storage_listing(&["a.mp4", "b.mp4"]);

        let copies = Arc::new(Mutex::new(Vec::new()));
        let log = copies.clone();
        storage.expect_copy_from_url().times(2).returning(move |source, destination| {
            log.lock().unwrap().push((source.path().to_string(), destination.path().to_string()));
            Ok(())
        });

        let publish = ContainerUrl::parse(PUBLISH).unwrap();
        let report = export_via_copy(
            &media,
            &storage,
            "out-asset",
            &publish,
            "run1",
            dir.path(),
            Duration::hours(1),
        )
        .await
        .unwrap();

        assert_eq!(
            *copies.lock().unwrap(),
            vec![
                ("/asset-out/a.mp4".to_string(), "/published/run1/a.mp4".to_string()),
                ("/asset-out/b.mp4".to_string(), "/published/run1/b.mp4".to_string()),
            ]
        );
        assert_eq!(
            report.files,
            vec![dir.path().join("run1").join("a.mp4"), dir.path().join("run1").join("b.mp4")]
        );
    }

    #[tokio::test]
    async fn test_copy_failure_stops_export() {
        let dir = tempfile::tempdir().unwrap();
        let media = media_with_read_sas();
        let mut storage = MockBlobStorageTrait::new();
        storage
            .expect_list_blobs()
            .returning(|_| Ok(vec![BlobItem { name: "a.mp4".to_string(), size: None }]));
        storage
            .expect_copy_from_url()
            .returning(|_, _| Err(MediaFlowError::Storage("copy failed".to_string())));
        storage.expect_download_to_file().never();

        let publish = ContainerUrl::parse(PUBLISH).unwrap();
        let result = export_via_copy(&media, &storage, "out", &publish, "run1", dir.path(), Duration::hours(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_export_results_dispatches_on_mode() {
        let dir = tempfile::tempdir().unwrap();
        let media = media_with_read_sas();
        let storage = storage_listing(&["clip.mp4"]);
        let names = RunNames::new("mediaflow", RunId::parse("abc123").unwrap());

        let report = export_results(&ExportConfig::default(), &media, &storage, &names, dir.path())
            .await
            .unwrap();
        assert_eq!(report.files, vec![dir.path().join(&names.output_asset).join("clip.mp4")]);

        let copy_without_target = ExportConfig {
            mode: ExportMode::Copy,
            ..ExportConfig::default()
        };
        let err = export_results(&copy_without_target, &media, &storage, &names, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaFlowError::Config(_)));
    }
}
