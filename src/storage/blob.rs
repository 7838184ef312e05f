use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaFlowError, Result};
use super::container::{redact, ContainerUrl};
use super::{BlobItem, BlobStorageTrait};

/// Storage service version sent with every request
const STORAGE_VERSION: &str = "2021-08-06";

/// Files above this size are staged as blocks instead of one Put Blob
const SINGLE_PUT_LIMIT: u64 = 256 * 1024 * 1024;

/// Size of each staged block
const BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Block ids must share one length within a blob
fn block_id(index: usize) -> String {
    STANDARD.encode(format!("{:08}", index))
}

fn block_list_xml(ids: &[String]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
    for id in ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    blob: Vec<BlobEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobEntry {
    name: String,
    #[serde(default)]
    properties: BlobEntryProperties,
}

#[derive(Debug, Default, Deserialize)]
struct BlobEntryProperties {
    #[serde(rename = "Content-Length", default)]
    content_length: Option<u64>,
}

/// One page of a List Blobs response
fn parse_listing(xml: &str) -> Result<(Vec<BlobItem>, Option<String>)> {
    let results: EnumerationResults = quick_xml::de::from_str(xml.trim_start_matches('\u{feff}'))?;

    let items = results
        .blobs
        .blob
        .into_iter()
        .map(|entry| BlobItem {
            name: entry.name,
            size: entry.properties.content_length,
        })
        .collect();
    let marker = results.next_marker.filter(|m| !m.trim().is_empty());

    Ok((items, marker))
}

/// Blob storage REST client authorized by SAS URLs
pub struct BlobClient {
    client: Client,
    copy_poll_interval: Duration,
    single_put_limit: u64,
    block_size: u64,
}

impl BlobClient {
    pub fn new(client: Client, copy_poll_interval: Duration) -> Self {
        Self {
            client,
            copy_poll_interval,
            single_put_limit: SINGLE_PUT_LIMIT,
            block_size: BLOCK_SIZE,
        }
    }

    #[cfg(test)]
    fn with_block_limits(mut self, single_put_limit: u64, block_size: u64) -> Self {
        self.single_put_limit = single_put_limit;
        self.block_size = block_size;
        self
    }

    /// Stage `file` as fixed-size blocks, then commit them in order
    async fn upload_blocks(&self, url: &Url, mut file: fs::File, blob_name: &str) -> Result<()> {
        let mut ids = Vec::new();

        loop {
            let mut buffer = Vec::new();
            (&mut file).take(self.block_size).read_to_end(&mut buffer).await?;
            if buffer.is_empty() {
                break;
            }

            let id = block_id(ids.len());
            let mut block_url = url.clone();
            block_url
                .query_pairs_mut()
                .append_pair("comp", "block")
                .append_pair("blockid", &id);

            debug!("Staging block {} of {} ({} bytes)", ids.len(), blob_name, buffer.len());
            let response = self
                .client
                .put(block_url)
                .header("x-ms-version", STORAGE_VERSION)
                .header(CONTENT_LENGTH, buffer.len())
                .body(buffer)
                .send()
                .await?;
            Self::check(response, &format!("Block {} of {}", ids.len(), blob_name)).await?;
            ids.push(id);
        }

        let mut commit_url = url.clone();
        commit_url.query_pairs_mut().append_pair("comp", "blocklist");
        let response = self
            .client
            .put(commit_url)
            .header("x-ms-version", STORAGE_VERSION)
            .header("x-ms-blob-content-type", "application/octet-stream")
            .header(CONTENT_TYPE, "application/xml")
            .body(block_list_xml(&ids))
            .send()
            .await?;
        Self::check(response, &format!("Block list of {}", blob_name)).await?;

        debug!("Committed {} blocks of {}", ids.len(), blob_name);
        Ok(())
    }

    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MediaFlowError::Storage(format!("{} failed with {}: {}", what, status, body)))
    }

    fn copy_status(response: &Response) -> (String, String) {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        (header("x-ms-copy-status"), header("x-ms-copy-status-description"))
    }
}

#[async_trait]
impl BlobStorageTrait for BlobClient {
    async fn upload_file(&self, container: &ContainerUrl, blob_name: &str, path: &Path) -> Result<()> {
        let url = container.blob_url(blob_name);
        let file = fs::File::open(path).await?;
        let length = file.metadata().await?.len();

        info!("Uploading {} ({} bytes) to {}", path.display(), length, redact(&url));

        if length > self.single_put_limit {
            self.upload_blocks(&url, file, blob_name).await?;
            info!("Upload of {} completed", blob_name);
            return Ok(());
        }

        let response = self
            .client
            .put(url.clone())
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", STORAGE_VERSION)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, length)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        Self::check(response, &format!("Upload of {}", blob_name)).await?;

        info!("Upload of {} completed", blob_name);
        Ok(())
    }

    async fn list_blobs(&self, container: &ContainerUrl) -> Result<Vec<BlobItem>> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let url = container.list_url(marker.as_deref());
            debug!("Listing blobs in {}", container);

            let response = self
                .client
                .get(url)
                .header("x-ms-version", STORAGE_VERSION)
                .send()
                .await?;
            let body = Self::check(response, "List blobs").await?.text().await?;

            let (page, next) = parse_listing(&body)?;
            blobs.extend(page);
            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        debug!("Found {} blobs in {}", blobs.len(), container);
        Ok(blobs)
    }

    async fn download_to_file(&self, source: &Url, path: &Path) -> Result<u64> {
        debug!("Downloading {} to {}", redact(source), path.display());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get(source.clone())
            .header("x-ms-version", STORAGE_VERSION)
            .send()
            .await?;
        let response = Self::check(response, &format!("Download of {}", redact(source))).await?;

        let mut file = fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn copy_from_url(&self, source: &Url, destination: &Url) -> Result<()> {
        info!("Copying {} to {}", redact(source), redact(destination));

        let response = self
            .client
            .put(destination.clone())
            .header("x-ms-version", STORAGE_VERSION)
            .header("x-ms-copy-source", source.as_str())
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        let response = Self::check(response, "Copy").await?;
        let (mut status, mut description) = Self::copy_status(&response);

        while status == "pending" {
            tokio::time::sleep(self.copy_poll_interval).await;
            let response = self
                .client
                .head(destination.clone())
                .header("x-ms-version", STORAGE_VERSION)
                .send()
                .await?;
            let response = Self::check(response, "Copy status").await?;
            (status, description) = Self::copy_status(&response);
            debug!("Copy to {} is {}", redact(destination), status);
        }

        match status.as_str() {
            "success" => Ok(()),
            other => Err(MediaFlowError::Storage(format!(
                "Copy to {} ended as '{}': {}",
                redact(destination),
                other,
                description
            ))),
        }
    }
}
