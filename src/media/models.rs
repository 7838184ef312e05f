//! Wire representations of the Media Services ARM resources this tool touches.
//!
//! Only the fields the workflow reads or writes are modelled; everything else
//! the service returns is ignored on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name and id shared by every ARM resource response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArmResource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArmErrorResponse {
    pub error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    pub properties: TransformProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub outputs: Vec<TransformOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub on_error: OnErrorType,
    pub relative_priority: Priority,
    pub preset: Preset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnErrorType {
    StopProcessingJob,
    ContinueJob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "@odata.type")]
pub enum Preset {
    #[serde(rename = "#Microsoft.Media.StandardEncoderPreset")]
    StandardEncoder(StandardEncoderPreset),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardEncoderPreset {
    pub codecs: Vec<Codec>,
    pub formats: Vec<Format>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "@odata.type")]
pub enum Codec {
    #[serde(rename = "#Microsoft.Media.AacAudio")]
    AacAudio(AacAudio),
    #[serde(rename = "#Microsoft.Media.H264Video")]
    H264Video(H264Video),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AacAudio {
    pub channels: u32,
    pub sampling_rate: u32,
    pub bitrate: u32,
    pub profile: AacProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AacProfile {
    AacLc,
    HeAacV1,
    HeAacV2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H264Video {
    pub complexity: H264Complexity,
    pub layers: Vec<H264Layer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum H264Complexity {
    Speed,
    Balanced,
    Quality,
}

/// One rung of the bitrate ladder; the service wants dimensions as strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H264Layer {
    pub bitrate: u32,
    pub width: String,
    pub height: String,
    pub label: String,
    pub frame_rate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "@odata.type")]
pub enum Format {
    #[serde(rename = "#Microsoft.Media.Mp4Format")]
    Mp4(Mp4Format),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mp4Format {
    pub filename_pattern: String,
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub properties: AssetProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Storage container backing the asset, assigned by the service
    #[serde(default, skip_serializing)]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerPermission {
    Read,
    ReadWrite,
    ReadWriteDelete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContainerSasInput {
    pub permissions: ContainerPermission,
    pub expiry_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetContainerSas {
    #[serde(default)]
    pub asset_container_sas_urls: Vec<String>,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub properties: JobProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProperties {
    #[serde(default, skip_serializing)]
    pub state: Option<JobState>,
    pub input: JobInputAsset,
    pub outputs: Vec<JobOutputAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInputAsset {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub asset_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutputAsset {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub asset_name: String,
    #[serde(default, skip_serializing)]
    pub state: Option<JobState>,
    #[serde(default, skip_serializing)]
    pub progress: Option<i32>,
    #[serde(default, skip_serializing)]
    pub error: Option<JobError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub value: Vec<Job>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

impl Job {
    const INPUT_ASSET_TYPE: &'static str = "#Microsoft.Media.JobInputAsset";
    const OUTPUT_ASSET_TYPE: &'static str = "#Microsoft.Media.JobOutputAsset";

    /// Job body reading one asset and writing one asset
    pub fn for_assets(input_asset: &str, output_asset: &str) -> Self {
        Self {
            name: String::new(),
            properties: JobProperties {
                state: None,
                input: JobInputAsset {
                    odata_type: Self::INPUT_ASSET_TYPE.to_string(),
                    asset_name: input_asset.to_string(),
                },
                outputs: vec![JobOutputAsset {
                    odata_type: Self::OUTPUT_ASSET_TYPE.to_string(),
                    asset_name: output_asset.to_string(),
                    state: None,
                    progress: None,
                    error: None,
                }],
            },
        }
    }

    /// Overall job state, falling back to Queued when the service omitted it
    pub fn state(&self) -> JobState {
        self.properties.state.clone().unwrap_or(JobState::Queued)
    }

    /// Error codes and messages reported on failed outputs
    pub fn error_summary(&self) -> String {
        let messages: Vec<String> = self
            .properties
            .outputs
            .iter()
            .filter_map(|output| output.error.as_ref())
            .map(|error| format!("{}: {}", error.code, error.message))
            .collect();

        if messages.is_empty() {
            "no error details reported".to_string()
        } else {
            messages.join("; ")
        }
    }
}

/// Job and job output states reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Queued,
    Scheduled,
    Processing,
    Finished,
    Error,
    Canceled,
    Canceling,
    /// Anything the service reports that this tool does not know about
    Other(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Error | JobState::Canceled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Queued => "Queued",
            JobState::Scheduled => "Scheduled",
            JobState::Processing => "Processing",
            JobState::Finished => "Finished",
            JobState::Error => "Error",
            JobState::Canceled => "Canceled",
            JobState::Canceling => "Canceling",
            JobState::Other(value) => value,
        }
    }
}

impl From<String> for JobState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Queued" => JobState::Queued,
            "Scheduled" => JobState::Scheduled,
            "Processing" => JobState::Processing,
            "Finished" => JobState::Finished,
            "Error" => JobState::Error,
            "Canceled" => JobState::Canceled,
            "Canceling" => JobState::Canceling,
            _ => JobState::Other(value),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
