use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MediaFlowError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub account: AccountConfig,
    pub auth: AuthConfig,
    pub encoding: EncodingConfig,
    pub paths: PathsConfig,
    pub poll: PollConfig,
    pub export: ExportConfig,
    pub cleanup: CleanupConfig,
    pub naming: NamingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Azure subscription hosting the media account
    pub subscription_id: String,
    /// Resource group of the media account
    pub resource_group: String,
    /// Media Services account name
    pub account_name: String,
    /// Azure Resource Manager endpoint
    pub arm_endpoint: String,
    /// API version used for transforms and jobs
    pub encoding_api_version: String,
    /// API version used for assets
    pub asset_api_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// OAuth2 client-credentials grant against Azure AD
    ClientSecret,
    /// Pre-acquired bearer token (e.g. `az account get-access-token`)
    StaticToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Azure AD authority host
    pub authority: String,
    pub tenant_id: String,
    pub client_id: String,
    /// Only read from the environment, never written back to disk
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Token scope requested for ARM
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Bitrate of the single 720p video layer, in bits per second
    pub video_bitrate: u32,
    /// Description stored on the transform
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Local source video uploaded into the input asset
    pub source_file: PathBuf,
    /// Root folder receiving exported output
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between job status requests
    pub interval_secs: u64,
    /// Give up once the job has been polled for this long
    pub max_duration_secs: Option<u64>,
    /// Give up after this many status requests
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Download every blob straight from the output asset container
    Direct,
    /// Copy blobs into the published container, then download the copies
    Copy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub mode: ExportMode,
    /// Container SAS URL (with write permission) receiving published copies
    pub publish_container_url: Option<String>,
    /// Lifetime of container SAS URLs requested from the media account
    pub sas_expiry_minutes: i64,
    /// Seconds between copy status checks
    pub copy_poll_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Leave the job and transform in place after a successful run
    pub keep_transform_on_success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix of every resource name minted for a run
    pub prefix: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            subscription_id: String::new(),
            resource_group: String::new(),
            account_name: String::new(),
            arm_endpoint: "https://management.azure.com".to_string(),
            encoding_api_version: "2022-07-01".to_string(),
            asset_api_version: "2023-01-01".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::ClientSecret,
            authority: "https://login.microsoftonline.com".to_string(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: None,
            access_token: None,
            scope: "https://management.azure.com/.default".to_string(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_bitrate: 3_600_000,
            description: "H.264 720p with AAC stereo audio".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_file: PathBuf::from("input.mp4"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            max_duration_secs: None,
            max_attempts: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: ExportMode::Direct,
            publish_container_url: None,
            sas_expiry_minutes: 60,
            copy_poll_interval_secs: 1,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: "mediaflow".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MediaFlowError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| MediaFlowError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MediaFlowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| MediaFlowError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Overlay values found through `lookup` (normally the process environment)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("AZURE_SUBSCRIPTION_ID") {
            self.account.subscription_id = v;
        }
        if let Some(v) = non_empty("AZURE_RESOURCE_GROUP") {
            self.account.resource_group = v;
        }
        if let Some(v) = non_empty("AZURE_MEDIA_ACCOUNT") {
            self.account.account_name = v;
        }
        if let Some(v) = non_empty("AZURE_TENANT_ID") {
            self.auth.tenant_id = v;
        }
        if let Some(v) = non_empty("AZURE_CLIENT_ID") {
            self.auth.client_id = v;
        }
        if let Some(v) = non_empty("AZURE_CLIENT_SECRET") {
            self.auth.client_secret = Some(v);
        }
        if let Some(v) = non_empty("AZURE_ACCESS_TOKEN") {
            debug!("Using bearer token from AZURE_ACCESS_TOKEN");
            self.auth.access_token = Some(v);
            self.auth.mode = AuthMode::StaticToken;
        }
        if let Some(v) = non_empty("MEDIAFLOW_PUBLISH_CONTAINER_URL") {
            self.export.publish_container_url = Some(v);
        }
    }

    /// Reject configurations that cannot possibly complete a run
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("account.subscription_id", &self.account.subscription_id),
            ("account.resource_group", &self.account.resource_group),
            ("account.account_name", &self.account.account_name),
            ("account.arm_endpoint", &self.account.arm_endpoint),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(MediaFlowError::Config(format!("{} must be set", key)));
            }
        }
        url::Url::parse(&self.account.arm_endpoint).map_err(|e| {
            MediaFlowError::Config(format!("account.arm_endpoint is not a valid URL: {}", e))
        })?;

        match self.auth.mode {
            AuthMode::ClientSecret => {
                if self.auth.tenant_id.trim().is_empty() || self.auth.client_id.trim().is_empty() {
                    return Err(MediaFlowError::Config(
                        "auth.tenant_id and auth.client_id are required for client_secret mode".to_string(),
                    ));
                }
                if self.auth.client_secret.is_none() {
                    return Err(MediaFlowError::Config(
                        "AZURE_CLIENT_SECRET is required for client_secret mode".to_string(),
                    ));
                }
            }
            AuthMode::StaticToken => {
                if self.auth.access_token.is_none() {
                    return Err(MediaFlowError::Config(
                        "AZURE_ACCESS_TOKEN is required for static_token mode".to_string(),
                    ));
                }
            }
        }

        if self.encoding.video_bitrate == 0 {
            return Err(MediaFlowError::Config("encoding.video_bitrate must be positive".to_string()));
        }
        if self.poll.interval_secs == 0 {
            return Err(MediaFlowError::Config("poll.interval_secs must be positive".to_string()));
        }
        if self.poll.max_attempts == Some(0) {
            return Err(MediaFlowError::Config("poll.max_attempts must be positive".to_string()));
        }
        if self.export.sas_expiry_minutes <= 0 {
            return Err(MediaFlowError::Config("export.sas_expiry_minutes must be positive".to_string()));
        }
        if self.export.mode == ExportMode::Copy {
            let publish = self.export.publish_container_url.as_deref().ok_or_else(|| {
                MediaFlowError::Config("export.publish_container_url is required for copy mode".to_string())
            })?;
            url::Url::parse(publish).map_err(|e| {
                MediaFlowError::Config(format!("export.publish_container_url is not a valid URL: {}", e))
            })?;
        }

        let prefix = &self.naming.prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(MediaFlowError::Config(format!(
                "naming.prefix '{}' may only contain letters, digits and '-'",
                prefix
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.account.subscription_id = "00000000-0000-0000-0000-000000000000".to_string();
        config.account.resource_group = "media-rg".to_string();
        config.account.account_name = "mediaacct".to_string();
        config.auth.tenant_id = "tenant".to_string();
        config.auth.client_id = "client".to_string();
        config.auth.client_secret = Some("secret".to_string());
        config
    }

    #[test]
    fn test_defaults_need_account() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("account.subscription_id"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_copy_mode_requires_publish_url() {
        let mut config = valid_config();
        config.export.mode = ExportMode::Copy;
        assert!(config.validate().is_err());

        config.export.publish_container_url =
            Some("https://pub.blob.core.windows.net/published?sv=2020&sig=x".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_prefix() {
        let mut config = valid_config();
        config.naming.prefix = "bad prefix".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AZURE_SUBSCRIPTION_ID", "sub"),
            ("AZURE_RESOURCE_GROUP", "rg"),
            ("AZURE_MEDIA_ACCOUNT", "acct"),
            ("AZURE_ACCESS_TOKEN", "token"),
            ("AZURE_TENANT_ID", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.account.subscription_id, "sub");
        assert_eq!(config.account.resource_group, "rg");
        assert_eq!(config.account.account_name, "acct");
        assert_eq!(config.auth.mode, AuthMode::StaticToken);
        assert!(config.auth.tenant_id.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [account]
            subscription_id = "sub"
            resource_group = "rg"
            account_name = "acct"

            [export]
            mode = "copy"
            "#,
        )
        .unwrap();

        assert_eq!(config.account.encoding_api_version, "2022-07-01");
        assert_eq!(config.export.mode, ExportMode::Copy);
        assert_eq!(config.export.sas_expiry_minutes, 60);
        assert_eq!(config.poll.interval_secs, 1);
        assert_eq!(config.encoding.video_bitrate, 3_600_000);
    }

    #[test]
    fn test_save_and_reload_keeps_secrets_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediaflow.toml");
        let config = valid_config();
        config.save_to_file(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("secret"));

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.account.account_name, "mediaacct");
        assert!(reloaded.auth.client_secret.is_none());
    }
}
