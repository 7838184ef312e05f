use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::auth::CredentialTrait;
use crate::config::AccountConfig;
use crate::error::{MediaFlowError, Result};
use super::models::{
    ArmErrorResponse, ArmResource, Asset, AssetContainerSas, ContainerPermission, Job, JobList,
    ListContainerSasInput, Transform,
};
use super::MediaServicesTrait;

/// Media Services ARM REST client scoped to one account
pub struct ArmMediaClient {
    client: Client,
    credential: Arc<dyn CredentialTrait>,
    account_url: String,
    encoding_api_version: String,
    asset_api_version: String,
}

impl ArmMediaClient {
    pub fn new(config: &AccountConfig, credential: Arc<dyn CredentialTrait>, client: Client) -> Self {
        let account_url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Media/mediaServices/{}",
            config.arm_endpoint.trim_end_matches('/'),
            config.subscription_id,
            config.resource_group,
            config.account_name
        );

        Self {
            client,
            credential,
            account_url,
            encoding_api_version: config.encoding_api_version.clone(),
            asset_api_version: config.asset_api_version.clone(),
        }
    }

    fn transform_url(&self, name: &str) -> String {
        format!(
            "{}/transforms/{}?api-version={}",
            self.account_url, name, self.encoding_api_version
        )
    }

    fn jobs_url(&self, transform: &str) -> String {
        format!(
            "{}/transforms/{}/jobs?api-version={}",
            self.account_url, transform, self.encoding_api_version
        )
    }

    fn job_url(&self, transform: &str, name: &str) -> String {
        format!(
            "{}/transforms/{}/jobs/{}?api-version={}",
            self.account_url, transform, name, self.encoding_api_version
        )
    }

    fn asset_url(&self, name: &str, action: Option<&str>) -> String {
        let action = action.map(|a| format!("/{}", a)).unwrap_or_default();
        format!(
            "{}/assets/{}{}?api-version={}",
            self.account_url, name, action, self.asset_api_version
        )
    }

    /// Start an authenticated request
    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.credential.token().await?;
        debug!("{} {}", method, url);
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    /// Map non-success responses onto the crate error type
    async fn check(response: Response, resource: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(MediaFlowError::NotFound(resource.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ArmErrorResponse>(&body) {
            Ok(parsed) => (parsed.error.code, parsed.error.message),
            Err(_) => (String::new(), body),
        };

        Err(MediaFlowError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder, resource: &str) -> Result<T> {
        let response = Self::check(request.send().await?, resource).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, url: &str, resource: &str) -> Result<()> {
        let response = self.request(Method::DELETE, url).await?.send().await?;
        match Self::check(response, resource).await {
            Ok(_) => Ok(()),
            Err(MediaFlowError::NotFound(_)) => {
                debug!("{} was already gone", resource);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MediaServicesTrait for ArmMediaClient {
    async fn create_or_update_transform(&self, name: &str, transform: &Transform) -> Result<ArmResource> {
        let resource = format!("transform {}", name);
        let request = self.request(Method::PUT, &self.transform_url(name)).await?.json(transform);
        Self::send_json(request, &resource).await
    }

    async fn delete_transform(&self, name: &str) -> Result<()> {
        self.delete(&self.transform_url(name), &format!("transform {}", name)).await
    }

    async fn get_asset(&self, name: &str) -> Result<Asset> {
        let resource = format!("asset {}", name);
        let request = self.request(Method::GET, &self.asset_url(name, None)).await?;
        Self::send_json(request, &resource).await
    }

    async fn create_or_update_asset(&self, name: &str, asset: &Asset) -> Result<Asset> {
        let resource = format!("asset {}", name);
        let request = self.request(Method::PUT, &self.asset_url(name, None)).await?.json(asset);
        Self::send_json(request, &resource).await
    }

    async fn delete_asset(&self, name: &str) -> Result<()> {
        self.delete(&self.asset_url(name, None), &format!("asset {}", name)).await
    }

    async fn list_container_sas(
        &self,
        asset: &str,
        permissions: ContainerPermission,
        expiry: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let resource = format!("asset {}", asset);
        let body = ListContainerSasInput {
            permissions,
            expiry_time: expiry,
        };
        let request = self
            .request(Method::POST, &self.asset_url(asset, Some("listContainerSas")))
            .await?
            .json(&body);

        let sas: AssetContainerSas = Self::send_json(request, &resource).await?;
        Ok(sas.asset_container_sas_urls)
    }

    async fn create_job(&self, transform: &str, name: &str, job: &Job) -> Result<Job> {
        let resource = format!("job {}/{}", transform, name);
        let request = self.request(Method::PUT, &self.job_url(transform, name)).await?.json(job);
        Self::send_json(request, &resource).await
    }

    async fn get_job(&self, transform: &str, name: &str) -> Result<Job> {
        let resource = format!("job {}/{}", transform, name);
        let request = self.request(Method::GET, &self.job_url(transform, name)).await?;
        Self::send_json(request, &resource).await
    }

    async fn delete_job(&self, transform: &str, name: &str) -> Result<()> {
        self.delete(&self.job_url(transform, name), &format!("job {}/{}", transform, name)).await
    }

    async fn list_jobs(&self, transform: &str) -> Result<Vec<Job>> {
        let resource = format!("jobs of transform {}", transform);
        let mut jobs = Vec::new();
        let mut next = Some(self.jobs_url(transform));

        while let Some(url) = next {
            let request = self.request(Method::GET, &url).await?;
            let page: JobList = Self::send_json(request, &resource).await?;
            jobs.extend(page.value);
            next = page.next_link;
        }

        Ok(jobs)
    }
}
