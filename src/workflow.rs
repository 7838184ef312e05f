use chrono::Duration;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::CredentialFactory;
use crate::cleanup::{JobHandle, Outcome, RunResources, Teardown, TeardownReport};
use crate::config::Config;
use crate::error::{MediaFlowError, Result};
use crate::export::{export_results, ExportReport};
use crate::media::asset::{ensure_input_asset, ensure_output_asset};
use crate::media::job::{submit_job, JobPoller, PollPolicy};
use crate::media::transform::ensure_transform;
use crate::media::{ArmResource, JobState, MediaServicesFactory, MediaServicesTrait};
use crate::naming::{RunId, RunNames};
use crate::storage::{BlobStorageFactory, BlobStorageTrait};

/// Result of a successful run
#[derive(Debug)]
pub struct RunSummary {
    pub names: RunNames,
    pub final_state: JobState,
    pub export: ExportReport,
}

pub struct Workflow {
    config: Config,
    media: Arc<dyn MediaServicesTrait>,
    storage: Arc<dyn BlobStorageTrait>,
    cancel: CancellationToken,
    show_progress: bool,
}

impl Workflow {
    /// Validate `config` and connect to the configured media account
    pub fn new(config: Config, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(concat!("mediaflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let credential = CredentialFactory::create(&config.auth, client.clone())?;
        let media = MediaServicesFactory::create_client(&config.account, credential, client.clone());
        let storage = BlobStorageFactory::create_client(
            client,
            std::time::Duration::from_secs(config.export.copy_poll_interval_secs.max(1)),
        );

        let mut workflow = Self::with_clients(config, media, storage, cancel);
        workflow.show_progress = true;
        Ok(workflow)
    }

    /// Build a workflow over already constructed clients
    pub fn with_clients(
        config: Config,
        media: Arc<dyn MediaServicesTrait>,
        storage: Arc<dyn BlobStorageTrait>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            media,
            storage,
            cancel,
            show_progress: false,
        }
    }

    /// Run the whole workflow under a fresh run identifier
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with_id(RunId::generate()).await
    }

    /// Run the whole workflow; teardown happens on every exit path
    pub async fn run_with_id(&self, run_id: RunId) -> Result<RunSummary> {
        let names = RunNames::new(&self.config.naming.prefix, run_id);
        info!("Starting run {}", names.run_id);

        let mut resources = RunResources::default();
        let outcome = self.execute(&names, &mut resources).await;

        let status = if outcome.is_ok() { Outcome::Succeeded } else { Outcome::Failed };
        info!("Cleaning up resources of run {}", names.run_id);
        let teardown = Teardown::new(self.media.as_ref(), self.config.cleanup.keep_transform_on_success)
            .run(&resources, status)
            .await;

        match outcome {
            Ok(summary) => {
                teardown.into_result()?;
                info!("Run {} finished", names.run_id);
                Ok(summary)
            }
            Err(e) => {
                if !teardown.errors.is_empty() {
                    error!("Cleanup after failed run also failed: {}", teardown.errors.join("; "));
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, names: &RunNames, resources: &mut RunResources) -> Result<RunSummary> {
        let media = self.media.as_ref();
        let storage = self.storage.as_ref();
        let sas_lifetime = Duration::minutes(self.config.export.sas_expiry_minutes);

        resources.transform = Some(names.transform.clone());
        self.unless_cancelled(ensure_transform(media, &names.transform, &self.config.encoding))
            .await?;

        resources.input_asset = Some(names.input_asset.clone());
        self.unless_cancelled(ensure_input_asset(
            media,
            storage,
            &names.input_asset,
            &self.config.paths.source_file,
            sas_lifetime,
        ))
        .await?;

        resources.output_asset = Some(names.output_asset.clone());
        self.unless_cancelled(ensure_output_asset(media, &names.output_asset))
            .await?;

        resources.job = Some(JobHandle {
            transform: names.transform.clone(),
            name: names.job.clone(),
        });
        self.unless_cancelled(submit_job(
            media,
            &names.transform,
            &names.job,
            &names.input_asset,
            &names.output_asset,
        ))
        .await?;

        let policy = PollPolicy::from(&self.config.poll);
        if policy.is_unbounded() {
            warn!("Polling has no time or attempt limit; a stuck job keeps this run waiting until interrupted");
        }
        let mut poller = JobPoller::new(policy, self.cancel.clone());
        if self.show_progress {
            poller = poller.with_progress_bar();
        }
        let job = poller.wait_for_completion(media, &names.transform, &names.job).await?;

        let final_state = job.state();
        if final_state != JobState::Finished {
            return Err(MediaFlowError::JobFailed {
                job: names.job.clone(),
                state: final_state.to_string(),
                details: job.error_summary(),
            });
        }

        let export = self
            .unless_cancelled(export_results(
                &self.config.export,
                media,
                storage,
                names,
                &self.config.paths.output_dir,
            ))
            .await?;

        Ok(RunSummary {
            names: names.clone(),
            final_state,
            export,
        })
    }

    /// Drive `step` to completion unless the run is cancelled first
    async fn unless_cancelled<T>(&self, step: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MediaFlowError::Cancelled),
            result = step => result,
        }
    }

    /// Create or update only the encoding transform
    pub async fn provision_transform(&self, name: &str) -> Result<ArmResource> {
        ensure_transform(self.media.as_ref(), name, &self.config.encoding).await
    }

    /// Delete whatever an earlier run with `run_id` left behind
    pub async fn cleanup_run(&self, run_id: RunId) -> Result<TeardownReport> {
        let names = RunNames::new(&self.config.naming.prefix, run_id);
        info!("Cleaning up leftovers of run {}", names.run_id);

        let mut report = TeardownReport::default();
        match self.media.list_jobs(&names.transform).await {
            Ok(jobs) => {
                for job in jobs.iter().filter(|j| j.name != names.job) {
                    let result = self.media.delete_job(&names.transform, &job.name).await;
                    report.record(format!("job {}", job.name), result);
                }
            }
            Err(e) if e.is_not_found() => info!("Transform {} no longer exists", names.transform),
            Err(e) => return Err(e),
        }

        let teardown = Teardown::new(self.media.as_ref(), false)
            .run(&RunResources::for_run(&names), Outcome::Failed)
            .await;
        report.deleted.extend(teardown.deleted);
        report.errors.extend(teardown.errors);

        Ok(report)
    }
}
