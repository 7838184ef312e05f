use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PollConfig;
use crate::error::{MediaFlowError, Result};
use super::models::{Job, JobOutputAsset, JobState};
use super::MediaServicesTrait;

/// Create the job reading `input_asset` and writing `output_asset`
pub async fn submit_job(
    media: &dyn MediaServicesTrait,
    transform: &str,
    name: &str,
    input_asset: &str,
    output_asset: &str,
) -> Result<Job> {
    info!("Submitting job {} under transform {}", name, transform);
    let job = media
        .create_job(transform, name, &Job::for_assets(input_asset, output_asset))
        .await?;
    info!("Job {} submitted in state {}", name, job.state());
    Ok(job)
}

/// Progress proxy of a single output: terminal outputs count as done
pub fn output_progress(output: &JobOutputAsset) -> Result<i32> {
    let state = output.state.clone().unwrap_or(JobState::Queued);
    match state {
        JobState::Processing => Ok(output.progress.unwrap_or(0)),
        JobState::Finished | JobState::Canceled | JobState::Error => Ok(100),
        JobState::Queued | JobState::Scheduled | JobState::Canceling => Ok(0),
        JobState::Other(value) => Err(MediaFlowError::UnknownJobState(value)),
    }
}

/// Minimum progress over all outputs; a job without outputs has made none
pub fn overall_progress(job: &Job) -> Result<i32> {
    let mut lowest: Option<i32> = None;
    for output in &job.properties.outputs {
        let progress = output_progress(output)?;
        lowest = Some(lowest.map_or(progress, |l| l.min(progress)));
    }
    Ok(lowest.unwrap_or(0))
}

/// Whether every output has reached Finished, Canceled or Error
pub fn all_outputs_terminal(job: &Job) -> bool {
    !job.properties.outputs.is_empty()
        && job
            .properties
            .outputs
            .iter()
            .all(|o| o.state.as_ref().is_some_and(JobState::is_terminal))
}

/// Bounds on how long a job is polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_duration: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_duration: config.max_duration_secs.map(Duration::from_secs),
            max_attempts: config.max_attempts,
        }
    }
}

impl PollPolicy {
    pub fn is_unbounded(&self) -> bool {
        self.max_duration.is_none() && self.max_attempts.is_none()
    }
}

/// Re-fetches a job until every output is terminal
pub struct JobPoller {
    policy: PollPolicy,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl JobPoller {
    pub fn new(policy: PollPolicy, cancel: CancellationToken) -> Self {
        Self {
            policy,
            cancel,
            progress: ProgressBar::hidden(),
        }
    }

    /// Render progress on the terminal while polling
    pub fn with_progress_bar(mut self) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        self.progress = ProgressBar::new(100);
        self.progress.set_style(style);
        self
    }

    /// Poll `job` under `transform` and return its final representation
    ///
    /// Completion does not imply success: callers check the returned state.
    pub async fn wait_for_completion(
        &self,
        media: &dyn MediaServicesTrait,
        transform: &str,
        job: &str,
    ) -> Result<Job> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                self.progress.abandon_with_message("cancelled");
                return Err(MediaFlowError::Cancelled);
            }

            let current = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.progress.abandon_with_message("cancelled");
                    return Err(MediaFlowError::Cancelled);
                }
                current = media.get_job(transform, job) => current?,
            };
            attempts += 1;

            let progress = match overall_progress(&current) {
                Ok(progress) => progress,
                Err(e) => {
                    self.progress.abandon_with_message("unknown state");
                    return Err(e);
                }
            };
            self.progress.set_position(progress.clamp(0, 100) as u64);
            self.progress.set_message(current.state().to_string());
            debug!("Job {} is {} at {}% (attempt {})", job, current.state(), progress, attempts);

            if all_outputs_terminal(&current) {
                self.progress.finish_with_message(current.state().to_string());
                info!("Job {} reached {}", job, current.state());
                return Ok(current);
            }

            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    self.progress.abandon_with_message("gave up");
                    return Err(MediaFlowError::PollTimeout(format!("{} attempts", attempts)));
                }
            }
            if let Some(max) = self.policy.max_duration {
                if started.elapsed() >= max {
                    self.progress.abandon_with_message("gave up");
                    return Err(MediaFlowError::PollTimeout(format!("{:?}", started.elapsed())));
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.progress.abandon_with_message("cancelled");
                    return Err(MediaFlowError::Cancelled);
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }
}
