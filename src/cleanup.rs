use tracing::{info, warn};

use crate::error::{MediaFlowError, Result};
use crate::media::MediaServicesTrait;
use crate::naming::RunNames;

/// Job created under a transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub transform: String,
    pub name: String,
}

/// Remote resources a run has created so far; `None` means never created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResources {
    pub transform: Option<String>,
    pub job: Option<JobHandle>,
    pub input_asset: Option<String>,
    pub output_asset: Option<String>,
}

impl RunResources {
    /// Every resource an earlier run with these names may have left behind
    pub fn for_run(names: &RunNames) -> Self {
        Self {
            transform: Some(names.transform.clone()),
            job: Some(JobHandle {
                transform: names.transform.clone(),
                name: names.job.clone(),
            }),
            input_asset: Some(names.input_asset.clone()),
            output_asset: Some(names.output_asset.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// What a teardown pass managed to delete and what it could not
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub deleted: Vec<String>,
    pub errors: Vec<String>,
}

impl TeardownReport {
    pub(crate) fn record(&mut self, what: String, result: Result<()>) {
        match result {
            Ok(()) => {
                info!("Deleted {}", what);
                self.deleted.push(what);
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", what, e);
                self.errors.push(format!("{}: {}", what, e));
            }
        }
    }

    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(MediaFlowError::Cleanup(self.errors))
        }
    }
}

/// Deletes run resources; every step is attempted regardless of earlier failures
pub struct Teardown<'a> {
    media: &'a dyn MediaServicesTrait,
    keep_transform_on_success: bool,
}

impl<'a> Teardown<'a> {
    pub fn new(media: &'a dyn MediaServicesTrait, keep_transform_on_success: bool) -> Self {
        Self {
            media,
            keep_transform_on_success,
        }
    }

    /// Delete the job, then the transform, then both assets concurrently
    pub async fn run(&self, resources: &RunResources, outcome: Outcome) -> TeardownReport {
        let mut report = TeardownReport::default();
        let keep_encoding = outcome == Outcome::Succeeded && self.keep_transform_on_success;

        if keep_encoding {
            info!("Keeping job and transform of the successful run");
        } else {
            if let Some(job) = &resources.job {
                let result = self.media.delete_job(&job.transform, &job.name).await;
                report.record(format!("job {}", job.name), result);
            }
            if let Some(transform) = &resources.transform {
                let result = self.media.delete_transform(transform).await;
                report.record(format!("transform {}", transform), result);
            }
        }

        let (input, output) = tokio::join!(
            self.delete_asset(resources.input_asset.as_deref()),
            self.delete_asset(resources.output_asset.as_deref()),
        );
        for (name, result) in [input, output].into_iter().flatten() {
            report.record(format!("asset {}", name), result);
        }

        report
    }

    async fn delete_asset(&self, name: Option<&str>) -> Option<(String, Result<()>)> {
        let name = name?;
        let result = self.media.delete_asset(name).await;
        Some((name.to_string(), result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaServicesTrait;
    use mockall::Sequence;
    use tokio_test::{assert_err, assert_ok};

    fn all_resources() -> RunResources {
        RunResources {
            transform: Some("t".to_string()),
            job: Some(JobHandle {
                transform: "t".to_string(),
                name: "j".to_string(),
            }),
            input_asset: Some("in".to_string()),
            output_asset: Some("out".to_string()),
        }
    }

    #[tokio::test]
    async fn test_failure_deletes_everything_in_order() {
        let mut seq = Sequence::new();
        let mut media = MockMediaServicesTrait::new();
        media
            .expect_delete_job()
            .withf(|t, j| t == "t" && j == "j")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        media
            .expect_delete_transform()
            .withf(|t| t == "t")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        media.expect_delete_asset().times(2).returning(|_| Ok(()));

        let report = Teardown::new(&media, false).run(&all_resources(), Outcome::Failed).await;
        assert_eq!(report.deleted.len(), 4);
        assert_ok!(report.into_result());
    }

    #[tokio::test]
    async fn test_absent_handles_are_noops() {
        let media = MockMediaServicesTrait::new();
        let report = Teardown::new(&media, false)
            .run(&RunResources::default(), Outcome::Failed)
            .await;
        assert!(report.deleted.is_empty());
        assert_ok!(report.into_result());
    }

    #[tokio::test]
    async fn test_one_asset_failure_does_not_skip_the_other() {
        let mut media = MockMediaServicesTrait::new();
        media.expect_delete_job().returning(|_, _| Ok(()));
        media.expect_delete_transform().returning(|_| Ok(()));
        media
            .expect_delete_asset()
            .withf(|name| name == "in")
            .times(1)
            .returning(|_| Err(MediaFlowError::Storage("boom".to_string())));
        media
            .expect_delete_asset()
            .withf(|name| name == "out")
            .times(1)
            .returning(|_| Ok(()));

        let report = Teardown::new(&media, false).run(&all_resources(), Outcome::Failed).await;
        assert!(report.deleted.contains(&"asset out".to_string()));
        let err = assert_err!(report.into_result());
        assert!(matches!(err, MediaFlowError::Cleanup(ref errors) if errors.len() == 1));
    }

    #[tokio::test]
    async fn test_all_errors_are_collected() {
        let mut media = MockMediaServicesTrait::new();
        media
            .expect_delete_job()
            .returning(|_, _| Err(MediaFlowError::Storage("job".to_string())));
        media
            .expect_delete_transform()
            .returning(|_| Err(MediaFlowError::Storage("transform".to_string())));
        media
            .expect_delete_asset()
            .times(2)
            .returning(|name| Err(MediaFlowError::Storage(name.to_string())));

        let report = Teardown::new(&media, false).run(&all_resources(), Outcome::Failed).await;
        match report.into_result().unwrap_err() {
            MediaFlowError::Cleanup(errors) => assert_eq!(errors.len(), 4),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_can_keep_transform() {
        let mut media = MockMediaServicesTrait::new();
        media.expect_delete_job().never();
        media.expect_delete_transform().never();
        media.expect_delete_asset().times(2).returning(|_| Ok(()));

        let report = Teardown::new(&media, true).run(&all_resources(), Outcome::Succeeded).await;
        assert_eq!(report.deleted, vec!["asset in".to_string(), "asset out".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_ignores_keep_flag() {
        let mut media = MockMediaServicesTrait::new();
        media.expect_delete_job().times(1).returning(|_, _| Ok(()));
        media.expect_delete_transform().times(1).returning(|_| Ok(()));
        media.expect_delete_asset().times(2).returning(|_| Ok(()));

        Teardown::new(&media, true).run(&all_resources(), Outcome::Failed).await;
    }
}
