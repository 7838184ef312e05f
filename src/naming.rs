use std::fmt;
use uuid::Uuid;

use crate::error::{MediaFlowError, Result};

/// Short random token minted once per run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..8].to_string())
    }

    /// Accept an identifier printed by an earlier run
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MediaFlowError::Config(format!("Invalid run id '{}'", value)));
        }
        Ok(Self(value.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource names derived from a run identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunNames {
    pub run_id: RunId,
    pub transform: String,
    pub job: String,
    pub input_asset: String,
    pub output_asset: String,
}

impl RunNames {
    pub fn new(prefix: &str, run_id: RunId) -> Self {
        Self {
            transform: format!("{}-transform-{}", prefix, run_id),
            job: format!("{}-job-{}", prefix, run_id),
            input_asset: format!("{}-input-{}", prefix, run_id),
            output_asset: format!("{}-output-{}", prefix, run_id),
            run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_run_id_shape() {
        let id = RunId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_names_from_run_id() {
        let names = RunNames::new("mediaflow", RunId::parse("ab12cd34").unwrap());
        assert_eq!(names.transform, "mediaflow-transform-ab12cd34");
        assert_eq!(names.job, "mediaflow-job-ab12cd34");
        assert_eq!(names.input_asset, "mediaflow-input-ab12cd34");
        assert_eq!(names.output_asset, "mediaflow-output-ab12cd34");
    }

    #[test]
    fn test_distinct_runs_never_share_names() {
        let a = RunNames::new("mediaflow", RunId::parse("aaaa0001").unwrap());
        let b = RunNames::new("mediaflow", RunId::parse("aaaa0002").unwrap());

        let all: HashSet<&String> = [
            &a.transform, &a.job, &a.input_asset, &a.output_asset,
            &b.transform, &b.job, &b.input_asset, &b.output_asset,
        ]
        .into_iter()
        .collect();
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RunId::parse("").is_err());
        assert!(RunId::parse("ab-12").is_err());
        assert_eq!(RunId::parse(" AB12 ").unwrap().as_str(), "ab12");
    }
}
