use std::fs;
use std::path::Path;

use analyzers::sample_extractor::{DataType, ExtractionStrategy};
use analyzers::{Method, MethodVerdict, Thresholds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything a detector run can be tuned with. Missing keys fall back to
/// the defaults, so `{}` is a valid config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub thresholds: Thresholds,
    pub voting: VotingPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DetectorConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Decides which positive verdicts count as votes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingPolicy {
    pub sample_vote: SampleVote,
}

/// How a positive sample extraction is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleVote {
    /// Any extraction with at least one byte votes.
    Always,
    /// A length-prefixed payload, or a raw walk that reads as printable text.
    #[default]
    Text,
    /// Only a recovered length-prefixed payload votes.
    LengthHeader,
    Never,
}

impl VotingPolicy {
    pub fn counts(&self, method: Method, verdict: &MethodVerdict) -> bool {
        if !verdict.detected() {
            return false;
        }
        match method {
            Method::SampleExtraction => match self.sample_vote {
                SampleVote::Always => true,
                SampleVote::Never => false,
                SampleVote::Text => matches!(
                    verdict,
                    MethodVerdict::Sample(extraction)
                        if extraction.strategy == ExtractionStrategy::LengthHeader
                            || extraction.data_type == DataType::Text
                ),
                SampleVote::LengthHeader => matches!(
                    verdict,
                    MethodVerdict::Sample(extraction)
                        if extraction.strategy == ExtractionStrategy::LengthHeader
                ),
            },
            _ => true,
        }
    }
}
