pub mod analysis;
pub mod config;
pub mod error;
pub mod report;

pub use analysis::{analyze, analyze_with};
pub use config::{DetectorConfig, SampleVote, VotingPolicy};
pub use error::DetectorError;
pub use report::AnalysisReport;
