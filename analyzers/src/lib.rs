pub mod chi_square_analyzer;
pub mod dct_analyzer;
pub mod histogram_analyzer;
pub mod lsb_analyzer;
pub mod sample_extractor;
pub mod thresholds;
pub mod verdict;

mod stats;

pub use thresholds::Thresholds;
pub use verdict::{Method, MethodVerdict};

/// Confidence a verdict must exceed to count as `detected`, for every
/// analyzer whose statistic is mapped onto [0, 1] first.
pub const DETECTION_CONFIDENCE: f64 = 0.5;

pub trait Analyzer {
    type Output;
    type Input: ?Sized;
    type Error;

    fn analyze(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}
