use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chi_square_analyzer::ChiSquareAnalysis;
use crate::dct_analyzer::DctAnalysis;
use crate::histogram_analyzer::HistogramAnalysis;
use crate::lsb_analyzer::LsbAnalysis;
use crate::sample_extractor::SampleExtraction;

/// Key under which each method's verdict is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    LsbAnalysis,
    ChiSquare,
    SampleExtraction,
    HistogramAnalysis,
    DctAnalysis,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::LsbAnalysis,
        Method::ChiSquare,
        Method::SampleExtraction,
        Method::HistogramAnalysis,
        Method::DctAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::LsbAnalysis => "lsb_analysis",
            Method::ChiSquare => "chi_square",
            Method::SampleExtraction => "sample_extraction",
            Method::HistogramAnalysis => "histogram_analysis",
            Method::DctAnalysis => "dct_analysis",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one detection method.
///
/// Serialized untagged: a successful analysis shows its own fields, while an
/// inapplicable or failed method collapses to `detected: false` plus a
/// `reason` or `error` string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MethodVerdict {
    Lsb(LsbAnalysis),
    ChiSquare(ChiSquareAnalysis),
    Sample(SampleExtraction),
    Histogram(HistogramAnalysis),
    Dct(DctAnalysis),
    NotApplicable { detected: bool, reason: String },
    Failed { detected: bool, error: String },
}

impl MethodVerdict {
    /// The method does not apply to this input (grayscale, not a JPEG, ...).
    pub fn not_applicable(reason: impl fmt::Display) -> Self {
        MethodVerdict::NotApplicable {
            detected: false,
            reason: reason.to_string(),
        }
    }

    /// The method hit an internal fault; other methods are unaffected.
    pub fn failed(error: impl fmt::Display) -> Self {
        MethodVerdict::Failed {
            detected: false,
            error: error.to_string(),
        }
    }

    pub fn detected(&self) -> bool {
        match self {
            MethodVerdict::Lsb(a) => a.detected,
            MethodVerdict::ChiSquare(a) => a.detected,
            MethodVerdict::Sample(a) => a.detected,
            MethodVerdict::Histogram(a) => a.detected,
            MethodVerdict::Dct(a) => a.detected,
            MethodVerdict::NotApplicable { detected, .. } => *detected,
            MethodVerdict::Failed { detected, .. } => *detected,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            MethodVerdict::Lsb(a) => Some(a.confidence),
            MethodVerdict::ChiSquare(a) => Some(a.confidence),
            MethodVerdict::Sample(a) => Some(a.confidence),
            MethodVerdict::Histogram(a) => Some(a.confidence),
            MethodVerdict::Dct(a) => Some(a.confidence),
            MethodVerdict::NotApplicable { .. } | MethodVerdict::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            MethodVerdict::NotApplicable { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MethodVerdict::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}
