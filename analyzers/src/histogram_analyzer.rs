use serde::Serialize;
use thiserror::Error;

use crate::thresholds::HistogramThresholds;
use crate::{Analyzer, DETECTION_CONFIDENCE, MethodVerdict};
use parsers::image_parser::ImageSample;

/// Looks for comb teeth, isolated peaks and even/odd imbalance in the
/// per-channel intensity histograms.
pub struct HistogramAnalyzer {
    thresholds: HistogramThresholds,
}

#[derive(Debug, Error)]
pub enum HistogramAnalyzerError {
    #[error("Image has no pixels")]
    EmptyImage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramAnalysis {
    pub detected: bool,
    pub confidence: f64,
    pub suspicious_patterns: usize,
    pub findings: Vec<String>,
    pub details: String,
}

impl HistogramAnalyzer {
    pub fn new(thresholds: HistogramThresholds) -> Self {
        Self { thresholds }
    }

    fn channel_findings(&self, name: &str, histogram: &[u64; 256]) -> Vec<String> {
        let mut findings = Vec::new();

        let comb_flags = (1..255)
            .step_by(2)
            .filter(|&j| {
                let (left, right) = (histogram[j - 1], histogram[j + 1]);
                left > 0
                    && right > 0
                    && (histogram[j] as f64) < (left + right) as f64 * self.thresholds.comb_ratio
            })
            .count();
        if comb_flags > self.thresholds.comb_flags {
            findings.push(format!("{name} channel shows comb pattern in histogram"));
        }

        let peak_flags = (1..255)
            .filter(|&j| {
                let neighbour_mean = (histogram[j - 1] + histogram[j + 1]) as f64 / 2.0;
                histogram[j] as f64 > self.thresholds.peak_factor * neighbour_mean
            })
            .count();
        if peak_flags > self.thresholds.peak_flags {
            findings.push(format!("{name} channel has unusual peaks in histogram"));
        }

        let even: u64 = histogram.iter().step_by(2).sum();
        let odd: u64 = histogram.iter().skip(1).step_by(2).sum();
        let total = even + odd;
        let parity = if total > 0 {
            even.abs_diff(odd) as f64 / total as f64
        } else {
            0.0
        };
        if parity > self.thresholds.parity_ratio {
            findings.push(format!("{name} channel has abnormal even/odd value distribution"));
        }

        log::debug!("histogram {name}: comb={comb_flags} peaks={peak_flags} parity={parity:.3}");
        findings
    }
}

impl Analyzer for HistogramAnalyzer {
    type Input = ImageSample;
    type Output = HistogramAnalysis;
    type Error = HistogramAnalyzerError;

    fn analyze(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        if input.pixel_count() == 0 {
            return Err(HistogramAnalyzerError::EmptyImage);
        }

        let names: &[&str] = if input.is_color() {
            &["Red", "Green", "Blue"]
        } else {
            &["Gray"]
        };

        let findings: Vec<String> = names
            .iter()
            .zip(input.planes())
            .flat_map(|(name, plane)| self.channel_findings(name, &histogram(plane)))
            .collect();

        let suspicious_patterns = findings.len();
        let confidence = if self.thresholds.max_points == 0 {
            0.0
        } else {
            (suspicious_patterns as f64 / self.thresholds.max_points as f64).min(1.0)
        };
        let detected = confidence > DETECTION_CONFIDENCE;

        let details = if findings.is_empty() {
            "No suspicious histogram patterns detected".to_string()
        } else {
            findings.join("; ")
        };

        Ok(HistogramAnalysis {
            detected,
            confidence,
            suspicious_patterns,
            findings,
            details,
        })
    }
}

impl From<HistogramAnalysis> for MethodVerdict {
    fn from(analysis: HistogramAnalysis) -> Self {
        MethodVerdict::Histogram(analysis)
    }
}

impl From<HistogramAnalyzerError> for MethodVerdict {
    fn from(error: HistogramAnalyzerError) -> Self {
        MethodVerdict::failed(error)
    }
}

fn histogram(plane: &[u8]) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for &value in plane {
        bins[value as usize] += 1;
    }
    bins
}
