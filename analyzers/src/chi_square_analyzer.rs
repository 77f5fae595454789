use serde::Serialize;
use thiserror::Error;

use crate::{Analyzer, DETECTION_CONFIDENCE, MethodVerdict};
use parsers::image_parser::ImageSample;

/// Pairs-of-values chi-square test on the Y, Cr and Cb histograms.
///
/// LSB replacement equalizes the counts of `2k` and `2k + 1`, pulling the
/// statistic towards zero.
pub struct ChiSquareAnalyzer {
    threshold: f64,
}

#[derive(Debug, Error)]
pub enum ChiSquareAnalyzerError {
    #[error("Image has no pixels")]
    EmptyImage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChiSquareAnalysis {
    pub detected: bool,
    pub confidence: f64,
    pub chi_square_value: f64,
    /// Normalized statistic per analysed channel (Y, Cr, Cb or the gray plane).
    pub channel_values: Vec<f64>,
    pub details: String,
}

impl ChiSquareAnalyzer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Analyzer for ChiSquareAnalyzer {
    type Input = ImageSample;
    type Output = ChiSquareAnalysis;
    type Error = ChiSquareAnalyzerError;

    fn analyze(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        if input.pixel_count() == 0 {
            return Err(ChiSquareAnalyzerError::EmptyImage);
        }

        let channel_values: Vec<f64> = if input.is_color() {
            to_ycrcb(input).iter().map(|plane| pair_chi_square(plane)).collect()
        } else {
            input.planes().iter().map(|plane| pair_chi_square(plane)).collect()
        };
        let chi_square_value = channel_values.iter().sum::<f64>() / channel_values.len() as f64;

        let confidence = if chi_square_value < self.threshold {
            1.0 - chi_square_value / self.threshold
        } else {
            0.0
        };
        let detected = confidence > DETECTION_CONFIDENCE;
        log::debug!("chi-square: value={chi_square_value:.4} confidence={confidence:.3}");

        Ok(ChiSquareAnalysis {
            detected,
            confidence,
            chi_square_value,
            channel_values,
            details: if detected {
                "Chi-square test indicates potential hidden data".to_string()
            } else {
                "Chi-square test shows normal distribution".to_string()
            },
        })
    }
}

impl From<ChiSquareAnalysis> for MethodVerdict {
    fn from(analysis: ChiSquareAnalysis) -> Self {
        MethodVerdict::ChiSquare(analysis)
    }
}

impl From<ChiSquareAnalyzerError> for MethodVerdict {
    fn from(error: ChiSquareAnalyzerError) -> Self {
        MethodVerdict::failed(error)
    }
}

/// Full-range BT.601 conversion, planes returned as [Y, Cr, Cb].
fn to_ycrcb(sample: &ImageSample) -> [Vec<u8>; 3] {
    let [r, g, b] = [0, 1, 2].map(|channel| sample.plane(channel).unwrap_or_default());
    let count = sample.pixel_count();
    let mut out = [
        Vec::with_capacity(count),
        Vec::with_capacity(count),
        Vec::with_capacity(count),
    ];

    for ((&r, &g), &b) in r.iter().zip(g).zip(b) {
        let (r, g, b) = (r as f64, g as f64, b as f64);
        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        let cr = (r - y) * 0.713 + 128.0;
        let cb = (b - y) * 0.564 + 128.0;
        out[0].push(to_u8(y));
        out[1].push(to_u8(cr));
        out[2].push(to_u8(cb));
    }
    out
}

fn to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Pearson statistic of every (2k, 2k+1) bin pair against their mean,
/// normalized by the 256 bins involved.
fn pair_chi_square(plane: &[u8]) -> f64 {
    let mut histogram = [0u64; 256];
    for &value in plane {
        histogram[value as usize] += 1;
    }

    let mut chi_square = 0.0;
    for pair in histogram.chunks_exact(2) {
        let (even, odd) = (pair[0] as f64, pair[1] as f64);
        let expected = (even + odd) / 2.0;
        if expected > 0.0 {
            chi_square += (even - expected).powi(2) / expected;
            chi_square += (odd - expected).powi(2) / expected;
        }
    }

    chi_square / 256.0
}
