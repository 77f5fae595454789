use serde::Serialize;
use thiserror::Error;

use crate::{Analyzer, DETECTION_CONFIDENCE, MethodVerdict};
use parsers::image_parser::ImageSample;

/// Bit-plane randomness of the R, G and B least significant bits.
///
/// Overwriting LSBs with message bits flattens the plane structure a natural
/// image shows, so a *low* combined score is the embedding signature.
pub struct LsbAnalyzer {
    threshold: f64,
}

#[derive(Debug, Error)]
pub enum LsbAnalyzerError {
    #[error("Grayscale image, insufficient channels for LSB analysis")]
    InsufficientChannels(usize),

    #[error("Image has no pixels")]
    EmptyImage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LsbAnalysis {
    pub detected: bool,
    pub confidence: f64,
    /// Mean over channels of transitions / maximum possible transitions.
    pub randomness_score: f64,
    /// Mean over channels of |fraction of ones - 0.5|.
    pub bit_distribution_score: f64,
    pub lsb_score: f64,
    pub details: String,
}

impl LsbAnalyzer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Analyzer for LsbAnalyzer {
    type Input = ImageSample;
    type Output = LsbAnalysis;
    type Error = LsbAnalyzerError;

    fn analyze(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        if !input.is_color() {
            return Err(LsbAnalyzerError::InsufficientChannels(input.channels()));
        }
        if input.pixel_count() == 0 {
            return Err(LsbAnalyzerError::EmptyImage);
        }

        let (width, height) = (input.width() as usize, input.height() as usize);
        let mut randomness_scores = Vec::with_capacity(3);
        let mut distribution_scores = Vec::with_capacity(3);

        for plane in input.planes().iter().take(3) {
            let lsb_plane = extract_lsb_plane(plane);
            randomness_scores.push(calculate_randomness(&lsb_plane, width, height));
            distribution_scores.push(calculate_bit_distribution(&lsb_plane));
        }

        let randomness_score = mean(&randomness_scores);
        let bit_distribution_score = mean(&distribution_scores);
        let lsb_score = (randomness_score + bit_distribution_score) / 2.0;

        let confidence = if self.threshold > 0.0 {
            (1.0 - lsb_score / self.threshold).max(0.0)
        } else {
            0.0
        };
        let detected = confidence > DETECTION_CONFIDENCE;
        log::debug!(
            "lsb: randomness={randomness_score:.4} distribution={bit_distribution_score:.4} confidence={confidence:.3}"
        );

        Ok(LsbAnalysis {
            detected,
            confidence,
            randomness_score,
            bit_distribution_score,
            lsb_score,
            details: if detected {
                "LSB patterns show signs of non-random data".to_string()
            } else {
                "LSB patterns appear random".to_string()
            },
        })
    }
}

impl From<LsbAnalysis> for MethodVerdict {
    fn from(analysis: LsbAnalysis) -> Self {
        MethodVerdict::Lsb(analysis)
    }
}

impl From<LsbAnalyzerError> for MethodVerdict {
    fn from(error: LsbAnalyzerError) -> Self {
        match error {
            LsbAnalyzerError::InsufficientChannels(_) => MethodVerdict::not_applicable(error),
            LsbAnalyzerError::EmptyImage => MethodVerdict::failed(error),
        }
    }
}

fn extract_lsb_plane(plane: &[u8]) -> Vec<u8> {
    plane.iter().map(|value| value & 1).collect()
}

/// Horizontal plus vertical 0<->1 changes over the maximum possible count.
fn calculate_randomness(lsb_plane: &[u8], width: usize, height: usize) -> f64 {
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut transitions = 0usize;
    for (y, row) in lsb_plane.chunks_exact(width).enumerate().take(height) {
        transitions += row.windows(2).filter(|pair| pair[0] != pair[1]).count();
        if let Some(next) = lsb_plane.get((y + 1) * width..(y + 2) * width) {
            transitions += row.iter().zip(next).filter(|(a, b)| a != b).count();
        }
    }

    let max_transitions = width * (height - 1) + height * (width - 1);
    if max_transitions == 0 {
        0.0
    } else {
        transitions as f64 / max_transitions as f64
    }
}

fn calculate_bit_distribution(lsb_plane: &[u8]) -> f64 {
    if lsb_plane.is_empty() {
        return 0.0;
    }
    let ones = lsb_plane.iter().filter(|&&bit| bit == 1).count();
    (ones as f64 / lsb_plane.len() as f64 - 0.5).abs()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
