use serde::Serialize;
use thiserror::Error;

use crate::stats::chi_square_p_value_1dof;
use crate::{Analyzer, MethodVerdict};
use parsers::jpeg_parser::DctBlockSet;

/// JSteg-style test on quantized JPEG coefficients.
///
/// Takes the magnitude LSB of every non-zero AC coefficient and runs a
/// two-category goodness-of-fit test against an even split of zeros and ones.
pub struct DctAnalyzer {
    significance: f64,
}

#[derive(Debug, Error)]
pub enum DctAnalyzerError {
    #[error("not applicable: no non-zero AC coefficients")]
    NoCoefficients,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DctAnalysis {
    pub detected: bool,
    /// `1 - p_value`.
    pub confidence: f64,
    pub chi_square: f64,
    pub p_value: f64,
    pub coefficient_count: usize,
    pub ones_ratio: f64,
    pub details: String,
}

impl DctAnalyzer {
    pub fn new(significance: f64) -> Self {
        Self { significance }
    }
}

impl Analyzer for DctAnalyzer {
    type Input = DctBlockSet;
    type Output = DctAnalysis;
    type Error = DctAnalyzerError;

    fn analyze(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        for component in input.components() {
            log::debug!(
                "dct: component {} spans {}x{} blocks",
                component.id,
                component.blocks_wide(),
                component.blocks_tall()
            );
        }
        let coefficients = input
            .components()
            .iter()
            .flat_map(|component| component.ac_coefficients());
        let (count, ones) = count_lsb_ones(coefficients);
        if count == 0 {
            return Err(DctAnalyzerError::NoCoefficients);
        }

        let chi_square = parity_chi_square(count, ones);
        let p_value = chi_square_p_value_1dof(chi_square);
        let detected = p_value < self.significance;
        let ones_ratio = ones as f64 / count as f64;
        log::debug!(
            "dct: {count} coefficient(s), ones_ratio={ones_ratio:.4} chi2={chi_square:.3} p={p_value:.4}"
        );

        Ok(DctAnalysis {
            detected,
            confidence: 1.0 - p_value,
            chi_square,
            p_value,
            coefficient_count: count,
            ones_ratio,
            details: if detected {
                "DCT coefficient LSBs deviate from an even split".to_string()
            } else {
                "DCT coefficient LSBs are consistent with an even split".to_string()
            },
        })
    }
}

impl From<DctAnalysis> for MethodVerdict {
    fn from(analysis: DctAnalysis) -> Self {
        MethodVerdict::Dct(analysis)
    }
}

impl From<DctAnalyzerError> for MethodVerdict {
    fn from(error: DctAnalyzerError) -> Self {
        MethodVerdict::not_applicable(error)
    }
}

/// Number of non-zero coefficients and how many have an odd magnitude.
fn count_lsb_ones(coefficients: impl IntoIterator<Item = i16>) -> (usize, usize) {
    coefficients
        .into_iter()
        .filter(|&c| c != 0)
        .fold((0, 0), |(count, ones), c| {
            (count + 1, ones + (c.unsigned_abs() & 1) as usize)
        })
}

fn parity_chi_square(count: usize, ones: usize) -> f64 {
    let expected = count as f64 / 2.0;
    let zeros = (count - ones) as f64;
    let ones = ones as f64;
    (zeros - expected).powi(2) / expected + (ones - expected).powi(2) / expected
}
