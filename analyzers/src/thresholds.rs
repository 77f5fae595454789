use serde::{Deserialize, Serialize};

/// Immutable threshold set handed to every analyzer.
///
/// Every level is `#[serde(default)]`, so a partial config document only
/// overrides the values it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// `lsb_score` at which LSB confidence reaches zero.
    pub lsb: f64,
    /// Normalized pair chi-square value at which confidence reaches zero.
    pub chi_square: f64,
    pub histogram: HistogramThresholds,
    /// Significance level of the DCT coefficient LSB test.
    pub dct_significance: f64,
    pub sample: SampleSettings,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            lsb: 0.3,
            chi_square: 0.1,
            histogram: HistogramThresholds::default(),
            dct_significance: 0.05,
            sample: SampleSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramThresholds {
    /// An odd bin is a comb tooth when below this fraction of its neighbour sum.
    pub comb_ratio: f64,
    /// Teeth per channel needed to score a comb point.
    pub comb_flags: usize,
    /// A bin is a peak when above this multiple of its neighbour mean.
    pub peak_factor: f64,
    /// Peaks per channel needed to score a peak point.
    pub peak_flags: usize,
    /// |even - odd| / total above which a channel scores a parity point.
    pub parity_ratio: f64,
    /// Points that map to confidence 1.0.
    pub max_points: usize,
}

impl Default for HistogramThresholds {
    fn default() -> Self {
        Self {
            comb_ratio: 0.25,
            comb_flags: 10,
            peak_factor: 3.0,
            peak_flags: 5,
            parity_ratio: 0.1,
            max_points: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleSettings {
    /// Bytes of extracted data kept in the report.
    pub max_sample_bytes: usize,
    /// Leading bytes that must all be printable for a `text` classification.
    pub text_probe_bytes: usize,
    /// Longest decimal length prefix accepted by the header stage.
    pub max_header_digits: usize,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            max_sample_bytes: 100,
            text_probe_bytes: 20,
            max_header_digits: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let thresholds: Thresholds =
            serde_json::from_str(r#"{"lsb": 0.2, "histogram": {"peak_flags": 8}}"#).unwrap();

        assert_eq!(thresholds.lsb, 0.2);
        assert_eq!(thresholds.chi_square, 0.1);
        assert_eq!(thresholds.histogram.peak_flags, 8);
        assert_eq!(thresholds.histogram.comb_flags, 10);
        assert_eq!(thresholds.sample, SampleSettings::default());
    }
}
