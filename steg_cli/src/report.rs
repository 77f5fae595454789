use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use analyzers::{Method, MethodVerdict};
use serde::Serialize;

use crate::config::VotingPolicy;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct AnalysisReport {
    pub filename: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub dimensions: ImageDimensions,
    pub detection_methods: BTreeMap<Method, MethodVerdict>,
    pub positive_detections: usize,
    pub steganography_detected: bool,
    pub conclusion: String,
    pub analyzed_at: String,
}

impl AnalysisReport {
    pub fn new(
        file_path: &Path,
        file_size: u64,
        mime_type: Option<String>,
        dimensions: ImageDimensions,
    ) -> Self {
        let filename = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string_lossy().to_string());

        Self {
            filename,
            file_size,
            mime_type,
            dimensions,
            detection_methods: BTreeMap::new(),
            positive_detections: 0,
            steganography_detected: false,
            conclusion: conclusion_for(0).to_string(),
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn record(&mut self, method: Method, verdict: impl Into<MethodVerdict>) {
        self.detection_methods.insert(method, verdict.into());
    }

    /// Count the votes `policy` accepts and derive the overall conclusion.
    pub fn finalize(&mut self, policy: &VotingPolicy) {
        self.positive_detections = self
            .detection_methods
            .iter()
            .filter(|(method, verdict)| policy.counts(**method, verdict))
            .count();
        self.steganography_detected = self.positive_detections >= 1;
        self.conclusion = conclusion_for(self.positive_detections).to_string();
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, output_path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = fs::File::create(output_path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub fn conclusion_for(positive_detections: usize) -> &'static str {
    match positive_detections {
        0 => "No hidden data detected",
        1 => "Possible hidden data detected",
        _ => "High probability of hidden data",
    }
}
