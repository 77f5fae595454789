use std::fs;
use std::path::Path;

use analyzers::{
    Analyzer, Method, MethodVerdict, chi_square_analyzer::ChiSquareAnalyzer,
    dct_analyzer::DctAnalyzer, histogram_analyzer::HistogramAnalyzer, lsb_analyzer::LsbAnalyzer,
    sample_extractor::SampleExtractor,
};
use image::ImageFormat;
use infer::Infer;
use parsers::{
    Parser as _, image_parser::ImageParser, image_parser::ImageSample, is_jpeg_path,
    jpeg_parser::DctParser,
};

use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::report::{AnalysisReport, ImageDimensions};

/// Run every detection method on `image_path` with the default config.
pub fn analyze<P: AsRef<Path>>(image_path: P) -> Result<AnalysisReport, DetectorError> {
    analyze_with(image_path, &DetectorConfig::default())
}

/// Run every detection method on `image_path`.
///
/// Only a file that cannot be decoded as an image is an error. Methods that
/// do not apply, or that fail, are reported as such and cast no vote.
pub fn analyze_with<P: AsRef<Path>>(
    image_path: P,
    config: &DetectorConfig,
) -> Result<AnalysisReport, DetectorError> {
    let path = image_path.as_ref();
    let sample = ImageParser::parse_path(&path)?;
    let file_size = fs::metadata(path)?.len();
    let mime_type = Infer::new()
        .get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.mime_type().to_string());

    let dimensions = ImageDimensions {
        width: sample.width(),
        height: sample.height(),
        channels: sample.channels(),
    };
    let mut report = AnalysisReport::new(path, file_size, mime_type, dimensions);
    let thresholds = &config.thresholds;

    report.record(
        Method::LsbAnalysis,
        run(&LsbAnalyzer::new(thresholds.lsb), &sample),
    );
    report.record(
        Method::ChiSquare,
        run(&ChiSquareAnalyzer::new(thresholds.chi_square), &sample),
    );
    report.record(
        Method::SampleExtraction,
        run(&SampleExtractor::new(thresholds.sample.clone()), &sample),
    );
    report.record(
        Method::HistogramAnalysis,
        run(&HistogramAnalyzer::new(thresholds.histogram.clone()), &sample),
    );
    report.record(
        Method::DctAnalysis,
        dct_verdict(path, &sample, thresholds.dct_significance),
    );

    report.finalize(&config.voting);
    for (method, verdict) in &report.detection_methods {
        match verdict.confidence() {
            Some(confidence) => log::debug!(
                "{method}: detected={} confidence={confidence:.3}",
                verdict.detected()
            ),
            None => log::debug!("{method}: skipped"),
        }
    }
    log::info!(
        "{}: {} ({} positive)",
        report.filename,
        report.conclusion,
        report.positive_detections
    );
    Ok(report)
}

fn run<A>(analyzer: &A, input: &A::Input) -> MethodVerdict
where
    A: Analyzer,
    A::Output: Into<MethodVerdict>,
    A::Error: Into<MethodVerdict>,
{
    match analyzer.analyze(input) {
        Ok(output) => output.into(),
        Err(error) => {
            let verdict: MethodVerdict = error.into();
            if let Some(message) = verdict.error() {
                log::warn!("analyzer failed: {message}");
            }
            verdict
        }
    }
}

fn dct_verdict(path: &Path, sample: &ImageSample, significance: f64) -> MethodVerdict {
    if !is_jpeg_path(&path) && sample.format() != Some(ImageFormat::Jpeg) {
        return MethodVerdict::not_applicable("not applicable: not a JPEG image");
    }

    match DctParser::parse_path(&path) {
        Ok(blocks) => run(&DctAnalyzer::new(significance), &blocks),
        Err(e) => {
            log::warn!("skipping DCT analysis of {path:?}: {e}");
            MethodVerdict::not_applicable(format!("not applicable: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SampleVote, VotingPolicy};
    use analyzers::sample_extractor::{DataType, ExtractionStrategy};
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn blank() -> RgbImage {
        ImageBuffer::from_fn(300, 300, |_, _| Rgb([255, 255, 255]))
    }

    /// Canonical order: row-major pixels, R, G, B, message bits MSB-first.
    fn embed(img: &mut RgbImage, message: &[u8]) {
        let width = img.width();
        let bits = message
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1));
        for (i, bit) in bits.enumerate() {
            let (pixel, channel) = (i as u32 / 3, i % 3);
            let px = img.get_pixel_mut(pixel % width, pixel / width);
            px[channel] = (px[channel] & 0xFE) | bit;
        }
    }

    fn two_tone() -> RgbImage {
        ImageBuffer::from_fn(300, 300, |_, y| {
            if y < 150 {
                Rgb([126, 90, 102])
            } else {
                Rgb([125, 91, 105])
            }
        })
    }

    fn save(dir: &TempDir, name: &str, img: &RgbImage) -> PathBuf {
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_clean_image_is_not_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let report = analyze(save(&dir, "clean.png", &blank())).unwrap();

        assert!(!report.steganography_detected);
        assert_eq!(report.positive_detections, 0);
        assert_eq!(report.conclusion, "No hidden data detected");
        assert_eq!(report.filename, "clean.png");
        assert_eq!(report.mime_type.as_deref(), Some("image/png"));
    }

    const MESSAGE: &str = "This is a hidden message for testing steganography detection";

    #[test]
    fn test_embedded_message_is_flagged() {
        assert_eq!(MESSAGE.len(), 60);
        let mut img = blank();
        embed(&mut img, MESSAGE.as_bytes());

        let dir = tempfile::tempdir().unwrap();
        let report = analyze(save(&dir, "steg.png", &img)).unwrap();

        assert!(report.steganography_detected);
        assert_eq!(report.positive_detections, 1);
        assert_eq!(report.conclusion, "Possible hidden data detected");
        let MethodVerdict::Sample(extraction) = &report.detection_methods[&Method::SampleExtraction]
        else {
            panic!("sample extraction did not run");
        };
        assert_eq!(extraction.strategy, ExtractionStrategy::RawWalk);
        assert_eq!(extraction.data_type, DataType::Text);
        assert!(extraction.sample.starts_with(MESSAGE));
    }

    #[test]
    fn test_length_prefixed_message_is_flagged() {
        let message = MESSAGE;
        let mut img = blank();
        embed(&mut img, format!("{}:{message}", message.len()).as_bytes());

        let dir = tempfile::tempdir().unwrap();
        let report = analyze(save(&dir, "steg.png", &img)).unwrap();

        assert!(report.steganography_detected);
        assert_eq!(report.conclusion, "Possible hidden data detected");
        let MethodVerdict::Sample(extraction) = &report.detection_methods[&Method::SampleExtraction]
        else {
            panic!("sample extraction did not run");
        };
        assert_eq!(extraction.sample, message);
    }

    #[test]
    fn test_equalized_image_is_high_probability() {
        let dir = tempfile::tempdir().unwrap();
        let report = analyze(save(&dir, "equalized.png", &two_tone())).unwrap();

        assert!(report.detection_methods[&Method::LsbAnalysis].detected());
        assert!(report.detection_methods[&Method::ChiSquare].detected());
        assert_eq!(report.positive_detections, 2);
        assert_eq!(report.conclusion, "High probability of hidden data");
    }

    #[test]
    fn test_report_has_every_method() {
        let dir = tempfile::tempdir().unwrap();
        let report = analyze(save(&dir, "clean.png", &blank())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        let methods = value["detection_methods"].as_object().unwrap();
        assert_eq!(methods.len(), 5);
        for method in Method::ALL {
            assert!(methods.contains_key(method.as_str()));
        }
        assert_eq!(methods["dct_analysis"]["detected"], false);
        assert_eq!(
            methods["dct_analysis"]["reason"],
            "not applicable: not a JPEG image"
        );
    }

    #[test]
    fn test_jpeg_runs_dct_analysis() {
        let img = ImageBuffer::from_fn(64, 64, |x, y| {
            Rgb([
                ((x * 37 + y * 11) % 256) as u8,
                ((x * y) % 256) as u8,
                ((x ^ y) * 4 % 256) as u8,
            ])
        });
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "photo.jpg", &img);

        let report = analyze(&path).unwrap();
        let MethodVerdict::Dct(dct) = &report.detection_methods[&Method::DctAnalysis] else {
            panic!("expected a DCT analysis");
        };
        assert!(dct.coefficient_count > 0);

        // Same bytes without the extension: the content sniff still finds JPEG.
        let renamed = dir.path().join("upload.bin");
        fs::copy(&path, &renamed).unwrap();
        let report = analyze(&renamed).unwrap();
        assert!(matches!(
            report.detection_methods[&Method::DctAnalysis],
            MethodVerdict::Dct(_)
        ));
    }

    #[test]
    fn test_grayscale_reports_reasons() {
        let img: GrayImage = ImageBuffer::from_fn(32, 32, |x, y| Luma([(x * 8 + y) as u8]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        img.save(&path).unwrap();

        let report = analyze(&path).unwrap();
        assert_eq!(report.dimensions.channels, 1);
        let lsb = &report.detection_methods[&Method::LsbAnalysis];
        assert!(!lsb.detected());
        assert!(lsb.reason().unwrap().contains("insufficient channels"));
        assert!(
            report.detection_methods[&Method::SampleExtraction]
                .reason()
                .is_some()
        );
        assert!(matches!(
            report.detection_methods[&Method::ChiSquare],
            MethodVerdict::ChiSquare(_)
        ));
    }

    #[test]
    fn test_voting_policy_controls_sample_vote() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "clean.png", &blank());
        let config = DetectorConfig {
            voting: VotingPolicy {
                sample_vote: SampleVote::Always,
            },
            ..DetectorConfig::default()
        };

        let report = analyze_with(&path, &config).unwrap();
        assert!(report.steganography_detected);
        assert_eq!(report.conclusion, "Possible hidden data detected");
    }

    #[test]
    fn test_undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        fs::write(&path, b"definitely not an image").unwrap();

        assert!(matches!(analyze(&path), Err(DetectorError::Decode(_))));
        assert!(analyze(dir.path().join("missing.png")).is_err());
    }
}
