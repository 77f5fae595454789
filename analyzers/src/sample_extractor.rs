use serde::Serialize;
use thiserror::Error;

use crate::thresholds::SampleSettings;
use crate::{Analyzer, MethodVerdict};
use parsers::image_parser::ImageSample;

/// Materializes the LSB stream of the image as bytes for human review.
///
/// Bits are taken row-major, R then G then B within a pixel, and packed
/// MSB-first. A length-prefixed payload (`<decimal length>:<bytes>`, the
/// layout written by common LSB tools) is tried first; the raw walk is the
/// fallback.
pub struct SampleExtractor {
    settings: SampleSettings,
}

#[derive(Debug, Error)]
pub enum SampleExtractorError {
    #[error("Grayscale image, insufficient channels for sample extraction")]
    InsufficientChannels(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    LengthHeader,
    RawWalk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleExtraction {
    pub detected: bool,
    pub confidence: f64,
    /// Extracted bytes as text, undecodable sequences replaced.
    pub sample: String,
    pub sample_hex: String,
    pub data_type: DataType,
    pub printable_ratio: f64,
    /// LSBs the image offers (3 per pixel).
    pub bits_available: usize,
    /// LSBs consumed to produce the sample (including any header).
    pub bits_read: usize,
    pub strategy: ExtractionStrategy,
    pub details: String,
}

impl SampleExtractor {
    pub fn new(settings: SampleSettings) -> Self {
        Self { settings }
    }

    /// Format-aware stage: decode `<digits>:` and return the declared payload.
    ///
    /// `None` when the stream does not start with a plausible header or the
    /// declared length does not fit in the image.
    pub fn extract_length_header(&self, sample: &ImageSample) -> Option<Vec<u8>> {
        self.read_length_header(sample).map(|(_, payload)| payload)
    }

    /// Header length in bytes (digits plus `:`) and the declared payload.
    fn read_length_header(&self, sample: &ImageSample) -> Option<(usize, Vec<u8>)> {
        if !sample.is_color() {
            return None;
        }
        let mut bytes = lsb_bytes(sample);

        let mut digits = String::new();
        loop {
            let byte = bytes.next()?;
            match byte {
                b'0'..=b'9' if digits.len() < self.settings.max_header_digits => {
                    digits.push(byte as char)
                }
                b':' if !digits.is_empty() => break,
                _ => return None,
            }
        }

        let length: usize = digits.parse().ok()?;
        let header_bits = (digits.len() + 1) * 8;
        let available = sample.pixel_count() * 3;
        if length == 0 || header_bits + length.checked_mul(8)? > available {
            return None;
        }

        Some((digits.len() + 1, bytes.take(length).collect()))
    }

    /// Fallback stage: the first `max_sample_bytes` bytes of the raw walk.
    pub fn extract_raw(&self, sample: &ImageSample) -> Vec<u8> {
        if !sample.is_color() {
            return Vec::new();
        }
        lsb_bytes(sample).take(self.settings.max_sample_bytes).collect()
    }

    fn classify(&self, bytes: &[u8]) -> DataType {
        let probe = &bytes[..bytes.len().min(self.settings.text_probe_bytes)];
        if !probe.is_empty() && probe.iter().all(|b| is_printable(*b)) {
            DataType::Text
        } else {
            DataType::Binary
        }
    }
}

impl Analyzer for SampleExtractor {
    type Input = ImageSample;
    type Output = SampleExtraction;
    type Error = SampleExtractorError;

    fn analyze(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        if !input.is_color() {
            return Err(SampleExtractorError::InsufficientChannels(input.channels()));
        }

        let bits_available = input.pixel_count() * 3;
        let (mut bytes, bits_read, strategy) = match self.read_length_header(input) {
            Some((header_len, payload)) => {
                let bits_read = (header_len + payload.len()) * 8;
                (payload, bits_read, ExtractionStrategy::LengthHeader)
            }
            None => {
                let raw = self.extract_raw(input);
                let bits_read = raw.len() * 8;
                (raw, bits_read, ExtractionStrategy::RawWalk)
            }
        };
        bytes.truncate(self.settings.max_sample_bytes);

        let confidence = (bits_read as f64 / 8.0).min(1.0);
        let detected = confidence >= 1.0;
        let data_type = self.classify(&bytes);
        let printable_ratio = if bytes.is_empty() {
            0.0
        } else {
            bytes.iter().filter(|b| is_printable(**b)).count() as f64 / bytes.len() as f64
        };

        let details = match (strategy, data_type) {
            (ExtractionStrategy::LengthHeader, _) => "Recovered a length-prefixed LSB payload",
            (ExtractionStrategy::RawWalk, DataType::Text) => {
                "Manually extracted potential hidden text"
            }
            (ExtractionStrategy::RawWalk, DataType::Binary) => {
                "Manually extracted potential hidden binary data"
            }
        };
        log::debug!("sample extraction: {strategy:?}, {} byte(s), {data_type:?}", bytes.len());

        Ok(SampleExtraction {
            detected,
            confidence,
            sample: String::from_utf8_lossy(&bytes).into_owned(),
            sample_hex: hex::encode(&bytes),
            data_type,
            printable_ratio,
            bits_available,
            bits_read,
            strategy,
            details: details.to_string(),
        })
    }
}

impl From<SampleExtraction> for MethodVerdict {
    fn from(extraction: SampleExtraction) -> Self {
        MethodVerdict::Sample(extraction)
    }
}

impl From<SampleExtractorError> for MethodVerdict {
    fn from(error: SampleExtractorError) -> Self {
        MethodVerdict::not_applicable(error)
    }
}

fn is_printable(byte: u8) -> bool {
    (32..=126).contains(&byte)
}

/// Canonical LSB stream: row-major pixels, R, G, B per pixel.
fn lsb_bits(sample: &ImageSample) -> impl Iterator<Item = u8> + '_ {
    let planes = [0, 1, 2].map(|channel| sample.plane(channel).unwrap_or_default());
    (0..sample.pixel_count()).flat_map(move |idx| {
        planes
            .into_iter()
            .filter_map(move |plane| plane.get(idx))
            .map(|value| value & 1)
    })
}

/// MSB-first packing of [`lsb_bits`]; a trailing partial byte is dropped.
fn lsb_bytes(sample: &ImageSample) -> impl Iterator<Item = u8> + '_ {
    let mut bits = lsb_bits(sample);
    std::iter::from_fn(move || {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | bits.next()?;
        }
        Some(byte)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Luma, Rgb, RgbImage};

    fn blank(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |_, _| Rgb([255, 255, 255]))
    }

    /// Overwrite LSBs in canonical order with `message`, MSB-first.
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

    fn sample_of(img: RgbImage) -> ImageSample {
        ImageSample::from_dynamic(&DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn test_raw_walk_recovers_embedded_prefix() {
        let message = b"meet at the old mill at dawn";
        let mut img = blank(300, 300);
        embed(&mut img, message);

        let extractor = SampleExtractor::new(SampleSettings::default());
        let raw = extractor.extract_raw(&sample_of(img));

        assert_eq!(raw.len(), 100);
        assert_eq!(&raw[..message.len()], message);
    }

    #[test]
    fn test_raw_walk_report_on_blank_image() {
        let extractor = SampleExtractor::new(SampleSettings::default());
        let result = extractor.analyze(&sample_of(blank(300, 300))).unwrap();

        // White pixels: every LSB is 1.
        assert!(result.detected);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.strategy, ExtractionStrategy::RawWalk);
        assert_eq!(result.data_type, DataType::Binary);
        assert!(result.sample_hex.starts_with("ffff"));
        assert_eq!(result.bits_available, 270_000);
        assert_eq!(result.bits_read, 800);
    }

    #[test]
    fn test_length_header_stage() {
        let mut img = blank(300, 300);
        embed(&mut img, b"11:hello world and trailing noise");

        let extractor = SampleExtractor::new(SampleSettings::default());
        let sample = sample_of(img);
        assert_eq!(
            extractor.extract_length_header(&sample).as_deref(),
            Some(&b"hello world"[..])
        );

        let result = extractor.analyze(&sample).unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::LengthHeader);
        assert_eq!(result.sample, "hello world");
        assert_eq!(result.data_type, DataType::Text);
        assert_eq!(result.bits_read, (3 + 11) * 8);
        assert_eq!(result.details, "Recovered a length-prefixed LSB payload");
    }

    #[test]
    fn test_zero_padded_header_counts_every_digit() {
        let mut img = blank(100, 100);
        embed(&mut img, b"005:hello");

        let result = SampleExtractor::new(SampleSettings::default())
            .analyze(&sample_of(img))
            .unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::LengthHeader);
        assert_eq!(result.sample, "hello");
        assert_eq!(result.bits_read, (4 + 5) * 8);
    }

    #[test]
    fn test_length_header_rejects_oversized_length() {
        let mut img = blank(4, 4);
        embed(&mut img, b"99:");
        let extractor = SampleExtractor::new(SampleSettings::default());
        assert!(extractor.extract_length_header(&sample_of(img)).is_none());
    }

    #[test]
    fn test_raw_text_is_classified_as_text() {
        let message = b"The quick brown fox jumps over the lazy dog";
        let mut img = blank(100, 100);
        embed(&mut img, message);

        let settings = SampleSettings {
            max_sample_bytes: message.len(),
            ..SampleSettings::default()
        };
        let result = SampleExtractor::new(settings).analyze(&sample_of(img)).unwrap();

        assert_eq!(result.strategy, ExtractionStrategy::RawWalk);
        assert_eq!(result.data_type, DataType::Text);
        assert_eq!(result.sample.as_bytes(), message);
        assert_eq!(result.printable_ratio, 1.0);
    }

    #[test]
    fn test_tiny_image_has_too_few_bits() {
        // One pixel offers 3 LSBs: not a single byte.
        let result = SampleExtractor::new(SampleSettings::default())
            .analyze(&sample_of(blank(1, 2)))
            .unwrap();
        assert!(!result.detected);
        assert!(result.confidence < 1.0);
        assert!(result.sample.is_empty());
    }

    #[test]
    fn test_grayscale_is_not_applicable() {
        let img = ImageBuffer::from_fn(8, 8, |_, _| Luma([0u8]));
        let sample = ImageSample::from_dynamic(&DynamicImage::ImageLuma8(img));
        let extractor = SampleExtractor::new(SampleSettings::default());

        assert!(extractor.analyze(&sample).is_err());
        assert!(extractor.extract_length_header(&sample).is_none());
        assert!(extractor.extract_raw(&sample).is_empty());
    }
}
