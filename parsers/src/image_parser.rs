use std::path::Path;

use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;

use crate::Parser;

pub struct ImageParser;

#[derive(Debug, Error)]
pub enum ImageParserError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Parse(#[from] image::ImageError),
}

/// A decoded raster: one 8-bit plane per channel, row-major.
///
/// Grayscale sources keep a single plane; everything else is reduced to
/// R, G, B. Alpha is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSample {
    width: u32,
    height: u32,
    planes: Vec<Vec<u8>>,
    format: Option<ImageFormat>,
}

impl ImageSample {
    /// Split a decoded image into planes.
    ///
    /// Only luma sources (with or without alpha) stay single-plane. The
    /// `image` crate expands palette images to RGB while decoding, so
    /// indexed PNGs and GIFs arrive here as colour and get every
    /// channel-based analysis.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let planes = match image.color() {
            ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
                vec![image.to_luma8().into_raw()]
            }
            _ => {
                let rgb = image.to_rgb8();
                let mut planes: Vec<Vec<u8>> = (0..3)
                    .map(|_| Vec::with_capacity(rgb.len() / 3))
                    .collect();
                for pixel in rgb.pixels() {
                    for (channel, plane) in planes.iter_mut().enumerate() {
                        plane.push(pixel[channel]);
                    }
                }
                planes
            }
        };

        Self {
            width,
            height,
            planes,
            format: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_color(&self) -> bool {
        self.planes.len() >= 3
    }

    /// Container format the sample was decoded from, when known.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn plane(&self, channel: usize) -> Option<&[u8]> {
        self.planes.get(channel).map(Vec::as_slice)
    }

    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }
}

impl Parser for ImageParser {
    type Output = ImageSample;

    type Error = ImageParserError;

    fn parse_path<P>(file_path: &P) -> Result<Self::Output, Self::Error>
    where
        P: AsRef<Path>,
    {
        // Content sniffing wins over the extension; uploads often arrive as
        // extensionless temp files.
        let reader = ImageReader::open(file_path)?.with_guessed_format()?;
        let format = reader.format();
        let image = reader.decode()?;
        log::debug!(
            "decoded {:?} as {:?} ({}x{}, {:?})",
            file_path.as_ref(),
            format,
            image.width(),
            image.height(),
            image.color()
        );

        let mut sample = ImageSample::from_dynamic(&image);
        sample.format = format;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgba, RgbaImage};

    #[test]
    fn test_rgb_planes_are_split() {
        let img = ImageBuffer::from_fn(4, 2, |x, y| Rgb([x as u8, y as u8, 7]));
        let sample = ImageSample::from_dynamic(&DynamicImage::ImageRgb8(img));

        assert_eq!(sample.channels(), 3);
        assert_eq!(sample.pixel_count(), 8);
        assert_eq!(sample.plane(0).unwrap(), &[0, 1, 2, 3, 0, 1, 2, 3]);
        assert_eq!(sample.plane(1).unwrap(), &[0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(sample.plane(2).unwrap(), &[7; 8]);
    }

    #[test]
    fn test_alpha_is_dropped() {
        let img: RgbaImage = ImageBuffer::from_fn(2, 2, |_, _| Rgba([10, 20, 30, 0]));
        let sample = ImageSample::from_dynamic(&DynamicImage::ImageRgba8(img));

        assert_eq!(sample.channels(), 3);
        assert!(sample.is_color());
    }

    #[test]
    fn test_grayscale_keeps_one_plane() {
        let img: GrayImage = ImageBuffer::from_fn(3, 3, |x, _| Luma([x as u8]));
        let sample = ImageSample::from_dynamic(&DynamicImage::ImageLuma8(img));

        assert_eq!(sample.channels(), 1);
        assert!(!sample.is_color());
        assert!(sample.plane(1).is_none());
    }

    #[test]
    fn test_parse_path_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        let img = ImageBuffer::from_fn(5, 4, |x, y| Rgb([x as u8, y as u8, 0]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();

        let sample = ImageParser::parse_path(&path).unwrap();
        assert_eq!((sample.width(), sample.height()), (5, 4));
        assert_eq!(sample.format(), Some(ImageFormat::Png));
    }

    #[test]
    fn test_parse_path_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        assert!(ImageParser::parse_path(&path).is_err());
    }
}
