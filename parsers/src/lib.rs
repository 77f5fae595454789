pub mod image_parser;
pub mod jpeg_parser;

mod jpeg;

use std::path::Path;

pub trait Parser {
    type Output;
    type Error;

    fn parse_path<P: AsRef<Path>>(file_path: &P) -> Result<Self::Output, Self::Error>;
}

/// Whether the file extension names a JPEG container (`.jpg`, `.jpeg`, `.jfif`, ...).
pub fn is_jpeg_path<P: AsRef<Path>>(file_path: &P) -> bool {
    matches!(
        image::ImageFormat::from_path(file_path),
        Ok(image::ImageFormat::Jpeg)
    )
}
