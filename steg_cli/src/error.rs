use parsers::image_parser::ImageParserError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Unable to decode image: {0}")]
    Decode(#[from] ImageParserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
