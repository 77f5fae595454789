use std::path::Path;

use thiserror::Error;

use crate::Parser;
use crate::jpeg;

/// Reads the quantized DCT coefficients of a sequential JPEG without
/// running the inverse transform.
pub struct DctParser;

#[derive(Debug, Error)]
pub enum JpegError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("missing SOI marker (not a JPEG)")]
    NotJpeg,

    #[error("unexpected end of JPEG data")]
    UnexpectedEof,

    #[error("unsupported coding process (marker 0xFF{0:02X})")]
    UnsupportedProcess(u8),

    #[error("unsupported sample precision: {0}-bit")]
    UnsupportedPrecision(u8),

    #[error("invalid {0} segment")]
    InvalidSegment(&'static str),

    #[error("scan references missing {kind} table {id}")]
    MissingTable { kind: &'static str, id: u8 },

    #[error("scan references unknown component {0}")]
    UnknownComponent(u8),

    #[error("invalid Huffman code in scan data")]
    HuffmanDecode,

    #[error("no frame header before scan data")]
    MissingFrame,

    #[error("no scan data")]
    MissingScan,
}

/// Quantized coefficients of one frame component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DctComponent {
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    blocks_wide: usize,
    blocks_tall: usize,
    /// `blocks_tall * blocks_wide` blocks of 64 coefficients, natural order.
    coefficients: Vec<i16>,
    quant_table: [u16; 64],
}

impl DctComponent {
    pub(crate) fn new(
        id: u8,
        (h_sampling, v_sampling): (u8, u8),
        (blocks_wide, blocks_tall): (usize, usize),
        coefficients: Vec<i16>,
        quant_table: [u16; 64],
    ) -> Self {
        Self {
            id,
            h_sampling,
            v_sampling,
            blocks_wide,
            blocks_tall,
            coefficients,
            quant_table,
        }
    }

    pub fn blocks_wide(&self) -> usize {
        self.blocks_wide
    }

    pub fn blocks_tall(&self) -> usize {
        self.blocks_tall
    }

    /// Quantization table in natural (row-major) order.
    pub fn quant_table(&self) -> &[u16; 64] {
        &self.quant_table
    }

    pub fn blocks(&self) -> impl Iterator<Item = &[i16]> {
        self.coefficients.chunks_exact(64)
    }

    /// Every AC coefficient of every block (DC terms skipped).
    pub fn ac_coefficients(&self) -> impl Iterator<Item = i16> + '_ {
        self.blocks().flat_map(|block| block[1..].iter().copied())
    }
}

/// DCT coefficients of a whole JPEG frame, one entry per component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DctBlockSet {
    width: u16,
    height: u16,
    components: Vec<DctComponent>,
}

impl DctBlockSet {
    pub(crate) fn new(width: u16, height: u16, components: Vec<DctComponent>) -> Self {
        Self {
            width,
            height,
            components,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, JpegError> {
        jpeg::decode_coefficients(data)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn components(&self) -> &[DctComponent] {
        &self.components
    }
}

impl Parser for DctParser {
    type Output = DctBlockSet;

    type Error = JpegError;

    fn parse_path<P>(file_path: &P) -> Result<Self::Output, Self::Error>
    where
        P: AsRef<Path>,
    {
        let data = std::fs::read(file_path)?;
        DctBlockSet::from_bytes(&data)
    }
}
