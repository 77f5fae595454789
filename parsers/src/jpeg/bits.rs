//! MSB-first bit reader over entropy-coded scan data.

use crate::jpeg_parser::JpegError;

/// Zero bytes that may be fed past a marker before the scan is treated as
/// truncated. Covers the look-ahead of one Huffman code plus its extra bits.
const MAX_PAD_BYTES: u8 = 4;

pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    bits: u8,
    /// Set once a marker stops the scan; `pos` then stays on its 0xFF.
    at_marker: bool,
    padded: u8,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            acc: 0,
            bits: 0,
            at_marker: false,
            padded: 0,
        }
    }

    /// Byte offset of the first byte not consumed by the scan.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn read_bit(&mut self) -> Result<u16, JpegError> {
        self.read_bits(1)
    }

    /// Read `count` (1..=16) bits, right-aligned.
    pub(crate) fn read_bits(&mut self, count: u8) -> Result<u16, JpegError> {
        while self.bits < count {
            self.fill()?;
        }
        self.bits -= count;
        let value = (self.acc >> self.bits) & ((1u32 << count) - 1);
        Ok(value as u16)
    }

    /// Discard buffered bits and step over the next RST marker.
    pub(crate) fn restart(&mut self) -> Result<(), JpegError> {
        self.acc = 0;
        self.bits = 0;
        self.at_marker = false;
        self.padded = 0;

        while self.pos + 1 < self.data.len() {
            if self.data[self.pos] == 0xFF && (0xD0..=0xD7).contains(&self.data[self.pos + 1]) {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(JpegError::UnexpectedEof)
    }

    fn fill(&mut self) -> Result<(), JpegError> {
        let byte = if self.at_marker {
            self.pad()?
        } else {
            let byte = *self.data.get(self.pos).ok_or(JpegError::UnexpectedEof)?;
            if byte == 0xFF {
                match self.data.get(self.pos + 1) {
                    Some(0x00) => {
                        self.pos += 2;
                        0xFF
                    }
                    Some(_) => {
                        self.at_marker = true;
                        self.pad()?
                    }
                    None => return Err(JpegError::UnexpectedEof),
                }
            } else {
                self.pos += 1;
                byte
            }
        };

        self.acc = (self.acc << 8) | byte as u32;
        self.bits += 8;
        Ok(())
    }

    fn pad(&mut self) -> Result<u8, JpegError> {
        if self.padded >= MAX_PAD_BYTES {
            return Err(JpegError::UnexpectedEof);
        }
        self.padded += 1;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_msb_first() {
        let data = [0b1010_0000, 0b1111_0000];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.read_bit().unwrap(), 1);
        assert_eq!(reader.read_bit().unwrap(), 0);
        assert_eq!(reader.read_bits(2).unwrap(), 0b10);
        assert_eq!(reader.read_bits(8).unwrap(), 0b0000_1111);
    }

    #[test]
    fn test_unstuffs_ff00() {
        let data = [0xFF, 0x00, 0x80];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert_eq!(reader.read_bit().unwrap(), 1);
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn test_stops_at_marker() {
        let data = [0xAB, 0xFF, 0xD9];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.read_bits(8).unwrap(), 0xAB);
        assert_eq!(reader.read_bits(8).unwrap(), 0);
        assert_eq!(reader.position(), 1);
        assert!(reader.read_bits(16).is_ok());
        assert!(reader.read_bits(16).is_err());
    }

    #[test]
    fn test_restart_skips_marker() {
        let data = [0x12, 0xFF, 0xD3, 0x80];
        let mut reader = BitReader::new(&data, 0);
        reader.read_bits(4).unwrap();
        reader.restart().unwrap();
        assert_eq!(reader.read_bit().unwrap(), 1);
    }
}
