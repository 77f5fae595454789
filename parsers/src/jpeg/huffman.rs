//! Canonical Huffman decoding tables (ITU-T T.81, Annex C and F.2.2.3).

use super::bits::BitReader;
use crate::jpeg_parser::JpegError;

pub(crate) struct HuffmanTable {
    /// Largest code of each length, or -1 when the length is unused.
    max_code: [i32; 17],
    min_code: [i32; 17],
    /// Index into `values` of the first symbol of each length.
    val_ptr: [usize; 17],
    values: Vec<u8>,
}

impl HuffmanTable {
    /// `counts[i]` is the number of codes of length `i + 1`.
    pub(crate) fn build(counts: &[u8; 16], values: &[u8]) -> Result<Self, JpegError> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total > 256 || total != values.len() {
            return Err(JpegError::InvalidSegment("DHT"));
        }

        let mut max_code = [-1i32; 17];
        let mut min_code = [0i32; 17];
        let mut val_ptr = [0usize; 17];
        let mut code = 0i32;
        let mut k = 0usize;

        for len in 1..=16 {
            let count = counts[len - 1] as i32;
            val_ptr[len] = k;
            min_code[len] = code;
            code += count;
            k += count as usize;
            if count > 0 {
                max_code[len] = code - 1;
            }
            if code > (1 << len) {
                return Err(JpegError::InvalidSegment("DHT"));
            }
            code <<= 1;
        }

        Ok(Self {
            max_code,
            min_code,
            val_ptr,
            values: values.to_vec(),
        })
    }

    pub(crate) fn decode(&self, reader: &mut BitReader) -> Result<u8, JpegError> {
        let mut code = 0i32;
        for len in 1..=16 {
            code = (code << 1) | reader.read_bit()? as i32;
            if code <= self.max_code[len] {
                let idx = self.val_ptr[len] + (code - self.min_code[len]) as usize;
                return Ok(self.values[idx]);
            }
        }
        Err(JpegError::HuffmanDecode)
    }
}

/// Read `size` magnitude bits and sign-extend them (T.81 F.2.2.1 EXTEND).
pub(crate) fn receive_extend(reader: &mut BitReader, size: u8) -> Result<i32, JpegError> {
    if size == 0 {
        return Ok(0);
    }
    if size > 16 {
        return Err(JpegError::HuffmanDecode);
    }
    let bits = reader.read_bits(size)? as i32;
    if bits < 1 << (size - 1) {
        Ok(bits - (1 << size) + 1)
    } else {
        Ok(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Table K.3: standard luminance DC codes.
    const DC_COUNTS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    #[test]
    fn test_decodes_standard_dc_codes() {
        let table = HuffmanTable::build(&DC_COUNTS, &DC_VALUES).unwrap();
        // "00" -> 0, "010" -> 1, "1110" -> 6, "111111110" -> 11
        let data = [0b0001_0111, 0b0111_1111, 0b1000_0000];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
        assert_eq!(table.decode(&mut reader).unwrap(), 1);
        assert_eq!(table.decode(&mut reader).unwrap(), 6);
        assert_eq!(table.decode(&mut reader).unwrap(), 11);
    }

    #[test]
    fn test_rejects_mismatched_symbol_count() {
        assert!(HuffmanTable::build(&DC_COUNTS, &DC_VALUES[..5]).is_err());
    }

    #[test]
    fn test_receive_extend_signs() {
        // size 3: 0b011 -> -4, 0b100 -> 4
        let data = [0b0111_0000];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(receive_extend(&mut reader, 3).unwrap(), -4);
        assert_eq!(receive_extend(&mut reader, 3).unwrap(), 4);
        assert_eq!(receive_extend(&mut reader, 0).unwrap(), 0);
    }
}
