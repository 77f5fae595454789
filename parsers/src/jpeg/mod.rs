//! Sequential-Huffman JPEG coefficient decoding.
//!
//! Walks the marker segments, collects quantization and Huffman tables,
//! and entropy-decodes every scan into per-component coefficient grids.
//! No dequantization and no IDCT: the output is exactly what an encoder
//! (or a JSteg-style embedder) wrote.

mod bits;
mod huffman;

use bits::BitReader;
use huffman::{HuffmanTable, receive_extend};

use crate::jpeg_parser::{DctBlockSet, DctComponent, JpegError};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOF0: u8 = 0xC0;
const SOF1: u8 = 0xC1;
const DHT: u8 = 0xC4;
const DQT: u8 = 0xDB;
const DRI: u8 = 0xDD;
const SOS: u8 = 0xDA;
const TEM: u8 = 0x01;

/// Zigzag position -> natural row-major position inside an 8x8 block.
const ZIGZAG_TO_NATURAL: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

struct FrameComponent {
    id: u8,
    h: usize,
    v: usize,
    quant_id: usize,
}

struct Frame {
    width: u16,
    height: u16,
    components: Vec<FrameComponent>,
    max_h: usize,
    max_v: usize,
    mcus_wide: usize,
    mcus_tall: usize,
}

impl Frame {
    fn parse(body: &[u8]) -> Result<Self, JpegError> {
        if body.len() < 6 {
            return Err(JpegError::InvalidSegment("SOF"));
        }
        if body[0] != 8 {
            return Err(JpegError::UnsupportedPrecision(body[0]));
        }
        let height = u16::from_be_bytes([body[1], body[2]]);
        let width = u16::from_be_bytes([body[3], body[4]]);
        let count = body[5] as usize;
        if width == 0 || height == 0 || count == 0 || body.len() < 6 + count * 3 {
            return Err(JpegError::InvalidSegment("SOF"));
        }

        let mut components = Vec::with_capacity(count);
        for chunk in body[6..6 + count * 3].chunks_exact(3) {
            let (h, v) = ((chunk[1] >> 4) as usize, (chunk[1] & 0x0F) as usize);
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) || chunk[2] > 3 {
                return Err(JpegError::InvalidSegment("SOF"));
            }
            components.push(FrameComponent {
                id: chunk[0],
                h,
                v,
                quant_id: chunk[2] as usize,
            });
        }

        let max_h = components.iter().map(|c| c.h).max().unwrap_or(1);
        let max_v = components.iter().map(|c| c.v).max().unwrap_or(1);
        Ok(Self {
            width,
            height,
            mcus_wide: (width as usize).div_ceil(8 * max_h),
            mcus_tall: (height as usize).div_ceil(8 * max_v),
            components,
            max_h,
            max_v,
        })
    }

    /// Padded grid size of a component (whole MCUs).
    fn grid_blocks(&self, comp: usize) -> (usize, usize) {
        let c = &self.components[comp];
        (self.mcus_wide * c.h, self.mcus_tall * c.v)
    }

    /// Blocks actually coded in a non-interleaved scan of a component.
    fn scan_blocks(&self, comp: usize) -> (usize, usize) {
        let c = &self.components[comp];
        let w = (self.width as usize * c.h).div_ceil(self.max_h);
        let h = (self.height as usize * c.v).div_ceil(self.max_v);
        (w.div_ceil(8), h.div_ceil(8))
    }
}

struct ScanComponent {
    comp: usize,
    dc_table: usize,
    ac_table: usize,
}

#[derive(Default)]
struct Tables {
    quant: [Option<[u16; 64]>; 4],
    dc: [Option<HuffmanTable>; 4],
    ac: [Option<HuffmanTable>; 4],
    restart_interval: u16,
}

impl Tables {
    fn parse_dqt(&mut self, mut body: &[u8]) -> Result<(), JpegError> {
        while let Some((&pq_tq, rest)) = body.split_first() {
            let (precision, id) = (pq_tq >> 4, (pq_tq & 0x0F) as usize);
            let width = match precision {
                0 => 1,
                1 => 2,
                _ => return Err(JpegError::InvalidSegment("DQT")),
            };
            if id > 3 || rest.len() < 64 * width {
                return Err(JpegError::InvalidSegment("DQT"));
            }

            let mut table = [0u16; 64];
            for (zz, natural) in ZIGZAG_TO_NATURAL.iter().enumerate() {
                table[*natural] = match width {
                    1 => rest[zz] as u16,
                    _ => u16::from_be_bytes([rest[zz * 2], rest[zz * 2 + 1]]),
                };
            }
            self.quant[id] = Some(table);
            body = &rest[64 * width..];
        }
        Ok(())
    }

    fn parse_dht(&mut self, mut body: &[u8]) -> Result<(), JpegError> {
        while let Some((&tc_th, rest)) = body.split_first() {
            let (class, id) = (tc_th >> 4, (tc_th & 0x0F) as usize);
            if class > 1 || id > 3 || rest.len() < 16 {
                return Err(JpegError::InvalidSegment("DHT"));
            }
            let mut counts = [0u8; 16];
            counts.copy_from_slice(&rest[..16]);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            if rest.len() < 16 + total {
                return Err(JpegError::InvalidSegment("DHT"));
            }

            let table = HuffmanTable::build(&counts, &rest[16..16 + total])?;
            match class {
                0 => self.dc[id] = Some(table),
                _ => self.ac[id] = Some(table),
            }
            body = &rest[16 + total..];
        }
        Ok(())
    }

    fn parse_dri(&mut self, body: &[u8]) -> Result<(), JpegError> {
        if body.len() < 2 {
            return Err(JpegError::InvalidSegment("DRI"));
        }
        self.restart_interval = u16::from_be_bytes([body[0], body[1]]);
        Ok(())
    }
}

fn parse_sos(body: &[u8], frame: &Frame) -> Result<Vec<ScanComponent>, JpegError> {
    let count = *body.first().ok_or(JpegError::InvalidSegment("SOS"))? as usize;
    if count == 0 || count > 4 || body.len() < 1 + count * 2 + 3 {
        return Err(JpegError::InvalidSegment("SOS"));
    }

    body[1..1 + count * 2]
        .chunks_exact(2)
        .map(|chunk| {
            let comp = frame
                .components
                .iter()
                .position(|c| c.id == chunk[0])
                .ok_or(JpegError::UnknownComponent(chunk[0]))?;
            Ok(ScanComponent {
                comp,
                dc_table: (chunk[1] >> 4) as usize & 3,
                ac_table: (chunk[1] & 0x0F) as usize & 3,
            })
        })
        .collect()
}

/// Read a marker segment starting at `pos` (the length field).
fn segment(data: &[u8], pos: usize) -> Result<(&[u8], usize), JpegError> {
    let len_bytes = data.get(pos..pos + 2).ok_or(JpegError::UnexpectedEof)?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if len < 2 {
        return Err(JpegError::InvalidSegment("marker"));
    }
    let body = data
        .get(pos + 2..pos + len)
        .ok_or(JpegError::UnexpectedEof)?;
    Ok((body, pos + len))
}

fn decode_block(
    reader: &mut BitReader,
    dc: &HuffmanTable,
    ac: &HuffmanTable,
    pred: &mut i32,
    block: &mut [i16],
) -> Result<(), JpegError> {
    let size = dc.decode(reader)?;
    *pred = pred.saturating_add(receive_extend(reader, size)?);
    block[0] = (*pred).clamp(i16::MIN as i32, i16::MAX as i32) as i16;

    let mut k = 1;
    while k < 64 {
        let rs = ac.decode(reader)?;
        let (run, size) = ((rs >> 4) as usize, rs & 0x0F);
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k > 63 {
            return Err(JpegError::HuffmanDecode);
        }
        block[ZIGZAG_TO_NATURAL[k]] = receive_extend(reader, size)? as i16;
        k += 1;
    }
    Ok(())
}

/// Entropy-decode one scan into `grids`; returns the offset after the scan data.
fn decode_scan(
    data: &[u8],
    start: usize,
    frame: &Frame,
    tables: &Tables,
    scan: &[ScanComponent],
    grids: &mut [Vec<i16>],
) -> Result<usize, JpegError> {
    let mut coders = Vec::with_capacity(scan.len());
    for sc in scan {
        let dc = tables.dc[sc.dc_table].as_ref().ok_or(JpegError::MissingTable {
            kind: "DC Huffman",
            id: sc.dc_table as u8,
        })?;
        let ac = tables.ac[sc.ac_table].as_ref().ok_or(JpegError::MissingTable {
            kind: "AC Huffman",
            id: sc.ac_table as u8,
        })?;
        coders.push((dc, ac));
    }

    let mut reader = BitReader::new(data, start);
    let mut preds = vec![0i32; scan.len()];
    let restart = tables.restart_interval as usize;
    let mut units = 0usize;
    let mut check_restart = |reader: &mut BitReader, preds: &mut [i32]| {
        if restart > 0 && units > 0 && units % restart == 0 {
            reader.restart()?;
            preds.fill(0);
        }
        units += 1;
        Ok::<(), JpegError>(())
    };

    if let [single] = scan {
        // Non-interleaved: one block per unit, only the coded area.
        let (grid_wide, _) = frame.grid_blocks(single.comp);
        let (wide, tall) = frame.scan_blocks(single.comp);
        let (dc, ac) = coders[0];
        for row in 0..tall {
            for col in 0..wide {
                check_restart(&mut reader, &mut preds)?;
                let start = (row * grid_wide + col) * 64;
                let block = &mut grids[single.comp][start..start + 64];
                decode_block(&mut reader, dc, ac, &mut preds[0], block)?;
            }
        }
    } else {
        for mcu_row in 0..frame.mcus_tall {
            for mcu_col in 0..frame.mcus_wide {
                check_restart(&mut reader, &mut preds)?;
                for (idx, sc) in scan.iter().enumerate() {
                    let comp = &frame.components[sc.comp];
                    let (grid_wide, _) = frame.grid_blocks(sc.comp);
                    let (dc, ac) = coders[idx];
                    for v in 0..comp.v {
                        for h in 0..comp.h {
                            let row = mcu_row * comp.v + v;
                            let col = mcu_col * comp.h + h;
                            let start = (row * grid_wide + col) * 64;
                            let block = &mut grids[sc.comp][start..start + 64];
                            decode_block(&mut reader, dc, ac, &mut preds[idx], block)?;
                        }
                    }
                }
            }
        }
    }

    Ok(reader.position())
}

pub(crate) fn decode_coefficients(data: &[u8]) -> Result<DctBlockSet, JpegError> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(JpegError::NotJpeg);
    }

    let mut tables = Tables::default();
    let mut frame: Option<Frame> = None;
    let mut grids: Vec<Vec<i16>> = Vec::new();
    let mut scans = 0usize;
    let mut pos = 2;

    loop {
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            break;
        };
        pos += 1;

        match marker {
            0x00 | SOI | TEM | 0xD0..=0xD7 => {}
            EOI => break,
            SOF0 | SOF1 => {
                let (body, next) = segment(data, pos)?;
                let parsed = Frame::parse(body)?;
                grids = (0..parsed.components.len())
                    .map(|comp| {
                        let (wide, tall) = parsed.grid_blocks(comp);
                        vec![0i16; wide * tall * 64]
                    })
                    .collect();
                frame = Some(parsed);
                pos = next;
            }
            // Progressive, lossless, hierarchical and arithmetic frames.
            0xC2 | 0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                return Err(JpegError::UnsupportedProcess(marker));
            }
            DHT => {
                let (body, next) = segment(data, pos)?;
                tables.parse_dht(body)?;
                pos = next;
            }
            DQT => {
                let (body, next) = segment(data, pos)?;
                tables.parse_dqt(body)?;
                pos = next;
            }
            DRI => {
                let (body, next) = segment(data, pos)?;
                tables.parse_dri(body)?;
                pos = next;
            }
            SOS => {
                let (body, next) = segment(data, pos)?;
                let frame = frame.as_ref().ok_or(JpegError::MissingFrame)?;
                let scan = parse_sos(body, frame)?;
                pos = decode_scan(data, next, frame, &tables, &scan, &mut grids)?;
                scans += 1;
            }
            _ => {
                let (_, next) = segment(data, pos)?;
                pos = next;
            }
        }
    }

    let frame = frame.ok_or(JpegError::MissingFrame)?;
    if scans == 0 {
        return Err(JpegError::MissingScan);
    }

    let mut components = Vec::with_capacity(frame.components.len());
    for (idx, (comp, coefficients)) in frame.components.iter().zip(grids).enumerate() {
        let quant_table = tables.quant[comp.quant_id].ok_or(JpegError::MissingTable {
            kind: "quantization",
            id: comp.quant_id as u8,
        })?;
        components.push(DctComponent::new(
            comp.id,
            (comp.h as u8, comp.v as u8),
            frame.grid_blocks(idx),
            coefficients,
            quant_table,
        ));
    }
    log::debug!(
        "decoded {} JPEG scan(s), {} component(s), {}x{}",
        scans,
        components.len(),
        frame.width,
        frame.height
    );

    Ok(DctBlockSet::new(frame.width, frame.height, components))
}
