//! Entropy-coded scan decoding.
//!
//! Walks the MCU grid in raster order and Huffman-decodes one 8×8 block at a
//! time: a DC size symbol plus difference bits, then AC run/size symbols
//! until the block is full or an EOB terminates it. Blocks come out of the
//! zig-zag order and into natural raster order here, so everything
//! downstream can ignore the scan pattern.

use std::io::Read;

use crate::bits::BitReader;
use crate::error::{Error, Result};
use crate::huffman::{HuffmanTables, HuffmanTree, TableClass};
use crate::metadata::{FrameHeader, ScanHeader, UNZIGZAG};

/// One dequantizable unit: 64 DCT coefficients in raster order.
pub type Block = [i16; 64];

/// Decoded DCT coefficients for every component of a scan.
///
/// `blocks` is indexed like the scan's component list. Within a component,
/// blocks are ordered MCU by MCU (raster), and raster within the MCU, so a
/// component contributes exactly `mcu_cols * mcu_rows * h * v` blocks.
#[derive(Debug)]
pub struct CoefficientStore {
    pub blocks: Vec<Vec<Block>>,
}

struct ScanChannel<'a> {
    h: u8,
    v: u8,
    dc: &'a HuffmanTree,
    ac: &'a HuffmanTree,
}

/// Decodes all entropy-coded data of a baseline scan and re-aligns the bit
/// source afterwards.
pub fn decode_scan<R: Read>(
    bits: &mut BitReader<R>,
    frame: &FrameHeader,
    scan: &ScanHeader,
    tables: &HuffmanTables,
) -> Result<CoefficientStore> {
    let (mcu_cols, mcu_rows) = frame.mcu_grid();

    let mut channels = Vec::with_capacity(scan.components.len());
    for sc in &scan.components {
        let comp = frame.component_by_id(sc.component_id)?;
        channels.push(ScanChannel {
            h: comp.h,
            v: comp.v,
            dc: tables.get(TableClass::Dc, sc.dc_id)?,
            ac: tables.get(TableClass::Ac, sc.ac_id)?,
        });
    }

    log::trace!(
        "decoding scan: {} components, {mcu_cols}x{mcu_rows} MCUs",
        channels.len()
    );

    let mut prev_dc = vec![0i16; channels.len()];
    let mut blocks: Vec<Vec<Block>> = channels
        .iter()
        .map(|ch| {
            let per_mcu = usize::from(ch.h) * usize::from(ch.v);
            Vec::with_capacity(usize::from(mcu_cols) * usize::from(mcu_rows) * per_mcu)
        })
        .collect();

    for _mcu_y in 0..mcu_rows {
        for _mcu_x in 0..mcu_cols {
            for (c, ch) in channels.iter().enumerate() {
                for _ in 0..u16::from(ch.h) * u16::from(ch.v) {
                    let block = decode_block(bits, ch.dc, ch.ac, &mut prev_dc[c])?;
                    blocks[c].push(block);
                }
            }
        }
    }

    bits.align();
    Ok(CoefficientStore { blocks })
}

fn decode_block<R: Read>(
    bits: &mut BitReader<R>,
    dc_tree: &HuffmanTree,
    ac_tree: &HuffmanTree,
    prev_dc: &mut i16,
) -> Result<Block> {
    let mut zigzag = [0i16; 64];

    let dc_size = dc_tree.decode(bits)?;
    if dc_size > 11 {
        return Err(Error::entropy(format!(
            "DC coefficient size {dc_size} exceeds the baseline maximum of 11"
        )));
    }
    let diff = bits.read_bits_signed(dc_size)?;
    // Wrapping keeps corrupt streams from overflowing the predictor.
    *prev_dc = prev_dc.wrapping_add(diff);
    zigzag[0] = *prev_dc;

    let mut index = 1;
    while index < 64 {
        let symbol = ac_tree.decode(bits)?;
        if symbol == 0x00 {
            // EOB, the rest of the block stays zero.
            break;
        }

        let run = symbol >> 4;
        let size = symbol & 0x0F;
        if size == 0 {
            if run != 15 {
                return Err(Error::entropy(format!(
                    "invalid AC symbol {symbol:02x}: zero size with a run of {run}"
                )));
            }
            // ZRL: sixteen zero coefficients.
            index += 16;
            if index > 64 {
                return Err(Error::entropy("zero run overruns the block"));
            }
            continue;
        }
        if size > 10 {
            return Err(Error::entropy(format!(
                "AC coefficient size {size} exceeds the baseline maximum of 10"
            )));
        }

        index += usize::from(run);
        if index >= 64 {
            return Err(Error::entropy("zero run overruns the block"));
        }
        zigzag[index] = bits.read_bits_signed(size)?;
        index += 1;
    }

    let mut block = [0i16; 64];
    for (zz, &pos) in UNZIGZAG.iter().enumerate() {
        block[pos] = zigzag[zz];
    }
    Ok(block)
}
