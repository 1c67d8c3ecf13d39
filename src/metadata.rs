//! Semantic image metadata, distilled from the wire-level segments.

use crate::error::{Error, Result};

/// A dequantization table, stored in natural (raster) order.
///
/// DQT segments carry the 64 entries in zig-zag order; they are un-zig-zagged
/// on ingestion so the reconstruction stage can multiply element-wise.
#[derive(Debug, Clone)]
pub struct QuantTable {
    pub id: u8,
    pub values: [u16; 64],
}

/// All dequantization tables defined so far, keyed by destination id.
pub struct QuantTables {
    tables: [Option<QuantTable>; 16],
}

impl QuantTables {
    pub fn new() -> Self {
        Self {
            tables: Default::default(),
        }
    }

    /// Installs a table. Redefining a destination id is fatal.
    pub fn set(&mut self, table: QuantTable) -> Result<()> {
        let slot = &mut self.tables[usize::from(table.id)];
        if slot.is_some() {
            return Err(Error::semantic(format!(
                "duplicate definition of quantization table {}",
                table.id
            )));
        }
        *slot = Some(table);
        Ok(())
    }

    /// Looks a table up; referencing an undefined table is fatal.
    pub fn get(&self, id: u8) -> Result<&QuantTable> {
        self.tables[usize::from(id)].as_ref().ok_or_else(|| {
            Error::semantic(format!("component references undefined quantization table {id}"))
        })
    }
}

/// Per-component frame parameters from the SOF0 segment.
#[derive(Debug, Clone, Copy)]
pub struct Component {
    /// Arbitrary identifier the scan header refers back to.
    pub id: u8,
    /// Horizontal sampling factor (1-4).
    pub h: u8,
    /// Vertical sampling factor (1-4).
    pub v: u8,
    /// Dequantization table selector.
    pub quant_id: u8,
}

/// The frame header (SOF0). Exactly one per stream.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<Component>,
}

impl FrameHeader {
    pub fn component_by_id(&self, id: u8) -> Result<&Component> {
        self.components
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::semantic(format!("scan selects unknown component id {id}")))
    }

    /// Largest horizontal sampling factor of any component.
    pub fn max_h(&self) -> u8 {
        self.components.iter().map(|c| c.h).max().unwrap_or(1)
    }

    /// Largest vertical sampling factor of any component.
    pub fn max_v(&self) -> u8 {
        self.components.iter().map(|c| c.v).max().unwrap_or(1)
    }

    /// MCU grid dimensions: `ceil(width / 8H)` columns, `ceil(height / 8V)` rows.
    pub fn mcu_grid(&self) -> (u16, u16) {
        let mcu_w = 8 * u32::from(self.max_h());
        let mcu_h = 8 * u32::from(self.max_v());
        let cols = (u32::from(self.width) + mcu_w - 1) / mcu_w;
        let rows = (u32::from(self.height) + mcu_h - 1) / mcu_h;
        (cols as u16, rows as u16)
    }
}

/// One component selection from the scan header.
#[derive(Debug, Clone, Copy)]
pub struct ScanComponentInfo {
    /// Frame component id this selection refers to.
    pub component_id: u8,
    /// DC entropy table selector (0-3).
    pub dc_id: u8,
    /// AC entropy table selector (0-3).
    pub ac_id: u8,
}

/// The scan header (SOS), already checked against the baseline constraints
/// (`Ss = 0`, `Se = 63`, `Ah = Al = 0`).
#[derive(Debug, Clone)]
pub struct ScanHeader {
    pub components: Vec<ScanComponentInfo>,
}

/// Maps a zig-zag index to its position in natural (raster) order.
#[rustfmt::skip]
pub const UNZIGZAG: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unzigzag_is_a_permutation() {
        let mut seen = [false; 64];
        for &pos in &UNZIGZAG {
            assert!(!seen[pos]);
            seen[pos] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn unzigzag_round_trip() {
        // Applying the permutation and then its inverse restores any vector.
        let input: Vec<i16> = (0..64).collect();
        let mut natural = [0i16; 64];
        for (zz, &pos) in UNZIGZAG.iter().enumerate() {
            natural[pos] = input[zz];
        }
        let mut back = [0i16; 64];
        for (zz, &pos) in UNZIGZAG.iter().enumerate() {
            back[zz] = natural[pos];
        }
        assert_eq!(&back[..], &input[..]);
    }

    #[test]
    fn mcu_grid_rounds_up() {
        let frame = FrameHeader {
            precision: 8,
            height: 17,
            width: 33,
            components: vec![
                Component { id: 1, h: 2, v: 2, quant_id: 0 },
                Component { id: 2, h: 1, v: 1, quant_id: 1 },
            ],
        };
        // MCU is 16x16; 33x17 needs 3x2 MCUs.
        assert_eq!(frame.mcu_grid(), (3, 2));
    }
}
