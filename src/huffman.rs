//! Canonical JPEG Huffman codebooks.
//!
//! A [`HuffmanTree`] is built from the DHT wire representation: a 16-entry
//! histogram of code lengths plus the symbol values in code order. Codes are
//! assigned canonically (the flowcharts in Annex C, `Generate_size_table` and
//! `Generate_code_table`) and inserted into a binary trie. The trie is an
//! arena of nodes addressed by `u16` indices; a table of at most 256 symbols
//! never needs more than 511 nodes.

use core::fmt;
use std::io::Read;

use crate::bits::BitReader;
use crate::error::{Error, Result};

/// Entropy table class: DC coefficient sizes or AC run/size pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    Dc,
    Ac,
}

impl fmt::Display for TableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dc => f.write_str("DC"),
            Self::Ac => f.write_str("AC"),
        }
    }
}

#[derive(Clone, Copy)]
struct Node {
    /// Child indices for bit 0 and bit 1; 0 means absent (the root is never
    /// a child).
    children: [u16; 2],
    value: u8,
    terminal: bool,
}

const ABSENT: u16 = 0;

impl Node {
    fn empty() -> Self {
        Self {
            children: [ABSENT; 2],
            value: 0,
            terminal: false,
        }
    }
}

/// A decoding trie for one canonical Huffman table.
pub struct HuffmanTree {
    nodes: Vec<Node>,
}

impl HuffmanTree {
    /// Builds the trie from a DHT code-length histogram and symbol values.
    ///
    /// `counts[i]` is the number of codes of length `i + 1`; `values` holds
    /// the symbols in code order and must contain exactly `sum(counts)`
    /// entries. Overfull histograms (more codes of some length than the code
    /// space admits) and count/value mismatches are rejected.
    pub fn build(counts: &[u8; 16], values: &[u8]) -> Result<Self> {
        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        if total > 256 {
            return Err(Error::entropy(format!(
                "huffman table defines {total} symbols, the maximum is 256"
            )));
        }
        if values.len() != total {
            return Err(Error::entropy(format!(
                "huffman table promises {total} symbols but carries {}",
                values.len()
            )));
        }

        let mut tree = Self {
            nodes: vec![Node::empty()],
        };

        let mut next_code = 0u32;
        let mut value_iter = values.iter();
        for (i, &count) in counts.iter().enumerate() {
            let length = i as u8 + 1;
            next_code <<= 1;
            for _ in 0..count {
                if next_code >= 1 << length {
                    return Err(Error::entropy(format!(
                        "overfull huffman table: no {length}-bit code left to assign"
                    )));
                }
                // `value_iter` cannot run dry, `values.len()` was checked above.
                let &value = value_iter.next().unwrap();
                tree.insert(next_code as u16, length, value)?;
                next_code += 1;
            }
        }

        Ok(tree)
    }

    fn insert(&mut self, code: u16, length: u8, value: u8) -> Result<()> {
        let mut node = 0usize;
        for i in (0..length).rev() {
            let bit = usize::from(code >> i & 1);
            if self.nodes[node].terminal {
                return Err(Error::entropy(
                    "overfull huffman table: code descends through a leaf",
                ));
            }
            let mut child = self.nodes[node].children[bit];
            if child == ABSENT {
                child = self.nodes.len() as u16;
                self.nodes.push(Node::empty());
                self.nodes[node].children[bit] = child;
            }
            node = usize::from(child);
        }

        let leaf = &mut self.nodes[node];
        leaf.value = value;
        leaf.terminal = true;
        Ok(())
    }

    /// Decodes one symbol by walking the trie, left on bit 0 and right on
    /// bit 1.
    pub fn decode<R: Read>(&self, bits: &mut BitReader<R>) -> Result<u8> {
        let mut node = 0usize;
        loop {
            let bit = usize::from(bits.read_bits(1)?);
            let child = self.nodes[node].children[bit];
            if child == ABSENT {
                return Err(Error::entropy(
                    "bit sequence does not match any huffman code",
                ));
            }
            let next = self.nodes[usize::from(child)];
            if next.terminal {
                return Ok(next.value);
            }
            node = usize::from(child);
        }
    }

    fn collect_codes(&self, node: usize, code: u16, length: u8, out: &mut Vec<(u16, u8, u8)>) {
        let n = self.nodes[node];
        if n.terminal {
            out.push((code, length, n.value));
            return;
        }
        for bit in 0..2u16 {
            let child = n.children[usize::from(bit)];
            if child != ABSENT {
                self.collect_codes(usize::from(child), code << 1 | bit, length + 1, out);
            }
        }
    }
}

impl fmt::Debug for HuffmanTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes = Vec::new();
        self.collect_codes(0, 0, 0, &mut codes);
        for (i, (code, length, value)) in codes.into_iter().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            write!(f, "{:01$b} -> {2:02x}", code, usize::from(length), value)?;
        }
        Ok(())
    }
}

/// All entropy tables defined so far, keyed by (class, destination id).
pub struct HuffmanTables {
    dc: [Option<HuffmanTree>; 4],
    ac: [Option<HuffmanTree>; 4],
}

impl HuffmanTables {
    pub fn new() -> Self {
        Self {
            dc: [None, None, None, None],
            ac: [None, None, None, None],
        }
    }

    fn slot(&mut self, class: TableClass, id: u8) -> &mut Option<HuffmanTree> {
        match class {
            TableClass::Dc => &mut self.dc[usize::from(id)],
            TableClass::Ac => &mut self.ac[usize::from(id)],
        }
    }

    /// Installs a table. Redefining a (class, id) pair is fatal.
    pub fn set(&mut self, class: TableClass, id: u8, tree: HuffmanTree) -> Result<()> {
        let slot = self.slot(class, id);
        if slot.is_some() {
            return Err(Error::semantic(format!(
                "duplicate definition of {class} huffman table {id}"
            )));
        }
        *slot = Some(tree);
        Ok(())
    }

    /// Looks a table up; referencing an undefined table is fatal.
    pub fn get(&self, class: TableClass, id: u8) -> Result<&HuffmanTree> {
        let slot = match class {
            TableClass::Dc => &self.dc[usize::from(id)],
            TableClass::Ac => &self.ac[usize::from(id)],
        };
        slot.as_ref().ok_or_else(|| {
            Error::semantic(format!("scan references undefined {class} huffman table {id}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tablegen() {
        // Default Luminance DC table.
        let num_dc_codes = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        let dc_values = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b,
        ];

        let tree = HuffmanTree::build(&num_dc_codes, &dc_values).unwrap();
        expect_test::expect![[r#"
            00 -> 00
            010 -> 01
            011 -> 02
            100 -> 03
            101 -> 04
            110 -> 05
            1110 -> 06
            11110 -> 07
            111110 -> 08
            1111110 -> 09
            11111110 -> 0a
            111111110 -> 0b
        "#]]
        .assert_debug_eq(&tree);
    }

    #[test]
    fn decode_walk() {
        let counts = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        let values = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b,
        ];
        let tree = HuffmanTree::build(&counts, &values).unwrap();

        // 00 | 010 | 1110 | 111111110 -> 00, 01, 06, 0b (padded with zeros).
        let data = [0b00_010_111, 0b0_1111111, 0b10_000000];
        let mut bits = BitReader::new(&data[..]);
        assert_eq!(tree.decode(&mut bits).unwrap(), 0x00);
        assert_eq!(tree.decode(&mut bits).unwrap(), 0x01);
        assert_eq!(tree.decode(&mut bits).unwrap(), 0x06);
        assert_eq!(tree.decode(&mut bits).unwrap(), 0x0b);
    }

    #[test]
    fn decode_rejects_unassigned_sequence() {
        // Single 2-bit code 00; anything starting with a 1 bit runs off the
        // trie within two steps.
        let mut counts = [0u8; 16];
        counts[1] = 1;
        let tree = HuffmanTree::build(&counts, &[0x42]).unwrap();

        let data = [0b11_000000];
        let mut bits = BitReader::new(&data[..]);
        let err = tree.decode(&mut bits).unwrap_err();
        assert_eq!(err.to_string(), "bit sequence does not match any huffman code");
    }

    #[test]
    fn overfull_table() {
        // Three codes of length 1 cannot exist.
        let mut counts = [0u8; 16];
        counts[0] = 3;
        assert!(HuffmanTree::build(&counts, &[1, 2, 3]).is_err());

        // Both 1-bit codes taken, so no 2-bit code can be assigned.
        let mut counts = [0u8; 16];
        counts[0] = 2;
        counts[1] = 1;
        assert!(HuffmanTree::build(&counts, &[1, 2, 3]).is_err());
    }

    #[test]
    fn count_value_mismatch() {
        let mut counts = [0u8; 16];
        counts[2] = 4;
        assert!(HuffmanTree::build(&counts, &[1, 2]).is_err());
        assert!(HuffmanTree::build(&counts, &[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn sixteen_ones_is_a_valid_code() {
        // A maximal-depth table: one code per length. The deepest code is
        // fifteen 1 bits followed by a 0.
        let counts = [1u8; 16];
        let values: Vec<u8> = (0..16).collect();
        let tree = HuffmanTree::build(&counts, &values).unwrap();

        let data = [0xFF, 0x00, 0xFE]; // 0xFF is stuffed in entropy data
        let mut bits = BitReader::new(&data[..]);
        assert_eq!(tree.decode(&mut bits).unwrap(), 15);
    }

    #[test]
    fn duplicate_destination_is_fatal() {
        let mut counts = [0u8; 16];
        counts[0] = 1;
        let mut tables = HuffmanTables::new();
        tables
            .set(TableClass::Dc, 0, HuffmanTree::build(&counts, &[0]).unwrap())
            .unwrap();
        let err = tables
            .set(TableClass::Dc, 0, HuffmanTree::build(&counts, &[0]).unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "duplicate definition of DC huffman table 0");

        // Same id under the other class is a different destination.
        tables
            .set(TableClass::Ac, 0, HuffmanTree::build(&counts, &[0]).unwrap())
            .unwrap();
        assert!(tables.get(TableClass::Ac, 0).is_ok());
        assert!(tables.get(TableClass::Ac, 1).is_err());
    }
}
