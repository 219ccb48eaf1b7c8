//! Golden wire vectors.
//!
//! Every implementation of the cell codec must produce these exact bytes.
//! The sums are hand-picked values, not real hash outputs, so the vectors
//! pin the byte layout alone: count little-endian, minimal big-endian sums,
//! u8 length framing.

use certsync_core::{Cell, Symbol, SymbolKind};

/// A single golden wire vector.
#[derive(Debug, Clone)]
pub struct WireVector {
    /// Identifier for failure messages.
    pub name: &'static str,
    /// The decoded form.
    pub cells: Vec<Cell>,
    /// Symbol width of the session that produced it.
    pub symbol_kind: SymbolKind,
    /// Hash width of the session that produced it.
    pub hash_kind: SymbolKind,
    /// The encoded form, hex.
    pub hex: &'static str,
}

/// All golden wire vectors.
pub fn wire_vectors() -> Vec<WireVector> {
    vec![
        WireVector {
            name: "empty_cell",
            cells: vec![Cell {
                count: 0,
                xor_sum: Symbol::U32(0),
                hash_sum: Symbol::U32(0),
            }],
            symbol_kind: SymbolKind::U32,
            hash_kind: SymbolKind::U32,
            hex: "0a00000000000000000000",
        },
        WireVector {
            name: "single_insert",
            cells: vec![Cell {
                count: 1,
                xor_sum: Symbol::U32(7),
                hash_sum: Symbol::U32(0x0102),
            }],
            symbol_kind: SymbolKind::U32,
            hash_kind: SymbolKind::U32,
            hex: "0d01000000000000000107020102",
        },
        WireVector {
            name: "negative_count_wide_sums",
            cells: vec![Cell {
                count: -1,
                xor_sum: Symbol::U64(0x0100),
                hash_sum: Symbol::U64(0xdead_beef),
            }],
            symbol_kind: SymbolKind::U64,
            hash_kind: SymbolKind::U64,
            hex: "10ffffffffffffffff02010004deadbeef",
        },
        WireVector {
            name: "two_cell_batch",
            cells: vec![
                Cell {
                    count: 0,
                    xor_sum: Symbol::U32(0),
                    hash_sum: Symbol::U32(0),
                },
                Cell {
                    count: 1,
                    xor_sum: Symbol::U32(7),
                    hash_sum: Symbol::U32(0x0102),
                },
            ],
            symbol_kind: SymbolKind::U32,
            hash_kind: SymbolKind::U32,
            hex: "0a000000000000000000000d01000000000000000107020102",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use certsync_core::wire;

    #[test]
    fn test_encoding_matches_golden_bytes() {
        for vector in wire_vectors() {
            let encoded = wire::encode_batch(&vector.cells);
            assert_eq!(
                hex::encode(&encoded),
                vector.hex,
                "vector {} encodes differently",
                vector.name
            );
        }
    }

    #[test]
    fn test_golden_bytes_decode_back() {
        for vector in wire_vectors() {
            let bytes = hex::decode(vector.hex).expect("valid hex");
            let decoded = wire::decode_batch(&bytes, vector.symbol_kind, vector.hash_kind)
                .expect("golden vector decodes");
            assert_eq!(decoded, vector.cells, "vector {} decodes differently", vector.name);
        }
    }
}
