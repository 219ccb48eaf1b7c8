//! Bit-exact wire encoding of cell batches.
//!
//! One transmission is a stream of length-framed cells:
//!
//! ```text
//! (cell_len: u8) (cell_bytes)          repeated
//!
//! cell_bytes:
//!   count      8 bytes, little-endian, signed
//!   xor_len    1 byte
//!   xor_bytes  minimal big-endian representation of xor_sum
//!   hash_len   1 byte
//!   hash_bytes minimal big-endian representation of hash_sum
//! ```
//!
//! Symbol and hash widths are session parameters agreed out of band, so the
//! stream carries no header. Decoding is strict: truncated input, oversized
//! length prefixes, and unconsumed bytes inside a cell frame are all errors,
//! and a failed decode returns nothing rather than a partial batch.

use bytes::{Buf, BufMut};

use crate::cell::Cell;
use crate::error::WireError;
use crate::symbol::{Symbol, SymbolKind};

/// Serialized byte length of a batch, framing included.
pub fn encoded_batch_len(cells: &[Cell]) -> usize {
    cells.iter().map(|cell| 1 + cell.encoded_len()).sum()
}

/// Encode a batch of cells into a length-framed byte stream.
pub fn encode_batch(cells: &[Cell]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_batch_len(cells));
    for cell in cells {
        let xor = cell.xor_sum.to_be_bytes_min();
        let hash = cell.hash_sum.to_be_bytes_min();
        // 8 + 1 + 32 + 1 + 32 at most, always within a u8 frame.
        out.put_u8((8 + 1 + xor.len() + 1 + hash.len()) as u8);
        out.put_i64_le(cell.count);
        out.put_u8(xor.len() as u8);
        out.put_slice(&xor);
        out.put_u8(hash.len() as u8);
        out.put_slice(&hash);
    }
    out
}

/// Decode a length-framed byte stream back into cells.
///
/// `symbol_kind` and `hash_kind` are the session's symbol and hash widths;
/// the minimal-length byte views are zero-extended back to them.
pub fn decode_batch(
    data: &[u8],
    symbol_kind: SymbolKind,
    hash_kind: SymbolKind,
) -> Result<Vec<Cell>, WireError> {
    let mut buf = data;
    let mut cells = Vec::new();

    while buf.has_remaining() {
        let cell_len = buf.get_u8() as usize;
        if buf.remaining() < cell_len {
            return Err(WireError::UnexpectedEof {
                needed: cell_len - buf.remaining(),
                available: buf.remaining(),
            });
        }
        let (cell_bytes, rest) = buf.split_at(cell_len);
        cells.push(decode_cell(cell_bytes, symbol_kind, hash_kind)?);
        buf = rest;
    }

    Ok(cells)
}

fn decode_cell(
    mut buf: &[u8],
    symbol_kind: SymbolKind,
    hash_kind: SymbolKind,
) -> Result<Cell, WireError> {
    if buf.remaining() < 8 {
        return Err(WireError::UnexpectedEof {
            needed: 8 - buf.remaining(),
            available: buf.remaining(),
        });
    }
    let count = buf.get_i64_le();

    let xor_sum = decode_sum(&mut buf, symbol_kind, "xor_sum")?;
    let hash_sum = decode_sum(&mut buf, hash_kind, "hash_sum")?;

    if buf.has_remaining() {
        return Err(WireError::TrailingBytes {
            count: buf.remaining(),
        });
    }

    Ok(Cell {
        count,
        xor_sum,
        hash_sum,
    })
}

fn decode_sum(
    buf: &mut &[u8],
    kind: SymbolKind,
    field: &'static str,
) -> Result<Symbol, WireError> {
    if !buf.has_remaining() {
        return Err(WireError::UnexpectedEof {
            needed: 1,
            available: 0,
        });
    }
    let len = buf.get_u8() as usize;
    if len > kind.width_bytes() {
        return Err(WireError::LengthOverflow {
            field,
            len,
            max: kind.width_bytes(),
        });
    }
    if buf.remaining() < len {
        return Err(WireError::UnexpectedEof {
            needed: len - buf.remaining(),
            available: buf.remaining(),
        });
    }
    let remaining = *buf;
    let (bytes, rest) = remaining.split_at(len);
    // The length was checked against the width above.
    let symbol = Symbol::from_be_bytes_min(kind, bytes).unwrap_or_else(|| kind.zero());
    *buf = rest;
    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::CellHasher;

    fn sample_cells() -> Vec<Cell> {
        let hasher = CellHasher::Xxh64;
        let mut cells = vec![Cell::empty(SymbolKind::U64, SymbolKind::U64); 5];
        cells[0].insert(&Symbol::U64(1), &hasher);
        cells[1].insert(&Symbol::U64(300), &hasher);
        cells[1].insert(&Symbol::U64(70_000), &hasher);
        cells[3].insert(&Symbol::U64(u64::MAX), &hasher);
        // A difference-style cell with a negative count.
        let mut other = Cell::empty(SymbolKind::U64, SymbolKind::U64);
        other.insert(&Symbol::U64(9), &hasher);
        cells[4].subtract(&other);
        cells
    }

    #[test]
    fn test_round_trip_cell_by_cell() {
        let cells = sample_cells();
        let encoded = encode_batch(&cells);
        let decoded = decode_batch(&encoded, SymbolKind::U64, SymbolKind::U64).unwrap();
        assert_eq!(decoded, cells);
    }

    #[test]
    fn test_round_trip_u256() {
        let hasher = CellHasher::Sha256;
        let mut cell = Cell::empty(SymbolKind::U256, SymbolKind::U256);
        cell.insert(&Symbol::U256([0xab; 32]), &hasher);
        let encoded = encode_batch(&[cell]);
        let decoded = decode_batch(&encoded, SymbolKind::U256, SymbolKind::U256).unwrap();
        assert_eq!(decoded, vec![cell]);
    }

    #[test]
    fn test_empty_cell_layout() {
        // count 0, empty xor, empty hash: frame byte 10 then eight zero
        // bytes and two zero length bytes.
        let cell = Cell::empty(SymbolKind::U32, SymbolKind::U32);
        let encoded = encode_batch(&[cell]);
        assert_eq!(encoded, vec![10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_known_cell_layout() {
        let cell = Cell {
            count: 1,
            xor_sum: Symbol::U32(7),
            hash_sum: Symbol::U32(0x0102),
        };
        let encoded = encode_batch(&[cell]);
        assert_eq!(
            encoded,
            vec![
                13, // frame: 8 + 1 + 1 + 1 + 2
                1, 0, 0, 0, 0, 0, 0, 0, // count, little-endian
                1, 7, // xor_len, xor bytes
                2, 1, 2, // hash_len, hash bytes (0x0102 big-endian)
            ]
        );
    }

    #[test]
    fn test_encoded_len_matches_output() {
        let cells = sample_cells();
        assert_eq!(encoded_batch_len(&cells), encode_batch(&cells).len());
    }

    #[test]
    fn test_truncated_final_cell_is_rejected() {
        let cells = sample_cells();
        let encoded = encode_batch(&cells);
        let truncated = &encoded[..encoded.len() - 1];
        let err = decode_batch(truncated, SymbolKind::U64, SymbolKind::U64).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_oversized_sum_length_is_rejected() {
        // xor_len of 9 cannot belong to a 64-bit symbol.
        let mut bytes = vec![19u8];
        bytes.extend_from_slice(&1i64.to_le_bytes());
        bytes.push(9);
        bytes.extend_from_slice(&[0xaa; 9]);
        bytes.push(0);
        let err = decode_batch(&bytes, SymbolKind::U64, SymbolKind::U64).unwrap_err();
        assert_eq!(
            err,
            WireError::LengthOverflow {
                field: "xor_sum",
                len: 9,
                max: 8,
            }
        );
    }

    #[test]
    fn test_trailing_bytes_in_frame_are_rejected() {
        // A frame that claims one byte more than its fields consume.
        let mut bytes = vec![11u8];
        bytes.extend_from_slice(&0i64.to_le_bytes());
        bytes.push(0); // xor_len
        bytes.push(0); // hash_len
        bytes.push(0xff); // stray byte inside the frame
        let err = decode_batch(&bytes, SymbolKind::U64, SymbolKind::U64).unwrap_err();
        assert_eq!(err, WireError::TrailingBytes { count: 1 });
    }

    #[test]
    fn test_bit_accounting_matches_filter() {
        use crate::ibf::Ibf;
        use crate::mapping::Mapping;
        use crate::symbol::Universe;

        let mut ibf = Ibf::new(Universe::Bounded(1000), Mapping::Egh).unwrap();
        let set: Vec<Symbol> = (1u32..=200).map(Symbol::U32).collect();
        let mut emitted_bits = 0u64;
        for _ in 0..4 {
            ibf.add_symbols(&set).unwrap();
            let range = ibf.batch_range(ibf.iteration());
            emitted_bits += 8 * encode_batch(&ibf.cells()[range]).len() as u64;
        }
        assert_eq!(ibf.transmitted_bits(), emitted_bits);
    }
}
