//! Symbol and universe types.
//!
//! A [`Symbol`] is a fixed-width unsigned value: the unit both parties insert
//! into their filters. The width set is closed (32, 64, or 256 bits) so that
//! cell size is statically known within a session and the wire codec can use
//! a constant stride when both parties agree on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of symbol widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// 32-bit symbols.
    U32,
    /// 64-bit symbols.
    U64,
    /// 256-bit symbols (e.g. transaction hashes).
    U256,
}

impl SymbolKind {
    /// Width in bits.
    pub const fn width_bits(&self) -> u32 {
        match self {
            SymbolKind::U32 => 32,
            SymbolKind::U64 => 64,
            SymbolKind::U256 => 256,
        }
    }

    /// Width in bytes.
    pub const fn width_bytes(&self) -> usize {
        (self.width_bits() / 8) as usize
    }

    /// The smallest width that holds every value of the universe `[1, n]`.
    pub fn for_universe(universe: &Universe) -> Self {
        match universe {
            Universe::Bounded(n) if *n <= u32::MAX as u128 => SymbolKind::U32,
            Universe::Bounded(n) if *n <= u64::MAX as u128 => SymbolKind::U64,
            _ => SymbolKind::U256,
        }
    }

    /// The zero symbol of this width.
    pub const fn zero(&self) -> Symbol {
        match self {
            SymbolKind::U32 => Symbol::U32(0),
            SymbolKind::U64 => Symbol::U64(0),
            SymbolKind::U256 => Symbol::U256([0u8; 32]),
        }
    }
}

/// The element domain `[1, n]` both parties agree on at session setup.
///
/// `Unbounded` stands for domains wider than 128 bits (such as raw 256-bit
/// hashes). It forces the cryptographic hasher and is rejected by mappings
/// that need a concrete size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Universe {
    /// A concrete domain `[1, n]`.
    Bounded(u128),
    /// A domain too wide to enumerate (treated as effectively infinite).
    Unbounded,
}

impl Universe {
    /// The bound `n`, if one exists.
    pub const fn bound(&self) -> Option<u128> {
        match self {
            Universe::Bounded(n) => Some(*n),
            Universe::Unbounded => None,
        }
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Universe::Bounded(n) => write!(f, "[1, {}]", n),
            Universe::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// A fixed-width unsigned value with XOR and a byte view.
///
/// Symbols are immutable: every operation returns a new value. XOR between
/// mismatched widths zero-extends the narrower side and returns the wider
/// width; well-formed sessions never mix widths, the widening only keeps the
/// algebra total.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    U32(u32),
    U64(u64),
    U256([u8; 32]),
}

impl Symbol {
    /// The width of this symbol.
    pub const fn kind(&self) -> SymbolKind {
        match self {
            Symbol::U32(_) => SymbolKind::U32,
            Symbol::U64(_) => SymbolKind::U64,
            Symbol::U256(_) => SymbolKind::U256,
        }
    }

    /// Construct a symbol of the given width from a small value.
    pub fn from_u64(kind: SymbolKind, value: u64) -> Self {
        match kind {
            SymbolKind::U32 => Symbol::U32(value as u32),
            SymbolKind::U64 => Symbol::U64(value),
            SymbolKind::U256 => {
                let mut bytes = [0u8; 32];
                bytes[24..].copy_from_slice(&value.to_be_bytes());
                Symbol::U256(bytes)
            }
        }
    }

    /// Construct a symbol of the given width from a `u128` value.
    ///
    /// Truncates when the value exceeds the width; callers size the width
    /// from the universe, so in practice it never does.
    pub fn from_u128(kind: SymbolKind, value: u128) -> Self {
        match kind {
            SymbolKind::U32 => Symbol::U32(value as u32),
            SymbolKind::U64 => Symbol::U64(value as u64),
            SymbolKind::U256 => {
                let mut bytes = [0u8; 32];
                bytes[16..].copy_from_slice(&value.to_be_bytes());
                Symbol::U256(bytes)
            }
        }
    }

    /// XOR with another symbol.
    pub fn xor(self, other: Symbol) -> Symbol {
        match (self, other) {
            (Symbol::U32(a), Symbol::U32(b)) => Symbol::U32(a ^ b),
            (Symbol::U64(a), Symbol::U64(b)) => Symbol::U64(a ^ b),
            (Symbol::U256(a), Symbol::U256(b)) => {
                let mut out = [0u8; 32];
                for (i, byte) in out.iter_mut().enumerate() {
                    *byte = a[i] ^ b[i];
                }
                Symbol::U256(out)
            }
            // Mixed widths: zero-extend to the wider side.
            (a, b) => {
                let (wide, narrow) = if a.kind().width_bits() >= b.kind().width_bits() {
                    (a, b)
                } else {
                    (b, a)
                };
                let widened = Symbol::widen(narrow, wide.kind());
                wide.xor(widened)
            }
        }
    }

    fn widen(narrow: Symbol, kind: SymbolKind) -> Symbol {
        match narrow {
            Symbol::U32(v) => Symbol::from_u64(kind, v as u64),
            Symbol::U64(v) => Symbol::from_u64(kind, v),
            Symbol::U256(_) => narrow,
        }
    }

    /// Whether this is the zero value of its width.
    pub fn is_zero(&self) -> bool {
        match self {
            Symbol::U32(v) => *v == 0,
            Symbol::U64(v) => *v == 0,
            Symbol::U256(bytes) => bytes.iter().all(|b| *b == 0),
        }
    }

    /// Full-width big-endian byte view.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            Symbol::U32(v) => v.to_be_bytes().to_vec(),
            Symbol::U64(v) => v.to_be_bytes().to_vec(),
            Symbol::U256(bytes) => bytes.to_vec(),
        }
    }

    /// Minimal big-endian byte view: no leading zero bytes, empty for zero.
    pub fn to_be_bytes_min(&self) -> Vec<u8> {
        let full = self.to_be_bytes();
        let start = full.iter().position(|b| *b != 0).unwrap_or(full.len());
        full[start..].to_vec()
    }

    /// Rebuild a symbol of the given width from its minimal big-endian bytes.
    ///
    /// Returns `None` when the byte string is longer than the width allows.
    pub fn from_be_bytes_min(kind: SymbolKind, bytes: &[u8]) -> Option<Self> {
        if bytes.len() > kind.width_bytes() {
            return None;
        }
        match kind {
            SymbolKind::U32 => {
                let mut buf = [0u8; 4];
                buf[4 - bytes.len()..].copy_from_slice(bytes);
                Some(Symbol::U32(u32::from_be_bytes(buf)))
            }
            SymbolKind::U64 => {
                let mut buf = [0u8; 8];
                buf[8 - bytes.len()..].copy_from_slice(bytes);
                Some(Symbol::U64(u64::from_be_bytes(buf)))
            }
            SymbolKind::U256 => {
                let mut buf = [0u8; 32];
                buf[32 - bytes.len()..].copy_from_slice(bytes);
                Some(Symbol::U256(buf))
            }
        }
    }

    /// The value as a `u128`, if it fits.
    pub fn to_u128(&self) -> Option<u128> {
        match self {
            Symbol::U32(v) => Some(*v as u128),
            Symbol::U64(v) => Some(*v as u128),
            Symbol::U256(bytes) => {
                if bytes[..16].iter().any(|b| *b != 0) {
                    return None;
                }
                let mut buf = [0u8; 16];
                buf.copy_from_slice(&bytes[16..]);
                Some(u128::from_be_bytes(buf))
            }
        }
    }

    /// Full-width remainder modulo a nonzero `u64`.
    ///
    /// Works for every width by chunked big-endian reduction.
    pub fn mod_u64(&self, modulus: u64) -> u64 {
        debug_assert!(modulus != 0);
        match self {
            Symbol::U32(v) => (*v as u64) % modulus,
            Symbol::U64(v) => *v % modulus,
            Symbol::U256(bytes) => {
                let m = modulus as u128;
                let mut rem: u128 = 0;
                for byte in bytes {
                    rem = ((rem << 8) | *byte as u128) % m;
                }
                rem as u64
            }
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::U32(v) => write!(f, "Symbol::U32({})", v),
            Symbol::U64(v) => write!(f, "Symbol::U64({})", v),
            Symbol::U256(bytes) => write!(f, "Symbol::U256({})", &hex::encode(bytes)[..16]),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::U32(v) => write!(f, "{}", v),
            Symbol::U64(v) => write!(f, "{}", v),
            Symbol::U256(bytes) => write!(f, "{}", &hex::encode(bytes)[..16]),
        }
    }
}
