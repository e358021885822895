//! Hash mixing for addresses.
//!
//! Addresses use 31-bit non-negative hashes built with Bernstein's xor
//! variant: `h' = (h * 33) ^ unit`, keeping the low 31 bits.

/// Mask applied to every mixed hash; results always fit in 31 bits.
pub const HASH_MASK: u32 = 0x7FFF_FFFF;

/// Fold one unit (a byte or a previous hash) into a running hash.
#[inline]
pub fn mix(prev: u32, unit: u32) -> u32 {
    HASH_MASK & (prev.wrapping_mul(33) ^ unit)
}

/// Hash a byte sequence by folding `mix` over it from 0.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |h, &b| mix(h, u32::from(b)))
}
