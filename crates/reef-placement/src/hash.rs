//! 32-bit FNV-1a.

const OFFSET_BASIS: u32 = 0x811c_9dc5;
const PRIME: u32 = 0x0100_0193;

/// Hash `data` with 32-bit FNV-1a.
///
/// Matches the reference implementation (and Go's `hash/fnv.New32a`), so ring
/// positions computed here agree with any other FNV-1a client.
pub fn fnv1a_32(data: &[u8]) -> u32 {
    data.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(PRIME)
    })
}
