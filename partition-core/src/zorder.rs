//! Z-order (Morton) key construction from per-axis bin indices.
//!
//! Bit-interleaves the `d` per-axis bin indices most-significant-bit
//! first, taking axes in order `0..d` within each bit level. The
//! interleave direction matters: axis 0 occupies the highest-order bit
//! at every level, so it dominates which vertices end up near one
//! another in the final ordering. Reproducing byte-identical output
//! against the original coordinate partitioner requires matching this
//! direction exactly (`spec.md` §9).

/// Interleave the `ndims` bin indices of a single vertex (each in
/// `[0, 2^nbits)`, stored consecutively as `bxyz[i * ndims .. i * ndims +
/// ndims]`) into one Z-order key.
///
/// # Panics
///
/// Panics if `bin_indices.len() != ndims`.
pub fn interleave(bin_indices: &[u32], nbits: u32) -> i64 {
    let ndims = bin_indices.len();
    let mut key: i64 = 0;
    for j in (0..nbits).rev() {
        for &bin in bin_indices.iter().take(ndims) {
            let bit = (bin >> j) & 1;
            key = (key << 1) | (bit as i64);
        }
    }
    key
}

/// Compute the Z-order key for every vertex from its flattened,
/// row-major `bxyz` array (`nvtxs * ndims` bin indices).
pub fn interleave_all(bxyz: &[u32], ndims: usize, nbits: u32) -> Vec<i64> {
    assert_eq!(bxyz.len() % ndims, 0, "bxyz length must be a multiple of ndims");
    bxyz.chunks_exact(ndims).map(|coords| interleave(coords, nbits)).collect()
}
