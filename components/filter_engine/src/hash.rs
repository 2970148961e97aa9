//! Derives the `k` index functions a bit-array slice needs from two
//! independent base hashes, using the Kirsch-Mitzenmacher double-hashing
//! technique (`g_i(x) = h1(x) + i*h2(x) mod m`) instead of running `k`
//! independent hash functions per lookup.

use std::io::Cursor;

/// Returns `k` bit indices into a slice of `num_bits` bits for `key`.
pub fn indices(key: &[u8], num_bits: u64, k: u32) -> Vec<u64> {
    let (h1, h2) = base_hashes(key);
    let mut out = Vec::with_capacity(k as usize);
    let mut combined = h1;
    for _ in 0..k {
        out.push(combined % num_bits);
        combined = combined.wrapping_add(h2);
    }
    out
}

fn base_hashes(key: &[u8]) -> (u64, u64) {
    let h1 = farmhash::fingerprint64(key);
    let h2 = murmur3::murmur3_x64_128(&mut Cursor::new(key), 0)
        .map(|v| v as u64)
        .unwrap_or_else(|_| h1 ^ 0x9e3779b97f4a7c15);
    // Guard against the degenerate case where both hashes collide, which
    // would collapse every g_i to the same bucket.
    if h2 == 0 {
        (h1, h1.rotate_left(17) | 1)
    } else {
        (h1, h2)
    }
}

/// Optimal number of hash functions for a given bits-per-item ratio.
pub fn optimal_k(bits_per_item: f64) -> u32 {
    let k = (bits_per_item * std::f64::consts::LN_2).round() as i64;
    k.clamp(1, 30) as u32
}

/// Optimal bit-array size, in bits, for `capacity` items at `fp_probability`.
pub fn optimal_num_bits(capacity: u64, fp_probability: f64) -> u64 {
    let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
    let bits = -(capacity as f64) * fp_probability.ln() / ln2_sq;
    bits.ceil().max(64.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_within_range_and_deterministic() {
        let a = indices(b"hello", 4096, 7);
        let b = indices(b"hello", 4096, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 7);
        assert!(a.iter().all(|&i| i < 4096));
    }

    #[test]
    fn different_keys_usually_differ() {
        let a = indices(b"hello", 4096, 7);
        let b = indices(b"world", 4096, 7);
        assert_ne!(a, b);
    }

    #[test]
    fn sizing_formulas_are_sane() {
        let bits = optimal_num_bits(100_000, 0.001);
        assert!(bits > 100_000);
        let k = optimal_k(bits as f64 / 100_000.0);
        assert!(k >= 1 && k <= 30);
    }
}
