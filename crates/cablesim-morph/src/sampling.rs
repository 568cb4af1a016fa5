// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Counter-based uniform draws.

Draw `i` under seed `s` is a pure function of `(s, i)`: the xxh64 hash of
the little-endian index keyed by the seed, with its top 53 bits scaled into
[0, 1). Any sub-range of draws can be produced independently and in any
order.
*/

use xxhash_rust::xxh64::xxh64;

const SCALE: f64 = 1.0 / (1u64 << 53) as f64;

/// Draw number `index` of the stream selected by `seed`
#[inline]
pub fn draw(seed: u64, index: u64) -> f64 {
    (xxh64(&index.to_le_bytes(), seed) >> 11) as f64 * SCALE
}

/// Draws `left..=right`; empty when `left > right`
pub fn uniform(seed: u64, left: u32, right: u32) -> Vec<f64> {
    if left > right {
        return Vec::new();
    }
    (left..=right).map(|i| draw(seed, i as u64)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_and_determinism() {
        let a = uniform(42, 0, 999);
        assert_eq!(a.len(), 1000);
        assert!(a.iter().all(|&x| (0.0..1.0).contains(&x)));
        assert_eq!(a, uniform(42, 0, 999));
        assert_ne!(a, uniform(43, 0, 999));
    }

    #[test]
    fn test_subranges_are_independent() {
        let full = uniform(7, 10, 29);
        let mut parts = uniform(7, 10, 14);
        parts.extend(uniform(7, 15, 29));
        assert_eq!(full, parts);
        assert_eq!(uniform(7, 20, 20), vec![draw(7, 20)]);
        assert!(uniform(7, 5, 4).is_empty());
    }

    #[test]
    fn test_mean_is_roughly_half() {
        let xs = uniform(1, 0, 9999);
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert!((mean - 0.5).abs() < 0.02);
    }
}
