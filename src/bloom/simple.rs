//! In-process bloom filter
//!
//! Bit vector sized from the expected insertion count and false-positive
//! probability; bit positions come from double hashing a SHA-256 digest.
//!
//! ```rust
//! use dedup_core::bloom::{BloomFilter, SimpleBloomFilter};
//!
//! # tokio_test::block_on(async {
//! let filter = SimpleBloomFilter::new("users", 1_000, 0.01);
//! filter.add("user:42").await.unwrap();
//! assert!(filter.contains("user:42").await.unwrap());
//! # });
//! ```

use super::BloomFilter;
use crate::store::StoreResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::f64::consts::LN_2;

#[derive(Debug)]
pub struct SimpleBloomFilter {
    name: String,
    bits: RwLock<Vec<u64>>,
    num_bits: u64,
    num_hashes: u32,
}

impl SimpleBloomFilter {
    pub fn new(name: impl Into<String>, expected_insertions: u64, false_probability: f64) -> Self {
        let n = expected_insertions.max(1) as f64;
        let p = false_probability.clamp(f64::MIN_POSITIVE, 0.999_999);

        let num_bits = ((-n * p.ln()) / (LN_2 * LN_2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * LN_2).round().max(1.0) as u32;
        let words = num_bits.div_ceil(64) as usize;

        Self {
            name: name.into(),
            bits: RwLock::new(vec![0; words]),
            num_bits,
            num_hashes,
        }
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    fn positions(&self, key: &str) -> impl Iterator<Item = u64> {
        let digest = Sha256::digest(key.as_bytes());
        let mut h1 = [0u8; 8];
        let mut h2 = [0u8; 8];
        h1.copy_from_slice(&digest[0..8]);
        h2.copy_from_slice(&digest[8..16]);
        let h1 = u64::from_le_bytes(h1);
        // Odd step so positions never collapse onto one slot
        let h2 = u64::from_le_bytes(h2) | 1;
        let num_bits = self.num_bits;

        (0..u64::from(self.num_hashes))
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % num_bits)
    }

    fn contains_sync(&self, key: &str) -> bool {
        let bits = self.bits.read();
        self.positions(key)
            .all(|pos| bits[(pos / 64) as usize] & (1 << (pos % 64)) != 0)
    }

    fn add_sync(&self, key: &str) -> bool {
        let mut bits = self.bits.write();
        let mut changed = false;
        for pos in self.positions(key) {
            let word = &mut bits[(pos / 64) as usize];
            let mask = 1 << (pos % 64);
            if *word & mask == 0 {
                *word |= mask;
                changed = true;
            }
        }
        changed
    }
}

#[async_trait]
impl BloomFilter for SimpleBloomFilter {
    async fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.contains_sync(key))
    }

    async fn add(&self, key: &str) -> StoreResult<bool> {
        Ok(self.add_sync(key))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_follows_parameters() {
        let filter = SimpleBloomFilter::new("f", 64, 0.03);
        // m = -n ln p / ln2^2 ~ 467 bits, k ~ 5
        assert!(filter.num_bits() >= 460 && filter.num_bits() <= 470);
        assert_eq!(filter.num_hashes(), 5);
    }

    #[tokio::test]
    async fn test_added_keys_are_contained() {
        let filter = SimpleBloomFilter::new("f", 64, 0.03);
        assert!(!filter.contains("user:1").await.unwrap());
        assert!(filter.add("user:1").await.unwrap());
        assert!(filter.contains("user:1").await.unwrap());
        // Re-adding changes no bits
        assert!(!filter.add("user:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_false_positive_rate_is_bounded() {
        let filter = SimpleBloomFilter::new("f", 1000, 0.01);
        for i in 0..1000 {
            filter.add(&format!("present:{i}")).await.unwrap();
        }
        let mut false_positives = 0;
        for i in 0..10_000 {
            if filter.contains(&format!("absent:{i}")).await.unwrap() {
                false_positives += 1;
            }
        }
        // Generous bound over the configured 1%
        assert!(false_positives < 500, "false positives: {false_positives}");
    }
}
