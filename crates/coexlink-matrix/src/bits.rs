//! Bit packing over `u64` word slices.
//!
//! Bit `i` lives in word `i / 64` at position `i % 64` (LSB first).

use coexlink_common::{CoexLinkError, Result};

/// Bits held by one storage word.
pub const WORD_BITS: usize = u64::BITS as usize;

/// Number of words needed to hold `bits` bits.
#[inline]
pub fn words_for_bits(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

#[inline]
fn locate(words: &[u64], bit: usize) -> Result<(usize, u64)> {
    let capacity = words.len() * WORD_BITS;
    if bit >= capacity {
        return Err(CoexLinkError::out_of_range("bit", bit, capacity));
    }
    Ok((bit / WORD_BITS, 1u64 << (bit % WORD_BITS)))
}

/// Set bit `bit`. Setting an already-set bit is a no-op.
#[inline]
pub fn set_bit(words: &mut [u64], bit: usize) -> Result<()> {
    let (word, mask) = locate(words, bit)?;
    words[word] |= mask;
    Ok(())
}

#[inline]
pub fn test_bit(words: &[u64], bit: usize) -> Result<bool> {
    let (word, mask) = locate(words, bit)?;
    Ok(words[word] & mask != 0)
}

/// Number of set bits across the slice, one hardware popcount per word.
#[inline]
pub fn pop_count(words: &[u64]) -> u32 {
    words.iter().map(|w| w.count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_for_bits() {
        assert_eq!(words_for_bits(0), 0);
        assert_eq!(words_for_bits(1), 1);
        assert_eq!(words_for_bits(64), 1);
        assert_eq!(words_for_bits(65), 2);
        assert_eq!(words_for_bits(1000), 16);
    }

    #[test]
    fn test_set_and_test_across_word_boundary() {
        let mut words = vec![0u64; 2];
        set_bit(&mut words, 0).unwrap();
        set_bit(&mut words, 63).unwrap();
        set_bit(&mut words, 64).unwrap();
        assert!(test_bit(&words, 0).unwrap());
        assert!(test_bit(&words, 63).unwrap());
        assert!(test_bit(&words, 64).unwrap());
        assert!(!test_bit(&words, 1).unwrap());
        assert!(!test_bit(&words, 127).unwrap());
        assert_eq!(words[0], (1u64 << 63) | 1);
        assert_eq!(words[1], 1);
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut words = vec![0u64; 1];
        set_bit(&mut words, 5).unwrap();
        set_bit(&mut words, 5).unwrap();
        assert_eq!(pop_count(&words), 1);
    }

    #[test]
    fn test_out_of_range() {
        let mut words = vec![0u64; 1];
        assert!(matches!(
            set_bit(&mut words, 64),
            Err(CoexLinkError::IndexOutOfRange { index: 64, len: 64, .. })
        ));
        assert!(test_bit(&words, 100).is_err());
        assert!(set_bit(&mut [], 0).is_err());
    }

    #[test]
    fn test_pop_count() {
        let mut words = vec![0u64; 3];
        for bit in [1, 3, 7, 64, 130, 191] {
            set_bit(&mut words, bit).unwrap();
        }
        assert_eq!(pop_count(&words), 6);
        assert_eq!(pop_count(&[]), 0);
        assert_eq!(pop_count(&[u64::MAX, u64::MAX]), 128);
    }
}
