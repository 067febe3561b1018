//! Hardware entropy
//!
//! The store draws a random chunk index once per mount so that allocation
//! does not keep hammering the same low-numbered chunks.

/// Source of random bytes
///
/// Quality requirements are low: the bytes only spread wear, they are not
/// used for anything security related.
pub trait EntropySource {
    /// Return one random byte
    fn random_byte(&mut self) -> u8;
}

impl<E: EntropySource + ?Sized> EntropySource for &mut E {
    fn random_byte(&mut self) -> u8 {
        (**self).random_byte()
    }
}
