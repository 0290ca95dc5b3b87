//! Turns a flat `[k0, v0, k1, v1, ...]` sequence into key/value pairs ready
//! for positional binding.

use crate::error::{MirrorError, Result};

/// Pair element `2i` with element `2i + 1`.
///
/// Repeated keys collapse into one pair: the pair keeps the position of the
/// key's first occurrence and the value of its last. A trailing unpaired
/// element is dropped.
pub fn shape_pairs<T: PartialEq>(sequence: Vec<T>) -> Vec<(T, T)> {
    let mut pairs: Vec<(T, T)> = Vec::with_capacity(sequence.len() / 2);
    let mut items = sequence.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => pairs.push((key, value)),
        }
    }
    pairs
}

/// Like [`shape_pairs`], but an odd-length sequence is an error.
pub fn shape_pairs_strict<T: PartialEq>(sequence: Vec<T>) -> Result<Vec<(T, T)>> {
    if sequence.len() % 2 != 0 {
        return Err(MirrorError::Shape {
            len: sequence.len(),
        });
    }
    Ok(shape_pairs(sequence))
}
