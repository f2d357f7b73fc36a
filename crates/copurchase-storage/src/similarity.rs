//! Dense vector similarity primitives.
//!
//! Shared by the store backends (nearest-neighbor scans) and by the scoring
//! layer (diversity checks). All functions operate on `&[f32]` slices so
//! callers can pass either owned vectors or store-resident slices.

use crate::error::{StoreError, StoreResult};

/// Calculate the L2 norm (magnitude) of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize a vector to unit length in place.
///
/// Does nothing for a zero-magnitude vector (avoids division by zero).
#[inline]
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Internal dot product without validation.
/// Caller must ensure vectors have equal length.
#[inline]
pub(crate) fn dot_product_unchecked(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Calculate cosine similarity between two dense vectors.
///
/// Returns a value in [-1.0, 1.0]: 1.0 means identical direction, 0.0
/// orthogonal, -1.0 opposite.
///
/// # Errors
///
/// - [`StoreError::InvalidVector`] if either vector is empty or has zero
///   magnitude (cosine is undefined)
/// - [`StoreError::DimensionMismatch`] is *not* raised here; length
///   mismatches are the caller's responsibility to contextualize, so this
///   function reports them as an invalid-vector condition
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> StoreResult<f32> {
    if a.is_empty() || b.is_empty() {
        return Err(StoreError::empty_vector());
    }
    if a.len() != b.len() {
        return Err(StoreError::InvalidVector {
            reason: "length mismatch",
        });
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return Err(StoreError::zero_vector());
    }

    let dot = dot_product_unchecked(a, b);
    // Clamp to the valid range to absorb floating point error
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_norm_of_3_4_is_5() {
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_identical_direction_is_one() {
        let sim = cosine_similarity(&[2.0, 2.0], &[4.0, 4.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_invalid() {
        let err = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap_err();
        assert_eq!(err, StoreError::zero_vector());
    }

    #[test]
    fn cosine_empty_vector_is_invalid() {
        assert!(cosine_similarity(&[], &[1.0]).is_err());
    }
}
