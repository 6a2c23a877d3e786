//! crates/baliseboxd_core/src/ratings.rs
//!
//! Pure aggregation over a single party's sparse rating map: the scalar
//! average and the per-step histogram every page renders.
//!
//! Every function here is total over any finite map: malformed or
//! off-scale values are excluded from the computation, never fatal. The
//! UI always gets a number to format.

use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// Rating Scale
//=========================================================================================

/// The bounded scale rating values are interpreted against.
///
/// Stored values follow one convention, the 0.5..=5.0 half-star scale
/// (`RatingScale::HALF_STARS`). The scale is always passed explicitly so
/// a single computed statistic can never mix two conventions; no
/// conversion factor lives inside the aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingScale {
    min: f64,
    max: f64,
    step: f64,
}

/// Upper bound on histogram width; a scale that would need more buckets
/// than this is degenerate, not a real rating convention.
const MAX_BUCKET_COUNT: usize = 1000;

/// Tolerance for deciding a value sits exactly on a step.
const STEP_EPSILON: f64 = 1e-9;

impl RatingScale {
    /// The canonical persisted convention: ten half-star buckets.
    pub const HALF_STARS: RatingScale = RatingScale {
        min: 0.5,
        max: 5.0,
        step: 0.5,
    };

    /// Builds a validated scale. Returns `None` for non-finite bounds, a
    /// non-positive step, or a step so small the histogram would need
    /// more than `MAX_BUCKET_COUNT` buckets.
    pub fn new(min: f64, max: f64, step: f64) -> Option<RatingScale> {
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return None;
        }
        if step <= 0.0 || min <= 0.0 || max < min {
            return None;
        }
        let count = (max / step).round();
        if count < 1.0 || count > MAX_BUCKET_COUNT as f64 {
            return None;
        }
        Some(RatingScale { min, max, step })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Number of histogram buckets on this scale.
    pub fn bucket_count(&self) -> usize {
        (self.max / self.step).round() as usize
    }

    /// The rating value bucket `index` stands for.
    pub fn bucket_value(&self, index: usize) -> f64 {
        (index as f64 + 1.0) * self.step
    }

    /// Maps a raw rating onto its bucket index, or `None` when the value
    /// is malformed or rounds outside the scale. Dropped values never
    /// appear in histogram totals.
    pub fn bucket_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let index = (value / self.step).round() as i64 - 1;
        if index < 0 || index >= self.bucket_count() as i64 {
            return None;
        }
        Some(index as usize)
    }

    /// Whether `value` is exactly a step of this scale. Unlike
    /// `bucket_index`, which rounds to tolerate legacy stored data, this
    /// rejects off-step values, so it is the check write paths use.
    pub fn contains(&self, value: f64) -> bool {
        match self.bucket_index(value) {
            Some(index) => (value - self.bucket_value(index)).abs() < STEP_EPSILON,
            None => false,
        }
    }
}

/// One step of a rating-distribution histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingBucket {
    pub value: f64,
    pub votes: u32,
}

//=========================================================================================
// Aggregation
//=========================================================================================

/// Arithmetic mean of every rating present in the map.
///
/// Users without an entry have not rated and are excluded from the
/// divisor, not counted as zero. An empty (or fully malformed) map
/// yields `0.0`, never NaN, so callers have no missing-value branch.
pub fn average_rating(ratings: &HashMap<Uuid, f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for value in ratings.values() {
        if value.is_finite() {
            sum += value;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// Histogram of the map's ratings: one bucket per scale step, ascending
/// by bucket value regardless of map iteration order. Off-scale entries
/// are dropped, so the vote total equals the number of in-range entries.
pub fn rating_distribution(
    ratings: &HashMap<Uuid, f64>,
    scale: &RatingScale,
) -> Vec<RatingBucket> {
    distribution_of(ratings.values().copied(), scale)
}

/// Histogram over any sequence of raw rating values. Shared by the
/// per-party distribution above and the per-user given-distribution in
/// `user_stats`.
pub fn distribution_of(
    values: impl IntoIterator<Item = f64>,
    scale: &RatingScale,
) -> Vec<RatingBucket> {
    let mut buckets: Vec<RatingBucket> = (0..scale.bucket_count())
        .map(|index| RatingBucket {
            value: scale.bucket_value(index),
            votes: 0,
        })
        .collect();
    for value in values {
        if let Some(index) = scale.bucket_index(value) {
            buckets[index].votes += 1;
        }
    }
    buckets
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn map(values: &[f64]) -> HashMap<Uuid, f64> {
        values.iter().map(|v| (Uuid::new_v4(), *v)).collect()
    }

    #[test]
    fn empty_map_averages_to_zero() {
        assert_eq!(average_rating(&HashMap::new()), 0.0);
    }

    #[test]
    fn empty_map_distribution_has_every_bucket_at_zero_votes() {
        let dist = rating_distribution(&HashMap::new(), &RatingScale::HALF_STARS);
        assert_eq!(dist.len(), 10);
        assert!(dist.iter().all(|bucket| bucket.votes == 0));
    }

    #[test]
    fn average_is_the_arithmetic_mean() {
        assert_eq!(average_rating(&map(&[2.0, 4.0, 3.0])), 3.0);
    }

    #[test]
    fn absent_raters_do_not_dilute_the_average() {
        // A party can have ten participants while only three rated; the
        // divisor is the number of entries, not the roster size.
        assert_eq!(average_rating(&map(&[4.0, 5.0, 3.0])), 4.0);
    }

    #[test]
    fn histogram_votes_sum_to_the_in_range_entry_count() {
        let ratings = map(&[3.0, 8.5]); // 8.5 is off-scale and dropped
        let dist = rating_distribution(&ratings, &RatingScale::HALF_STARS);
        let total: u32 = dist.iter().map(|bucket| bucket.votes).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn buckets_are_strictly_ascending_by_value() {
        let dist = rating_distribution(&map(&[5.0, 0.5, 2.5]), &RatingScale::HALF_STARS);
        for pair in dist.windows(2) {
            assert!(pair[0].value < pair[1].value);
        }
    }

    #[test]
    fn boundary_values_land_in_the_outermost_buckets() {
        let scale = RatingScale::HALF_STARS;
        assert_eq!(scale.bucket_index(0.5), Some(0));
        assert_eq!(scale.bucket_index(5.0), Some(9));
        assert_eq!(scale.bucket_index(0.0), None);
        assert_eq!(scale.bucket_index(5.5), None);
        assert_eq!(scale.bucket_index(-1.0), None);
        assert_eq!(scale.bucket_index(f64::NAN), None);
    }

    #[test]
    fn off_step_values_are_not_valid_ratings() {
        let scale = RatingScale::HALF_STARS;
        assert!(scale.contains(4.5));
        assert!(scale.contains(0.5));
        assert!(scale.contains(5.0));
        // Rounds to a bucket for histogram purposes, but is not itself a
        // half-star step and must not be accepted for writing.
        assert!(!scale.contains(4.7));
        assert!(!scale.contains(0.26));
        assert!(!scale.contains(f64::NAN));
    }

    #[test]
    fn degenerate_scales_are_rejected_at_construction() {
        assert!(RatingScale::new(0.5, 5.0, 0.5).is_some());
        assert!(RatingScale::new(0.5, 5.0, 0.0).is_none());
        assert!(RatingScale::new(0.5, 5.0, -0.5).is_none());
        assert!(RatingScale::new(0.5, 5.0, f64::NAN).is_none());
        assert!(RatingScale::new(0.5, f64::INFINITY, 0.5).is_none());
        // A step this small would need billions of buckets.
        assert!(RatingScale::new(0.5, 5.0, 1e-9).is_none());
        assert!(RatingScale::new(5.0, 0.5, 0.5).is_none());
    }

    #[test]
    fn two_rater_party_scenario() {
        let mut ratings = HashMap::new();
        ratings.insert(Uuid::new_v4(), 4.0);
        ratings.insert(Uuid::new_v4(), 2.0);

        assert_eq!(average_rating(&ratings), 3.0);

        let dist = rating_distribution(&ratings, &RatingScale::HALF_STARS);
        for bucket in &dist {
            let expected = if bucket.value == 2.0 || bucket.value == 4.0 {
                1
            } else {
                0
            };
            assert_eq!(bucket.votes, expected, "bucket {}", bucket.value);
        }
    }

    #[test]
    fn malformed_values_are_excluded_not_fatal() {
        let mut ratings = map(&[3.0]);
        ratings.insert(Uuid::new_v4(), f64::NAN);
        ratings.insert(Uuid::new_v4(), f64::INFINITY);
        assert_eq!(average_rating(&ratings), 3.0);

        let dist = rating_distribution(&ratings, &RatingScale::HALF_STARS);
        let total: u32 = dist.iter().map(|bucket| bucket.votes).sum();
        assert_eq!(total, 1);
    }
}
