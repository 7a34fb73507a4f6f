//! Crash-deadline distribution.
//!
//! A round's crash time is drawn once, before it starts rising, from a table
//! of buckets. A single `u ~ U(0, 1)` picks the first bucket whose `upper`
//! bound exceeds it; the deadline is then uniform over that bucket's range.

use crate::{
    error::ConfigError,
    timers::Millis,
};
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeadlineBucket {
    /// Exclusive upper bound on `u`; the last bucket must reach 1.0.
    pub upper: f64,
    pub min_ms: Millis,
    pub max_ms: Millis,
}

impl DeadlineBucket {
    pub const fn new(upper: f64, min_ms: Millis, max_ms: Millis) -> Self {
        Self {
            upper,
            min_ms,
            max_ms,
        }
    }
}

pub fn default_buckets() -> Vec<DeadlineBucket> {
    vec![
        DeadlineBucket::new(0.05, 100, 1_000),
        DeadlineBucket::new(0.35, 800, 2_000),
        DeadlineBucket::new(0.75, 2_000, 5_000),
        DeadlineBucket::new(1.0, 5_000, 8_000),
    ]
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeadlineDraw {
    pub bucket: usize,
    pub deadline_ms: Millis,
}

pub fn validate_buckets(buckets: &[DeadlineBucket]) -> Result<(), ConfigError> {
    let Some(last) = buckets.last() else {
        return Err(ConfigError::Invalid(String::from(
            "crash.deadline_buckets must not be empty",
        )));
    };
    let mut lower = 0.0;
    for (idx, bucket) in buckets.iter().enumerate() {
        if !(bucket.upper > lower) {
            return Err(ConfigError::Invalid(format!(
                "deadline bucket {idx} upper bound {} is not above {lower}",
                bucket.upper
            )));
        }
        if bucket.min_ms > bucket.max_ms {
            return Err(ConfigError::Invalid(format!(
                "deadline bucket {idx} range is inverted (min={}, max={})",
                bucket.min_ms, bucket.max_ms
            )));
        }
        lower = bucket.upper;
    }
    if last.upper < 1.0 {
        return Err(ConfigError::Invalid(format!(
            "deadline buckets end at {} instead of 1.0",
            last.upper
        )));
    }
    Ok(())
}

/// Samples a crash deadline. An empty table yields a zero deadline.
pub fn sample_deadline<R: Rng + ?Sized>(buckets: &[DeadlineBucket], rng: &mut R) -> DeadlineDraw {
    let u: f64 = rng.random();
    let bucket = buckets
        .iter()
        .position(|bucket| u < bucket.upper)
        .unwrap_or(buckets.len().saturating_sub(1));
    let Some(&DeadlineBucket { min_ms, max_ms, .. }) = buckets.get(bucket) else {
        return DeadlineDraw {
            bucket: 0,
            deadline_ms: 0,
        };
    };
    let span = (max_ms - min_ms) as f64;
    let deadline_ms = min_ms + (rng.random::<f64>() * span).floor() as Millis;
    DeadlineDraw {
        bucket,
        deadline_ms,
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    #[test]
    fn sut__when_sampling_many_deadlines_then_bucket_frequencies_match_table() {
        // given
        let buckets = default_buckets();
        let mut rng = StdRng::seed_from_u64(0xC4A5);
        let draws = 100_000;
        let mut counts = [0usize; 4];

        // when
        for _ in 0..draws {
            let draw = sample_deadline(&buckets, &mut rng);
            let bucket = buckets[draw.bucket];
            assert!(draw.deadline_ms >= bucket.min_ms && draw.deadline_ms < bucket.max_ms);
            counts[draw.bucket] += 1;
        }

        // then
        let expected = [0.05, 0.30, 0.40, 0.25];
        for (count, want) in counts.iter().zip(expected) {
            let got = *count as f64 / draws as f64;
            assert!((got - want).abs() < 0.01, "frequency {got} too far from {want}");
        }
    }

    #[test]
    fn sut__when_buckets_do_not_reach_one_then_validation_fails() {
        let buckets = vec![DeadlineBucket::new(0.5, 100, 200)];
        assert!(validate_buckets(&buckets).is_err());
    }

    #[test]
    fn sut__when_bounds_are_not_increasing_then_validation_fails() {
        let buckets = vec![
            DeadlineBucket::new(0.6, 100, 200),
            DeadlineBucket::new(0.4, 100, 200),
            DeadlineBucket::new(1.0, 100, 200),
        ];
        assert!(validate_buckets(&buckets).is_err());
        assert!(validate_buckets(&default_buckets()).is_ok());
    }

    #[test]
    fn sut__when_range_is_degenerate_then_deadline_is_its_minimum() {
        let buckets = vec![DeadlineBucket::new(1.0, 700, 700)];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_deadline(&buckets, &mut rng).deadline_ms, 700);
    }
}
