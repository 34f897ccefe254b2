//! Decorrelated jitter backoff.
//!
//! Delays are drawn so that their median follows an exponential curve
//! starting at the configured first delay, while consecutive delays stay
//! uncorrelated. Concurrent callers that fail together do not retry
//! together.

use rand::Rng;
use std::time::Duration;

/// Upper bound for any single delay.
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

const P_FACTOR: f64 = 4.0;
const RP_SCALING_FACTOR: f64 = 1.0 / 1.4;

/// Returns `retry_count` delays with median first delay `median_first_delay`.
///
/// # Example
///
/// ```
/// use rampart_middleware::backoff::{decorrelated_jitter, MAX_DELAY};
/// use std::time::Duration;
///
/// let delays = decorrelated_jitter(Duration::from_millis(200), 3, &mut rand::rng());
/// assert_eq!(delays.len(), 3);
/// assert!(delays.iter().all(|d| *d <= MAX_DELAY));
/// ```
pub fn decorrelated_jitter<R: Rng + ?Sized>(
    median_first_delay: Duration,
    retry_count: u32,
    rng: &mut R,
) -> Vec<Duration> {
    let scale = median_first_delay.as_secs_f64() * RP_SCALING_FACTOR;
    let cap = MAX_DELAY.as_secs_f64();

    let mut delays = Vec::with_capacity(retry_count as usize);
    let mut prev = 0.0_f64;

    for attempt in 0..retry_count {
        let t = f64::from(attempt) + rng.random::<f64>();
        let next = t.exp2() * (P_FACTOR * t).sqrt().tanh();
        let secs = ((next - prev) * scale).clamp(0.0, cap);
        delays.push(Duration::from_secs_f64(secs));
        prev = next;
    }

    delays
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_count_matches_retry_count() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(decorrelated_jitter(Duration::from_millis(200), 5, &mut rng).len(), 5);
        assert!(decorrelated_jitter(Duration::from_millis(200), 0, &mut rng).is_empty());
    }

    #[test]
    fn test_seeded_sequences_repeat() {
        let a = decorrelated_jitter(Duration::from_millis(200), 4, &mut StdRng::seed_from_u64(42));
        let b = decorrelated_jitter(Duration::from_millis(200), 4, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_delays_are_capped() {
        let mut rng = StdRng::seed_from_u64(1);
        let delays = decorrelated_jitter(Duration::from_secs(3600), 40, &mut rng);
        assert!(delays.iter().all(|d| *d <= MAX_DELAY));
        assert_eq!(*delays.last().unwrap(), MAX_DELAY);
    }

    #[test]
    fn test_median_first_delay_is_near_seed() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut firsts: Vec<Duration> = (0..1001)
            .map(|_| decorrelated_jitter(Duration::from_millis(1000), 1, &mut rng)[0])
            .collect();
        firsts.sort();
        let median = firsts[500];
        assert!(
            median > Duration::from_millis(700) && median < Duration::from_millis(1300),
            "median {median:?}"
        );
    }

    #[test]
    fn test_median_delay_doubles_per_attempt() {
        let mut rng = StdRng::seed_from_u64(2001);
        let runs = 2001;
        let mut samples = vec![Vec::with_capacity(runs); 5];
        for _ in 0..runs {
            let delays = decorrelated_jitter(Duration::from_secs(1), 5, &mut rng);
            for (attempt, delay) in delays.into_iter().enumerate() {
                samples[attempt].push(delay.as_secs_f64());
            }
        }
        let medians: Vec<f64> = samples
            .iter_mut()
            .map(|s| {
                s.sort_by(f64::total_cmp);
                s[runs / 2]
            })
            .collect();

        assert!(medians[1] > medians[0], "medians {medians:?}");
        for pair in medians[1..].windows(2) {
            let ratio = pair[1] / pair[0];
            assert!((1.5..2.6).contains(&ratio), "medians {medians:?}");
        }
    }

    #[test]
    fn test_delays_grow_on_average() {
        let mut rng = StdRng::seed_from_u64(99);
        let runs = 500;
        let mut totals = [0.0_f64; 4];
        for _ in 0..runs {
            for (total, delay) in totals
                .iter_mut()
                .zip(decorrelated_jitter(Duration::from_millis(100), 4, &mut rng))
            {
                *total += delay.as_secs_f64();
            }
        }
        assert!(totals[0] < totals[3]);
    }
}
