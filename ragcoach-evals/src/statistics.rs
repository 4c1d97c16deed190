// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Descriptive statistics over one metric's scores
//!
//! Quartiles use the exclusive method (`n + 1` spacing), so for very small
//! samples q25/q75 may fall outside `[min, max]`.

use ragcoach_core::MetricStatistics;

const LOW_BAND: f64 = 0.5;
const HIGH_BAND: f64 = 0.7;

/// Summarize `scores`. Returns `None` for an empty slice.
pub fn calculate_statistics(scores: &[f64]) -> Option<MetricStatistics> {
    if scores.is_empty() {
        return None;
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let (q25, q75) = if sorted.len() > 1 {
        (
            exclusive_quantile(&sorted, 1, 4),
            exclusive_quantile(&sorted, 3, 4),
        )
    } else {
        (sorted[0], sorted[0])
    };

    let count_below_50 = scores.iter().filter(|s| **s < LOW_BAND).count();
    let count_50_to_70 = scores
        .iter()
        .filter(|s| (LOW_BAND..=HIGH_BAND).contains(*s))
        .count();
    let count_above_70 = scores.iter().filter(|s| **s > HIGH_BAND).count();
    let n = scores.len() as f64;

    Some(MetricStatistics {
        mean: mean(scores),
        std_dev: sample_std_dev(scores),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median: median(&sorted),
        q25,
        q75,
        count_below_50,
        count_50_to_70,
        count_above_70,
        percent_below_50: round2(count_below_50 as f64 / n * 100.0),
        percent_50_to_70: round2(count_50_to_70 as f64 / n * 100.0),
        percent_above_70: round2(count_above_70 as f64 / n * 100.0),
    })
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0.0 below two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// The `i`-th of `n - 1` cut points dividing `sorted` into `n` groups.
///
/// Needs at least two values; positions outside the data extrapolate
/// linearly from the two nearest points.
fn exclusive_quantile(sorted: &[f64], i: usize, n: usize) -> f64 {
    let len = sorted.len();
    let m = len + 1;
    let j = (i * m / n).clamp(1, len - 1);
    let delta = (i * m) as f64 - (j * n) as f64;
    (sorted[j - 1] * (n as f64 - delta) + sorted[j] * delta) / n as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_two_scores() {
        let stats = calculate_statistics(&[0.8, 0.3]).unwrap();

        assert!(approx(stats.mean, 0.55));
        assert!(approx(stats.median, 0.55));
        assert_eq!(stats.min, 0.3);
        assert_eq!(stats.max, 0.8);
        assert!(approx(stats.std_dev, 0.125f64.sqrt()));
        assert!(approx(stats.q25, 0.175));
        assert!(approx(stats.q75, 0.925));
        assert_eq!(stats.count_below_50, 1);
        assert_eq!(stats.count_50_to_70, 0);
        assert_eq!(stats.count_above_70, 1);
        assert_eq!(stats.percent_below_50, 50.0);
        assert_eq!(stats.percent_above_70, 50.0);
    }

    #[test]
    fn test_single_score() {
        let stats = calculate_statistics(&[0.6]).unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.q25, 0.6);
        assert_eq!(stats.q75, 0.6);
        assert_eq!(stats.median, 0.6);
        assert_eq!(stats.count_50_to_70, 1);
        assert_eq!(stats.percent_50_to_70, 100.0);
    }

    #[test]
    fn test_band_edges_are_inclusive_middle() {
        let stats = calculate_statistics(&[0.5, 0.7, 0.49, 0.71]).unwrap();
        assert_eq!(stats.count_below_50, 1);
        assert_eq!(stats.count_50_to_70, 2);
        assert_eq!(stats.count_above_70, 1);
    }

    #[test]
    fn test_quartiles_of_larger_sample() {
        // 1..=7: exclusive quartiles land on 2 and 6
        let values: Vec<f64> = (1..=7).map(|v| v as f64).collect();
        let stats = calculate_statistics(&values).unwrap();
        assert!(approx(stats.q25, 2.0));
        assert!(approx(stats.q75, 6.0));
        assert!(approx(stats.median, 4.0));
    }

    #[test]
    fn test_percent_rounding() {
        let stats = calculate_statistics(&[0.1, 0.9, 0.9]).unwrap();
        assert_eq!(stats.percent_below_50, 33.33);
        assert_eq!(stats.percent_above_70, 66.67);
    }

    #[test]
    fn test_empty_is_none() {
        assert!(calculate_statistics(&[]).is_none());
    }

    proptest! {
        #[test]
        fn prop_bands_partition_scores(scores in prop::collection::vec(0.0f64..=1.0, 1..50)) {
            let stats = calculate_statistics(&scores).unwrap();
            prop_assert_eq!(
                stats.count_below_50 + stats.count_50_to_70 + stats.count_above_70,
                scores.len()
            );
            prop_assert!(stats.min <= stats.median && stats.median <= stats.max);
            prop_assert!(stats.mean >= stats.min - 1e-12 && stats.mean <= stats.max + 1e-12);
            prop_assert!(stats.std_dev >= 0.0);

            let percent_sum =
                stats.percent_below_50 + stats.percent_50_to_70 + stats.percent_above_70;
            prop_assert!((percent_sum - 100.0).abs() <= 0.02, "percent sum {}", percent_sum);
        }
    }
}
