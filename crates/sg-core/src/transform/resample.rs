//! Period sums, cumulative traces and fixed-width resampling

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::TransformError;
use crate::series::{DrawStyle, Item, Series, SeriesStyle};

/// Sum of the values dated within `[start, end]`
pub fn sum_over_period(series: &Series, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    series
        .extract_sub_series(start, end)
        .iter()
        .filter_map(|item| item.value.filter(|v| !v.is_nan()))
        .sum()
}

/// Sorted items that carry a usable value
fn valued_items(series: &Series) -> Vec<Item> {
    let mut items: Vec<Item> = series.items().iter().filter(|i| i.has_value()).cloned().collect();
    items.sort_by_key(|item| item.date);
    items
}

fn step_style(series: &Series) -> SeriesStyle {
    SeriesStyle {
        draw: DrawStyle::Step,
        ..series.style()
    }
}

/// Running sum of a series' values, e.g. rain gauge tips into a cumulative trace
pub fn cumulate(series: &Series) -> Result<Series, TransformError> {
    let items = valued_items(series);
    if items.is_empty() {
        return Err(TransformError::NotEnoughItems {
            series: series.name().to_string(),
            required: 1,
            actual: 0,
        });
    }

    let mut total = 0.0;
    let cumulated = items
        .iter()
        .map(|item| {
            total += item.value.unwrap_or(0.0);
            Item::new(item.last_date(), total)
        })
        .collect();

    let mut result = series
        .derived(format!("{} (cumul)", series.name()), series.series_type().clone())
        .with_min_max(false);
    result.set_items(cumulated, "cumulate")?;
    Ok(result)
}

/// Turn a cumulative series into per-bucket deltas.
///
/// Buckets are `bucket` wide and start at the first item's date. The delta
/// between two consecutive items is counted in the bucket of the later one.
/// Each bucket is emitted as two items, at its start and at its end, both
/// carrying the bucket total, which draws as a step.
pub fn resample(series: &Series, bucket: Duration) -> Result<Series, TransformError> {
    if bucket <= Duration::zero() {
        return Err(TransformError::InvalidBucket);
    }
    let items = valued_items(series);
    if items.len() < 2 {
        return Err(TransformError::NotEnoughItems {
            series: series.name().to_string(),
            required: 2,
            actual: items.len(),
        });
    }

    let mut bucket_start = items[0].date;
    let mut accumulated = 0.0;
    let mut output = Vec::new();

    for pair in items.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        while current.date >= bucket_start + bucket {
            output.push(Item::new(bucket_start, accumulated));
            output.push(Item::new(bucket_start + bucket, accumulated));
            bucket_start = bucket_start + bucket;
            accumulated = 0.0;
        }
        accumulated += current.value.unwrap_or(0.0) - previous.value.unwrap_or(0.0);
    }
    output.push(Item::new(bucket_start, accumulated));
    output.push(Item::new(bucket_start + bucket, accumulated));

    let label = match bucket.to_std() {
        Ok(std) => humantime::format_duration(std).to_string(),
        Err(_) => format!("{}s", bucket.num_seconds()),
    };
    let bucket_count = output.len() / 2;
    let mut result = series
        .derived(format!("{} ({})", series.name(), label), series.series_type().clone())
        .with_min_max(false)
        .with_style(step_style(series));
    result.set_items(output, "resample")?;

    info!(
        "Resampled '{}' into {} buckets of {}",
        series.name(),
        bucket_count,
        label
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WATER;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn water(points: &[(i64, f64)]) -> Series {
        let mut series = Series::new("pluvio", WATER.clone());
        for (t, v) in points {
            series.add_item(Item::new(at(*t), *v)).unwrap();
        }
        series
    }

    fn pairs(series: &Series) -> Vec<(i64, f64)> {
        series
            .items()
            .iter()
            .map(|i| (i.date.timestamp() - 1_600_000_000, i.value.unwrap()))
            .collect()
    }

    #[test]
    fn test_resample_example_buckets() {
        let series = water(&[(0, 0.0), (30, 5.0), (90, 5.0), (150, 20.0)]);
        let resampled = resample(&series, Duration::seconds(60)).unwrap();
        assert_eq!(
            pairs(&resampled),
            vec![
                (0, 5.0),
                (60, 5.0),
                (60, 0.0),
                (120, 0.0),
                (120, 15.0),
                (180, 15.0),
            ]
        );
        assert_eq!(resampled.style().draw, DrawStyle::Step);
        assert_eq!(resampled.undo_name(), Some("resample"));
    }

    #[test]
    fn test_resample_emits_empty_buckets_in_gaps() {
        let series = water(&[(0, 0.0), (10, 1.0), (250, 4.0)]);
        let resampled = resample(&series, Duration::seconds(60)).unwrap();
        let totals: Vec<_> = resampled.items().iter().step_by(2).map(|i| i.value.unwrap()).collect();
        assert_eq!(totals, vec![1.0, 0.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_resample_preserves_total() {
        let series = water(&[(0, 0.0), (40, 2.0), (70, 2.5), (200, 7.5), (260, 9.0)]);
        let resampled = resample(&series, Duration::seconds(60)).unwrap();
        let total: f64 = resampled.items().iter().step_by(2).map(|i| i.value.unwrap()).sum();
        assert!((total - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_resample_rejects_bad_input() {
        let single = water(&[(0, 1.0)]);
        assert!(matches!(
            resample(&single, Duration::seconds(60)),
            Err(TransformError::NotEnoughItems { required: 2, actual: 1, .. })
        ));
        let series = water(&[(0, 0.0), (60, 1.0)]);
        assert_eq!(
            resample(&series, Duration::zero()).unwrap_err(),
            TransformError::InvalidBucket
        );
    }

    #[test]
    fn test_cumulate_running_sum() {
        let series = water(&[(60, 0.2), (0, 0.2), (120, 0.4)]);
        let cumulated = cumulate(&series).unwrap();
        let points = pairs(&cumulated);
        let dates: Vec<_> = points.iter().map(|(t, _)| *t).collect();
        assert_eq!(dates, vec![0, 60, 120]);
        for ((_, got), expected) in points.iter().zip([0.2, 0.4, 0.8]) {
            assert!((got - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sum_over_period_is_pure() {
        let series = water(&[(0, 0.2), (60, 0.4), (120, 0.6)]);
        let sum = sum_over_period(&series, at(0), at(60));
        assert!((sum - 0.6).abs() < 1e-12);
        assert!(!series.can_undo());
    }
}
