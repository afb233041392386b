//! Corrective and derived computations over series
//!
//! Transforms that change a series commit through [`Series::set_items`]
//! (or its grouped variant) so that each of them can be undone. Transforms
//! that derive a new series return it detached; the caller registers it.
//!
//! [`Series::set_items`]: crate::series::Series::set_items

use chrono::Duration;

use crate::series::Item;

pub mod correlate;
pub mod offset;
pub mod resample;
pub mod water_height;

pub use correlate::{mean_offset, recalibrate, recalibrate_against};
pub use offset::{apply_offset, limit, offset_items, OffsetUnit};
pub use resample::{cumulate, resample, sum_over_period};
pub use water_height::{water_height, water_height_multiplier, DEFAULT_MULTIPLIER};

/// Maximum distance between two items considered simultaneous
pub fn default_tolerance() -> Duration {
    Duration::minutes(3)
}

/// Pair items of two date-sorted sequences.
///
/// For each reference item the target is scanned forward from where the
/// previous scan stopped:
/// - a target item more than `tolerance` before the reference item can never
///   match again and is dropped;
/// - a target item more than `tolerance` after it ends the scan for this
///   reference item;
/// - otherwise the two are paired and the target item is consumed.
///
/// Each target item is used at most once, so the pair count never exceeds
/// `min(reference.len(), target.len())`.
pub fn match_items<'a>(
    reference: &'a [Item],
    target: &'a [Item],
    tolerance: Duration,
) -> Vec<(&'a Item, &'a Item)> {
    let mut pairs = Vec::new();
    let mut next = 0;
    for r in reference {
        while let Some(t) = target.get(next) {
            if t.date < r.date - tolerance {
                next += 1;
                continue;
            }
            if t.date > r.date + tolerance {
                break;
            }
            pairs.push((r, t));
            next += 1;
            break;
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn items(points: &[(i64, f64)]) -> Vec<Item> {
        points.iter().map(|(t, v)| Item::new(at(*t), *v)).collect()
    }

    #[test]
    fn test_match_within_tolerance() {
        let r = items(&[(0, 10.0), (60, 12.0)]);
        let s = items(&[(5, 11.0), (65, 13.0)]);
        let pairs = match_items(&r, &s, default_tolerance());
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.value, Some(11.0));
        assert_eq!(pairs[1].1.value, Some(13.0));
    }

    #[test]
    fn test_early_targets_are_dropped() {
        let r = items(&[(1000, 1.0)]);
        let s = items(&[(0, 1.0), (100, 1.0), (990, 2.0)]);
        let pairs = match_items(&r, &s, default_tolerance());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1.date, at(990));
    }

    #[test]
    fn test_late_target_stops_scan() {
        let r = items(&[(0, 1.0), (1000, 1.0)]);
        let s = items(&[(900, 2.0)]);
        let pairs = match_items(&r, &s, default_tolerance());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.date, at(1000));
    }

    #[test]
    fn test_target_used_once() {
        let r = items(&[(0, 1.0), (10, 1.0), (20, 1.0)]);
        let s = items(&[(5, 2.0)]);
        assert_eq!(match_items(&r, &s, default_tolerance()).len(), 1);
    }
}
