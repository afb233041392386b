//! Water height derived from the difference between two pressure series

use chrono::Duration;
use tracing::info;

use super::match_items;
use crate::error::TransformError;
use crate::series::{Item, Series};
use crate::types::WATER_HEIGHT;

/// Empirical factor turning a hPa pressure difference into centimetres of water
pub const DEFAULT_MULTIPLIER: f64 = 1.02;

/// Multiplier for a pressure expressed in `unit`, starting from `base`
pub fn water_height_multiplier(base: f64, unit: &str) -> f64 {
    match unit.trim() {
        "bar" => base * 1000.0,
        "Pa" => base / 100.0,
        _ => base,
    }
}

/// Build a water height series from a submerged pressure sensor (`target`)
/// and an atmospheric one (`standard`), over the target's range.
///
/// Each height is `(target - standard) * multiplier` at the target item's date.
pub fn water_height(
    standard: &Series,
    target: &Series,
    tolerance: Duration,
    base_multiplier: f64,
) -> Result<Series, TransformError> {
    let range = target.current_range();
    let standard_items = standard.extract_sub_series(range.start, range.end);
    let target_items = target.extract_sub_series(range.start, range.end);
    let multiplier = water_height_multiplier(base_multiplier, &target.series_type().unit);

    let heights: Vec<Item> = match_items(&standard_items, &target_items, tolerance)
        .into_iter()
        .filter_map(|(p, t)| {
            let pv = p.representative_value()?;
            let tv = t.representative_value()?;
            Some(Item::new(t.date, (tv - pv) * multiplier))
        })
        .collect();

    if heights.is_empty() {
        return Err(TransformError::NoOverlap {
            reference: standard.name().to_string(),
            target: target.name().to_string(),
        });
    }

    let mut result = target
        .derived(format!("{} - {}", target.name(), WATER_HEIGHT.name), WATER_HEIGHT.clone())
        .with_min_max(false);
    let count = heights.len();
    result.set_items(heights, "water height")?;

    info!(
        "Computed {} water heights from '{}' and '{}' (x{})",
        count,
        target.name(),
        standard.name(),
        multiplier
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Origin;
    use crate::transform::default_tolerance;
    use crate::types::{SeriesType, TypeKind, PRESSURE};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn pressure(name: &str, unit: &str, points: &[(i64, f64)]) -> Series {
        let series_type = Arc::new(SeriesType::new(TypeKind::Pressure, "Pression", unit));
        let mut series = Series::new(name, series_type).with_origin(Origin::new("cave.csv"));
        for (t, v) in points {
            series.add_item(Item::new(at(*t), *v)).unwrap();
        }
        series
    }

    #[test]
    fn test_multiplier_by_unit() {
        assert!((water_height_multiplier(1.02, "bar") - 1020.0).abs() < 1e-9);
        assert!((water_height_multiplier(1.02, "Pa") - 0.0102).abs() < 1e-12);
        assert!((water_height_multiplier(1.02, "hPa") - 1.02).abs() < 1e-12);
    }

    #[test]
    fn test_heights_from_matched_pairs() {
        let standard = pressure("air", "hPa", &[(40, 1000.0), (610, 1001.0), (1200, 1002.0)]);
        let target = pressure("siphon", "hPa", &[(30, 1010.0), (630, 1021.0)]);

        let heights = water_height(&standard, &target, default_tolerance(), DEFAULT_MULTIPLIER).unwrap();
        assert_eq!(heights.series_type().kind, TypeKind::WaterHeight);
        assert_eq!(heights.origin(), target.origin());
        assert_eq!(heights.len(), 2);
        assert_eq!(heights.items()[0].date, at(30));
        assert!((heights.items()[0].value.unwrap() - 10.2).abs() < 1e-9);
        assert!((heights.items()[1].value.unwrap() - 20.4).abs() < 1e-9);
        assert_eq!(heights.undo_name(), Some("water height"));
    }

    #[test]
    fn test_bar_unit_scaling() {
        let standard = pressure("air", "bar", &[(0, 1.000)]);
        let target = pressure("siphon", "bar", &[(0, 1.010)]);
        let heights = water_height(&standard, &target, default_tolerance(), DEFAULT_MULTIPLIER).unwrap();
        assert!((heights.items()[0].value.unwrap() - 10.2).abs() < 1e-9);
    }

    #[test]
    fn test_no_match_is_an_error() {
        let standard = Series::new("air", PRESSURE.clone());
        let target = pressure("siphon", "kPa", &[(0, 101.0)]);
        let err = water_height(&standard, &target, default_tolerance(), DEFAULT_MULTIPLIER).unwrap_err();
        assert!(matches!(err, TransformError::NoOverlap { .. }));
    }
}
