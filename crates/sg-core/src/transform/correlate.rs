//! Recalibration of a series against a reference

use chrono::Duration;
use tracing::info;

use super::match_items;
use crate::error::TransformError;
use crate::series::{DateRange, Item, Series};

/// Mean of `target - reference` over matched item pairs, with the match count.
/// `None` when nothing matches.
pub fn mean_offset(reference: &[Item], target: &[Item], tolerance: Duration) -> Option<(f64, usize)> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (r, t) in match_items(reference, target, tolerance) {
        if let (Some(rv), Some(tv)) = (r.representative_value(), t.representative_value()) {
            sum += tv - rv;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some((sum / count as f64, count))
    }
}

/// Shift every value of `target` so that it agrees on average with
/// `reference` over `window`. Returns the mean offset that was removed.
pub fn recalibrate(
    reference: &Series,
    target: &mut Series,
    window: DateRange,
    tolerance: Duration,
) -> Result<f64, TransformError> {
    let reference_items = reference.extract_sub_series(window.start, window.end);
    recalibrate_against(reference.name(), &reference_items, target, window, tolerance)
}

/// [`recalibrate`] with the reference already extracted, for callers that
/// cannot borrow both series at once
pub fn recalibrate_against(
    reference_name: &str,
    reference_items: &[Item],
    target: &mut Series,
    window: DateRange,
    tolerance: Duration,
) -> Result<f64, TransformError> {
    let target_items = target.extract_sub_series(window.start, window.end);
    let (offset, matches) = mean_offset(reference_items, &target_items, tolerance).ok_or_else(|| {
        TransformError::NoOverlap {
            reference: reference_name.to_string(),
            target: target.name().to_string(),
        }
    })?;

    let corrected = target
        .items()
        .iter()
        .map(|item| item.with_value_delta(-offset))
        .collect();
    target.set_items(corrected, "recalibrate")?;

    info!(
        "Recalibrated '{}' against '{}': offset {:.4} over {} matches",
        target.name(),
        reference_name,
        offset,
        matches
    );
    Ok(offset)
}
