use crate::errors::{AppError, AppResult};

/// How much of the target was achieved, as an unclamped percentage.
///
/// A zero target yields 0 by policy rather than propagating a division by
/// zero; callers must not read monotonic meaning into that case. Anything
/// above 100 represents over-achievement and is reported as-is.
pub fn completion_percentage(actual: f64, target: f64) -> AppResult<f64> {
    if target < 0.0 {
        return Err(AppError::validation("target must be non-negative"));
    }
    if actual < 0.0 {
        return Err(AppError::validation("actual must be non-negative"));
    }
    if target == 0.0 {
        return Ok(0.0);
    }
    Ok(actual / target * 100.0)
}

/// Blend of quantity completion and quality rating, each worth half.
///
/// The quality rating is an integer mark from 1 to 10 scaled to a percentage;
/// the quantity score may exceed 100, so the result may too.
pub fn final_score(quantity_score_percent: f64, quality_rating: i64) -> AppResult<f64> {
    if !(1..=10).contains(&quality_rating) {
        return Err(AppError::validation("quality rating must be between 1 and 10"));
    }
    if quantity_score_percent < 0.0 {
        return Err(AppError::validation("quantity score must be non-negative"));
    }
    Ok((quantity_score_percent + quality_rating as f64 * 10.0) / 2.0)
}
