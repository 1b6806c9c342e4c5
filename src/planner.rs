//! Meta-planner helpers derived from an artifact's `planner` block.
//!
//! A tracking value function is usually consumed by a planner that needs
//! more than `V(x)`: which of several candidate models to prefer, the
//! bang-bang controller implied by `∇V`, the tracking error box to inflate
//! obstacles by, and a lower bound on travel time. All of these are pure
//! functions of [`PlannerParams`] plus a value or gradient.

use crate::artifact::PlannerParams;
use crate::error::PlannerError;

/// Blend weight in `[0, 1]`: 0 at or below `priority_lower`, 1 at or above
/// `priority_upper`, linear in between.
pub fn priority(params: &PlannerParams, value: f64) -> Result<f64, PlannerError> {
    let (lo, hi) = match (params.priority_lower, params.priority_upper) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => return Err(PlannerError::Unavailable("priority thresholds")),
    };
    if value <= lo {
        Ok(0.0)
    } else if value >= hi {
        Ok(1.0)
    } else {
        Ok((value - lo) / (hi - lo))
    }
}

/// Bang-bang control ascending the value: control `j` saturates high when
/// `gradient[j] >= 0`, low otherwise. Control dimension `j` acts on state
/// coordinate `j`, so there may be fewer controls than states.
pub fn optimal_control(params: &PlannerParams, gradient: &[f64]) -> Result<Vec<f64>, PlannerError> {
    let (lower, upper) = match (&params.control_lower, &params.control_upper) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => return Err(PlannerError::Unavailable("control bounds")),
    };
    if lower.len() > gradient.len() {
        return Err(PlannerError::DimensionMismatch {
            what: "control bounds",
            expected: gradient.len(),
            found: lower.len(),
        });
    }
    Ok(lower
        .iter()
        .zip(upper)
        .zip(gradient)
        .map(|((lo, hi), g)| if *g >= 0.0 { *hi } else { *lo })
        .collect())
}

pub fn tracking_bound(params: &PlannerParams) -> Result<&[f64], PlannerError> {
    params
        .tracking_bound
        .as_deref()
        .ok_or(PlannerError::Unavailable("tracking bound"))
}

pub fn max_planner_speed(params: &PlannerParams) -> Result<&[f64], PlannerError> {
    params
        .max_planner_speed
        .as_deref()
        .ok_or(PlannerError::Unavailable("max planner speed"))
}

/// Lower bound on the time to go from `start` to `stop` when each planner
/// axis moves at most at its max speed: the slowest axis decides.
pub fn best_possible_time(
    params: &PlannerParams,
    start: &[f64],
    stop: &[f64],
) -> Result<f64, PlannerError> {
    let speed = max_planner_speed(params)?;
    for (what, point) in [("start", start), ("stop", stop)] {
        if point.len() != speed.len() {
            return Err(PlannerError::DimensionMismatch {
                what,
                expected: speed.len(),
                found: point.len(),
            });
        }
    }
    Ok(start
        .iter()
        .zip(stop)
        .zip(speed)
        .map(|((a, b), v)| (b - a).abs() / v)
        .fold(0.0, f64::max))
}
