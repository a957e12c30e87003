//! Pure demand arithmetic.
//!
//! Every function here is idempotent and side-effect-free; the service
//! layer feeds them a consistent snapshot of the order counters.

use platter_types::DemandLevel;

/// Active orders as a percentage of the capacity ceiling, rounded.
///
/// A zero ceiling is treated as 1 to avoid division by zero. The result
/// exceeds 100 when the kitchen is over capacity.
pub fn capacity_utilization(active_orders: u32, capacity_ceiling: u32) -> u32 {
	let ceiling = capacity_ceiling.max(1);
	((active_orders as f64 / ceiling as f64) * 100.0).round() as u32
}

/// Composite demand score.
///
/// Capacity contributes up to 60 points, recent velocity up to 40.
pub fn demand_score(capacity_utilization: u32, order_velocity: f64) -> f64 {
	let capacity_points = capacity_utilization.min(100) as f64 * 0.6;
	let velocity_points = (order_velocity * 10.0).min(40.0);
	capacity_points + velocity_points
}

/// Discrete band for a score. Bands are half-open on the lower bound;
/// the first matching band wins.
pub fn demand_level(score: f64) -> DemandLevel {
	if score < 25.0 {
		DemandLevel::Low
	} else if score < 50.0 {
		DemandLevel::Medium
	} else if score < 75.0 {
		DemandLevel::High
	} else {
		DemandLevel::VeryHigh
	}
}

/// Dynamic wait estimate in minutes.
///
/// The busy factor is quadratic in the score, so low demand has a
/// disproportionately small effect on the promise.
pub fn estimated_wait_minutes(min_wait: u32, demand_score: f64) -> u32 {
	let max_wait = (min_wait + 20).max(min_wait * 2);
	let busy_factor = (demand_score.min(100.0) / 100.0).powi(2);
	(min_wait as f64 + (max_wait - min_wait) as f64 * busy_factor).round() as u32
}

/// Whether utilization has crossed the alerting threshold.
pub fn should_alert(capacity_utilization: u32, threshold: u32) -> bool {
	capacity_utilization >= threshold
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn utilization_rounds_and_survives_zero_ceiling() {
		assert_eq!(capacity_utilization(10, 20), 50);
		assert_eq!(capacity_utilization(1, 3), 33);
		assert_eq!(capacity_utilization(2, 3), 67);
		assert_eq!(capacity_utilization(25, 20), 125);
		assert_eq!(capacity_utilization(3, 0), 300);
		assert_eq!(capacity_utilization(0, 20), 0);
	}

	#[test]
	fn score_weights_capacity_and_velocity() {
		assert_eq!(demand_score(0, 0.0), 0.0);
		assert_eq!(demand_score(100, 4.0), 100.0);
		// Both contributions are capped.
		assert_eq!(demand_score(150, 9.0), 100.0);
		assert_eq!(demand_score(50, 1.0), 40.0);
	}

	#[test]
	fn level_band_boundaries() {
		assert_eq!(demand_level(24.0), DemandLevel::Low);
		assert_eq!(demand_level(25.0), DemandLevel::Medium);
		assert_eq!(demand_level(49.9), DemandLevel::Medium);
		assert_eq!(demand_level(50.0), DemandLevel::High);
		assert_eq!(demand_level(74.0), DemandLevel::High);
		assert_eq!(demand_level(75.0), DemandLevel::VeryHigh);
	}

	#[test]
	fn wait_estimate_worked_example() {
		// min_wait 10 at score 50: busy factor 0.25, max wait 30.
		assert_eq!(estimated_wait_minutes(10, 50.0), 15);
	}

	#[test]
	fn wait_estimate_bounds() {
		assert_eq!(estimated_wait_minutes(10, 0.0), 10);
		assert_eq!(estimated_wait_minutes(10, 100.0), 30);
		// Large baselines double instead of adding 20.
		assert_eq!(estimated_wait_minutes(25, 100.0), 50);
		// Scores above 100 are clamped before squaring.
		assert_eq!(estimated_wait_minutes(10, 140.0), 30);
	}

	#[test]
	fn alert_threshold_is_inclusive() {
		assert!(!should_alert(79, 80));
		assert!(should_alert(80, 80));
		assert!(should_alert(125, 80));
	}
}
