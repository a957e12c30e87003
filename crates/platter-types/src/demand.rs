//! Derived demand types.
//!
//! A demand snapshot is fully derivable from the active order set at the
//! instant of computation and is never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete demand band derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandLevel {
	Low,
	Medium,
	High,
	VeryHigh,
}

/// Point-in-time view of a vendor's kitchen load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSnapshot {
	/// Orders currently in flight (placed but not yet collected).
	pub active_orders: u32,
	/// Recent order arrival rate, orders per minute.
	pub order_velocity: f64,
	/// Active orders as a percentage of the capacity ceiling. May exceed
	/// 100 when the kitchen is over capacity.
	pub capacity_utilization: u32,
	/// Composite 0-100+ score; capacity contributes up to 60 points,
	/// velocity up to 40.
	pub demand_score: f64,
	/// Discrete band derived from the score.
	pub demand_level: DemandLevel,
	/// Dynamic wait promise shown to customers.
	pub estimated_wait_minutes: u32,
	/// When this snapshot was computed.
	pub computed_at: DateTime<Utc>,
}
