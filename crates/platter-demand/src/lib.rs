//! Demand estimation for vendor kitchens.
//!
//! Converts live kitchen load into a bounded score, a discrete level, and
//! a dynamic wait-time estimate. Stateless across invocations: every
//! snapshot is recomputed from the order store at call time and nothing
//! is persisted.

use chrono::{Duration, Utc};
use platter_storage::{StorageError, StorageService};
use platter_types::{DemandSnapshot, Order};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod estimator;

pub use estimator::{
	capacity_utilization, demand_level, demand_score, estimated_wait_minutes, should_alert,
};

/// Namespace holding order records.
const ORDERS: &str = "orders";

/// Errors that can occur while computing a demand snapshot.
#[derive(Debug, Error)]
pub enum DemandError {
	/// Underlying store unavailable.
	#[error("Storage error: {0}")]
	Store(#[from] StorageError),
}

/// Tunables for demand estimation.
#[derive(Debug, Clone)]
pub struct DemandConfig {
	/// Orders a kitchen can hold before it counts as fully loaded.
	pub capacity_ceiling: u32,
	/// Trailing window for the arrival-rate measurement.
	pub velocity_window_minutes: i64,
	/// Baseline preparation time fed into the wait estimate.
	pub min_wait_minutes: u32,
	/// Utilization percentage at which the vendor should be alerted.
	pub alert_threshold: u32,
}

impl Default for DemandConfig {
	fn default() -> Self {
		Self {
			capacity_ceiling: 20,
			velocity_window_minutes: 30,
			min_wait_minutes: 10,
			alert_threshold: 80,
		}
	}
}

/// Service computing demand snapshots from the shared order store.
pub struct DemandService {
	storage: Arc<StorageService>,
	config: DemandConfig,
}

impl DemandService {
	/// Creates a new DemandService over the shared order store.
	pub fn new(storage: Arc<StorageService>, config: DemandConfig) -> Self {
		Self { storage, config }
	}

	/// Computes the current demand snapshot for a vendor.
	///
	/// Reads the vendor's orders once and derives everything from that
	/// one view: active count, arrival velocity over the configured
	/// window, utilization, score, level, and the wait promise.
	pub async fn snapshot(&self, vendor_id: &str) -> Result<DemandSnapshot, DemandError> {
		let now = Utc::now();
		let window_start = now - Duration::minutes(self.config.velocity_window_minutes);

		let orders: Vec<Order> = self.storage.list(ORDERS).await?;
		let mut active_orders = 0u32;
		let mut recent_arrivals = 0u32;
		for order in orders.iter().filter(|o| o.vendor_id == vendor_id) {
			if !order.status.is_terminal() && !order.status.is_fulfilled() {
				active_orders += 1;
			}
			if order.created_at > window_start {
				recent_arrivals += 1;
			}
		}

		let order_velocity =
			recent_arrivals as f64 / self.config.velocity_window_minutes.max(1) as f64;
		let utilization = capacity_utilization(active_orders, self.config.capacity_ceiling);
		let score = demand_score(utilization, order_velocity);

		debug!(
			vendor_id,
			active_orders, utilization, score, "computed demand snapshot"
		);

		Ok(DemandSnapshot {
			active_orders,
			order_velocity,
			capacity_utilization: utilization,
			demand_score: score,
			demand_level: demand_level(score),
			estimated_wait_minutes: estimated_wait_minutes(self.config.min_wait_minutes, score),
			computed_at: now,
		})
	}

	/// Whether a snapshot has crossed the configured alert threshold.
	pub fn should_alert(&self, snapshot: &DemandSnapshot) -> bool {
		should_alert(snapshot.capacity_utilization, self.config.alert_threshold)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use platter_storage::MemoryStorage;
	use platter_types::{
		DemandLevel, OrderStatus, OrderTotals, PaymentStatus, SettlementStatus,
	};

	fn dec(s: &str) -> rust_decimal::Decimal {
		s.parse().unwrap()
	}

	fn order(id: &str, vendor: &str, status: OrderStatus, age_minutes: i64) -> Order {
		Order {
			id: id.to_string(),
			order_number: format!("PL-{}", id),
			vendor_id: vendor.to_string(),
			customer_id: "c-1".into(),
			items: Vec::new(),
			totals: OrderTotals {
				subtotal: dec("10"),
				taxes: dec("0"),
				discount: dec("0"),
				total: dec("10"),
			},
			status,
			payment_status: PaymentStatus::Captured,
			settlement: SettlementStatus::Unsettled,
			verification: None,
			created_at: Utc::now() - Duration::minutes(age_minutes),
		}
	}

	async fn seed(storage: &StorageService, orders: &[Order]) {
		for order in orders {
			storage.create(ORDERS, &order.id, order).await.unwrap();
		}
	}

	#[tokio::test]
	async fn snapshot_counts_only_active_orders_of_the_vendor() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		seed(
			&storage,
			&[
				order("o-1", "v-1", OrderStatus::Placed, 5),
				order("o-2", "v-1", OrderStatus::Preparing, 5),
				order("o-3", "v-1", OrderStatus::Collected, 5),
				order("o-4", "v-1", OrderStatus::Cancelled, 5),
				order("o-5", "v-2", OrderStatus::Placed, 5),
			],
		)
		.await;
		let service = DemandService::new(storage, DemandConfig::default());

		let snapshot = service.snapshot("v-1").await.unwrap();
		assert_eq!(snapshot.active_orders, 2);
		assert_eq!(snapshot.capacity_utilization, 10);
	}

	#[tokio::test]
	async fn snapshot_derives_score_level_and_wait() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		// 10 active orders against a ceiling of 20, all placed just now.
		let orders: Vec<Order> = (0..10)
			.map(|i| order(&format!("o-{}", i), "v-1", OrderStatus::Preparing, 0))
			.collect();
		seed(&storage, &orders).await;
		let service = DemandService::new(storage, DemandConfig::default());

		let snapshot = service.snapshot("v-1").await.unwrap();
		assert_eq!(snapshot.capacity_utilization, 50);
		// 10 arrivals over a 30 minute window: 1/3 order per minute.
		assert!((snapshot.order_velocity - 10.0 / 30.0).abs() < 1e-9);
		// 50 * 0.6 + (10/30) * 10 = 33.33...
		assert!((snapshot.demand_score - (30.0 + 10.0 / 3.0)).abs() < 1e-9);
		assert_eq!(snapshot.demand_level, DemandLevel::Medium);
		assert_eq!(
			snapshot.estimated_wait_minutes,
			estimated_wait_minutes(10, snapshot.demand_score)
		);
		assert!(!service.should_alert(&snapshot));
	}

	#[tokio::test]
	async fn old_orders_fall_out_of_the_velocity_window() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		seed(
			&storage,
			&[
				order("o-1", "v-1", OrderStatus::Preparing, 0),
				order("o-2", "v-1", OrderStatus::Preparing, 45),
			],
		)
		.await;
		let service = DemandService::new(storage, DemandConfig::default());

		let snapshot = service.snapshot("v-1").await.unwrap();
		assert_eq!(snapshot.active_orders, 2);
		// Only the fresh order counts toward velocity.
		assert!((snapshot.order_velocity - 1.0 / 30.0).abs() < 1e-9);
	}

	#[tokio::test]
	async fn over_capacity_trips_the_alert() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let orders: Vec<Order> = (0..25)
			.map(|i| order(&format!("o-{}", i), "v-1", OrderStatus::Placed, 0))
			.collect();
		seed(&storage, &orders).await;
		let service = DemandService::new(storage, DemandConfig::default());

		let snapshot = service.snapshot("v-1").await.unwrap();
		assert_eq!(snapshot.capacity_utilization, 125);
		assert!(service.should_alert(&snapshot));
		// 60 capacity points plus 25/30 * 10 velocity points.
		assert_eq!(snapshot.demand_level, DemandLevel::High);
	}

	#[tokio::test]
	async fn unknown_vendor_yields_an_idle_snapshot() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let service = DemandService::new(storage, DemandConfig::default());

		let snapshot = service.snapshot("v-none").await.unwrap();
		assert_eq!(snapshot.active_orders, 0);
		assert_eq!(snapshot.demand_score, 0.0);
		assert_eq!(snapshot.demand_level, DemandLevel::Low);
		assert_eq!(snapshot.estimated_wait_minutes, 10);
	}
}
