//! Settlement batch engine.
//!
//! Periodically reconciles fulfilled, paid orders into per-vendor payout
//! batches exactly once. Idempotency rests on two mechanisms: the
//! settlement marker on each order excludes it from every future scan,
//! and marking is a conditional write, so two concurrent runs can never
//! both claim the same order. A crash between writing a batch and
//! marking its orders is healed by a recovery pass at the start of every
//! run.

use platter_storage::{StorageError, StorageService};
use platter_types::{Order, PayoutBatch, PayoutStatus, PendingBalance, SettlementStatus};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Namespace holding order records.
const ORDERS: &str = "orders";
/// Namespace holding payout batch records.
const PAYOUT_BATCHES: &str = "payout_batches";

/// Errors that can occur during a settlement run.
///
/// Store failures inside a vendor group are isolated and logged; they
/// surface here only when the engine cannot even scan the order store.
#[derive(Debug, Error)]
pub enum SettlementError {
	/// Underlying store unavailable.
	#[error("Storage error: {0}")]
	Store(#[from] StorageError),
}

/// Tunables for settlement runs.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
	/// Platform commission withheld from vendor payouts, in [0, 1).
	pub commission_rate: Decimal,
}

impl Default for SettlementConfig {
	fn default() -> Self {
		Self {
			// 5% platform fee, current policy.
			commission_rate: Decimal::new(5, 2),
		}
	}
}

/// Orders attributed to one vendor within a single settlement run.
#[derive(Debug, Clone)]
struct VendorGroup {
	vendor_id: String,
	orders: Vec<Order>,
}

impl VendorGroup {
	fn order_ids(&self) -> Vec<String> {
		self.orders.iter().map(|o| o.id.clone()).collect()
	}

	fn gross(&self) -> Decimal {
		self.orders.iter().map(|o| o.totals.total).sum()
	}
}

/// Outcome of a settlement run.
#[derive(Debug, Clone)]
pub struct RunSummary {
	/// Payout batches created by this run.
	pub batches_created: usize,
	/// Operator-facing description of what happened.
	pub message: String,
}

/// Service that reconciles fulfilled orders into payout batches.
pub struct SettlementService {
	storage: Arc<StorageService>,
	config: SettlementConfig,
}

impl SettlementService {
	/// Creates a new SettlementService over the shared order store.
	pub fn new(storage: Arc<StorageService>, config: SettlementConfig) -> Self {
		Self { storage, config }
	}

	/// Net payable amount for a gross total, rounded to the nearest
	/// integer currency unit at batch level to avoid per-order rounding
	/// drift.
	fn net_amount(&self, gross: Decimal) -> Decimal {
		(gross * (Decimal::ONE - self.config.commission_rate))
			.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
	}

	/// Runs one settlement pass: heal interrupted batches, scan for
	/// settleable orders, group per vendor, and emit one pending payout
	/// batch per surviving group.
	///
	/// A failure inside one vendor group never blocks the others; failed
	/// groups are logged and picked up by the next run.
	pub async fn run_batch(&self) -> Result<RunSummary, SettlementError> {
		self.recover_incomplete().await?;

		let groups = self.scan_unsettled().await?;
		let group_count = groups.len();
		let mut batches_created = 0usize;
		let mut groups_failed = 0usize;

		for (vendor_id, group) in groups {
			match self.settle_group(group).await {
				Ok(true) => batches_created += 1,
				Ok(false) => {}
				Err(e) => {
					groups_failed += 1;
					warn!(
						%vendor_id,
						error = %e,
						"settlement failed for vendor group, will retry next run"
					);
				}
			}
		}

		let message = format!(
			"Created {} payout batch(es) from {} vendor group(s); {} group(s) failed",
			batches_created, group_count, groups_failed
		);
		info!(batches_created, groups_failed, "settlement run complete");
		Ok(RunSummary {
			batches_created,
			message,
		})
	}

	/// Unsettled totals per vendor, computed without writing anything.
	pub async fn pending_balances(&self) -> Result<Vec<PendingBalance>, SettlementError> {
		let groups = self.scan_unsettled().await?;
		Ok(groups
			.into_values()
			.map(|group| PendingBalance {
				amount: self.net_amount(group.gross()),
				order_count: group.orders.len(),
				vendor_id: group.vendor_id,
			})
			.collect())
	}

	/// Step 1 and 2: scan for fulfilled, captured, unmarked orders and
	/// group them by vendor.
	async fn scan_unsettled(&self) -> Result<BTreeMap<String, VendorGroup>, SettlementError> {
		let orders: Vec<Order> = self.storage.list(ORDERS).await?;
		let mut groups: BTreeMap<String, VendorGroup> = BTreeMap::new();
		for order in orders.into_iter().filter(Order::is_settleable) {
			groups
				.entry(order.vendor_id.clone())
				.or_insert_with(|| VendorGroup {
					vendor_id: order.vendor_id.clone(),
					orders: Vec::new(),
				})
				.orders
				.push(order);
		}
		Ok(groups)
	}

	/// Steps 3 to 5 for one vendor group. Returns whether a batch was
	/// created.
	async fn settle_group(&self, group: VendorGroup) -> Result<bool, SettlementError> {
		let net = self.net_amount(group.gross());
		if net <= Decimal::ZERO {
			return Ok(false);
		}

		let batch = PayoutBatch {
			id: uuid::Uuid::new_v4().to_string(),
			vendor_id: group.vendor_id.clone(),
			net_amount: net,
			status: PayoutStatus::Pending,
			order_ids: group.order_ids(),
			created_at: chrono::Utc::now(),
			processing_note: None,
		};

		// Batch first, marks second: an interruption between the two is
		// healed by recover_incomplete on the next run.
		self.storage.create(PAYOUT_BATCHES, &batch.id, &batch).await?;

		let claimed = self.claim_orders(&batch.id, &batch.order_ids).await?;
		if claimed.len() != batch.order_ids.len() {
			// A concurrent run claimed part of the group; shrink the
			// batch to the orders this run actually owns.
			self.shrink_batch(&batch.id, claimed).await?;
			let kept = self.storage.exists(PAYOUT_BATCHES, &batch.id).await?;
			return Ok(kept);
		}

		info!(
			batch_id = %batch.id,
			vendor_id = %batch.vendor_id,
			net_amount = %batch.net_amount,
			orders = batch.order_ids.len(),
			"created payout batch"
		);
		Ok(true)
	}

	/// Marks each order as settled by `batch_id`, skipping orders some
	/// other batch already claimed. Returns the ids this batch owns.
	async fn claim_orders(
		&self,
		batch_id: &str,
		order_ids: &[String],
	) -> Result<Vec<String>, SettlementError> {
		let mut claimed = Vec::new();
		for order_id in order_ids {
			let owned = self
				.storage
				.update(ORDERS, order_id, |order: &mut Order| {
					match &order.settlement {
						SettlementStatus::Unsettled => {
							order.settlement = SettlementStatus::Settled {
								batch_id: batch_id.to_string(),
							};
							true
						}
						// Once set, the marker is immutable; re-marking
						// with the same id is the recovery path.
						SettlementStatus::Settled { batch_id: existing } => existing == batch_id,
					}
				})
				.await?;
			if owned {
				claimed.push(order_id.clone());
			} else {
				warn!(%order_id, batch_id, "order already claimed by another batch");
			}
		}
		Ok(claimed)
	}

	/// Rewrites a batch to the contributor set it actually owns,
	/// recomputing the amount; removes the batch when nothing is left.
	async fn shrink_batch(
		&self,
		batch_id: &str,
		claimed: Vec<String>,
	) -> Result<(), SettlementError> {
		if claimed.is_empty() {
			warn!(batch_id, "payout batch lost all contributors, removing");
			return Ok(self.storage.remove(PAYOUT_BATCHES, batch_id).await?);
		}

		let mut gross = Decimal::ZERO;
		for order_id in &claimed {
			let order: Order = self.storage.retrieve(ORDERS, order_id).await?;
			gross += order.totals.total;
		}
		let net = self.net_amount(gross);

		self.storage
			.update(PAYOUT_BATCHES, batch_id, |batch: &mut PayoutBatch| {
				batch.order_ids = claimed.clone();
				batch.net_amount = net;
				batch.processing_note =
					Some("contributors reduced after concurrent settlement run".to_string());
			})
			.await?;
		warn!(batch_id, contributors = claimed.len(), "shrank payout batch");
		Ok(())
	}

	/// Heals pending batches whose order marking was interrupted:
	/// completes missing marks and prunes orders another batch claimed
	/// in the meantime.
	async fn recover_incomplete(&self) -> Result<(), SettlementError> {
		let batches: Vec<PayoutBatch> = self.storage.list(PAYOUT_BATCHES).await?;
		for batch in batches {
			if batch.status != PayoutStatus::Pending {
				continue;
			}
			let claimed = match self.claim_orders(&batch.id, &batch.order_ids).await {
				Ok(claimed) => claimed,
				Err(e) => {
					warn!(batch_id = %batch.id, error = %e, "recovery pass failed for batch");
					continue;
				}
			};
			if claimed.len() != batch.order_ids.len() {
				if let Err(e) = self.shrink_batch(&batch.id, claimed).await {
					warn!(batch_id = %batch.id, error = %e, "recovery pass failed for batch");
				}
			}
		}
		Ok(())
	}
}
