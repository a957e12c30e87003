//! Payout batch types produced by the settlement engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Review state of a payout batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
	Pending,
	Approved,
	Rejected,
}

/// One vendor's payout for a single settlement run.
///
/// Persisted in the `payout_batches` namespace keyed by `id`. The set of
/// contributing order ids is disjoint across all batches for a vendor;
/// the settlement marker on each order enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutBatch {
	/// Unique identifier for this batch.
	pub id: String,
	/// Vendor being paid out.
	pub vendor_id: String,
	/// Aggregate payable amount after commission, rounded at batch level.
	pub net_amount: Decimal,
	/// Review state; batches are created pending.
	pub status: PayoutStatus,
	/// Orders contributing to this batch.
	pub order_ids: Vec<String>,
	/// When this batch was created.
	pub created_at: DateTime<Utc>,
	/// Operator-facing processing metadata.
	pub processing_note: Option<String>,
}

/// Unsettled totals preview row, one per vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBalance {
	pub vendor_id: String,
	/// Net amount that would be paid out if a batch ran now.
	pub amount: Decimal,
	/// Orders that would contribute.
	pub order_count: usize,
}
