//! Order types for the fulfillment core.
//!
//! An order is the unit of fulfillment: created at checkout, advanced
//! through a fixed status sequence by vendor actions, and eventually
//! claimed by exactly one payout batch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::verification::PickupVerification;

/// Lifecycle status of an order.
///
/// Transitions are strictly forward through the sequence; `Cancelled` is
/// reachable only before the order is ready for pickup. Terminal states
/// accept no further transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	Placed,
	Accepted,
	Preparing,
	ReadyForPickup,
	Collected,
	Completed,
	Cancelled,
}

impl OrderStatus {
	/// Position in the forward sequence. `Cancelled` sits outside it.
	fn ordinal(&self) -> Option<u8> {
		match self {
			OrderStatus::Placed => Some(0),
			OrderStatus::Accepted => Some(1),
			OrderStatus::Preparing => Some(2),
			OrderStatus::ReadyForPickup => Some(3),
			OrderStatus::Collected => Some(4),
			OrderStatus::Completed => Some(5),
			OrderStatus::Cancelled => None,
		}
	}

	/// Whether a transition from `self` to `next` is allowed.
	///
	/// Forward moves may skip intermediate states; backward moves never
	/// happen. Cancellation is only possible while the kitchen still owns
	/// the order.
	pub fn can_transition(&self, next: OrderStatus) -> bool {
		match (self.ordinal(), next.ordinal()) {
			(Some(from), Some(to)) => to > from,
			// Cancellation cutoff: once ready for pickup, no longer cancellable.
			(Some(from), None) => from < 3,
			// Cancelled is terminal.
			(None, _) => false,
		}
	}

	/// Whether this status counts as fulfilled for settlement purposes.
	pub fn is_fulfilled(&self) -> bool {
		matches!(self, OrderStatus::Collected | OrderStatus::Completed)
	}

	/// Whether this status accepts no further transition.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
	}
}

/// Payment state as reported by the external payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
	Pending,
	Captured,
	Refunded,
}

/// Settlement marker for an order.
///
/// Explicit enum rather than a nullable batch id so a settled order can
/// never be silently overwritten back to unsettled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStatus {
	/// Not yet claimed by any payout batch.
	Unsettled,
	/// Claimed by the payout batch with the given id. Immutable once set.
	Settled { batch_id: String },
}

impl SettlementStatus {
	pub fn is_settled(&self) -> bool {
		matches!(self, SettlementStatus::Settled { .. })
	}
}

/// A single line item on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
	/// Menu item identifier.
	pub item_id: String,
	/// Display name at the time of ordering.
	pub name: String,
	/// Quantity ordered, always at least 1.
	pub quantity: u32,
	/// Unit price at the time of ordering.
	pub unit_price: Decimal,
}

/// Monetary breakdown of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
	pub subtotal: Decimal,
	pub taxes: Decimal,
	pub discount: Decimal,
	/// Invariant: `total = subtotal + taxes - discount`.
	pub total: Decimal,
}

impl OrderTotals {
	/// Checks the monetary invariant.
	pub fn is_consistent(&self) -> bool {
		self.total == self.subtotal + self.taxes - self.discount
	}
}

/// The unit of fulfillment.
///
/// Persisted in the `orders` namespace keyed by `id`. The pickup
/// verification record is embedded so that a verification attempt is a
/// single conditional write on this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Human-readable order number shown to customers and vendors.
	pub order_number: String,
	/// Vendor fulfilling this order.
	pub vendor_id: String,
	/// Customer who placed this order.
	pub customer_id: String,
	/// Ordered line items.
	pub items: Vec<OrderItem>,
	/// Monetary breakdown.
	pub totals: OrderTotals,
	/// Lifecycle status.
	pub status: OrderStatus,
	/// Payment state reported by the gateway.
	pub payment_status: PaymentStatus,
	/// Settlement marker; mutated only by the settlement engine.
	pub settlement: SettlementStatus,
	/// Pickup verification record; mutated only by the verification
	/// state machine.
	pub verification: Option<PickupVerification>,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
}

impl Order {
	/// Whether this order qualifies for a settlement scan: fulfilled,
	/// funds captured, and not yet claimed by a batch.
	pub fn is_settleable(&self) -> bool {
		self.status.is_fulfilled()
			&& self.payment_status == PaymentStatus::Captured
			&& !self.settlement.is_settled()
	}
}
