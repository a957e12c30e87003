//! Engine facade for the platter fulfillment core.
//!
//! Wires the verification, demand, and settlement services over one
//! shared order store and exposes the operations the surrounding web
//! application and job scheduler call: order creation and status
//! advancement, customer code entry, settlement triggers, and demand
//! reads. This is a library-level backend; it has no HTTP or CLI
//! surface of its own.

use chrono::Utc;
use platter_config::PlatterConfig;
use platter_demand::{DemandConfig, DemandError, DemandService};
use platter_settlement::{RunSummary, SettlementConfig, SettlementError, SettlementService};
use platter_storage::{create_backend, StorageError, StorageInterface, StorageService};
use platter_types::{
	DemandSnapshot, Order, OrderItem, OrderStatus, OrderTotals, PaymentStatus, PendingBalance,
	SettlementStatus, TimeRemaining,
};
use platter_verification::{
	IssuedCode, VerificationConfig, VerificationError, VerificationService, VerifyOutcome,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Namespace holding order records.
const ORDERS: &str = "orders";

/// Errors surfaced by the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Bad input shape on a write operation.
	#[error("Validation error: {0}")]
	Validation(String),
	/// The order does not exist.
	#[error("Order not found")]
	OrderNotFound,
	/// The requested status move violates the fixed sequence.
	#[error("Invalid status transition: {from:?} -> {to:?}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// Verification state machine failure.
	#[error(transparent)]
	Verification(#[from] VerificationError),
	/// Demand estimation failure.
	#[error(transparent)]
	Demand(#[from] DemandError),
	/// Settlement engine failure.
	#[error(transparent)]
	Settlement(#[from] SettlementError),
	/// Underlying store unavailable.
	#[error("Storage error: {0}")]
	Store(StorageError),
	/// Engine construction failure.
	#[error("Configuration error: {0}")]
	Config(String),
}

impl From<StorageError> for EngineError {
	fn from(e: StorageError) -> Self {
		match e {
			StorageError::NotFound => EngineError::OrderNotFound,
			other => EngineError::Store(other),
		}
	}
}

/// Input shape for order creation at checkout.
#[derive(Debug, Clone)]
pub struct OrderDraft {
	pub order_number: String,
	pub vendor_id: String,
	pub customer_id: String,
	pub items: Vec<OrderItem>,
	pub totals: OrderTotals,
	pub payment_status: PaymentStatus,
}

/// Customer-facing result of a code entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResponse {
	pub success: bool,
	pub message: String,
	pub attempts_remaining: Option<u32>,
}

/// The fulfillment engine: one shared store, three services.
pub struct FulfillmentEngine {
	config: PlatterConfig,
	storage: Arc<StorageService>,
	verification: VerificationService,
	demand: DemandService,
	settlement: SettlementService,
}

impl FulfillmentEngine {
	/// Creates an order at checkout with status Placed.
	pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, EngineError> {
		if draft.items.is_empty() {
			return Err(EngineError::Validation("order has no items".into()));
		}
		if draft.items.iter().any(|item| item.quantity == 0) {
			return Err(EngineError::Validation(
				"order item quantity must be at least 1".into(),
			));
		}
		if !draft.totals.is_consistent() {
			return Err(EngineError::Validation(
				"order total must equal subtotal + taxes - discount".into(),
			));
		}

		let order = Order {
			id: uuid::Uuid::new_v4().to_string(),
			order_number: draft.order_number,
			vendor_id: draft.vendor_id,
			customer_id: draft.customer_id,
			items: draft.items,
			totals: draft.totals,
			status: OrderStatus::Placed,
			payment_status: draft.payment_status,
			settlement: SettlementStatus::Unsettled,
			verification: None,
			created_at: Utc::now(),
		};
		match self.storage.create(ORDERS, &order.id, &order).await {
			Ok(()) => {}
			Err(StorageError::Conflict) => {
				return Err(EngineError::Validation("order id already exists".into()))
			}
			Err(e) => return Err(e.into()),
		}
		info!(order_id = %order.id, vendor_id = %order.vendor_id, "order created");
		Ok(order)
	}

	/// Advances an order along the fixed status sequence.
	///
	/// Reaching ReadyForPickup mints a pickup code and returns it; this
	/// is the only moment the plaintext code is surfaced.
	pub async fn advance_status(
		&self,
		order_id: &str,
		new_status: OrderStatus,
	) -> Result<Option<IssuedCode>, EngineError> {
		let moved = self
			.storage
			.update(ORDERS, order_id, |order: &mut Order| {
				let from = order.status;
				if !from.can_transition(new_status) {
					return Err(EngineError::InvalidTransition {
						from,
						to: new_status,
					});
				}
				order.status = new_status;
				Ok(())
			})
			.await?;
		moved?;
		info!(order_id, ?new_status, "order status advanced");

		if new_status == OrderStatus::ReadyForPickup {
			let issued = self.verification.issue(order_id).await?;
			return Ok(Some(issued));
		}
		Ok(None)
	}

	/// Records the payment state reported by the external gateway.
	pub async fn record_payment_status(
		&self,
		order_id: &str,
		payment_status: PaymentStatus,
	) -> Result<(), EngineError> {
		self.storage
			.update(ORDERS, order_id, |order: &mut Order| {
				order.payment_status = payment_status;
			})
			.await?;
		Ok(())
	}

	/// Validates a customer-entered pickup code.
	///
	/// Terminal verification outcomes become user-facing responses; only
	/// store failures propagate as errors ("try again", no attempt
	/// consumed). A successful match advances the order to Collected.
	pub async fn verify_pickup(
		&self,
		order_id: &str,
		code: &str,
	) -> Result<VerifyResponse, EngineError> {
		match self.verification.verify(order_id, code).await {
			Ok(VerifyOutcome::Verified { .. }) => {
				self.advance_status(order_id, OrderStatus::Collected).await?;
				Ok(VerifyResponse {
					success: true,
					message: "Pickup verified".to_string(),
					attempts_remaining: None,
				})
			}
			Ok(VerifyOutcome::WrongCode { attempts_remaining }) => Ok(VerifyResponse {
				success: false,
				message: format!(
					"Incorrect code, {} attempt(s) remaining",
					attempts_remaining
				),
				attempts_remaining: Some(attempts_remaining),
			}),
			Err(VerificationError::OrderNotFound) => Err(EngineError::OrderNotFound),
			Err(VerificationError::Store(e)) => Err(EngineError::Store(e)),
			Err(user_facing) => Ok(VerifyResponse {
				success: false,
				message: user_facing.to_string(),
				attempts_remaining: None,
			}),
		}
	}

	/// Mints a replacement pickup code after the previous one expired or
	/// was consumed, superseding the old digest. Rejected with
	/// [`VerificationError::AlreadyActive`] while a live code exists.
	pub async fn reissue_pickup_code(&self, order_id: &str) -> Result<IssuedCode, EngineError> {
		let issued = match self.verification.issue(order_id).await {
			Ok(issued) => issued,
			Err(VerificationError::OrderNotFound) => return Err(EngineError::OrderNotFound),
			Err(e) => return Err(e.into()),
		};
		info!(order_id, "pickup code reissued");
		Ok(issued)
	}

	/// Time left on the current pickup code, for display.
	pub async fn code_time_remaining(&self, order_id: &str) -> Result<TimeRemaining, EngineError> {
		Ok(self.verification.time_remaining(order_id).await?)
	}

	/// Runs one settlement pass. Operator/scheduler facing.
	pub async fn run_settlement_batch(&self) -> Result<RunSummary, EngineError> {
		Ok(self.settlement.run_batch().await?)
	}

	/// Unsettled totals per vendor, without mutating anything.
	pub async fn get_pending_balances(&self) -> Result<Vec<PendingBalance>, EngineError> {
		Ok(self.settlement.pending_balances().await?)
	}

	/// Current demand snapshot for a vendor.
	pub async fn get_demand_snapshot(
		&self,
		vendor_id: &str,
	) -> Result<DemandSnapshot, EngineError> {
		Ok(self.demand.snapshot(vendor_id).await?)
	}

	/// Fetches one order record.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, EngineError> {
		Ok(self.storage.retrieve(ORDERS, order_id).await?)
	}

	pub fn config(&self) -> &PlatterConfig {
		&self.config
	}
}

/// Builder assembling the engine from configuration, with a backend
/// override for tests and embedders that bring their own store.
pub struct FulfillmentBuilder {
	config: PlatterConfig,
	storage_backend: Option<Box<dyn StorageInterface>>,
}

impl FulfillmentBuilder {
	pub fn new(config: PlatterConfig) -> Self {
		Self {
			config,
			storage_backend: None,
		}
	}

	pub fn with_storage_backend(mut self, backend: Box<dyn StorageInterface>) -> Self {
		self.storage_backend = Some(backend);
		self
	}

	pub fn build(self) -> Result<FulfillmentEngine, EngineError> {
		let backend = match self.storage_backend {
			Some(backend) => backend,
			None => create_backend(&self.config.storage.backend, &self.config.storage.path)
				.map_err(|e| EngineError::Config(e.to_string()))?,
		};
		let storage = Arc::new(StorageService::new(backend));

		let verification = VerificationService::new(
			storage.clone(),
			VerificationConfig {
				code_ttl_minutes: self.config.verification.code_ttl_minutes,
				attempt_ceiling: self.config.verification.attempt_ceiling,
			},
		);
		let demand = DemandService::new(
			storage.clone(),
			DemandConfig {
				capacity_ceiling: self.config.demand.capacity_ceiling,
				velocity_window_minutes: self.config.demand.velocity_window_minutes,
				min_wait_minutes: self.config.demand.min_wait_minutes,
				alert_threshold: self.config.demand.alert_threshold,
			},
		);
		let settlement = SettlementService::new(
			storage.clone(),
			SettlementConfig {
				commission_rate: self.config.settlement.commission_rate,
			},
		);

		Ok(FulfillmentEngine {
			config: self.config,
			storage,
			verification,
			demand,
			settlement,
		})
	}
}
