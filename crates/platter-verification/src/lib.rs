//! Pickup verification state machine.
//!
//! Issues a short-lived numeric code when an order becomes ready for
//! pickup and validates customer-entered codes against it, enforcing
//! expiry and an attempt ceiling. Every mutation is a single conditional
//! update on the order record, so concurrent attempts on the same order
//! can neither double-consume a code nor lose an attempt increment.

use chrono::{DateTime, Duration, Utc};
use platter_storage::{StorageError, StorageService};
use platter_types::{Order, OrderStatus, PickupVerification, TimeRemaining};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod code;

pub use code::{generate_code, hash_code};

/// Namespace holding order records.
const ORDERS: &str = "orders";

/// Errors surfaced by the verification state machine.
///
/// All variants except `Store` are terminal for the calling action and
/// are shown to the user verbatim; `Store` means "try again" and never
/// consumes an attempt.
#[derive(Debug, Error)]
pub enum VerificationError {
	/// The order does not exist.
	#[error("Order not found")]
	OrderNotFound,
	/// No code has been issued for this order.
	#[error("No pickup code has been issued for this order")]
	NotIssued,
	/// The order is not in a state that allows issuing a code.
	#[error("Order is not ready for pickup")]
	InvalidState,
	/// A live (unconsumed, unexpired) code already exists.
	#[error("A pickup code is already active for this order")]
	AlreadyActive,
	/// The code was already used successfully.
	#[error("Pickup code has already been used")]
	AlreadyConsumed,
	/// The code expired; the customer must request a new one.
	#[error("Pickup code has expired, request a new code")]
	Expired,
	/// Too many failed attempts; the code is locked out.
	#[error("Too many failed attempts")]
	AttemptsExceeded,
	/// Underlying store unavailable.
	#[error("Storage error: {0}")]
	Store(StorageError),
}

impl From<StorageError> for VerificationError {
	fn from(e: StorageError) -> Self {
		match e {
			StorageError::NotFound => VerificationError::OrderNotFound,
			other => VerificationError::Store(other),
		}
	}
}

/// Tunables for code issuance.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
	/// How long an issued code stays valid.
	pub code_ttl_minutes: i64,
	/// Failed attempts allowed before lockout.
	pub attempt_ceiling: u32,
}

impl Default for VerificationConfig {
	fn default() -> Self {
		Self {
			code_ttl_minutes: 15,
			attempt_ceiling: 5,
		}
	}
}

/// A freshly issued code.
///
/// The only place the plaintext ever surfaces; it is not re-derivable
/// afterward except by issuing a new code.
#[derive(Debug, Clone)]
pub struct IssuedCode {
	pub code: String,
	pub expires_at: DateTime<Utc>,
}

/// Result of a verification attempt that reached the digest comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
	/// The code matched; the verification is consumed.
	Verified { verified_at: DateTime<Utc> },
	/// The code did not match; one attempt was consumed.
	WrongCode { attempts_remaining: u32 },
}

/// Service owning the pickup verification lifecycle.
///
/// The verification record lives embedded on the order; this service is
/// the only writer of those fields.
pub struct VerificationService {
	storage: Arc<StorageService>,
	config: VerificationConfig,
}

impl VerificationService {
	/// Creates a new VerificationService over the shared order store.
	pub fn new(storage: Arc<StorageService>, config: VerificationConfig) -> Self {
		Self { storage, config }
	}

	/// Issues a pickup code for an order that is ready for pickup.
	///
	/// Fails with [`VerificationError::InvalidState`] if the order is not
	/// ready, or [`VerificationError::AlreadyActive`] if a live code
	/// exists. An expired or consumed code is superseded: the old digest
	/// is replaced entirely, so a stale code can never verify after a new
	/// one is issued.
	pub async fn issue(&self, order_id: &str) -> Result<IssuedCode, VerificationError> {
		let now = Utc::now();
		let code = code::generate_code();
		let digest = code::hash_code(&code);
		let expires_at = now + Duration::minutes(self.config.code_ttl_minutes);
		let ceiling = self.config.attempt_ceiling;

		let issued = self
			.storage
			.update(ORDERS, order_id, |order: &mut Order| {
				if order.status != OrderStatus::ReadyForPickup {
					return Err(VerificationError::InvalidState);
				}
				if let Some(existing) = &order.verification {
					if existing.is_live(now) {
						return Err(VerificationError::AlreadyActive);
					}
				}
				order.verification = Some(PickupVerification {
					code_digest: digest.clone(),
					issued_at: now,
					expires_at,
					attempts: 0,
					attempt_ceiling: ceiling,
					consumed: false,
					verified_at: None,
				});
				Ok(())
			})
			.await?;
		issued?;

		info!(order_id, %expires_at, "issued pickup code");
		Ok(IssuedCode { code, expires_at })
	}

	/// Validates a customer-entered code.
	///
	/// Check order: missing record, already consumed, expired (no attempt
	/// consumed), attempts exceeded, then the digest comparison. The
	/// comparison and the attempt increment are one conditional write, so
	/// two concurrent attempts cannot both succeed or skip a counter
	/// value.
	pub async fn verify(
		&self,
		order_id: &str,
		entered_code: &str,
	) -> Result<VerifyOutcome, VerificationError> {
		let now = Utc::now();
		let entered_digest = code::hash_code(entered_code);

		let outcome = self
			.storage
			.update(ORDERS, order_id, |order: &mut Order| {
				let verification = order
					.verification
					.as_mut()
					.ok_or(VerificationError::NotIssued)?;
				if verification.consumed {
					return Err(VerificationError::AlreadyConsumed);
				}
				if verification.is_expired(now) {
					return Err(VerificationError::Expired);
				}
				if verification.attempts >= verification.attempt_ceiling {
					return Err(VerificationError::AttemptsExceeded);
				}
				if verification.code_digest == entered_digest {
					verification.consumed = true;
					verification.verified_at = Some(now);
					Ok(VerifyOutcome::Verified { verified_at: now })
				} else {
					verification.attempts += 1;
					Ok(VerifyOutcome::WrongCode {
						attempts_remaining: verification.attempts_remaining(),
					})
				}
			})
			.await?;

		match &outcome {
			Ok(VerifyOutcome::Verified { .. }) => {
				info!(order_id, "pickup code verified");
			}
			Ok(VerifyOutcome::WrongCode { attempts_remaining }) => {
				debug!(order_id, attempts_remaining, "pickup code mismatch");
				if *attempts_remaining == 0 {
					warn!(order_id, "pickup code locked out");
				}
			}
			Err(_) => {}
		}
		outcome
	}

	/// Time left on the current code, decomposed for display.
	pub async fn time_remaining(&self, order_id: &str) -> Result<TimeRemaining, VerificationError> {
		let order: Order = self.storage.retrieve(ORDERS, order_id).await?;
		let verification = order.verification.ok_or(VerificationError::NotIssued)?;
		Ok(verification.time_remaining(Utc::now()))
	}
}
