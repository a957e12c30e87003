//! Pickup verification record and display helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One-to-one verification record embedded on an order, created when the
/// order becomes ready for pickup.
///
/// Only the digest of the code is stored; the plaintext is surfaced to the
/// customer exactly once at issuance and is not re-derivable afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupVerification {
	/// Hex-encoded SHA-256 digest of the code.
	pub code_digest: String,
	/// When the code was issued.
	pub issued_at: DateTime<Utc>,
	/// When the code stops being accepted.
	pub expires_at: DateTime<Utc>,
	/// Failed attempts so far. Never exceeds `attempt_ceiling`.
	pub attempts: u32,
	/// Maximum failed attempts before the code is locked out.
	pub attempt_ceiling: u32,
	/// Set on successful verification; terminal.
	pub consumed: bool,
	/// When the code was successfully verified.
	pub verified_at: Option<DateTime<Utc>>,
}

impl PickupVerification {
	/// Whether the code has passed its expiry at the given instant.
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now > self.expires_at
	}

	/// A verification is live while it is neither consumed nor expired.
	pub fn is_live(&self, now: DateTime<Utc>) -> bool {
		!self.consumed && !self.is_expired(now)
	}

	/// Failed attempts left before lockout.
	pub fn attempts_remaining(&self) -> u32 {
		self.attempt_ceiling.saturating_sub(self.attempts)
	}

	/// Time left on the code, decomposed for display.
	pub fn time_remaining(&self, now: DateTime<Utc>) -> TimeRemaining {
		let secs = (self.expires_at - now).num_seconds().max(0);
		TimeRemaining {
			minutes: secs / 60,
			seconds: secs % 60,
			expired: secs <= 0,
		}
	}
}

/// Display decomposition of the time left on a pickup code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemaining {
	pub minutes: i64,
	pub seconds: i64,
	pub expired: bool,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	fn record(expires_in: Duration) -> PickupVerification {
		let now = Utc::now();
		PickupVerification {
			code_digest: "d".repeat(64),
			issued_at: now,
			expires_at: now + expires_in,
			attempts: 0,
			attempt_ceiling: 5,
			consumed: false,
			verified_at: None,
		}
	}

	#[test]
	fn time_remaining_decomposes_minutes_and_seconds() {
		let v = record(Duration::seconds(125));
		let t = v.time_remaining(v.issued_at);
		assert_eq!(t.minutes, 2);
		assert_eq!(t.seconds, 5);
		assert!(!t.expired);
	}

	#[test]
	fn time_remaining_clamps_to_zero_after_expiry() {
		let v = record(Duration::seconds(30));
		let t = v.time_remaining(v.expires_at + Duration::seconds(10));
		assert_eq!(t.minutes, 0);
		assert_eq!(t.seconds, 0);
		assert!(t.expired);
	}

	#[test]
	fn liveness_tracks_consumed_and_expiry() {
		let now = Utc::now();
		let mut v = record(Duration::minutes(15));
		assert!(v.is_live(now));

		v.consumed = true;
		assert!(!v.is_live(now));

		let stale = record(Duration::minutes(15));
		assert!(!stale.is_live(now + Duration::minutes(16)));
	}

	#[test]
	fn attempts_remaining_never_underflows() {
		let mut v = record(Duration::minutes(15));
		v.attempts = 7;
		assert_eq!(v.attempts_remaining(), 0);
	}
}
