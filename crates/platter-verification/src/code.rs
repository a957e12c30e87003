//! Pickup code generation and hashing.
//!
//! Codes are 4-digit numeric strings drawn uniformly from [1000, 9999]
//! and stored only as a SHA-256 digest. The digest is unsalted: codes are
//! short-lived and scoped to a single order, an accepted tradeoff rather
//! than a guarantee against offline brute force.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generates a 4-digit pickup code.
pub fn generate_code() -> String {
	let code: u32 = rand::thread_rng().gen_range(1000..=9999);
	code.to_string()
}

/// Hex-encoded SHA-256 digest over the UTF-8 bytes of the code.
pub fn hash_code(code: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(code.as_bytes());
	hex::encode(hasher.finalize())
}
