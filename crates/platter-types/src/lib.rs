//! Shared domain types for the platter fulfillment core.
//!
//! This crate defines the persisted record shapes (orders, pickup
//! verifications, payout batches) and the derived demand types used by the
//! service crates. It holds no behavior beyond invariant checks on the
//! types themselves.

pub mod demand;
pub mod order;
pub mod settlement;
pub mod verification;

pub use demand::*;
pub use order::*;
pub use settlement::*;
pub use verification::*;
