//! Idempotency: argument normalization, fingerprints, and the side-effect ledger.

pub mod idempotency;
pub mod key;
pub mod normalize;

pub use idempotency::{IdempotencyLedger, LedgerEntry, LedgerState};
pub use key::{IdempotencyKey, KeyDeriver};
pub use normalize::{ArgsNormalizer, CanonicalArgsNormalizer, canonical_json};
