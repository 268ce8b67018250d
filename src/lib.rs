//! Real-time threshold voting core: a trusted-dealer threshold Paillier
//! cryptosystem with Shamir-shared private exponent, Chaum-Pedersen-style
//! zero-knowledge partial-decryption proofs, replay-protected decryption
//! ceremonies, hierarchical jurisdiction aggregation, and a hash-chained
//! audit log.
//!
//! No network transport, persistence, or UI lives here; callers own
//! moving bytes between Guardians and wiring this crate's public API to
//! their own storage and transport layers.

pub mod aggregate;
pub mod audit;
pub mod bigint;
pub mod ceremony;
pub mod codec;
pub mod combiner;
pub mod error;
pub mod feed;
pub mod guardian;
pub mod ids;
pub mod isolation;
pub mod keygen;
pub mod partial;
pub mod poll;
pub mod scheduler;
pub mod verifier;

pub use error::{ThresholdError, ThresholdResult};
