//! # usageledger-proof
//!
//! **Proof Verifier** for settlement roots.
//!
//! - [`merkle`]: sorted-pair node hashing and depth-bounded path folding
//! - [`leaf`]: domain-separated usage leaves and gap leaves, plus
//!   [`verify_inclusion`] / [`verify_absence`]
//! - `builder` (feature `test-helpers`): reproduces the aggregator's tree
//!   layout so tests can produce roots and proofs
//!
//! Verification is pure: no state, no I/O, and it never panics. A malformed
//! or over-long proof simply fails to verify.

pub mod leaf;
pub mod merkle;

#[cfg(any(test, feature = "test-helpers"))]
pub mod builder;

pub use leaf::{GapLeaf, UsageLeaf, verify_absence, verify_inclusion};
pub use merkle::{hash_node, verify, verify_with_depth};

#[cfg(any(test, feature = "test-helpers"))]
pub use builder::{MerkleTree, UsageTree, UsageTreeBuilder};
