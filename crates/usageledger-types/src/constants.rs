//! System-wide constants for the UsageLedger settlement core.

/// Basis-point denominator (100% = 10 000 bps).
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Hard upper bound on Merkle proof length. Proofs longer than this are
/// rejected without hashing.
pub const MAX_PROOF_DEPTH: usize = 32;

/// Default dispute window: one day, in seconds.
pub const DEFAULT_DISPUTE_WINDOW_SECS: u64 = 86_400;

/// Longest dispute window a configuration may request (one year).
pub const MAX_DISPUTE_WINDOW_SECS: u64 = 365 * 86_400;

/// Default minimum challenger stake (whole reward-token units).
pub const DEFAULT_MIN_STAKE: i64 = 10;

/// Default grace period for scheduling a pricing policy slightly in the past.
pub const DEFAULT_POLICY_GRACE_SECS: u64 = 300;

/// Default absolute rounding tolerance for totals validation, as
/// (mantissa, scale): 0.01.
pub const DEFAULT_ROUNDING_TOLERANCE: (i64, u32) = (1, 2);

/// Default share of an upheld correction paid to the challenger as
/// compensation from the fee reserve (50%).
pub const DEFAULT_DISPUTE_REWARD_BPS: u32 = 5_000;

/// Default maximum number of entries in one `batch_distribute` call.
pub const DEFAULT_MAX_BATCH_CLAIMS: usize = 1_000;

/// Domain tag for usage leaves.
pub const LEAF_DOMAIN: &[u8] = b"usageledger:leaf:v1:";

/// Domain tag for gap (non-inclusion) leaves.
pub const GAP_DOMAIN: &[u8] = b"usageledger:gap:v1:";

/// Domain tag for signed settlement commitments.
pub const COMMIT_DOMAIN: &[u8] = b"usageledger:commit:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "UsageLedger";
