//! Append-only, hash-chained event log.
//!
//! Every record's digest covers the previous digest, its sequence number and
//! the serialized event. [`EventLog::verify_chain`] recomputes the chain, so
//! an exported log can be checked offline.

use usageledger_types::{EventRecord, LedgerError, LedgerEvent, Result};

/// Digest that precedes the first record.
pub const GENESIS_DIGEST: [u8; 32] = [0u8; 32];

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest of the last record, or [`GENESIS_DIGEST`].
    #[must_use]
    pub fn head(&self) -> [u8; 32] {
        self.records.last().map_or(GENESIS_DIGEST, |r| r.digest)
    }

    /// Compute the next record without appending it, so callers can fail
    /// before mutating any state.
    ///
    /// # Errors
    /// Returns [`LedgerError::Serialization`] if the event cannot be encoded.
    pub fn seal(&self, event: LedgerEvent) -> Result<EventRecord> {
        let sequence = self.records.len() as u64;
        let digest = EventRecord::chain_digest(&self.head(), sequence, &event)?;
        Ok(EventRecord {
            sequence,
            event,
            digest,
        })
    }

    /// Append a record produced by [`EventLog::seal`] on the current head.
    pub(crate) fn push(&mut self, record: EventRecord) -> u64 {
        tracing::debug!(
            sequence = record.sequence,
            kind = %record.event.kind(),
            digest = hex::encode(record.digest),
            "Event appended"
        );
        let sequence = record.sequence;
        self.records.push(record);
        sequence
    }

    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= from`.
    #[must_use]
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from).map_or(self.records.len(), |s| s.min(self.records.len()));
        &self.records[start..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Recompute every digest.
    ///
    /// # Errors
    /// Returns [`LedgerError::EventChainBroken`] at the first record
    /// whose sequence or digest does not match.
    pub fn verify_chain(&self) -> Result<()> {
        verify_records(&self.records)
    }
}

/// Verify an exported sequence of records starting from genesis.
///
/// # Errors
/// See [`EventLog::verify_chain`].
pub fn verify_records(records: &[EventRecord]) -> Result<()> {
    let mut prev = GENESIS_DIGEST;
    for (index, record) in records.iter().enumerate() {
        if record.sequence != index as u64 {
            return Err(LedgerError::EventChainBroken {
                reason: format!("event {index} carries sequence {}", record.sequence),
            });
        }
        let expected = EventRecord::chain_digest(&prev, record.sequence, &record.event)?;
        if expected != record.digest {
            return Err(LedgerError::EventChainBroken {
                reason: format!("event {index} digest mismatch"),
            });
        }
        prev = record.digest;
    }
    Ok(())
}
