//! Hierarchical tally aggregation: per-voter precincts, homomorphic
//! ciphertext aggregation up the Precinct -> County -> State -> National
//! tree, and threshold-decryption orchestration at each non-leaf tier
//! (spec §4.9).
//!
//! The children-keyed-by-id ciphertext map and component-wise homomorphic
//! fold follow the running-tally accumulation shape in
//! `microsoft-electionguard-rust`'s ballot tallying; the ceremony-per-tier
//! wiring reuses this crate's own `CeremonyCoordinator`/`PublicTallyFeed`
//! rather than inventing a second coordination mechanism.

use crate::ceremony::{CeremonyCoordinator, CeremonyStatus};
use crate::combiner::CombinedProof;
use crate::error::{ThresholdError, ThresholdResult};
use crate::feed::PublicTallyFeed;
use crate::keygen::PublicKey;
use curv::arithmetic::traits::*;
use curv::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Convention: the final tally published on poll closure uses `-1`.
pub const FINAL_INTERVAL_NUMBER: i64 = -1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntervalTally {
    pub poll_id: String,
    pub interval_number: i64,
    #[serde(with = "crate::codec::serde_bigint_vec")]
    pub tallies: Vec<BigInt>,
    pub choices: Vec<String>,
    pub vote_count: u64,
    pub cumulative_vote_count: u64,
    pub proof: Option<CombinedProof>,
    pub participating_guardians: Vec<u16>,
    pub timestamp: u64,
    pub is_final: bool,
}

/// Leaf tier: per-voter encrypted ballots, at-most-one per voter (spec
/// §4.9). Ballot-encoding policy (plurality, RCV, ...) is the caller's
/// concern; this only enforces the one-ballot invariant and folds
/// ciphertext vectors homomorphically.
pub struct Precinct {
    pub id: String,
    public_key: PublicKey,
    ballots: Mutex<HashMap<String, Vec<BigInt>>>,
}

impl Precinct {
    pub fn new(id: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            id: id.into(),
            public_key,
            ballots: Mutex::new(HashMap::new()),
        }
    }

    pub fn cast_vote(&self, voter_id: &str, ciphertexts: Vec<BigInt>) -> ThresholdResult<()> {
        let mut ballots = self.ballots.lock().unwrap();
        if ballots.contains_key(voter_id) {
            return Err(ThresholdError::DuplicateVote(voter_id.to_string()));
        }
        ballots.insert(voter_id.to_string(), ciphertexts);
        Ok(())
    }

    pub fn vote_count(&self) -> u64 {
        self.ballots.lock().unwrap().len() as u64
    }

    /// Component-wise homomorphic sum of every cast ballot.
    pub fn encrypted_tally(&self) -> Vec<BigInt> {
        let ballots = self.ballots.lock().unwrap();
        let mut iter = ballots.values();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut acc = first.clone();
        for ballot in iter {
            for (slot, ct) in acc.iter_mut().zip(ballot.iter()) {
                *slot = self.public_key.add(slot, ct);
            }
        }
        acc
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JurisdictionTier {
    Precinct,
    County,
    State,
    National,
}

struct ThresholdDecryptionContext {
    coordinator: Arc<CeremonyCoordinator>,
    feed: Arc<PublicTallyFeed>,
}

/// A non-leaf jurisdiction node: County, State, or National. Holds the
/// latest encrypted tally received from each child, optionally drives
/// ceremonies to decrypt and publish its own `IntervalTally`, and
/// propagates published tallies upward.
pub struct JurisdictionAggregator {
    pub id: String,
    tier: JurisdictionTier,
    public_key: PublicKey,
    parent: Mutex<Option<Arc<JurisdictionAggregator>>>,
    child_tallies: Mutex<HashMap<String, Vec<BigInt>>>,
    child_uses_threshold: Mutex<HashMap<String, bool>>,
    interval_tallies: Mutex<HashMap<i64, IntervalTally>>,
    interval_order: Mutex<Vec<i64>>,
    threshold: Mutex<Option<ThresholdDecryptionContext>>,
}

impl JurisdictionAggregator {
    pub fn new(id: impl Into<String>, tier: JurisdictionTier, public_key: PublicKey) -> Self {
        Self {
            id: id.into(),
            tier,
            public_key,
            parent: Mutex::new(None),
            child_tallies: Mutex::new(HashMap::new()),
            child_uses_threshold: Mutex::new(HashMap::new()),
            interval_tallies: Mutex::new(HashMap::new()),
            interval_order: Mutex::new(Vec::new()),
            threshold: Mutex::new(None),
        }
    }

    pub fn set_parent(&self, parent: Arc<JurisdictionAggregator>) {
        *self.parent.lock().unwrap() = Some(parent);
    }

    /// Wires a ceremony coordinator and tally feed so this tier can
    /// perform threshold decryption of its own aggregate (spec §4.9,
    /// "threshold variants").
    pub fn enable_threshold_decryption(
        &self,
        coordinator: Arc<CeremonyCoordinator>,
        feed: Arc<PublicTallyFeed>,
    ) {
        *self.threshold.lock().unwrap() = Some(ThresholdDecryptionContext { coordinator, feed });
    }

    /// Records a child's latest encrypted aggregate. The State tier
    /// refuses a child that does not itself use threshold decryption
    /// (spec §4.9).
    pub fn receive_child_tally(
        &self,
        child_id: &str,
        ciphertexts: Vec<BigInt>,
        child_uses_threshold: bool,
    ) -> ThresholdResult<()> {
        if self.tier == JurisdictionTier::State && !child_uses_threshold {
            return Err(ThresholdError::InvalidThresholdPollConfig(format!(
                "state tier {} requires threshold decryption from child {}",
                self.id, child_id
            )));
        }
        self.child_tallies
            .lock()
            .unwrap()
            .insert(child_id.to_string(), ciphertexts);
        self.child_uses_threshold
            .lock()
            .unwrap()
            .insert(child_id.to_string(), child_uses_threshold);
        Ok(())
    }

    /// Component-wise homomorphic sum over every child's latest tally.
    pub fn encrypted_aggregate(&self) -> Vec<BigInt> {
        let children = self.child_tallies.lock().unwrap();
        let mut iter = children.values();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut acc = first.clone();
        for tally in iter {
            for (slot, ct) in acc.iter_mut().zip(tally.iter()) {
                *slot = self.public_key.add(slot, ct);
            }
        }
        acc
    }

    /// Starts a ceremony over this tier's current encrypted aggregate.
    /// Requires `enable_threshold_decryption` to have been called.
    pub fn run_ceremony(&self, interval_number: i64, now: u64) -> ThresholdResult<String> {
        let guard = self.threshold.lock().unwrap();
        let ctx = guard.as_ref().ok_or_else(|| {
            ThresholdError::InvalidThresholdPollConfig(format!(
                "jurisdiction {} has no ceremony coordinator configured",
                self.id
            ))
        })?;
        let encrypted = self.encrypted_aggregate();
        Ok(ctx
            .coordinator
            .start_ceremony(&self.id, interval_number, encrypted, now))
    }

    /// Convenience wrapper for the National tier's terminal decryption
    /// (`intervalNumber = -1`, spec §4.9).
    pub fn perform_final_decryption(&self, now: u64) -> ThresholdResult<String> {
        if self.tier != JurisdictionTier::National {
            return Err(ThresholdError::InvalidThresholdPollConfig(
                "final decryption is only performed at the National tier".into(),
            ));
        }
        self.run_ceremony(FINAL_INTERVAL_NUMBER, now)
    }

    /// Builds and publishes an `IntervalTally` from a completed ceremony,
    /// then propagates it upward. Fails if the ceremony is not yet
    /// `Completed`.
    pub fn finalize_ceremony(
        &self,
        ceremony_id: &str,
        choices: Vec<String>,
        vote_count: u64,
        cumulative_vote_count: u64,
        now: u64,
    ) -> ThresholdResult<IntervalTally> {
        let guard = self.threshold.lock().unwrap();
        let ctx = guard.as_ref().ok_or_else(|| {
            ThresholdError::InvalidThresholdPollConfig(format!(
                "jurisdiction {} has no ceremony coordinator configured",
                self.id
            ))
        })?;
        let ceremony = ctx
            .coordinator
            .get_ceremony(ceremony_id)
            .ok_or_else(|| ThresholdError::CeremonyNotFound(ceremony_id.to_string()))?;
        if ceremony.status != CeremonyStatus::Completed {
            return Err(ThresholdError::CeremonyAlreadyComplete(format!(
                "ceremony {} is not completed",
                ceremony_id
            )));
        }
        let result = ceremony
            .result
            .ok_or_else(|| ThresholdError::CombineFailed("completed ceremony has no result".into()))?;

        let tally = IntervalTally {
            poll_id: self.id.clone(),
            interval_number: ceremony.interval_number,
            tallies: result.tallies,
            choices,
            vote_count,
            cumulative_vote_count,
            proof: Some(result.combined_proof),
            participating_guardians: result.participating_guardians,
            timestamp: now,
            is_final: ceremony.interval_number == FINAL_INTERVAL_NUMBER,
        };

        ctx.feed.publish(&self.id, tally.clone());
        drop(guard);
        self.propagate_to_parent(tally.clone());
        Ok(tally)
    }

    /// Indexes `tally` locally by interval number and forwards it to the
    /// parent tier, if any (spec §4.9). Every ancestor observes each
    /// propagated tally exactly once, in propagation order (P10).
    pub fn propagate_to_parent(&self, tally: IntervalTally) {
        let mut order = self.interval_order.lock().unwrap();
        self.interval_tallies
            .lock()
            .unwrap()
            .insert(tally.interval_number, tally.clone());
        order.push(tally.interval_number);
        drop(order);

        if let Some(parent) = self.parent.lock().unwrap().as_ref() {
            parent.propagate_to_parent(tally);
        }
    }

    pub fn tally_history(&self) -> Vec<IntervalTally> {
        let order = self.interval_order.lock().unwrap();
        let tallies = self.interval_tallies.lock().unwrap();
        order
            .iter()
            .filter_map(|n| tallies.get(n).cloned())
            .collect()
    }

    pub fn tally_at_interval(&self, interval_number: i64) -> Option<IntervalTally> {
        self.interval_tallies
            .lock()
            .unwrap()
            .get(&interval_number)
            .cloned()
    }

    /// National-tier consistency check (spec §4.9, P10): the final tally's
    /// cumulative vote count must be at least that of the last published
    /// interval tally.
    pub fn verify_consistency(&self, final_tally: &IntervalTally) -> bool {
        let last_interval = self
            .tally_history()
            .into_iter()
            .filter(|t| !t.is_final)
            .last();
        let last_cumulative = last_interval.map(|t| t.cumulative_vote_count).unwrap_or(0);
        final_tally.cumulative_vote_count >= last_cumulative
    }
}
