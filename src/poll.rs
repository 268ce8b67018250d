//! `ThresholdPoll`: binds a poll's encrypted-vote store to a scheduler,
//! ceremony coordinator and tally feed, plus the `Factory` that validates
//! Guardian availability before a poll is allowed to start (spec §4.11).

use crate::aggregate::Precinct;
use crate::audit::{AuditRecord, MetadataValue, ThresholdAuditLog};
use crate::ceremony::CeremonyCoordinator;
use crate::error::{ThresholdError, ThresholdResult};
use crate::feed::PublicTallyFeed;
use crate::guardian::GuardianRegistry;
use crate::ids::PollId;
use crate::keygen::{PublicKey, ThresholdConfig};
use crate::scheduler::{IntervalConfig, IntervalEvent, IntervalScheduler};
use curv::BigInt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteReceipt {
    pub voter_id: String,
    pub sequence: u64,
    pub timestamp: u64,
}

struct InnerPoll {
    precinct: Precinct,
    votes_cast: u64,
    closed: bool,
}

/// Composes vote accumulation, scheduling, ceremony coordination and the
/// public feed behind one id (spec §4.11). Vote ciphertexts flow in
/// through `vote`; decrypted tallies flow out through `feed`.
pub struct ThresholdPoll {
    pub id: PollId,
    inner: Mutex<InnerPoll>,
    pub scheduler: Arc<IntervalScheduler>,
    pub coordinator: Arc<CeremonyCoordinator>,
    pub feed: Arc<PublicTallyFeed>,
    pub registry: Arc<GuardianRegistry>,
}

impl ThresholdPoll {
    /// Encrypts nothing itself: `ciphertexts` must already be under the
    /// poll's public key. Delegates to the inner vote store, then notifies
    /// the scheduler (spec §4.11).
    pub fn vote(
        &self,
        voter_id: &str,
        ciphertexts: Vec<BigInt>,
        now: u64,
    ) -> ThresholdResult<(VoteReceipt, Option<IntervalEvent>)> {
        let receipt = {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return Err(ThresholdError::InvalidThresholdPollConfig(
                    "poll is closed".into(),
                ));
            }
            inner.precinct.cast_vote(voter_id, ciphertexts)?;
            inner.votes_cast += 1;
            VoteReceipt {
                voter_id: voter_id.to_string(),
                sequence: inner.votes_cast,
                timestamp: now,
            }
        };
        let event = self.scheduler.notify_vote(self.id.as_str(), now)?;
        Ok((receipt, event))
    }

    /// Marks the poll closed and forces a final scheduler trigger (spec
    /// §4.11).
    pub fn close(&self, now: u64) -> ThresholdResult<IntervalEvent> {
        self.inner.lock().unwrap().closed = true;
        self.scheduler.trigger_final(self.id.as_str(), now)
    }

    pub fn vote_count(&self) -> u64 {
        self.inner.lock().unwrap().votes_cast
    }

    pub fn encrypted_tally(&self) -> Vec<BigInt> {
        self.inner.lock().unwrap().precinct.encrypted_tally()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

/// Validates Guardian availability and registry/config consistency before
/// a poll may be created, and records the founding audit entry (spec
/// §4.11).
pub struct ThresholdPollFactory;

impl ThresholdPollFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        poll_id: PollId,
        config: &ThresholdConfig,
        public_key: PublicKey,
        verification_keys: Vec<BigInt>,
        theta: BigInt,
        registry: Arc<GuardianRegistry>,
        interval_config: IntervalConfig,
        audit: &ThresholdAuditLog,
        now: u64,
    ) -> ThresholdResult<ThresholdPoll> {
        config.validate()?;
        interval_config.validate()?;

        if registry.count() as u16 != config.total_shares {
            return Err(ThresholdError::InvalidThresholdPollConfig(format!(
                "registry has {} guardians, config expects {}",
                registry.count(),
                config.total_shares
            )));
        }
        let available = registry.available_count();
        if available < config.threshold as usize {
            return Err(ThresholdError::InsufficientGuardians {
                have: available,
                need: config.threshold as usize,
            });
        }

        let scheduler = Arc::new(IntervalScheduler::new());
        scheduler.configure(poll_id.as_str(), interval_config)?;
        scheduler.start(poll_id.as_str())?;

        let coordinator = Arc::new(CeremonyCoordinator::new(
            config.clone(),
            public_key.clone(),
            verification_keys,
            theta,
        ));
        let feed = Arc::new(PublicTallyFeed::new());

        let mut metadata = BTreeMap::new();
        metadata.insert(
            "totalShares".to_string(),
            MetadataValue::Number(config.total_shares as i64),
        );
        metadata.insert(
            "threshold".to_string(),
            MetadataValue::Number(config.threshold as i64),
        );
        audit.record_key_generation(
            now,
            AuditRecord {
                poll_id: Some(poll_id.as_str().to_string()),
                metadata,
                ..Default::default()
            },
        );

        Ok(ThresholdPoll {
            inner: Mutex::new(InnerPoll {
                precinct: Precinct::new(poll_id.as_str(), public_key),
                votes_cast: 0,
                closed: false,
            }),
            id: poll_id,
            scheduler,
            coordinator,
            feed,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Ed25519Authority;
    use crate::guardian::GuardianStatus;
    use crate::ids::GuardianId;
    use crate::keygen::{KeyGenerator, MIN_KEY_BIT_LENGTH};
    use crate::scheduler::TriggerType;
    use rand::rngs::OsRng;

    fn interval_config() -> IntervalConfig {
        IntervalConfig {
            trigger_type: TriggerType::VoteCountBased,
            time_interval_ms: None,
            vote_count_interval: Some(2),
            minimum_interval_ms: 0,
            ceremony_timeout_ms: 1000,
        }
    }

    fn filled_registry(keypair: &crate::keygen::ThresholdKeyPair) -> Arc<GuardianRegistry> {
        let registry = Arc::new(GuardianRegistry::new(keypair.config.total_shares));
        for share in &keypair.key_shares {
            registry
                .register(
                    GuardianId::new(format!("g{}", share.index)),
                    format!("guardian-{}", share.index),
                    share.index,
                    share.verification_key.clone(),
                )
                .unwrap();
            registry
                .update_status(&GuardianId::new(format!("g{}", share.index)), GuardianStatus::Online, 0)
                .unwrap();
        }
        registry
    }

    #[test]
    fn factory_rejects_insufficient_available_guardians() {
        let keypair =
            KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
        let registry = Arc::new(GuardianRegistry::new(3));
        registry
            .register(GuardianId::new("g1"), "g1".into(), 1, keypair.verification_keys[0].clone())
            .unwrap();
        let audit = ThresholdAuditLog::new(Box::new(Ed25519Authority::generate(&mut OsRng)));

        let result = ThresholdPollFactory::create(
            PollId::new("poll-1"),
            &keypair.config,
            keypair.public_key.clone(),
            keypair.verification_keys.clone(),
            keypair.theta.clone(),
            registry,
            interval_config(),
            &audit,
            1,
        );
        assert!(matches!(
            result,
            Err(ThresholdError::InvalidThresholdPollConfig(_))
        ));
    }

    #[test]
    fn vote_and_close_drive_the_scheduler() {
        let keypair =
            KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
        let registry = filled_registry(&keypair);
        let audit = ThresholdAuditLog::new(Box::new(Ed25519Authority::generate(&mut OsRng)));

        let poll = ThresholdPollFactory::create(
            PollId::new("poll-1"),
            &keypair.config,
            keypair.public_key.clone(),
            keypair.verification_keys.clone(),
            keypair.theta.clone(),
            registry,
            interval_config(),
            &audit,
            1,
        )
        .unwrap();

        let r = crate::bigint::sample_below(&keypair.public_key.n);
        let ct = crate::bigint::mod_exp(&keypair.public_key.g, &BigInt::from(1), &keypair.public_key.n_squared());
        let _ = r;

        let (_receipt1, event1) = poll.vote("voter-1", vec![ct.clone()], 10).unwrap();
        assert!(event1.is_none());
        let (_receipt2, event2) = poll.vote("voter-2", vec![ct], 11).unwrap();
        assert!(event2.is_some());

        assert_eq!(poll.vote_count(), 2);
        let close_event = poll.close(20).unwrap();
        assert_eq!(close_event.reason, "poll-close");
        assert!(poll.is_closed());
        assert_eq!(audit.len(), 1);
    }
}
