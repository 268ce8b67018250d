//! Third-party verification of a published `IntervalTally` from public
//! inputs only (spec §4.8).
//!
//! The four-independent-checks-plus-concatenated-error shape mirrors the
//! multi-predicate verification reports used across the pack's
//! `zk-paillier`-style proof verifiers, which return a structured
//! pass/fail rather than stopping at the first failure.

use crate::aggregate::IntervalTally;
use crate::combiner::DecryptionCombiner;
use crate::keygen::PublicKey;
use curv::arithmetic::traits::*;
use curv::BigInt;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationChecks {
    pub proof_valid: bool,
    pub guardians_authorized: bool,
    pub tally_matches_encrypted: bool,
    pub timestamp_valid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    pub valid: bool,
    pub checks: VerificationChecks,
    pub error: Option<String>,
}

pub struct TallyVerifier;

impl TallyVerifier {
    /// Runs all four checks from spec §4.8 independently and returns a
    /// structured report; a human-readable concatenated error is present
    /// whenever any check fails.
    pub fn verify(
        tally: &IntervalTally,
        encrypted_tally: &[BigInt],
        _verification_keys: &[BigInt],
        _public_key: &PublicKey,
        registered_guardians: &[u16],
        threshold: u16,
        total_shares: u16,
    ) -> VerificationReport {
        let mut checks = VerificationChecks::default();
        let mut failures = Vec::new();

        checks.proof_valid = tally
            .proof
            .as_ref()
            .map(|proof| {
                let combined = crate::combiner::CombinedDecryption {
                    tallies: tally.tallies.clone(),
                    combined_proof: proof.clone(),
                    participating_guardians: tally.participating_guardians.clone(),
                    ceremony_id: String::new(),
                    timestamp: tally.timestamp,
                };
                DecryptionCombiner::verify_combined(&combined, encrypted_tally, total_shares)
            })
            .unwrap_or(false);
        if !checks.proof_valid {
            failures.push("proof is missing or fails structural verification".to_string());
        }

        checks.guardians_authorized = tally.participating_guardians.len() >= threshold as usize
            && tally
                .participating_guardians
                .iter()
                .all(|idx| registered_guardians.contains(idx));
        if !checks.guardians_authorized {
            failures.push("participating guardians are not all authorized, or below threshold".to_string());
        }

        checks.tally_matches_encrypted = tally.tallies.len() == encrypted_tally.len()
            && tally.tallies.iter().all(|t| *t >= BigInt::zero());
        if !checks.tally_matches_encrypted {
            failures.push("tally shape does not match the encrypted input, or contains a negative value".to_string());
        }

        checks.timestamp_valid = tally.timestamp > 0;
        if !checks.timestamp_valid {
            failures.push("timestamp must be positive".to_string());
        }

        let valid = checks.proof_valid
            && checks.guardians_authorized
            && checks.tally_matches_encrypted
            && checks.timestamp_valid;

        VerificationReport {
            valid,
            checks,
            error: if failures.is_empty() {
                None
            } else {
                Some(failures.join("; "))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::{KeyGenerator, ThresholdConfig, MIN_KEY_BIT_LENGTH};
    use crate::partial::PartialDecryptionService;

    fn encrypt(public_key: &PublicKey, value: u64, randomness: &BigInt) -> BigInt {
        let n_squared = public_key.n_squared();
        let gm = crate::bigint::mod_exp(&public_key.g, &BigInt::from(value as i64), &n_squared);
        let rn = crate::bigint::mod_exp(randomness, &public_key.n, &n_squared);
        BigInt::mod_mul(&gm, &rn, &n_squared)
    }

    fn fresh_randomness(public_key: &PublicKey) -> BigInt {
        loop {
            let r = crate::bigint::sample_below(&public_key.n);
            if r != BigInt::zero() {
                return r;
            }
        }
    }

    #[test]
    fn accepts_a_well_formed_tally() {
        let keypair =
            KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
        let r = fresh_randomness(&keypair.public_key);
        let ciphertext = encrypt(&keypair.public_key, 7, &r);
        let encrypted_tally = vec![ciphertext];
        let nonce = [1u8; 32];
        let partials: Vec<_> = keypair.key_shares[0..2]
            .iter()
            .map(|s| {
                PartialDecryptionService::compute(&encrypted_tally, s, nonce, &keypair.public_key, 1)
                    .unwrap()
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

        let tally = IntervalTally {
            poll_id: "poll-1".into(),
            interval_number: 1,
            tallies: combined.tallies.clone(),
            choices: vec!["yes".into()],
            vote_count: 1,
            cumulative_vote_count: 1,
            proof: Some(combined.combined_proof.clone()),
            participating_guardians: combined.participating_guardians.clone(),
            timestamp: 1,
            is_final: false,
        };

        let report = TallyVerifier::verify(
            &tally,
            &encrypted_tally,
            &keypair.verification_keys,
            &keypair.public_key,
            &[1, 2, 3],
            2,
            3,
        );
        assert!(report.valid, "{:?}", report.error);
    }

    #[test]
    fn rejects_unauthorized_guardian_participation() {
        let tally = IntervalTally {
            poll_id: "poll-1".into(),
            interval_number: 1,
            tallies: vec![BigInt::from(7)],
            choices: vec!["yes".into()],
            vote_count: 1,
            cumulative_vote_count: 1,
            proof: None,
            participating_guardians: vec![99],
            timestamp: 1,
            is_final: false,
        };
        let keypair =
            KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
        let report = TallyVerifier::verify(
            &tally,
            &[BigInt::from(1)],
            &keypair.verification_keys,
            &keypair.public_key,
            &[1, 2, 3],
            2,
            3,
        );
        assert!(!report.valid);
        assert!(!report.checks.guardians_authorized);
    }

    #[test]
    fn rejects_zero_timestamp() {
        let tally = IntervalTally {
            poll_id: "poll-1".into(),
            interval_number: 1,
            tallies: vec![BigInt::from(7)],
            choices: vec!["yes".into()],
            vote_count: 1,
            cumulative_vote_count: 1,
            proof: None,
            participating_guardians: vec![1, 2],
            timestamp: 0,
            is_final: false,
        };
        let keypair =
            KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
        let report = TallyVerifier::verify(
            &tally,
            &[BigInt::from(1)],
            &keypair.verification_keys,
            &keypair.public_key,
            &[1, 2, 3],
            2,
            3,
        );
        assert!(!report.checks.timestamp_valid);
    }
}
