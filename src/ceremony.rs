//! Ceremony lifecycle: replay-protected partial collection, completion and
//! timeout handling (spec §4.6).
//!
//! The nonce-identified session envelope follows `fs_dkr::add_party_message`
//! (a message bound to protocol state that existing parties react to); the
//! `Mutex<HashMap<_, _>>` ceremony map and completion-listener fan-out follow
//! `rotkonetworks-zeratul::dkg_coordinator`'s per-epoch DKG map.

use crate::combiner::{CombinedDecryption, DecryptionCombiner};
use crate::error::{ThresholdError, ThresholdResult};
use crate::keygen::{PublicKey, ThresholdConfig};
use crate::partial::{PartialDecryption, PartialDecryptionService};
use curv::BigInt;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CeremonyStatus {
    InProgress,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Clone, Debug)]
pub struct Ceremony {
    pub id: String,
    pub poll_id: String,
    pub interval_number: i64,
    pub nonce: [u8; 32],
    pub encrypted_tally: Vec<BigInt>,
    pub partials: HashMap<u16, PartialDecryption>,
    pub status: CeremonyStatus,
    pub started_at: u64,
    pub completed_at: Option<u64>,
    pub result: Option<CombinedDecryption>,
}

fn random_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Orchestrates ceremonies across polls. Holds only public/already-verified
/// material (verification keys, public key); Guardian shares never pass
/// through here.
pub struct CeremonyCoordinator {
    config: ThresholdConfig,
    public_key: PublicKey,
    verification_keys: Vec<BigInt>,
    theta: BigInt,
    ceremonies: Mutex<HashMap<String, Ceremony>>,
    listeners: Mutex<Vec<Box<dyn Fn(&Ceremony) + Send + Sync>>>,
}

impl CeremonyCoordinator {
    pub fn new(
        config: ThresholdConfig,
        public_key: PublicKey,
        verification_keys: Vec<BigInt>,
        theta: BigInt,
    ) -> Self {
        Self {
            config,
            public_key,
            verification_keys,
            theta,
            ceremonies: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn start_ceremony(
        &self,
        poll_id: &str,
        interval_number: i64,
        encrypted_tally: Vec<BigInt>,
        now: u64,
    ) -> String {
        let nonce = random_nonce();
        let id = hex::encode(nonce);
        let ceremony = Ceremony {
            id: id.clone(),
            poll_id: poll_id.to_string(),
            interval_number,
            nonce,
            encrypted_tally,
            partials: HashMap::new(),
            status: CeremonyStatus::InProgress,
            started_at: now,
            completed_at: None,
            result: None,
        };
        self.ceremonies.lock().unwrap().insert(id.clone(), ceremony);
        tracing::info!(ceremony_id = %id, poll_id, interval_number, "ceremony started");
        id
    }

    /// Sequential checks per spec §4.6; accepts the partial if all pass,
    /// attempting to combine once `k` partials have been accepted.
    pub fn submit_partial(
        &self,
        ceremony_id: &str,
        partial: PartialDecryption,
        now: u64,
    ) -> ThresholdResult<bool> {
        let mut ceremonies = self.ceremonies.lock().unwrap();
        let ceremony = ceremonies
            .get_mut(ceremony_id)
            .ok_or_else(|| ThresholdError::CeremonyNotFound(ceremony_id.to_string()))?;

        if ceremony.status != CeremonyStatus::InProgress {
            return Err(ThresholdError::CeremonyAlreadyComplete(ceremony_id.to_string()));
        }
        if ceremony.partials.contains_key(&partial.guardian_index) {
            return Err(ThresholdError::DuplicatePartialSubmission(
                partial.guardian_index,
            ));
        }
        if partial.ceremony_nonce != ceremony.nonce {
            return Err(ThresholdError::InvalidCeremonyPartialProof(
                "ceremony nonce mismatch".into(),
            ));
        }
        let idx = partial.guardian_index;
        if idx == 0 || idx as usize > self.verification_keys.len() {
            return Err(ThresholdError::InvalidCeremonyPartialProof(
                "guardian index out of range".into(),
            ));
        }
        let vk = &self.verification_keys[(idx - 1) as usize];
        if !PartialDecryptionService::verify(&partial, &ceremony.encrypted_tally, vk, &self.public_key) {
            return Err(ThresholdError::InvalidCeremonyPartialProof(
                "zk proof verification failed".into(),
            ));
        }

        ceremony.partials.insert(idx, partial);

        let should_combine = ceremony.partials.len() >= self.config.threshold as usize;
        if should_combine {
            let partials: Vec<PartialDecryption> = ceremony.partials.values().cloned().collect();
            match DecryptionCombiner::combine(
                &partials,
                &ceremony.encrypted_tally,
                &self.verification_keys,
                &self.public_key,
                &self.theta,
                &self.config,
                now,
            ) {
                Ok(result) => {
                    ceremony.status = CeremonyStatus::Completed;
                    ceremony.completed_at = Some(now);
                    ceremony.result = Some(result);
                }
                Err(_) => {
                    ceremony.status = CeremonyStatus::Failed;
                    ceremony.completed_at = Some(now);
                }
            }
            let snapshot = ceremony.clone();
            drop(ceremonies);
            for listener in self.listeners.lock().unwrap().iter() {
                listener(&snapshot);
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// No-op on a terminal ceremony; otherwise marks it timed out.
    pub fn handle_timeout(&self, ceremony_id: &str, now: u64) {
        let mut ceremonies = self.ceremonies.lock().unwrap();
        if let Some(ceremony) = ceremonies.get_mut(ceremony_id) {
            if ceremony.status == CeremonyStatus::InProgress {
                ceremony.status = CeremonyStatus::TimedOut;
                ceremony.completed_at = Some(now);
                tracing::warn!(ceremony_id, "ceremony timed out");
            }
        }
    }

    pub fn get_ceremony(&self, ceremony_id: &str) -> Option<Ceremony> {
        self.ceremonies.lock().unwrap().get(ceremony_id).cloned()
    }

    pub fn ceremonies_for_poll(&self, poll_id: &str) -> Vec<Ceremony> {
        self.ceremonies
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.poll_id == poll_id)
            .cloned()
            .collect()
    }

    pub fn on_ceremony_complete<F>(&self, listener: F)
    where
        F: Fn(&Ceremony) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::{KeyGenerator, MIN_KEY_BIT_LENGTH};

    fn coordinator_with_tally() -> (CeremonyCoordinator, crate::keygen::ThresholdKeyPair, Vec<BigInt>) {
        let keypair =
            KeyGenerator::generate(ThresholdConfig::new(3, 2, MIN_KEY_BIT_LENGTH)).unwrap();
        let coordinator = CeremonyCoordinator::new(
            keypair.config.clone(),
            keypair.public_key.clone(),
            keypair.verification_keys.clone(),
            keypair.theta.clone(),
        );
        let encrypted_tally = vec![BigInt::from(999)];
        (coordinator, keypair, encrypted_tally)
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let (coordinator, keypair, encrypted_tally) = coordinator_with_tally();
        let id = coordinator.start_ceremony("poll-1", 1, encrypted_tally.clone(), 0);
        let ceremony = coordinator.get_ceremony(&id).unwrap();
        let partial = PartialDecryptionService::compute(
            &encrypted_tally,
            &keypair.key_shares[0],
            ceremony.nonce,
            &keypair.public_key,
            0,
        )
        .unwrap();
        coordinator.submit_partial(&id, partial.clone(), 1).unwrap();
        assert!(matches!(
            coordinator.submit_partial(&id, partial, 2),
            Err(ThresholdError::DuplicatePartialSubmission(_))
        ));
    }

    #[test]
    fn nonce_mismatch_is_rejected() {
        let (coordinator, keypair, encrypted_tally) = coordinator_with_tally();
        let id = coordinator.start_ceremony("poll-1", 1, encrypted_tally.clone(), 0);
        let wrong_nonce = [0xAAu8; 32];
        let partial = PartialDecryptionService::compute(
            &encrypted_tally,
            &keypair.key_shares[0],
            wrong_nonce,
            &keypair.public_key,
            0,
        )
        .unwrap();
        assert!(matches!(
            coordinator.submit_partial(&id, partial, 1),
            Err(ThresholdError::InvalidCeremonyPartialProof(_))
        ));
    }

    #[test]
    fn completes_once_threshold_partials_arrive() {
        let (coordinator, keypair, encrypted_tally) = coordinator_with_tally();
        let id = coordinator.start_ceremony("poll-1", 1, encrypted_tally.clone(), 0);
        let ceremony = coordinator.get_ceremony(&id).unwrap();

        for share in &keypair.key_shares[0..2] {
            let partial = PartialDecryptionService::compute(
                &encrypted_tally,
                share,
                ceremony.nonce,
                &keypair.public_key,
                0,
            )
            .unwrap();
            coordinator.submit_partial(&id, partial, 1).unwrap();
        }

        let ceremony = coordinator.get_ceremony(&id).unwrap();
        assert_eq!(ceremony.status, CeremonyStatus::Completed);
        assert!(ceremony.result.is_some());
    }

    #[test]
    fn timeout_is_noop_on_terminal_ceremony() {
        let (coordinator, keypair, encrypted_tally) = coordinator_with_tally();
        let id = coordinator.start_ceremony("poll-1", 1, encrypted_tally.clone(), 0);
        let ceremony = coordinator.get_ceremony(&id).unwrap();
        for share in &keypair.key_shares[0..2] {
            let partial = PartialDecryptionService::compute(
                &encrypted_tally,
                share,
                ceremony.nonce,
                &keypair.public_key,
                0,
            )
            .unwrap();
            coordinator.submit_partial(&id, partial, 1).unwrap();
        }
        coordinator.handle_timeout(&id, 99);
        assert_eq!(
            coordinator.get_ceremony(&id).unwrap().status,
            CeremonyStatus::Completed
        );
    }
}
