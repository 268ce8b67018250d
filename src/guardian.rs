//! Guardian registry: enforces unique ids/indices, tracks status, and
//! notifies listeners of status transitions (spec §4.4).
//!
//! The `Mutex<HashMap<_, _>>` shape and status-change notification pattern
//! follow `rotkonetworks-zeratul::dkg_coordinator`'s `DKGCoordinator`,
//! adapted from per-epoch DKG state to a flat per-poll registry.

use crate::error::{ThresholdError, ThresholdResult};
use crate::ids::GuardianId;
use curv::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardianStatus {
    Registered,
    Online,
    Offline,
    Unavailable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Guardian {
    pub id: GuardianId,
    pub name: String,
    pub share_index: u16,
    #[serde(with = "crate::codec::serde_bigint")]
    pub verification_key: BigInt,
    pub status: GuardianStatus,
    pub backup_id: Option<GuardianId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChangeEvent {
    pub guardian_id: GuardianId,
    pub previous_status: GuardianStatus,
    pub new_status: GuardianStatus,
    pub timestamp: u64,
}

struct RegistryState {
    by_id: HashMap<GuardianId, Guardian>,
    index_in_use: HashMap<u16, GuardianId>,
}

/// Enforces `n` unique Guardians with indices `1..=n` (spec §4.4
/// invariants). Thread-safe by construction (`Mutex`-wrapped), per the
/// concurrency model's "wrap each component with a per-instance lock"
/// guidance (spec §5) — cheap when single-threaded, correct when not.
pub struct GuardianRegistry {
    capacity: u16,
    state: Mutex<RegistryState>,
    listeners: Mutex<Vec<Box<dyn Fn(&StatusChangeEvent) + Send + Sync>>>,
}

impl GuardianRegistry {
    pub fn new(capacity: u16) -> Self {
        Self {
            capacity,
            state: Mutex::new(RegistryState {
                by_id: HashMap::new(),
                index_in_use: HashMap::new(),
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn register(
        &self,
        id: GuardianId,
        name: String,
        share_index: u16,
        verification_key: BigInt,
    ) -> ThresholdResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.by_id.contains_key(&id) {
            return Err(ThresholdError::GuardianAlreadyRegistered(id.to_string()));
        }
        // Checked ahead of share-index validity: once every slot is taken,
        // any further registration is a capacity problem, not an index one.
        if state.by_id.len() as u16 >= self.capacity {
            return Err(ThresholdError::RegistryFull {
                capacity: self.capacity,
            });
        }
        if share_index == 0 || share_index > self.capacity {
            return Err(ThresholdError::InvalidShareIndex(share_index));
        }
        if state.index_in_use.contains_key(&share_index) {
            return Err(ThresholdError::InvalidShareIndex(share_index));
        }

        state.index_in_use.insert(share_index, id.clone());
        state.by_id.insert(
            id.clone(),
            Guardian {
                id,
                name,
                share_index,
                verification_key,
                status: GuardianStatus::Registered,
                backup_id: None,
            },
        );
        tracing::info!(share_index, "guardian registered");
        Ok(())
    }

    pub fn update_status(
        &self,
        id: &GuardianId,
        new_status: GuardianStatus,
        timestamp: u64,
    ) -> ThresholdResult<()> {
        let mut state = self.state.lock().unwrap();
        let guardian = state
            .by_id
            .get_mut(id)
            .ok_or_else(|| ThresholdError::GuardianNotFound(id.to_string()))?;
        let previous_status = guardian.status;
        if previous_status == new_status {
            return Ok(());
        }
        guardian.status = new_status;
        drop(state);

        let event = StatusChangeEvent {
            guardian_id: id.clone(),
            previous_status,
            new_status,
            timestamp,
        };
        for listener in self.listeners.lock().unwrap().iter() {
            listener(&event);
        }
        Ok(())
    }

    pub fn designate_backup(&self, primary: &GuardianId, backup: &GuardianId) -> ThresholdResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.by_id.contains_key(backup) {
            return Err(ThresholdError::GuardianNotFound(backup.to_string()));
        }
        let guardian = state
            .by_id
            .get_mut(primary)
            .ok_or_else(|| ThresholdError::GuardianNotFound(primary.to_string()))?;
        guardian.backup_id = Some(backup.clone());
        Ok(())
    }

    pub fn get(&self, id: &GuardianId) -> Option<Guardian> {
        self.state.lock().unwrap().by_id.get(id).cloned()
    }

    pub fn get_by_index(&self, index: u16) -> Option<Guardian> {
        let state = self.state.lock().unwrap();
        let id = state.index_in_use.get(&index)?;
        state.by_id.get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().by_id.len()
    }

    pub fn available_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .by_id
            .values()
            .filter(|g| matches!(g.status, GuardianStatus::Online | GuardianStatus::Registered))
            .count()
    }

    pub fn all(&self) -> Vec<Guardian> {
        self.state.lock().unwrap().by_id.values().cloned().collect()
    }

    pub fn on_status_change<F>(&self, listener: F)
    where
        F: Fn(&StatusChangeEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }
}
