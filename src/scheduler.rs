//! Interval scheduling: time-, vote-count-, and hybrid-triggered decryption
//! events with a minimum-interval rate limit, plus a final trigger on poll
//! close (spec §4.5).
//!
//! No direct corpus analog exists for this state machine (it is a plain
//! coordinator, not a crypto primitive); it follows the same
//! `Mutex`-guarded-state shape used throughout this crate's other
//! coordinators (`ceremony.rs`, `guardian.rs`), grounded in
//! `rotkonetworks-zeratul::dkg_coordinator`.

use crate::error::{ThresholdError, ThresholdResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    TimeBased,
    VoteCountBased,
    Hybrid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalConfig {
    pub trigger_type: TriggerType,
    pub time_interval_ms: Option<u64>,
    pub vote_count_interval: Option<u64>,
    pub minimum_interval_ms: u64,
    pub ceremony_timeout_ms: u64,
}

impl IntervalConfig {
    pub fn validate(&self) -> ThresholdResult<()> {
        match self.trigger_type {
            TriggerType::TimeBased => {
                if self.time_interval_ms.is_none_or_zero() {
                    return Err(ThresholdError::InvalidIntervalConfig(
                        "timeIntervalMs required for TimeBased".into(),
                    ));
                }
            }
            TriggerType::VoteCountBased => {
                if self.vote_count_interval.is_none_or_zero() {
                    return Err(ThresholdError::InvalidIntervalConfig(
                        "voteCountInterval required for VoteCountBased".into(),
                    ));
                }
            }
            TriggerType::Hybrid => {
                if self.time_interval_ms.is_none_or_zero() && self.vote_count_interval.is_none_or_zero()
                {
                    return Err(ThresholdError::InvalidIntervalConfig(
                        "Hybrid requires at least one of timeIntervalMs/voteCountInterval".into(),
                    ));
                }
            }
        }
        if self.ceremony_timeout_ms == 0 {
            return Err(ThresholdError::InvalidIntervalConfig(
                "ceremonyTimeoutMs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

trait OptionExt {
    fn is_none_or_zero(&self) -> bool;
}
impl OptionExt for Option<u64> {
    fn is_none_or_zero(&self) -> bool {
        matches!(self, None | Some(0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Unconfigured,
    Configured,
    Running,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalEvent {
    pub poll_id: String,
    pub interval_number: u64,
    pub reason: &'static str,
    pub timestamp: u64,
}

struct PollSchedule {
    config: Option<IntervalConfig>,
    state: SchedulerState,
    interval_number: u64,
    vote_count: u64,
    votes_since_last_trigger: u64,
    last_trigger_time: u64,
}

impl PollSchedule {
    fn new() -> Self {
        Self {
            config: None,
            state: SchedulerState::Unconfigured,
            interval_number: 0,
            vote_count: 0,
            votes_since_last_trigger: 0,
            last_trigger_time: 0,
        }
    }
}

/// Per-poll interval scheduling state machine:
/// `Unconfigured -> Configured <-> Running -> Stopped` (spec §4.5).
pub struct IntervalScheduler {
    polls: Mutex<HashMap<String, PollSchedule>>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self {
            polls: Mutex::new(HashMap::new()),
        }
    }

    pub fn configure(&self, poll_id: &str, config: IntervalConfig) -> ThresholdResult<()> {
        config.validate()?;
        let mut polls = self.polls.lock().unwrap();
        let schedule = polls.entry(poll_id.to_string()).or_insert_with(PollSchedule::new);
        if schedule.state == SchedulerState::Running {
            return Err(ThresholdError::PollSchedulingState(
                "cannot reconfigure a running poll".into(),
            ));
        }
        schedule.config = Some(config);
        schedule.state = SchedulerState::Configured;
        Ok(())
    }

    pub fn start(&self, poll_id: &str) -> ThresholdResult<()> {
        let mut polls = self.polls.lock().unwrap();
        let schedule = polls
            .get_mut(poll_id)
            .ok_or_else(|| ThresholdError::PollNotConfigured(poll_id.to_string()))?;
        if schedule.config.is_none() {
            return Err(ThresholdError::PollNotConfigured(poll_id.to_string()));
        }
        schedule.state = SchedulerState::Running;
        Ok(())
    }

    pub fn stop(&self, poll_id: &str) {
        let mut polls = self.polls.lock().unwrap();
        if let Some(schedule) = polls.get_mut(poll_id) {
            if schedule.state == SchedulerState::Running {
                schedule.state = SchedulerState::Configured;
            }
        }
        // Idempotent: stopping a poll that isn't running, or doesn't exist, is a no-op.
    }

    /// Called by an external timer tick. Only fires (returns `Some`) if the
    /// poll is running a Time-based/Hybrid scheduler and the minimum
    /// interval since the last trigger has elapsed.
    pub fn on_timer_tick(&self, poll_id: &str, now: u64) -> ThresholdResult<Option<IntervalEvent>> {
        let mut polls = self.polls.lock().unwrap();
        let schedule = polls
            .get_mut(poll_id)
            .ok_or_else(|| ThresholdError::PollNotConfigured(poll_id.to_string()))?;
        let config = schedule
            .config
            .clone()
            .ok_or_else(|| ThresholdError::PollNotConfigured(poll_id.to_string()))?;
        if schedule.state != SchedulerState::Running {
            return Ok(None);
        }
        if !matches!(config.trigger_type, TriggerType::TimeBased | TriggerType::Hybrid) {
            return Ok(None);
        }
        if now.saturating_sub(schedule.last_trigger_time) < config.minimum_interval_ms {
            return Ok(None);
        }
        schedule.last_trigger_time = now;
        schedule.interval_number += 1;
        tracing::debug!(poll_id, interval_number = schedule.interval_number, "time-based interval triggered");
        Ok(Some(IntervalEvent {
            poll_id: poll_id.to_string(),
            interval_number: schedule.interval_number,
            reason: "time",
            timestamp: now,
        }))
    }

    /// Called once per recorded vote. Increments counters and, for
    /// VoteCountBased/Hybrid schedulers, fires when the per-interval vote
    /// count threshold is reached (subject to the same rate limit).
    pub fn notify_vote(&self, poll_id: &str, now: u64) -> ThresholdResult<Option<IntervalEvent>> {
        let mut polls = self.polls.lock().unwrap();
        let schedule = polls
            .get_mut(poll_id)
            .ok_or_else(|| ThresholdError::PollNotConfigured(poll_id.to_string()))?;
        let config = schedule
            .config
            .clone()
            .ok_or_else(|| ThresholdError::PollNotConfigured(poll_id.to_string()))?;

        schedule.vote_count += 1;
        schedule.votes_since_last_trigger += 1;

        if schedule.state != SchedulerState::Running {
            return Ok(None);
        }
        if !matches!(config.trigger_type, TriggerType::VoteCountBased | TriggerType::Hybrid) {
            return Ok(None);
        }
        let Some(threshold) = config.vote_count_interval else {
            return Ok(None);
        };
        if schedule.votes_since_last_trigger < threshold {
            return Ok(None);
        }
        if now.saturating_sub(schedule.last_trigger_time) < config.minimum_interval_ms {
            return Ok(None);
        }

        schedule.votes_since_last_trigger = 0;
        schedule.last_trigger_time = now;
        schedule.interval_number += 1;
        Ok(Some(IntervalEvent {
            poll_id: poll_id.to_string(),
            interval_number: schedule.interval_number,
            reason: "vote-count",
            timestamp: now,
        }))
    }

    /// Bypasses the rate limit, stops the scheduler, and always emits
    /// exactly one event with reason `poll-close` (spec §4.5, P9).
    pub fn trigger_final(&self, poll_id: &str, now: u64) -> ThresholdResult<IntervalEvent> {
        let mut polls = self.polls.lock().unwrap();
        let schedule = polls
            .get_mut(poll_id)
            .ok_or_else(|| ThresholdError::PollNotConfigured(poll_id.to_string()))?;
        if schedule.config.is_none() {
            return Err(ThresholdError::PollNotConfigured(poll_id.to_string()));
        }
        schedule.state = SchedulerState::Stopped;
        schedule.interval_number += 1;
        Ok(IntervalEvent {
            poll_id: poll_id.to_string(),
            interval_number: schedule.interval_number,
            reason: "poll-close",
            timestamp: now,
        })
    }

    pub fn state(&self, poll_id: &str) -> Option<SchedulerState> {
        self.polls.lock().unwrap().get(poll_id).map(|s| s.state)
    }
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new()
    }
}
