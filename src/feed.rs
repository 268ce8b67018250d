//! Publish/subscribe channel for published interval tallies, with per-poll
//! history and an interval-number index (spec §4.7).
//!
//! The subscriber-list-of-closures shape is the "plain vectors, invoked
//! synchronously" pattern spec §9's Design Notes call for; it mirrors the
//! listener lists already used in `ceremony.rs`/`guardian.rs`.

use crate::aggregate::IntervalTally;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct PollFeedState {
    history: Vec<IntervalTally>,
    by_interval: HashMap<i64, IntervalTally>,
    subscribers: Vec<Arc<dyn Fn(&IntervalTally) + Send + Sync>>,
}

impl PollFeedState {
    fn new() -> Self {
        Self {
            history: Vec::new(),
            by_interval: HashMap::new(),
            subscribers: Vec::new(),
        }
    }
}

/// A subscription handle carrying an unsubscribe capability (spec §4.7).
pub struct Subscription {
    poll_id: String,
    token: usize,
    feed: Arc<PublicTallyFeed>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.feed.unsubscribe(&self.poll_id, self.token);
    }
}

pub struct PublicTallyFeed {
    polls: Mutex<HashMap<String, PollFeedState>>,
}

impl PublicTallyFeed {
    pub fn new() -> Self {
        Self {
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Appends to history and the interval index, then fans out to every
    /// active subscriber for that poll, in publish order.
    pub fn publish(&self, poll_id: &str, tally: IntervalTally) {
        let mut polls = self.polls.lock().unwrap();
        let state = polls
            .entry(poll_id.to_string())
            .or_insert_with(PollFeedState::new);
        state.by_interval.insert(tally.interval_number, tally.clone());
        state.history.push(tally.clone());
        let subscribers = state.subscribers.clone();
        drop(polls);
        for subscriber in &subscribers {
            subscriber(&tally);
        }
    }

    /// Subscribes to a poll's feed. If a tally has already been published,
    /// it is delivered synchronously before this call returns (initial-state
    /// replay), ahead of any subsequently published tally.
    ///
    /// Takes `feed: &Arc<Self>` (rather than `&self`) so the returned
    /// [`Subscription`] can carry its own owning handle back to the feed for
    /// `unsubscribe`, without relying on unstable arbitrary-self-type support.
    pub fn subscribe<F>(feed: &Arc<Self>, poll_id: &str, callback: F) -> Subscription
    where
        F: Fn(&IntervalTally) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(&IntervalTally) + Send + Sync> = Arc::new(callback);
        let mut polls = feed.polls.lock().unwrap();
        let state = polls
            .entry(poll_id.to_string())
            .or_insert_with(PollFeedState::new);
        let token = state.subscribers.len();
        if let Some(latest) = state.history.last() {
            callback(latest);
        }
        state.subscribers.push(callback);
        drop(polls);
        Subscription {
            poll_id: poll_id.to_string(),
            token,
            feed: feed.clone(),
        }
    }

    fn unsubscribe(&self, poll_id: &str, token: usize) {
        let mut polls = self.polls.lock().unwrap();
        if let Some(state) = polls.get_mut(poll_id) {
            if token < state.subscribers.len() {
                // Tombstone rather than shift, to keep other subscribers'
                // earlier-issued tokens valid.
                state.subscribers[token] = Arc::new(|_: &IntervalTally| {});
            }
        }
    }

    pub fn current_tally(&self, poll_id: &str) -> Option<IntervalTally> {
        self.polls
            .lock()
            .unwrap()
            .get(poll_id)
            .and_then(|s| s.history.last().cloned())
    }

    pub fn history(&self, poll_id: &str) -> Vec<IntervalTally> {
        self.polls
            .lock()
            .unwrap()
            .get(poll_id)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    pub fn tally_at_interval(&self, poll_id: &str, interval_number: i64) -> Option<IntervalTally> {
        self.polls
            .lock()
            .unwrap()
            .get(poll_id)
            .and_then(|s| s.by_interval.get(&interval_number).cloned())
    }
}

impl Default for PublicTallyFeed {
    fn default() -> Self {
        Self::new()
    }
}
