//! Match registry: per-match state, participants and lifecycle

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::settlement::MatchResult;
use crate::ws::protocol::ServerMsg;

use super::physics::{PhysicsSystem, StepOutcome};
use super::state::{MatchState, Side};
use super::ticker::TickerHandle;
use super::MAX_PARTICIPANTS;

/// Buffered messages per match before slow subscribers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared handle to one registry entry
pub type MatchHandle = Arc<Mutex<MatchEntry>>;

/// Why a participant could not be added
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Match {0} already has two players")]
    MatchFull(String),

    #[error("Match {0} does not exist")]
    MatchNotFound(String),

    #[error("Connection has not registered an identity")]
    NotRegistered,
}

impl JoinError {
    /// Short machine-readable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            JoinError::MatchFull(_) => "match_full",
            JoinError::MatchNotFound(_) => "match_not_found",
            JoinError::NotRegistered => "not_registered",
        }
    }
}

/// One match: simulation state plus the metadata around it
pub struct MatchEntry {
    pub id: String,
    /// Distinguishes this entry from a later one reusing the same id
    pub instance: Uuid,
    pub state: MatchState,
    /// Ordered; index is the participant's side
    pub participants: Vec<String>,
    /// Opaque stake metadata, passed through untouched
    pub stake: Option<Value>,
    running: bool,
    finished: bool,
    rng: ChaCha8Rng,
    events_tx: broadcast::Sender<ServerMsg>,
    ticker: Option<TickerHandle>,
}

impl MatchEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_seed(id, rand::random::<u64>())
    }

    /// Entry with a fixed RNG seed for serve direction
    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id: id.into(),
            instance: Uuid::new_v4(),
            state: MatchState::default(),
            participants: Vec::with_capacity(MAX_PARTICIPANTS),
            stake: None,
            running: false,
            finished: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
            events_tx,
            ticker: None,
        }
    }

    /// Add a participant. Returns `Ok(false)` if already present.
    pub fn add_participant(&mut self, participant: &str) -> Result<bool, JoinError> {
        if self.participants.iter().any(|p| p == participant) {
            return Ok(false);
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(JoinError::MatchFull(self.id.clone()));
        }
        self.participants.push(participant.to_string());
        Ok(true)
    }

    /// Remove a participant. Returns whether it was present.
    pub fn remove_participant(&mut self, participant: &str) -> bool {
        match self.participants.iter().position(|p| p == participant) {
            Some(index) => {
                self.participants.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current side of a participant, if any
    pub fn side_of(&self, participant: &str) -> Option<Side> {
        self.participants
            .iter()
            .position(|p| p == participant)
            .and_then(Side::from_index)
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= MAX_PARTICIPANTS
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Flip to running. Returns false if the match already started.
    pub fn mark_running(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// Fan a message out to every subscriber. Never blocks.
    pub fn broadcast(&self, msg: ServerMsg) -> usize {
        self.events_tx.send(msg).unwrap_or(0)
    }

    pub fn attach_ticker(&mut self, ticker: TickerHandle) {
        if let Some(old) = self.ticker.replace(ticker) {
            old.abort();
        }
    }

    /// Abort the tick loop, if one is attached
    pub fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Run one frame and broadcast the result.
    ///
    /// Returns the final result when this frame ended the match. Further calls
    /// after that are ignored.
    pub fn tick(&mut self) -> Option<MatchResult> {
        if self.finished {
            return None;
        }

        let outcome = PhysicsSystem::step(&mut self.state, &mut self.rng);
        self.broadcast(ServerMsg::GameState(self.state.clone()));

        match outcome {
            StepOutcome::Continue => None,
            StepOutcome::MatchOver { winner } => {
                self.finished = true;
                let winner = self.participants.get(winner.index()).cloned();
                self.broadcast(ServerMsg::GameOver {
                    winner: winner.clone(),
                });
                Some(MatchResult {
                    match_id: self.id.clone(),
                    winner,
                    participants: self.participants.clone(),
                    stake: self.stake.clone(),
                    score1: self.state.score1,
                    score2: self.state.score2,
                    finished_at: chrono::Utc::now(),
                })
            }
        }
    }
}

/// Registry of all live matches.
///
/// Lock order is always map shard, then entry mutex. Nothing may touch the
/// map while holding an entry lock.
pub struct MatchRegistry {
    matches: DashMap<String, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    /// Existing entry or a fresh default one
    pub fn ensure(&self, id: &str) -> MatchHandle {
        self.matches
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(match_id = %id, "Creating match");
                Arc::new(Mutex::new(MatchEntry::new(id)))
            })
            .value()
            .clone()
    }

    /// Ensure the entry exists and run `f` on it while it cannot be removed
    pub fn ensure_with<T>(&self, id: &str, f: impl FnOnce(&mut MatchEntry) -> T) -> T {
        let slot = self.matches.entry(id.to_string()).or_insert_with(|| {
            debug!(match_id = %id, "Creating match");
            Arc::new(Mutex::new(MatchEntry::new(id)))
        });
        let mut entry = slot.value().lock();
        f(&mut entry)
    }

    pub fn get(&self, id: &str) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    /// Add a participant to an existing match; returns the new count
    pub fn add_participant(&self, id: &str, participant: &str) -> Result<usize, JoinError> {
        let slot = self
            .matches
            .get(id)
            .ok_or_else(|| JoinError::MatchNotFound(id.to_string()))?;
        let mut entry = slot.value().lock();
        entry.add_participant(participant)?;
        Ok(entry.participants.len())
    }

    /// Remove a participant; drops the whole match once nobody is left.
    /// Returns true if the match was deleted.
    pub fn remove_participant(&self, id: &str, participant: &str) -> bool {
        self.remove_participant_where(id, participant, None)
    }

    /// Same as `remove_participant`, but a no-op unless `id` still refers to
    /// the given instance
    pub fn remove_participant_from(&self, id: &str, instance: Uuid, participant: &str) -> bool {
        self.remove_participant_where(id, participant, Some(instance))
    }

    fn remove_participant_where(
        &self,
        id: &str,
        participant: &str,
        expected: Option<Uuid>,
    ) -> bool {
        let emptied = {
            let Some(slot) = self.matches.get(id) else {
                return false;
            };
            let mut entry = slot.value().lock();
            if expected.is_some_and(|instance| instance != entry.instance) {
                debug!(
                    match_id = %id,
                    participant = %participant,
                    "Stale match instance, leave skipped"
                );
                return false;
            }
            if !entry.remove_participant(participant) {
                return false;
            }
            let instance = entry.instance;
            let empty = entry.participants.is_empty();
            empty.then_some(instance)
        };

        match emptied {
            Some(instance) => {
                let removed = self.delete_instance(id, instance);
                if removed {
                    info!(match_id = %id, "Last participant left, match discarded");
                }
                removed
            }
            None => false,
        }
    }

    /// Remove a match unconditionally
    pub fn delete(&self, id: &str) -> bool {
        match self.matches.remove(id) {
            Some((_, handle)) => {
                handle.lock().stop_ticker();
                true
            }
            None => false,
        }
    }

    /// Remove a match only if it is still the given instance
    pub fn delete_instance(&self, id: &str, instance: Uuid) -> bool {
        match self
            .matches
            .remove_if(id, |_, handle| handle.lock().instance == instance)
        {
            Some((_, handle)) => {
                handle.lock().stop_ticker();
                true
            }
            None => false,
        }
    }

    /// Whether `id` still refers to the given instance
    pub fn is_current(&self, id: &str, instance: Uuid) -> bool {
        self.matches
            .get(id)
            .is_some_and(|m| m.value().lock().instance == instance)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_participants(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().lock().participants.len())
            .sum()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_idempotent() {
        let registry = MatchRegistry::new();
        let a = registry.ensure("A-B");
        let b = registry.ensure("A-B");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.active_matches(), 1);
    }

    #[test]
    fn third_participant_is_rejected() {
        let registry = MatchRegistry::new();
        registry.ensure("A-B");
        assert_eq!(registry.add_participant("A-B", "A"), Ok(1));
        assert_eq!(registry.add_participant("A-B", "B"), Ok(2));
        assert_eq!(
            registry.add_participant("A-B", "C"),
            Err(JoinError::MatchFull("A-B".into()))
        );
        let handle = registry.get("A-B").unwrap();
        assert_eq!(handle.lock().participants, vec!["A", "B"]);
    }

    #[test]
    fn duplicate_participant_is_noop() {
        let registry = MatchRegistry::new();
        registry.ensure("A-B");
        registry.add_participant("A-B", "A").unwrap();
        assert_eq!(registry.add_participant("A-B", "A"), Ok(1));
    }

    #[test]
    fn add_to_missing_match_fails() {
        let registry = MatchRegistry::new();
        assert_eq!(
            registry.add_participant("nope", "A"),
            Err(JoinError::MatchNotFound("nope".into()))
        );
    }

    #[test]
    fn last_leave_discards_state() {
        let registry = MatchRegistry::new();
        registry.ensure("A-B");
        registry.add_participant("A-B", "A").unwrap();
        registry.add_participant("A-B", "B").unwrap();
        registry.get("A-B").unwrap().lock().state.score1 = 3;

        assert!(!registry.remove_participant("A-B", "A"));
        assert!(registry.get("A-B").is_some());
        assert!(registry.remove_participant("A-B", "B"));
        assert!(registry.get("A-B").is_none());

        let fresh = registry.ensure("A-B");
        let entry = fresh.lock();
        assert_eq!(entry.state, MatchState::default());
        assert!(entry.participants.is_empty());
    }

    #[test]
    fn removing_stranger_keeps_match() {
        let registry = MatchRegistry::new();
        registry.ensure("A-B");
        registry.add_participant("A-B", "A").unwrap();
        assert!(!registry.remove_participant("A-B", "Z"));
        assert_eq!(registry.total_participants(), 1);
    }

    #[test]
    fn instance_guarded_remove_skips_replacement() {
        let registry = MatchRegistry::new();
        let old = registry.ensure("A-B").lock().instance;
        registry.delete("A-B");
        let fresh = registry.ensure("A-B");
        fresh.lock().add_participant("A").unwrap();

        assert!(!registry.remove_participant_from("A-B", old, "A"));
        assert_eq!(fresh.lock().participants, vec!["A"]);

        let current = fresh.lock().instance;
        assert!(registry.remove_participant_from("A-B", current, "A"));
        assert!(registry.get("A-B").is_none());
    }

    #[test]
    fn leaving_shifts_sides() {
        let mut entry = MatchEntry::with_seed("A-B", 1);
        entry.add_participant("A").unwrap();
        entry.add_participant("B").unwrap();
        assert_eq!(entry.side_of("B"), Some(Side::Right));
        entry.remove_participant("A");
        assert_eq!(entry.side_of("B"), Some(Side::Left));
        assert_eq!(entry.side_of("A"), None);
    }

    #[test]
    fn delete_instance_ignores_replacement() {
        let registry = MatchRegistry::new();
        let old = registry.ensure("A-B").lock().instance;
        assert!(registry.delete("A-B"));
        registry.ensure("A-B");
        assert!(!registry.delete_instance("A-B", old));
        assert!(!registry.is_current("A-B", old));
        assert_eq!(registry.active_matches(), 1);
    }

    #[test]
    fn mark_running_happens_once() {
        let mut entry = MatchEntry::with_seed("A-B", 1);
        assert!(entry.mark_running());
        assert!(!entry.mark_running());
        assert!(entry.is_running());
    }

    #[test]
    fn tick_broadcasts_state_and_game_over() {
        let mut entry = MatchEntry::with_seed("A-B", 1);
        entry.add_participant("A").unwrap();
        entry.add_participant("B").unwrap();
        entry.stake = Some(Value::from("25"));
        let mut rx = entry.subscribe();

        assert!(entry.tick().is_none());
        assert!(matches!(rx.try_recv(), Ok(ServerMsg::GameState(_))));

        entry.state.score1 = 5;
        let result = entry.tick().expect("match should be over");
        assert_eq!(result.winner.as_deref(), Some("A"));
        assert_eq!(result.stake, Some(Value::from("25")));
        assert!(matches!(rx.try_recv(), Ok(ServerMsg::GameState(_))));
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMsg::GameOver {
                winner: Some("A".into())
            }
        );
        // Finished entries stop simulating
        assert!(entry.tick().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn vacated_winner_slot_reports_no_winner() {
        let mut entry = MatchEntry::with_seed("A-B", 1);
        entry.add_participant("A").unwrap();
        entry.state.score2 = 5;
        let result = entry.tick().unwrap();
        assert_eq!(result.winner, None);
    }
}
