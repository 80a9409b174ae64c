//! Session coordinator - turns connection events into registry changes

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{spawn_ticker, JoinError, MatchRegistry, PhysicsSystem};
use crate::settlement::ResultReporter;
use crate::ws::protocol::ServerMsg;

/// Per-connection state: `Connected -> Registered -> Joined(matchId)...`
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: Uuid,
    identity: Option<String>,
    /// Joined match ids and the entry instance each join landed in
    joined: BTreeMap<String, Uuid>,
}

impl Session {
    pub fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id,
            identity: None,
            joined: BTreeMap::new(),
        }
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Match ids this connection has joined and not left
    pub fn joined_matches(&self) -> impl Iterator<Item = &str> {
        self.joined.keys().map(String::as_str)
    }
}

/// Successful join
#[derive(Debug)]
pub struct Joined {
    /// Every message broadcast to the match from now on
    pub events: broadcast::Receiver<ServerMsg>,
    /// True if this join filled the match and started its tick loop
    pub started: bool,
    /// Entry instance the join landed in
    pub instance: Uuid,
}

/// Coordinates joins, paddle input and departures against the registry
pub struct SessionCoordinator {
    registry: Arc<MatchRegistry>,
    reporter: Arc<dyn ResultReporter>,
    auto_leave_on_disconnect: bool,
}

impl SessionCoordinator {
    pub fn new(
        registry: Arc<MatchRegistry>,
        reporter: Arc<dyn ResultReporter>,
        auto_leave_on_disconnect: bool,
    ) -> Self {
        Self {
            registry,
            reporter,
            auto_leave_on_disconnect,
        }
    }

    pub fn registry(&self) -> &Arc<MatchRegistry> {
        &self.registry
    }

    /// Attach an identity to the connection. No uniqueness or format checks.
    pub fn register(&self, session: &mut Session, identity: String) {
        info!(
            connection_id = %session.connection_id,
            identity = %identity,
            "Player registered"
        );
        session.identity = Some(identity);
    }

    /// Join (or create) a match. The second distinct participant starts it.
    pub fn join(
        &self,
        session: &mut Session,
        match_id: &str,
        stake: Option<Value>,
    ) -> Result<Joined, JoinError> {
        let identity = session
            .identity
            .clone()
            .ok_or(JoinError::NotRegistered)?;

        let joined = self.registry.ensure_with(match_id, |entry| -> Result<Joined, JoinError> {
            let added = entry.add_participant(&identity)?;
            if added {
                info!(
                    match_id = %match_id,
                    identity = %identity,
                    player_count = entry.participants.len(),
                    "Player joined match"
                );
            } else {
                debug!(match_id = %match_id, identity = %identity, "Player already in match");
            }

            if entry.stake.is_none() {
                entry.stake = stake.filter(|s| !s.is_null());
            }

            // Subscribe before game_start goes out so the joiner sees it
            let events = entry.subscribe();

            let started = entry.is_full() && entry.mark_running();
            if started {
                entry.broadcast(ServerMsg::GameStart {
                    player1: entry.participants[0].clone(),
                    player2: entry.participants[1].clone(),
                    bet_amount: entry.stake.clone(),
                    game_id: match_id.to_string(),
                });

                let ticker = spawn_ticker(
                    self.registry.clone(),
                    match_id.to_string(),
                    entry.instance,
                    self.reporter.clone(),
                );
                entry.attach_ticker(ticker);

                info!(match_id = %match_id, "Match started");
            }

            Ok(Joined {
                events,
                started,
                instance: entry.instance,
            })
        });

        match &joined {
            Ok(joined) => {
                session.joined.insert(match_id.to_string(), joined.instance);
            }
            Err(e) => {
                warn!(match_id = %match_id, identity = %identity, error = %e, "Join rejected");
            }
        }

        joined
    }

    /// Move this connection's paddle. Returns false when ignored.
    pub fn input(&self, session: &Session, match_id: &str, raw_y: f64) -> bool {
        let Some(identity) = session.identity() else {
            return false;
        };
        let Some(handle) = self.registry.get(match_id) else {
            return false;
        };

        let mut entry = handle.lock();
        let Some(side) = entry.side_of(identity) else {
            return false;
        };
        let height = entry.state.paddle(side).height;
        match PhysicsSystem::clamp_paddle(raw_y, height) {
            Some(y) => {
                entry.state.paddle_mut(side).y = y;
                true
            }
            None => false,
        }
    }

    /// Leave a match. Returns true if the match was discarded as a result.
    ///
    /// A match this connection joined is only left if it is still the same
    /// instance; one that ended and was recreated under the same id is not
    /// touched.
    pub fn leave(&self, session: &mut Session, match_id: &str) -> bool {
        let instance = session.joined.remove(match_id);

        let Some(identity) = session.identity() else {
            return false;
        };

        info!(match_id = %match_id, identity = %identity, "Player left match");
        match instance {
            Some(instance) => self.registry.remove_participant_from(match_id, instance, identity),
            None => self.registry.remove_participant(match_id, identity),
        }
    }

    /// Connection closed. Always logged; leaves joined matches only when
    /// auto-leave is enabled. Returns the matches that were left.
    pub fn disconnect(&self, session: &mut Session) -> Vec<String> {
        info!(
            connection_id = %session.connection_id,
            identity = ?session.identity,
            joined = session.joined.len(),
            "Client disconnected"
        );

        if !self.auto_leave_on_disconnect {
            return Vec::new();
        }

        let joined = std::mem::take(&mut session.joined);
        let Some(identity) = session.identity() else {
            return Vec::new();
        };

        let mut left = Vec::with_capacity(joined.len());
        for (match_id, instance) in joined {
            // Ended matches may have been recreated under the same id since
            if !self.registry.is_current(&match_id, instance) {
                debug!(match_id = %match_id, "Match already over, nothing to leave");
                continue;
            }
            info!(match_id = %match_id, identity = %identity, "Player left match");
            self.registry.remove_participant_from(&match_id, instance, identity);
            left.push(match_id);
        }
        left
    }
}
