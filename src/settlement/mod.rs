//! Match result reporting hook for external settlement
//!
//! The game core never talks to a chain. When a match ends, the tick loop
//! hands a [`MatchResult`] to whatever [`ResultReporter`] the server was
//! started with. Reporters must not block the caller.

pub mod webhook;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::SettlementConfig;

pub use webhook::{ReportError, WebhookReporter};

/// Final outcome of a match
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub match_id: String,
    pub winner: Option<String>,
    pub participants: Vec<String>,
    pub stake: Option<Value>,
    pub score1: u32,
    pub score2: u32,
    pub finished_at: DateTime<Utc>,
}

/// Receives match results exactly once per finished match
pub trait ResultReporter: Send + Sync + 'static {
    fn report(&self, result: MatchResult);
}

/// Reporter that only records the result in the log
#[derive(Debug, Clone)]
pub struct LogReporter {
    contract_address: String,
}

impl LogReporter {
    pub fn new(contract_address: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
        }
    }
}

impl ResultReporter for LogReporter {
    fn report(&self, result: MatchResult) {
        info!(
            match_id = %result.match_id,
            winner = ?result.winner,
            stake = ?result.stake,
            contract = %self.contract_address,
            score1 = result.score1,
            score2 = result.score2,
            "Match result ready for settlement"
        );
    }
}

/// Pick a reporter from configuration
pub fn build_reporter(config: &SettlementConfig) -> Arc<dyn ResultReporter> {
    match &config.webhook_url {
        Some(url) => Arc::new(WebhookReporter::new(url.clone(), config)),
        None => Arc::new(LogReporter::new(config.contract_address.clone())),
    }
}
