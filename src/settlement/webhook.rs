//! Forward match results to an HTTP endpoint

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::config::SettlementConfig;

use super::{MatchResult, ResultReporter};

/// POSTs each result as JSON to a configured URL.
/// Delivery is best-effort: failures are logged, never retried.
#[derive(Clone)]
pub struct WebhookReporter {
    client: Client,
    url: String,
    contract_address: String,
    rpc_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultPayload<'a> {
    #[serde(flatten)]
    result: &'a MatchResult,
    contract_address: &'a str,
    rpc_url: &'a str,
}

impl WebhookReporter {
    pub fn new(url: String, config: &SettlementConfig) -> Self {
        Self {
            client: Client::new(),
            url,
            contract_address: config.contract_address.clone(),
            rpc_url: config.rpc_url.clone(),
        }
    }

    /// Send a single result and wait for the response
    pub async fn send(&self, result: &MatchResult) -> Result<(), ReportError> {
        let payload = ResultPayload {
            result,
            contract_address: &self.contract_address,
            rpc_url: &self.rpc_url,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(ReportError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl ResultReporter for WebhookReporter {
    fn report(&self, result: MatchResult) {
        let reporter = self.clone();
        tokio::spawn(async move {
            match reporter.send(&result).await {
                Ok(()) => info!(match_id = %result.match_id, "Match result delivered"),
                Err(e) => {
                    error!(match_id = %result.match_id, error = %e, "Failed to deliver match result")
                }
            }
        });
    }
}

/// Result delivery errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Api { status: u16, body: String },
}
