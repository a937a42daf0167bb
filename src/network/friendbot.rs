//! Friendbot Client
//!
//! Friendbot antwortet mit JSON. Enthält die Antwort ein numerisches
//! `status` Feld, wurde der Account nicht angelegt und `detail` erklärt warum
//! (z.B. bereits gefundet). Sonst ist die Antwort die Transaktion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::NetworkConfig;
use crate::crypto::strkey;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum FundingError {
    #[error("A funding request is already in progress")]
    Busy,

    #[error("Not a valid Stellar account id: {0}")]
    InvalidAccount(String),

    #[error("Invalid Friendbot URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Funding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected Friendbot response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Ergebnis eines Funding-Requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FundingOutcome {
    /// Account angelegt und gefundet
    Created { transaction_hash: Option<String> },
    /// Friendbot hat abgelehnt
    Rejected { status: i64, detail: String },
}

// ============================================================================
// URL HELPERS
// ============================================================================

/// `<friendbot>?addr=<account id>`
pub fn friendbot_url(base: &str, public_key: &str) -> Result<Url, FundingError> {
    if !strkey::is_valid_account_id(public_key) {
        return Err(FundingError::InvalidAccount(public_key.to_string()));
    }
    Ok(Url::parse_with_params(base, &[("addr", public_key)])?)
}

/// `<explorer>/account/<account id>`
pub fn explorer_url(base: &str, public_key: &str) -> String {
    format!("{}/account/{}", base.trim_end_matches('/'), public_key)
}

/// Wertet den Body einer Friendbot-Antwort aus
fn parse_response(body: &[u8]) -> Result<FundingOutcome, FundingError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| FundingError::InvalidResponse(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| FundingError::InvalidResponse("expected a JSON object".to_string()))?;

    // Jede JSON-Zahl gilt als Ablehnung, auch `400.0` oder Werte jenseits von i64
    match object.get("status").filter(|status| status.is_number()) {
        Some(status) => Ok(FundingOutcome::Rejected {
            status: status
                .as_i64()
                .or_else(|| status.as_f64().map(|status| status as i64))
                .unwrap_or_default(),
            detail: object
                .get("detail")
                .and_then(|detail| detail.as_str())
                .unwrap_or("Friendbot rejected the request")
                .to_string(),
        }),
        None => Ok(FundingOutcome::Created {
            transaction_hash: object
                .get("hash")
                .and_then(|hash| hash.as_str())
                .map(str::to_string),
        }),
    }
}

// ============================================================================
// FUNDING CLIENT
// ============================================================================

/// Hält das Busy-Flag für einen laufenden Request
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// HTTP Client für den Friendbot des Testnets
pub struct FundingClient {
    friendbot_url: String,
    http_client: reqwest::Client,
    in_flight: AtomicBool,
}

impl FundingClient {
    pub fn new(config: &NetworkConfig) -> Result<Self, FundingError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("seedkeeper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            friendbot_url: config.friendbot_url.clone(),
            http_client,
            in_flight: AtomicBool::new(false),
        })
    }

    /// `true` solange ein Request aussteht
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Fordert Testnet-Lumen für `public_key` an
    pub async fn fund(&self, public_key: &str) -> Result<FundingOutcome, FundingError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FundingError::Busy)?;
        let _in_flight = InFlight(&self.in_flight);

        let url = friendbot_url(&self.friendbot_url, public_key)?;
        tracing::info!("Requesting testnet funding for {}", public_key);

        let response = self.http_client.get(url).send().await?;
        let http_status = response.status();
        let body = response.bytes().await?;

        let outcome = parse_response(&body).inspect_err(|e| {
            tracing::error!("Friendbot returned HTTP {}: {}", http_status, e);
        })?;

        match &outcome {
            FundingOutcome::Created { .. } => {
                tracing::info!("Account {} created on testnet", public_key)
            }
            FundingOutcome::Rejected { status, detail } => {
                tracing::warn!("Friendbot rejected {}: {} {}", public_key, status, detail)
            }
        }

        Ok(outcome)
    }
}

impl std::fmt::Debug for FundingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FundingClient")
            .field("friendbot_url", &self.friendbot_url)
            .field("is_busy", &self.is_busy())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
