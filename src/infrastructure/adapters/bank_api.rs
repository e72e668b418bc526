//! Account API adapter
//!
//! This adapter handles HTTP communication with the coinbank account API.
//! It implements the `SettlementClient` port for the deposit flow and the
//! read-only account endpoints used by the dashboard.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::domain::account::{AccountSnapshot, BankStats, MintInfo};
use crate::domain::settlement::{Quote, QuoteStatus, Redemption, SettlementClient};
use crate::shared::error::{AppError, AppResult, SettlementError};

const QUOTE_FAILED_MESSAGE: &str = "Failed to create invoice";
const GENERIC_FAILURE_MESSAGE: &str = "An error occurred";

/// Path of an account endpoint and the message used when an error
/// response carries none
struct Endpoint {
    path: &'static str,
    fallback: &'static str,
}

const CREATE_QUOTE: Endpoint = Endpoint { path: "/accounts/deposit/", fallback: QUOTE_FAILED_MESSAGE };
const CHECK_STATUS: Endpoint = Endpoint { path: "/accounts/deposit/check/", fallback: GENERIC_FAILURE_MESSAGE };
const REDEEM_TOKEN: Endpoint = Endpoint { path: "/accounts/bearer/redeem/", fallback: GENERIC_FAILURE_MESSAGE };
const ACCOUNT: Endpoint = Endpoint { path: "/accounts/me/", fallback: GENERIC_FAILURE_MESSAGE };
const STATS: Endpoint = Endpoint { path: "/accounts/stats/", fallback: GENERIC_FAILURE_MESSAGE };
const MINT_INFO: Endpoint = Endpoint { path: "/accounts/info/", fallback: GENERIC_FAILURE_MESSAGE };

#[derive(Debug, Serialize)]
struct CreateQuoteRequest {
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct CreateQuoteResponse {
    invoice: String,
    quote_id: String,
    expires_at: String,
}

#[derive(Debug, Serialize)]
struct CheckStatusRequest<'a> {
    quote_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckStatusResponse {
    #[serde(default)]
    paid: bool,
    #[serde(default)]
    expired: bool,
    amount: Option<u64>,
    new_balance: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RedeemRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RedeemResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    amount: u64,
    #[serde(default)]
    new_balance: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Map an HTTP status and body onto a typed result.
///
/// Non-2xx responses become `Backend` with the body's `error` field, or
/// `fallback` when there is none. An undecodable 2xx body is treated like a
/// transport failure.
fn interpret_response<T: DeserializeOwned>(status: u16, body: &[u8], fallback: &str) -> Result<T, SettlementError> {
    if (200..300).contains(&status) {
        return serde_json::from_slice(body)
            .map_err(|e| SettlementError::Network(format!("invalid response body: {}", e)));
    }

    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    Err(SettlementError::Backend { status, message })
}

/// Parse an ISO-8601 timestamp; offset-less values are taken as UTC
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, SettlementError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| SettlementError::Network(format!("invalid expires_at {:?}: {}", raw, e)))
}

/// A service-side rejection of a token means the token itself is unusable
fn redeem_failure(err: SettlementError) -> SettlementError {
    match err {
        SettlementError::Backend { message, .. } => SettlementError::InvalidToken(message),
        other => other,
    }
}

/// HTTP client for the account API
pub struct BankApiAdapter {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl BankApiAdapter {
    /// Create a new adapter from the API configuration
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_cookie: config.session_cookie.clone(),
        })
    }

    fn request(&self, method: Method, endpoint: &Endpoint) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, endpoint.path))
            .header(CONTENT_TYPE, "application/json");
        match &self.session_cookie {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, fallback: &str) -> Result<T, SettlementError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!(status = status, bytes = body.len(), "Account API responded");
        interpret_response(status, &body, fallback)
    }

    /// Fetch the signed-in account
    pub async fn get_account_snapshot(&self) -> AppResult<AccountSnapshot> {
        Ok(self.send(self.request(Method::GET, &ACCOUNT), ACCOUNT.fallback).await?)
    }

    /// Fetch aggregate bank figures
    pub async fn get_stats(&self) -> AppResult<BankStats> {
        Ok(self.send(self.request(Method::GET, &STATS), STATS.fallback).await?)
    }

    /// Fetch mint metadata
    pub async fn get_mint_info(&self) -> AppResult<MintInfo> {
        Ok(self.send(self.request(Method::GET, &MINT_INFO), MINT_INFO.fallback).await?)
    }
}

#[async_trait]
impl SettlementClient for BankApiAdapter {
    async fn create_quote(&self, amount: u64) -> Result<Quote, SettlementError> {
        if amount == 0 {
            return Err(SettlementError::InvalidAmount(amount));
        }

        info!(amount = amount, "Requesting deposit quote");
        let response: CreateQuoteResponse = self
            .send(
                self.request(Method::POST, &CREATE_QUOTE).json(&CreateQuoteRequest { amount }),
                CREATE_QUOTE.fallback,
            )
            .await?;

        Ok(Quote {
            quote_id: response.quote_id,
            payment_request: response.invoice,
            expires_at: parse_expiry(&response.expires_at)?,
        })
    }

    async fn check_status(&self, quote_id: &str) -> Result<QuoteStatus, SettlementError> {
        let response: CheckStatusResponse = self
            .send(
                self.request(Method::POST, &CHECK_STATUS).json(&CheckStatusRequest { quote_id }),
                CHECK_STATUS.fallback,
            )
            .await?;

        Ok(QuoteStatus {
            paid: response.paid,
            expired: response.expired,
            settled_amount: response.amount,
            new_balance: response.new_balance,
        })
    }

    async fn redeem_token(&self, token: &str) -> Result<Redemption, SettlementError> {
        info!(token_len = token.len(), "Redeeming bearer token");
        let response: RedeemResponse = self
            .send(
                self.request(Method::POST, &REDEEM_TOKEN).json(&RedeemRequest { token }),
                REDEEM_TOKEN.fallback,
            )
            .await
            .map_err(redeem_failure)?;

        Ok(Redemption {
            success: response.success,
            settled_amount: response.amount,
            new_balance: response.new_balance,
        })
    }
}
