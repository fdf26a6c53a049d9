//! HTTP client for the external exchange-rate provider.
//!
//! Endpoint layout follows ExchangeRate-API v6:
//! - `GET {base_url}/{api_key}/latest/{BASE}` — full rate table
//! - `GET {base_url}/{api_key}/pair/{FROM}/{TO}` — single pair
//!
//! Error payloads carry an `error-type` code; those are terminal and are
//! never retried. Transport failures on the bulk path are retried first
//! with the standard timeout, then once more with the extended timeout.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use num_traits::FromPrimitive;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::fx_errors::{ApiErrorKind, FxError};
use super::fx_traits::RateProviderTrait;
use crate::errors::{Error, Result};
use crate::settings::FxSettings;

#[derive(Debug, Deserialize)]
struct PairResponse {
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    conversion_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    /// v6 payload key
    conversion_rates: Option<HashMap<String, f64>>,
    /// legacy payload key
    rates: Option<HashMap<String, f64>>,
}

pub struct ExchangeRateApiClient {
    client: Client,
    extended_client: Client,
    base_url: String,
    api_key: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl ExchangeRateApiClient {
    pub fn new(settings: &FxSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfigValue(format!("http client: {}", e)))?;
        let extended_client = Client::builder()
            .timeout(Duration::from_secs(settings.extended_timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfigValue(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            extended_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            retry_attempts: settings.retry_attempts,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        })
    }

    fn pair_url(&self, from: &str, to: &str) -> String {
        format!("{}/{}/pair/{}/{}", self.base_url, self.api_key, from, to)
    }

    fn latest_url(&self, base: &str) -> String {
        format!("{}/{}/latest/{}", self.base_url, self.api_key, base)
    }

    /// One GET returning the raw JSON body, with provider error codes
    /// mapped to terminal errors.
    async fn get_json(&self, client: &Client, url: &str) -> std::result::Result<String, FxError> {
        let response = client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // The provider reports failures as JSON with an error-type code,
        // usually alongside a 4xx status.
        if let Some(kind) = extract_error_type(&body) {
            return Err(FxError::Api(kind));
        }

        if !status.is_success() {
            warn!("exchange rate API request failed: status={}", status);
            return Err(FxError::MalformedResponse(format!(
                "unexpected status {}",
                status
            )));
        }

        Ok(body)
    }

    /// Retries transport failures; terminal API errors abort immediately.
    async fn get_with_retries(
        &self,
        client: &Client,
        url: &str,
        attempts: u32,
    ) -> std::result::Result<String, FxError> {
        let mut last_err = None;
        for attempt in 0..attempts.max(1) {
            match self.get_json(client, url).await {
                Ok(body) => return Ok(body),
                Err(err @ FxError::Api(_)) => return Err(err),
                Err(err) => {
                    debug!("provider request attempt {} failed: {}", attempt + 1, err);
                    last_err = Some(err);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            FxError::ProviderUnreachable("no attempts were made".to_string())
        }))
    }
}

#[async_trait]
impl RateProviderTrait for ExchangeRateApiClient {
    async fn fetch_pair_rate(&self, from: &str, to: &str) -> std::result::Result<Decimal, FxError> {
        let url = self.pair_url(from, to);
        let body = self.get_json(&self.client, &url).await?;
        parse_pair_body(&body)
    }

    async fn fetch_latest_rates(
        &self,
        base: &str,
    ) -> std::result::Result<HashMap<String, Decimal>, FxError> {
        let url = self.latest_url(base);

        let body = match self
            .get_with_retries(&self.client, &url, self.retry_attempts)
            .await
        {
            Ok(body) => body,
            Err(err @ FxError::Api(_)) => return Err(err),
            Err(err) => {
                warn!(
                    "standard timeout failed fetching rates for {}: {}; retrying with extended timeout",
                    base, err
                );
                self.get_with_retries(&self.extended_client, &url, self.retry_attempts + 1)
                    .await?
            }
        };

        parse_latest_body(&body)
    }
}

fn extract_error_type(body: &str) -> Option<ApiErrorKind> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error-type")
        .and_then(|v| v.as_str())
        .map(ApiErrorKind::from_error_type)
}

fn parse_pair_body(body: &str) -> std::result::Result<Decimal, FxError> {
    let response: PairResponse = serde_json::from_str(body)
        .map_err(|e| FxError::MalformedResponse(e.to_string()))?;

    if let Some(error_type) = response.error_type {
        return Err(FxError::Api(ApiErrorKind::from_error_type(&error_type)));
    }

    let raw = response
        .conversion_rate
        .ok_or_else(|| FxError::MalformedResponse("missing conversion_rate".to_string()))?;

    Decimal::from_f64(raw)
        .filter(|d| !d.is_sign_negative() && !d.is_zero())
        .ok_or_else(|| FxError::MalformedResponse(format!("unusable conversion_rate {}", raw)))
}

fn parse_latest_body(body: &str) -> std::result::Result<HashMap<String, Decimal>, FxError> {
    let response: LatestRatesResponse = serde_json::from_str(body)
        .map_err(|e| FxError::MalformedResponse(e.to_string()))?;

    if let Some(error_type) = response.error_type {
        return Err(FxError::Api(ApiErrorKind::from_error_type(&error_type)));
    }

    let raw = response
        .conversion_rates
        .or(response.rates)
        .ok_or_else(|| FxError::MalformedResponse("missing rates table".to_string()))?;

    let mut rates = HashMap::with_capacity(raw.len());
    for (code, value) in raw {
        match Decimal::from_f64(value) {
            Some(rate) => {
                rates.insert(code, rate);
            }
            None => warn!("skipping unrepresentable rate for {}: {}", code, value),
        }
    }

    if rates.is_empty() {
        return Err(FxError::MalformedResponse("empty rates table".to_string()));
    }

    Ok(rates)
}
