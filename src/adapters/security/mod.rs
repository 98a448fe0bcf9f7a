//! Security oracle adapters
//!
//! Honeypot simulation via a honeypot.is-style API and contract
//! verification plus holder counts via a Basescan-style explorer API. Every
//! transport or parse failure surfaces as an error; the scorer is the one
//! that decides failures mean elevated risk, not this layer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{CheckOutcome, TokenAddress};
use crate::ports::{OracleError, SecurityOracle};

/// Security oracle configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Honeypot simulation API base URL
    pub honeypot_api_url: String,
    /// Block explorer API base URL
    pub explorer_api_url: String,
    pub explorer_api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoneypotResponse {
    simulation_success: bool,
    honeypot_result: Option<HoneypotResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoneypotResult {
    is_honeypot: bool,
}

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope<T> {
    status: String,
    message: String,
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceCodeEntry {
    source_code: String,
}

/// The sell simulation only counts when it actually ran.
fn honeypot_outcome(response: &HoneypotResponse) -> CheckOutcome {
    if !response.simulation_success {
        return CheckOutcome::Unknown;
    }
    match &response.honeypot_result {
        Some(result) if result.is_honeypot => CheckOutcome::Confirmed,
        Some(_) => CheckOutcome::Clear,
        None => CheckOutcome::Unknown,
    }
}

/// Explorer returns an empty `SourceCode` for unverified contracts.
/// `Confirmed` here means "not verified".
fn verification_outcome(entries: &[SourceCodeEntry]) -> CheckOutcome {
    match entries.first() {
        Some(entry) if entry.source_code.trim().is_empty() => CheckOutcome::Confirmed,
        Some(_) => CheckOutcome::Clear,
        None => CheckOutcome::Unknown,
    }
}

/// HTTP-backed [`SecurityOracle`].
pub struct HttpSecurityOracle {
    config: OracleConfig,
    http: Client,
}

impl HttpSecurityOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, OracleError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(OracleError::Http(format!(
                "status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))
    }

    fn explorer_url(&self, module: &str, action: &str, token: &TokenAddress) -> String {
        let mut url = format!(
            "{}?module={}&action={}&address={}",
            self.config.explorer_api_url, module, action, token
        );
        if let Some(ref key) = self.config.explorer_api_key {
            url.push_str(&format!("&apikey={}", key));
        }
        url
    }
}

#[async_trait]
impl SecurityOracle for HttpSecurityOracle {
    async fn check_honeypot(&self, token: &TokenAddress) -> Result<CheckOutcome, OracleError> {
        let url = format!(
            "{}/v2/IsHoneypot?address={}",
            self.config.honeypot_api_url, token
        );
        let response: HoneypotResponse = self.get_json(&url).await?;
        let outcome = honeypot_outcome(&response);
        debug!(%token, ?outcome, "Honeypot check");
        Ok(outcome)
    }

    async fn check_verified(&self, token: &TokenAddress) -> Result<CheckOutcome, OracleError> {
        let url = self.explorer_url("contract", "getsourcecode", token);
        let envelope: ExplorerEnvelope<Vec<SourceCodeEntry>> = self.get_json(&url).await?;
        if envelope.status != "1" {
            return Err(OracleError::Http(envelope.message));
        }
        Ok(verification_outcome(&envelope.result))
    }

    async fn fetch_holder_count(&self, token: &TokenAddress) -> Result<u64, OracleError> {
        let url = self.explorer_url("token", "tokenholdercount", token);
        let envelope: ExplorerEnvelope<String> = self.get_json(&url).await?;
        if envelope.status != "1" {
            return Err(OracleError::Http(envelope.message));
        }
        envelope
            .result
            .parse()
            .map_err(|_| OracleError::Malformed(format!("holder count: {}", envelope.result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_honeypot_outcomes() {
        let confirmed: HoneypotResponse = serde_json::from_str(
            r#"{"simulationSuccess": true, "honeypotResult": {"isHoneypot": true}}"#,
        )
        .unwrap();
        assert_eq!(honeypot_outcome(&confirmed), CheckOutcome::Confirmed);

        let clear: HoneypotResponse = serde_json::from_str(
            r#"{"simulationSuccess": true, "honeypotResult": {"isHoneypot": false}}"#,
        )
        .unwrap();
        assert_eq!(honeypot_outcome(&clear), CheckOutcome::Clear);

        // A failed simulation never reads as safe.
        let failed: HoneypotResponse =
            serde_json::from_str(r#"{"simulationSuccess": false, "honeypotResult": null}"#)
                .unwrap();
        assert_eq!(honeypot_outcome(&failed), CheckOutcome::Unknown);
    }

    #[test]
    fn test_verification_outcomes() {
        let verified = vec![SourceCodeEntry {
            source_code: "contract Foo {}".to_string(),
        }];
        assert_eq!(verification_outcome(&verified), CheckOutcome::Clear);

        let unverified = vec![SourceCodeEntry {
            source_code: String::new(),
        }];
        assert_eq!(verification_outcome(&unverified), CheckOutcome::Confirmed);

        assert_eq!(verification_outcome(&[]), CheckOutcome::Unknown);
    }

    #[test]
    fn test_explorer_envelope_parses() {
        let envelope: ExplorerEnvelope<String> = serde_json::from_str(
            r#"{"status": "1", "message": "OK", "result": "1523"}"#,
        )
        .unwrap();
        assert_eq!(envelope.status, "1");
        assert_eq!(envelope.result.parse::<u64>().unwrap(), 1523);
    }
}
