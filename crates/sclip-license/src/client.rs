//! License server HTTP client.
//!
//! Activation binds a license key to a device fingerprint and returns an
//! opaque activation token; verification asks the server whether a token is
//! still good. Token cryptography stays on the server side; this client
//! never inspects token contents.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use sclip_models::PlanTier;

use crate::error::{LicenseError, LicenseResult};

/// Default activation endpoint.
pub const DEFAULT_API_URL: &str = "https://ytsmartclip.org/api/license/activate";

/// A successful activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub activation_token: String,
    pub plan: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of verifying an activation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub valid: bool,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Verification {
    /// Tier granted by this verification; Free when invalid or unstated.
    pub fn tier(&self) -> PlanTier {
        if !self.valid {
            return PlanTier::Free;
        }
        self.plan.as_deref().map(PlanTier::parse).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivateBody<'a> {
    license_key: &'a str,
    device_hash: &'a str,
    device_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Client for the license activation API.
pub struct LicenseClient {
    base_url: String,
    http: reqwest::Client,
}

impl LicenseClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client construction cannot fail with static config");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Activate a license key on this device.
    pub async fn activate(
        &self,
        license_key: &str,
        device_hash: &str,
        device_name: &str,
    ) -> LicenseResult<Activation> {
        debug!("activating license against {}", self.base_url);

        let response = self
            .http
            .post(&self.base_url)
            .json(&ActivateBody {
                license_key,
                device_hash,
                device_name,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Activation>().await?);
        }

        let body = response.json::<ErrorBody>().await.unwrap_or(ErrorBody {
            error: None,
            code: None,
        });
        Err(classify_activation_failure(status, &body))
    }

    /// Verify a previously issued activation token.
    pub async fn verify(&self, token: &str) -> LicenseResult<Verification> {
        let response = self
            .http
            .get(&self.base_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Verification>().await?);
        }

        // An explicit rejection is a definitive "not valid"; the caller
        // distinguishes this from a transport failure
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("activation token rejected by server ({})", status);
            return Ok(Verification {
                valid: false,
                plan: None,
                expires_at: None,
            });
        }

        Err(LicenseError::Server {
            status: status.as_u16(),
            message: "verification failed".to_string(),
        })
    }
}

/// Map an activation failure response onto the protocol error taxonomy.
fn classify_activation_failure(status: StatusCode, body: &ErrorBody) -> LicenseError {
    let message = body.error.as_deref().unwrap_or_default().to_lowercase();
    let code = body.code.as_deref().unwrap_or_default();

    if code == "ACTIVATION_LIMIT" || message.contains("activation limit") {
        return LicenseError::ActivationLimitReached;
    }
    if code == "REVOKED" || message.contains("revoked") {
        return LicenseError::Revoked;
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::BAD_REQUEST
        || message.contains("invalid license")
    {
        return LicenseError::InvalidKey;
    }

    LicenseError::Server {
        status: status.as_u16(),
        message: body
            .error
            .clone()
            .unwrap_or_else(|| "activation failed".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_activate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "licenseKey": "KEY-1234",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "activationToken": "tok_abc",
                "plan": "pro",
                "expiresAt": "2027-01-01T00:00:00Z",
            })))
            .mount(&server)
            .await;

        let client = LicenseClient::new(server.uri());
        let activation = client
            .activate("KEY-1234", "fingerprint", "Test Device")
            .await
            .unwrap();
        assert_eq!(activation.activation_token, "tok_abc");
        assert_eq!(activation.plan, "pro");
    }

    #[tokio::test]
    async fn test_activate_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Invalid license key",
            })))
            .mount(&server)
            .await;

        let client = LicenseClient::new(server.uri());
        let err = client.activate("BAD", "fp", "dev").await.unwrap_err();
        assert!(matches!(err, LicenseError::InvalidKey));
    }

    #[tokio::test]
    async fn test_activate_revoked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": "This license has been revoked",
                "code": "REVOKED",
            })))
            .mount(&server)
            .await;

        let client = LicenseClient::new(server.uri());
        let err = client.activate("KEY", "fp", "dev").await.unwrap_err();
        assert!(matches!(err, LicenseError::Revoked));
    }

    #[tokio::test]
    async fn test_activate_limit_reached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": "License activation limit reached",
            })))
            .mount(&server)
            .await;

        let client = LicenseClient::new(server.uri());
        let err = client.activate("KEY", "fp", "dev").await.unwrap_err();
        assert!(matches!(err, LicenseError::ActivationLimitReached));
    }

    #[tokio::test]
    async fn test_activate_network_error() {
        // Nothing listens here
        let client = LicenseClient::new("http://127.0.0.1:1");
        let err = client.activate("KEY", "fp", "dev").await.unwrap_err();
        assert!(matches!(err, LicenseError::Network(_)));
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer tok_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "valid": true,
                "plan": "pro",
            })))
            .mount(&server)
            .await;

        let client = LicenseClient::new(server.uri());
        let verification = client.verify("tok_abc").await.unwrap();
        assert!(verification.valid);
        assert_eq!(verification.tier(), PlanTier::Pro);
    }

    #[tokio::test]
    async fn test_verify_rejected_token_is_definitive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = LicenseClient::new(server.uri());
        let verification = client.verify("stale").await.unwrap();
        assert!(!verification.valid);
        assert_eq!(verification.tier(), PlanTier::Free);
    }

    #[test]
    fn test_unknown_plan_is_free() {
        let verification = Verification {
            valid: true,
            plan: Some("mystery".to_string()),
            expires_at: None,
        };
        assert_eq!(verification.tier(), PlanTier::Free);
    }
}
