//! Entitlement gate.
//!
//! Holds the most recent successful verification and answers capability
//! questions from it. Absent or invalid token means the free tier; the
//! pipeline takes a snapshot per job and never consults the gate mid-job.

use std::sync::RwLock;

use tracing::{info, warn};

use sclip_models::{ClipOptions, Entitlement, FormatId, PlanTier};

use crate::client::{Activation, LicenseClient, Verification};
use crate::error::{LicenseError, LicenseResult};
use crate::fingerprint::{device_fingerprint, device_name};
use crate::store::TokenStore;

/// Capability oracle backed by the license protocol.
pub struct EntitlementGate {
    client: LicenseClient,
    store: TokenStore,
    verified: RwLock<Option<Verification>>,
}

impl EntitlementGate {
    pub fn new(client: LicenseClient, store: TokenStore) -> Self {
        Self {
            client,
            store,
            verified: RwLock::new(None),
        }
    }

    /// Activate a license key for this device and persist the token.
    pub async fn activate(&self, license_key: &str) -> LicenseResult<Activation> {
        let fingerprint = device_fingerprint();
        let activation = self
            .client
            .activate(license_key, &fingerprint, &device_name())
            .await?;

        self.store.save(&activation.activation_token)?;
        *self.verified.write().expect("gate lock poisoned") = Some(Verification {
            valid: true,
            plan: Some(activation.plan.clone()),
            expires_at: activation.expires_at,
        });

        info!(plan = %activation.plan, "license activated");
        Ok(activation)
    }

    /// Re-verify the stored token against the server.
    ///
    /// A definitive server rejection downgrades the cached entitlement; a
    /// transport failure leaves the previous snapshot in place and returns
    /// the error so callers can surface it.
    pub async fn refresh(&self) -> LicenseResult<Entitlement> {
        let token = self.store.load().ok_or(LicenseError::NoToken)?;

        match self.client.verify(&token).await {
            Ok(verification) => {
                if !verification.valid {
                    warn!("stored activation token is no longer valid");
                }
                *self.verified.write().expect("gate lock poisoned") = Some(verification);
                Ok(self.snapshot())
            }
            Err(e) => {
                warn!(error = %e, "token verification unreachable, keeping last known entitlement");
                Err(e)
            }
        }
    }

    /// Clear the stored token and drop Pro immediately.
    pub fn deactivate(&self) -> LicenseResult<()> {
        self.store.clear()?;
        *self.verified.write().expect("gate lock poisoned") = None;
        info!("license deactivated, reverting to free tier");
        Ok(())
    }

    /// Current capability snapshot.
    pub fn snapshot(&self) -> Entitlement {
        let tier = self
            .verified
            .read()
            .expect("gate lock poisoned")
            .as_ref()
            .map(Verification::tier)
            .unwrap_or(PlanTier::Free);
        Entitlement { tier }
    }

    /// Whether a format tier is permitted right now.
    pub fn is_format_permitted(&self, format: FormatId) -> bool {
        self.snapshot().allows_format(format)
    }

    /// Whether every requested option is permitted right now.
    pub fn are_options_permitted(&self, options: &ClipOptions) -> bool {
        self.snapshot().denied_option(options).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate_with(server_uri: &str, dir: &TempDir) -> EntitlementGate {
        EntitlementGate::new(
            LicenseClient::new(server_uri.to_string()),
            TokenStore::at(dir.path().join("activation.json")),
        )
    }

    #[tokio::test]
    async fn test_no_token_means_free() {
        let dir = TempDir::new().unwrap();
        let gate = gate_with("http://127.0.0.1:1", &dir);

        assert_eq!(gate.snapshot(), Entitlement::free());
        assert!(gate.is_format_permitted(FormatId::Hd720p60));
        assert!(!gate.is_format_permitted(FormatId::Fhd1080p60));
        assert!(matches!(
            gate.refresh().await.unwrap_err(),
            LicenseError::NoToken
        ));
    }

    #[tokio::test]
    async fn test_activate_then_verify_grants_pro() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "activationToken": "tok_abc",
                "plan": "pro",
                "expiresAt": null,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "valid": true,
                "plan": "pro",
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let gate = gate_with(&server.uri(), &dir);

        gate.activate("KEY-1234").await.unwrap();
        assert!(gate.is_format_permitted(FormatId::Uhd2160));

        let entitlement = gate.refresh().await.unwrap();
        assert!(entitlement.is_pro());
    }

    #[tokio::test]
    async fn test_deactivate_revokes_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "activationToken": "tok_abc",
                "plan": "pro",
                "expiresAt": null,
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let gate = gate_with(&server.uri(), &dir);
        gate.activate("KEY-1234").await.unwrap();
        assert!(gate.snapshot().is_pro());

        // No server contact needed to drop Pro
        gate.deactivate().unwrap();
        assert_eq!(gate.snapshot(), Entitlement::free());
        assert!(matches!(
            gate.refresh().await.unwrap_err(),
            LicenseError::NoToken
        ));
    }

    #[tokio::test]
    async fn test_server_rejection_downgrades() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "activationToken": "tok_abc",
                "plan": "pro",
                "expiresAt": null,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let gate = gate_with(&server.uri(), &dir);
        gate.activate("KEY-1234").await.unwrap();

        let entitlement = gate.refresh().await.unwrap();
        assert!(!entitlement.is_pro());
        assert!(!gate.is_format_permitted(FormatId::Fhd1080p30));
    }
}
