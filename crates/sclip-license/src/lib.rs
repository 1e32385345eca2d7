//! License Entitlement Protocol client.
//!
//! Device-bound activation, token verification, and feature gating. The
//! pipeline only sees [`EntitlementGate`]; activation UX and the license
//! server live elsewhere.

pub mod client;
pub mod error;
pub mod fingerprint;
pub mod gate;
pub mod store;

pub use client::{Activation, LicenseClient, Verification, DEFAULT_API_URL};
pub use error::{LicenseError, LicenseResult};
pub use fingerprint::{device_fingerprint, device_name};
pub use gate::EntitlementGate;
pub use store::TokenStore;
