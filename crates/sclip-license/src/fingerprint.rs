//! Device fingerprint derivation.
//!
//! The fingerprint is a SHA-256 hex digest of stable machine identifiers.
//! Only the digest ever leaves the machine. Where no machine id file is
//! readable (containers, unusual distros) the derivation falls back to
//! hostname + username, which is stable per installation if weaker.

use sha2::{Digest, Sha256};

/// Machine id sources, in preference order.
const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Generate the device fingerprint for license activation.
pub fn device_fingerprint() -> String {
    sha256_hex(&machine_identity())
}

/// A human-readable name for this device, shown in the license dashboard.
pub fn device_name() -> String {
    hostname().unwrap_or_else(|| "Unknown Device".to_string())
}

fn machine_identity() -> String {
    for path in MACHINE_ID_PATHS {
        if let Ok(id) = std::fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return format!("machine-id:{}", id);
            }
        }
    }

    // Fallback derivation: stable per installation, documented as weaker
    let host = hostname().unwrap_or_else(|| "unknown-host".to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    format!("fallback:{}:{}", host, user)
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
