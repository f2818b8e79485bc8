//! RuleSnapshot domain model — the derived, tamper-evident artifact the
//! Rule Snapshot Builder publishes and Agents download.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A built, signed, encrypted bundle of detection rules for one rule type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSnapshot {
    /// Rule type this snapshot covers (fingerprint, poc, virus, webshell, ...).
    pub rule_type: String,
    /// MD5 of the deterministic ZIP, hex-encoded.
    pub version_hash: String,
    pub file_count: usize,
    /// `nonce(12) || ciphertext || gcm_tag(16)`.
    #[serde(with = "base64_body")]
    pub encrypted_body: Vec<u8>,
    /// Hex-encoded HMAC-SHA256 over `encrypted_body`.
    pub signature: String,
    pub built_at: DateTime<Utc>,
}

impl RuleSnapshot {
    pub const CONTENT_ENCRYPTION: &'static str = "aes-gcm";
}

/// Base64-encodes the encrypted body for diagnostic/caching JSON views; the
/// wire `download` endpoint streams the raw bytes directly and never goes
/// through this representation.
mod base64_body {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        base64::engine::general_purpose::STANDARD.encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let snap = RuleSnapshot {
            rule_type: "fingerprint".to_string(),
            version_hash: "deadbeef".to_string(),
            file_count: 3,
            encrypted_body: vec![1, 2, 3, 4, 5],
            signature: "sig".to_string(),
            built_at: Utc::now(),
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: RuleSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.encrypted_body, snap.encrypted_body);
    }
}
