//! Rule Snapshot Builder.
//!
//! Produces a deterministic, signed, encrypted ZIP of enabled detection
//! rules for a given rule type. Equal inputs yield byte-identical output,
//! which lets Agents cache by version hash.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use md5::{Digest as _, Md5};
use sha2::Sha256;
use zip::write::FileOptions;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::RuleSnapshot;

type HmacSha256 = Hmac<Sha256>;

/// Builds [`RuleSnapshot`]s from a rule directory tree, one subdirectory per
/// rule type (`<rule_dir>/<rule_type>/*`).
pub struct RuleSnapshotBuilder {
    rule_dir: PathBuf,
    shared_secret: String,
}

impl RuleSnapshotBuilder {
    pub fn new(rule_dir: impl Into<PathBuf>, shared_secret: impl Into<String>) -> Self {
        Self { rule_dir: rule_dir.into(), shared_secret: shared_secret.into() }
    }

    /// Build the snapshot for `rule_type`. Filesystem-agnostic beyond
    /// "enumerate files under `<rule_dir>/<rule_type>`, sort paths".
    pub fn build(&self, rule_type: &str) -> CoreResult<RuleSnapshot> {
        let type_dir = self.rule_dir.join(rule_type);
        let mut paths = enumerate_files(&type_dir)?;
        paths.sort();

        let zip_bytes = build_deterministic_zip(&type_dir, &paths)?;
        let version_hash = hex::encode(Md5::digest(&zip_bytes));

        let key = Sha256::digest(self.shared_secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CoreError::RuleSnapshot(format!("key setup failed: {e}")))?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, zip_bytes.as_slice())
            .map_err(|e| CoreError::RuleSnapshot(format!("encryption failed: {e}")))?;

        let mut encrypted_body = Vec::with_capacity(12 + ciphertext.len());
        encrypted_body.extend_from_slice(&nonce_bytes);
        encrypted_body.extend_from_slice(&ciphertext);

        let signature = self.sign(&encrypted_body)?;

        Ok(RuleSnapshot {
            rule_type: rule_type.to_string(),
            version_hash,
            file_count: paths.len(),
            encrypted_body,
            signature,
            built_at: chrono::Utc::now(),
        })
    }

    fn sign(&self, body: &[u8]) -> CoreResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.shared_secret.as_bytes())
            .map_err(|e| CoreError::RuleSnapshot(format!("hmac key setup failed: {e}")))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify a signature before any attempt to decrypt, matching the
    /// Agent-side verification order. Exposed here too so the Master can
    /// sanity-check a snapshot before serving it.
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.shared_secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        mac.verify_slice(&expected).is_ok()
    }
}

fn enumerate_files(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CoreError::RuleSnapshot(format!("cannot read rule directory {dir:?}: {e}")))?;
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::RuleSnapshot(format!("directory walk failed: {e}")))?;
        if entry.path().is_file() {
            out.push(entry.path());
        }
    }
    Ok(out)
}

fn build_deterministic_zip(base: &Path, paths: &[PathBuf]) -> CoreResult<Vec<u8>> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        // Epoch mtime on every entry keeps the archive byte-identical across
        // rebuilds of the same rule set.
        let options = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        for path in paths {
            let name = path
                .strip_prefix(base)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            let contents = std::fs::read(path)
                .map_err(|e| CoreError::RuleSnapshot(format!("cannot read rule file {path:?}: {e}")))?;
            writer
                .start_file(name, options)
                .map_err(|e| CoreError::RuleSnapshot(format!("zip entry failed: {e}")))?;
            writer
                .write_all(&contents)
                .map_err(|e| CoreError::RuleSnapshot(format!("zip write failed: {e}")))?;
        }
        writer
            .finish()
            .map_err(|e| CoreError::RuleSnapshot(format!("zip finalize failed: {e}")))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_rule(dir: &Path, rule_type: &str, name: &str, contents: &str) {
        let type_dir = dir.join(rule_type);
        std::fs::create_dir_all(&type_dir).unwrap();
        std::fs::write(type_dir.join(name), contents).unwrap();
    }

    #[test]
    fn build_is_deterministic_for_fixed_input() {
        let dir = tempdir().unwrap();
        write_rule(dir.path(), "fingerprint", "a.json", "{}");
        write_rule(dir.path(), "fingerprint", "b.json", "{}");

        let builder = RuleSnapshotBuilder::new(dir.path(), "shared-secret");
        let first = builder.build("fingerprint").unwrap();
        let second = builder.build("fingerprint").unwrap();
        assert_eq!(first.version_hash, second.version_hash);
    }

    #[test]
    fn signature_verifies_and_tamper_is_detected() {
        let dir = tempdir().unwrap();
        write_rule(dir.path(), "poc", "rule.json", "{\"id\":1}");

        let builder = RuleSnapshotBuilder::new(dir.path(), "shared-secret");
        let snapshot = builder.build("poc").unwrap();
        assert!(builder.verify(&snapshot.encrypted_body, &snapshot.signature));

        let mut tampered = snapshot.encrypted_body.clone();
        tampered[0] ^= 0xFF;
        assert!(!builder.verify(&tampered, &snapshot.signature));
    }

    #[test]
    fn decrypt_round_trip_yields_valid_zip() {
        let dir = tempdir().unwrap();
        write_rule(dir.path(), "virus", "sig.yar", "rule test {}");

        let builder = RuleSnapshotBuilder::new(dir.path(), "top-secret");
        let snapshot = builder.build("virus").unwrap();

        let key = Sha256::digest(b"top-secret");
        let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
        let nonce = Nonce::from_slice(&snapshot.encrypted_body[..12]);
        let plaintext = cipher
            .decrypt(nonce, &snapshot.encrypted_body[12..])
            .unwrap();
        assert_eq!(&plaintext[..4], &[0x50, 0x4B, 0x03, 0x04]);
    }

    #[test]
    fn empty_rule_directory_yields_zero_files() {
        let dir = tempdir().unwrap();
        let builder = RuleSnapshotBuilder::new(dir.path(), "shared-secret");
        let snapshot = builder.build("webshell").unwrap();
        assert_eq!(snapshot.file_count, 0);
    }
}
