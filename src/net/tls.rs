use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};
use tracing::{info, warn};
use wtransport::tls::{Certificate, CertificateChain, PrivateKey};
use wtransport::Identity;

// Dev certificate paths
const DEV_CERT_FILE: &str = "certs/cert.pem";
const DEV_KEY_FILE: &str = "certs/key.pem";

// Browsers reject longer validity for serverCertificateHashes
const SELF_SIGNED_VALIDITY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// TLS configuration for the WebTransport server
pub struct TlsConfig {
    pub identity: Identity,
    /// Base64-encoded SHA-256 hash of the certificate (for `serverCertificateHashes`)
    pub cert_hash: String,
}

impl TlsConfig {
    /// Load the TLS identity
    ///
    /// Explicit paths win, then the dev certificate in `certs/`, then a fresh
    /// in-memory self-signed certificate.
    pub async fn load(cert_path: Option<&str>, key_path: Option<&str>) -> Result<Self> {
        if let (Some(cert_path), Some(key_path)) = (cert_path, key_path) {
            info!("Loading TLS certificate from {}", cert_path);
            return Self::load_from_paths(cert_path, key_path).await;
        }

        if Path::new(DEV_CERT_FILE).exists() && Path::new(DEV_KEY_FILE).exists() {
            info!("Loading dev certificate from certs/");
            return Self::load_from_paths(DEV_CERT_FILE, DEV_KEY_FILE).await;
        }

        warn!("No TLS certificate found; generating a self-signed one for development");
        Self::self_signed()
    }

    async fn load_from_paths(cert_path: &str, key_path: &str) -> Result<Self> {
        let identity = Identity::load_pemfiles(cert_path, key_path)
            .await
            .context("Failed to load certificate from PEM files")?;
        Ok(Self::from_identity(identity))
    }

    /// Self-signed certificate for localhost, valid 14 days
    pub fn self_signed() -> Result<Self> {
        let mut params = CertificateParams::new(vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
            "::1".to_string(),
        ])
        .context("Invalid certificate subject names")?;

        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "Geo Rooms Dev");

        let now = SystemTime::now();
        params.not_before = now.into();
        params.not_after = (now + SELF_SIGNED_VALIDITY).into();

        let key_pair = KeyPair::generate().context("Failed to generate key pair")?;
        let cert = params
            .self_signed(&key_pair)
            .context("Failed to self-sign certificate")?;

        let certificate =
            Certificate::from_der(cert.der().to_vec()).context("Generated certificate is invalid")?;
        let private_key = PrivateKey::from_der_pkcs8(key_pair.serialize_der());
        let identity = Identity::new(CertificateChain::single(certificate), private_key);

        Ok(Self::from_identity(identity))
    }

    fn from_identity(identity: Identity) -> Self {
        let cert_hash = compute_cert_hash(&identity);
        info!("Certificate hash: {}", cert_hash);
        Self { identity, cert_hash }
    }
}

fn compute_cert_hash(identity: &Identity) -> String {
    identity
        .certificate_chain()
        .as_slice()
        .first()
        .map(|cert| STANDARD.encode(digest(&SHA256, cert.der()).as_ref()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_signed_hash_format() {
        let config = TlsConfig::self_signed().unwrap();

        let decoded = STANDARD.decode(&config.cert_hash).unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn test_self_signed_certificates_differ() {
        let a = TlsConfig::self_signed().unwrap();
        let b = TlsConfig::self_signed().unwrap();
        assert_ne!(a.cert_hash, b.cert_hash);
    }

    #[tokio::test]
    async fn test_missing_explicit_paths_fail() {
        let result = TlsConfig::load(Some("/nonexistent/cert.pem"), Some("/nonexistent/key.pem")).await;
        assert!(result.is_err());
    }
}
