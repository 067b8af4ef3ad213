use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, TimeZone, Utc};
use models::ServiceRegistration;
use rand::Rng;
use tracing::{debug, error};
use url::Url;

use crate::errors::RegistryError;

const NONCE_LEN: usize = 12;
const TOKEN_VERSION: u8 = 1;
const ENDPOINT_SEPARATOR: &str = ";";

/// Symmetric authenticated-encryption primitive protecting token payloads.
pub trait TokenCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, RegistryError>;
    fn open(&self, data: &[u8]) -> Result<Vec<u8>, RegistryError>;
}

/// AES-256-GCM cipher; a random 96-bit nonce is prepended to the ciphertext.
pub struct Aes256GcmTokenCipher {
    key: [u8; 32],
}

impl Aes256GcmTokenCipher {
    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Generates a fresh random key. Tokens sealed under it do not survive
    /// a process restart.
    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::thread_rng().fill(&mut key);
        key
    }

    fn cipher(&self) -> Result<Aes256Gcm, RegistryError> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| RegistryError::Token(format!("failed to create cipher: {e}")))
    }
}

impl TokenCipher for Aes256GcmTokenCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, RegistryError> {
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| RegistryError::Token(format!("encryption failed: {e}")))?;

        let mut sealed = nonce.to_vec();
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    fn open(&self, data: &[u8]) -> Result<Vec<u8>, RegistryError> {
        if data.len() < NONCE_LEN {
            return Err(RegistryError::Token("sealed data too short".into()));
        }
        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|e| RegistryError::Token(format!("decryption failed: {e}")))
    }
}

/// Interface to the registration token provider.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Generates the opaque token for the given registration.
    async fn generate(&self, registration: &ServiceRegistration) -> Result<String, RegistryError>;

    /// Validates the token. Returns the registration it encodes if the
    /// token is authentic and unexpired, `None` otherwise.
    async fn validate(&self, token: &str) -> Option<ServiceRegistration>;
}

/// Default [`TokenProvider`]: the registration snapshot travels inside the
/// token itself, so unregistration works against any registry instance
/// without shared session storage. Expiration is enforced purely by clock
/// comparison; there is no revocation.
pub struct RegistrationTokenProvider {
    cipher: Arc<dyn TokenCipher>,
    lifespan: Duration,
}

impl RegistrationTokenProvider {
    pub fn new(cipher: Arc<dyn TokenCipher>, lifespan: Duration) -> Self {
        Self { cipher, lifespan }
    }

    fn try_validate(&self, token: &str) -> Result<Option<ServiceRegistration>, RegistryError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| RegistryError::Token(format!("token is not valid base64: {e}")))?;
        let payload = self.cipher.open(&sealed)?;
        let record = TokenRecord::parse(&payload)?;

        let created_at = Utc
            .timestamp_millis_opt(record.created_at_millis)
            .single()
            .ok_or_else(|| RegistryError::Token("invalid creation timestamp".into()))?;
        if created_at + self.lifespan < Utc::now() {
            debug!(%created_at, "registration token expired");
            return Ok(None);
        }

        let endpoints = record
            .endpoints
            .split(ENDPOINT_SEPARATOR)
            .map(Url::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RegistryError::Token(format!("invalid endpoint url in token: {e}")))?;

        Ok(Some(ServiceRegistration {
            service_id: record.service_id,
            display_name: String::new(),
            endpoints,
            ip_address: (!record.ip_address.is_empty()).then_some(record.ip_address),
            public_urls: Vec::new(),
        }))
    }
}

#[async_trait]
impl TokenProvider for RegistrationTokenProvider {
    async fn generate(&self, registration: &ServiceRegistration) -> Result<String, RegistryError> {
        let record = TokenRecord {
            created_at_millis: Utc::now().timestamp_millis(),
            service_id: registration.service_id.clone(),
            endpoints: registration
                .endpoints
                .iter()
                .map(Url::as_str)
                .collect::<Vec<_>>()
                .join(ENDPOINT_SEPARATOR),
            ip_address: registration.ip().unwrap_or_default().to_string(),
        };
        let sealed = self.cipher.seal(&record.encode())?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    async fn validate(&self, token: &str) -> Option<ServiceRegistration> {
        match self.try_validate(token) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "error validating registration token");
                None
            }
        }
    }
}

/// Fixed-order binary payload of a token. Versioned so the layout can
/// evolve without invalidating the scheme.
struct TokenRecord {
    created_at_millis: i64,
    service_id: String,
    endpoints: String,
    ip_address: String,
}

impl TokenRecord {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            1 + 8 + 12 + self.service_id.len() + self.endpoints.len() + self.ip_address.len(),
        );
        buf.push(TOKEN_VERSION);
        buf.extend_from_slice(&self.created_at_millis.to_le_bytes());
        write_string(&mut buf, &self.service_id);
        write_string(&mut buf, &self.endpoints);
        write_string(&mut buf, &self.ip_address);
        buf
    }

    fn parse(payload: &[u8]) -> Result<Self, RegistryError> {
        let mut reader = Reader(payload);
        let version = reader.read_u8()?;
        if version != TOKEN_VERSION {
            return Err(RegistryError::Token(format!("unsupported token version {version}")));
        }
        let created_at_millis = reader.read_i64()?;
        let service_id = reader.read_string()?;
        let endpoints = reader.read_string()?;
        let ip_address = reader.read_string()?;
        if !reader.0.is_empty() {
            return Err(RegistryError::Token("trailing bytes in token payload".into()));
        }
        Ok(Self { created_at_millis, service_id, endpoints, ip_address })
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], RegistryError> {
        if self.0.len() < n {
            return Err(RegistryError::Token("truncated token payload".into()));
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn read_u8(&mut self) -> Result<u8, RegistryError> {
        Ok(self.take(1)?[0])
    }

    fn read_i64(&mut self) -> Result<i64, RegistryError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("fixed-size slice");
        Ok(i64::from_le_bytes(bytes))
    }

    fn read_string(&mut self) -> Result<String, RegistryError> {
        let len_bytes: [u8; 4] = self.take(4)?.try_into().expect("fixed-size slice");
        let len = u32::from_le_bytes(len_bytes) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RegistryError::Token(format!("invalid utf-8 in token payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> ServiceRegistration {
        ServiceRegistration {
            service_id: "my-api".to_string(),
            display_name: "My Api".to_string(),
            endpoints: vec![
                "http://host1:5000/".parse().unwrap(),
                "http://host2:5000/".parse().unwrap(),
            ],
            ip_address: Some("10.0.0.1".to_string()),
            public_urls: vec!["http://api.example.com/".parse().unwrap()],
        }
    }

    fn provider(lifespan: Duration) -> RegistrationTokenProvider {
        let cipher = Arc::new(Aes256GcmTokenCipher::from_key([42u8; 32]));
        RegistrationTokenProvider::new(cipher, lifespan)
    }

    #[tokio::test]
    async fn validate_returns_encoded_registration() {
        let provider = provider(Duration::days(3650));
        let token = provider.generate(&registration()).await.expect("generate");

        let validated = provider.validate(&token).await.expect("valid token");
        assert_eq!(validated.service_id, "my-api");
        assert_eq!(validated.endpoints, registration().endpoints);
        assert_eq!(validated.ip(), Some("10.0.0.1"));
        // The token carries the contribution only, not display name or
        // public urls.
        assert!(validated.display_name.is_empty());
        assert!(validated.public_urls.is_empty());
    }

    #[tokio::test]
    async fn registration_without_ip_round_trips() {
        let provider = provider(Duration::days(3650));
        let mut reg = registration();
        reg.ip_address = None;

        let token = provider.generate(&reg).await.expect("generate");
        let validated = provider.validate(&token).await.expect("valid token");
        assert_eq!(validated.ip_address, None);
    }

    #[tokio::test]
    async fn expired_token_yields_none() {
        let provider = provider(Duration::milliseconds(1));
        let token = provider.generate(&registration()).await.expect("generate");

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(provider.validate(&token).await.is_none());
    }

    #[tokio::test]
    async fn garbage_token_yields_none() {
        let provider = provider(Duration::days(3650));
        assert!(provider.validate("not-a-token").await.is_none());
        assert!(provider.validate("").await.is_none());
        assert!(provider.validate("AAAA").await.is_none());
    }

    #[tokio::test]
    async fn tampered_token_yields_none() {
        let provider = provider(Duration::days(3650));
        let token = provider.generate(&registration()).await.expect("generate");

        let mut bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(bytes);
        assert!(provider.validate(&tampered).await.is_none());
    }

    #[tokio::test]
    async fn token_from_other_key_yields_none() {
        let provider_a = provider(Duration::days(3650));
        let other_cipher = Arc::new(Aes256GcmTokenCipher::from_key([7u8; 32]));
        let provider_b = RegistrationTokenProvider::new(other_cipher, Duration::days(3650));

        let token = provider_a.generate(&registration()).await.expect("generate");
        assert!(provider_b.validate(&token).await.is_none());
    }

    #[tokio::test]
    async fn tokens_are_url_path_safe() {
        let provider = provider(Duration::days(3650));
        let token = provider.generate(&registration()).await.expect("generate");
        assert!(!token.contains('/'));
        assert!(!token.contains('+'));
        assert!(!token.contains('='));
    }

    #[test]
    fn record_rejects_unknown_version() {
        let record = TokenRecord {
            created_at_millis: 0,
            service_id: "x".into(),
            endpoints: "http://h/".into(),
            ip_address: String::new(),
        };
        let mut payload = record.encode();
        payload[0] = 99;
        assert!(TokenRecord::parse(&payload).is_err());
    }

    #[test]
    fn record_rejects_truncated_payload() {
        let record = TokenRecord {
            created_at_millis: 0,
            service_id: "x".into(),
            endpoints: "http://h/".into(),
            ip_address: String::new(),
        };
        let payload = record.encode();
        assert!(TokenRecord::parse(&payload[..payload.len() - 2]).is_err());
    }
}
