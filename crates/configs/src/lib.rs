use anyhow::anyhow;
use anyhow::Result;
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub self_register: SelfRegisterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Settings for the registry core: token policy and store caching.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base64-encoded 32-byte AES-256 key protecting registration tokens.
    /// When empty, a random key is generated at startup (tokens then do not
    /// survive a restart).
    #[serde(default)]
    pub token_key: String,
    #[serde(default = "default_token_lifespan")]
    pub token_lifespan_secs: u64,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            token_key: String::new(),
            token_lifespan_secs: default_token_lifespan(),
            cache_enabled: default_cache_enabled(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Settings for registering the registry itself as a service at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SelfRegisterConfig {
    #[serde(default = "default_self_register_enabled")]
    pub enabled: bool,
    #[serde(default = "default_self_service_id")]
    pub service_id: String,
    #[serde(default = "default_self_display_name")]
    pub display_name: String,
    /// Explicit endpoints to announce; derived from the bound address when empty.
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub public_urls: Vec<String>,
}

impl Default for SelfRegisterConfig {
    fn default() -> Self {
        Self {
            enabled: default_self_register_enabled(),
            service_id: default_self_service_id(),
            display_name: default_self_display_name(),
            endpoints: Vec::new(),
            public_urls: Vec::new(),
        }
    }
}

// Ten years, matching the long-lived default of the registration tokens.
fn default_token_lifespan() -> u64 { 10 * 365 * 24 * 60 * 60 }
fn default_cache_enabled() -> bool { true }
fn default_cache_ttl() -> u64 { 600 }
fn default_self_register_enabled() -> bool { true }
fn default_self_service_id() -> String { "service-registry".to_string() }
fn default_self_display_name() -> String { "Service Registry".to_string() }

/// Read the config file named by `CONFIG_PATH` (default `config.toml`).
/// A missing file is `Ok(None)`; an unreadable or malformed file is an error.
pub fn load_default() -> Result<Option<AppConfig>> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg = toml::from_str(&content)
                .map_err(|e| anyhow!("invalid config file {path}: {e}"))?;
            Ok(Some(cfg))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow!("failed to read config file {path}: {e}")),
    }
}

impl AppConfig {
    /// Load configuration, falling back to defaults plus environment
    /// variables when no config file exists. A config file that is present
    /// but unreadable or malformed is fatal.
    pub fn load_or_default() -> Result<Self> {
        let mut cfg = load_default()?.unwrap_or_default();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize_from_env();
        self.server.validate()?;
        self.registry.normalize_from_env();
        self.registry.validate()?;
        self.self_register.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 {
                self.worker_threads = Some(4);
            }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl RegistryConfig {
    fn normalize_from_env(&mut self) {
        // The token key is a secret; prefer the environment over the file.
        if let Ok(key) = std::env::var("REGISTRY_TOKEN_KEY") {
            self.token_key = key;
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.token_key.trim().is_empty() {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(self.token_key.trim())
                .map_err(|e| anyhow!("registry.token_key is not valid base64: {e}"))?;
            if decoded.len() != 32 {
                return Err(anyhow!(
                    "registry.token_key must decode to 32 bytes, got {}",
                    decoded.len()
                ));
            }
        }
        if self.token_lifespan_secs == 0 {
            return Err(anyhow!("registry.token_lifespan_secs must be a positive number of seconds"));
        }
        if self.cache_enabled && self.cache_ttl_secs == 0 {
            return Err(anyhow!("registry.cache_ttl_secs must be a positive number of seconds"));
        }
        Ok(())
    }

    /// The configured token key, decoded, or `None` when unset.
    pub fn decoded_token_key(&self) -> Option<[u8; 32]> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(self.token_key.trim())
            .ok()?;
        decoded.try_into().ok()
    }
}

impl SelfRegisterConfig {
    fn validate(&self) -> Result<()> {
        if self.enabled && self.service_id.trim().is_empty() {
            return Err(anyhow!("self_register.service_id must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut cfg = AppConfig::default();
        cfg.normalize_and_validate().expect("defaults validate");
        assert_eq!(cfg.registry.token_lifespan_secs, 10 * 365 * 24 * 60 * 60);
        assert_eq!(cfg.registry.cache_ttl_secs, 600);
        assert!(cfg.self_register.enabled);
    }

    #[test]
    fn rejects_bad_token_key() {
        let mut cfg = AppConfig::default();
        cfg.registry.token_key = "not-base64!!!".into();
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = AppConfig::default();
        // valid base64 but wrong length
        cfg.registry.token_key = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn accepts_full_length_token_key() {
        let mut cfg = AppConfig::default();
        cfg.registry.token_key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        cfg.normalize_and_validate().expect("32-byte key validates");
        assert_eq!(cfg.registry.decoded_token_key(), Some([7u8; 32]));
    }

    #[test]
    fn missing_file_falls_back_but_malformed_file_is_fatal() {
        let path =
            std::env::temp_dir().join(format!("registry-config-{}.toml", std::process::id()));
        std::fs::remove_file(&path).ok();
        std::env::set_var("CONFIG_PATH", &path);

        let cfg = AppConfig::load_or_default().expect("missing file falls back to defaults");
        assert_eq!(cfg.server.worker_threads, Some(4));

        std::fs::write(&path, "[server]\nport = \"not-a-port").expect("write config");
        assert!(AppConfig::load_or_default().is_err());

        std::fs::remove_file(&path).ok();
        std::env::remove_var("CONFIG_PATH");
    }

    #[test]
    fn parses_toml_sections() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [registry]
            cache_enabled = false

            [self_register]
            enabled = false
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.server.port, 9000);
        assert!(!cfg.registry.cache_enabled);
        assert!(!cfg.self_register.enabled);
    }
}
