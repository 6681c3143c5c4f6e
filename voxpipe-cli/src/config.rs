//! Configuration file support for the voxpipe tools

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use voxpipe::SessionDescription;
use voxpipe_crypto::{cm_hmac, MasterKey, SUITE_NAMES};

/// Sender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Length-prefixed Opus frames (file path or "-" for stdin)
    pub input: String,
    /// Media server address
    pub remote: SocketAddr,
    /// Optional local bind address
    pub bind: Option<SocketAddr>,
    /// Synchronization source identifier
    pub ssrc: u32,
    /// Crypto suite name
    pub suite: String,
    /// Base64 key material for the suite
    pub key: String,
    /// Run the address discovery handshake before sending
    #[serde(default)]
    pub discovery: bool,
    /// Print statistics when done
    #[serde(default = "default_stats")]
    pub stats: bool,
}

fn default_stats() -> bool {
    true
}

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Listen address
    pub listen: SocketAddr,
    /// Where decrypted frames are written (file path or "-" for stdout)
    pub output: Option<String>,
    /// Crypto suite name
    pub suite: String,
    /// Base64 key material for the suite
    pub key: String,
    /// Statistics interval in seconds, 0 to disable
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_stats_interval() -> u64 {
    1
}

/// Combined configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sender: Option<SenderConfig>,
    pub receiver: Option<ReceiverConfig>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Example sender configuration with a placeholder key
    pub fn example_sender() -> Self {
        Config {
            sender: Some(SenderConfig {
                input: "-".to_string(),
                remote: SocketAddr::from(([127, 0, 0, 1], 50_000)),
                bind: None,
                ssrc: 1,
                suite: "aead_aes256_gcm".to_string(),
                key: STANDARD.encode([0u8; 32]),
                discovery: false,
                stats: true,
            }),
            receiver: None,
        }
    }

    /// Example receiver configuration matching [`Config::example_sender`]
    pub fn example_receiver() -> Self {
        Config {
            sender: None,
            receiver: Some(ReceiverConfig {
                listen: SocketAddr::from(([0, 0, 0, 0], 50_000)),
                output: None,
                suite: "aead_aes256_gcm".to_string(),
                key: STANDARD.encode([0u8; 32]),
                stats_interval_secs: 1,
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn check_suite(suite: &str) -> Result<(), ConfigError> {
    if SUITE_NAMES.iter().any(|name| *name == suite) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "unknown suite '{}', expected one of {}",
            suite,
            SUITE_NAMES.join(", ")
        )))
    }
}

fn decode_key(key: &str) -> Result<Vec<u8>, ConfigError> {
    STANDARD
        .decode(key.trim())
        .map_err(|e| ConfigError::Invalid(format!("key is not valid base64: {}", e)))
}

/// Fresh random key material for `suite`, base64 encoded
pub fn generate_key(suite: &str) -> Result<String, ConfigError> {
    check_suite(suite)?;

    if suite == cm_hmac::SUITE_NAME {
        let master = MasterKey::generate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        return Ok(master.to_base64());
    }

    let mut key = [0u8; 32];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| ConfigError::Invalid("random number generator failure".into()))?;
    Ok(STANDARD.encode(key))
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_suite(&self.suite)?;
        decode_key(&self.key)?;
        Ok(())
    }

    /// Session parameters for the pipeline
    pub fn session(&self) -> Result<SessionDescription, ConfigError> {
        self.validate()?;
        Ok(SessionDescription {
            ssrc: self.ssrc,
            suite: self.suite.clone(),
            secret: decode_key(&self.key)?,
        })
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_suite(&self.suite)?;
        decode_key(&self.key)?;
        Ok(())
    }

    /// Session parameters; the SSRC is taken from incoming packets
    pub fn session(&self) -> Result<SessionDescription, ConfigError> {
        self.validate()?;
        Ok(SessionDescription {
            ssrc: 0,
            suite: self.suite.clone(),
            secret: decode_key(&self.key)?,
        })
    }

    /// Statistics interval, `None` when disabled
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_configs() {
        let sender_config = Config::example_sender();
        assert!(sender_config.sender.unwrap().validate().is_ok());

        let receiver_config = Config::example_receiver();
        assert!(receiver_config.receiver.unwrap().validate().is_ok());
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = Config::example_sender();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        let sender = parsed.sender.unwrap();
        assert_eq!(sender.suite, "aead_aes256_gcm");
        assert_eq!(sender.remote.port(), 50_000);
    }

    #[test]
    fn test_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [sender]
            input = "voice.opus"
            remote = "10.0.0.2:4000"
            ssrc = 7
            suite = "xsalsa20_poly1305_lite"
            key = "AAAA"
            "#,
        )
        .unwrap();

        let sender = parsed.sender.unwrap();
        assert!(!sender.discovery);
        assert!(sender.stats);
        assert!(sender.bind.is_none());
        assert!(parsed.receiver.is_none());
    }

    #[test]
    fn test_invalid_suite() {
        let mut config = Config::example_sender().sender.unwrap();
        config.suite = "rot13".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::example_sender().sender.unwrap();
        config.key = "not base64!".into();
        assert!(matches!(config.session(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_generate_key_per_suite() {
        for suite in SUITE_NAMES {
            let key = generate_key(suite).unwrap();
            let session = SessionDescription {
                ssrc: 1,
                suite: suite.to_string(),
                secret: STANDARD.decode(key).unwrap(),
            };
            assert!(session.crypto_suite().is_ok());
        }
    }

    #[test]
    fn test_stats_interval() {
        let mut config = Config::example_receiver().receiver.unwrap();
        assert_eq!(config.stats_interval(), Some(Duration::from_secs(1)));

        config.stats_interval_secs = 0;
        assert_eq!(config.stats_interval(), None);
    }
}
