use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{DiscoveryError, Result};

/// Schema Registry operating mode (spec §4.2/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    Embedded,
    Dynamic,
    #[default]
    Hybrid,
}

impl std::str::FromStr for RegistryMode {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "embedded" => Ok(RegistryMode::Embedded),
            "dynamic" => Ok(RegistryMode::Dynamic),
            "hybrid" => Ok(RegistryMode::Hybrid),
            other => Err(DiscoveryError::Config(format!(
                "REGISTRY_MODE must be one of embedded|dynamic|hybrid, got {other:?}"
            ))),
        }
    }
}

/// Process-wide settings read from the environment (spec §6's env table).
/// Immutable after initialisation, like the registry and reference patterns
/// it configures (spec §3 "Lifecycle").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    pub registry_mode: RegistryMode,
    pub api_group_patterns: Vec<String>,
    pub discovery_timeout: Duration,
    pub fallback_enabled: bool,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub log_level: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            registry_mode: RegistryMode::Hybrid,
            api_group_patterns: vec!["*.kubecore.io".to_string()],
            discovery_timeout: Duration::from_secs(5),
            fallback_enabled: true,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(600),
            log_level: "info".to_string(),
        }
    }
}

impl RegistrySettings {
    /// Reads `REGISTRY_MODE`, `API_GROUP_PATTERNS`, `DISCOVERY_TIMEOUT`,
    /// `FALLBACK_ENABLED`, `CACHE_ENABLED`, `CACHE_TTL`, `LOG_LEVEL` from the
    /// process environment, falling back to spec-documented defaults for any
    /// variable that is absent or fails to parse.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let registry_mode = match env::var("REGISTRY_MODE") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.registry_mode,
        };

        let api_group_patterns = match env::var("API_GROUP_PATTERNS") {
            Ok(v) if !v.trim().is_empty() => {
                v.split(',').map(|s| s.trim().to_string()).collect()
            }
            _ => defaults.api_group_patterns,
        };

        let discovery_timeout = parse_duration_env("DISCOVERY_TIMEOUT", defaults.discovery_timeout)?;
        let cache_ttl = parse_duration_env("CACHE_TTL", defaults.cache_ttl)?;

        let fallback_enabled = parse_bool_env("FALLBACK_ENABLED", defaults.fallback_enabled)?;
        let cache_enabled = parse_bool_env("CACHE_ENABLED", defaults.cache_enabled)?;

        let log_level = env::var("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            registry_mode,
            api_group_patterns,
            discovery_timeout,
            fallback_enabled,
            cache_enabled,
            cache_ttl,
            log_level,
        })
    }
}

fn parse_duration_env(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(v) => humantime::parse_duration(v.trim())
            .map_err(|e| DiscoveryError::Config(format!("{key} is not a valid duration: {e}"))),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(DiscoveryError::Config(format!(
                "{key} must be a boolean, got {other:?}"
            ))),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests must not run concurrently with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "REGISTRY_MODE",
            "API_GROUP_PATTERNS",
            "DISCOVERY_TIMEOUT",
            "FALLBACK_ENABLED",
            "CACHE_ENABLED",
            "CACHE_TTL",
            "LOG_LEVEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_match_spec_table() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        let s = RegistrySettings::from_env().unwrap();
        assert_eq!(s.registry_mode, RegistryMode::Hybrid);
        assert_eq!(s.api_group_patterns, vec!["*.kubecore.io".to_string()]);
        assert_eq!(s.discovery_timeout, Duration::from_secs(5));
        assert!(s.fallback_enabled);
        assert!(s.cache_enabled);
        assert_eq!(s.cache_ttl, Duration::from_secs(600));
    }

    #[test]
    fn overrides_are_applied() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("REGISTRY_MODE", "dynamic");
        env::set_var("API_GROUP_PATTERNS", "*.kubecore.io, *.example.com");
        env::set_var("DISCOVERY_TIMEOUT", "10s");
        env::set_var("FALLBACK_ENABLED", "false");
        env::set_var("CACHE_TTL", "1m");

        let s = RegistrySettings::from_env().unwrap();
        assert_eq!(s.registry_mode, RegistryMode::Dynamic);
        assert_eq!(
            s.api_group_patterns,
            vec!["*.kubecore.io".to_string(), "*.example.com".to_string()]
        );
        assert_eq!(s.discovery_timeout, Duration::from_secs(10));
        assert!(!s.fallback_enabled);
        assert_eq!(s.cache_ttl, Duration::from_secs(60));
        clear_env();
    }

    #[test]
    fn invalid_registry_mode_is_config_error() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("REGISTRY_MODE", "nonsense");
        let err = RegistrySettings::from_env().unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
        clear_env();
    }
}
