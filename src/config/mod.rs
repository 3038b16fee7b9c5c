/// Application configuration module
use anyhow::Context;
use serde::Serialize;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub eosda: EosdaConfig,
    pub cache: CacheSettings,
    pub flags: FeatureFlags,
}

#[derive(Clone, Debug)]
pub struct EosdaConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub api_version: String,
    pub timeout: Duration,
    pub disabled: bool,
}

impl EosdaConfig {
    /// Real requests are only issued with a key and when not forcibly disabled
    pub fn is_live(&self) -> bool {
        self.api_key.is_some() && !self.disabled
    }
}

impl Default for EosdaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api-connect.eos.com".to_string(),
            api_version: "v1".to_string(),
            timeout: Duration::from_millis(30_000),
            disabled: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
    pub sweep_every: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            max_entries: 1024,
            sweep_every: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureFlag {
    SatelliteAutomation,
    SoilAnalysisAutomation,
    SentinelPipeline,
    SatelliteCache,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 4] = [
        FeatureFlag::SatelliteAutomation,
        FeatureFlag::SoilAnalysisAutomation,
        FeatureFlag::SentinelPipeline,
        FeatureFlag::SatelliteCache,
    ];

    /// Environment variable backing the flag
    pub fn env_key(self) -> &'static str {
        match self {
            FeatureFlag::SatelliteAutomation => "NEXT_PUBLIC_FEATURE_SATELLITE_AUTOMATION",
            FeatureFlag::SoilAnalysisAutomation => "NEXT_PUBLIC_FEATURE_SOIL_ANALYSIS_AUTOMATION",
            FeatureFlag::SentinelPipeline => "NEXT_PUBLIC_FEATURE_SENTINEL_PIPELINE",
            FeatureFlag::SatelliteCache => "NEXT_PUBLIC_FEATURE_SATELLITE_CACHE",
        }
    }
}

/// Resolved feature flags. Every flag defaults to enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub satellite_automation: bool,
    pub soil_analysis_automation: bool,
    pub sentinel_pipeline: bool,
    pub satellite_cache: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            satellite_automation: true,
            soil_analysis_automation: true,
            sentinel_pipeline: true,
            satellite_cache: true,
        }
    }
}

impl FeatureFlags {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build flags from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut flags = Self::default();
        for flag in FeatureFlag::ALL {
            let current = flags.is_enabled(flag);
            let value = parse_bool(lookup(flag.env_key()).as_deref(), current);
            flags.set(flag, value);
        }
        flags
    }

    pub fn is_enabled(&self, flag: FeatureFlag) -> bool {
        match flag {
            FeatureFlag::SatelliteAutomation => self.satellite_automation,
            FeatureFlag::SoilAnalysisAutomation => self.soil_analysis_automation,
            FeatureFlag::SentinelPipeline => self.sentinel_pipeline,
            FeatureFlag::SatelliteCache => self.satellite_cache,
        }
    }

    pub fn set(&mut self, flag: FeatureFlag, enabled: bool) {
        match flag {
            FeatureFlag::SatelliteAutomation => self.satellite_automation = enabled,
            FeatureFlag::SoilAnalysisAutomation => self.soil_analysis_automation = enabled,
            FeatureFlag::SentinelPipeline => self.sentinel_pipeline = enabled,
            FeatureFlag::SatelliteCache => self.satellite_cache = enabled,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let disabled_raw = env::var("DISABLE_EOSDA")
            .or_else(|_| env::var("NEXT_PUBLIC_DISABLE_EOSDA"))
            .ok();

        let eosda = EosdaConfig {
            api_key: env_first(&["EOSDA_API_KEY"]),
            api_url: env_first(&["EOSDA_API_URL", "EOSDA_API_BASE_URL"])
                .unwrap_or_else(|| "https://api-connect.eos.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            api_version: env_first(&["EOSDA_API_VERSION"]).unwrap_or_else(|| "v1".to_string()),
            timeout: Duration::from_millis(env_u64("EOSDA_TIMEOUT_MILLISECONDS", 30_000)),
            disabled: parse_bool(disabled_raw.as_deref(), false),
        };

        let cache = CacheSettings {
            ttl: Duration::from_secs(env_u64("SATELLITE_CACHE_TTL_SECONDS", 900)),
            max_entries: env_u64("SATELLITE_CACHE_MAX_ENTRIES", 1024) as usize,
            sweep_every: Duration::from_secs(env_u64("CACHE_SWEEP_EVERY_SECONDS", 300).max(1)),
        };

        Ok(Self {
            database_url,
            database_max_connections: env_u64("DB_MAX_CONNECTIONS", 5) as u32,
            bind_addr,
            eosda,
            cache,
            flags: FeatureFlags::from_env(),
        })
    }
}

/// Lenient boolean parsing shared by feature flags and kill switches
pub fn parse_bool(value: Option<&str>, fallback: bool) -> bool {
    let Some(raw) = value else {
        return fallback;
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => true,
        "0" | "false" | "no" | "off" | "disabled" => false,
        _ => fallback,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// First non-blank value among the given keys
fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert!(parse_bool(Some(" Enabled "), false));
        assert!(parse_bool(Some("1"), false));
        assert!(!parse_bool(Some("off"), true));
        assert!(!parse_bool(Some("NO"), true));
    }

    #[test]
    fn test_parse_bool_falls_back_on_unknown() {
        assert!(parse_bool(Some("maybe"), true));
        assert!(!parse_bool(None, false));
    }

    #[test]
    fn test_flags_default_to_enabled() {
        let flags = FeatureFlags::from_lookup(|_| None);
        assert_eq!(flags, FeatureFlags::default());
        assert!(flags.is_enabled(FeatureFlag::SoilAnalysisAutomation));
    }

    #[test]
    fn test_flags_read_their_own_keys() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("NEXT_PUBLIC_FEATURE_SOIL_ANALYSIS_AUTOMATION", "false"),
            ("NEXT_PUBLIC_FEATURE_SATELLITE_CACHE", "disabled"),
        ]);
        let flags = FeatureFlags::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert!(!flags.soil_analysis_automation);
        assert!(!flags.satellite_cache);
        assert!(flags.satellite_automation);
        assert!(flags.sentinel_pipeline);
    }

    #[test]
    fn test_eosda_requires_key_to_be_live() {
        let mut config = EosdaConfig::default();
        assert!(!config.is_live());
        config.api_key = Some("apk.test".to_string());
        assert!(config.is_live());
        config.disabled = true;
        assert!(!config.is_live());
    }
}
