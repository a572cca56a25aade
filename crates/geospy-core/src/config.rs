//! Cache configuration shared by the server and library callers
//!
//! The file-level config loading is done in geospy-cache; these types define
//! the `[cache]` section and how it turns into registered caches.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::{CacheConfig, CacheManager};
use crate::error::CacheError;

/// Settings for one named cache; unset fields fall back to the section defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCacheConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl NamedCacheConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_size: None,
            ttl_seconds: None,
        }
    }
}

/// The `[cache]` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How often the background sweep runs
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
    #[serde(default = "default_max_size")]
    pub default_max_size: usize,
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
    /// Caches registered at startup
    #[serde(default = "default_named_caches")]
    pub named: Vec<NamedCacheConfig>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            default_max_size: default_max_size(),
            default_ttl_seconds: default_ttl_seconds(),
            named: default_named_caches(),
        }
    }
}

fn default_cleanup_interval_seconds() -> u64 {
    300 // 5 minutes
}

fn default_max_size() -> usize {
    100
}

fn default_ttl_seconds() -> u64 {
    3600 // 1 hour
}

/// One cache per geo collaborator
fn default_named_caches() -> Vec<NamedCacheConfig> {
    vec![
        NamedCacheConfig::new("geocode"),
        NamedCacheConfig::new("reverse_geocode"),
        NamedCacheConfig::new("map"),
        NamedCacheConfig::new("interactive_map"),
        NamedCacheConfig::new("static_map"),
    ]
}

impl CacheSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    /// Effective configuration for a named cache
    pub fn cache_config(&self, named: &NamedCacheConfig) -> CacheConfig {
        CacheConfig::new(
            named.max_size.unwrap_or(self.default_max_size),
            Duration::from_secs(named.ttl_seconds.unwrap_or(self.default_ttl_seconds)),
        )
    }

    /// Check every value before anything is constructed
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.cleanup_interval_seconds == 0 {
            return Err(CacheError::InvalidConfig(
                "cleanup_interval_seconds must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for named in &self.named {
            if named.name.is_empty() {
                return Err(CacheError::InvalidConfig(
                    "cache name must not be empty".to_string(),
                ));
            }
            if !seen.insert(named.name.as_str()) {
                return Err(CacheError::InvalidConfig(format!(
                    "cache '{}' is configured more than once",
                    named.name
                )));
            }
            self.cache_config(named).validate().map_err(|e| match e {
                CacheError::InvalidConfig(msg) => {
                    CacheError::InvalidConfig(format!("cache '{}': {}", named.name, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Register every configured cache with `manager`, storing values of type `V`
    pub fn register_all<V: Send + 'static>(
        &self,
        manager: &CacheManager,
    ) -> Result<usize, CacheError> {
        self.validate()?;
        for named in &self.named {
            let config = self.cache_config(named);
            manager.get_or_create_cache::<V>(&named.name, config.max_size, config.ttl)?;
        }
        Ok(self.named.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.cleanup_interval(), Duration::from_secs(300));
        assert_eq!(settings.named.len(), 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_named_overrides_fall_back_to_defaults() {
        let settings = CacheSettings {
            default_max_size: 50,
            default_ttl_seconds: 600,
            ..CacheSettings::default()
        };
        let named = NamedCacheConfig {
            name: "geocode".to_string(),
            max_size: Some(10),
            ttl_seconds: None,
        };

        let config = settings.cache_config(&named);
        assert_eq!(config.max_size, 10);
        assert_eq!(config.ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_interval = CacheSettings {
            cleanup_interval_seconds: 0,
            ..CacheSettings::default()
        };
        assert!(zero_interval.validate().is_err());

        let zero_ttl = CacheSettings {
            named: vec![NamedCacheConfig {
                name: "map".to_string(),
                max_size: None,
                ttl_seconds: Some(0),
            }],
            ..CacheSettings::default()
        };
        let err = zero_ttl.validate().unwrap_err();
        assert!(err.to_string().contains("cache 'map'"));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let settings = CacheSettings {
            named: vec![NamedCacheConfig::new("map"), NamedCacheConfig::new("map")],
            ..CacheSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_register_all() {
        let settings = CacheSettings {
            named: vec![
                NamedCacheConfig::new("geocode"),
                NamedCacheConfig {
                    name: "map".to_string(),
                    max_size: Some(3),
                    ttl_seconds: Some(5),
                },
            ],
            ..CacheSettings::default()
        };
        let manager = CacheManager::new();

        assert_eq!(settings.register_all::<String>(&manager).unwrap(), 2);
        assert_eq!(manager.cache_names(), vec!["geocode", "map"]);

        let map = manager.stats_for("map").unwrap();
        assert_eq!(map.max_size, 3);
        assert_eq!(map.ttl_seconds, 5.0);
    }

    #[test]
    fn test_deserialize_partial_section() {
        let settings: CacheSettings = toml::from_str(
            r#"
            cleanup_interval_seconds = 60

            [[named]]
            name = "geocode"
            ttl_seconds = 120
            "#,
        )
        .unwrap();

        assert_eq!(settings.cleanup_interval_seconds, 60);
        assert_eq!(settings.default_max_size, 100);
        assert_eq!(settings.named, vec![NamedCacheConfig {
            name: "geocode".to_string(),
            max_size: None,
            ttl_seconds: Some(120),
        }]);
    }
}
