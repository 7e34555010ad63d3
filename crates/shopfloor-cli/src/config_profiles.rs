//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shopfloor_core::config::{
    ClientConfig, ConfigError, ENV_API_KEY, ENV_DEVICE_ID, ENV_FUNCTIONS_URL, ENV_SUPABASE_URL,
};
pub use shopfloor_core::util::{is_http_url, normalize_text_option};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const ENV_PROFILE: &str = "SHOPFLOOR_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub functions_url: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shopfloor")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(ENV_PROFILE).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn supabase_url(&self) -> Option<String> {
        normalize_text_option(self.supabase_url.clone())
    }

    pub fn supabase_anon_key(&self) -> Option<String> {
        normalize_text_option(self.supabase_anon_key.clone())
    }

    pub fn functions_url(&self) -> Option<String> {
        normalize_text_option(self.functions_url.clone())
    }

    pub fn device_id(&self) -> Option<String> {
        normalize_text_option(self.device_id.clone())
    }

    /// Client configuration for this profile; `SHOPFLOOR_*` variables take
    /// precedence over stored values.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfig::from_lookup(|key| env_value(key).or_else(|| self.stored_value(key)))
    }

    fn stored_value(&self, key: &str) -> Option<String> {
        match key {
            ENV_SUPABASE_URL => self.supabase_url(),
            ENV_API_KEY => self.supabase_anon_key(),
            ENV_FUNCTIONS_URL => self.functions_url(),
            ENV_DEVICE_ID => self.device_id(),
            _ => None,
        }
    }

    /// Names of settings still needed before the profile can talk to the backend.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.supabase_url().is_none() {
            missing.push("supabase_url");
        }
        if self.supabase_anon_key().is_none() {
            missing.push("supabase_anon_key");
        }
        if self.device_id().is_none() {
            missing.push("device_id");
        }
        missing
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.clone());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.clone());
        self.functions_url = normalize_text_option(self.functions_url.clone());
        self.device_id = normalize_text_option(self.device_id.clone());
    }
}

fn env_value(name: &str) -> Option<String> {
    normalize_text_option(std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let path = std::env::temp_dir().join(format!(
            "shopfloor-cli-config-test-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |duration| duration.as_nanos())
        ));

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some("default".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                supabase_url: Some(" https://project.supabase.co ".to_string()),
                supabase_anon_key: Some(" anon-key ".to_string()),
                functions_url: None,
                device_id: Some(" line-3-tablet ".to_string()),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        let profile = loaded.profiles.get("default").unwrap();
        assert_eq!(
            profile.supabase_url.as_deref(),
            Some("https://project.supabase.co")
        );
        assert_eq!(profile.supabase_anon_key.as_deref(), Some("anon-key"));
        assert_eq!(profile.device_id.as_deref(), Some("line-3-tablet"));
        assert!(profile.missing_fields().is_empty());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("plant-b".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("plant-a")), "plant-a");
        if std::env::var(ENV_PROFILE).is_err() {
            assert_eq!(config.resolve_profile_name(None), "plant-b");
        }
    }

    #[test]
    fn missing_fields_lists_required_settings() {
        let profile = CliProfile {
            supabase_url: Some("https://project.supabase.co".to_string()),
            ..CliProfile::default()
        };
        assert_eq!(profile.missing_fields(), vec!["supabase_anon_key", "device_id"]);
    }

    #[test]
    fn stored_values_map_to_config_keys() {
        let profile = CliProfile {
            supabase_url: Some("https://project.supabase.co".to_string()),
            supabase_anon_key: Some("anon-key".to_string()),
            functions_url: None,
            device_id: Some("line-3-tablet".to_string()),
        };
        assert_eq!(
            profile.stored_value(ENV_SUPABASE_URL).as_deref(),
            Some("https://project.supabase.co")
        );
        assert_eq!(profile.stored_value(ENV_FUNCTIONS_URL), None);
        assert_eq!(profile.stored_value("SHOPFLOOR_UNKNOWN"), None);

        let env_unset = [ENV_SUPABASE_URL, ENV_FUNCTIONS_URL, ENV_DEVICE_ID]
            .iter()
            .all(|key| env_value(key).is_none());
        if env_unset {
            let config = profile.client_config().unwrap();
            assert_eq!(
                config.functions_url,
                "https://project.supabase.co/functions/v1"
            );
            assert_eq!(config.device_id, "line-3-tablet");
        }
    }
}
