use std::fs;

use tracing::warn;

pub const SETTINGS_FILE: &str = "wizard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSettings {
    pub api_base_url: String,
    pub owner_code: String,
    pub default_source_language: String,
    pub default_speaker_count: u32,
    pub notification_duration_ms: u64,
    pub success_notification_duration_ms: u64,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".into(),
            owner_code: "temp".into(),
            default_source_language: "ko".into(),
            default_speaker_count: 2,
            notification_duration_ms: 3500,
            success_notification_duration_ms: 2500,
        }
    }
}

pub fn load_settings() -> WizardSettings {
    let mut settings = WizardSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        settings = from_toml_str(settings, &raw);
    }

    apply_env_overrides(settings, |key| std::env::var(key).ok())
}

/// Overlays keys from a flat TOML document; unknown keys and mistyped values are skipped.
pub fn from_toml_str(mut settings: WizardSettings, raw: &str) -> WizardSettings {
    let table = match toml::from_str::<toml::Table>(raw) {
        Ok(table) => table,
        Err(e) => {
            warn!(error = %e, file = SETTINGS_FILE, "ignoring unparseable settings file");
            return settings;
        }
    };

    if let Some(v) = table.get("api_base_url").and_then(|v| v.as_str()) {
        settings.api_base_url = v.to_string();
    }
    if let Some(v) = table.get("owner_code").and_then(|v| v.as_str()) {
        settings.owner_code = v.to_string();
    }
    if let Some(v) = table.get("default_source_language").and_then(|v| v.as_str()) {
        settings.default_source_language = v.to_string();
    }
    if let Some(v) = table
        .get("default_speaker_count")
        .and_then(|v| v.as_integer())
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
    {
        settings.default_speaker_count = v;
    }
    if let Some(v) = table
        .get("notification_duration_ms")
        .and_then(|v| v.as_integer())
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.notification_duration_ms = v;
    }
    if let Some(v) = table
        .get("success_notification_duration_ms")
        .and_then(|v| v.as_integer())
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.success_notification_duration_ms = v;
    }

    settings
}

pub fn apply_env_overrides<F>(mut settings: WizardSettings, lookup: F) -> WizardSettings
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("WIZARD_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__OWNER_CODE") {
        settings.owner_code = v;
    }

    if let Some(v) = lookup("APP__DEFAULT_SOURCE_LANGUAGE") {
        settings.default_source_language = v;
    }

    if let Some(v) = lookup("APP__DEFAULT_SPEAKER_COUNT") {
        if let Ok(parsed) = v.parse::<u32>() {
            if parsed > 0 {
                settings.default_speaker_count = parsed;
            }
        }
    }

    if let Some(v) = lookup("APP__NOTIFICATION_DURATION_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.notification_duration_ms = parsed;
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
