use std::collections::HashMap;

use tracing::warn;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: console_core::config::DEFAULT_API_BASE.into(),
        }
    }
}

/// Defaults < `console.toml` < environment, then a sanity parse of the
/// resulting URL.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = std::fs::read_to_string("console.toml") {
        apply_file(&mut settings, &raw);
    }

    apply_env(
        &mut settings,
        std::env::var("VISCA_API_BASE").ok(),
        std::env::var("APP__API_BASE").ok(),
    );

    if let Err(error) = Url::parse(&settings.api_base) {
        warn!(%error, api_base = %settings.api_base, "invalid api base, using default");
        settings.api_base = Settings::default().api_base;
    }

    settings
}

/// `APP__API_BASE` wins over `VISCA_API_BASE` when both are set.
fn apply_env(settings: &mut Settings, visca_api_base: Option<String>, app_api_base: Option<String>) {
    if let Some(v) = visca_api_base {
        settings.api_base = v;
    }
    if let Some(v) = app_api_base {
        settings.api_base = v;
    }
}

fn apply_file(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("api_base") {
            settings.api_base = v.clone();
        }
    }
}
