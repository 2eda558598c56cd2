// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use precis_llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "precis";
const CONFIG_VERSION: i64 = 1;
const CONFIG_PATH_ENV: &str = "PRECIS_CONFIG_PATH";
const API_KEY_ENV: &str = "PRECIS_API_KEY";
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            provider: Provider::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Provider {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version; add `version = 1` and put provider settings under [provider]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected {CONFIG_VERSION}",
                path.display(),
                self.version
            );
        }

        if let Some(base_url) = &self.provider.base_url {
            let trimmed = base_url.trim();
            if trimmed.is_empty() {
                bail!("provider.base_url in {} must not be empty", path.display());
            }
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                bail!(
                    "provider.base_url in {} must start with http:// or https://, got {:?}",
                    path.display(),
                    base_url
                );
            }
        }

        if let Some(model) = &self.provider.model
            && model.trim().is_empty()
        {
            bail!("provider.model in {} must not be empty", path.display());
        }

        if let Some(name) = &self.provider.api_key_env
            && name.trim().is_empty()
        {
            bail!(
                "provider.api_key_env in {} must name an environment variable",
                path.display()
            );
        }

        if let Some(timeout) = &self.provider.timeout {
            let parsed = parse_duration(timeout)
                .with_context(|| format!("provider.timeout in {}", path.display()))?;
            if parsed.is_zero() {
                bail!(
                    "provider.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.provider
            .base_url
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.provider
            .model
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_MODEL)
    }

    /// `None` leaves requests without a deadline.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.provider
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
    }

    pub fn api_key_env(&self) -> &str {
        self.provider
            .api_key_env
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_API_KEY_ENV)
    }

    pub fn api_key(&self) -> Result<String> {
        self.resolve_api_key(|name| env::var(name).ok())
    }

    /// Looks up the key in `PRECIS_API_KEY`, then the variable named by
    /// `provider.api_key_env`, then `provider.api_key`. Blank values are
    /// skipped.
    pub fn resolve_api_key<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = [API_KEY_ENV, self.api_key_env()]
            .into_iter()
            .filter_map(|name| lookup(name));
        let candidates = from_env.chain(self.provider.api_key.clone());
        for candidate in candidates {
            let trimmed = candidate.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_owned());
            }
        }

        bail!(
            "no API key configured; export {} or {}, or set provider.api_key in the config file",
            API_KEY_ENV,
            self.api_key_env()
        )
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file in the config")
        })?;
        Ok(data_root.join(APP_NAME).join("precis.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# precis config\n# Place this file at: {}\n\nversion = 1\n\n[provider]\nbase_url = \"{}\"\nmodel = \"{}\"\n# The key is read from {} first, then from the variable named here.\napi_key_env = \"{}\"\n# api_key = \"...\"\n# Optional request deadline: <N>ms, <N>s or <N>m\n# timeout = \"30s\"\n\n[log]\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/precis/precis.log)\n# file = \"/absolute/path/to/precis.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_MODEL,
            API_KEY_ENV,
            DEFAULT_API_KEY_ENV,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let units: [(&str, fn(u64) -> Duration); 3] = [
        ("ms", Duration::from_millis),
        ("s", Duration::from_secs),
        ("m", |mins| Duration::from_secs(mins.saturating_mul(60))),
    ];
    for (suffix, to_duration) in units {
        if let Some(value) = raw.strip_suffix(suffix)
            && let Ok(count) = value.parse::<u64>()
        {
            return Ok(to_duration(count));
        }
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}
