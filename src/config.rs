use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Runtime configuration. Every field has a default so running without a
/// config file is the normal case.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Program used for all cluster calls.
    pub kubectl: String,
    /// Extra resource-kind aliases on top of the built-in kubectl ones.
    pub aliases: BTreeMap<String, String>,
    /// Shell started inside containers and debug pods.
    pub shell: String,
    /// Line count passed to `kubectl logs --tail`.
    pub log_tail: u32,
    pub debug_pod: DebugPodConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugPodConfig {
    pub image: String,
    pub namespace: String,
    pub host_network: bool,
    pub poll_interval_ms: u64,
    pub provision_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            aliases: BTreeMap::new(),
            shell: "/bin/sh".to_string(),
            log_tail: 500,
            debug_pod: DebugPodConfig::default(),
        }
    }
}

impl Default for DebugPodConfig {
    fn default() -> Self {
        Self {
            image: "busybox:stable".to_string(),
            namespace: "default".to_string(),
            host_network: true,
            poll_interval_ms: 500,
            provision_timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let Some(path) = discover_config_path() else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Expands a user-supplied kind token through the alias table.
    pub fn resolve_kind_alias<'a>(&'a self, token: &'a str) -> &'a str {
        self.aliases.get(token).map(String::as_str).unwrap_or(token)
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KPICK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [PathBuf::from("kpick.yaml"), PathBuf::from(".kpick.yaml")];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kpick/config.yaml"),
            PathBuf::from(&home).join(".config/kpick/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
