use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::{debug, warn}};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::VoxrelayConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "voxrelay.toml",
    "voxrelay.yaml",
    "voxrelay.yml",
    "voxrelay.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<VoxrelayConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./voxrelay.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/voxrelay/voxrelay.{toml,yaml,yml,json}` (user-global)
///
/// Returns `VoxrelayConfig::default()` if no config file is found.
pub fn discover_and_load() -> VoxrelayConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    VoxrelayConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/voxrelay/
    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/voxrelay/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "voxrelay").map(|d| d.config_dir().to_path_buf())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// | variable | field |
/// |---|---|
/// | `VOXRELAY_TELEGRAM_TOKEN`, then `TOKEN` | `telegram.token` |
/// | `VOXRELAY_BACKEND_URL` | `backend.base_url` |
/// | `VOXRELAY_BACKEND_TIMEOUT_SECS` | `backend.timeout_secs` |
pub fn apply_env_overrides(config: VoxrelayConfig) -> VoxrelayConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: VoxrelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> VoxrelayConfig {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty("VOXRELAY_TELEGRAM_TOKEN").or_else(|| non_empty("TOKEN")) {
        config.telegram.token = Secret::new(token);
    }
    if let Some(url) = non_empty("VOXRELAY_BACKEND_URL") {
        config.backend.base_url = url;
    }
    if let Some(raw) = non_empty("VOXRELAY_BACKEND_TIMEOUT_SECS") {
        match raw.trim().parse::<u64>() {
            Ok(secs) => config.backend.timeout_secs = secs,
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid VOXRELAY_BACKEND_TIMEOUT_SECS"),
        }
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> Result<VoxrelayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).context("invalid TOML config"),
        "yaml" | "yml" => serde_yaml::from_str(raw).context("invalid YAML config"),
        "json" => serde_json::from_str(raw).context("invalid JSON config"),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
