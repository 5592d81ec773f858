//! Configuration validation engine.
//!
//! Validates TOML configuration files against the known schema, detects
//! unknown/misspelled fields, and checks the effective settings.

use std::path::Path;

use crate::schema::VoxrelayConfig;

/// Telegram Bot API refuses `getFile` downloads above 20 MB.
const TELEGRAM_DOWNLOAD_LIMIT: u64 = 20 * 1024 * 1024;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "value", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "backend.base_url"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}]: {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Known keys ──────────────────────────────────────────────────────────────

const TOP_LEVEL_KEYS: &[&str] = &["telegram", "backend"];
const TELEGRAM_KEYS: &[&str] = &["token", "poll_timeout_secs", "api_url"];
const BACKEND_KEYS: &[&str] = &[
    "base_url",
    "timeout_secs",
    "min_audio_bytes",
    "max_media_bytes",
];

fn known_keys_for(section: &str) -> Option<&'static [&'static str]> {
    match section {
        "telegram" => Some(TELEGRAM_KEYS),
        "backend" => Some(BACKEND_KEYS),
        _ => None,
    }
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Find the best match for `needle` among `candidates` using Levenshtein
/// distance. Returns `Some(best)` if the distance is <= `max_distance`.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = if let Some(p) = path {
        Some(p.to_path_buf())
    } else {
        crate::loader::find_config_file()
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    match std::fs::read_to_string(actual_path) {
        Ok(content) if is_toml => {
            let mut result = validate_toml_str(&content);
            result.config_path = Some(actual_path.clone());
            result
        },
        Ok(_) => ValidationResult {
            // Non-TOML formats are checked by loading them.
            diagnostics: match crate::loader::load_config(actual_path) {
                Ok(_) => Vec::new(),
                Err(e) => vec![Diagnostic {
                    severity: Severity::Error,
                    category: "type-error",
                    path: String::new(),
                    message: e.to_string(),
                }],
            },
            config_path: Some(actual_path.clone()),
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read config file: {e}"),
            }],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&toml_value, &mut diagnostics);

    // 3. Type check + semantic checks on the parsed config
    match toml::from_str::<VoxrelayConfig>(toml_str) {
        Ok(config) => diagnostics.extend(
            validate_config(&config)
                .into_iter()
                // The token usually arrives via env; only flag it on the effective config.
                .filter(|d| d.path != "telegram.token"),
        ),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an effective (loaded + env-overridden) config.
#[must_use]
pub fn validate_config(config: &VoxrelayConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut push = |severity, path: &str, message: String| {
        diagnostics.push(Diagnostic {
            severity,
            category: "value",
            path: path.to_string(),
            message,
        });
    };

    if !config.telegram.has_token() {
        push(
            Severity::Error,
            "telegram.token",
            "bot token is empty; set it in the config or VOXRELAY_TELEGRAM_TOKEN".into(),
        );
    }

    if let Some(ref api_url) = config.telegram.api_url
        && let Err(e) = url::Url::parse(api_url)
    {
        push(
            Severity::Error,
            "telegram.api_url",
            format!("invalid URL {api_url:?}: {e}"),
        );
    }

    match url::Url::parse(&config.backend.base_url) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => push(
            Severity::Error,
            "backend.base_url",
            format!("unsupported scheme {:?}", url.scheme()),
        ),
        Ok(_) => {},
        Err(e) => push(
            Severity::Error,
            "backend.base_url",
            format!("invalid URL {:?}: {e}", config.backend.base_url),
        ),
    }

    if config.backend.timeout_secs == 0 {
        push(
            Severity::Error,
            "backend.timeout_secs",
            "timeout must be greater than zero".into(),
        );
    } else if config.backend.timeout_secs < 60 {
        push(
            Severity::Warning,
            "backend.timeout_secs",
            format!(
                "{}s is short; synthesis commonly takes minutes",
                config.backend.timeout_secs
            ),
        );
    }

    if config.backend.max_media_bytes > TELEGRAM_DOWNLOAD_LIMIT {
        push(
            Severity::Info,
            "backend.max_media_bytes",
            "Telegram bots cannot download files above 20 MB; the lower limit applies".into(),
        );
    }

    if config.telegram.poll_timeout_secs == 0 {
        push(
            Severity::Warning,
            "telegram.poll_timeout_secs",
            "0 disables long polling and busy-loops getUpdates".into(),
        );
    }

    diagnostics
}

/// Walk the TOML value tree and flag unknown keys.
fn check_unknown_fields(value: &toml::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_table() else {
        return;
    };

    for (key, section) in root {
        let Some(known) = known_keys_for(key) else {
            diagnostics.push(unknown_field(key, key, TOP_LEVEL_KEYS));
            continue;
        };
        if let Some(table) = section.as_table() {
            for field in table.keys().filter(|f| !known.contains(&f.as_str())) {
                diagnostics.push(unknown_field(&format!("{key}.{field}"), field, known));
            }
        }
    }
}

fn unknown_field(path: &str, key: &str, candidates: &[&str]) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field {key:?} (did you mean {s:?}?)"),
        None => format!("unknown field {key:?}"),
    };
    Diagnostic {
        severity: Severity::Warning,
        category: "unknown-field",
        path: path.to_string(),
        message,
    }
}
