//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::TetherResult;

use super::types::{Config, OutputFormat};

/// Project-local config file name
pub const PROJECT_CONFIG: &str = "tether.toml";

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown key '{}' in {}", self.key, self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", suggestion)?;
        }
        Ok(())
    }
}

/// Load configuration and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(path: &Path) -> TetherResult<(Config, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;
    let (config, unknown_paths) = parse_toml(&content)?;

    let warnings = unknown_paths
        .into_iter()
        .map(|path_str| unknown_key_warning(path, &content, &path_str, CONFIG_KEYS))
        .collect();

    Ok((config, warnings))
}

/// Parse TOML text, returning the config and the dotted paths of unknown keys
pub fn parse_toml(content: &str) -> TetherResult<(Config, Vec<String>)> {
    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(content);
    let config: Config = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })?;
    Ok((config, unknown_paths))
}

/// Load from project config, user config, or defaults
///
/// A file that fails to parse is skipped with a warning log, so a broken user
/// config never blocks `--help`-level commands. Explicit `-c` paths go through
/// [`load_with_warnings`] instead and fail hard.
pub fn load_or_default(project_root: Option<&Path>) -> (Config, Vec<ConfigWarning>) {
    let mut candidates = Vec::new();
    if let Some(root) = project_root {
        candidates.push(root.join(PROJECT_CONFIG));
    }
    if let Some(user_config_dir) = dirs::config_dir() {
        candidates.push(user_config_dir.join("tether").join("config.toml"));
    }

    for path in candidates.into_iter().filter(|p| p.exists()) {
        match load_with_warnings(&path) {
            Ok((config, warnings)) => {
                debug!(path = %path.display(), "Loaded configuration");
                return (with_env_overrides(config), warnings);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable config"),
        }
    }

    (with_env_overrides(Config::default()), Vec::new())
}

/// Apply environment variable overrides (TETHER_* prefix)
pub fn with_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Overrides from an arbitrary lookup, so tests need not touch the process env
pub(crate) fn apply_overrides<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    // TETHER_CONCURRENCY
    if let Some(value) = lookup("TETHER_CONCURRENCY") {
        match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => config.run.concurrency = n,
            _ => warn!(value = %value, "Ignoring invalid TETHER_CONCURRENCY"),
        }
    }

    // TETHER_MAX_ATTEMPTS
    if let Some(value) = lookup("TETHER_MAX_ATTEMPTS") {
        match value.trim().parse::<u32>() {
            Ok(n) if n > 0 => config.retry.max_attempts = n,
            _ => warn!(value = %value, "Ignoring invalid TETHER_MAX_ATTEMPTS"),
        }
    }

    // TETHER_TAG_PREFIX
    if let Some(value) = lookup("TETHER_TAG_PREFIX") {
        if value.trim().is_empty() {
            warn!("Ignoring empty TETHER_TAG_PREFIX");
        } else {
            config.tagging.key_prefix = value.trim().to_string();
        }
    }

    // TETHER_OUTPUT
    if let Some(value) = lookup("TETHER_OUTPUT") {
        match OutputFormat::parse(&value) {
            Some(format) => config.output.format = format,
            None => warn!(value = %value, "Ignoring invalid TETHER_OUTPUT"),
        }
    }

    config
}

const CONFIG_KEYS: &[&str] = &[
    "run",
    "concurrency",
    "dry_run",
    "retry",
    "max_attempts",
    "initial_delay_ms",
    "max_delay_ms",
    "multiplier",
    "tagging",
    "key_prefix",
    "acceptance",
    "poll_attempts",
    "poll_interval_ms",
    "output",
    "format",
    "log_format",
];

/// Build a warning for one unknown dotted path
pub(crate) fn unknown_key_warning(
    file: &Path,
    content: &str,
    path_str: &str,
    candidates: &[&str],
) -> ConfigWarning {
    let key = path_str
        .split('.')
        .next_back()
        .unwrap_or(path_str)
        .to_string();
    ConfigWarning {
        line: find_line_number(content, &key),
        suggestion: suggest_key(&key, candidates),
        file: file.to_path_buf(),
        key,
    }
}

fn find_line_number(content: &str, needle: &str) -> Option<usize> {
    content
        .lines()
        .position(|line| line.contains(needle))
        .map(|i| i + 1)
}

fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| (candidate, levenshtein(unknown, candidate)))
        .min_by_key(|(_, dist)| *dist)
        .filter(|(_, dist)| *dist <= 2)
        .map(|(candidate, _)| candidate.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = usize::from(ac != bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}
