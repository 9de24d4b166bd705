//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--hidden`, `--timeout`, etc.)
//! 2. `$FM_SEARCH_CONFIG` environment variable (path to config file)
//! 3. Project-local `.fm-search.toml` in the current working directory
//! 4. Global `~/.config/fm-search/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::fs::watcher::{DEFAULT_DEBOUNCE_MS, DEFAULT_IGNORE_PATTERNS};
use crate::search::history::DEFAULT_HISTORY_LEN;
use crate::search::timeout::{self, DEFAULT_TIMEOUT_SECS};

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Starting directory (overridden by CLI positional arg).
    pub default_path: Option<String>,
    /// Show hidden files by default.
    pub show_hidden: Option<bool>,
    /// Enable mouse support.
    pub mouse: Option<bool>,
}

/// Tree panel settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// Directories always listed first. Used until the user toggles the
    /// preference, which is then persisted.
    pub dirs_first: Option<bool>,
}

/// Content search settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// Initial search timeout in seconds (1-3600).
    pub default_timeout_secs: Option<u64>,
    /// Number of remembered queries.
    pub history_len: Option<usize>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Enable filesystem watcher for auto-refresh.
    pub enabled: Option<bool>,
    /// Path components that never produce refreshes.
    pub ignore: Option<Vec<String>>,
    /// Window over which change notifications are coalesced per path.
    pub debounce_ms: Option<u64>,
}

/// Settle detection for the progress indicator.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CompletionConfig {
    pub quiet_window_ms: Option<u64>,
    pub burst_threshold: Option<usize>,
    pub poll_interval_ms: Option<u64>,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `$FM_LOG` takes precedence.
    pub level: Option<String>,
    /// Log file path.
    pub file: Option<PathBuf>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub tree: TreeConfig,
    pub search: SearchConfig,
    pub watcher: WatcherConfig,
    pub completion: CompletionConfig,
    pub log: LogConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default quiet window before a cascade counts as settled.
pub const DEFAULT_QUIET_WINDOW_MS: u64 = 1000;
/// Default number of changes within the quiet window that count as a burst.
pub const DEFAULT_BURST_THRESHOLD: usize = 20;
/// Default interval between settle checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; that one is applied separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("FM_SEARCH_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".fm-search.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("fm-search").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed. Logging is not up yet when config
/// loads, so parse failures go to stderr.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return None,
    };
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`. Values set in `other` win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                default_path: other
                    .general
                    .default_path
                    .clone()
                    .or(self.general.default_path),
                show_hidden: other.general.show_hidden.or(self.general.show_hidden),
                mouse: other.general.mouse.or(self.general.mouse),
            },
            tree: TreeConfig {
                dirs_first: other.tree.dirs_first.or(self.tree.dirs_first),
            },
            search: SearchConfig {
                default_timeout_secs: other
                    .search
                    .default_timeout_secs
                    .or(self.search.default_timeout_secs),
                history_len: other.search.history_len.or(self.search.history_len),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                ignore: other.watcher.ignore.clone().or(self.watcher.ignore),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
            },
            completion: CompletionConfig {
                quiet_window_ms: other
                    .completion
                    .quiet_window_ms
                    .or(self.completion.quiet_window_ms),
                burst_threshold: other
                    .completion
                    .burst_threshold
                    .or(self.completion.burst_threshold),
                poll_interval_ms: other
                    .completion
                    .poll_interval_ms
                    .or(self.completion.poll_interval_ms),
            },
            log: LogConfig {
                level: other.log.level.clone().or(self.log.level),
                file: other.log.file.clone().or(self.log.file),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn show_hidden(&self) -> bool {
        self.general.show_hidden.unwrap_or(false)
    }

    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(true)
    }

    pub fn dirs_first(&self) -> bool {
        self.tree.dirs_first.unwrap_or(true)
    }

    /// Search timeout, clamped to the valid range.
    pub fn default_timeout_secs(&self) -> u64 {
        self.search
            .default_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(timeout::MIN_TIMEOUT_SECS, timeout::MAX_TIMEOUT_SECS)
    }

    pub fn history_len(&self) -> usize {
        self.search.history_len.unwrap_or(DEFAULT_HISTORY_LEN).max(1)
    }

    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    /// Watcher ignore list; the built-in list when unset.
    pub fn watcher_ignore(&self) -> Vec<String> {
        match &self.watcher.ignore {
            Some(list) => list.clone(),
            None => DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Watcher debounce window; zero forwards every notification.
    pub fn watcher_debounce(&self) -> Duration {
        Duration::from_millis(self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(
            self.completion
                .quiet_window_ms
                .unwrap_or(DEFAULT_QUIET_WINDOW_MS),
        )
    }

    pub fn burst_threshold(&self) -> usize {
        self.completion
            .burst_threshold
            .unwrap_or(DEFAULT_BURST_THRESHOLD)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.completion
                .poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                .max(10),
        )
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Log file path: configured, or `<cache dir>/fm-search/fm.log`.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log
            .file
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("fm-search").join("fm.log")))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = AppConfig::default();
        assert!(!cfg.show_hidden());
        assert!(cfg.mouse_enabled());
        assert!(cfg.dirs_first());
        assert_eq!(cfg.default_timeout_secs(), 45);
        assert_eq!(cfg.history_len(), 50);
        assert!(cfg.watcher_enabled());
        assert!(cfg.watcher_ignore().contains(&".git".to_string()));
        assert_eq!(cfg.watcher_debounce(), Duration::from_millis(300));
        assert_eq!(cfg.quiet_window(), Duration::from_millis(1000));
        assert_eq!(cfg.burst_threshold(), 20);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.log_level(), "info");
    }

    #[test]
    fn test_toml_parsing_full() {
        let toml = r#"
[general]
default_path = "/srv"
show_hidden = true
mouse = false

[tree]
dirs_first = false

[search]
default_timeout_secs = 120
history_len = 10

[watcher]
enabled = false
ignore = ["build"]
debounce_ms = 150

[completion]
quiet_window_ms = 500
burst_threshold = 5
poll_interval_ms = 100

[log]
level = "debug"
file = "/tmp/fm.log"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(cfg.general.default_path.as_deref(), Some("/srv"));
        assert!(cfg.show_hidden());
        assert!(!cfg.mouse_enabled());
        assert!(!cfg.dirs_first());
        assert_eq!(cfg.default_timeout_secs(), 120);
        assert_eq!(cfg.history_len(), 10);
        assert!(!cfg.watcher_enabled());
        assert_eq!(cfg.watcher_ignore(), vec!["build".to_string()]);
        assert_eq!(cfg.watcher_debounce(), Duration::from_millis(150));
        assert_eq!(cfg.quiet_window(), Duration::from_millis(500));
        assert_eq!(cfg.burst_threshold(), 5);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.log_file(), Some(PathBuf::from("/tmp/fm.log")));
    }

    #[test]
    fn test_toml_parsing_partial() {
        let toml = r#"
[general]
show_hidden = true
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert!(cfg.show_hidden());
        assert!(cfg.dirs_first());
        assert_eq!(cfg.default_timeout_secs(), 45);
    }

    #[test]
    fn test_toml_parsing_empty() {
        let cfg: AppConfig = toml::from_str("").expect("parse failed");
        assert!(!cfg.show_hidden());
        assert_eq!(cfg.history_len(), 50);
    }

    #[test]
    fn test_timeout_is_clamped() {
        let cfg: AppConfig = toml::from_str("[search]\ndefault_timeout_secs = 99999").unwrap();
        assert_eq!(cfg.default_timeout_secs(), 3600);
        let cfg: AppConfig = toml::from_str("[search]\ndefault_timeout_secs = 0").unwrap();
        assert_eq!(cfg.default_timeout_secs(), 1);
    }

    #[test]
    fn test_merge_overrides() {
        let base = AppConfig {
            general: GeneralConfig {
                show_hidden: Some(false),
                mouse: Some(false),
                ..Default::default()
            },
            search: SearchConfig {
                default_timeout_secs: Some(30),
                history_len: Some(20),
            },
            ..Default::default()
        };

        let over = AppConfig {
            general: GeneralConfig {
                show_hidden: Some(true),
                ..Default::default()
            },
            search: SearchConfig {
                default_timeout_secs: Some(90),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = base.merge(&over);
        assert!(merged.show_hidden()); // overridden
        assert!(!merged.mouse_enabled()); // from base
        assert_eq!(merged.default_timeout_secs(), 90); // overridden
        assert_eq!(merged.history_len(), 20); // from base
    }

    #[test]
    fn test_merge_none_does_not_clear_some() {
        let base = AppConfig {
            watcher: WatcherConfig {
                enabled: Some(false),
                ignore: Some(vec!["dist".into()]),
                debounce_ms: Some(0),
            },
            ..Default::default()
        };
        let merged = base.merge(&AppConfig::default());
        assert!(!merged.watcher_enabled());
        assert_eq!(merged.watcher_ignore(), vec!["dist".to_string()]);
        assert_eq!(merged.watcher_debounce(), Duration::ZERO);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("test-config.toml");
        let mut f = std::fs::File::create(&cfg_path).expect("create");
        writeln!(
            f,
            r#"
[general]
show_hidden = true

[completion]
burst_threshold = 8
"#
        )
        .expect("write");

        let cfg = load_file(&cfg_path).expect("load");
        assert!(cfg.show_hidden());
        assert_eq!(cfg.burst_threshold(), 8);
        assert_eq!(cfg.quiet_window(), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_file(Path::new("/nonexistent/config.toml")).is_none());
    }

    #[test]
    fn test_load_invalid_toml_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("bad.toml");
        std::fs::write(&cfg_path, "this is { not valid toml").expect("write");
        assert!(load_file(&cfg_path).is_none());
    }

    #[test]
    fn test_load_with_cli_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("config.toml");
        std::fs::write(
            &cfg_path,
            r#"
[general]
show_hidden = true

[search]
default_timeout_secs = 60
"#,
        )
        .expect("write");

        let cli_overrides = AppConfig {
            search: SearchConfig {
                default_timeout_secs: Some(200),
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = AppConfig::load(Some(&cfg_path), Some(&cli_overrides));
        assert_eq!(cfg.default_timeout_secs(), 200);
        assert!(cfg.show_hidden());
    }
}
