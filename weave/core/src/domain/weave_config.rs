// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Weave Configuration Types
//!
//! Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
//! - Bridge behaviour (per-call timeout, event buffer)
//! - One section per integration (credentials, paths, toggles)
//! - Observability settings
//!
//! Every integration setting can also be supplied through the environment
//! variables the adapters have always read (SQLITE_DB_PATH, DISCORD_WEBHOOK_URL,
//! ...); environment values win over the file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "theweave.dev/v1";
pub const KIND: &str = "WeaveConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaveConfig {
    /// API version (must be "theweave.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "WeaveConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: WeaveConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeaveConfigSpec {
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub sqlite: SqliteConfig,

    #[serde(default)]
    pub supabase: SupabaseConfig,

    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub replicate: ReplicateConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub rss: RssConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Upper bound on any single adapter call made by the bridge
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Field events buffered per listener before the slowest one lags
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Database file. Default: `<cwd>/.sacred/weave-backup.db`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub auto_backup: bool,

    #[serde(default = "default_backup_interval")]
    pub backup_interval_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: None,
            auto_backup: true,
            backup_interval_ms: default_backup_interval(),
        }
    }
}

impl SqliteConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| sacred_dir().join("weave-backup.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Service key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,

    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            service_key: None,
            schema_prefix: default_schema_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Webhook URL (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default = "default_discord_username")]
    pub username: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            username: default_discord_username(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API token (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default = "default_replicate_url")]
    pub api_url: String,

    /// Model as "owner/name"
    #[serde(default = "default_replicate_model")]
    pub model: String,

    /// Appended to every prompt
    #[serde(default = "default_style_suffix")]
    pub style_suffix: String,

    /// Generated images. Default: `<cwd>/.sacred/visions`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visions_dir: Option<PathBuf>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_token: None,
            api_url: default_replicate_url(),
            model: default_replicate_model(),
            style_suffix: default_style_suffix(),
            visions_dir: None,
            poll_interval_ms: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

impl ReplicateConfig {
    pub fn resolved_visions_dir(&self) -> PathBuf {
        self.visions_dir
            .clone()
            .unwrap_or_else(|| sacred_dir().join("visions"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Token (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Repository as "owner/name"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default = "default_github_url")]
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            repository: None,
            api_url: default_github_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Feed output directory. Default: `<cwd>/.sacred/feeds`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_path: Option<PathBuf>,

    #[serde(default = "default_rss_base_url")]
    pub base_url: String,

    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Also write Atom alongside RSS and JSON Feed
    #[serde(default = "default_true")]
    pub auto_generate: bool,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feed_path: None,
            base_url: default_rss_base_url(),
            max_items: default_max_items(),
            auto_generate: true,
        }
    }
}

impl RssConfig {
    pub fn resolved_feed_path(&self) -> PathBuf {
        self.feed_path
            .clone()
            .unwrap_or_else(|| sacred_dir().join("feeds"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_call_timeout() -> u64 {
    30_000
}

fn default_event_buffer() -> usize {
    1000
}

fn default_backup_interval() -> u64 {
    3_600_000
}

fn default_schema_prefix() -> String {
    "weave_".to_string()
}

fn default_discord_username() -> String {
    "The Weave".to_string()
}

fn default_replicate_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_replicate_model() -> String {
    "black-forest-labs/flux-schnell".to_string()
}

fn default_style_suffix() -> String {
    "sacred geometry, luminous, ethereal light, highly detailed".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    60
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

fn default_rss_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_items() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// `<cwd>/.sacred`, the root for every default on-disk location.
pub fn sacred_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".sacred")
}

/// Resolve a secret that may be given as "env:VAR_NAME".
/// Returns `None` for unset values and for missing variables.
pub fn resolve_secret(value: &Option<String>) -> Option<String> {
    match value {
        Some(v) if v.starts_with("env:") => {
            let var_name = v.trim_start_matches("env:");
            match std::env::var(var_name) {
                Ok(resolved) if !resolved.is_empty() => Some(resolved),
                _ => {
                    tracing::warn!("Environment variable not set: {}", var_name);
                    None
                }
            }
        }
        Some(v) if !v.is_empty() => Some(v.clone()),
        _ => None,
    }
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "the-weave".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: WeaveConfigSpec::default(),
        }
    }
}

impl WeaveConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. WEAVE_CONFIG_PATH environment variable
    /// 2. ./weave-config.yaml (working directory)
    /// 3. ~/.weave/config.yaml (user home)
    /// 4. /etc/weave/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("WEAVE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./weave-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".weave").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/weave/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let spec = &mut self.spec;

        // SQLite backup
        if let Some(path) = lookup("SQLITE_DB_PATH") {
            spec.sqlite.db_path = Some(PathBuf::from(path));
        }
        if let Some(enabled) = parse_bool("SQLITE_AUTO_BACKUP", lookup("SQLITE_AUTO_BACKUP")) {
            spec.sqlite.auto_backup = enabled;
        }
        if let Some(interval) = parse_number("SQLITE_BACKUP_INTERVAL", lookup("SQLITE_BACKUP_INTERVAL")) {
            spec.sqlite.backup_interval_ms = interval;
        }

        // Supabase
        if let Some(url) = lookup("SUPABASE_URL") {
            spec.supabase.url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_SERVICE_KEY") {
            spec.supabase.service_key = Some(key);
        }
        if let Some(prefix) = lookup("SUPABASE_SCHEMA_PREFIX") {
            spec.supabase.schema_prefix = prefix;
        }

        // Discord
        if let Some(url) = lookup("DISCORD_WEBHOOK_URL") {
            spec.discord.webhook_url = Some(url);
        }
        if let Some(username) = lookup("DISCORD_USERNAME") {
            spec.discord.username = username;
        }

        // Replicate
        if let Some(token) = lookup("REPLICATE_API_TOKEN") {
            spec.replicate.api_token = Some(token);
        }
        if let Some(model) = lookup("REPLICATE_MODEL") {
            spec.replicate.model = model;
        }
        if let Some(suffix) = lookup("REPLICATE_STYLE_SUFFIX") {
            spec.replicate.style_suffix = suffix;
        }
        if let Some(dir) = lookup("VISIONS_DIR") {
            spec.replicate.visions_dir = Some(PathBuf::from(dir));
        }

        // GitHub
        if let Some(token) = lookup("GITHUB_TOKEN") {
            spec.github.token = Some(token);
        }
        if let Some(repository) = lookup("GITHUB_REPOSITORY") {
            spec.github.repository = Some(repository);
        }
        if let Some(url) = lookup("GITHUB_API_URL") {
            spec.github.api_url = url;
        }

        // RSS
        if let Some(path) = lookup("RSS_FEED_PATH") {
            spec.rss.feed_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("RSS_BASE_URL") {
            spec.rss.base_url = url;
        }
        if let Some(max) = parse_number("RSS_MAX_ITEMS", lookup("RSS_MAX_ITEMS")) {
            spec.rss.max_items = max as usize;
        }
        if let Some(enabled) = parse_bool("RSS_AUTO_GENERATE", lookup("RSS_AUTO_GENERATE")) {
            spec.rss.auto_generate = enabled;
        }

        // Bridge
        if let Some(timeout) = parse_number("WEAVE_CALL_TIMEOUT_MS", lookup("WEAVE_CALL_TIMEOUT_MS")) {
            spec.bridge.call_timeout_ms = timeout;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        if spec.bridge.call_timeout_ms == 0 {
            anyhow::bail!("spec.bridge.call_timeout_ms must be greater than zero");
        }

        if spec.bridge.event_buffer == 0 {
            anyhow::bail!("spec.bridge.event_buffer must be greater than zero");
        }

        if spec.sqlite.auto_backup && spec.sqlite.backup_interval_ms == 0 {
            anyhow::bail!("spec.sqlite.backup_interval_ms must be greater than zero when auto_backup is on");
        }

        if spec.rss.max_items == 0 {
            anyhow::bail!("spec.rss.max_items must be greater than zero");
        }

        check_url("spec.replicate.api_url", &spec.replicate.api_url)?;
        check_url("spec.github.api_url", &spec.github.api_url)?;
        check_url("spec.rss.base_url", &spec.rss.base_url)?;
        if let Some(url) = &spec.supabase.url {
            check_url("spec.supabase.url", url)?;
        }
        if let Some(url) = &spec.discord.webhook_url {
            if !url.starts_with("env:") {
                check_url("spec.discord.webhook_url", url)?;
            }
        }

        if !is_owner_slash_name(&spec.replicate.model) {
            anyhow::bail!(
                "spec.replicate.model must look like 'owner/name', got '{}'",
                spec.replicate.model
            );
        }

        if let Some(repository) = &spec.github.repository {
            if !is_owner_slash_name(repository) {
                anyhow::bail!(
                    "spec.github.repository must look like 'owner/name', got '{}'",
                    repository
                );
            }
        }

        Ok(())
    }
}

fn check_url(field: &str, value: &str) -> anyhow::Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL ('{}'): {}", field, value, e))
}

fn is_owner_slash_name(value: &str) -> bool {
    let mut parts = value.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    )
}

fn parse_bool(name: &str, value: Option<String>) -> Option<bool> {
    let val = value?;
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                name,
                val
            );
            None
        }
    }
}

fn parse_number(name: &str, value: Option<String>) -> Option<u64> {
    let val = value?;
    match val.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!("Invalid value for {}: '{}'. Expected a number. Ignoring.", name, val);
            None
        }
    }
}
