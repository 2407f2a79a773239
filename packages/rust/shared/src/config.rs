//! Application configuration for Competitor Intel.
//!
//! User config lives at `~/.compintel/compintel.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file, only the names of the env vars
//! that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CompintelError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "compintel.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".compintel";

// ---------------------------------------------------------------------------
// Config structs (matching compintel.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Web content fetching.
    #[serde(default)]
    pub scraping: ScrapingConfig,

    /// Competitor search.
    #[serde(default)]
    pub search: SearchConfig,

    /// PDF document parsing.
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Report email delivery.
    #[serde(default)]
    pub email: EmailConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// How many competitors to keep after ranking.
    #[serde(default = "default_max_competitors")]
    pub max_competitors: usize,

    /// Result limit for each competitor search query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Timeout for a single external call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Timeout for one PDF parse.
    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,

    /// Overall budget for one pipeline run.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Whether finished reports are saved to the report database.
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Report database location. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_competitors: default_max_competitors(),
            results_per_query: default_results_per_query(),
            call_timeout_secs: default_call_timeout(),
            document_timeout_secs: default_document_timeout(),
            run_timeout_secs: default_run_timeout(),
            persist: true,
            db_path: default_db_path(),
        }
    }
}

fn default_max_competitors() -> usize {
    5
}
fn default_results_per_query() -> usize {
    5
}
fn default_call_timeout() -> u64 {
    120
}
fn default_document_timeout() -> u64 {
    30
}
fn default_run_timeout() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_db_path() -> String {
    "~/.compintel/reports.db".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for extraction, ranking, analysis and chat.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_openrouter_url")]
    pub base_url: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_openrouter_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_max_tokens() -> u32 {
    4096
}

/// Which content fetcher to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeBackend {
    /// Direct HTTP GET with local HTML-to-Markdown conversion.
    #[default]
    Http,
    /// Firecrawl scrape API.
    Firecrawl,
}

/// `[scraping]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    #[serde(default)]
    pub backend: ScrapeBackend,

    #[serde(default = "default_firecrawl_key_env")]
    pub firecrawl_api_key_env: String,

    #[serde(default = "default_firecrawl_url")]
    pub firecrawl_base_url: String,

    /// Allow fetching loopback and private-network hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            backend: ScrapeBackend::default(),
            firecrawl_api_key_env: default_firecrawl_key_env(),
            firecrawl_base_url: default_firecrawl_url(),
            allow_private_hosts: false,
        }
    }
}

fn default_firecrawl_key_env() -> String {
    "FIRECRAWL_API_KEY".into()
}
fn default_firecrawl_url() -> String {
    "https://api.firecrawl.dev".into()
}

/// Which search API to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    #[default]
    Firecrawl,
    Tavily,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchBackend,

    #[serde(default = "default_tavily_key_env")]
    pub tavily_api_key_env: String,

    #[serde(default = "default_tavily_url")]
    pub tavily_base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchBackend::default(),
            tavily_api_key_env: default_tavily_key_env(),
            tavily_base_url: default_tavily_url(),
        }
    }
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_tavily_url() -> String {
    "https://api.tavily.com".into()
}

/// `[documents]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Parse linked PDFs during the deep scrape.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Parser executable. It is invoked as `<command> <args..> <file.pdf>`
    /// and must write `<file.pdf>.parse.md` next to its input.
    #[serde(default = "default_document_command")]
    pub command: String,

    #[serde(default = "default_document_args")]
    pub args: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_document_command(),
            args: default_document_args(),
        }
    }
}

fn default_document_command() -> String {
    "reducto".into()
}
fn default_document_args() -> Vec<String> {
    vec!["parse".into()]
}

/// `[email]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_resend_key_env")]
    pub api_key_env: String,

    /// Sender address shown to recipients.
    #[serde(default = "default_email_from")]
    pub from: String,

    #[serde(default = "default_resend_url")]
    pub base_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_resend_key_env(),
            from: default_email_from(),
            base_url: default_resend_url(),
        }
    }
}

fn default_resend_key_env() -> String {
    "RESEND_API_KEY".into()
}
fn default_email_from() -> String {
    "Competitor Intel <onboarding@resend.dev>".into()
}
fn default_resend_url() -> String {
    "https://api.resend.com".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.compintel/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CompintelError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.compintel/compintel.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CompintelError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CompintelError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CompintelError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CompintelError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CompintelError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| CompintelError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Read an API key from the named env var.
pub fn resolve_api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(CompintelError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    resolve_api_key(var_name, "OpenRouter").map(|_| ()).map_err(|_| {
        CompintelError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))
    })
}
