//! Application configuration for the migration bot.
//!
//! Config lives in `migratebot.toml` (working directory first, then
//! `~/.migratebot/migratebot.toml`). CLI flags and a few environment variables
//! override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "migratebot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".migratebot";

// ---------------------------------------------------------------------------
// Config structs (matching migratebot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Issue tracker / change request host.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Generative model service.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Source site layout.
    #[serde(default)]
    pub source: SourceConfig,

    /// Target corpus layout and build commands.
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Retry policy for fetch and conversion stages.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Image hosting for diff images. Diff upload is skipped when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_host: Option<ImageHostConfig>,

    /// Diff image rendering.
    #[serde(default)]
    pub diff: DiffConfig,
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Repository owner (overridden by `GITHUB_REPOSITORY`).
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Repository name (overridden by `GITHUB_REPOSITORY`).
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Label carried by migration tickets.
    #[serde(default = "default_label")]
    pub label: String,

    /// REST API base URL.
    #[serde(default = "default_github_api")]
    pub api_base: String,

    /// Name of the env var holding the token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Branch that change requests target.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Prefix for migration branches.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Commit author name.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Commit author email.
    #[serde(default = "default_bot_email")]
    pub bot_email: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            label: default_label(),
            api_base: default_github_api(),
            token_env: default_token_env(),
            base_branch: default_base_branch(),
            branch_prefix: default_branch_prefix(),
            bot_name: default_bot_name(),
            bot_email: default_bot_email(),
        }
    }
}

fn default_owner() -> String {
    "cppdoc-cc".into()
}
fn default_repo() -> String {
    "cppdoc".into()
}
fn default_label() -> String {
    "migrate-cppref-page".into()
}
fn default_github_api() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_base_branch() -> String {
    "main".into()
}
fn default_branch_prefix() -> String {
    "migrate/".into()
}
fn default_bot_name() -> String {
    "github-actions[bot]".into()
}
fn default_bot_email() -> String {
    "github-actions[bot]@users.noreply.github.com".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for conversion.
    #[serde(default = "default_model")]
    pub model: String,

    /// Chat completions API base URL.
    #[serde(default = "default_openrouter_api")]
    pub api_base: String,

    /// Instruction template file. `{{LLM_DOCS}}` is replaced by the component docs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_path: Option<PathBuf>,

    /// Component documentation spliced into the instruction template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_docs_path: Option<PathBuf>,

    /// `HTTP-Referer` attribution header.
    #[serde(default = "default_referer")]
    pub referer: String,

    /// `X-Title` attribution header.
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            api_base: default_openrouter_api(),
            prompt_path: None,
            component_docs_path: None,
            referer: default_referer(),
            app_title: default_app_title(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.5-flash".into()
}
fn default_openrouter_api() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_referer() -> String {
    "https://github.com/cppdoc-cc/cppdoc".into()
}
fn default_app_title() -> String {
    "CppDoc Migration Bot".into()
}

/// `[source]` section: where the content lives on the remote page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Human-readable name of the source site.
    #[serde(default = "default_source_name")]
    pub name: String,

    /// Selector for the main content subtree.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,

    /// Selector for the page heading.
    #[serde(default = "default_heading_selector")]
    pub heading_selector: String,

    /// Subtrees removed from the content before conversion.
    #[serde(default = "default_noise_selectors")]
    pub noise_selectors: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: default_source_name(),
            content_selector: default_content_selector(),
            heading_selector: default_heading_selector(),
            noise_selectors: default_noise_selectors(),
        }
    }
}

fn default_source_name() -> String {
    "cppreference".into()
}
fn default_content_selector() -> String {
    "#mw-content-text".into()
}
fn default_heading_selector() -> String {
    "#firstHeading".into()
}
fn default_noise_selectors() -> Vec<String> {
    vec![
        ".t-navbar".into(),
        ".editsection".into(),
        ".t-example-live-link".into(),
        "#toc".into(),
    ]
}

/// `[corpus]` section: the destination documentation repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Repository root (working tree for git and build commands).
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,

    /// Documents directory, relative to `root`.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Slug table (JSON array of `{ "cppref": ..., "cppdoc": ... }`), relative to `root`.
    #[serde(default = "default_slug_map")]
    pub slug_map: PathBuf,

    /// Build output directory, relative to `root`.
    #[serde(default = "default_build_output_dir")]
    pub build_output_dir: PathBuf,

    /// Selector for the document body in built pages.
    #[serde(default = "default_built_content_selector")]
    pub built_content_selector: String,

    /// Formatting command; failures are logged, not fatal.
    #[serde(default = "default_format_command")]
    pub format_command: Vec<String>,

    /// Build command; a nonzero exit fails the job.
    #[serde(default = "default_build_command")]
    pub build_command: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            docs_dir: default_docs_dir(),
            slug_map: default_slug_map(),
            build_output_dir: default_build_output_dir(),
            built_content_selector: default_built_content_selector(),
            format_command: default_format_command(),
            build_command: default_build_command(),
        }
    }
}

impl CorpusConfig {
    /// Absolute-ish path of the documents directory.
    pub fn docs_root(&self) -> PathBuf {
        self.root.join(&self.docs_dir)
    }

    /// Path of the slug table file.
    pub fn slug_map_path(&self) -> PathBuf {
        self.root.join(&self.slug_map)
    }

    /// Path of the build output directory.
    pub fn build_output_root(&self) -> PathBuf {
        self.root.join(&self.build_output_dir)
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_docs_dir() -> PathBuf {
    PathBuf::from("src/content/docs")
}
fn default_slug_map() -> PathBuf {
    PathBuf::from("migrate/slug_map.json")
}
fn default_build_output_dir() -> PathBuf {
    PathBuf::from("dist")
}
fn default_built_content_selector() -> String {
    "main".into()
}
fn default_format_command() -> Vec<String> {
    vec!["npm".into(), "run".into(), "format".into()]
}
fn default_build_command() -> Vec<String> {
    vec!["npm".into(), "run".into(), "build".into()]
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per retryable stage (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    2000
}

/// `[image_host]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHostConfig {
    /// Upload endpoint accepting a multipart form.
    pub endpoint: String,

    /// Env var holding an optional bearer token for the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Multipart field carrying the image.
    #[serde(default = "default_image_field")]
    pub field_name: String,
}

fn default_image_field() -> String {
    "image".into()
}

/// `[diff]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffConfig {
    /// TrueType/OpenType font for diff images. System monospace fonts are tried when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.migratebot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MigrateError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user-level config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config.
///
/// Looks for `migratebot.toml` in the working directory, then in the user
/// config directory. Returns defaults if neither exists.
pub fn load_config() -> Result<AppConfig> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_from(&local);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MigrateError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into `dir`. Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| MigrateError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MigrateError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MigrateError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Apply `GITHUB_REPOSITORY=owner/repo` when present.
pub fn apply_repository_override(config: &mut AppConfig, value: Option<&str>) {
    let Some((owner, repo)) = value.and_then(|v| v.split_once('/')) else {
        return;
    };
    if owner.is_empty() || repo.is_empty() {
        return;
    }
    config.github.owner = owner.to_string();
    config.github.repo = repo.to_string();
}

/// Service credentials read once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub github_token: String,
    pub model_api_key: String,
    pub image_host_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &"<redacted>")
            .field("model_api_key", &"<redacted>")
            .field("image_host_token", &self.image_host_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Read the required service credentials from the environment.
///
/// Fails when either the tracker token or the model API key is missing or empty.
pub fn load_credentials(config: &AppConfig) -> Result<Credentials> {
    let github_token = load_github_token(config)?;
    let model_api_key = required_env(&config.openrouter.api_key_env, "OpenRouter API key")?;
    let image_host_token = config
        .image_host
        .as_ref()
        .and_then(|h| h.api_key_env.as_deref())
        .and_then(|var| std::env::var(var).ok())
        .filter(|v| !v.is_empty());

    Ok(Credentials {
        github_token,
        model_api_key,
        image_host_token,
    })
}

/// Read the GitHub token alone, for commands that never call the model.
pub fn load_github_token(config: &AppConfig) -> Result<String> {
    required_env(&config.github.token_env, "GitHub token")
}

fn required_env(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(MigrateError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}
