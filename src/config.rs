use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const CONFIG_FILE: &str = "proofrun.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
}

/// Connection settings for the OpenAI-compatible API.
///
/// The API key is never read from the file; see [`Secrets`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL, including the version prefix
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds (streams are exempt)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Hosted assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Existing assistant to run against. `proofrun assistant create` prints one.
    #[serde(default)]
    pub id: Option<String>,

    /// Display name used when creating an assistant
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Model used when creating an assistant
    #[serde(default = "default_model")]
    pub model: String,

    /// System instructions used when creating an assistant
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// Upper bound on tool-output submissions per run
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Poll interval for `chat --poll`
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: default_assistant_name(),
            model: default_model(),
            instructions: default_instructions(),
            max_tool_rounds: default_max_tool_rounds(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Base image the program image is built from
    #[serde(default = "default_base_image")]
    pub base_image: String,

    /// Runtime dependency installed into the image
    #[serde(default = "default_dependency")]
    pub dependency: String,

    /// Interpreter used to run the payload
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// File name the payload is written to inside the image
    #[serde(default = "default_script_name")]
    pub script_name: String,

    /// Working directory inside the image
    #[serde(default = "default_workdir")]
    pub workdir: String,

    /// Wall-clock bound for a single container run, in seconds
    #[serde(default = "default_sandbox_timeout")]
    pub timeout_secs: u64,

    /// Report the installed dependency version after a successful run
    #[serde(default = "default_true")]
    pub probe_version: bool,

    /// Network configuration
    #[serde(default)]
    pub network: NetworkPolicy,

    /// Resource limits
    #[serde(default)]
    pub resources: ResourceConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            dependency: default_dependency(),
            interpreter: default_interpreter(),
            script_name: default_script_name(),
            workdir: default_workdir(),
            timeout_secs: default_sandbox_timeout(),
            probe_version: true,
            network: NetworkPolicy::default(),
            resources: ResourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPolicy {
    #[default]
    AllowAll,
    Deny,
}

impl std::fmt::Display for NetworkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllowAll => write!(f, "allow-all"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Memory limit (e.g., "2g")
    #[serde(default = "default_memory")]
    pub memory: String,

    /// CPU limit (e.g., "2")
    #[serde(default = "default_cpus")]
    pub cpus: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            memory: default_memory(),
            cpus: default_cpus(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempt ceiling for sandboxed runs (0 behaves like 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// NewsAPI base URL
    #[serde(default = "default_news_base_url")]
    pub base_url: String,

    /// Default search query for `news ingest`
    #[serde(default = "default_news_query")]
    pub query: String,

    /// Number of articles to request
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How long fetched results are reused
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    /// Cache directory (defaults to the user cache dir)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_base_url(),
            query: default_news_query(),
            page_size: default_page_size(),
            cache_ttl_hours: default_cache_ttl_hours(),
            cache_dir: None,
        }
    }
}

impl NewsConfig {
    /// Resolve the cache directory, falling back to `<user cache>/proofrun`.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("proofrun")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Chroma server URL
    #[serde(default = "default_chroma_url")]
    pub url: String,

    /// Collection holding article embeddings
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_chroma_url(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
        }
    }
}

/// Credentials read from the environment (and `.env`, loaded in `main`).
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub news_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            news_api_key: non_empty_var("NEWS_API_KEY"),
        }
    }

    pub fn require_openai(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY environment variable is not set")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_assistant_name() -> String {
    "Prefect Assistant".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_instructions() -> String {
    "You are an assistant specialized in Prefect. Only answer questions after verifying \
     the code works: use the `run_code` tool to execute Prefect code in a Docker container \
     until it runs without error. Always respond with the code example and the version of \
     prefect that was used to run it. Use the `query_news` tool when the user asks about \
     recent technology news. If you cannot run the code, apologize and say that the answer \
     could not be verified."
        .to_string()
}

fn default_max_tool_rounds() -> u32 {
    8
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_base_image() -> String {
    "python:3.9-slim".to_string()
}

fn default_dependency() -> String {
    "prefect".to_string()
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_script_name() -> String {
    "example.py".to_string()
}

fn default_workdir() -> String {
    "/usr/src/app".to_string()
}

fn default_sandbox_timeout() -> u64 {
    120
}

fn default_memory() -> String {
    "2g".to_string()
}

fn default_cpus() -> String {
    "2".to_string()
}

fn default_max_attempts() -> u32 {
    crate::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_news_base_url() -> String {
    "https://newsapi.org".to_string()
}

fn default_news_query() -> String {
    "technology".to_string()
}

fn default_page_size() -> u32 {
    60
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_collection() -> String {
    "news_articles".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_batch_size() -> usize {
    32
}

impl Config {
    /// Load configuration from file, using defaults if not found.
    ///
    /// `OPENAI_BASE_URL` overrides `[openai].base_url` when set.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str::<Self>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };

        if let Some(base_url) = non_empty_var("OPENAI_BASE_URL") {
            config.openai.base_url = base_url;
        }

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;
        Ok(config)
    }

    /// Reject values that would make every request or run fail at once.
    fn validate(&self) -> Result<()> {
        if self.openai.timeout_secs == 0 {
            bail!("[openai] timeout_secs must be at least 1");
        }
        if self.sandbox.timeout_secs == 0 {
            bail!("[sandbox] timeout_secs must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.sandbox.base_image, "python:3.9-slim");
        assert_eq!(config.sandbox.dependency, "prefect");
        assert_eq!(config.sandbox.network, NetworkPolicy::AllowAll);
        assert!(config.sandbox.probe_version);
        assert_eq!(config.vector_store.collection, "news_articles");
        assert_eq!(config.embeddings.model, "text-embedding-ada-002");
        assert_eq!(config.news.cache_ttl_hours, 24);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[assistant]
id = "asst_123"
model = "gpt-4o-mini"

[sandbox]
base_image = "python:3.12-slim"
dependency = "requests"
timeout_secs = 30
network = "deny"

[sandbox.resources]
memory = "512m"

[retry]
max_attempts = 3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.assistant.id.as_deref(), Some("asst_123"));
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(config.sandbox.base_image, "python:3.12-slim");
        assert_eq!(config.sandbox.dependency, "requests");
        assert_eq!(config.sandbox.timeout_secs, 30);
        assert_eq!(config.sandbox.network, NetworkPolicy::Deny);
        assert_eq!(config.sandbox.resources.memory, "512m");
        assert_eq!(config.sandbox.resources.cpus, "2");
        assert_eq!(config.retry.max_attempts, 3);
        // Untouched sections keep their defaults
        assert_eq!(config.news.query, "technology");
    }

    #[test]
    fn test_network_policy_display() {
        assert_eq!(NetworkPolicy::AllowAll.to_string(), "allow-all");
        assert_eq!(NetworkPolicy::Deny.to_string(), "deny");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_load_invalid_file_reports_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[retry\nmax_attempts = ").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("proofrun.toml"));
    }

    #[test]
    fn test_load_rejects_zero_timeouts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[sandbox]\ntimeout_secs = 0\n").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("[sandbox] timeout_secs must be at least 1"));

        fs::write(dir.path().join(CONFIG_FILE), "[openai]\ntimeout_secs = 0\n").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("[openai] timeout_secs must be at least 1"));
    }

    #[test]
    fn test_embedded_template_parses() {
        let config: Config = toml::from_str(crate::templates::PROOFRUN_TOML).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.sandbox.script_name, "example.py");
    }

    #[test]
    fn test_resolved_cache_dir_prefers_config() {
        let news = NewsConfig {
            cache_dir: Some(PathBuf::from("/tmp/custom-cache")),
            ..NewsConfig::default()
        };
        assert_eq!(news.resolved_cache_dir(), PathBuf::from("/tmp/custom-cache"));

        let fallback = NewsConfig::default().resolved_cache_dir();
        assert!(fallback.ends_with("proofrun"));
    }
}
