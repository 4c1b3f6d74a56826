//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `PAPERCLIP_` using `__` between the
//! section and the key.
//!
//! ```toml
//! [providers]
//! arxiv_url = "http://export.arxiv.org"
//! openalex_url = "https://api.openalex.org"
//! osf_url = "https://api.osf.io"
//! osf_trove_url = "https://share.osf.io"
//! openalex_mailto = "you@example.org"
//!
//! [http]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [search]
//! request_timeout_secs = 45
//! default_limit = 10
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//!
//! [content]
//! max_pdf_mb = 50
//! allow_private_hosts = false
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! The same keys can be set from the environment, e.g.
//! `PAPERCLIP_PROVIDERS__ARXIV_URL` or `PAPERCLIP_SERVER__PORT`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PAPERCLIP";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Provider base URLs
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Outbound HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Query router settings
    #[serde(default)]
    pub search: SearchConfig,

    /// MCP transport listen address
    #[serde(default)]
    pub server: ServerConfig,

    /// PDF content retrieval settings
    #[serde(default)]
    pub content: ContentConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            http: HttpConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
            content: ContentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Base URLs for each provider API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_arxiv_url")]
    pub arxiv_url: String,

    #[serde(default = "default_openalex_url")]
    pub openalex_url: String,

    #[serde(default = "default_osf_url")]
    pub osf_url: String,

    /// SHARE host used for OSF keyword searches
    #[serde(default = "default_osf_trove_url")]
    pub osf_trove_url: String,

    /// Contact address for the OpenAlex polite pool
    #[serde(default)]
    pub openalex_mailto: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            arxiv_url: default_arxiv_url(),
            openalex_url: default_openalex_url(),
            osf_url: default_osf_url(),
            osf_trove_url: default_osf_trove_url(),
            openalex_mailto: None,
        }
    }
}

fn default_arxiv_url() -> String {
    "http://export.arxiv.org".to_string()
}

fn default_openalex_url() -> String {
    "https://api.openalex.org".to_string()
}

fn default_osf_url() -> String {
    "https://api.osf.io".to_string()
}

fn default_osf_trove_url() -> String {
    crate::sources::DEFAULT_TROVE_URL.to_string()
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Overrides the default `paperclip/<version>` user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Query router configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Deadline for one multi-provider request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Page size used when a caller does not specify one
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            default_limit: default_limit(),
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_limit() -> usize {
    crate::models::DEFAULT_LIMIT
}

/// Listen address for the HTTP transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// PDF content retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Maximum PDF size to download (in MB)
    #[serde(default = "default_max_pdf_mb")]
    pub max_pdf_mb: usize,

    /// Permit downloads from loopback and private-network hosts
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_pdf_mb: default_max_pdf_mb(),
            allow_private_hosts: false,
        }
    }
}

impl ContentConfig {
    pub fn max_pdf_bytes(&self) -> usize {
        self.max_pdf_mb * 1024 * 1024
    }
}

fn default_max_pdf_mb() -> usize {
    50
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from an optional file plus `PAPERCLIP_*` environment variables
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// Parse configuration from TOML text, without environment overrides
pub fn from_toml_str(content: &str) -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Toml))
        .build()?
        .try_deserialize()
}

/// Look for a config file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("paperclip.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paperclip").join("config.toml"))
        .filter(|path| path.is_file())
}
