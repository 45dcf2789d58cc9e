use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

/// Default backend base URL used when `API_BASE_URL` is not set.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Path prefix of every versioned backend endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Default number of upload rows requested per page.
pub const DEFAULT_UPLOADS_PAGE_SIZE: u32 = 50;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base URL of the video processing backend (scheme, host and port, no path).
    #[arg(long, env, default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Number of upload rows to request when listing upload history.
    #[arg(long, env, default_value_t = DEFAULT_UPLOADS_PAGE_SIZE)]
    pub uploads_page_size: u32,

    /// User agent sent with every backend request.
    #[arg(long, env)]
    user_agent: Option<String>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            uploads_page_size: DEFAULT_UPLOADS_PAGE_SIZE,
            user_agent: None,
            log_level_filter: LevelFilter::Info,
            runtime_env: RustEnv::Development,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::load_env_file();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Loads `.env` into the process environment so `env` fallbacks see it.
    /// Call before parsing any parser that flattens `Config`.
    pub fn load_env_file() {
        dotenv().ok();
    }

    /// Returns the backend base URL without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn set_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Returns the versioned API root, e.g. `http://localhost:8000/api/v1`.
    pub fn api_root(&self) -> String {
        format!("{}{}", self.api_base_url(), API_PREFIX)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("upload-console/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
