//!
//! src/config.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Builds the service configuration from the environment (and .env),
//! command line flags override what the environment provides
//!

use std::{fmt, time};

use clap::ValueEnum;
use url::Url;

use crate::errors::StatsError;
use crate::history::DedupPolicy;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 4;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const SPOTIFY_MARKET: &str = "ES";
pub const SPOTIFY_SEARCH_LIMIT: u32 = 50;

pub const STATS_TOP_N: usize = 10;
pub const STATS_GENRE_LIMIT: usize = 5;

/// Environment lookup, std::env::var in production and a map in tests
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Returns a set value, blank counts as unset
fn env_value(env: EnvLookup, s: &str) -> Option<String> {
    env(s).filter(|v| !v.trim().is_empty())
}

fn env_or(env: EnvLookup, s: &str, default: &str) -> String {
    env_value(env, s).unwrap_or_else(|| default.to_string())
}

/// Unparseable values fall back to the default
fn env_parse<T: std::str::FromStr>(env: EnvLookup, s: &str, default: T) -> T {
    match env_value(env, s) {
        Some(v) => v.trim().parse::<T>().unwrap_or(default),
        None => default
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

///
/// Client credentials for the token endpoint. Debug output never
/// contains the secret.
///
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Configuration that Spotify expects when hitting endpoints
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub credentials: Option<Credentials>,
    pub token_url: Url,
    pub api_base: Url,
    pub market: String,
    pub search_limit: u32
}

fn build_spotify(env: EnvLookup) -> Result<SpotifyConfig, StatsError> {
    // missing credentials are reported to the user, not treated as an error
    let credentials = match (
        env_value(env, "SPOTIFY_CLIENT_ID"),
        env_value(env, "SPOTIFY_CLIENT_SECRET")
    ) {
        (Some(client_id), Some(client_secret)) => {
            Some(Credentials { client_id, client_secret })
        },
        _ => None
    };

    // form urls
    let token_url = env_or(
        env, "SPOTIFY_TOKEN_URL", "https://accounts.spotify.com/api/token"
    );
    let api_base = env_or(env, "SPOTIFY_API_BASE", "https://api.spotify.com/v1/");

    let token_url = Url::parse(&token_url)
        .map_err(|e| StatsError::Config(format!("SPOTIFY_TOKEN_URL invalid {e}")))?;
    let mut api_base = Url::parse(&api_base)
        .map_err(|e| StatsError::Config(format!("SPOTIFY_API_BASE invalid {e}")))?;

    // ensure valid https and hostname for both urls
    ensure_https(&token_url).map_err(StatsError::Config)?;
    ensure_https(&api_base).map_err(StatsError::Config)?;
    ensure_host(&token_url, "accounts.spotify.com").map_err(StatsError::Config)?;
    ensure_host(&api_base, "api.spotify.com").map_err(StatsError::Config)?;
    ensure_trailing_slash(&mut api_base);

    let market = env_or(env, "SPOTIFY_MARKET", SPOTIFY_MARKET);
    let search_limit = env_parse(env, "SPOTIFY_SEARCH_LIMIT", SPOTIFY_SEARCH_LIMIT);

    Ok( SpotifyConfig { credentials, token_url, api_base, market, search_limit } )
}

///
/// Configuration for Http timeouts
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS
        }
    }
}

///
/// Configuration for the statistics themselves
///
#[derive(Debug, Clone)]
pub struct StatsConfig {
    pub top_n: usize,        // entries per ranking
    pub genre_limit: usize,  // genres shown in the report
    pub dedup: DedupPolicy
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_n: STATS_TOP_N,
            genre_limit: STATS_GENRE_LIMIT,
            dedup: DedupPolicy::Scoped
        }
    }
}

fn build_stats(env: EnvLookup) -> Result<StatsConfig, StatsError> {
    let defaults = StatsConfig::default();
    let dedup = match env_value(env, "STATS_DEDUP") {
        Some(v) => DedupPolicy::from_str(v.trim(), false).map_err(|_|
            StatsError::Config(format!("STATS_DEDUP invalid: {v}"))
        )?,
        None => defaults.dedup
    };

    Ok( StatsConfig {
        top_n: env_parse(env, "STATS_TOP_N", defaults.top_n),
        genre_limit: env_parse(env, "STATS_GENRE_LIMIT", defaults.genre_limit),
        dedup
    })
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "warn,listen_stats=info,reqwest=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: true
        }
    }
}

fn build_logging(env: EnvLookup) -> LoggingConfig {
    let mut logging = LoggingConfig::default();
    if let Some(format) = env_value(env, "LOG_FORMAT") {
        if format.trim().eq_ignore_ascii_case("json") {
            logging.format = LogFormat::Json;
            logging.with_ansi = false;
            logging.include_file_line = true;
        }
    }
    logging
}

///
/// AppConfig which holds every section the service needs
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifyConfig,
    pub http: HttpConfig,
    pub stats: StatsConfig,
    pub logging: LoggingConfig
}

impl AppConfig {
    pub fn set_credentials(&mut self, client_id: Option<String>, client_secret: Option<String>) {
        let current = self.spotify.credentials.take();
        let client_id = client_id
            .filter(|v| !v.trim().is_empty())
            .or_else(|| current.as_ref().map(|c| c.client_id.clone()));
        let client_secret = client_secret
            .filter(|v| !v.trim().is_empty())
            .or_else(|| current.as_ref().map(|c| c.client_secret.clone()));

        self.spotify.credentials = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => {
                Some(Credentials { client_id, client_secret })
            },
            _ => None
        };
    }
}

pub fn build_config(env: EnvLookup) -> Result<AppConfig, StatsError> {
    let spotify = build_spotify(env)?;
    let http    = HttpConfig::default();
    let stats   = build_stats(env)?;
    let logging = build_logging(env);

    Ok( AppConfig { spotify, http, stats, logging } )
}

///
/// Return the configuration from environment variables at program start.
///
pub fn load_config() -> Result<AppConfig, StatsError> {
    dotenvy::dotenv().ok();
    build_config(&|key: &str| std::env::var(key).ok())
}
