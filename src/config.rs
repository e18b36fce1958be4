use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Number of songs in a blended playlist (also the per-theme request size).
    #[serde(default = "default_playlist_length")]
    pub playlist_length: usize,

    // Concurrency
    #[serde(default = "default_generation_concurrency")]
    pub generation_concurrency: usize,
    #[serde(default = "default_search_concurrency")]
    pub search_concurrency: usize,
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,

    // Retry behavior for catalog calls
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_after")]
    pub default_retry_after_secs: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_tracks_per_replace")]
    pub max_tracks_per_replace: usize,

    /// Fixed seed for the merge shuffle. Unset means a fresh seed per blend.
    #[serde(default)]
    pub merge_seed: Option<u64>,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_catalog_api_base")]
    pub catalog_api_base: String,
    #[serde(default = "default_generator_api_base")]
    pub generator_api_base: String,
    #[serde(default = "default_generator_model")]
    pub generator_model: String,
    #[serde(default = "default_generator_temperature")]
    pub generator_temperature: f32,
}

fn default_playlist_length() -> usize { 10 }
fn default_generation_concurrency() -> usize { 5 }
fn default_search_concurrency() -> usize { 10 }
fn default_batch_timeout() -> u64 { 30 }
fn default_max_attempts() -> u32 { 5 }
fn default_retry_after() -> u64 { 5 }
fn default_backoff_base() -> u64 { 1000 }
fn default_request_timeout() -> u64 { 10 }
fn default_max_tracks_per_replace() -> usize { 100 }
fn default_db_path() -> PathBuf { "/var/lib/playlist-blender/blender.db".into() }
fn default_log_dir() -> PathBuf { "/var/log/playlist-blender".into() }
fn default_catalog_api_base() -> String { "https://api.spotify.com/v1".into() }
fn default_generator_api_base() -> String { "https://api.openai.com/v1".into() }
fn default_generator_model() -> String { "gpt-4o-mini".into() }
fn default_generator_temperature() -> f32 { 0.7 }

impl Default for Config {
    fn default() -> Self {
        Self {
            playlist_length: default_playlist_length(),
            generation_concurrency: default_generation_concurrency(),
            search_concurrency: default_search_concurrency(),
            batch_timeout_secs: default_batch_timeout(),
            max_attempts: default_max_attempts(),
            default_retry_after_secs: default_retry_after(),
            backoff_base_ms: default_backoff_base(),
            request_timeout_secs: default_request_timeout(),
            max_tracks_per_replace: default_max_tracks_per_replace(),
            merge_seed: None,
            db_path: default_db_path(),
            log_dir: default_log_dir(),
            catalog_api_base: default_catalog_api_base(),
            generator_api_base: default_generator_api_base(),
            generator_model: default_generator_model(),
            generator_temperature: default_generator_temperature(),
        }
    }
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make a blend impossible.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.playlist_length > 0, "playlist_length must be at least 1");
        anyhow::ensure!(self.generation_concurrency > 0, "generation_concurrency must be at least 1");
        anyhow::ensure!(self.search_concurrency > 0, "search_concurrency must be at least 1");
        anyhow::ensure!(self.max_attempts > 0, "max_attempts must be at least 1");
        anyhow::ensure!(
            (1..=100).contains(&self.max_tracks_per_replace),
            "max_tracks_per_replace must be between 1 and 100"
        );
        Ok(())
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
