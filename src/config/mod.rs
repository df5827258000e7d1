//! Environment-backed configuration (§6 configuration table), following the
//! source repo's two-phase pattern: [`Config::from_env`] parses, [`Config::validate`]
//! checks cross-field and filesystem invariants.

pub mod error;

pub use error::ConfigError;

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::types::StrategyTag;

const ENV_MODE_DEFAULT: &str = "LEXVI_MODE_DEFAULT";
const ENV_CONCURRENCY_LIMIT: &str = "LEXVI_CONCURRENCY_LIMIT";
const ENV_ADMISSION_DEADLINE_MS: &str = "LEXVI_ADMISSION_DEADLINE_MS";
const ENV_DEADLINE_MS_ENHANCE: &str = "LEXVI_DEADLINE_MS_ENHANCE";
const ENV_CACHE_L1_CAPACITY: &str = "LEXVI_CACHE_L1_CAPACITY";
const ENV_FILTER_DEFAULT_STATUS: &str = "LEXVI_FILTER_DEFAULT_STATUS";
const ENV_RERANKER_MODEL_PATH: &str = "LEXVI_RERANKER_MODEL_PATH";
const ENV_RERANKER_BATCH_SIZE: &str = "LEXVI_RERANKER_BATCH_SIZE";
const ENV_RERANKER_THRESHOLD: &str = "LEXVI_RERANKER_THRESHOLD";
const ENV_EMBED_MODEL_ID: &str = "LEXVI_EMBED_MODEL_ID";
const ENV_EMBED_DIM: &str = "LEXVI_EMBED_DIM";
const ENV_EMBED_API_BASE_URL: &str = "LEXVI_EMBED_API_BASE_URL";
const ENV_EMBED_API_TIMEOUT_MS: &str = "LEXVI_EMBED_API_TIMEOUT_MS";
const ENV_CHAT_API_TIMEOUT_MS: &str = "LEXVI_CHAT_API_TIMEOUT_MS";
const ENV_ENHANCEMENT_FANOUT_LIMIT: &str = "LEXVI_ENHANCEMENT_FANOUT_LIMIT";
const ENV_REGISTRY_BACKOFF_MS: &str = "LEXVI_REGISTRY_BACKOFF_MS";
const ENV_BREAKER_WINDOW: &str = "LEXVI_BREAKER_WINDOW";
const ENV_BREAKER_THRESHOLD: &str = "LEXVI_BREAKER_THRESHOLD";
const ENV_BREAKER_COOLOFF_MS: &str = "LEXVI_BREAKER_COOLOFF_MS";
const ENV_QDRANT_URL: &str = "LEXVI_QDRANT_URL";
const ENV_COLLECTION_NAME: &str = "LEXVI_COLLECTION_NAME";
const ENV_LOG_LEVEL: &str = "LEXVI_LOG_LEVEL";

const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
const DEFAULT_COLLECTION_NAME: &str = "lexvi_passages";

/// Retrieval/generation mode, selected per-request (default from [`Config::mode_default`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Fast,
    Balanced,
    Quality,
    Adaptive,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(ConfigError::InvalidMode {
                value: other.to_string(),
            }),
        }
    }
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Quality => "quality",
            Self::Adaptive => "adaptive",
        }
    }
}

/// Per-mode parameter bundle (§3 ModeProfile, §4.9 defaults table).
#[derive(Debug, Clone)]
pub struct ModeProfile {
    pub mode: Mode,
    pub enhance_strategies: Vec<StrategyTag>,
    pub fusion: bool,
    pub rerank: bool,
    pub retrieve_k: usize,
    pub top_n: usize,
    pub total_deadline_ms: u64,
    pub cache_ttl_ms: u64,
}

impl ModeProfile {
    pub fn enhance_enabled(&self) -> bool {
        !self.enhance_strategies.is_empty()
    }
}

fn default_mode_profile(mode: Mode, cache_ttl_ms: u64) -> ModeProfile {
    use StrategyTag::*;
    match mode {
        Mode::Fast => ModeProfile {
            mode,
            enhance_strategies: vec![],
            fusion: false,
            rerank: false,
            retrieve_k: 5,
            top_n: 5,
            total_deadline_ms: 1_000,
            cache_ttl_ms,
        },
        Mode::Balanced => ModeProfile {
            mode,
            enhance_strategies: vec![MultiQuery, StepBack],
            fusion: false,
            rerank: true,
            retrieve_k: 10,
            top_n: 5,
            total_deadline_ms: 3_000,
            cache_ttl_ms,
        },
        Mode::Quality => ModeProfile {
            mode,
            enhance_strategies: vec![MultiQuery, Hyde, StepBack, Decomposition],
            fusion: true,
            rerank: true,
            retrieve_k: 20,
            top_n: 5,
            total_deadline_ms: 5_000,
            cache_ttl_ms,
        },
        Mode::Adaptive => ModeProfile {
            mode,
            // Resolved dynamically from query complexity (see retriever::adaptive);
            // this is the ramp's upper bound used before complexity is known.
            enhance_strategies: vec![],
            fusion: false,
            rerank: true,
            retrieve_k: 10,
            top_n: 5,
            total_deadline_ms: 3_000,
            cache_ttl_ms,
        },
    }
}

/// Process-wide configuration, covering every entry in the external-interfaces
/// configuration table (§6) plus the ambient additions this expansion specifies.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode_default: Mode,
    pub concurrency_limit: usize,
    pub admission_deadline_ms: u64,
    pub deadline_ms_enhance: u64,
    pub cache_l1_capacity: u64,
    pub cache_ttl_ms: u64,
    pub filter_default_status: bool,
    pub reranker_model_path: Option<String>,
    pub reranker_batch_size: usize,
    pub reranker_threshold: f32,
    pub embed_model_id: String,
    pub embed_dim: usize,
    pub embed_api_base_url: String,
    pub embed_api_timeout_ms: u64,
    pub chat_api_timeout_ms: u64,
    pub enhancement_fanout_limit: usize,
    pub registry_backoff_ms: u64,
    pub breaker_window: usize,
    pub breaker_threshold: f64,
    pub breaker_cooloff_ms: u64,
    pub qdrant_url: String,
    pub collection_name: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode_default: Mode::Balanced,
            concurrency_limit: 16,
            admission_deadline_ms: 200,
            deadline_ms_enhance: 1_500,
            cache_l1_capacity: 1_000,
            cache_ttl_ms: 300_000,
            filter_default_status: true,
            reranker_model_path: None,
            reranker_batch_size: 16,
            reranker_threshold: crate::constants::DEFAULT_RERANK_THRESHOLD,
            embed_model_id: "text-embedding".to_string(),
            embed_dim: crate::constants::DEFAULT_EMBEDDING_DIM,
            embed_api_base_url: "http://localhost:8081".to_string(),
            embed_api_timeout_ms: 5_000,
            chat_api_timeout_ms: 15_000,
            enhancement_fanout_limit: 4,
            registry_backoff_ms: 30_000,
            breaker_window: 20,
            breaker_threshold: 0.5,
            breaker_cooloff_ms: 10_000,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Builds configuration from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse_env::<Mode>(ENV_MODE_DEFAULT)? {
            config.mode_default = v;
        }
        if let Some(v) = parse_env_usize(ENV_CONCURRENCY_LIMIT)? {
            config.concurrency_limit = v;
        }
        if let Some(v) = parse_env_u64(ENV_ADMISSION_DEADLINE_MS)? {
            config.admission_deadline_ms = v;
        }
        if let Some(v) = parse_env_u64(ENV_DEADLINE_MS_ENHANCE)? {
            config.deadline_ms_enhance = v;
        }
        if let Some(v) = parse_env_u64(ENV_CACHE_L1_CAPACITY)? {
            config.cache_l1_capacity = v;
        }
        if let Some(v) = env::var_os(ENV_FILTER_DEFAULT_STATUS) {
            config.filter_default_status = v != "none";
        }
        if let Some(v) = env::var_os(ENV_RERANKER_MODEL_PATH) {
            config.reranker_model_path = Some(v.to_string_lossy().into_owned());
        }
        if let Some(v) = parse_env_usize(ENV_RERANKER_BATCH_SIZE)? {
            config.reranker_batch_size = v;
        }
        if let Some(v) = parse_env_f32(ENV_RERANKER_THRESHOLD)? {
            config.reranker_threshold = v;
        }
        if let Some(v) = env::var_os(ENV_EMBED_MODEL_ID) {
            config.embed_model_id = v.to_string_lossy().into_owned();
        }
        if let Some(v) = parse_env_usize(ENV_EMBED_DIM)? {
            config.embed_dim = v;
        }
        if let Some(v) = env::var_os(ENV_EMBED_API_BASE_URL) {
            config.embed_api_base_url = v.to_string_lossy().into_owned();
        }
        if let Some(v) = parse_env_u64(ENV_EMBED_API_TIMEOUT_MS)? {
            config.embed_api_timeout_ms = v;
        }
        if let Some(v) = parse_env_u64(ENV_CHAT_API_TIMEOUT_MS)? {
            config.chat_api_timeout_ms = v;
        }
        if let Some(v) = parse_env_usize(ENV_ENHANCEMENT_FANOUT_LIMIT)? {
            config.enhancement_fanout_limit = v;
        }
        if let Some(v) = parse_env_u64(ENV_REGISTRY_BACKOFF_MS)? {
            config.registry_backoff_ms = v;
        }
        if let Some(v) = parse_env_usize(ENV_BREAKER_WINDOW)? {
            config.breaker_window = v;
        }
        if let Some(v) = parse_env_f64(ENV_BREAKER_THRESHOLD)? {
            config.breaker_threshold = v;
        }
        if let Some(v) = parse_env_u64(ENV_BREAKER_COOLOFF_MS)? {
            config.breaker_cooloff_ms = v;
        }
        if let Some(v) = env::var_os(ENV_QDRANT_URL) {
            config.qdrant_url = v.to_string_lossy().into_owned();
        }
        if let Some(v) = env::var_os(ENV_COLLECTION_NAME) {
            config.collection_name = v.to_string_lossy().into_owned();
        }
        if let Some(v) = env::var_os(ENV_LOG_LEVEL) {
            config.log_level = v.to_string_lossy().into_owned();
        }

        Ok(config)
    }

    /// Cross-field and range checks that `from_env` itself does not enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::OutOfRange {
                field: "concurrency_limit",
                reason: "must be > 0".to_string(),
            });
        }
        if self.embed_dim == 0 {
            return Err(ConfigError::OutOfRange {
                field: "embed_dim",
                reason: "must be > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.reranker_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "reranker_threshold",
                reason: "must be within [0.0, 1.0]".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.breaker_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "breaker_threshold",
                reason: "must be within [0.0, 1.0]".to_string(),
            });
        }
        if self.breaker_window == 0 {
            return Err(ConfigError::OutOfRange {
                field: "breaker_window",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the mode profile for a given mode, applying this config's cache TTL.
    pub fn mode_profile(&self, mode: Mode) -> ModeProfile {
        default_mode_profile(mode, self.cache_ttl_ms)
    }

    /// All four mode profiles, keyed by mode — useful for health/introspection.
    pub fn all_mode_profiles(&self) -> HashMap<Mode, ModeProfile> {
        [Mode::Fast, Mode::Balanced, Mode::Quality, Mode::Adaptive]
            .into_iter()
            .map(|m| (m, self.mode_profile(m)))
            .collect()
    }
}

fn parse_env<T: FromStr<Err = ConfigError>>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var_os(key) {
        None => Ok(None),
        Some(v) => {
            let s = v.to_string_lossy().into_owned();
            T::from_str(&s).map(Some)
        }
    }
}

fn parse_env_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    parse_env_numeric(key, |s| s.parse::<usize>())
}

fn parse_env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    parse_env_numeric(key, |s| s.parse::<u64>())
}

fn parse_env_f32(key: &str) -> Result<Option<f32>, ConfigError> {
    parse_env_numeric(key, |s| s.parse::<f32>())
}

fn parse_env_f64(key: &str) -> Result<Option<f64>, ConfigError> {
    parse_env_numeric(key, |s| s.parse::<f64>())
}

fn parse_env_numeric<T, E: std::fmt::Display>(
    key: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<Option<T>, ConfigError> {
    match env::var_os(key) {
        None => Ok(None),
        Some(v) => {
            let s = v.to_string_lossy().into_owned();
            parse(&s).map(Some).map_err(|e| ConfigError::ParseFailed {
                field: key,
                value: s,
                reason: e.to_string(),
            })
        }
    }
}
