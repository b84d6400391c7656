//! Gateway configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config file.
//! Load one with [`GatewayConfig::from_json_file`], adjust it with the
//! `with_*` builders, then build a dispatcher:
//!
//! ```ignore
//! let config = GatewayConfig::from_json_file("curtail.json")?
//!     .with_auto_limit(50)
//!     .with_include_warning(false);
//! let upstream = Arc::new(HttpUpstream::new(&config.api_url, token)?);
//! let tools = config.build_toolset(upstream);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::{DEFAULT_API_URL, RetryPolicy, Upstream};
use crate::budget::TierBudgets;
use crate::error::ConfigError;
use crate::tools::{
    CacheTtls, DEFAULT_AUTO_LIMIT, DEFAULT_TOOL_TIMEOUT, ResponseCache, ToolContext, ToolSet,
};

// ── Sections ───────────────────────────────────────────────────────

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// TTL for data that changes rarely, e.g. the extension list.
    pub stable_ttl_secs: u64,
    /// TTL for data a migration can change, e.g. the table list.
    pub volatile_ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let ttls = CacheTtls::default();
        Self {
            enabled: true,
            stable_ttl_secs: ttls.stable.as_secs(),
            volatile_ttl_secs: ttls.volatile.as_secs(),
            max_entries: 256,
        }
    }
}

impl CacheSettings {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            stable: Duration::from_secs(self.stable_ttl_secs),
            volatile: Duration::from_secs(self.volatile_ttl_secs),
        }
    }
}

/// Retry settings for read-only upstream calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            delay_ms: policy.delay.as_millis() as u64,
            backoff: policy.backoff,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.delay_ms),
            backoff: self.backoff,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

// ── GatewayConfig ──────────────────────────────────────────────────

/// Everything needed to stand up the gateway's tool set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Token budget per format tier.
    pub tiers: TierBudgets,
    /// Item cap applied before byte-level truncation.
    pub max_array_items: Option<usize>,
    /// Write warnings into returned text. When false they travel only in
    /// [`ToolOutput::Text::warnings`](crate::tools::ToolOutput).
    pub include_warning: bool,
    /// Row cap the query governor injects.
    pub auto_limit: usize,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    /// Per-call timeout. `None` disables it.
    pub tool_timeout_secs: Option<u64>,
    /// Validate tool arguments against their JSON Schema before execution.
    pub validate_args: bool,
    /// Management API base URL.
    pub api_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tiers: TierBudgets::default(),
            max_array_items: None,
            include_warning: true,
            auto_limit: DEFAULT_AUTO_LIMIT,
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            tool_timeout_secs: Some(DEFAULT_TOOL_TIMEOUT.as_secs()),
            validate_args: true,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        config.validate()?;
        debug!(path = %shown, "loaded config");
        Ok(config)
    }

    /// Reject settings no gateway could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tiers.validate()?;
        if self.auto_limit == 0 {
            return Err(ConfigError::Invalid("auto_limit must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if !self.retry.backoff.is_finite() || self.retry.backoff < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff must be a finite number >= 1.0, got {}",
                self.retry.backoff
            )));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be at least 1 when the cache is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn with_tiers(mut self, tiers: TierBudgets) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_max_array_items(mut self, max: Option<usize>) -> Self {
        self.max_array_items = max;
        self
    }

    pub fn with_include_warning(mut self, include: bool) -> Self {
        self.include_warning = include;
        self
    }

    pub fn with_auto_limit(mut self, limit: usize) -> Self {
        self.auto_limit = limit;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    pub fn with_tool_timeout(mut self, secs: Option<u64>) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// The context every gateway tool shares.
    pub fn tool_context(&self, upstream: Arc<dyn Upstream>) -> ToolContext {
        ToolContext::new(upstream)
            .with_tiers(self.tiers)
            .with_max_array_items(self.max_array_items)
            .with_include_warning(self.include_warning)
            .with_auto_limit(self.auto_limit)
            .with_retry(self.retry.policy())
    }

    /// A [`ToolSet`] with every gateway tool registered against `upstream`.
    pub fn build_toolset(&self, upstream: Arc<dyn Upstream>) -> ToolSet {
        let context = Arc::new(self.tool_context(upstream));
        let mut tools = ToolSet::new()
            .with_arg_validation(self.validate_args)
            .with_default_timeout(self.tool_timeout_secs.map(Duration::from_secs));
        if self.cache.enabled {
            let cache = Arc::new(ResponseCache::new(self.cache.max_entries));
            tools = tools.with_cache(cache, self.cache.ttls());
        }
        tools.with_gateway_tools(context)
    }
}
