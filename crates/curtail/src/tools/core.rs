//! Tool abstraction for the gateway.
//!
//! The [`Tool`] trait defines the interface every tool implements: a static
//! API definition (name, description, JSON schema) and an async `execute`
//! method. Tools are collected into a [`ToolSet`], which handles dispatch,
//! argument validation, timeouts and the response cache.

use crate::ToolDef;
use crate::error::{ErrorCause, ToolError, redact};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::cache::{ResponseCache, fingerprint};
use super::context::ToolContext;

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>>;

/// Default timeout for tool execution (60 seconds).
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

// ── ToolOutput ─────────────────────────────────────────────────────

/// What a tool hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Small and unaltered: the projected value itself.
    Structured(Value),
    /// A context header, the serialized payload and any warning lines.
    Text { text: String, warnings: Vec<String> },
}

impl ToolOutput {
    /// Flatten to the string sent over the wire.
    pub fn into_text(self) -> String {
        match self {
            Self::Structured(value) => value.to_string(),
            Self::Text { text, .. } => text,
        }
    }

    /// Everything that was altered on the way out. Empty for structured output.
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Structured(_) => &[],
            Self::Text { warnings, .. } => warnings,
        }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// How long a read-only tool's output stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    /// Rarely changes, e.g. the extension list.
    Stable,
    /// Changes with ordinary use, e.g. tables and migrations.
    Volatile,
}

/// A tool an agent can invoke by name.
///
/// Implementors provide a static definition ([`Tool::definition`]) and an
/// async [`Tool::execute`] that receives the already-parsed JSON arguments.
/// Read-only tools opt into caching through [`Tool::cache_class`]; tools
/// that change the project list the cache keys they make stale through
/// [`Tool::invalidation_patterns`].
pub trait Tool: Send + Sync {
    /// The tool definition advertised to callers.
    fn definition(&self) -> ToolDef;

    /// Execute the tool. Uses a boxed future so the trait is dyn-compatible.
    fn execute(&self, args: Value) -> ToolFuture<'_>;

    /// The tool's name (convenience, delegates to definition).
    fn name(&self) -> String {
        self.definition().function.name
    }

    /// `Some` for read-only tools whose output may be cached.
    fn cache_class(&self) -> Option<CacheClass> {
        None
    }

    /// Cache-key globs made stale by running this tool with `args`.
    fn invalidation_patterns(&self, _args: &Value) -> Vec<String> {
        Vec::new()
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// TTL per [`CacheClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub stable: Duration,
    pub volatile: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            stable: Duration::from_secs(300),
            volatile: Duration::from_secs(30),
        }
    }
}

impl CacheTtls {
    pub fn ttl_for(&self, class: CacheClass) -> Duration {
        match class {
            CacheClass::Stable => self.stable,
            CacheClass::Volatile => self.volatile,
        }
    }
}

/// A collection of tools that can be dispatched by name.
///
/// ```ignore
/// let cache = Arc::new(ResponseCache::new(256));
/// let tools = ToolSet::new()
///     .with_arg_validation(true)
///     .with_default_timeout(Some(Duration::from_secs(30)))
///     .with_cache(cache, CacheTtls::default())
///     .with_gateway_tools(context);
///
/// let out = tools.execute("list_tables", json!({"project_id": "abc"})).await?;
/// ```
pub struct ToolSet {
    tools: HashMap<String, Box<dyn Tool>>,
    /// Whether to validate tool arguments against JSON Schema before execution.
    validate_args: bool,
    /// Default timeout for tool execution. `None` disables timeouts.
    default_timeout: Option<Duration>,
    cache: Option<Arc<ResponseCache>>,
    ttls: CacheTtls,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolSet")
            .field("tools", &names)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl ToolSet {
    /// Create an empty tool set.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            validate_args: false,
            default_timeout: None,
            cache: None,
            ttls: CacheTtls::default(),
        }
    }

    /// Enable JSON Schema argument validation before tool execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Set a default timeout for tool execution. Pass `None` to disable.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Share a response cache across calls.
    pub fn with_cache(mut self, cache: Arc<ResponseCache>, ttls: CacheTtls) -> Self {
        self.cache = Some(cache);
        self.ttls = ttls;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Conditionally register a tool (builder pattern).
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Register every gateway tool, all sharing `context`.
    pub fn with_gateway_tools(self, context: Arc<ToolContext>) -> Self {
        use super::database::{ApplyMigration, ExecuteSql, ListExtensions, ListMigrations, ListTables};
        use super::debugging::{GetAdvisors, GetLogs};
        use super::development::GenerateTypescriptTypes;
        self.with(ListTables::new(context.clone()))
            .with(ListExtensions::new(context.clone()))
            .with(ListMigrations::new(context.clone()))
            .with(ApplyMigration::new(context.clone()))
            .with(ExecuteSql::new(context.clone()))
            .with(GetLogs::new(context.clone()))
            .with(GetAdvisors::new(context.clone()))
            .with(GenerateTypescriptTypes::new(context))
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The shared response cache, if any.
    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Execute a tool call by name, with validation, caching and timeout.
    ///
    /// Cacheable tools are served from the cache while their entry is fresh.
    /// After a non-cacheable tool runs, every cache key it declares stale is
    /// removed, whether or not the call succeeded.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let Some(tool) = self.tools.get(name) else {
            return Err(ToolError::new(name, &args, ErrorCause::UnknownTool));
        };

        if self.validate_args
            && let Err(msg) = validate_tool_arguments(tool.as_ref(), &args)
        {
            return Err(ToolError::new(name, &args, ErrorCause::InvalidArguments(msg)));
        }

        log_tool_call(name, &args);

        let cache_slot = match (&self.cache, tool.cache_class()) {
            (Some(cache), Some(class)) => Some((cache, fingerprint(name, &args), class)),
            _ => None,
        };
        if let Some((cache, key, _)) = &cache_slot
            && let Some(hit) = cache.get(key)
        {
            return Ok(hit);
        }

        let start = Instant::now();
        let invalidates = tool.invalidation_patterns(&args);
        let result = match self.default_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(args.clone())).await {
                Ok(r) => r,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    Err(ToolError::new(name, &args, ErrorCause::Timeout(limit)))
                }
            },
            None => tool.execute(args.clone()).await,
        };

        if let Some(cache) = &self.cache {
            for pattern in &invalidates {
                if let Err(e) = cache.invalidate(pattern) {
                    warn!("Tool {name} declared an invalid cache pattern {pattern}: {e}");
                }
            }
        }

        match &result {
            Ok(output) => {
                let text_len = match output {
                    ToolOutput::Structured(v) => v.to_string().len(),
                    ToolOutput::Text { text, .. } => text.len(),
                };
                debug!(
                    "Tool {name} completed in {:.0}ms ({text_len} bytes, {} warnings)",
                    start.elapsed().as_secs_f64() * 1000.0,
                    output.warnings().len()
                );
                if let Some((cache, key, class)) = cache_slot {
                    cache.set(key, output.clone(), self.ttls.ttl_for(class));
                }
            }
            Err(e) => warn!("Tool {name} failed: {e}"),
        }
        result
    }

    /// Like [`execute`](Self::execute) but over raw JSON text, rendering
    /// failures as `"Error: ..."` strings for text-only transports.
    pub async fn execute_text(&self, name: &str, arguments: &str) -> String {
        let args: Value = match serde_json::from_str(arguments) {
            Ok(v) => v,
            Err(e) => {
                return format!(
                    "Error: invalid JSON arguments for tool '{name}': {e}. \
                     Please provide valid JSON matching the tool's parameter schema."
                );
            }
        };
        match self.execute(name, args).await {
            Ok(output) => {
                let text = output.into_text();
                trace!(
                    "Tool {name} result preview: {}",
                    text.chars().take(300).collect::<String>()
                );
                text
            }
            Err(e) => format!("Error: {e}"),
        }
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// The error lists every violation so the caller can fix them in one go.
pub fn validate_tool_arguments(tool: &dyn Tool, args: &Value) -> Result<(), String> {
    let schema = tool.definition().function.parameters;

    // If the schema itself is invalid, skip validation.
    let Ok(validator) = jsonschema::validator_for(&schema) else {
        return Ok(());
    };

    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Log a tool call at INFO level with a truncated, redacted argument preview.
pub fn log_tool_call(name: &str, args: &Value) {
    let arguments = redact(args).to_string();
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.len() > 120 { "..." } else { "" }
    );
    debug!("[tool] {name} full args ({} bytes)", arguments.len());
    trace!("[tool] {name} arguments: {arguments}");
}

/// Parse JSON arguments into a typed struct, wrapping failures in the
/// tool's error envelope.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone())
        .map_err(|e| ToolError::new(tool, args, ErrorCause::InvalidArguments(e.to_string())))
}

// ── Tests ──────────────────────────────────────────────────────────
