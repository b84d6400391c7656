//! Command-line front end for the curtail pipeline and gateway tools.
//!
//! # Examples
//!
//! ```sh
//! # See what the governor does to a query
//! curtail govern "SELECT * FROM users ORDER BY created_at DESC"
//!
//! # Estimate the token cost of a document
//! curtail estimate response.json
//!
//! # Run the render pipeline offline over a saved upstream response
//! curtail project tables.json --kind table --format names_only --pattern 'user*'
//!
//! # Print tool definitions
//! curtail tools
//!
//! # Call a gateway tool against the management API
//! CURTAIL_ACCESS_TOKEN=... curtail call list_tables '{"project_id": "abc"}'
//! ```

use clap::{Parser, Subcommand};
use curtail::api::HttpUpstream;
use curtail::budget::{Budget, FormatTier, estimate_text, estimate_value};
use curtail::config::GatewayConfig;
use curtail::projection::{EntityKind, FilterSpec, RenderRequest, render};
use curtail::sql::govern;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the management API access token.
const TOKEN_ENV: &str = "CURTAIL_ACCESS_TOKEN";

/// Bounded response projection and query governing for LLM tool gateways.
#[derive(Parser)]
#[command(name = "curtail", version)]
struct Cli {
    /// JSON config file. Missing keys take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the management API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep warnings out of the returned text
    #[arg(long, global = true)]
    no_inline_warnings: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the query governor to a SQL statement and print the result
    Govern {
        /// SQL to govern. Read from stdin when omitted.
        sql: Option<String>,
        /// Row cap to inject (default from config)
        #[arg(long)]
        auto_limit: Option<usize>,
        /// Pass the statement through unchanged
        #[arg(long)]
        disable_auto_limit: bool,
    },
    /// Print the token estimate of a JSON or text document
    Estimate {
        /// Input file, or `-` / omitted for stdin
        input: Option<PathBuf>,
    },
    /// Run the render pipeline over a JSON document
    Project {
        /// Input file, or `-` / omitted for stdin
        input: Option<PathBuf>,
        /// Entity kind of the document or of each element
        #[arg(long, value_parser = parse_enum::<EntityKind>)]
        kind: Option<EntityKind>,
        /// names_only, summary or detailed
        #[arg(long, default_value = "summary", value_parser = parse_enum::<FormatTier>)]
        format: FormatTier,
        /// Glob over the name field
        #[arg(long)]
        pattern: Option<String>,
        /// Field the pattern is matched against
        #[arg(long, default_value = "name")]
        name_field: String,
        /// Keep at most this many elements
        #[arg(long)]
        max_items: Option<usize>,
        /// Context header written above the payload
        #[arg(long, default_value = "")]
        label: String,
    },
    /// Print the gateway tool definitions as JSON
    Tools,
    /// Invoke a gateway tool against the management API
    Call {
        /// Tool name, e.g. list_tables
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },
}

// ── Helpers ────────────────────────────────────────────────────────

/// Parse a snake_case enum the same way tool arguments are parsed.
fn parse_enum<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(Value::String(s.to_string())).map_err(|e| e.to_string())
}

fn read_input(path: Option<&Path>) -> Result<String, String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .map_err(|e| format!("failed to read '{}': {e}", p.display())),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

fn load_config(cli: &Cli) -> Result<GatewayConfig, String> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => GatewayConfig::default(),
    };
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url);
    }
    if cli.no_inline_warnings {
        config = config.with_include_warning(false);
    }
    Ok(config)
}

fn upstream(config: &GatewayConfig, token: &str) -> Result<Arc<HttpUpstream>, String> {
    HttpUpstream::new(&config.api_url, token)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

// ── Commands ───────────────────────────────────────────────────────

async fn run(cli: Cli) -> Result<String, String> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Govern {
            sql,
            auto_limit,
            disable_auto_limit,
        } => {
            let sql = match sql {
                Some(sql) => sql,
                None => read_input(None)?,
            };
            let governed = govern(
                &sql,
                auto_limit.unwrap_or(config.auto_limit),
                disable_auto_limit,
            );
            for warning in &governed.warnings {
                eprintln!("warning: {warning}");
            }
            Ok(format!("{}\n", governed.sql))
        }

        Command::Estimate { input } => {
            let text = read_input(input.as_deref())?;
            let tokens = match serde_json::from_str::<Value>(&text) {
                Ok(value) => estimate_value(&value),
                Err(_) => estimate_text(&text),
            };
            Ok(format!("{tokens}\n"))
        }

        Command::Project {
            input,
            kind,
            format,
            pattern,
            name_field,
            max_items,
            label,
        } => {
            let text = read_input(input.as_deref())?;
            let value: Value =
                serde_json::from_str(&text).map_err(|e| format!("input is not JSON: {e}"))?;
            let budget = Budget::new(config.tiers.max_tokens(format))
                .with_max_array_items(config.max_array_items)
                .with_include_warning(config.include_warning);
            let mut request = RenderRequest::new(label, format, budget).with_filter(
                FilterSpec::new(name_field)
                    .with_pattern(pattern)
                    .with_max_items(max_items),
            );
            if let Some(kind) = kind {
                request = request.with_kind(kind);
            }
            let out = render(value, request).map_err(|e| format!("invalid pattern: {e}"))?;
            if !config.include_warning {
                for warning in out.warnings() {
                    eprintln!("warning: {warning}");
                }
            }
            Ok(format!("{}\n", out.into_text()))
        }

        Command::Tools => {
            // Definitions never touch the network, so no token is needed.
            let tools = config.build_toolset(upstream(&config, "")?);
            serde_json::to_string_pretty(&tools.definitions())
                .map(|json| format!("{json}\n"))
                .map_err(|e| format!("failed to serialize definitions: {e}"))
        }

        Command::Call { tool, args } => {
            let token = std::env::var(TOKEN_ENV)
                .map_err(|_| format!("{TOKEN_ENV} environment variable is not set"))?;
            let args: Value =
                serde_json::from_str(&args).map_err(|e| format!("arguments are not JSON: {e}"))?;
            let tools = config.build_toolset(upstream(&config, &token)?);
            let out = tools.execute(&tool, args).await.map_err(|e| e.to_string())?;
            if !config.include_warning {
                for warning in out.warnings() {
                    eprintln!("warning: {warning}");
                }
            }
            Ok(format!("{}\n", out.into_text()))
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("curtail=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
