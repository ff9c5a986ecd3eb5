//! CLI Tooling
//!
//! Command-line interface for tooldeck. `serve` runs the stdio protocol
//! server; the other commands load the capability directory once and report.

use crate::adapter::ExecutionContext;
use crate::capability::{LoadOutcome, ModuleLoader};
use crate::config::{ConfigLoader, DeckConfig};
use crate::error::ApiError;
use crate::host::CapabilityHost;
use crate::logging::LoggingConfig;
use crate::server::StdioServer;
use crate::sink::MemorySink;
use crate::types::FileIdentity;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// tooldeck - hot-reloading capability host
#[derive(Parser, Debug)]
#[command(name = "tooldeck")]
#[command(about = "Serve a directory of capability files to protocol clients with hot reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stderr, file, file+stderr)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold logging flags over the configured logging section.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve capabilities over stdio until the client disconnects
    Serve {
        /// Load once and do not watch for changes
        #[arg(long)]
        no_watch: bool,

        /// Quiescence window before a batch of changes is reloaded
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
    /// List the capabilities the directory currently provides
    List {
        /// Output format: text or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Load capability files and report what each one provides
    Check {
        /// Single file to check (defaults to every file in the directory)
        file: Option<PathBuf>,

        /// Output format: text or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Invoke one capability and print its result
    Call {
        /// Capability name
        name: String,

        /// Arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
    },
}

/// Per-file result of `check`
#[derive(Debug, Clone, PartialEq)]
pub struct FileCheck {
    pub file: String,
    pub status: CheckStatus,
    pub capabilities: Vec<String>,
    pub skipped: Vec<String>,
    /// blake3 content digest, hex encoded
    pub digest: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Failed,
    Missing,
}

impl CheckStatus {
    fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Failed => "failed",
            CheckStatus::Missing => "missing",
        }
    }
}

/// CLI context: resolved workspace and configuration
pub struct CliContext {
    workspace_root: PathBuf,
    config: DeckConfig,
}

impl CliContext {
    /// Create a new CLI context, loading configuration for the workspace
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::resolve(&workspace_root, config_path.as_deref())?;
        Ok(Self::with_config(workspace_root, config))
    }

    pub fn with_config(workspace_root: PathBuf, config: DeckConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    /// Execute a CLI command and return its rendered output
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve {
                no_watch,
                debounce_ms,
            } => {
                let mut config = self.config.clone();
                config.no_watch |= *no_watch;
                if let Some(ms) = debounce_ms {
                    config.watch.debounce_ms = *ms;
                }
                config.validate()?;
                self.handle_serve(config).await
            }
            Commands::List { format } => self.handle_list(format).await,
            Commands::Check { file, format } => self.handle_check(file.as_deref(), format).await,
            Commands::Call { name, args } => self.handle_call(name, args.as_deref()).await,
        }
    }

    async fn load_once(&self) -> Result<CapabilityHost, ApiError> {
        let host = CapabilityHost::new(
            self.config.clone(),
            &self.workspace_root,
            Arc::new(MemorySink::new()),
        );
        host.initial_scan().await?;
        Ok(host)
    }

    async fn handle_serve(&self, config: DeckConfig) -> Result<String, ApiError> {
        let (server, outbound) = StdioServer::new();
        let host = CapabilityHost::start(config, &self.workspace_root, server.clone()).await?;
        info!(
            directory = %host.directory().display(),
            capabilities = host.registry().read().len(),
            watching = host.is_watching(),
            "Serving capabilities over stdio"
        );

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                signal.cancel();
            }
        });

        let input = tokio::io::BufReader::new(tokio::io::stdin());
        let result = server
            .run(input, tokio::io::stdout(), outbound, shutdown)
            .await;
        host.shutdown().await;
        result.map(|()| String::new())
    }

    async fn handle_list(&self, format: &str) -> Result<String, ApiError> {
        let host = self.load_once().await?;
        let registry = host.registry().read();
        let capabilities = registry.list();

        if format == "json" {
            let items: Vec<Value> = capabilities
                .iter()
                .map(|c| {
                    json!({
                        "name": c.name,
                        "file": c.owner,
                        "description": c.adapter.description(),
                        "input_schema": c.adapter.input_schema(),
                    })
                })
                .collect();
            let out = json!({ "capabilities": items, "total": capabilities.len() });
            return Ok(serde_json::to_string_pretty(&out)?);
        }

        if capabilities.is_empty() {
            return Ok(format!(
                "No capabilities found in {}",
                host.directory().display()
            ));
        }
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Name", "File", "Description"]);
        for c in &capabilities {
            table.add_row(vec![
                c.name.clone(),
                c.owner.clone(),
                c.adapter.description().to_string(),
            ]);
        }
        Ok(format!(
            "{}\n\n{}\n\nTotal: {} capability(ies)",
            format_section_heading("Capabilities"),
            table,
            capabilities.len()
        ))
    }

    async fn handle_check(&self, file: Option<&Path>, format: &str) -> Result<String, ApiError> {
        let files = match file {
            Some(path) if path.is_absolute() => vec![path.to_path_buf()],
            Some(path) => vec![self.workspace_root.join(path)],
            None => {
                let host = CapabilityHost::new(
                    self.config.clone(),
                    &self.workspace_root,
                    Arc::new(MemorySink::new()),
                );
                host.discover()?
            }
        };

        let loader = ModuleLoader::new(self.config.capabilities.extensions.clone());
        let mut checks = Vec::with_capacity(files.len());
        for path in &files {
            checks.push(check_file(&loader, path).await);
        }

        if format == "json" {
            Ok(format_check_json(&checks))
        } else {
            Ok(format_check_text(&checks))
        }
    }

    async fn handle_call(&self, name: &str, args: Option<&str>) -> Result<String, ApiError> {
        let arguments = args.map(serde_json::from_str::<Value>).transpose()?;
        let host = self.load_once().await?;
        let adapter = host
            .registry()
            .read()
            .get(name)
            .map(|c| Arc::clone(&c.adapter))
            .ok_or_else(|| ApiError::CapabilityNotFound(name.to_string()))?;

        let envelope = adapter.call(arguments, ExecutionContext::detached()).await;
        if envelope.is_error {
            Err(ApiError::InvocationFailed(envelope.text()))
        } else {
            Ok(envelope.text())
        }
    }
}

async fn check_file(loader: &ModuleLoader, path: &Path) -> FileCheck {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match loader.load(path).await {
        LoadOutcome::NotFound => FileCheck {
            file,
            status: CheckStatus::Missing,
            capabilities: Vec::new(),
            skipped: Vec::new(),
            digest: None,
            error: None,
        },
        LoadOutcome::Failed(e) => FileCheck {
            file,
            status: CheckStatus::Failed,
            capabilities: Vec::new(),
            skipped: Vec::new(),
            digest: None,
            error: Some(e.to_string()),
        },
        LoadOutcome::Loaded(module) => {
            let capabilities = match FileIdentity::from_path(path) {
                Some(identity) => module
                    .exports
                    .iter()
                    .map(|(export, _)| identity.capability_name(export))
                    .collect(),
                None => Vec::new(),
            };
            FileCheck {
                file,
                status: CheckStatus::Ok,
                capabilities,
                digest: Some(hex::encode(module.digest)),
                skipped: module.skipped,
                error: None,
            }
        }
    }
}

/// Section heading with bold/underline
fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn format_check_text(checks: &[FileCheck]) -> String {
    if checks.is_empty() {
        return "No capability files found.".to_string();
    }
    let mut out = format!("{}\n\n", format_section_heading("Capability files"));
    for check in checks {
        let status = match check.status {
            CheckStatus::Ok => format!("{}", "ok".green()),
            CheckStatus::Failed => format!("{}", "failed".red()),
            CheckStatus::Missing => format!("{}", "missing".yellow()),
        };
        out.push_str(&format!("  {:<24} {}\n", check.file, status));
        if !check.capabilities.is_empty() {
            out.push_str(&format!("      provides: {}\n", check.capabilities.join(", ")));
        }
        if !check.skipped.is_empty() {
            out.push_str(&format!("      skipped:  {}\n", check.skipped.join(", ")));
        }
        if let Some(error) = &check.error {
            out.push_str(&format!("      error:    {}\n", error));
        }
    }
    let failed = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Failed)
        .count();
    out.push_str(&format!(
        "\nTotal: {} file(s), {} failed",
        checks.len(),
        failed
    ));
    out
}

fn format_check_json(checks: &[FileCheck]) -> String {
    let files: Vec<Value> = checks
        .iter()
        .map(|c| {
            json!({
                "file": c.file,
                "status": c.status.as_str(),
                "capabilities": c.capabilities,
                "skipped": c.skipped,
                "digest": c.digest,
                "error": c.error,
            })
        })
        .collect();
    let failed = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Failed)
        .count();
    let out = json!({ "files": files, "total": checks.len(), "failed": failed });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
