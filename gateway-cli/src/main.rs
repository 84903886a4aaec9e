// gateway-cli/src/main.rs
// ============================================================================
// Module: Governance Gateway CLI Entry Point
// Description: Command dispatcher for running the gateway server and
// minting adapter tokens for local development.
// Purpose: Provide a small, local-first CLI wrapping `gateway-server`.
// Dependencies: clap, gateway-core, gateway-server, serde_json, thiserror,
// tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The gateway is a local, single-tenant process (§1, Non-goals): this CLI
//! has exactly two jobs, `serve` (run the HTTP surface) and `token` (mint
//! an adapter token against a configured secret, since no HTTP endpoint
//! does this — a token is what gets an adapter through the door in the
//! first place).

use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use gateway_core::ids::AdapterId;
use gateway_core::ids::TenantId;
use gateway_core::ids::WorkspaceId;
use gateway_server::GatewayConfig;
use gateway_server::auth::ADAPTER_TOKEN_TYPE;
use gateway_server::auth::AdapterTokenClaims;
use gateway_server::token::sign_token;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "gateway", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the governance gateway HTTP server.
    Serve(ServeCommand),
    /// Mint a signed adapter token for local development.
    Token(TokenCommand),
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to `gateway.toml` or an
    /// environment override; see [`GatewayConfig::load`]).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the `token` command.
#[derive(Args, Debug)]
struct TokenCommand {
    /// Optional config file path; supplies the signing secret.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Tenant the token is scoped to.
    #[arg(long, default_value = "local")]
    tenant_id: String,
    /// Workspace the token is scoped to.
    #[arg(long)]
    workspace_id: String,
    /// Adapter the token authenticates as.
    #[arg(long)]
    adapter_id: String,
    /// Capability names the token may request, comma-separated.
    #[arg(long, value_delimiter = ',')]
    capability: Vec<String>,
    /// Token lifetime in seconds. Omit for a non-expiring token (local
    /// development only).
    #[arg(long)]
    ttl_seconds: Option<i64>,
    /// Print progress to stderr while running.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Token(command) => command_token(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command: loads configuration, opens the store, and
/// runs the HTTP server until it receives a shutdown signal.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = GatewayConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    init_tracing(&config.log_filter);

    let (router, bind_addr) =
        gateway_server::build_app(config).map_err(|err| CliError::new(format!("failed to build server: {err}")))?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|err| CliError::new(format!("failed to bind {bind_addr}: {err}")))?;
    tracing::info!(%bind_addr, "governance gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("server error: {err}")))?;

    Ok(ExitCode::SUCCESS)
}

/// Resolves on Ctrl-C so `serve` can drain in-flight requests before
/// exiting.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Installs a `tracing-subscriber` env-filter subscriber using the
/// configured default directive.
fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter.to_string()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ============================================================================
// SECTION: Token Command
// ============================================================================

/// Executes the `token` command: signs an adapter token against the
/// configured `adapter_token_secret`.
fn command_token(command: &TokenCommand) -> CliResult<ExitCode> {
    let config = GatewayConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    if command.verbose {
        let _ = write_stderr_line(&format!("signing adapter token for adapter_id={}", command.adapter_id));
    }

    let now = now_unix_seconds();
    let claims = AdapterTokenClaims {
        typ: ADAPTER_TOKEN_TYPE.to_string(),
        tenant_id: TenantId::new(command.tenant_id.clone()),
        workspace_id: WorkspaceId::new(command.workspace_id.clone()),
        adapter_id: AdapterId::new(command.adapter_id.clone()),
        capabilities: command.capability.iter().cloned().collect::<BTreeSet<_>>(),
        iat: now,
        exp: command.ttl_seconds.map(|ttl| now.saturating_add(ttl)),
    };

    let token = sign_token(config.adapter_token_secret.as_bytes(), &claims)
        .map_err(|err| CliError::new(format!("failed to sign token: {err}")))?;
    write_stdout_line(&token).map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Current wall-clock time, in Unix seconds.
fn now_unix_seconds() -> i64 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    i64::try_from(secs).unwrap_or(i64::MAX)
}
