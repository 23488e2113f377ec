//! Command-line interface for the tunnel toolkit.
//!
//! Loads the configuration, initialises logging, and exposes the resolver,
//! the IPv4 helpers and a simulated tunnel lifecycle as subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use shared_utils::config::{ConfigError, ConfigManager, CoreConfig};
use shared_utils::dns::{
    AddressResolver, ResolutionError, SystemResolver, ipv4_from_string, ipv4_to_string,
};
use shared_utils::logging::{self, LogOptions, init_logging};
use shared_utils::stats::format_bytes;
use shared_utils::tunnel::{
    LifecycleEvent, SimulatedTunnel, TunnelConfiguration, TunnelControl, TunnelError,
    TunnelIdentity, TunnelProtocol,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for tracing::Level {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Trace => tracing::Level::TRACE,
            LogLevelArg::Debug => tracing::Level::DEBUG,
            LogLevelArg::Info => tracing::Level::INFO,
            LogLevelArg::Warn => tracing::Level::WARN,
            LogLevelArg::Error => tracing::Level::ERROR,
        }
    }
}

/// Tunnel toolkit CLI application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = "Examples:\n  tunnelctl resolve vpn.example.com --timeout-ms 2000\n  tunnelctl ipv4 parse 192.168.1.1\n  tunnelctl simulate --bundle-id com.example.tunnel\n  tunnelctl bytes 1572864")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", env = "TUNNELKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overriding the configuration
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a hostname under a deadline
    Resolve {
        hostname: String,

        /// Deadline in milliseconds (default: resolver.timeout_ms)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Convert IPv4 addresses
    Ipv4 {
        #[command(subcommand)]
        action: Ipv4Cmd,
    },
    /// Run install, connect, reconnect, disconnect and uninstall on a simulated tunnel
    Simulate {
        #[arg(long, default_value = "com.example.tunnel")]
        bundle_id: String,

        /// Connect/teardown delay in milliseconds (default: lifecycle.simulated_delay_ms)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Make the simulated provisioning service refuse to start
        #[arg(long)]
        fail_start: bool,
    },
    /// Format a byte count
    Bytes { count: u64 },
}

#[derive(Subcommand, Debug)]
enum Ipv4Cmd {
    /// Render a 32-bit value as dotted-quad text
    ToString { value: u32 },
    /// Parse dotted-quad text into a 32-bit value
    Parse { text: String },
}

/// Error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Tunnel lifecycle error
    #[error("Tunnel error: {0}")]
    TunnelError(#[from] TunnelError),

    /// Resolution error
    #[error("Resolution error: {0}")]
    ResolutionError(#[from] ResolutionError),

    /// Malformed IPv4 literal
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Run the CLI application
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let level = cli
        .log_level
        .map(tracing::Level::from)
        .unwrap_or_else(|| logging::parse_level(&config.log_level));
    let _guard = init_logging(LogOptions {
        level,
        json_format: cli.json_logs,
        ..Default::default()
    });
    if let Some(version) = &config.version_identifier {
        debug!(version = %version, "Configuration loaded");
    }

    match cli.command {
        Commands::Resolve {
            hostname,
            timeout_ms,
        } => resolve(&config, &hostname, timeout_ms).await?,
        Commands::Ipv4 { action } => match action {
            Ipv4Cmd::ToString { value } => println!("{}", ipv4_to_string(value)),
            Ipv4Cmd::Parse { text } => {
                let value = ipv4_from_string(&text).ok_or(CliError::InvalidAddress(text))?;
                println!("{value}");
            }
        },
        Commands::Simulate {
            bundle_id,
            delay_ms,
            fail_start,
        } => simulate(config, bundle_id, delay_ms, fail_start).await?,
        Commands::Bytes { count } => println!("{}", format_bytes(count)),
    }

    info!("tunnelctl command completed");
    Ok(())
}

/// Load the configuration from `path`, the default location, or defaults.
fn load_config(path: Option<&Path>) -> CliResult<CoreConfig> {
    if let Some(path) = path {
        debug!("Loading configuration from {:?}", path);
        return Ok(ConfigManager::load(path)?.config().clone());
    }

    let default_path = CoreConfig::default_path();
    if default_path.exists() {
        debug!("Loading configuration from {:?}", default_path);
        return Ok(CoreConfig::load(&default_path)?);
    }

    let mut config = CoreConfig::default();
    CoreConfig::apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn resolve(config: &CoreConfig, hostname: &str, timeout_ms: Option<u64>) -> CliResult<()> {
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.resolver.timeout());
    let resolver = AddressResolver::from_config(SystemResolver, config);

    for record in resolver.resolve(hostname, timeout).await? {
        let family = if record.is_ipv6 { "IPv6" } else { "IPv4" };
        println!("{}\t{}", record.address, family);
    }
    Ok(())
}

async fn simulate(
    mut config: CoreConfig,
    bundle_id: String,
    delay_ms: Option<u64>,
    fail_start: bool,
) -> CliResult<()> {
    if let Some(delay_ms) = delay_ms {
        config.lifecycle.simulated_delay_ms = delay_ms;
    }
    let delay = config.lifecycle.reconnect_delay();
    let tunnel = SimulatedTunnel::simulated(&config);
    if fail_start {
        tunnel
            .provisioning()
            .fail_start(Some("simulated start failure"));
    }
    let _subscription = tunnel.subscribe(|event| println!("{}", describe(event)));

    tunnel.prepare().await;
    tunnel
        .install(TunnelIdentity::new(
            bundle_id,
            TunnelConfiguration::new("Simulated", TunnelProtocol::WireGuard),
        ))
        .await?;

    let outcome = connect_cycle(&tunnel, delay).await;
    tunnel.uninstall().await;
    outcome
}

async fn connect_cycle(tunnel: &SimulatedTunnel, delay: Duration) -> CliResult<()> {
    tunnel.reconnect(delay).await?;
    tunnel.reconnect(delay).await?;
    tunnel.disconnect().await?;
    Ok(())
}

fn describe(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::Reinstalled { bundle_id, enabled } => format!(
            "reinstalled\tbundle={}\tenabled={}",
            bundle_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            enabled
        ),
        LifecycleEvent::StatusChanged {
            bundle_id,
            enabled,
            status,
        } => format!(
            "{}\tbundle={}\tenabled={}",
            status,
            bundle_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            enabled
        ),
        LifecycleEvent::Failed { error } => format!("failed\t{}", error),
    }
}
