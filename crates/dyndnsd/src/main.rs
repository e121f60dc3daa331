// # dyndnsd - Cloudflare dynamic DNS updater
//
// One binary, two roles:
//
// - `serve`: HTTP surface. Clients send Basic credentials whose password is an
//   encrypted envelope; the server decrypts it, talks to Cloudflare on the
//   client's behalf and answers with a JSON envelope.
// - Command line: `encrypt`/`decrypt` for envelopes, `update` to reconcile
//   records directly, `update-remote` to have another instance do it.
//
// This is a thin integration layer: every decision lives in dyndns-core and
// the plugin crates. Configuration comes from the environment only (see
// `config.rs`).
//
// ## Example
//
// ```bash
// export DYNDNS_SECRET="$(openssl rand -base64 32)"
//
// CIPHER="$(dyndnsd -q encrypt "$CLOUDFLARE_API_KEY")"
// dyndnsd update example.com home.example.com -u me@example.com -p "$CIPHER" -4 203.0.113.9
//
// dyndnsd serve
// ```

mod commands;
mod config;
mod http;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{Family, RemoteArgs, UpdateArgs};
use dyndns_core::ServiceConfig;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy)]
enum DyndnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (command or server failure)
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "dyndnsd", version, about = "Cloudflare dynamic DNS updater")]
struct Cli {
    /// Print only raw values; log errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error); overrides DYNDNS_LOG_LEVEL
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API until SIGINT/SIGTERM
    Serve,

    /// Encrypt a provider password
    Encrypt {
        /// Plaintext password
        password: String,
    },

    /// Decrypt an encrypted password
    Decrypt {
        /// Hex envelope produced by `encrypt`
        cipher: String,
    },

    /// Update the A/AAAA records of a host directly at Cloudflare
    Update {
        /// Zone containing the host
        zone: String,
        /// Fully qualified hostname
        hostname: String,
        /// Cloudflare account email (empty for API tokens)
        #[arg(short, long, default_value = "")]
        username: String,
        /// Encrypted password
        #[arg(short, long)]
        password: String,
        /// IPv4 address for the A record
        #[arg(short = '4', long)]
        ipv4: Option<String>,
        /// IPv6 address for the AAAA record
        #[arg(short = '6', long)]
        ipv6: Option<String>,
    },

    /// Resolve this host's public addresses and send them to a remote instance
    UpdateRemote {
        /// Remote instance host, with optional port and path prefix
        remote: String,
        /// Zone containing the host
        zone: String,
        /// Fully qualified hostname
        hostname: String,
        /// Cloudflare account email (empty for API tokens)
        #[arg(short, long, default_value = "")]
        username: String,
        /// Encrypted password
        #[arg(short, long)]
        password: String,
        /// Address families to resolve and forward
        #[arg(long, value_enum, default_value_t = Family::Both)]
        family: Family,
        /// URL scheme used to reach the remote
        #[arg(long, default_value = dyndns_remote::DEFAULT_SCHEME)]
        scheme: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match log_level(&cli) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    // Load configuration from environment
    let config = match config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    let quiet = cli.quiet;
    let result = rt.block_on(run(cli.command, &config, quiet));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            DyndnsExitCode::CleanShutdown.into()
        }
        Err(e) => {
            error!("{:#}", e);
            DyndnsExitCode::RuntimeError.into()
        }
    }
}

/// Level from `--log-level`, then `DYNDNS_LOG_LEVEL`, then info
fn log_level(cli: &Cli) -> Result<Level> {
    if cli.quiet {
        return Ok(Level::ERROR);
    }

    match cli
        .log_level
        .clone()
        .or_else(|| std::env::var("DYNDNS_LOG_LEVEL").ok())
    {
        Some(level) => config::parse_level(&level),
        None => Ok(Level::INFO),
    }
}

/// Run a command, returning its stdout text
async fn run(command: Command, config: &ServiceConfig, quiet: bool) -> Result<String> {
    match command {
        Command::Serve => {
            info!("Starting dyndnsd server");
            http::serve(config).await?;
            Ok(String::new())
        }
        Command::Encrypt { password } => commands::encrypt(config, &password, quiet),
        Command::Decrypt { cipher } => commands::decrypt(config, &cipher, quiet),
        Command::Update {
            zone,
            hostname,
            username,
            password,
            ipv4,
            ipv6,
        } => {
            let args = UpdateArgs {
                zone,
                hostname,
                username,
                password,
                ipv4,
                ipv6,
            };
            commands::update(config, args, quiet).await
        }
        Command::UpdateRemote {
            remote,
            zone,
            hostname,
            username,
            password,
            family,
            scheme,
        } => {
            let args = RemoteArgs {
                remote,
                zone,
                hostname,
                username,
                password,
                family,
                scheme,
            };
            commands::update_remote(config, args, quiet).await
        }
    }
}
