//! certbot manual hook for GratisDNS
//!
//! # Usage
//! ```bash
//! certbot certonly --manual --preferred-challenges dns \
//!     --manual-auth-hook "gratisdns-hook --credentials /etc/letsencrypt/gratisdns.ini auth" \
//!     --manual-cleanup-hook "gratisdns-hook --credentials /etc/letsencrypt/gratisdns.ini cleanup" \
//!     -d example.com -d '*.example.com'
//! ```
//!
//! certbot passes the domain and validation string in `CERTBOT_DOMAIN` and
//! `CERTBOT_VALIDATION`. Auth and cleanup run as separate processes, so
//! cleanup removes records by name and value rather than by a remembered id.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gratisdns_provider::{
    ChallengeConfig, ChallengeOrchestrator, ChallengeToken, DEFAULT_SETTLE_SECS, DEFAULT_TTL,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::HookConfig;

// ============================================================
// CLI Definition
// ============================================================

#[derive(Debug, Parser)]
#[command(name = "gratisdns-hook")]
#[command(about = "GratisDNS DNS-01 hook for certbot", long_about = None)]
#[command(version)]
struct Cli {
    /// INI file with username, password and optional otp_secret
    #[arg(long, env = "GRATISDNS_CREDENTIALS")]
    credentials: PathBuf,

    /// Portal base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Seconds to wait for the record to propagate
    #[arg(long)]
    propagation_seconds: Option<u64>,

    /// TTL of the TXT record
    #[arg(long, default_value_t = DEFAULT_TTL)]
    ttl: u32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish the challenge record
    Auth(ChallengeArgs),
    /// Remove the challenge record
    Cleanup(ChallengeArgs),
}

#[derive(Debug, Args)]
struct ChallengeArgs {
    /// Domain being validated (may be a wildcard)
    #[arg(long, env = "CERTBOT_DOMAIN")]
    domain: String,

    /// TXT record content
    #[arg(long, env = "CERTBOT_VALIDATION")]
    validation: String,
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr, certbot captures stdout
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let is_cleanup = matches!(cli.command, Command::Cleanup(_));
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_cleanup => {
            tracing::warn!("Cleanup failed, the challenge record may be left behind: {e:#}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let hook = HookConfig::load(&cli.credentials)?;
    let config = challenge_config(&cli, &hook);
    let mut orchestrator = ChallengeOrchestrator::new(hook.credentials, config)?;

    match cli.command {
        Command::Auth(args) => {
            let token = ChallengeToken::Validation(args.validation);
            let record = orchestrator.perform(&args.domain, &token).await?;
            tracing::info!(
                "Challenge record {} published in zone '{}'",
                record.record_id,
                record.zone_id
            );
        }
        Command::Cleanup(args) => {
            let token = ChallengeToken::Validation(args.validation);
            let report = orchestrator.purge(&args.domain, &token).await?;
            tracing::info!(
                "Removed {} challenge record(s) for '{}'",
                report.deleted.len(),
                args.domain
            );
            for failure in &report.failures {
                tracing::warn!(
                    "Could not remove record {}: {}",
                    failure.record_id,
                    failure.reason
                );
            }
        }
    }

    Ok(())
}

fn challenge_config(cli: &Cli, hook: &HookConfig) -> ChallengeConfig {
    let settle = cli
        .propagation_seconds
        .or(hook.propagation_seconds)
        .unwrap_or(DEFAULT_SETTLE_SECS);

    let mut builder = ChallengeConfig::builder()
        .settle_interval(Duration::from_secs(settle))
        .ttl(cli.ttl);
    if let Some(url) = &cli.base_url {
        builder = builder.base_url(url.as_str());
    }
    builder.build()
}
