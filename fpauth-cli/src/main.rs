//! fpauth - fingerprint authenticator host driver
//!
//! Runs one operation against a device and reports the verdict through the
//! exit code, the way a credential hook would see it.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fpauth::{blocking, InitiatorConfig, Message, Operation, TcpChannel, Verdict};

/// Fingerprint authenticator host driver
#[derive(Parser)]
#[command(name = "fpauth")]
#[command(version)]
#[command(about = "Enroll, verify and revoke fingerprints on a USB-serial authenticator", long_about = None)]
struct Cli {
    /// Serial-over-TCP bridge or simulator (host:port)
    #[arg(short, long, global = true, env = "FPAUTH_ADDR", default_value = "127.0.0.1:7000")]
    addr: String,

    /// Read attempts per wait
    #[arg(long, global = true, env = "FPAUTH_ATTEMPTS", default_value_t = 30)]
    attempts: u32,

    /// Delay between empty reads (milliseconds)
    #[arg(long, global = true, env = "FPAUTH_POLL_MS", default_value_t = 10)]
    poll_ms: u64,

    /// Stop the handshake at SYN_ACK (no final ACK)
    #[arg(long, global = true)]
    two_way: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new fingerprint for a user
    Enroll {
        /// Username
        user: String,
    },

    /// Verify a user's fingerprint
    Verify {
        /// Username
        user: String,
    },

    /// Revoke stored fingerprints
    Revoke {
        /// Username
        user: String,
    },

    /// Handshake and print everything the device sends
    Monitor,
}

impl Cli {
    fn initiator_config(&self) -> InitiatorConfig {
        InitiatorConfig::default()
            .with_attempts(self.attempts)
            .with_poll_interval(Duration::from_millis(self.poll_ms))
            .with_final_ack(!self.two_way)
    }
}

fn split_addr(addr: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("address {:?} is not host:port", addr))?;
    let port = port
        .parse()
        .with_context(|| format!("invalid port in {:?}", addr))?;

    Ok((host.to_string(), port))
}

fn open(addr: &str) -> anyhow::Result<TcpChannel> {
    let (host, port) = split_addr(addr)?;
    let mut channel = TcpChannel::new(host, port);
    channel
        .connect()
        .with_context(|| format!("failed to connect to {}", addr))?;

    Ok(channel)
}

/// Exit status for a verdict: 0 granted, 1 denied, 2 unavailable
fn exit_status(verdict: &Verdict) -> u8 {
    match verdict {
        Verdict::Granted => 0,
        Verdict::Denied => 1,
        Verdict::Unavailable(_) => 2,
    }
}

fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(cli.verbose))
        .init();

    let config = cli.initiator_config();

    let (operation, user) = match &cli.command {
        Commands::Enroll { user } => (Operation::Enroll, user),
        Commands::Verify { user } => (Operation::Verify, user),
        Commands::Revoke { user } => (Operation::Revoke, user),
        Commands::Monitor => {
            let channel = open(&cli.addr)?;
            info!("Monitoring {}", cli.addr);

            blocking::monitor(channel, config, |message: &Message| println!("{}", message))?;

            return Ok(ExitCode::SUCCESS);
        }
    };

    let addr = cli.addr.clone();
    let verdict = blocking::authenticate(
        move || open(&addr).map_err(|e| fpauth::Error::Open(format!("{:#}", e))),
        operation,
        user,
        config,
    );

    match &verdict {
        Verdict::Unavailable(reason) => {
            warn!(%operation, user = %user, %reason, "No verdict");
            eprintln!("{} {}: unavailable ({})", operation, user, reason);
        }
        verdict => {
            info!(%operation, user = %user, %verdict, "Finished");
            println!("{} {}: {}", operation, user, verdict);
        }
    }

    Ok(ExitCode::from(exit_status(&verdict)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_addr() {
        assert_eq!(split_addr("10.0.0.2:7000").unwrap(), ("10.0.0.2".to_string(), 7000));
        assert!(split_addr("10.0.0.2").is_err());
        assert!(split_addr("host:http").is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_status(&Verdict::Granted), 0);
        assert_eq!(exit_status(&Verdict::Denied), 1);
        assert_eq!(exit_status(&Verdict::Unavailable("timeout".into())), 2);
    }

    #[test]
    fn test_verbosity_levels() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(log_filter(1).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(2).max_level_hint(), Some(LevelFilter::TRACE));
        assert_eq!(log_filter(5).max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["fpauth", "verify", "alice", "--attempts", "5", "--two-way", "-vv"]);

        assert!(matches!(cli.command, Commands::Verify { ref user } if user == "alice"));
        assert_eq!(cli.verbose, 2);

        let config = cli.initiator_config();
        assert_eq!(config.attempts, 5);
        assert!(!config.send_final_ack);
    }
}
