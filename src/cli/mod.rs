use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod create_vault;
pub mod init_config;
pub mod propose;
pub mod status;
pub mod version;

#[derive(Parser)]
#[command(name = "govdriver")]
#[command(author = "govdriver contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive a friends-of-the-chef governance proposal from creation to execution", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Propose, vote on, queue and execute adding the rewards vault to the friends of the chef
    Propose {
        /// Path to config file (default: ~/.config/govdriver/config.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Vote to cast once the proposal is active (for, against, abstain)
        #[arg(long, default_value = "for")]
        support: String,
    },

    /// Show the proposal's on-chain state and the sender's voting power
    Status {
        /// Path to config file (default: ~/.config/govdriver/config.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a rewards vault for a staking token
    CreateVault {
        /// Path to config file (default: ~/.config/govdriver/config.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Staking token address (overrides contracts.token)
        #[arg(long)]
        token: Option<String>,
    },

    /// Write a commented default config file
    InitConfig {
        /// Output path (default: ~/.config/govdriver/config.toml)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Propose { config, support } => propose::execute(config, support).await,
        Commands::Status { config } => status::execute(config).await,
        Commands::CreateVault { config, token } => create_vault::execute(config, token).await,
        Commands::InitConfig { output, force } => init_config::execute(output, force),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// Install the global tracing subscriber. RUST_LOG wins over `level`.
///
/// A second call is a no-op, so commands can call it after loading config.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_propose_defaults() {
        let cli = Cli::parse_from(["govdriver", "propose"]);

        match cli.command {
            Commands::Propose { config, support } => {
                assert_eq!(config, None);
                assert_eq!(support, "for"); // default
            }
            _ => panic!("Expected Propose command"),
        }
    }

    #[test]
    fn test_cli_parse_propose_with_all_options() {
        let cli = Cli::parse_from([
            "govdriver",
            "propose",
            "--config",
            "/etc/govdriver/config.toml",
            "--support",
            "abstain",
        ]);

        match cli.command {
            Commands::Propose { config, support } => {
                assert_eq!(config, Some(PathBuf::from("/etc/govdriver/config.toml")));
                assert_eq!(support, "abstain");
            }
            _ => panic!("Expected Propose command"),
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["govdriver", "status"]);
        assert!(matches!(cli.command, Commands::Status { config: None }));
    }

    #[test]
    fn test_cli_parse_create_vault() {
        let cli = Cli::parse_from([
            "govdriver",
            "create-vault",
            "--token",
            "0x00000000000000000000000000000000000000aa",
        ]);

        match cli.command {
            Commands::CreateVault { config, token } => {
                assert_eq!(config, None);
                assert_eq!(
                    token.as_deref(),
                    Some("0x00000000000000000000000000000000000000aa")
                );
            }
            _ => panic!("Expected CreateVault command"),
        }
    }

    #[test]
    fn test_cli_parse_init_config() {
        let cli = Cli::parse_from(["govdriver", "init-config", "--output", "/tmp/gov.toml", "--force"]);

        match cli.command {
            Commands::InitConfig { output, force } => {
                assert_eq!(output, Some(PathBuf::from("/tmp/gov.toml")));
                assert!(force);
            }
            _ => panic!("Expected InitConfig command"),
        }
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::parse_from(["govdriver", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["govdriver", "register"]).is_err());
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("info");
        init_logging("debug");
    }
}
