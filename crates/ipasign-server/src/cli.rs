use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// ipasign - IPA re-signing service
#[derive(Parser, Debug)]
#[command(name = "ipasignd")]
#[command(version = ipasign_core::VERSION)]
#[command(about = "IPA signing server daemon", long_about = None)]
pub struct Cli {
    /// Listen address (overrides IPASIGN_BIND_ADDR)
    #[arg(long, global = true)]
    pub bind: Option<SocketAddr>,

    /// Upload directory (overrides IPASIGN_UPLOAD_DIR)
    #[arg(long, global = true)]
    pub upload_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Default, PartialEq, Eq)]
pub enum Commands {
    /// Run server in foreground (default if no command given)
    #[default]
    Run,

    /// Print the effective configuration and exit
    Config,
}
