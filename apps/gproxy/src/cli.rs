use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// The minimal stand-in for the CLI command layer spec.md treats as an
/// external collaborator: just enough to boot the axum front-end over the
/// gateway core.
#[derive(Parser)]
#[command(name = "gproxy")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load provider configuration and start serving requests.
    Serve {
        /// Path to a JSON array of provider records (spec §6 provider wire shape).
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Default outbound proxy applied to providers that don't set their own.
        #[arg(long)]
        proxy: Option<String>,
        /// Blank `Authorization`/`x-api-key` header values before recording
        /// a request. On by default.
        #[arg(long)]
        redact_sensitive: Option<bool>,
    },
}
