use clap::Parser;

/// Command-line overrides accepted by the `gallerist-server` binary. Layered
/// on top of (but lower priority reads win over) the environment per
/// `ConfigLoader` — at the moment only log verbosity is CLI-only, everything
/// else belongs in the environment so it is identical across `docker run`
/// and a bare-metal service unit.
#[derive(Parser, Debug, Clone)]
#[command(name = "gallerist-server", about = "Media-library ingestion daemon")]
pub struct Cli {
    /// Print the resolved configuration and exit without starting any workers.
    #[arg(long)]
    pub print_config: bool,

    /// Override `RUST_LOG`-style filter directives.
    #[arg(long, env = "GALLERIST_LOG")]
    pub log: Option<String>,
}
