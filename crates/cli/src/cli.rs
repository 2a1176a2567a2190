use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[clap(name = "keystone", about = "Resolve extensions and compose keystone containers")]
pub struct Cli {
    /// Runtime properties file (defaults to runtime.toml)
    #[clap(long, global = true)]
    pub properties: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Resolve an extension coordinate and list its artifacts
    Resolve {
        /// Coordinate in group:artifact:version form
        coordinate: String,
        /// Local repository, overrides the configured one
        #[clap(long)]
        local_repository: Option<PathBuf>,
        /// Remote repository, may be repeated; replaces the configured list
        #[clap(long = "remote")]
        remotes: Vec<String>,
        /// Forward resolver diagnostics to the log
        #[clap(long)]
        verbose: bool,
    },
    /// Build the minimal container and show the extensions configuration
    Inspect,
    /// Run the full bootstrap and list the composed modules
    Compose,
}
