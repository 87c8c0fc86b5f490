//! upack CLI

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "upack")]
#[command(author, version, about = "upack - universal package toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a package archive from a directory tree
    Pack {
        /// Source directory to capture
        source: PathBuf,
        /// Package name
        #[arg(long)]
        name: String,
        /// Package version (semantic)
        #[arg(long)]
        version: String,
        /// Optional package group (may contain '/')
        #[arg(long)]
        group: Option<String>,
        /// Include masks (glob); defaults to everything
        #[arg(long = "include")]
        include: Vec<String>,
        /// Exclude masks (glob)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        /// Extra metadata entries as key=value
        #[arg(long = "meta")]
        meta: Vec<String>,
        /// Output file or directory (default: current directory)
        #[arg(long, default_value = ".")]
        output: PathBuf,
        /// Replace an existing archive
        #[arg(long)]
        overwrite: bool,
    },
    /// Download and install a package from a feed
    Install {
        /// Package specifier: [group/]name@version
        spec: String,
        /// Target directory
        target: PathBuf,
        /// Feed API URL (service root)
        #[arg(long)]
        url: Option<String>,
        /// Feed name
        #[arg(long)]
        feed: Option<String>,
        /// Full feed URL fallback, e.g. https://host/upack/feed
        #[arg(long = "feed-url")]
        feed_url: Option<String>,
        /// API key credential
        #[arg(long = "api-key", env = "UPACK_API_KEY")]
        api_key: Option<String>,
        /// Username credential
        #[arg(long)]
        user: Option<String>,
        /// Password credential
        #[arg(long, env = "UPACK_PASSWORD")]
        password: Option<String>,
        /// Registry scope: machine, user, or none
        #[arg(long, default_value = "user")]
        scope: upack::RegistryScope,
        /// Registry root override (mainly for testing)
        #[arg(long = "registry-root")]
        registry_root: Option<PathBuf>,
    },
    /// List installed packages recorded in the local registry
    List {
        /// Registry scope: machine or user
        #[arg(long, default_value = "user")]
        scope: upack::RegistryScope,
        /// Registry root override
        #[arg(long = "registry-root")]
        registry_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pack {
            source,
            name,
            version,
            group,
            include,
            exclude,
            meta,
            output,
            overwrite,
        } => cmd::pack::pack(
            source, name, version, group, include, exclude, meta, output, overwrite,
        ),
        Commands::Install {
            spec,
            target,
            url,
            feed,
            feed_url,
            api_key,
            user,
            password,
            scope,
            registry_root,
        } => {
            cmd::install::install(
                &spec,
                target,
                url,
                feed,
                feed_url,
                api_key,
                user,
                password,
                scope,
                registry_root,
            )
            .await
        }
        Commands::List {
            scope,
            registry_root,
        } => cmd::list::list(scope, registry_root),
    }
}
