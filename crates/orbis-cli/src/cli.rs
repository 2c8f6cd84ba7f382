use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "orbis",
    about = "Orbis: resolve worlds and asset archives on a content-addressed network",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// World layout config (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Kubo RPC endpoint
    #[arg(long, global = true, default_value = "http://127.0.0.1:5001")]
    pub api: String,

    /// Platform whose bundles to select (defaults to the running one)
    #[arg(long, global = true)]
    pub platform: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve a path-like identifier to a bare content id
    Resolve(ResolveArgs),
    /// List one level of a node
    Ls(LsArgs),
    /// Find the platform's bundle inside an asset archive
    Locate(LocateArgs),
    /// Resolve every field of a world
    World(WorldArgs),
    /// Treat a local directory as a world root, without a storage node
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct ResolveArgs {
    pub path: String,
}

#[derive(Args)]
pub struct LsArgs {
    pub path: String,
}

#[derive(Args)]
pub struct LocateArgs {
    /// Archive root, optionally with a sub-path
    pub archive: String,
}

#[derive(Args)]
pub struct WorldArgs {
    /// World root, optionally with a sub-path
    pub root: String,
    /// Also fetch the content bundle
    #[arg(long)]
    pub content: bool,
    /// Write the fetched bundle here (implies --content)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct InspectArgs {
    pub dir: PathBuf,
    /// Also fetch the content bundle
    #[arg(long)]
    pub content: bool,
}
