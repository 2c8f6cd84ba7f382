use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use orbis_chain::{CancellationToken, LazyResource, Progress};
use orbis_resolve::{ArchitectureAssetLocator, ContentResolver, DirectoryLister, ResolveError};
use orbis_store::{InMemoryStorage, KuboConfig, KuboStorage, StorageService};
use orbis_types::PlatformTag;
use orbis_world::{World, WorldConfig, WorldMetadata};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => WorldConfig::load(path)?,
        None => WorldConfig::default(),
    };
    if let Some(platform) = &cli.platform {
        config.platform = PlatformTag::from_os(platform);
    }

    match cli.command {
        Command::Resolve(args) => cmd_resolve(kubo(&cli.api)?, args).await,
        Command::Ls(args) => cmd_ls(kubo(&cli.api)?, args).await,
        Command::Locate(args) => cmd_locate(kubo(&cli.api)?, args, config).await,
        Command::World(args) => cmd_world(kubo(&cli.api)?, args, config).await,
        Command::Inspect(args) => cmd_inspect(args, config).await,
    }
}

fn kubo(api: &str) -> anyhow::Result<Arc<dyn StorageService>> {
    let storage = KuboStorage::new(KuboConfig {
        api_url: api.to_string(),
        ..KuboConfig::default()
    })?;
    Ok(Arc::new(storage))
}

/// A token cancelled by Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    token
}

async fn cmd_resolve(storage: Arc<dyn StorageService>, args: ResolveArgs) -> anyhow::Result<()> {
    let cancel = interrupt_token();
    let id = ContentResolver::new(storage)
        .resolve(&args.path, &cancel)
        .await
        .with_context(|| format!("resolving {}", args.path))?;
    println!("{id}");
    Ok(())
}

async fn cmd_ls(storage: Arc<dyn StorageService>, args: LsArgs) -> anyhow::Result<()> {
    let cancel = interrupt_token();
    let id = ContentResolver::new(Arc::clone(&storage))
        .resolve(&args.path, &cancel)
        .await?;
    let node = DirectoryLister::new(storage).list(&id, &cancel).await?;
    if !node.is_directory {
        println!("{} is a file", id.to_string().cyan());
        return Ok(());
    }
    for link in &node.links {
        let size = link.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        println!("{:>12}  {}  {}", size.dimmed(), link.id.to_string().cyan(), link.name.bold());
    }
    println!("{} entries", node.len());
    Ok(())
}

async fn cmd_locate(
    storage: Arc<dyn StorageService>,
    args: LocateArgs,
    config: WorldConfig,
) -> anyhow::Result<()> {
    let cancel = interrupt_token();
    let root = ContentResolver::new(Arc::clone(&storage))
        .resolve(&args.archive, &cancel)
        .await?;
    let asset = ArchitectureAssetLocator::new(storage)
        .with_dirs(config.architecture_dirs.clone())
        .with_suffix(config.bundle_suffix.clone())
        .sorted(config.sort_listing)
        .locate(&root, &config.platform, &cancel)
        .await
        .with_context(|| format!("locating {} bundle in {root}", config.platform))?;
    println!("{} {}", "✓".green().bold(), asset.name.bold());
    println!("  id: {}", asset.id.to_string().cyan());
    if let Some(size) = asset.size {
        println!("  size: {size} bytes");
    }
    Ok(())
}

async fn cmd_world(
    storage: Arc<dyn StorageService>,
    args: WorldArgs,
    config: WorldConfig,
) -> anyhow::Result<()> {
    let world = Arc::new(World::from_path(&args.root, storage, config)?);
    let fetch_content = args.content || args.out.is_some();
    report_world(&world, fetch_content).await;

    if let Some(out) = &args.out {
        let bundle = world
            .template_content()
            .get()
            .await
            .map_err(Clone::clone)
            .context("fetching content bundle")?;
        tokio::fs::write(out, &bundle.bytes)
            .await
            .with_context(|| format!("writing {}", out.display()))?;
        println!("{} wrote {} bytes to {}", "✓".green().bold(), bundle.len(), out.display());
    }
    Ok(())
}

async fn cmd_inspect(args: InspectArgs, config: WorldConfig) -> anyhow::Result<()> {
    let store = InMemoryStorage::new();
    let root = store
        .import_dir(&args.dir)
        .with_context(|| format!("importing {}", args.dir.display()))?;
    println!("{} {} as {}", "imported".green(), args.dir.display(), root.to_string().cyan());
    let world = Arc::new(World::new(root, Arc::new(store), config));
    report_world(&world, args.content).await;
    Ok(())
}

/// Resolve the world's fields concurrently and print one line per field.
async fn report_world(world: &Arc<World>, fetch_content: bool) {
    let on_interrupt = Arc::clone(world);
    let interrupt = interrupt_token();
    tokio::spawn(async move {
        interrupt.cancelled().await;
        on_interrupt.cancel_all();
    });

    world.template_cid().trigger();
    world.decoration_cid().trigger();
    world.world_info().trigger();
    world.template_info().trigger();
    world.screenshot_png().trigger();
    if fetch_content {
        let decile = Arc::new(AtomicU64::new(0));
        world.on_reporting_progress(move |p: Progress| {
            let step = (p.fraction() * 10.0) as u64;
            if step > decile.fetch_max(step, Ordering::Relaxed) {
                eprintln!("  {} {}", "fetching".dimmed(), p);
            }
        });
        world.template_content().trigger();
    }

    println!("World {}", world.root_path().to_string().yellow().bold());
    show("template", world.template_cid(), |id| id.to_string().cyan().to_string()).await;
    show("decoration", world.decoration_cid(), |id| match id {
        Some(id) => id.to_string().cyan().to_string(),
        None => "none".dimmed().to_string(),
    })
    .await;
    show("world info", world.world_info(), describe).await;
    show("template info", world.template_info(), describe).await;
    show("screenshot", world.screenshot_png(), |png| format!("{} bytes", png.len())).await;
    if fetch_content {
        show("content", world.template_content(), |bundle| {
            format!("{} ({} bytes) {}", bundle.name.bold(), bundle.len(), bundle.id.to_string().cyan())
        })
        .await;
    }
}

async fn show<T, F, D>(label: &str, field: &LazyResource<T, ResolveError>, render: F)
where
    T: Send + Sync + 'static,
    F: FnOnce(&T) -> D,
    D: Display,
{
    match field.get().await {
        Ok(value) => println!("  {:>14}  {}", label.bold(), render(value)),
        Err(err) => println!("  {:>14}  {}", label.bold(), err.to_string().red()),
    }
}

fn describe(meta: &WorldMetadata) -> String {
    let name = if meta.name.is_empty() { "(unnamed)" } else { meta.name.as_str() };
    match (meta.author.is_empty(), meta.description.is_empty()) {
        (false, false) => format!("{} by {}: {}", name.bold(), meta.author, meta.description),
        (false, true) => format!("{} by {}", name.bold(), meta.author),
        (true, false) => format!("{}: {}", name.bold(), meta.description),
        (true, true) => name.bold().to_string(),
    }
}
