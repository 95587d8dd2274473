use std::io::Read;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use colored::Colorize;
use tk_codec::{decode_json, Tiddler, TiddlerRef};
use tk_keep::{
    always_text, never_text, KeepConfig, KeepError, TextFilter, TiddlerStore, INDEX_TITLE,
};
use tk_server::{KeepServer, ServerConfig};
use tk_store::InMemoryContentStore;

use crate::cli::*;
use crate::edit;

/// Journal used when neither the flag nor the config file names one.
const DEFAULT_JOURNAL: &str = "tiddlykeep.journal";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.journal = Some(
        cli.journal
            .or(config.journal.take())
            .unwrap_or_else(|| DEFAULT_JOURNAL.into()),
    );

    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Init(args) => cmd_init(config, args).await,
        Command::Ls(args) => cmd_ls(config, args).await,
        Command::Get(args) => cmd_get(config, args).await,
        Command::Put(args) => cmd_put(config, args).await,
        Command::Delete(args) => cmd_delete(config, args).await,
        Command::Edit(args) => cmd_edit(config, args).await,
    }
}

fn apply_keep_args(args: &KeepArgs, keep: &mut KeepConfig) {
    if let Some(bag) = &args.default_bag {
        keep.default_bag = bag.clone();
    }
    if let Some(hide) = args.hide_nodes {
        keep.hide_nodes = hide;
    }
}

fn open_keep(config: &ServerConfig) -> anyhow::Result<TiddlerStore> {
    let store = match &config.journal {
        Some(path) => InMemoryContentStore::open_journal(path)
            .with_context(|| format!("opening journal {}", path.display()))?,
        None => InMemoryContentStore::new(),
    };
    Ok(TiddlerStore::new(Arc::new(store), config.keep.clone()))
}

fn print_json(tiddlers: &[Tiddler]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(tiddlers)?);
    Ok(())
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(listen) = &args.listen {
        config.bind_addr = listen
            .to_socket_addrs()
            .with_context(|| format!("resolving {listen}"))?
            .next()
            .with_context(|| format!("no address for {listen}"))?;
    }
    if let Some(user) = args.user {
        config.username = user;
    }
    if let Some(recipe) = args.recipe {
        config.recipe = recipe;
    }
    if let Some(embed) = args.embed {
        config.keep.embed = embed;
    }
    apply_keep_args(&args.keep, &mut config.keep);
    if let Some(node) = args.index_ref {
        config.keep.index_node = Some(node);
    }

    KeepServer::open(config)?.serve().await?;
    Ok(())
}

async fn cmd_init(mut config: ServerConfig, args: InitArgs) -> anyhow::Result<()> {
    apply_keep_args(&args.keep, &mut config.keep);
    let keep = open_keep(&config)?;

    let document = std::fs::read(&args.index_file)
        .with_context(|| format!("reading {}", args.index_file.display()))?;
    let source = args
        .index_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.index_file.display().to_string());
    match keep.install_index(Bytes::from(document), &source).await? {
        Some(node) => println!(
            "{} Installed {} as {}",
            "✓".green().bold(),
            INDEX_TITLE.bold(),
            node.to_string().cyan()
        ),
        None => println!("{} already present", INDEX_TITLE.bold()),
    }

    if let Some(plugin_file) = &args.plugin_file {
        install_plugin(&keep, plugin_file).await?;
    }
    Ok(())
}

/// Put the tiddler in `path` unless a tiddler of that title is already there.
async fn install_plugin(keep: &TiddlerStore, path: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let plugin = decode_json(&data).with_context(|| format!("decoding {}", path.display()))?;
    if plugin.title.is_empty() {
        bail!("{} holds a tiddler without a title", path.display());
    }

    let probe = TiddlerRef::in_recipe(plugin.title.clone(), "system");
    match keep.get(&probe, &never_text).await {
        Ok(found) => {
            let node = found.node.map(|n| n.to_string()).unwrap_or_default();
            println!("{} found: {}", plugin.title.bold(), node.cyan());
            return Ok(());
        }
        Err(KeepError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let report = keep.put(&plugin).await?;
    println!(
        "{} Loaded {} as {}",
        "✓".green().bold(),
        plugin.title.bold(),
        report.node.to_string().cyan()
    );
    Ok(())
}

async fn cmd_ls(config: ServerConfig, args: LsArgs) -> anyhow::Result<()> {
    let keep = open_keep(&config)?;
    let text_filter: TextFilter<'_> = if args.fat { &always_text } else { &never_text };
    let tiddlers = match (&args.bag, &args.recipe) {
        (Some(bag), None) => keep.list_bag(bag, text_filter).await?,
        (_, recipe) => {
            keep.list_recipe(recipe.as_deref().unwrap_or("all"), text_filter)
                .await?
        }
    };
    print_json(&tiddlers)
}

async fn cmd_get(config: ServerConfig, args: SelectArgs) -> anyhow::Result<()> {
    let keep = open_keep(&config)?;
    let mut tiddlers = Vec::new();
    for r in args.refs()? {
        let t = keep
            .get(&r, &always_text)
            .await
            .with_context(|| format!("getting {r}"))?;
        tiddlers.push(t);
    }
    print_json(&tiddlers)
}

async fn cmd_put(mut config: ServerConfig, args: PutArgs) -> anyhow::Result<()> {
    apply_keep_args(&args.keep, &mut config.keep);
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("reading stdin")?;
    let tiddlers: Vec<Tiddler> =
        serde_json::from_slice(&input).context("decoding tiddler array")?;

    let keep = open_keep(&config)?;
    for t in &tiddlers {
        let report = keep
            .put(t)
            .await
            .with_context(|| format!("putting {:?}", t.title))?;
        if report.is_noop() {
            println!("  {} {}", "unchanged:".dimmed(), t.title);
        } else {
            println!(
                "  {} {} {}",
                "put:".green(),
                t.title,
                report.node.short_hex().dimmed()
            );
        }
    }
    Ok(())
}

async fn cmd_delete(config: ServerConfig, args: SelectArgs) -> anyhow::Result<()> {
    let keep = open_keep(&config)?;
    for r in args.refs()? {
        let node = keep
            .delete(&r)
            .await
            .with_context(|| format!("deleting {r}"))?;
        println!("Deleted {} ({})", r.to_string().yellow(), node.short_hex());
    }
    Ok(())
}

async fn cmd_edit(config: ServerConfig, args: SelectArgs) -> anyhow::Result<()> {
    let keep = open_keep(&config)?;
    for r in args.refs()? {
        let original = keep
            .get(&r, &always_text)
            .await
            .with_context(|| format!("getting {r}"))?;
        let edited = edit::edit_in_editor(&original)?;
        edit::print_diff(&original, &edited);

        let report = keep.put(&edited).await?;
        if report.is_noop() {
            println!("No changes to {}.", original.title.bold());
        } else {
            println!("{} Saved {}", "✓".green().bold(), original.title.bold());
        }
    }
    Ok(())
}
