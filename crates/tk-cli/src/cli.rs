use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tk_codec::TiddlerRef;
use tk_keep::Visibility;
use tk_types::ObjectId;

#[derive(Parser)]
#[command(
    name = "tiddlykeep",
    about = "TiddlyKeep: TiddlyWiki storage on a signed content store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store journal file.
    #[arg(long, global = true, env = "TIDDLYKEEP_JOURNAL")]
    pub journal: Option<PathBuf>,

    /// TOML config file; flags override its values.
    #[arg(long, global = true, env = "TIDDLYKEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// TiddlyWeb-compatible server
    Serve(ServeArgs),
    /// Install the TiddlyWiki bootstrap document
    Init(InitArgs),
    /// List tiddlers as JSON
    Ls(LsArgs),
    /// Print tiddlers as JSON
    Get(SelectArgs),
    /// Put a JSON array of tiddlers read from stdin
    Put(PutArgs),
    /// Delete tiddlers
    Delete(SelectArgs),
    /// Edit tiddlers using $EDITOR
    Edit(SelectArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// HTTP listening address.
    #[arg(long)]
    pub listen: Option<String>,
    /// User name reported by /status.
    #[arg(long)]
    pub user: Option<String>,
    /// Recipe reported by /status.
    #[arg(long)]
    pub recipe: Option<String>,
    /// Tiddlers preloaded into the index document: none, system or all.
    #[arg(long)]
    pub embed: Option<Visibility>,
    #[command(flatten)]
    pub keep: KeepArgs,
    /// Node of the bootstrap document, skipping the lookup by title.
    #[arg(long)]
    pub index_ref: Option<ObjectId>,
}

/// Flags shared by every command that creates nodes.
#[derive(Args, Default)]
pub struct KeepArgs {
    /// Bag for tiddlers that name none.
    #[arg(long)]
    pub default_bag: Option<String>,
    /// Newly created nodes to hide: none, system or all.
    #[arg(long)]
    pub hide_nodes: Option<Visibility>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Empty TiddlyWiki HTML to serve as the bootstrap document.
    #[arg(long)]
    pub index_file: PathBuf,
    /// JSON tiddler (e.g. the TiddlyWeb plugin) to put unless already present.
    #[arg(long)]
    pub plugin_file: Option<PathBuf>,
    #[command(flatten)]
    pub keep: KeepArgs,
}

#[derive(Args)]
pub struct LsArgs {
    /// Include bodies.
    #[arg(long)]
    pub fat: bool,
    #[arg(long, conflicts_with = "recipe")]
    pub bag: Option<String>,
    /// Defaults to `all` when no bag is given.
    #[arg(long)]
    pub recipe: Option<String>,
}

#[derive(Args)]
pub struct PutArgs {
    #[command(flatten)]
    pub keep: KeepArgs,
}

/// Tiddlers named by title within a bag or recipe, or by node.
#[derive(Args)]
pub struct SelectArgs {
    #[arg(long)]
    pub bag: Option<String>,
    #[arg(long, default_value = "all")]
    pub recipe: String,
    /// Targets are node handles rather than titles.
    #[arg(long)]
    pub by_ref: bool,
    #[arg(required = true)]
    pub targets: Vec<String>,
}

impl SelectArgs {
    /// The refs named on the command line, in order.
    pub fn refs(&self) -> anyhow::Result<Vec<TiddlerRef>> {
        self.targets
            .iter()
            .map(|target| -> anyhow::Result<TiddlerRef> {
                let mut r = TiddlerRef {
                    bag: self.bag.clone().unwrap_or_default(),
                    recipe: self.recipe.clone(),
                    ..TiddlerRef::default()
                };
                if self.by_ref {
                    r.node = Some(target.parse::<ObjectId>()?);
                } else {
                    r.title = target.clone();
                }
                Ok(r)
            })
            .collect()
    }
}
