use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::types::{ChapterTarget, FeedQuery};
use crate::{slug, ChapterLink};

/// Debugging and maintenance CLI for series and chapter resolution.
#[derive(Debug, Parser)]
#[command(name = "chapterlink", author, version, about)]
pub struct Cli {
    /// TOML config file (defaults plus CHAPTERLINK_* env when omitted).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `database.url`.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a numeric id, slug or upstream UUID to a local series.
    Resolve { key: String },
    /// Import an upstream series by UUID.
    Hydrate { uuid: String },
    /// List a series' chapters.
    Chapters(ChaptersArgs),
    /// Page URLs for a chapter.
    Detail(DetailArgs),
    /// Encode or decode canonical chapter slugs (offline).
    Slug {
        #[command(subcommand)]
        command: SlugCommand,
    },
    /// Follow counts and ratings for upstream series ids.
    Stats {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct ChaptersArgs {
    /// Numeric id, slug or upstream UUID.
    pub series: String,

    /// Comma-separated language codes, or `any`.
    #[arg(long)]
    pub lang: Option<String>,

    /// Group id, or `all`.
    #[arg(long)]
    pub group: Option<String>,

    /// Row ceiling (clamped to 10..=1000).
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct DetailArgs {
    /// Upstream chapter UUID.
    #[arg(long, conflicts_with_all = ["series", "slug"])]
    pub chapter_id: Option<String>,

    /// Series key, used together with `--slug`.
    #[arg(long, requires = "slug")]
    pub series: Option<String>,

    /// Canonical chapter slug, e.g. `g-1a2b3c4d-chapter-12-en`.
    #[arg(long, requires = "series")]
    pub slug: Option<String>,

    /// Use the compressed image variants.
    #[arg(long)]
    pub data_saver: bool,
}

#[derive(Debug, Subcommand)]
pub enum SlugCommand {
    Encode {
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        lang: String,
    },
    Decode { slug: String },
}

impl DetailArgs {
    fn target(&self) -> anyhow::Result<ChapterTarget> {
        match (&self.chapter_id, &self.series, &self.slug) {
            (Some(id), _, _) => Ok(ChapterTarget::Direct(id.clone())),
            (None, Some(series), Some(slug)) => {
                Ok(ChapterTarget::Canonical { series_key: series.clone(), slug: slug.clone() })
            }
            _ => anyhow::bail!("pass --chapter-id, or --series together with --slug"),
        }
    }
}

/// Execute a parsed command, printing JSON results to stdout.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    // Slug commands never touch storage or the network.
    if let Command::Slug { command } = &cli.command {
        return match command {
            SlugCommand::Encode { group, label, lang } => {
                println!("{}", slug::encode(group.as_deref(), label.as_deref(), lang));
                Ok(())
            }
            SlugCommand::Decode { slug: raw } => {
                let decoded = slug::decode(raw).with_context(|| format!("malformed chapter slug: {raw}"))?;
                print_json(&decoded)
            }
        };
    }

    let mut config = Config::load(cli.config.as_deref()).context("load config")?;
    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }
    let app = ChapterLink::connect(config, true).await.context("open chapterlink")?;

    match cli.command {
        Command::Resolve { key } => {
            let found = app.resolve(&key).await.context("resolve")?;
            print_json(&found)
        }
        Command::Hydrate { uuid } => {
            let series = app.hydrate(&uuid).await.context("hydrate")?;
            print_json(&series)
        }
        Command::Chapters(args) => {
            let query = FeedQuery { language: args.lang, group: args.group, limit: args.limit };
            let list = app.list_chapters(&args.series, &query).await.context("list chapters")?;
            print_json(&list)
        }
        Command::Detail(args) => {
            let target = args.target()?;
            let detail = app.resolve_detail(&target, args.data_saver).await.context("chapter detail")?;
            print_json(&detail)
        }
        Command::Stats { ids } => {
            let stats = app.statistics(&ids).await;
            print_json(&stats)
        }
        Command::Slug { .. } => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
