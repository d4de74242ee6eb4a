use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use feedmerge::config::FeedmergeConfig;

mod merge_cmd;

/// Merge GTFS transit feeds
///
/// Combines several GTFS zip archives into one consistent archive.
///
/// MERGE TYPES:
///
///   namespace     Unrelated feeds (e.g. agencies in one region). Every id is
///                 prefixed with its feed's scope, so nothing collides.
///                 Alias: regional.
///
///   reconciling   Two versions of one feed. The newer version wins; the
///                 older version's service is kept up to the day before the
///                 newer one starts. Alias: service-period.
///
/// QUICK START:
///
///   feedmerge merge --type namespace --out region.zip \
///     source=BART,version=1,path=bart.zip \
///     source=Muni,version=4,path=muni.zip
#[derive(Parser)]
#[command(name = "feedmerge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(
    after_help = "See 'feedmerge <command> --help' for more information on a specific command."
)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, env = "FEEDMERGE_CONFIG", default_value = "feedmerge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge feed archives into one
    ///
    /// Examples:
    ///   feedmerge merge --type reconciling --out bart.zip --report report.json \
    ///     source=BART,version=7,path=bart-spring.zip \
    ///     source=BART,version=8,path=bart-summer.zip
    #[command(verbatim_doc_comment)]
    Merge(merge_cmd::MergeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FeedmergeConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    feedmerge::telemetry::init(&config.log);

    match cli.command {
        Commands::Merge(args) => merge_cmd::run(args, &config),
    }
}
