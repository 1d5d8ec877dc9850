use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use harvest::{Harvester, Selection};
use lexharvest_common::observability::{LogConfig, LogFormat, init_logging};
use lexharvest_config::{HarvestConfig, HarvestConfigLoader, Profile};
use std::path::PathBuf;
mod harvest;

const DEFAULT_CONFIG_FILE: &str = "lexharvest.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "lexharvest",
    about = "Harvest lex.uz document listings into per-language JSON corpora",
    version
)]
struct Cli {
    /// YAML configuration file (default: ./lexharvest.yaml when present)
    #[arg(long, global = true, env = "LEXHARVEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest category listings, then the recency feed
    Run(RunArgs),
    /// Harvest only the recency feed
    Recent {
        /// Restrict to these language codes (repeatable)
        #[arg(long = "lang")]
        languages: Vec<String>,
    },
    /// Print the corpora on disk and rewrite the summary file
    Summary,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Restrict to these categories (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Restrict to these language codes (repeatable)
    #[arg(long = "lang")]
    languages: Vec<String>,
    /// `full` walks every page, `capped` stops after a few
    #[arg(long, value_parser = parse_profile)]
    profile: Option<Profile>,
    /// Hard page budget per listing, overrides the profile
    #[arg(long)]
    max_pages: Option<u32>,
    /// Do not harvest the recency feed
    #[arg(long)]
    skip_recent: bool,
}

fn parse_profile(raw: &str) -> Result<Profile, String> {
    Profile::parse(raw).ok_or_else(|| format!("unknown profile {raw:?} (expected full or capped)"))
}

fn load_config(cli: &Cli) -> Result<HarvestConfig> {
    let loader = HarvestConfigLoader::new();
    let loader = match &cli.config {
        Some(path) => loader.with_file(path),
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config (env wins), then CLI overrides
    let mut cfg = load_config(&cli)?;
    if let Command::Run(args) = &cli.command {
        if let Some(profile) = args.profile {
            cfg.profile = profile;
        }
        if args.max_pages.is_some() {
            cfg.max_pages = args.max_pages;
        }
        cfg.validate().context("invalid command line overrides")?;
    }

    // 2) Logging from the same config
    let format = LogFormat::parse(&cfg.logging.format)
        .ok_or_else(|| anyhow!("unknown log format {:?}", cfg.logging.format))?;
    let log_path = init_logging(LogConfig {
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format,
        default_filter: cfg.logging.filter.clone(),
        ..LogConfig::default()
    })?;
    tracing::info!(log = %log_path.display(), origin = %cfg.origin, "lexharvest.start");

    let harvester = Harvester::new(cfg);
    match cli.command {
        Command::Run(args) => {
            let selection = Selection {
                categories: args.categories,
                languages: args.languages,
                listings: true,
                recent: !args.skip_recent,
            };
            finish(&harvester, harvester.run(&selection).await?)
        }
        Command::Recent { languages } => {
            let selection = Selection {
                languages,
                listings: false,
                recent: true,
                ..Selection::default()
            };
            finish(&harvester, harvester.run(&selection).await?)
        }
        Command::Summary => {
            let summary = harvester.write_summary()?;
            for (category, languages) in &summary.document_types {
                for (language, entry) in languages {
                    println!("{category}\t{language}\t{}\t{}", entry.count, entry.file);
                }
            }
            println!("total\t{}", summary.total_records());
            Ok(())
        }
    }
}

/// Rewrite the summary, then turn failed pairs into a non-zero exit.
fn finish(harvester: &Harvester, report: harvest::RunReport) -> Result<()> {
    harvester.write_summary()?;
    let failed = report.failed();
    tracing::info!(
        corpora = report.pairs.len(),
        added = report.added(),
        failed,
        "lexharvest.done"
    );
    if failed > 0 {
        return Err(anyhow!("{failed} corpus update(s) failed"));
    }
    Ok(())
}
