use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use revision_crawler::config::Config;
use revision_crawler::crawler::{
    Parameters, Revision, RevisionCrawler, RevisionSpec, document_count,
};
use revision_crawler::repository::GitOpener;
use revision_crawler::state::CrawlState;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "revision-crawler",
    version = VERSION,
    about = "Crawl repository history into indexable documents",
    long_about = "Walks the revision history of a git repository and prints one JSON \
    record per changed file, ready to be fed to a full-text index."
)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "REVISION_CRAWLER_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a revision range and print one JSON line per document
    Crawl(CrawlArgs),
    /// Print the head revision number
    Latest {
        #[arg(short, long, help = "Repository location")]
        location: Option<String>,
    },
    /// Print the documents of every file under a path at one revision
    List {
        #[arg(short, long, help = "Repository location")]
        location: Option<String>,
        #[arg(short, long, default_value = "/", help = "Path to list")]
        path: String,
        #[arg(short, long, help = "Revision to list (defaults to the head)")]
        revision: Option<u64>,
    },
}

#[derive(Args)]
struct CrawlArgs {
    #[arg(short, long, help = "Repository location")]
    location: Option<String>,
    #[arg(short, long, help = "Path inside the repository to crawl")]
    base_path: Option<String>,
    #[arg(long, help = "First revision to crawl")]
    start: Option<u64>,
    #[arg(long, help = "Last revision to crawl (defaults to the head)")]
    end: Option<u64>,
    #[arg(long, help = "Largest file whose content is included, in bytes")]
    max_file_size: Option<u64>,
    #[arg(short, long, help = "Path pattern to skip (regex, or glob: prefixed)")]
    exclude: Vec<String>,
    #[arg(short, long, help = "Threads fetching content within a revision")]
    workers: Option<usize>,
    #[arg(long, help = "Continue after the last revision recorded in the state file")]
    resume: bool,
}

impl CrawlArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(location) = &self.location {
            config.repository.location = location.clone();
        }
        if let Some(base_path) = &self.base_path {
            config.crawl.base_path = base_path.clone();
        }
        if let Some(start) = self.start {
            config.crawl.start_revision = start;
        }
        if self.end.is_some() {
            config.crawl.end_revision = self.end;
        }
        if self.max_file_size.is_some() {
            config.crawl.maximum_file_size = self.max_file_size;
        }
        config.crawl.exclude_patterns.extend(self.exclude.iter().cloned());
        if let Some(workers) = self.workers {
            config.crawl.fetch_workers = workers;
        }
        config.state.resume |= self.resume;
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Records go to stdout, so logs must not
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Crawl(args) => {
            args.apply(&mut config);
            config.validate()?;
            crawl(config).await
        }
        Commands::Latest { location } => {
            let location = location.unwrap_or(config.repository.location);
            let latest = tokio::task::spawn_blocking(move || {
                RevisionCrawler::new(GitOpener).latest_revision(&location)
            })
            .await??;
            println!("{}", latest);
            Ok(())
        }
        Commands::List {
            location,
            path,
            revision,
        } => {
            if let Some(location) = location {
                config.repository.location = location;
            }
            config.validate()?;
            let params = config.to_parameters()?;
            let location = config.repository.location;
            let documents = tokio::task::spawn_blocking(move || {
                RevisionCrawler::new(GitOpener).list_entries(
                    &location,
                    &path,
                    RevisionSpec::from(revision),
                    &params,
                )
            })
            .await??;

            let mut out = std::io::stdout().lock();
            for document in &documents {
                writeln!(out, "{}", document.to_json()?)?;
            }
            Ok(())
        }
    }
}

/// End of the crawl against the head seen before it starts
fn resolve_end(params: &Parameters, latest: u64) -> u64 {
    match params.end_revision() {
        RevisionSpec::Latest => latest,
        RevisionSpec::Number(end) => end.min(latest),
    }
}

async fn crawl(config: Config) -> Result<()> {
    let location = config.repository.location.clone();
    let mut params = config.to_parameters()?;
    let key = CrawlState::key(&location, params.base_path());

    let crawler = RevisionCrawler::new(GitOpener);
    let latest = {
        let location = location.clone();
        tokio::task::spawn_blocking(move || RevisionCrawler::new(GitOpener).latest_revision(&location))
            .await??
    };
    let end = resolve_end(&params, latest);

    let mut state = None;
    if config.state.resume {
        let loaded = CrawlState::load(&config.state.path)?;
        let start = loaded.next_start(&key).max(params.start_revision());
        if start > end {
            tracing::info!("{} is up to date at revision {}", key, end);
            return Ok(());
        }
        tracing::info!("Resuming {} from revision {}", key, start);
        params = params.starting_at(start)?;
        state = Some(loaded);
    }

    // The crawl must stop where the state will say it stopped
    let params = params.ending_at(end)?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing the current revision");
            signal_cancel.cancel();
        }
    });

    let crawl_cancel = cancel.clone();
    let crawl_location = location.clone();
    let revisions: Vec<Revision> = tokio::task::spawn_blocking(move || {
        crawler.crawl_with_cancellation(&crawl_location, &params, &crawl_cancel)
    })
    .await??;

    {
        let mut out = std::io::stdout().lock();
        for revision in &revisions {
            for record in revision.records() {
                writeln!(out, "{}", record.to_json()?)?;
            }
        }
        out.flush()?;
    }

    let documents = document_count(&revisions);
    tracing::info!(
        "Emitted {} documents from {} revisions",
        documents,
        revisions.len()
    );

    if let Some(mut state) = state {
        // A cancelled crawl only covers what it returned
        let covered = if cancel.is_cancelled() {
            revisions.last().map(|revision| revision.number)
        } else {
            Some(end)
        };
        if let Some(last_revision) = covered {
            state.record(key, last_revision, documents);
            state
                .save(&config.state.path)
                .context("Failed to persist crawl state")?;
        }
    }

    Ok(())
}
