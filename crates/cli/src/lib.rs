use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use greppy_indexer::{IndexerError, ProjectIndexer, StreamingIndexer, StreamingIndexerConfig};
use greppy_search::{
    matcher_for, read, ExactQuery, Locator, SearchError, SearchRanker, DEFAULT_CONTEXT_LINES,
};
use greppy_vector_store::{create_embedder, paths, ProjectPaths};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

pub mod config;
mod output;

use config::{check_debounce, GreppyConfig};

fn print_stdout(lines: &[String]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        if let Err(err) = writeln!(stdout, "{line}") {
            if err.kind() == io::ErrorKind::BrokenPipe {
                return Ok(());
            }
            return Err(err.into());
        }
    }
    if let Err(err) = stdout.flush() {
        if err.kind() != io::ErrorKind::BrokenPipe {
            return Err(err.into());
        }
    }
    Ok(())
}

fn print_line(line: impl Into<String>) -> Result<()> {
    print_stdout(&[line.into()])
}

#[derive(Parser)]
#[command(name = "greppy")]
#[command(about = "Semantic and exact code search for local projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors and hide progress
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a project directory for semantic search
    Index(IndexArgs),

    /// Semantic search across an indexed project
    Search(SearchArgs),

    /// Exact pattern search over project files (no index needed)
    Exact(ExactArgs),

    /// Print file lines: PATH, PATH:LINE or PATH:START-END
    Read(ReadArgs),

    /// Index, then keep the index updated as files change
    Watch(WatchArgs),

    /// Show index state and pending changes
    Status(ProjectArgs),

    /// Delete the project's index
    Clear(ProjectArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Project directory to index (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Rebuild from scratch, discarding the existing index
    #[arg(long, short = 'f')]
    force: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Maximum number of results
    #[arg(long = "limit", short = 'n', default_value_t = 10)]
    limit: usize,

    /// Project directory (defaults to current directory)
    #[arg(long, short = 'p', default_value = ".")]
    path: PathBuf,
}

#[derive(Args)]
struct ExactArgs {
    /// Regular expression to match per line
    pattern: String,

    /// Case-insensitive matching
    #[arg(long, short = 'i')]
    ignore_case: bool,

    /// Maximum number of matching lines
    #[arg(long = "limit", short = 'n')]
    limit: Option<usize>,

    /// Directory or single file to search (defaults to current directory)
    #[arg(long, short = 'p', default_value = ".")]
    path: PathBuf,
}

#[derive(Args)]
struct ReadArgs {
    /// File location: PATH, PATH:LINE or PATH:START-END
    location: String,

    /// Lines of context
    #[arg(long, short = 'c', default_value_t = DEFAULT_CONTEXT_LINES)]
    context: usize,
}

#[derive(Args)]
struct WatchArgs {
    /// Project directory to watch (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Seconds of quiet after the last change before re-indexing
    #[arg(long)]
    debounce: Option<f64>,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper internals are noise unless debugging
    if !cli.verbose {
        builder.filter_module("hyper", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let data_root = paths::data_root()?;
    let config = GreppyConfig::load(&data_root)?;
    let ctx = Context {
        data_root,
        config,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Index(args) => run_index(&ctx, args).await,
        Commands::Search(args) => run_search(&ctx, args).await,
        Commands::Exact(args) => run_exact(&ctx, args).await,
        Commands::Read(args) => run_read(args).await,
        Commands::Watch(args) => run_watch(&ctx, args).await,
        Commands::Status(args) => run_status(&ctx, args).await,
        Commands::Clear(args) => run_clear(&ctx, args).await,
    }
}

struct Context {
    data_root: PathBuf,
    config: GreppyConfig,
    quiet: bool,
}

impl Context {
    fn project(&self, path: &Path) -> Result<ProjectPaths> {
        ProjectPaths::resolve_in(&self.data_root, path)
            .with_context(|| format!("Invalid project path {}", path.display()))
    }

    fn indexer(&self, path: &Path) -> Result<ProjectIndexer> {
        let embedder = create_embedder(&self.config.embedding)?;
        Ok(ProjectIndexer::new(
            self.project(path)?,
            embedder,
            self.config.indexer_config(),
        )?)
    }

    /// Progress line on stderr
    fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", style(message).blue());
        }
    }

    fn hint(&self, command: &str) {
        eprintln!("Run: {}", style(command).cyan());
    }

    fn spinner(&self) -> ProgressBar {
        if self.quiet || !console::Term::stderr().is_term() {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(template);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

async fn run_index(ctx: &Context, args: IndexArgs) -> Result<()> {
    let indexer = ctx.indexer(&args.path)?;
    let root = indexer.root().display().to_string();
    if args.force {
        ctx.note(&format!("Full reindex of {root}..."));
    } else {
        ctx.note(&format!("Indexing {root}..."));
    }

    let spinner = ctx.spinner();
    let mut states = indexer.subscribe_state();
    let ticker = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                spinner.set_message(format!("{state}..."));
            }
        })
    };
    let result = indexer.index_with_mode(args.force).await;
    ticker.abort();
    spinner.finish_and_clear();

    let stats = match result {
        Ok(stats) => stats,
        Err(err @ IndexerError::IndexCorrupt(_)) => {
            ctx.hint(&format!("greppy index --force {}", args.path.display()));
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let mut lines = vec![output::index_summary(&stats)];
    lines.extend(output::skipped_summary(&stats));
    print_stdout(&lines)
}

async fn run_search(ctx: &Context, args: SearchArgs) -> Result<()> {
    let project = ctx.project(&args.path)?;
    let embedder = create_embedder(&ctx.config.embedding)?;
    let ranker = match SearchRanker::open(&project, embedder, ctx.config.fusion()).await {
        Ok(ranker) => ranker,
        Err(SearchError::NotIndexed(_)) => {
            eprintln!("{}", style("Codebase not indexed.").yellow());
            ctx.hint(&format!("greppy index {}", args.path.display()));
            bail!("project not indexed: {}", project.root.display());
        }
        Err(err) => return Err(err.into()),
    };

    let results = ranker.search(&args.query, args.limit).await?;
    if results.is_empty() {
        return print_line(output::NO_RESULTS);
    }
    print_stdout(&output::search_results(&results))
}

async fn run_exact(ctx: &Context, args: ExactArgs) -> Result<()> {
    let matcher = matcher_for(ctx.config.search.exact_engine);
    log::debug!("Exact search with {} matcher", matcher.name());
    let query = ExactQuery::new(args.pattern, args.path)
        .case_insensitive(args.ignore_case)
        .max_results(args.limit);

    let results = tokio::task::spawn_blocking(move || matcher.find(&query))
        .await
        .context("exact search task panicked")??;
    if results.is_empty() {
        return print_line(output::NO_MATCHES);
    }
    print_stdout(&output::exact_results(&results))
}

async fn run_read(args: ReadArgs) -> Result<()> {
    let locator = Locator::parse(&args.location);
    let window = read(&locator.path, locator.selection, args.context).await?;
    print_stdout(&output::read_window(&window))
}

async fn run_watch(ctx: &Context, args: WatchArgs) -> Result<()> {
    let debounce = match args.debounce {
        Some(secs) => check_debounce(secs)?,
        None => ctx.config.debounce()?,
    };

    let indexer = Arc::new(ctx.indexer(&args.path)?);
    ctx.note(&format!("Indexing {}...", indexer.root().display()));
    let stats = indexer.index().await?;
    print_line(output::index_summary(&stats))?;

    let watcher = StreamingIndexer::start(
        Arc::clone(&indexer),
        StreamingIndexerConfig {
            debounce,
            ..StreamingIndexerConfig::default()
        },
    )?;
    let mut updates = watcher.subscribe_updates();
    ctx.note(&format!(
        "Watching {} (debounce {:.1}s), Ctrl-C to stop",
        indexer.root().display(),
        debounce.as_secs_f64()
    ));

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => print_line(output::watch_update(&update))?,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {skipped} watcher updates");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    ctx.note("Stopping watcher...");
    watcher.stop().await;
    Ok(())
}

async fn run_status(ctx: &Context, args: ProjectArgs) -> Result<()> {
    let indexer = ctx.indexer(&args.path)?;
    let project = indexer.paths();
    let store = match indexer.load_store().await {
        Ok(store) => store,
        Err(err) => {
            print_stdout(&[
                format!("Index unreadable: {err}"),
                format!("  Project: {}", project.root.display()),
            ])?;
            ctx.hint(&format!("greppy index --force {}", args.path.display()));
            return Ok(());
        }
    };

    let Some(store) = store else {
        print_stdout(&[
            "No index found".to_string(),
            format!("  Project: {}", project.root.display()),
        ])?;
        ctx.hint(&format!("greppy index {}", args.path.display()));
        return Ok(());
    };

    let meta = store.meta();
    let pending = match indexer.pending_changes().await {
        Ok(changes) => output::pending_summary(&changes),
        Err(err) => format!("Pending: unknown ({err})"),
    };
    print_stdout(&[
        "Index exists".to_string(),
        format!("  Project: {}", project.root.display()),
        format!("  Id: {}", project.id),
        format!("  Files: {}", store.file_count()),
        format!("  Chunks: {}", store.len()),
        format!("  Model: {} ({} dims)", meta.model_id, meta.dimension),
        format!("  {pending}"),
    ])
}

async fn run_clear(ctx: &Context, args: ProjectArgs) -> Result<()> {
    let project = ctx.project(&args.path)?;
    match tokio::fs::remove_dir_all(&project.dir).await {
        Ok(()) => print_line(format!("Index cleared for {}", project.root.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            print_line(format!("No index found for {}", project.root.display()))
        }
        Err(e) => Err(e).with_context(|| format!("Cannot remove {}", project.dir.display())),
    }
}
