use clap::{Args, Parser, Subcommand};
use clip_frame_search::{
    frame_info, CollectionIndex, FrameDirectory, RankingEngine, SearchConfig,
};
use color_eyre::eyre::{Result, WrapErr};
use std::ops::Range;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "clip-frame-search",
    version,
    about = "Search video keyframes by text or by example"
)]
struct Cli {
    /// Path to the JSON search configuration.
    #[arg(short, long, default_value = "search_config.json")]
    config: PathBuf,

    /// Raise log verbosity (-v, -vv). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank keyframes against a text query. An empty query browses the collection.
    Search {
        query: String,
        /// Only show frames from this video.
        #[arg(long)]
        video: Option<String>,
        /// Override the number of candidates re-ranked by appearance.
        #[arg(long)]
        top_k: Option<usize>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Rank keyframes by similarity to an existing one.
    Similar {
        id: usize,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show where a keyframe lives and which video it belongs to.
    Info { id: usize },
}

#[derive(Args, Clone, Copy)]
struct PageArgs {
    /// Zero-based result page.
    #[arg(long, default_value_t = 0)]
    page: usize,
    #[arg(long, default_value_t = 20)]
    page_size: usize,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = SearchConfig::from_file(&cli.config)
        .wrap_err_with(|| format!("reading {}", cli.config.display()))?;
    let frames = FrameDirectory::open(&config.image_dir)?;

    match cli.command {
        Command::Info { id } => {
            let path = frames.path(id)?;
            let (video, frame) = frame_info(path)?;
            println!("id:    {id}");
            println!("video: {video}");
            println!("frame: {frame}");
            println!("path:  {}", path.display());
        }
        Command::Search {
            query,
            video,
            top_k,
            page,
        } => {
            if query.trim().is_empty() {
                let all: Vec<usize> = (0..frames.count()).collect();
                print_page(&frames, &all, page)?;
                return Ok(());
            }
            if let Some(k) = top_k {
                config.rerank_top_k = k;
            }
            let engine = load_engine(&config, &frames)?;
            let start = Instant::now();
            let results = engine.search(&query, video.as_deref())?;
            tracing::info!(elapsed = ?start.elapsed(), "search finished");
            print_page(&frames, &results, page)?;
        }
        Command::Similar { id, page } => {
            let engine = load_engine(&config, &frames)?;
            let results = engine.similar(id)?;
            print_page(&frames, &results, page)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_engine(config: &SearchConfig, frames: &FrameDirectory) -> Result<RankingEngine> {
    let start = Instant::now();
    let engine = RankingEngine::from_config(config, Box::new(frames.clone()))
        .wrap_err("loading search engine")?;
    tracing::info!(elapsed = ?start.elapsed(), "engine ready");
    Ok(engine)
}

fn print_page(frames: &FrameDirectory, results: &[usize], page: PageArgs) -> Result<()> {
    let range = page_range(results.len(), page.page, page.page_size);
    if range.is_empty() {
        println!("no results on page {} ({} total)", page.page, results.len());
        return Ok(());
    }
    println!(
        "results {}-{} of {}",
        range.start + 1,
        range.end,
        results.len()
    );
    for (rank, &id) in results[range.clone()].iter().enumerate() {
        let path = frames.path(id)?;
        let (video, frame) = frame_info(path)?;
        println!(
            "{:>5}  {id:>7}  {video}/{frame}  {}",
            range.start + rank + 1,
            path.display()
        );
    }
    Ok(())
}

/// Slice of a result list shown on zero-based `page`.
fn page_range(total: usize, page: usize, page_size: usize) -> Range<usize> {
    let start = page.saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);
    start..end
}
