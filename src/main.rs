//! Linkscour main entry point
//!
//! This is the command-line interface for the Linkscour broken-link finder.

use clap::Parser;
use linkscour::checker::CheckEvent;
use linkscour::config::load_options;
use linkscour::{CheckOptions, HtmlUrlChecker, SiteChecker};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Linkscour: a broken-link finder
///
/// Linkscour fetches a page, extracts its links and reports which of them
/// are broken. With --recursive it crawls the whole site, following
/// internal links while honoring robots exclusions.
#[derive(Parser, Debug)]
#[command(name = "linkscour")]
#[command(version)]
#[command(about = "Find broken links on a page or site", long_about = None)]
struct Cli {
    /// URL of the page (or site root, with --recursive) to check
    #[arg(value_name = "URL")]
    url: Url,

    /// Crawl the whole site instead of a single page
    #[arg(short, long)]
    recursive: bool,

    /// Path to a TOML options file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Report excluded links as well
    #[arg(long)]
    show_excluded: bool,

    /// Use GET instead of the configured request method
    #[arg(long)]
    get: bool,

    /// Override the tag filter level (0-3)
    #[arg(long, value_name = "LEVEL")]
    filter_level: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut options = match &cli.config {
        Some(path) => {
            tracing::info!("Loading options from: {}", path.display());
            load_options(path)?
        }
        None => CheckOptions::default(),
    };
    if cli.get {
        options.request_method = linkscour::RequestMethod::Get;
    }
    if let Some(level) = cli.filter_level {
        options.filter_level = level.min(3);
    }

    let broken = if cli.recursive {
        run_site(options, cli.url, cli.quiet, cli.show_excluded).await?
    } else {
        run_page(options, cli.url, cli.quiet, cli.show_excluded).await?
    };

    if broken > 0 {
        if !cli.quiet {
            println!("\n{} broken link(s) found", broken);
        }
        std::process::exit(1);
    }
    if !cli.quiet {
        println!("\nNo broken links found");
    }
    Ok(())
}

async fn run_page(
    options: CheckOptions,
    url: Url,
    quiet: bool,
    show_excluded: bool,
) -> anyhow::Result<u64> {
    let (checker, mut events) = HtmlUrlChecker::with_channel(options)?;
    checker.enqueue_page(url, None);

    let mut broken = 0;
    while let Some(event) = events.recv().await {
        match event {
            CheckEvent::End => break,
            other => broken += report(other, quiet, show_excluded),
        }
    }
    Ok(broken)
}

async fn run_site(
    options: CheckOptions,
    url: Url,
    quiet: bool,
    show_excluded: bool,
) -> anyhow::Result<u64> {
    let (checker, mut events) = SiteChecker::with_channel(options)?;
    checker.enqueue_site(url, None);

    let mut broken = 0;
    while let Some(event) = events.recv().await {
        match event {
            CheckEvent::End => break,
            other => broken += report(other, quiet, show_excluded),
        }
    }
    Ok(broken)
}

/// Prints one event and returns how many broken links it carried
fn report(event: CheckEvent, quiet: bool, show_excluded: bool) -> u64 {
    match event {
        CheckEvent::Link { link, .. } => {
            let url = link
                .rebased_url
                .as_ref()
                .map(Url::as_str)
                .or(link.original_url.as_deref())
                .unwrap_or("(unresolvable)");
            if link.is_broken() == Some(true) {
                let reason = link.broken_reason().unwrap_or_default();
                println!("BROKEN  {}  ({})", url, reason);
                1
            } else {
                if !quiet {
                    println!("ok      {}", url);
                }
                0
            }
        }
        CheckEvent::Junk { link, .. } => {
            if show_excluded {
                let url = link
                    .rebased_url
                    .as_ref()
                    .map(Url::as_str)
                    .or(link.original_url.as_deref())
                    .unwrap_or("(unresolvable)");
                let reason = link.excluded_reason().unwrap_or("");
                println!("skip    {}  ({})", url, reason);
            }
            0
        }
        CheckEvent::Page { url, error, .. } => {
            match error {
                Some(error) => println!("PAGE FAILED  {}  ({})", url, error),
                None => {
                    if !quiet {
                        println!("page    {}", url);
                    }
                }
            }
            0
        }
        CheckEvent::Site { url, error, .. } => {
            if let Some(error) = error {
                println!("SITE INCOMPLETE  {}  ({})", url, error);
            }
            0
        }
        CheckEvent::Document { .. } | CheckEvent::End => 0,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkscour=warn"),
            1 => EnvFilter::new("linkscour=info,warn"),
            2 => EnvFilter::new("linkscour=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
