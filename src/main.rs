//! sitetree main entry point
//!
//! This is the command-line interface for the sitetree crawler.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sitetree::config::{self, Browser, Config};
use sitetree::crawler::crawl;
use sitetree::output::{log_statistics, write_result, OutputFormat};
use tracing_subscriber::EnvFilter;

/// sitetree: crawl a site into a tree of pages
///
/// sitetree crawls from a seed URL up to a maximum depth, records which page
/// discovered which, and prints the resulting tree with status codes, content
/// types, resources and request timing as JSON or YAML.
#[derive(Parser, Debug)]
#[command(name = "sitetree")]
#[command(version)]
#[command(about = "Crawl a website into a tree of pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed URL
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Maximum depth from the seed; -1 for unbounded
    #[arg(short = 'd', long, allow_hyphen_values = true)]
    max_depth: Option<i64>,

    /// Additional allowed domains, comma separated (`*.example.com` allowed)
    #[arg(long, value_delimiter = ',')]
    domains: Vec<String>,

    /// Record redirects as pages of their own
    #[arg(long)]
    redirects: bool,

    /// Do not record or follow links
    #[arg(long)]
    no_links: bool,

    /// Record and follow images
    #[arg(long)]
    images: bool,

    /// Record and follow scripts
    #[arg(long)]
    scripts: bool,

    /// Record and follow stylesheets
    #[arg(long)]
    styles: bool,

    /// Harvest e-mail addresses from page bodies
    #[arg(long)]
    emails: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Write the document to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// User-Agent header sent with every request
    #[arg(long)]
    user_agent: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Response body cap in bytes; 0 for unlimited
    #[arg(long)]
    max_body_size: Option<usize>,

    /// Render pages with a headless browser before parsing
    #[arg(long, value_enum)]
    browser: Option<Browser>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Applies command-line flags on top of file and environment settings
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.scan.url = url.clone();
        }
        if let Some(depth) = self.max_depth {
            config.scan.max_depth = depth;
        }
        if !self.domains.is_empty() {
            config.scan.domains = self.domains.clone();
        }
        if self.redirects {
            config.scan.redirects = true;
        }

        if self.no_links {
            config.collect.links = false;
        }
        config.collect.images |= self.images;
        config.collect.scripts |= self.scripts;
        config.collect.styles |= self.styles;
        config.collect.emails |= self.emails;

        if let Some(format) = self.output {
            config.output.format = format;
        }
        if let Some(file) = &self.file {
            config.output.file = Some(file.clone());
        }

        if let Some(agent) = &self.user_agent {
            config.client.user_agent = Some(agent.clone());
        }
        if self.insecure {
            config.client.insecure = true;
        }
        if let Some(size) = self.max_body_size {
            config.client.max_body_size = size;
        }
        if let Some(browser) = self.browser {
            config.render.browser = Some(browser);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Builds the effective configuration: defaults, file, environment, flags
fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = config::load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    config::apply_env_overrides(&mut config).context("invalid environment override")?;
    cli.apply(&mut config);
    config::validate(&config).context("invalid configuration")?;

    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so that stdout carries only the crawl document.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitetree=info,warn"),
            1 => EnvFilter::new("sitetree=debug,info"),
            2 => EnvFilter::new("sitetree=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== sitetree dry run ===\n");

    println!("Scan:");
    println!("  Seed: {}", config.scan.url);
    match config.max_depth() {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unbounded"),
    }
    println!("  Follow redirects: {}", config.scan.redirects);
    println!("  Allowed domains:");
    for pattern in config.allow_list().patterns() {
        println!("    - {}", pattern);
    }

    let kinds: Vec<String> = config.collect.kinds().iter().map(|k| k.to_string()).collect();
    println!("\nCollect: {}", kinds.join(", "));
    println!("  E-mails: {}", config.collect.emails);

    println!("\nClient:");
    println!(
        "  User agent: {}",
        config.client.user_agent.as_deref().unwrap_or("(default)")
    );
    println!("  Max body size: {}", config.client.max_body_size);
    println!("  Insecure: {}", config.client.insecure);

    println!("\nOutput:");
    println!("  Format: {}", config.output.format);
    match &config.output.file {
        Some(path) => println!("  File: {}", path.display()),
        None => println!("  File: (stdout)"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing with a partial tree");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let result = crawl(&config, stop).await.context("crawl failed")?;
    log_statistics(&result.statistics());

    write_result(&result, config.output.format, config.output.file.as_deref())
        .context("failed to write crawl document")?;

    Ok(())
}
