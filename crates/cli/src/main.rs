use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use articulo_core::{AutomationPolicy, BrowserSettings, FetchConfig, PipelineConfig, parse_article};
use clap::Parser;
use owo_colors::OwoColorize;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for extracted articles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: html, json", s)),
        }
    }
}

/// Extract readable article content from a URL, preserving video and
/// social-post embeds
#[derive(Parser, Debug)]
#[command(name = "articulo")]
#[command(author = "Articulo Contributors")]
#[command(version = VERSION)]
#[command(about = "Extract article content from web pages, embeds included", long_about = None)]
struct Args {
    /// URL of the article to extract
    #[arg(value_name = "URL")]
    url: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (html, json)
    #[arg(short, long, default_value = "html", value_name = "FORMAT")]
    format: OutputFormat,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Disable browser-automation escalation (restricted environments)
    #[arg(long)]
    no_browser: bool,

    /// Use shorter timeouts suited to constrained environments
    #[arg(long)]
    constrained: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Print a styled banner for verbose mode
fn print_banner() {
    eprintln!("\n{} {} {}", "Articulo".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Extract article content from web pages, embeds included".dimmed());
    eprintln!();
}

/// Print a styled step message
fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

fn pipeline_config(args: &Args) -> PipelineConfig {
    let mut fetch = FetchConfig { timeout: args.timeout, ..Default::default() };
    if let Some(user_agent) = &args.user_agent {
        fetch.user_agent = user_agent.clone();
    }

    let automation = if args.no_browser { AutomationPolicy::Disabled } else { AutomationPolicy::Auto };
    let browser = if args.constrained { BrowserSettings::constrained() } else { BrowserSettings::default() };

    PipelineConfig { fetch, automation, browser }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("articulo_core=debug")),
            )
            .with_writer(std::io::stderr)
            .init();
        print_banner();
    }

    let config = pipeline_config(&args);

    if args.verbose {
        print_step(1, 2, &format!("Fetching and extracting {}", args.url));
    }

    let article = parse_article(&args.url, &config)
        .await
        .with_context(|| format!("Failed to extract article from {}", args.url))?;

    if args.verbose {
        print_step(2, 2, "Formatting output");
    }

    let rendered = match args.format {
        OutputFormat::Html => article.content.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(&article).context("Failed to serialize article")?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("Failed to write output to {}", path.display()))?;
            if args.verbose {
                print_success(&format!("Wrote {}", path.display()));
            }
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
