//! Command-line entry point: load config, wire up the strategy stack, run
//! the batch, write the output partitions.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use mapcoords::batch::{BatchRunner, LogProgress, RetryPolicy, RowProcessor};
use mapcoords::extraction::{
    BrowserAutomationScraper, ContentScraper, ExtractionStrategy, GeocodingLookup,
    PatternExtractor, RedirectResolver,
};
use mapcoords::infrastructure::config::{AppConfig, ConfigManager};
use mapcoords::infrastructure::http::{HttpClient, HttpClientConfig};
use mapcoords::infrastructure::logging::init_logging;
use mapcoords::infrastructure::sheet;
use mapcoords::orchestrator::{FanOutConfig, StrategyOrchestrator};

struct CliArgs {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    no_browser: bool,
    sequential: bool,
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <input.csv> <output.csv> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>   Config file (default: mapcoords.json)");
    eprintln!("  --no-browser      Disable the headless-browser strategy");
    eprintln!("  --sequential      Process rows one at a time");
}

fn parse_args() -> Result<CliArgs, String> {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "mapcoords".to_string());

    let mut positional = Vec::new();
    let mut config = None;
    let mut no_browser = false;
    let mut sequential = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--no-browser" => no_browser = true,
            "--sequential" => sequential = true,
            "--help" | "-h" => {
                print_usage(&program);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown option: {other}"));
            }
            other => positional.push(PathBuf::from(other)),
        }
    }

    if positional.len() != 2 {
        return Err("expected exactly two arguments: <input.csv> <output.csv>".to_string());
    }

    let output = positional.pop().ok_or("missing output path")?;
    let input = positional.pop().ok_or("missing input path")?;

    Ok(CliArgs {
        input,
        output,
        config,
        no_browser,
        sequential,
    })
}

fn build_strategies(
    config: &AppConfig,
    http: &Arc<HttpClient>,
    no_browser: bool,
) -> Vec<Arc<dyn ExtractionStrategy>> {
    let mut strategies: Vec<Arc<dyn ExtractionStrategy>> = vec![
        Arc::new(PatternExtractor::new()),
        Arc::new(RedirectResolver::new(
            Arc::clone(http),
            Duration::from_secs(config.extraction.redirect_timeout_secs),
            config.extraction.short_link_hosts.clone(),
        )),
        Arc::new(ContentScraper::new(
            Arc::clone(http),
            Duration::from_secs(config.extraction.content_timeout_secs),
        )),
        Arc::new(GeocodingLookup::new(
            Arc::clone(http),
            config.geocoding.resolve_api_key(),
            config.geocoding.endpoint.clone(),
            Duration::from_secs(config.geocoding.timeout_secs),
        )),
    ];

    if config.browser.enabled && !no_browser {
        strategies.push(Arc::new(BrowserAutomationScraper::new(
            Duration::from_secs(config.browser.page_load_timeout_secs),
            Duration::from_secs(config.browser.script_timeout_secs),
            Duration::from_secs(config.browser.settle_delay_secs),
            config.http.user_agent.clone(),
        )));
    } else {
        info!("browser strategy disabled");
    }

    strategies
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!();
            print_usage("mapcoords");
            process::exit(1);
        }
    };

    let config = ConfigManager::new(args.config.clone()).load().await?;
    init_logging(&config.logging)?;

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        "starting map-link coordinate extraction"
    );

    let batch = sheet::read_csv(&args.input).await?;

    let http = Arc::new(HttpClient::with_config(HttpClientConfig {
        user_agent: config.http.user_agent.clone(),
        timeout_seconds: config.http.timeout_seconds,
        follow_redirects: config.http.follow_redirects,
    })?);

    let strategies = build_strategies(&config, &http, args.no_browser);

    let orchestrator = Arc::new(StrategyOrchestrator::new(
        strategies,
        FanOutConfig::from(&config.extraction),
    ));
    let processor = Arc::new(RowProcessor::new(
        orchestrator,
        RetryPolicy::from(&config.extraction),
    ));

    let max_concurrent_rows = if args.sequential {
        1
    } else {
        config.extraction.max_concurrent_rows
    };

    let runner = BatchRunner::new(processor, Arc::new(LogProgress), max_concurrent_rows);
    let report = runner.run(batch.rows).await;

    sheet::write_partitions(&args.output, &batch.header, &report).await?;

    info!(
        total = report.stats.total,
        successful = report.stats.successful,
        failed = report.stats.failed,
        skipped = report.stats.skipped,
        "done"
    );

    Ok(())
}
