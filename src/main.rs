use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::Context;
use banner_scraper::{
    config::{interval_from_minutes, Config, CACHE_PATH_ENV, CHROME_PATH_ENV, INTERVAL_ENV, TARGET_URL_ENV},
    scheduler::RefreshScheduler,
    service::BannerService,
    types::ScrapeResult,
};
use clap::{Parser, Subcommand};
use log::{debug, warn};
use signal_hook::consts::{SIGINT, SIGTERM};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Promotional banner scraper for embedded menus", long_about = None)]
struct Args {
    /// Page embedding the menu whose banners are scraped
    #[arg(short = 'u', long, env = TARGET_URL_ENV)]
    target_url: Option<String>,
    /// Minutes between scheduled scrapes
    #[arg(short = 'i', long, env = INTERVAL_ENV)]
    interval_minutes: Option<u64>,
    /// Location of the cached scrape result
    #[arg(short = 'c', long, env = CACHE_PATH_ENV)]
    cache_path: Option<PathBuf>,
    /// Chrome or Chromium executable
    #[arg(long, env = CHROME_PATH_ENV)]
    chrome_path: Option<PathBuf>,
    /// Retries after a failed scrape attempt
    #[arg(short = 'r', long)]
    retries: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Keep the cache fresh until interrupted
    Serve,
    /// Scrape now and print the result
    Scrape,
    /// Print the cached result, scraping first if there is none
    Cached,
}

fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(url) = args.target_url.clone().filter(|u| !u.trim().is_empty()) {
        config.target_url = Some(url.trim().to_string());
    }
    if let Some(minutes) = args.interval_minutes {
        match interval_from_minutes(minutes) {
            Some(interval) => config.interval = interval,
            None => warn!(
                "ignoring interval of {} minutes, keeping {:?}",
                minutes, config.interval
            ),
        }
    }
    if let Some(path) = args.cache_path.clone() {
        config.cache_path = path;
    }
    if let Some(path) = args.chrome_path.clone() {
        config.chrome_path = Some(path);
    }
    if let Some(retries) = args.retries {
        config.max_retries = retries;
    }
    Ok(config)
}

fn print_result(result: &ScrapeResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    if let Ok(env) = std::env::var("RUST_LOG") {
        if env == "debug" {
            println!("{number:/>width$}", number = "", width = 20);
            println!("Debug mode enabled");
            println!("{number:/>width$}", number = "", width = 20);
            println!();
        }
    }

    let config = build_config(&args)?;
    debug!("Starting with {:#?}", config);
    // a missing target is fatal for every command
    config.require_target_url()?;

    let service = BannerService::with_chrome(config).context("could not set up scraper")?;

    match args.command {
        Command::Serve => {
            let should_terminate = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
            signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

            RefreshScheduler::new(service.clone())
                .run(should_terminate)
                .await?;
            debug!("final status {:#?}", service.status());
        }
        Command::Scrape => print_result(&service.scrape().await?)?,
        Command::Cached => {
            print_result(&service.get_cached().await?)?;
            // let a stale-triggered refresh land before the runtime shuts down
            while service.status().is_running {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    Ok(())
}
