use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use swipecrawl::decision::DecisionStrategy;
use swipecrawl::driver::cdp::CdpDriver;
use swipecrawl::scraping::{Harvester, Timings};
use swipecrawl::storage::{HttpImageFetcher, IdAllocator, RecordStore};
use swipecrawl::HarvestConfig;

struct CliArgs {
    config: Option<PathBuf>,
    url: Option<String>,
    limit: Option<u64>,
}

fn parse_args() -> CliArgs {
    let mut out = CliArgs {
        config: None,
        url: None,
        limit: None,
    };
    let mut args = std::env::args().skip(1).peekable();
    while let Some(a) = args.next() {
        match a.as_str() {
            "--config" => out.config = args.next().map(PathBuf::from),
            "--url" => out.url = args.next(),
            "--limit" => out.limit = args.next().and_then(|v| v.parse().ok()),
            other => {
                if let Some(rest) = other.strip_prefix("--config=") {
                    out.config = Some(PathBuf::from(rest));
                } else if let Some(rest) = other.strip_prefix("--url=") {
                    out.url = Some(rest.to_string());
                } else if let Some(rest) = other.strip_prefix("--limit=") {
                    out.limit = rest.parse().ok();
                }
            }
        }
    }
    out
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = parse_args();
    let config = HarvestConfig::load(args.config.as_deref())?;

    let target_url = args
        .url
        .or_else(|| config.resolve_target_url())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no target URL configured — set target_url in swipecrawl.json, SWIPECRAWL_URL, or pass --url"
            )
        })?;

    let limit = args.limit.or_else(|| config.resolve_profile_limit());
    let strategy = DecisionStrategy::from_name(
        &config.resolve_strategy_name(),
        config.resolve_like_probability(),
    )?;

    let data_dir = config.resolve_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    info!("data dir: {}", data_dir.display());

    let allocator = IdAllocator::open(data_dir.join(".last_id"))?;
    info!("resuming from last issued id {}", allocator.last_id());
    let store = RecordStore::new(data_dir.join("profiles.json"));
    let fetcher = Arc::new(HttpImageFetcher::new(data_dir.join("images"))?);

    info!("Starting harvest session → {}", target_url);
    let driver = Arc::new(CdpDriver::launch(&config, &target_url).await?);

    // The login is manual; the loop starts on operator confirmation.
    println!("Log in in the browser window, then press Enter to start harvesting...");
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;

    // Ctrl-C sets the flag; the loop honors it between iterations so the
    // allocator/store pair is never left mid-update.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt — finishing the current profile first");
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut harvester = Harvester::new(
        driver.clone(),
        fetcher,
        store,
        allocator,
        strategy,
        Timings::from_config(&config),
        interrupted,
    );

    let result = harvester.run(limit).await;

    // Teardown on every exit path, fatal errors included.
    driver.shutdown().await;

    match result {
        Ok(summary) => {
            info!(
                "session done: {} harvested, {} skipped, {} abandoned",
                summary.harvested, summary.skipped, summary.abandoned
            );
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("harvest session failed: {}", e)),
    }
}
