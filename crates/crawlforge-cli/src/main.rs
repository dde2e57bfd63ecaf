//! Command-line entrypoint: loads a config document, wires the event
//! bus with an Extraction Engine and Output Binder, then runs one
//! Crawler per configured seed and prints the exit summary.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use crawlforge_browser::{BrowserPool, BrowserPoolConfig};
use crawlforge_config::{load_config_file, materialize_crawler_config, materialize_fetch_config, ConfigDocument};
use crawlforge_events::{EventBus, Priority};
use crawlforge_extraction::{ExtractionEngine, SubPagePolicy};
use crawlforge_fetch::FetchEngine;
use crawlforge_output::{CsvSink, DatabaseSink, Orientation, OutputBinder, Sink, TxtSink};
use crawlforge_proxy::{HttpProxySource, ProxyPool, ProxyValidationConfig};
use crawlforge_spider::Crawler;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crawlforge", about = "Configuration-driven web crawler")]
struct Args {
    /// Path to the crawl configuration JSON file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let doc = load_config_file(&args.config)?;

    let events = Arc::new(EventBus::new());
    events.start().await;

    let proxy_pool = build_proxy_pool(&doc).await?;
    let browser_pool = build_browser_pool(&doc);

    let sub_pages_only: HashSet<String> = doc
        .seeds
        .iter()
        .filter(|s| s.only_scrape_sub_pages)
        .map(|s| s.url.to_string())
        .collect();
    let extraction_engine = Arc::new(ExtractionEngine::new(
        doc.elements.clone(),
        SubPagePolicy::new(sub_pages_only),
        events.clone(),
    ));
    events
        .add_listener("new_responses", extraction_engine, Priority::Normal)
        .await;

    let sink = build_sink(&doc)?;
    let output_binder = Arc::new(OutputBinder::new(&doc.elements, doc.data_order.clone(), sink));
    events
        .add_listener("scraped_data", output_binder, Priority::Normal)
        .await;

    for seed in &doc.seeds {
        let fetch_config = materialize_fetch_config(seed, doc.requirements.clone(), doc.user_agent.clone());
        let fetch_engine = Arc::new(FetchEngine::new(
            fetch_config,
            if seed.use_proxies { proxy_pool.clone() } else { None },
            if seed.render_pages { browser_pool.clone() } else { None },
            events.clone(),
        )?);

        let crawler_config = materialize_crawler_config(seed, doc.user_agent.clone());
        let crawler = Crawler::new(crawler_config, fetch_engine);
        info!(%crawler, "starting crawl");

        let summary = crawler.run().await;
        info!(
            visited = summary.visited,
            to_visit_residue = summary.to_visit_residue,
            link_build_attempts = summary.total_link_build_attempts,
            errors = summary.total_errors,
            url = %seed.url,
            "crawl finished"
        );
        println!(
            "{}: visited={} residue={} link_attempts={} errors={}",
            seed.url, summary.visited, summary.to_visit_residue, summary.total_link_build_attempts, summary.total_errors
        );
    }

    if let Some(pool) = &browser_pool {
        if let Err(e) = pool.shutdown().await {
            error!(error = %e, "browser pool failed to shut down cleanly");
        }
    }
    events.close().await;

    Ok(())
}

async fn build_proxy_pool(doc: &ConfigDocument) -> anyhow::Result<Option<ProxyPool>> {
    if !doc.seeds.iter().any(|s| s.use_proxies) {
        return Ok(None);
    }
    let provider_url = doc
        .proxy_provider_url
        .clone()
        .expect("validated at config load time");
    let source = HttpProxySource::new(provider_url);
    let pool = ProxyPool::load(&source, 50, ProxyValidationConfig::default()).await?;
    info!(proxies = pool.len(), "proxy pool loaded");
    Ok(Some(pool))
}

fn build_browser_pool(doc: &ConfigDocument) -> Option<Arc<BrowserPool>> {
    if !doc.seeds.iter().any(|s| s.render_pages) {
        return None;
    }
    Some(Arc::new(BrowserPool::new(BrowserPoolConfig::default())))
}

/// Picks the configured sink. `csv` is the only sink with a real
/// implementation right now; `txt`/`database` are accepted in config
/// but fail at write time with a clear "not yet implemented" error.
fn build_sink(doc: &ConfigDocument) -> anyhow::Result<Box<dyn Sink>> {
    if let Some(csv) = &doc.data_saving.csv {
        let orientation = Orientation::parse(&csv.orientation)?;
        let mut sink = CsvSink::new(csv.file_path.clone(), orientation);
        if csv.truncate_on_setup {
            sink.truncate()?;
        }
        return Ok(Box::new(sink));
    }
    if doc.data_saving.txt_enabled {
        return Ok(Box::new(TxtSink));
    }
    if doc.data_saving.database_enabled {
        return Ok(Box::new(DatabaseSink));
    }
    Ok(Box::new(CsvSink::new("output.csv", Orientation::Horizontal)))
}
