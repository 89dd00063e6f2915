mod cli;
mod orchestrator;

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use harvester_core::config::AppConfig;
use harvester_core::ExclusionPolicy;
use harvester_fetch::{fetch, FetchOptions, HttpFetcher, NullBrowserFetcher};

use crate::cli::Cli;

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run aborted");
            eprintln!("error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using built-in defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;

    // CLI flags layer over whatever the config file supplied.
    config.general.max_workers = cli.max_workers;
    config.fetch.max_retries = cli.retries;
    config.fetch.base_throttle_seconds = cli.throttle;
    config.cache.enabled = cli.cache;

    if config.general.base_url.is_empty() || config.general.host.is_empty() {
        anyhow::bail!("config is missing `general.base_url` / `general.host` — supply a site config with --config");
    }

    let base_url = Url::parse(&config.general.base_url)?;
    let exclusion = ExclusionPolicy::new(config.general.exclusion_prefixes.clone());

    let fetch_options = FetchOptions {
        timeout_seconds: config.fetch.timeout_seconds,
        max_retries: config.fetch.max_retries,
        base_throttle_seconds: config.fetch.base_throttle_seconds,
        jitter_seconds: config.fetch.jitter_seconds,
        user_agents: config.fetch.user_agents.clone(),
        proxies: config.fetch.proxies.clone(),
        headers: config.fetch.headers.clone(),
        render_js: config.fetch.render_js,
        ..FetchOptions::default()
    };
    let http = Arc::new(HttpFetcher::new(&fetch_options)?);
    let browser = NullBrowserFetcher;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested (ctrl-c), stopping new task submission");
                cancel.cancel();
            }
        });
    }
    if let Some(deadline) = cli.deadline_seconds {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(deadline)).await;
            warn!(deadline, "hard deadline reached, requesting cancellation");
            cancel.cancel();
        });
    }

    info!(base_url = %base_url, "fetching navigation root");
    let nav_response = fetch(&base_url, &fetch_options, &http, &browser).await?;
    let tree = Arc::new(harvester_walker::build_category_tree(
        &nav_response.body,
        &base_url,
        &config.general.product_path_prefix,
        &config.general.category_nav_selector,
        &exclusion,
    )?);
    info!(categories = tree.iter().flat_map(|n| n.iter()).count(), "category tree built");

    let product_urls = orchestrator::enumerate_product_urls(
        &tree,
        config.general.collect_non_leaf,
        &config.general.product_anchor_selector,
        &exclusion,
        &fetch_options,
        http.clone(),
        config.general.max_workers,
        cancel.clone(),
    )
    .await;
    info!(count = product_urls.len(), "product URLs enumerated");

    let html_cache = Arc::new(Mutex::new(load_cache::<String>(&config, &config.cache.path)));
    let record_cache_path = format!("{}.records.json", config.cache.path);
    let record_cache = Arc::new(Mutex::new(load_cache::<harvester_core::ProductRecord>(&config, &record_cache_path)));

    let selectors = Arc::new(config.selectors.clone());
    let records = orchestrator::extract_products(
        product_urls,
        tree.clone(),
        selectors,
        exclusion.clone(),
        fetch_options.clone(),
        http.clone(),
        html_cache,
        record_cache,
        config.general.max_workers,
        cancel.clone(),
    )
    .await;
    info!(count = records.len(), "product extraction complete");

    let qc_report = harvester_qc::run_qc(&records, &harvester_qc::QcConfig::default());
    info!(valid = qc_report.valid.len(), flagged = qc_report.errors.len(), "QC gate complete");

    let output_path = cli.output.clone().unwrap_or_else(|| format!("catalog_{}.csv", Utc::now().format("%Y%m%dT%H%M%SZ")));
    let written = harvester_export::write_records(&qc_report.valid, &output_path)?;
    info!(path = %written.display(), "wrote main export");

    if cli.review_export {
        let errors_path = format!("{}.errors.csv", output_path.trim_end_matches(".csv"));
        let written = harvester_export::write_errors(&qc_report.errors, &errors_path)?;
        info!(path = %written.display(), "wrote errors bucket");
    }

    Ok(())
}

/// Load a persistent content cache when `--cache` is set; otherwise hand
/// back an in-memory-only cache backed by a path that is never read or
/// written, so the rest of the pipeline doesn't need a separate "cache
/// disabled" code path.
fn load_cache<T>(config: &AppConfig, path: &str) -> harvester_cache::FileCache<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    if config.cache.enabled {
        harvester_cache::FileCache::load(path)
    } else {
        harvester_cache::FileCache::load(std::env::temp_dir().join(format!("catalog-harvester-disabled-{}.json", std::process::id())))
    }
}
