//! Concurrency orchestrator: a two-stage worker-pool pipeline over the
//! category tree built by [`harvester_walker`]. Stage A enumerates product
//! URLs per category node; stage B fetches and extracts each one. Both
//! stages share the same bounded-pool-plus-completion-channel shape.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use harvester_cache::FileCache;
use harvester_core::config::SelectorConfig;
use harvester_core::{CategoryNode, ExclusionPolicy, ProductRecord, ProductUrl, StageProgress};
use harvester_extractor::extract_product;
use harvester_fetch::{fetch, BrowserFetcher, FetchOptions, HttpFetcher, NullBrowserFetcher};
use harvester_walker::{collect_product_urls, enumeration_targets};

/// Stage A: one enumeration task per category node worth visiting (every
/// leaf, plus non-leaf nodes too when configured), fanned in to a single
/// deduplicated set. Per-task failure is logged and does not abort the
/// stage; a category page that 404s just contributes no URLs.
pub async fn enumerate_product_urls(
    tree: &[CategoryNode],
    collect_non_leaf: bool,
    anchor_selector: &str,
    exclusion: &ExclusionPolicy,
    fetch_options: &FetchOptions,
    http: Arc<HttpFetcher>,
    max_workers: usize,
    cancel: CancellationToken,
) -> Vec<ProductUrl> {
    let targets = enumeration_targets(tree, collect_non_leaf);
    let progress = Arc::new(StageProgress::new("enumerate", targets.len()));
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<(HashSet<Url>, Vec<String>)>();
    let browser: Arc<dyn BrowserFetcher> = Arc::new(NullBrowserFetcher);

    for node in &targets {
        if cancel.is_cancelled() {
            info!("enumeration: cancellation requested, no further tasks submitted");
            break;
        }
        let permit = semaphore.clone();
        let category_url = node.url.clone();
        let category_path = node_path(tree, &node.url);
        let anchor_selector = anchor_selector.to_string();
        let exclusion = exclusion.clone();
        let fetch_options = fetch_options.clone();
        let http = http.clone();
        let browser = browser.clone();
        let tx = tx.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore closed");
            if cancel.is_cancelled() {
                progress.record(false);
                return;
            }
            let result = fetch(&category_url, &fetch_options, &http, browser.as_ref()).await;
            match result {
                Ok(response) => match collect_product_urls(&response.body, &category_url, &anchor_selector, &exclusion) {
                    Ok(urls) => {
                        progress.record(true);
                        let _ = tx.send((urls, category_path));
                    }
                    Err(e) => {
                        warn!(url = %category_url, error = %e, "enumeration: parse failed for category page");
                        progress.record(false);
                    }
                },
                Err(e) => {
                    error!(url = %category_url, error = %e, "enumeration: fetch failed for category page");
                    progress.record(false);
                }
            }
        });
    }
    drop(tx);

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    while let Some((urls, category_path)) = rx.recv().await {
        for url in urls {
            if seen.insert(url.clone()) {
                out.push(ProductUrl { url, category_path: category_path.clone() });
            }
        }
    }

    info!(found = out.len(), failed = progress.failed_count(), "enumeration stage complete");
    out
}

fn node_path(tree: &[CategoryNode], url: &Url) -> Vec<String> {
    fn search<'a>(node: &'a CategoryNode, url: &Url, path: &mut Vec<String>) -> bool {
        path.push(node.name.clone());
        if node.url == *url {
            return true;
        }
        for child in &node.children {
            if search(child, url, path) {
                return true;
            }
        }
        path.pop();
        false
    }
    for root in tree {
        let mut path = Vec::new();
        if search(root, url, &mut path) {
            return path;
        }
    }
    Vec::new()
}

/// Stage B: one extraction task per product URL, bounded the same way as
/// stage A. Fan-in dedup is keyed by `(SKU, canonical_url)` so that a
/// product reachable through two category paths is only extracted once in
/// the emitted list, regardless of how many workers raced to fetch it.
#[allow(clippy::too_many_arguments)]
pub async fn extract_products(
    product_urls: Vec<ProductUrl>,
    tree: Arc<Vec<CategoryNode>>,
    selectors: Arc<SelectorConfig>,
    exclusion: ExclusionPolicy,
    fetch_options: FetchOptions,
    http: Arc<HttpFetcher>,
    html_cache: Arc<Mutex<FileCache<String>>>,
    record_cache: Arc<Mutex<FileCache<ProductRecord>>>,
    max_workers: usize,
    cancel: CancellationToken,
) -> Vec<ProductRecord> {
    let total = product_urls.len();
    let progress = Arc::new(StageProgress::new("extract", total));
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<ProductRecord>();
    let browser: Arc<dyn BrowserFetcher> = Arc::new(NullBrowserFetcher);

    for product_url in product_urls {
        if cancel.is_cancelled() {
            info!("extraction: cancellation requested, no further tasks submitted");
            break;
        }
        let permit = semaphore.clone();
        let tree = tree.clone();
        let selectors = selectors.clone();
        let exclusion = exclusion.clone();
        let fetch_options = fetch_options.clone();
        let http = http.clone();
        let browser = browser.clone();
        let html_cache = html_cache.clone();
        let record_cache = record_cache.clone();
        let tx = tx.clone();
        let progress = progress.clone();

        tokio::spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore closed");
            let url = product_url.url;
            let result = extract_product(
                &url,
                Some(tree.as_slice()),
                &selectors,
                &exclusion,
                &fetch_options,
                &http,
                browser.as_ref(),
                &html_cache,
                &record_cache,
            )
            .await;
            match result {
                Ok(Some(record)) => {
                    progress.record(true);
                    let _ = tx.send(record);
                }
                Ok(None) => {
                    progress.record(true);
                }
                Err(e) => {
                    error!(url = %url, error = %e, "extraction: fetch/parse failed");
                    progress.record(false);
                }
            }
        });
    }
    drop(tx);

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    while let Some(record) = rx.recv().await {
        let key = (record.sku.clone(), record.product_url.clone());
        if seen.insert(key) {
            out.push(record);
        }
    }

    info!(extracted = out.len(), failed = progress.failed_count(), "extraction stage complete");
    out
}
