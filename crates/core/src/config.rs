use serde::Deserialize;

/// Top-level configuration, loaded from a TOML file and then overridden by
/// CLI flags the way `main.rs` layers `--max-workers`/`--retries`/etc. over
/// whatever the file supplied.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub fetch: FetchConfigToml,
    pub cache: CacheConfig,
    pub selectors: SelectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            fetch: FetchConfigToml::default(),
            cache: CacheConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    /// Absolute base URL of the site's navigation root (e.g. the homepage).
    pub base_url: String,
    /// Host the catalog lives on; URLs off this host are never admitted.
    pub host: String,
    /// Exact-prefix exclusion list (case-sensitive). See `exclusion`.
    pub exclusion_prefixes: Vec<String>,
    /// Path substring a category/product href must contain to be admitted
    /// into the tree (e.g. `/produkter/`).
    pub product_path_prefix: String,
    /// CSS selector for the navigation element the category tree is built
    /// from.
    pub category_nav_selector: String,
    /// CSS selector for product-detail anchors on a category page.
    pub product_anchor_selector: String,
    pub max_workers: usize,
    pub max_depth: u32,
    /// Enumerate product URLs on non-leaf category nodes too, not just
    /// leaves. Default off — matches the site's flat navigation shape.
    pub collect_non_leaf: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            host: String::new(),
            exclusion_prefixes: default_exclusion_prefixes(),
            product_path_prefix: "/produkter/".to_string(),
            category_nav_selector: "nav".to_string(),
            product_anchor_selector: "a.woocommerce-LoopProduct-link, a.product-link, li.product a".to_string(),
            max_workers: 8,
            max_depth: 12,
            collect_non_leaf: false,
        }
    }
}

/// table.se's own exclusion list, kept as the fallback default so an
/// un-configured run still behaves like the original suite.
fn default_exclusion_prefixes() -> Vec<String> {
    vec![
        "https://www.table.se/produkter/container/".to_string(),
        "https://www.table.se/produkter/teknik/".to_string(),
        "https://www.table.se/produkter/talt/".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfigToml {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub base_throttle_seconds: f64,
    pub jitter_seconds: f64,
    pub user_agents: Vec<String>,
    pub proxies: Vec<String>,
    /// Extra headers sent with every request, on top of the rotated
    /// User-Agent (e.g. `Accept-Language`). Empty by default.
    pub headers: std::collections::BTreeMap<String, String>,
    pub render_js: bool,
}

impl Default for FetchConfigToml {
    fn default() -> Self {
        Self {
            timeout_seconds: 20,
            max_retries: 2,
            base_throttle_seconds: 0.7,
            jitter_seconds: 0.3,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15".to_string(),
            ],
            proxies: Vec::new(),
            headers: std::collections::BTreeMap::new(),
            render_js: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "product_cache.json".to_string(),
        }
    }
}

/// Per-field ordered selector lists, loaded from config so the "robust
/// selector" fallback chain is data, not chained conditionals.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelectorConfig {
    pub name: Vec<String>,
    pub sku: Vec<String>,
    pub color: Vec<String>,
    pub material: Vec<String>,
    pub series: Vec<String>,
    pub price_excl_vat: Vec<String>,
    pub price_incl_vat: Vec<String>,
    pub measurements: Vec<String>,
    pub image_url: Vec<String>,
    pub description: Vec<String>,
    pub canonical_url: Vec<String>,
    /// Selectors for the product info panel's labeled attribute rows,
    /// packed into `ExtraData` when the label doesn't map to a canonical
    /// field.
    pub attribute_rows: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            name: vec!["h1.product_title".into(), "h1".into(), ".product-name".into()],
            sku: vec![".sku".into(), "[itemprop=sku]".into(), ".product_meta .sku".into()],
            color: vec![".product-color".into(), "[data-attribute=color]".into()],
            material: vec![".product-material".into(), "[data-attribute=material]".into()],
            series: vec![".product-series".into(), "[data-attribute=series]".into()],
            price_excl_vat: vec![".price-excl-vat".into(), ".price .ex-vat".into()],
            price_incl_vat: vec![
                "p.price span.woocommerce-Price-amount".into(),
                ".price .amount".into(),
                ".price".into(),
            ],
            measurements: vec![".product-measurements".into(), ".mått".into(), ".matt".into()],
            image_url: vec![
                "img.wp-post-image".into(),
                ".woocommerce-product-gallery__image img".into(),
                "img".into(),
            ],
            description: vec!["#tab-description".into(), ".woocommerce-product-details__short-description".into()],
            canonical_url: vec!["link[rel=canonical]".into()],
            attribute_rows: vec!["table.woocommerce-product-attributes tr".into(), ".product-attributes tr".into()],
        }
    }
}
