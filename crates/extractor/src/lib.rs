//! Product page extraction: fetch one product URL, resolve every output
//! field through an ordered "robust selector" fallback chain — try each
//! selector in order, skip ones that match nothing or yield empty text, and
//! never treat a miss as an error — and normalize the result into a
//! `ProductRecord`. Cache interplay is keyed by SKU when one is found and by
//! URL otherwise.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use tokio::sync::Mutex;
use tracing::warn;
use url::Url;

use harvester_cache::FileCache;
use harvester_core::config::SelectorConfig;
use harvester_core::{CategoryNode, ExclusionPolicy, HarvestError, Measurement, ProductRecord};
use harvester_fetch::{fetch, BrowserFetcher, FetchOptions, HttpFetcher};
use harvester_normalize::{
    canonical_measurement_label, extract_only_digits, normalize_whitespace, parse_measurements, parse_price,
    parse_value_unit, strip_html,
};
use harvester_walker::resolve_category;

/// Labels that map onto a dedicated canonical field rather than `ExtraData`.
/// Matched case-insensitively against the attribute row's label cell.
/// Measurement labels (`Vikt`, `L\u{e4}ngd`, ...) are excluded the same way
/// but via `canonical_measurement_label`, since that table is shared with
/// `parse_measurements` rather than duplicated here.
const KNOWN_ATTRIBUTE_LABELS: &[(&str, &str)] = &[
    ("color", "Color"),
    ("f\u{e4}rg", "Color"),
    ("material", "Material"),
    ("serie", "Series"),
    ("series", "Series"),
];

fn select_text(document: &Html, selectors: &[String]) -> String {
    for sel_str in selectors {
        let Ok(sel) = Selector::parse(sel_str) else { continue };
        if let Some(el) = document.select(&sel).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn select_attr(document: &Html, selectors: &[String], attr: &str) -> String {
    for sel_str in selectors {
        let Ok(sel) = Selector::parse(sel_str) else { continue };
        if let Some(el) = document.select(&sel).next() {
            if let Some(val) = el.value().attr(attr) {
                let val = val.trim();
                if !val.is_empty() {
                    return val.to_string();
                }
            }
        }
    }
    String::new()
}

/// Re-serialize a parsed price as integer text when it's whole, decimal text
/// otherwise.
fn format_price(value: f64) -> String {
    if (value.fract()).abs() < f64::EPSILON {
        format!("{}", value as i64)
    } else {
        let s = format!("{value:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Parse a raw price cell into `(value, unit)`: the numeric value via
/// `parse_price` (handles thousand separators and comma decimals), the
/// trailing currency/unit text via `parse_value_unit` once the same
/// separators are stripped so the unit run sits contiguous with the number
/// (`parse_value_unit` alone doesn't tolerate a thousand-separator space).
fn price_measurement(raw: &str) -> Measurement {
    let Some(v) = parse_price(raw) else {
        return Measurement::default();
    };
    let cleaned = raw.replace([' ', '\u{a0}'], "");
    let (_, unit) = parse_value_unit(&cleaned);
    Measurement::new(format_price(v), unit)
}

/// Read the product's labeled attribute rows (the info-panel table), split
/// into attributes that don't map to a canonical field (`extra`, destined for
/// `ExtraData`) and measurement attributes that do (`measurements`, keyed by
/// the canonical label for `merge_attribute_measurements` to apply). `color`/
/// `material`/`series` rows are dropped outright — they're already sourced
/// from their own dedicated selectors.
fn extract_attribute_rows(document: &Html, row_selectors: &[String]) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut extra = BTreeMap::new();
    let mut measurements = BTreeMap::new();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    for sel_str in row_selectors {
        let Ok(row_sel) = Selector::parse(sel_str) else { continue };
        let rows: Vec<_> = document.select(&row_sel).collect();
        if rows.is_empty() {
            continue;
        }
        for row in rows {
            let label = row
                .select(&th_sel)
                .next()
                .or_else(|| row.select(&td_sel).next())
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let value = row
                .select(&td_sel)
                .last()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            if label.is_empty() || value.is_empty() {
                continue;
            }
            let is_known_field = KNOWN_ATTRIBUTE_LABELS.iter().any(|(k, _)| k.eq_ignore_ascii_case(&label));
            if is_known_field {
                continue;
            }
            if let Some(canonical) = canonical_measurement_label(&label) {
                measurements.insert(canonical.to_string(), value);
                continue;
            }
            extra.insert(label, value);
        }
        break;
    }
    (extra, measurements)
}

/// Apply a parsed `parse_measurements` map onto the measurement fields of a
/// record, returning leftover free-text (the "Mått (text)" bucket) for the
/// `Data (text)` column.
fn apply_measurements(record: &mut ProductRecord, parsed: BTreeMap<String, String>) {
    let mut lookup = parsed;
    let mut take_pair = |label: &str| -> Measurement {
        let value = lookup.remove(&format!("{label} (value)")).unwrap_or_default();
        let unit = lookup.remove(&format!("{label} (unit)")).unwrap_or_default();
        Measurement::new(value, unit)
    };

    record.length = take_pair("L\u{e4}ngd");
    record.width = take_pair("Bredd");
    record.height = take_pair("H\u{f6}jd");
    record.depth = take_pair("Djup");
    record.diameter = take_pair("Diameter");
    record.capacity = take_pair("Kapacitet");
    record.volume = take_pair("Volym");
    record.weight = take_pair("Vikt");

    if let Some(text) = lookup.remove("M\u{e5}tt (text)") {
        record.data_text = text;
    }
}

/// Fill in any measurement field still empty after `apply_measurements` from
/// the product's labeled attribute rows (`raw`, keyed by canonical label,
/// e.g. `"Vikt" -> "4 kg"`). The dedicated measurements selector wins when it
/// produced a value; the attribute table is only a fallback source for the
/// same canonical fields, never a second place those values can diverge.
fn merge_attribute_measurements(record: &mut ProductRecord, raw: &BTreeMap<String, String>) {
    fn fill(field: &mut Measurement, raw: &BTreeMap<String, String>, label: &str) {
        if field.value.is_empty() {
            if let Some(text) = raw.get(label) {
                let (value, unit) = parse_value_unit(text);
                *field = Measurement::new(value, unit);
            }
        }
    }

    fill(&mut record.length, raw, "L\u{e4}ngd");
    fill(&mut record.width, raw, "Bredd");
    fill(&mut record.height, raw, "H\u{f6}jd");
    fill(&mut record.depth, raw, "Djup");
    fill(&mut record.diameter, raw, "Diameter");
    fill(&mut record.capacity, raw, "Kapacitet");
    fill(&mut record.volume, raw, "Volym");
    fill(&mut record.weight, raw, "Vikt");
}

/// Fetch and extract one product page. Returns `Ok(None)` when the URL is
/// excluded. Network failures propagate as `HarvestError::Network`; a parse
/// failure confined to a single field never aborts the record — the field
/// is just left empty and a warning is logged.
#[allow(clippy::too_many_arguments)]
pub async fn extract_product(
    url: &Url,
    tree: Option<&[CategoryNode]>,
    selectors: &SelectorConfig,
    exclusion: &ExclusionPolicy,
    fetch_options: &FetchOptions,
    http: &HttpFetcher,
    browser: &dyn BrowserFetcher,
    html_cache: &Mutex<FileCache<String>>,
    record_cache: &Mutex<FileCache<ProductRecord>>,
) -> Result<Option<ProductRecord>, HarvestError> {
    if exclusion.is_excluded(url.as_str()) {
        return Ok(None);
    }

    let response = fetch(url, fetch_options, http, browser).await?;
    let hash = FileCache::<String>::hash_content(&response.body);

    {
        let mut cache = html_cache.lock().await;
        if let Err(e) = cache.set(url.as_str(), response.body.clone(), hash.clone()) {
            warn!(url = %url, error = %e, "failed to persist html cache entry");
        }
    }

    let document = Html::parse_document(&response.body);

    let sku_raw = select_text(&document, &selectors.sku);
    let sku = extract_only_digits(&sku_raw);
    let cache_key = if sku.is_empty() { url.as_str().to_string() } else { sku.clone() };

    {
        let cache = record_cache.lock().await;
        if let Some(cached) = cache.get(&cache_key, Some(&hash)) {
            return Ok(Some(cached));
        }
    }

    let mut record = ProductRecord {
        name: select_text(&document, &selectors.name),
        sku,
        color: select_text(&document, &selectors.color),
        material: select_text(&document, &selectors.material),
        series: select_text(&document, &selectors.series),
        ..ProductRecord::default()
    };

    record.price_excl_vat = price_measurement(&select_text(&document, &selectors.price_excl_vat));
    record.price_incl_vat = price_measurement(&select_text(&document, &selectors.price_incl_vat));

    let measurements_text = select_text(&document, &selectors.measurements);
    apply_measurements(&mut record, parse_measurements(&measurements_text));

    let description_raw = select_text(&document, &selectors.description);
    record.description = normalize_whitespace(&strip_html(&description_raw));

    record.image_url = select_attr(&document, &selectors.image_url, "src");

    let canonical_href = select_attr(&document, &selectors.canonical_url, "href");
    let canonical_url = if canonical_href.is_empty() {
        url.clone()
    } else {
        Url::parse(&canonical_href).unwrap_or_else(|_| url.clone())
    };
    record.product_url = canonical_url.to_string();

    if let Some(tree) = tree {
        let (parent, sub) = resolve_category(tree, &canonical_url);
        record.category_parent = parent;
        record.category_sub = sub;
    }

    let (extra, attribute_measurements) = extract_attribute_rows(&document, &selectors.attribute_rows);
    merge_attribute_measurements(&mut record, &attribute_measurements);
    if !extra.is_empty() {
        record.extra_data = serde_json::to_string(&extra).unwrap_or_default();
    }

    {
        let mut cache = record_cache.lock().await;
        if let Err(e) = cache.set(&cache_key, record.clone(), hash) {
            warn!(key = %cache_key, error = %e, "failed to persist record cache entry");
        }
    }

    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_price_drops_trailing_zero_decimal() {
        assert_eq!(format_price(199.0), "199");
        assert_eq!(format_price(199.5), "199.5");
        assert_eq!(format_price(199.90), "199.9");
    }

    #[test]
    fn select_text_falls_through_to_next_selector_on_miss() {
        let html = Html::parse_document("<div><span class='b'>value</span></div>");
        let selectors = vec![".a".to_string(), ".b".to_string()];
        assert_eq!(select_text(&html, &selectors), "value");
    }

    #[test]
    fn select_text_returns_empty_when_all_selectors_miss() {
        let html = Html::parse_document("<div></div>");
        let selectors = vec![".a".to_string(), ".b".to_string()];
        assert_eq!(select_text(&html, &selectors), "");
    }

    #[test]
    fn attribute_rows_skip_known_labels_and_route_measurements_separately() {
        let html = Html::parse_document(
            "<table><tr><th>Color</th><td>R\u{f6}d</td></tr><tr><th>Vikt</th><td>4 kg</td></tr><tr><th>Material</th><td>Ek</td></tr></table>",
        );
        let (extra, measurements) = extract_attribute_rows(&html, &["tr".to_string()]);
        assert!(!extra.contains_key("Color"));
        assert!(!extra.contains_key("Material"));
        assert!(!extra.contains_key("Vikt"));
        assert_eq!(measurements.get("Vikt").unwrap(), "4 kg");
    }

    #[test]
    fn attribute_rows_pack_unmapped_labels_into_extra() {
        let html = Html::parse_document("<table><tr><th>Monteringss\u{e4}tt</th><td>Flatpack</td></tr></table>");
        let (extra, measurements) = extract_attribute_rows(&html, &["tr".to_string()]);
        assert_eq!(extra.get("Monteringss\u{e4}tt").unwrap(), "Flatpack");
        assert!(measurements.is_empty());
    }

    #[test]
    fn apply_measurements_routes_leftover_text_to_data_text() {
        let mut record = ProductRecord::default();
        let parsed = parse_measurements("Vikt 4 kg, D\u{e4}ck 2 st");
        apply_measurements(&mut record, parsed);
        assert_eq!(record.weight.value, "4");
        assert_eq!(record.data_text, "Vikt 4 kg, D\u{e4}ck 2 st");
    }

    #[test]
    fn merge_attribute_measurements_only_fills_empty_fields() {
        let mut record = ProductRecord::default();
        record.length = Measurement::new("120", "cm");
        let mut raw = BTreeMap::new();
        raw.insert("L\u{e4}ngd".to_string(), "200 cm".to_string());
        raw.insert("Vikt".to_string(), "4 kg".to_string());
        merge_attribute_measurements(&mut record, &raw);
        assert_eq!(record.length.value, "120");
        assert_eq!(record.weight.value, "4");
        assert_eq!(record.weight.unit, "kg");
    }

    #[test]
    fn price_measurement_extracts_value_and_trailing_unit() {
        let m = price_measurement("1 499,00 kr");
        assert_eq!(m.value, "1499");
        assert_eq!(m.unit, "kr");
    }

    #[test]
    fn price_measurement_empty_for_unparsable_input() {
        let m = price_measurement("");
        assert_eq!(m.value, "");
        assert_eq!(m.unit, "");
    }
}
