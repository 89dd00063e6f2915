//! Quality-control gate: dedup, completeness/structural validation and
//! price-outlier detection over a finished batch of records. The median/MAD
//! modified-Z-score arithmetic runs over a plain sorted `Vec<f64>` — one
//! statistic doesn't warrant pulling in a numeric-array dependency.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use harvester_core::{ErrorKind, ErrorRecord, ProductRecord};
use harvester_normalize::normalize_text;

static SKU_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9\- ]+$").unwrap());

#[derive(Debug, Clone)]
pub struct QcConfig {
    pub key_fields: Vec<String>,
    pub required_fields: Vec<String>,
    pub outlier_field: String,
    pub z_threshold: f64,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            key_fields: vec!["Name".to_string(), "SKU".to_string()],
            required_fields: vec![
                "Name".to_string(),
                "SKU".to_string(),
                "PriceInclVAT.value".to_string(),
                "ProductURL".to_string(),
            ],
            outlier_field: "PriceInclVAT.value".to_string(),
            z_threshold: 3.5,
        }
    }
}

#[derive(Debug, Default)]
pub struct QcReport {
    pub valid: Vec<ProductRecord>,
    pub errors: HashMap<String, Vec<ErrorRecord>>,
}

fn field(record: &ProductRecord, name: &str) -> String {
    record
        .columns()
        .into_iter()
        .find(|(col, _)| *col == name)
        .map(|(_, v)| v.to_string())
        .unwrap_or_default()
}

fn subject_key(record: &ProductRecord, idx: usize) -> String {
    if !record.sku.is_empty() {
        record.sku.clone()
    } else if !record.product_url.is_empty() {
        record.product_url.clone()
    } else {
        format!("idx_{idx}")
    }
}

fn dedup_key(record: &ProductRecord, key_fields: &[String]) -> String {
    key_fields.iter().map(|f| normalize_text(&field(record, f))).collect::<Vec<_>>().join("\u{1f}")
}

fn validate_structural(record: &ProductRecord, required_fields: &[String]) -> Vec<String> {
    let mut errors = Vec::new();

    for required in required_fields {
        if field(record, required).trim().is_empty() {
            errors.push(format!("Missing: {required}"));
        }
    }

    match record.price_incl_vat.value.replace(',', ".").parse::<f64>() {
        Ok(v) if v > 0.0 => {}
        Ok(_) => errors.push("Price must be positive".to_string()),
        Err(_) => errors.push("Price is not a number".to_string()),
    }

    if !record.sku.is_empty() && !SKU_RE.is_match(&record.sku) {
        errors.push("SKU may have invalid characters".to_string());
    }

    if record.image_url.is_empty() || record.image_url.ends_with("placeholder.png") {
        errors.push("Missing or placeholder product image".to_string());
    }

    if record.category_parent.is_empty() && record.category_sub.is_empty() {
        errors.push("Missing category".to_string());
    }

    if !record.product_url.is_empty() && !record.product_url.starts_with("http") {
        errors.push("Invalid product URL".to_string());
    }

    if !record.name.is_empty() && record.name.len() < 3 {
        errors.push("Suspiciously short product name".to_string());
    }

    errors
}

/// Median and median-absolute-deviation modified Z-score outlier pass.
/// Returns indices (into `records`) flagged as outliers on `field_name`.
/// Produces nothing when fewer than 3 values parse, or when MAD is zero.
fn detect_outliers(records: &[ProductRecord], field_name: &str, z_threshold: f64) -> Vec<(usize, f64)> {
    let mut values: Vec<(usize, f64)> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        if let Ok(v) = field(record, field_name).replace(',', ".").parse::<f64>() {
            values.push((idx, v));
        }
    }
    if values.len() < 3 {
        return Vec::new();
    }

    let mut sorted: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    let median = median_of(&mut sorted);

    let mut abs_dev: Vec<f64> = values.iter().map(|(_, v)| (v - median).abs()).collect();
    let mad = median_of(&mut abs_dev);
    if mad == 0.0 {
        return Vec::new();
    }

    values
        .into_iter()
        .filter(|(_, v)| (0.6745 * (v - median) / mad).abs() > z_threshold)
        .collect()
}

fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Run the full gate: dedup (first occurrence wins) -> completeness +
/// structural validation -> price outlier detection. QC never mutates the
/// records it's given; `valid` and the error bucket are built fresh.
pub fn run_qc(records: &[ProductRecord], cfg: &QcConfig) -> QcReport {
    let mut seen_keys = std::collections::HashSet::new();
    let deduped: Vec<&ProductRecord> = records
        .iter()
        .filter(|r| seen_keys.insert(dedup_key(r, &cfg.key_fields)))
        .collect();

    let mut valid = Vec::new();
    let mut errors: HashMap<String, Vec<ErrorRecord>> = HashMap::new();

    for (idx, record) in deduped.iter().enumerate() {
        let key = subject_key(record, idx);
        let violations = validate_structural(record, &cfg.required_fields);
        if violations.is_empty() {
            valid.push((*record).clone());
        } else {
            let bucket = errors.entry(key.clone()).or_default();
            for detail in violations {
                let kind = classify_violation(&detail);
                bucket.push(ErrorRecord { error_kind: kind, subject_key: key.clone(), detail });
            }
        }
    }

    let owned_deduped: Vec<ProductRecord> = deduped.into_iter().cloned().collect();
    for (idx, value) in detect_outliers(&owned_deduped, &cfg.outlier_field, cfg.z_threshold) {
        let key = subject_key(&owned_deduped[idx], idx);
        errors.entry(key.clone()).or_default().push(ErrorRecord {
            error_kind: ErrorKind::PriceOutlier,
            subject_key: key,
            detail: format!("{} outlier: {value}", cfg.outlier_field),
        });
    }

    QcReport { valid, errors }
}

fn classify_violation(detail: &str) -> ErrorKind {
    if detail.starts_with("Missing:") {
        ErrorKind::MissingField
    } else if detail.contains("Price") {
        ErrorKind::InvalidPrice
    } else if detail.contains("SKU") {
        ErrorKind::InvalidSku
    } else if detail.contains("image") {
        ErrorKind::InvalidImage
    } else if detail.contains("URL") {
        ErrorKind::InvalidUrl
    } else if detail.contains("name") {
        ErrorKind::ShortName
    } else if detail.contains("category") {
        ErrorKind::MissingCategory
    } else {
        ErrorKind::MissingField
    }
}
