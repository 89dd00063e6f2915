//! Integration-style checks over fixed HTML fixtures: category tree ->
//! exclusion -> URL collection -> QC -> CSV export, wired together the way
//! the orchestrator wires them, but without any network I/O.

use std::collections::HashSet;

use harvester_core::{ExclusionPolicy, Measurement, ProductRecord};
use harvester_walker::{build_category_tree, collect_product_urls, resolve_category};
use url::Url;

const NAV_HTML: &str = r#"
    <nav class="edgtf-main-menu">
      <ul>
        <li><a href="/produkter/mobler/">M&ouml;bler</a>
          <ul>
            <li><a href="/produkter/mobler/bord/">Bord</a></li>
          </ul>
        </li>
        <li><a href="/produkter/container/">Container</a></li>
      </ul>
    </nav>
"#;

const CATEGORY_HTML: &str = r#"
    <div class="products">
      <a class="woocommerce-LoopProduct-link" href="/produkter/mobler/bord/alfa/">Bord Alfa</a>
      <a class="woocommerce-LoopProduct-link" href="/produkter/mobler/bord/alfa/">Bord Alfa</a>
      <a class="woocommerce-LoopProduct-link" href="/produkter/mobler/bord/beta/">Bord Beta</a>
    </div>
"#;

fn base() -> Url {
    Url::parse("https://www.table.se").unwrap()
}

/// A category whose whole subtree is excluded never contributes a category
/// node, so no URL collection task is ever scheduled for it.
#[test]
fn excluded_category_subtree_never_reaches_url_collection() {
    let exclusion = ExclusionPolicy::new(vec!["https://www.table.se/produkter/container/".to_string()]);
    let tree = build_category_tree(NAV_HTML, &base(), "/produkter/", "nav", &exclusion).unwrap();

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "M\u{f6}bler");
    assert!(tree.iter().all(|n| n.name != "Container"));
}

/// Category page dedup + exclusion + absolutization, then category
/// provenance resolved back against the tree for each discovered product.
#[test]
fn product_urls_deduped_and_stamped_with_category() {
    let exclusion = ExclusionPolicy::default();
    let tree = build_category_tree(NAV_HTML, &base(), "/produkter/", "nav", &exclusion).unwrap();
    let bord_node = tree[0].children.iter().find(|c| c.name == "Bord").unwrap();

    let urls = collect_product_urls(CATEGORY_HTML, &bord_node.url, "a.woocommerce-LoopProduct-link", &exclusion).unwrap();
    assert_eq!(urls.len(), 2);

    let names: HashSet<&str> = urls.iter().map(|u| u.path()).collect();
    assert!(names.contains("/produkter/mobler/bord/alfa/"));
    assert!(names.contains("/produkter/mobler/bord/beta/"));

    for url in &urls {
        let (parent, sub) = resolve_category(&tree, url);
        assert_eq!(parent, "M\u{f6}bler");
        assert_eq!(sub, "Bord");
    }
}

fn synthetic_record(name: &str, sku: &str, price: &str, parent: &str, sub: &str) -> ProductRecord {
    ProductRecord {
        name: name.to_string(),
        sku: sku.to_string(),
        product_url: format!("https://www.table.se/produkter/mobler/bord/{sku}/"),
        image_url: "https://www.table.se/img/p.jpg".to_string(),
        category_parent: parent.to_string(),
        category_sub: sub.to_string(),
        price_incl_vat: Measurement::new(price, "kr"),
        ..ProductRecord::default()
    }
}

/// QC gate -> CSV exporter, exercising the "sorted ascending by
/// case-insensitive Name" ordering guarantee end to end.
#[test]
fn qc_valid_records_export_sorted_by_name() {
    let records = vec![
        synthetic_record("Bord Gamma", "3", "499", "M\u{f6}bler", "Bord"),
        synthetic_record("bord alfa", "1", "199", "M\u{f6}bler", "Bord"),
        synthetic_record("Bord Beta", "2", "299", "M\u{f6}bler", "Bord"),
    ];

    let report = harvester_qc::run_qc(&records, &harvester_qc::QcConfig::default());
    assert_eq!(report.valid.len(), 3);
    assert!(report.errors.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.csv");
    harvester_export::write_records(&report.valid, &path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let alfa = content.find("bord alfa").unwrap();
    let beta = content.find("Bord Beta").unwrap();
    let gamma = content.find("Bord Gamma").unwrap();
    assert!(alfa < beta);
    assert!(beta < gamma);
}

/// A record missing its required price field is bucketed as an error, not
/// silently dropped or promoted to valid.
#[test]
fn qc_routes_incomplete_record_to_errors_bucket() {
    let mut incomplete = synthetic_record("Bord Delta", "4", "399", "M\u{f6}bler", "Bord");
    incomplete.price_incl_vat = Measurement::default();

    let report = harvester_qc::run_qc(&[incomplete], &harvester_qc::QcConfig::default());
    assert!(report.valid.is_empty());
    assert_eq!(report.errors.len(), 1);
}
