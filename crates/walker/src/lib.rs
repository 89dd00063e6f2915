//! Category tree construction and product URL collection. Pure HTML-in,
//! data-out: neither function here touches the network — the caller
//! supplies already-fetched HTML and gets back parsed structure. The actual
//! worker-pool fan-out across category pages lives in the orchestrator.

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use harvester_core::{CategoryNode, ExclusionPolicy, HarvestError};

fn direct_children<'a>(el: ElementRef<'a>, tag: &str) -> Vec<ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap).filter(|e| e.value().name() == tag).collect()
}

/// Nesting depth of `ul` elements rooted at `ul` (a lone `<ul>` with no
/// nested `<ul>` has depth 1).
fn ul_nesting_depth(ul: ElementRef<'_>) -> u32 {
    let nested: Vec<ElementRef<'_>> = direct_children(ul, "li")
        .into_iter()
        .flat_map(|li| direct_children(li, "ul"))
        .collect();
    if nested.is_empty() {
        1
    } else {
        1 + nested.iter().map(|u| ul_nesting_depth(*u)).max().unwrap_or(0)
    }
}

/// Build the category tree from a navigation page. Locates the element
/// matching `nav_selector`, then picks the most deeply nested `<ul>` beneath
/// it as the category menu's root list. Admission: an `<li><a href>` is kept
/// only if its href contains `product_path_prefix` and its resolved URL is
/// not excluded; everything else is silently skipped rather than failing the
/// whole traversal.
pub fn build_category_tree(
    html: &str,
    base_url: &Url,
    product_path_prefix: &str,
    nav_selector: &str,
    exclusion: &ExclusionPolicy,
) -> Result<Vec<CategoryNode>, HarvestError> {
    let document = Html::parse_document(html);

    let nav_sel = Selector::parse(nav_selector).map_err(|e| HarvestError::Parse(format!("bad nav selector: {e:?}")))?;
    let nav = document
        .select(&nav_sel)
        .next()
        .ok_or_else(|| HarvestError::Parse("category navigation not found".to_string()))?;

    let ul_sel = Selector::parse("ul").map_err(|e| HarvestError::Parse(format!("{e:?}")))?;
    let top_ul = nav
        .select(&ul_sel)
        .max_by_key(|ul| ul_nesting_depth(*ul))
        .ok_or_else(|| HarvestError::Parse("no list structure found under navigation".to_string()))?;

    let mut seen: HashSet<Url> = HashSet::new();
    let nodes = parse_menu_ul(top_ul, 0, base_url, product_path_prefix, exclusion, &mut seen);
    Ok(prune_excluded(nodes, exclusion))
}

fn parse_menu_ul(
    ul: ElementRef<'_>,
    depth: u32,
    base_url: &Url,
    product_path_prefix: &str,
    exclusion: &ExclusionPolicy,
    seen: &mut HashSet<Url>,
) -> Vec<CategoryNode> {
    let a_sel = Selector::parse("a[href]").unwrap();
    let mut out = Vec::new();

    for li in direct_children(ul, "li") {
        let Some(anchor) = li.select(&a_sel).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains(product_path_prefix) {
            continue;
        }
        let Ok(url) = base_url.join(href) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        if exclusion.is_excluded(url.as_str()) {
            continue;
        }

        let name = anchor.text().collect::<String>().trim().to_string();
        let mut node = CategoryNode::new(name, url, depth);

        for sub_ul in direct_children(li, "ul") {
            node.children
                .extend(parse_menu_ul(sub_ul, depth + 1, base_url, product_path_prefix, exclusion, seen));
        }

        out.push(node);
    }

    out
}

/// Drop any subtree whose root is excluded, bottom-up. Exposed separately
/// from `build_category_tree` so a tree assembled from some other source can
/// still be run through the same exclusion pass.
pub fn prune_excluded(nodes: Vec<CategoryNode>, exclusion: &ExclusionPolicy) -> Vec<CategoryNode> {
    nodes
        .into_iter()
        .filter(|n| !exclusion.is_excluded(n.url.as_str()))
        .map(|mut n| {
            n.children = prune_excluded(n.children, exclusion);
            n
        })
        .collect()
}

/// Extract all product-detail links from a category page, absolutized
/// against `category_url` and filtered by exclusion. Deduplicated via the
/// `HashSet` return type. No pagination is ever synthesized: only the
/// anchors present in this one page are considered.
pub fn collect_product_urls(
    html: &str,
    category_url: &Url,
    anchor_selector: &str,
    exclusion: &ExclusionPolicy,
) -> Result<HashSet<Url>, HarvestError> {
    let document = Html::parse_document(html);
    let sel = Selector::parse(anchor_selector).map_err(|e| HarvestError::Parse(format!("bad anchor selector: {e:?}")))?;

    let mut urls = HashSet::new();
    for anchor in document.select(&sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = category_url.join(href) else {
            warn!(href, category_url = %category_url, "could not resolve product href");
            continue;
        };
        if exclusion.is_excluded(resolved.as_str()) {
            continue;
        }
        urls.insert(resolved);
    }
    Ok(urls)
}

/// Collect every category node worth enumerating: all leaves always, plus
/// non-leaf nodes too when `collect_non_leaf` is set.
pub fn enumeration_targets(tree: &[CategoryNode], collect_non_leaf: bool) -> Vec<&CategoryNode> {
    let mut targets = Vec::new();
    for root in tree {
        for node in root.iter() {
            if collect_non_leaf || node.children.is_empty() {
                targets.push(node);
            }
        }
    }
    targets
}

/// Resolve `Category (parent)` / `Category (sub)` for a product URL by
/// finding the deepest tree node whose URL is a string-prefix of it, then
/// reporting the shortest (topmost) matching ancestor as the parent and the
/// next one down as the sub-category. Returns `("", "")` when nothing
/// matches.
pub fn resolve_category(tree: &[CategoryNode], product_url: &Url) -> (String, String) {
    let target = product_url.as_str();
    let mut best_path: Vec<&CategoryNode> = Vec::new();

    for root in tree {
        let mut path = Vec::new();
        find_deepest_prefix_path(root, target, &mut path, &mut best_path);
    }

    let parent = best_path.first().map(|n| n.name.clone()).unwrap_or_default();
    let sub = best_path.get(1).map(|n| n.name.clone()).unwrap_or_default();
    (parent, sub)
}

fn find_deepest_prefix_path<'a>(
    node: &'a CategoryNode,
    target: &str,
    path: &mut Vec<&'a CategoryNode>,
    best: &mut Vec<&'a CategoryNode>,
) {
    if !target.starts_with(node.url.as_str()) {
        return;
    }
    path.push(node);
    if path.len() > best.len() {
        *best = path.clone();
    }
    for child in &node.children {
        find_deepest_prefix_path(child, target, path, best);
    }
    path.pop();
}

/// Build a lookup from product URL to the category path it was discovered
/// under, by walking every enumeration target and joining its own ancestor
/// chain (not provided here, so callers that need eager provenance should
/// track it during the actual fetch fan-out and fall back to
/// `resolve_category` only for out-of-band lookups).
pub fn category_path_names(tree: &[CategoryNode]) -> HashMap<Url, Vec<String>> {
    let mut map = HashMap::new();
    for root in tree {
        walk_with_path(root, &mut vec![root.name.clone()], &mut map);
    }
    map
}

fn walk_with_path(node: &CategoryNode, path: &mut Vec<String>, map: &mut HashMap<Url, Vec<String>>) {
    map.insert(node.url.clone(), path.clone());
    for child in &node.children {
        path.push(child.name.clone());
        walk_with_path(child, path, map);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAV_HTML: &str = r#"
        <nav class="edgtf-main-menu">
          <ul>
            <li><a href="/produkter/mobler/">Möbler</a>
              <ul>
                <li><a href="/produkter/mobler/bord/">Bord</a></li>
                <li><a href="/produkter/mobler/stolar/">Stolar</a></li>
              </ul>
            </li>
            <li><a href="/produkter/belysning/">Belysning</a></li>
            <li><a href="/om-oss/">Om oss</a></li>
          </ul>
        </nav>
    "#;

    fn base() -> Url {
        Url::parse("https://www.table.se").unwrap()
    }

    #[test]
    fn builds_tree_and_skips_non_product_links() {
        let policy = ExclusionPolicy::default();
        let tree = build_category_tree(NAV_HTML, &base(), "/produkter/", "nav", &policy).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "M\u{f6}bler");
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].depth, 1);
    }

    #[test]
    fn excluded_subtree_is_pruned_with_descendants() {
        let policy = ExclusionPolicy::new(vec!["https://www.table.se/produkter/mobler/".to_string()]);
        let tree = build_category_tree(NAV_HTML, &base(), "/produkter/", "nav", &policy).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name, "Belysning");
    }

    #[test]
    fn missing_nav_is_a_parse_error() {
        let policy = ExclusionPolicy::default();
        let err = build_category_tree("<html><body>nothing here</body></html>", &base(), "/produkter/", "nav", &policy);
        assert!(err.is_err());
    }

    #[test]
    fn collect_product_urls_dedupes_and_absolutizes() {
        let html = r#"
            <div>
              <a class="woocommerce-LoopProduct-link" href="/produkter/mobler/bord/bord-1/">Bord 1</a>
              <a class="woocommerce-LoopProduct-link" href="/produkter/mobler/bord/bord-1/">Bord 1</a>
              <a class="woocommerce-LoopProduct-link" href="/produkter/mobler/bord/bord-2/">Bord 2</a>
            </div>
        "#;
        let category_url = Url::parse("https://www.table.se/produkter/mobler/bord/").unwrap();
        let policy = ExclusionPolicy::default();
        let urls = collect_product_urls(html, &category_url, "a.woocommerce-LoopProduct-link", &policy).unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn resolve_category_picks_topmost_and_second_level() {
        let policy = ExclusionPolicy::default();
        let tree = build_category_tree(NAV_HTML, &base(), "/produkter/", "nav", &policy).unwrap();
        let product = Url::parse("https://www.table.se/produkter/mobler/bord/bord-1/").unwrap();
        let (parent, sub) = resolve_category(&tree, &product);
        assert_eq!(parent, "M\u{f6}bler");
        assert_eq!(sub, "Bord");
    }

    #[test]
    fn resolve_category_empty_when_no_prefix_matches() {
        let tree: Vec<CategoryNode> = Vec::new();
        let product = Url::parse("https://www.table.se/produkter/x/").unwrap();
        assert_eq!(resolve_category(&tree, &product), (String::new(), String::new()));
    }
}
