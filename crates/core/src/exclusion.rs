/// Exact-prefix, case-sensitive exclusion predicate. Side-effect-free,
/// O(|prefixes|); the prefix list is load-time configuration, never glob or
/// regex.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    prefixes: Vec<String>,
}

impl ExclusionPolicy {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.prefixes.iter().any(|prefix| url.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_prefix_match() {
        let policy = ExclusionPolicy::new(vec!["https://www.table.se/produkter/container/".into()]);
        assert!(policy.is_excluded("https://www.table.se/produkter/container/box-1"));
        assert!(!policy.is_excluded("https://www.table.se/produkter/mobler/bord-1"));
    }

    #[test]
    fn case_sensitive_no_glob() {
        let policy = ExclusionPolicy::new(vec!["https://Example.com/skip/".into()]);
        assert!(!policy.is_excluded("https://example.com/skip/a"));
        assert!(policy.is_excluded("https://Example.com/skip/a"));
    }

    #[test]
    fn monotonicity_adding_prefix_never_unexcludes() {
        let before = ExclusionPolicy::new(vec!["https://x/a/".into()]);
        let after = ExclusionPolicy::new(vec!["https://x/a/".into(), "https://x/b/".into()]);
        let urls = ["https://x/a/1", "https://x/b/1", "https://x/c/1"];
        for u in urls {
            if before.is_excluded(u) {
                assert!(after.is_excluded(u));
            }
        }
    }

    #[test]
    fn empty_prefix_list_excludes_nothing() {
        let policy = ExclusionPolicy::default();
        assert!(!policy.is_excluded("https://anything/at/all"));
    }
}
