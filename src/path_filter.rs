//! Include/exclude predicate over root and ignored path prefixes.
//!
//! Pure string comparison — no filesystem access. A path is included iff it
//! lies under the configured root and not under the ignored prefix.

/// Root/ignored-path predicate applied to every candidate impacted file.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: String,
    ignored: Option<String>,
}

impl PathFilter {
    /// An empty `ignored` string is treated the same as no ignored path at
    /// all: a zero-length prefix would otherwise match every path.
    pub fn new(root: impl Into<String>, ignored: Option<String>) -> Self {
        Self {
            root: root.into(),
            ignored: ignored.filter(|p| !p.is_empty()),
        }
    }

    /// True iff `path` is under the root and not under the ignored prefix.
    pub fn includes(&self, path: &str) -> bool {
        if !is_under(path, &self.root) {
            return false;
        }
        match &self.ignored {
            Some(ignored) => !is_under(path, ignored),
            None => true,
        }
    }
}

/// Prefix containment with a directory-boundary guard.
///
/// After stripping one trailing separator from `prefix`, `path` must either
/// equal the prefix or continue with a path separator. The boundary check is
/// what keeps `/a/b/c` from matching inside the sibling `/a/b/cd`.
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = match prefix.strip_suffix(std::path::is_separator) {
        Some(stripped) => stripped,
        None => prefix,
    };

    if path.len() < prefix.len() {
        return false;
    }
    if !path.starts_with(prefix) {
        return false;
    }
    if path.len() == prefix.len() {
        return true;
    }
    path[prefix.len()..]
        .chars()
        .next()
        .is_some_and(std::path::is_separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_paths_under_root() {
        let filter = PathFilter::new("/project", None);
        assert!(filter.includes("/project/lib/x.rb"));
        assert!(filter.includes("/project/deep/nested/file.rb"));
    }

    #[test]
    fn excludes_paths_outside_root() {
        let filter = PathFilter::new("/project", None);
        assert!(!filter.includes("/other/lib/x.rb"));
        assert!(!filter.includes("/proj/lib/x.rb"));
    }

    #[test]
    fn sibling_prefix_does_not_match() {
        // /project must not swallow /project-extra
        let filter = PathFilter::new("/project", None);
        assert!(!filter.includes("/project-extra/file.x"));
        assert!(filter.includes("/project/lib/x"));
    }

    #[test]
    fn root_itself_is_included() {
        let filter = PathFilter::new("/project", None);
        assert!(filter.includes("/project"));
    }

    #[test]
    fn trailing_slash_on_root_is_stripped() {
        let filter = PathFilter::new("/project/", None);
        assert!(filter.includes("/project/lib/x.rb"));
        assert!(filter.includes("/project"));
        assert!(!filter.includes("/project-extra/file.x"));
    }

    #[test]
    fn ignored_prefix_excludes() {
        let filter = PathFilter::new("/project", Some("/project/vendor".to_string()));
        assert!(filter.includes("/project/lib/x.rb"));
        assert!(!filter.includes("/project/vendor/gem/x.rb"));
        // sibling of the ignored dir stays included
        assert!(filter.includes("/project/vendored/x.rb"));
    }

    #[test]
    fn empty_ignored_path_ignores_nothing() {
        let filter = PathFilter::new("/project", Some(String::new()));
        assert!(filter.includes("/project/lib/x.rb"));
    }

    #[test]
    fn path_shorter_than_root_is_excluded() {
        let filter = PathFilter::new("/project/lib", None);
        assert!(!filter.includes("/project"));
    }
}
