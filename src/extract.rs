//! Reference-extractor collaborator: which constant names does a file
//! mention?
//!
//! The tracker core only consumes the [`ReferenceExtractor`] trait; hosts
//! with a real parser plug their own implementation in. The bundled
//! [`RegexExtractor`] is a line-oriented scanner good enough for constant
//! conventions where referenced types are capitalized (`Foo`, `Foo::Bar`,
//! `SOME_CONST`).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

/// Extracts the ordered list of constant names a file references.
///
/// May fail (unreadable file, parse error); failure is caught by the core and
/// treated as "no references obtainable this round."
pub trait ReferenceExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<String>>;
}

/// Default extractor: regex scan for capitalized constant paths.
///
/// Skips comment lines and definition sites (a file does not "reference" the
/// constants it defines). Names are returned in first-occurrence order,
/// deduplicated.
#[derive(Debug, Default)]
pub struct RegexExtractor;

lazy_static! {
    static ref CONST_REF: Regex =
        Regex::new(r"\b[A-Z][A-Za-z0-9_]*(?:::[A-Z][A-Za-z0-9_]*)*").unwrap();
}

const DEFINITION_KEYWORDS: &[&str] = &["class ", "module ", "struct ", "enum ", "trait "];

impl ReferenceExtractor for RegexExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<String>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} for extraction", path.display()))?;
        Ok(extract_from_content(&content))
    }
}

/// Pure-content variant, split out for unit testing without disk I/O.
pub fn extract_from_content(content: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut names = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        for m in CONST_REF.find_iter(line) {
            if is_definition_site(line, m.start()) {
                continue;
            }
            let name = m.as_str();
            if seen.insert(name) {
                names.push(name.to_string());
            }
        }
    }

    names
}

/// True when the matched name is introduced by a definition keyword rather
/// than referenced.
fn is_definition_site(line: &str, start: usize) -> bool {
    let before = &line[..start];
    DEFINITION_KEYWORDS.iter().any(|kw| before.ends_with(kw))
}
