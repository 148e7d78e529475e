//! Per-category content reduction
//!
//! Each extractor turns fetched text into a smaller representation:
//! manifests into dependency names, sources into declarations, READMEs into
//! their useful sections. CI/CD and documentation files get a lighter
//! line-level condensing.

pub mod dependencies;
pub mod readme;
pub mod signatures;

pub use dependencies::{DependencyExtractor, DependencySet, Ecosystem, ManifestKind};
pub use readme::{ReadmeSection, ReadmeTruncator, SectionKind};
pub use signatures::{SignatureExtractor, SignatureOutput, SourceLanguage};

/// Drop blank lines and full-line comments from a CI/CD or build file
pub fn condense_config(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#') && !t.starts_with("//")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of blank lines in a documentation file
pub fn condense_docs(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines() {
        let blank = line.trim().is_empty();
        if blank && out.last().is_none_or(|prev| prev.trim().is_empty()) {
            continue;
        }
        out.push(line.trim_end());
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
