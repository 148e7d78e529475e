//! File classification by path and extension
//!
//! Classification is an ordered rule list; the first rule whose predicate
//! matches decides the category, and anything left over is a source sample.

use crate::config::EngineConfig;
use crate::facts::language_for_extension;
use crate::types::{CategorizedFile, Category, FileEntry, RepositoryTree};
use std::collections::HashSet;

/// A single `(predicate, category)` classification rule
pub struct ClassRule {
    /// Rule name (for logging and tests)
    pub name: &'static str,
    /// Category assigned when the predicate matches
    pub category: Category,
    matches: fn(&FileClassifier, &PathView<'_>) -> bool,
}

/// Classification rules in priority order
pub const CLASS_RULES: &[ClassRule] = &[
    ClassRule { name: "excluded", category: Category::Excluded, matches: is_excluded },
    ClassRule { name: "readme", category: Category::Readme, matches: is_readme },
    ClassRule { name: "manifest", category: Category::PackageConfig, matches: is_manifest },
    ClassRule {
        name: "entry-point",
        category: Category::EntryPointCandidate,
        matches: is_entry_point,
    },
    ClassRule { name: "ci-cd", category: Category::CiCdConfig, matches: is_ci_cd },
    ClassRule { name: "documentation", category: Category::Documentation, matches: is_documentation },
];

const MANIFEST_NAMES: &[&str] = &[
    "package.json",
    "composer.json",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "pipfile",
    "cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "gemfile",
    "mix.exs",
    "pubspec.yaml",
];

const ENTRY_STEMS: &[&str] = &["main", "app", "cli", "index", "__main__", "server", "run"];

/// Page extensions that can serve as a static site's entry point
const ENTRY_PAGE_EXTENSIONS: &[&str] = &["html", "htm"];

const CI_NAMES: &[&str] = &[
    ".gitlab-ci.yml",
    ".travis.yml",
    ".drone.yml",
    "jenkinsfile",
    "azure-pipelines.yml",
    "bitbucket-pipelines.yml",
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    "makefile",
    "justfile",
];

const CI_DIRS: &[&str] = &[".circleci", ".buildkite"];

const DOC_STEMS: &[&str] = &[
    "contributing",
    "changelog",
    "changes",
    "history",
    "architecture",
    "api",
    "code_of_conduct",
    "design",
];

const DOC_DIRS: &[&str] = &["docs", "doc", "documentation"];

const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt", "adoc"];

/// Lowercased views of an entry's path, computed once per classification
pub struct PathView<'a> {
    entry: &'a FileEntry,
    name: String,
    stem: String,
    extension: Option<String>,
    dirs: Vec<String>,
}

impl<'a> PathView<'a> {
    fn new(entry: &'a FileEntry) -> Self {
        Self {
            entry,
            name: entry.filename().to_ascii_lowercase(),
            stem: entry.stem().to_ascii_lowercase(),
            extension: entry.extension(),
            dirs: entry.directories().map(str::to_ascii_lowercase).collect(),
        }
    }
}

/// Path-based file classifier
pub struct FileClassifier {
    repo_name: String,
    size_ceiling: u64,
    excluded_dirs: HashSet<String>,
    excluded_suffixes: Vec<String>,
    excluded_files: HashSet<String>,
    patterns: Vec<glob::Pattern>,
}

impl FileClassifier {
    /// Create a classifier for one repository
    pub fn new(repo_name: &str, config: &EngineConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items.iter().map(|s| s.to_ascii_lowercase()).collect()
        };
        let patterns = config
            .exclude
            .patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::warn!("Ignoring invalid exclusion pattern {:?}: {}", p, e);
                    None
                },
            })
            .collect();

        Self {
            repo_name: normalize_name(repo_name),
            size_ceiling: config.size_ceiling,
            excluded_dirs: lower(&config.exclude.dirs).into_iter().collect(),
            excluded_suffixes: lower(&config.exclude.suffixes),
            excluded_files: lower(&config.exclude.file_names).into_iter().collect(),
            patterns,
        }
    }

    /// Classify a single entry (total: every entry gets exactly one category)
    pub fn classify(&self, entry: &FileEntry) -> CategorizedFile {
        let category = self
            .matching_rule(entry)
            .map(|rule| rule.category)
            .unwrap_or(Category::SourceSample);
        CategorizedFile { entry: entry.clone(), category }
    }

    /// Classify every entry of a tree, preserving listing order
    pub fn classify_tree(&self, tree: &RepositoryTree) -> Vec<CategorizedFile> {
        tree.entries.iter().map(|e| self.classify(e)).collect()
    }

    /// First rule that matches, if any
    pub fn matching_rule(&self, entry: &FileEntry) -> Option<&'static ClassRule> {
        let view = PathView::new(entry);
        CLASS_RULES.iter().find(|rule| (rule.matches)(self, &view))
    }

    /// Whether a filename stem names the repository itself
    pub fn matches_repo_name(&self, stem: &str) -> bool {
        names_match(&self.repo_name, stem)
    }
}

/// Lowercase, with `-` and spaces folded to `_`
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Compare a normalized repository name with a filename stem
pub(crate) fn names_match(normalized_repo: &str, stem: &str) -> bool {
    if normalized_repo.is_empty() {
        return false;
    }
    let stem = normalize_name(stem);
    stem == normalized_repo || stem == normalized_repo.replace('_', "")
}

fn is_excluded(c: &FileClassifier, v: &PathView<'_>) -> bool {
    v.entry.is_binary
        || v.entry.size_bytes > c.size_ceiling
        || v.dirs.iter().any(|d| c.excluded_dirs.contains(d) || is_packaging_dir(d))
        || c.excluded_files.contains(&v.name)
        || c.excluded_suffixes.iter().any(|s| v.name.ends_with(s.as_str()))
        || c.patterns.iter().any(|p| p.matches(&v.entry.path))
}

fn is_packaging_dir(dir: &str) -> bool {
    dir.ends_with(".egg-info") || dir.ends_with(".dist-info")
}

fn is_readme(_: &FileClassifier, v: &PathView<'_>) -> bool {
    v.name.starts_with("readme")
}

fn is_manifest(_: &FileClassifier, v: &PathView<'_>) -> bool {
    MANIFEST_NAMES.contains(&v.name.as_str())
        || (v.name.starts_with("requirements") && v.name.ends_with(".txt"))
        || v.name.ends_with(".csproj")
        || v.name.ends_with(".fsproj")
}

fn is_entry_point(c: &FileClassifier, v: &PathView<'_>) -> bool {
    let runnable = v.extension.as_deref().is_some_and(|ext| {
        language_for_extension(ext).is_some() || ENTRY_PAGE_EXTENSIONS.contains(&ext)
    });
    (runnable && ENTRY_STEMS.contains(&v.stem.as_str())) || c.matches_repo_name(&v.stem)
}

fn is_ci_cd(_: &FileClassifier, v: &PathView<'_>) -> bool {
    let in_workflows = v.dirs.len() >= 2 && v.dirs[0] == ".github" && v.dirs[1] == "workflows";
    in_workflows
        || v.dirs.first().is_some_and(|d| CI_DIRS.contains(&d.as_str()))
        || CI_NAMES.contains(&v.name.as_str())
        || v.name.starts_with("dockerfile")
        || v.name.ends_with(".dockerfile")
}

fn is_documentation(_: &FileClassifier, v: &PathView<'_>) -> bool {
    let doc_ext = v.extension.as_deref().is_some_and(|e| DOC_EXTENSIONS.contains(&e));
    let in_doc_dir = v.dirs.first().is_some_and(|d| DOC_DIRS.contains(&d.as_str()));
    (DOC_STEMS.contains(&v.stem.as_str()) && (doc_ext || v.extension.is_none()))
        || (in_doc_dir && doc_ext)
}
