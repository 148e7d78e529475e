//! Core type definitions for reposum

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A repository listing as delivered by the fetch collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryTree {
    /// Repository name (used by entry-point heuristics)
    pub name: String,
    /// Files in listing order
    pub entries: Vec<FileEntry>,
}

impl RepositoryTree {
    /// Create a new empty tree
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: Vec::new() }
    }

    /// Append an entry, builder style
    pub fn with_entry(mut self, entry: FileEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Total size of all entries in bytes
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }

    /// Iterate over entry paths in listing order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }
}

/// A single file in the repository listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Whether the collaborator flagged the file as binary
    pub is_binary: bool,
}

impl FileEntry {
    /// Create a text entry
    pub fn new(path: impl Into<String>, size_bytes: u64) -> Self {
        Self { path: path.into(), size_bytes, is_binary: false }
    }

    /// Create a binary entry
    pub fn binary(path: impl Into<String>, size_bytes: u64) -> Self {
        Self { path: path.into(), size_bytes, is_binary: true }
    }

    /// Final path component
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// Filename up to the first dot (`main.test.ts` -> `main`)
    pub fn stem(&self) -> &str {
        let name = self.filename();
        match name.find('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// Lowercased extension after the last dot
    pub fn extension(&self) -> Option<String> {
        let name = self.filename();
        let idx = name.rfind('.')?;
        if idx == 0 {
            return None;
        }
        Some(name[idx + 1..].to_ascii_lowercase())
    }

    /// Directory components above the file
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        let mut parts: Vec<&str> = self.path.split('/').collect();
        parts.pop();
        parts.into_iter()
    }

    /// Parent directory (empty string for root files)
    pub fn parent(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    /// Number of directories above the file (root files have depth 0)
    pub fn depth(&self) -> usize {
        self.path.matches('/').count()
    }
}

/// Informational category of a file
///
/// Declaration order is the assembly order of the final context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Readme,
    PackageConfig,
    EntryPointCandidate,
    CiCdConfig,
    Documentation,
    SourceSample,
    Excluded,
}

impl Category {
    /// All categories that can carry content, in assembly order
    pub const SELECTABLE: [Category; 6] = [
        Category::Readme,
        Category::PackageConfig,
        Category::EntryPointCandidate,
        Category::CiCdConfig,
        Category::Documentation,
        Category::SourceSample,
    ];

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Readme => "readme",
            Self::PackageConfig => "package-config",
            Self::EntryPointCandidate => "entry-point",
            Self::CiCdConfig => "ci-cd",
            Self::Documentation => "documentation",
            Self::SourceSample => "source-sample",
            Self::Excluded => "excluded",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A file entry paired with its category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedFile {
    pub entry: FileEntry,
    pub category: Category,
}

impl CategorizedFile {
    /// Shorthand for the entry path
    pub fn path(&self) -> &str {
        &self.entry.path
    }
}

/// An entry-point candidate with its heuristic score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntryPoint {
    pub file: CategorizedFile,
    pub score: i32,
    pub raw_content: String,
}

/// A reduced representation of one selected file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub category: Category,
    pub path: String,
    pub text: String,
    pub estimated_tokens: u32,
}

/// Token allocation for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Total token ceiling
    pub total: u32,
    /// Tokens held back for the prompt wrapper and response
    pub reserved: u32,
    /// Tokens allocated to each present category
    pub per_category: BTreeMap<Category, u32>,
    /// Hard cap for any single file of a category
    pub per_file: BTreeMap<Category, u32>,
}

impl TokenBudget {
    /// Tokens available for content (`total - reserved`)
    pub fn available(&self) -> u32 {
        self.total.saturating_sub(self.reserved)
    }

    /// Sum of all category allocations
    pub fn allocated(&self) -> u32 {
        self.per_category.values().sum()
    }

    /// Allocation for a category (zero when absent)
    pub fn category(&self, category: Category) -> u32 {
        self.per_category.get(&category).copied().unwrap_or(0)
    }

    /// Per-file cap for a category (zero when absent)
    pub fn file_cap(&self, category: Category) -> u32 {
        self.per_file.get(&category).copied().unwrap_or(0)
    }
}

/// Technology facts computed without the language model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechFacts {
    pub languages: BTreeSet<String>,
    pub frameworks: BTreeSet<String>,
    pub tools: BTreeSet<String>,
    /// One-sentence description of the top-level layout
    pub structure: String,
    /// Compact directory listing: top-level items, then key subdirectories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout: Vec<String>,
}

impl TechFacts {
    /// Whether nothing was detected
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty() && self.frameworks.is_empty() && self.tools.is_empty()
    }
}

/// The terminal artifact handed to the summarization collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub blob: String,
    pub facts: TechFacts,
    pub total_tokens_used: u32,
}
