//! The prioritization pipeline
//!
//! A request runs in two steps. [`Engine::plan`] validates and classifies the
//! tree and picks the files worth fetching. [`Engine::pack`] takes whatever
//! content the fetch collaborator managed to obtain and produces the
//! assembled context plus a per-file selection report.

use crate::assemble::{block_header, render_facts, ContextAssembler};
use crate::budget::BudgetAllocator;
use crate::classifier::FileClassifier;
use crate::config::{ConfigError, EngineConfig};
use crate::extract::{
    condense_config, condense_docs, DependencyExtractor, DependencySet, ReadmeTruncator,
    SignatureExtractor,
};
use crate::facts::{derive_facts, language_for_extension};
use crate::scoring::{is_test_file, EntryPointScorer};
use crate::tokenizer::{truncate_to_tokens, TokenEstimator, TokenizerError};
use crate::types::{
    AssembledContext, CategorizedFile, Category, ExtractedContent, RepositoryTree, TokenBudget,
};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::BuildHasher;
use thiserror::Error;

/// Engine errors
///
/// Heuristic failures never show up here; they degrade to exclusion or
/// fallback and are recorded in the [`SelectionReport`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Insufficient input: {0}")]
    InsufficientInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

/// Content delivered by the fetch collaborator for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedContent {
    Text(String),
    Binary,
}

/// Read access to fetched content; a missing path means the fetch failed
pub trait ContentLookup {
    fn content(&self, path: &str) -> Option<&FetchedContent>;
}

impl<S: BuildHasher> ContentLookup for HashMap<String, FetchedContent, S> {
    fn content(&self, path: &str) -> Option<&FetchedContent> {
        self.get(path)
    }
}

impl ContentLookup for BTreeMap<String, FetchedContent> {
    fn content(&self, path: &str) -> Option<&FetchedContent> {
        self.get(path)
    }
}

/// Files chosen for fetching
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub repo_name: String,
    /// Every entry with its category, in listing order
    pub classified: Vec<CategorizedFile>,
    /// Files to fetch, in assembly order and rank order within a category
    pub selected: Vec<CategorizedFile>,
    /// Entries removed by classification
    pub filtered: usize,
}

impl FetchPlan {
    /// Paths to request from the fetch collaborator
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(|f| f.path())
    }
}

/// Why a planned file did not make it into the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The collaborator returned nothing for the path
    FetchFailed,
    /// The collaborator flagged the content as binary
    Binary,
    /// Fetched text is larger than the size ceiling
    Oversized,
    /// Scored below the retained entry points
    NotRetained,
    /// No category or global budget left
    BudgetExhausted,
    /// Reduction left no text within the file's cap
    NothingKept,
}

impl DropReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchFailed => "fetch failed",
            Self::Binary => "binary content",
            Self::Oversized => "over size ceiling",
            Self::NotRetained => "not retained",
            Self::BudgetExhausted => "budget exhausted",
            Self::NothingKept => "nothing kept",
        }
    }
}

/// Final state of a planned file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Included,
    Dropped(DropReason),
}

/// One planned file in the selection report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDecision {
    pub path: String,
    pub category: Category,
    /// Entry-point score, when scored
    pub score: Option<i32>,
    /// Tokens consumed by the file's block (zero when dropped)
    pub tokens: u32,
    pub outcome: Outcome,
}

/// What was included and dropped, and why
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionReport {
    pub budget: TokenBudget,
    pub decisions: Vec<FileDecision>,
    /// Entries removed by classification (not listed individually)
    pub filtered: usize,
}

impl SelectionReport {
    pub fn included(&self) -> impl Iterator<Item = &FileDecision> {
        self.decisions.iter().filter(|d| d.outcome == Outcome::Included)
    }

    pub fn dropped(&self) -> impl Iterator<Item = &FileDecision> {
        self.decisions.iter().filter(|d| d.outcome != Outcome::Included)
    }
}

/// Result of [`Engine::pack`]
#[derive(Debug, Clone, Serialize)]
pub struct PackOutput {
    pub context: AssembledContext,
    pub report: SelectionReport,
}

/// A fetched text file moving through extraction
struct Resolved<'a> {
    file: &'a CategorizedFile,
    text: Cow<'a, str>,
    score: Option<i32>,
}

/// Per-file decisions, indexed by path
struct Ledger {
    decisions: Vec<FileDecision>,
    index: HashMap<String, usize>,
}

impl Ledger {
    fn new(selected: &[CategorizedFile]) -> Self {
        let decisions = selected
            .iter()
            .map(|f| FileDecision {
                path: f.path().to_owned(),
                category: f.category,
                score: None,
                tokens: 0,
                outcome: Outcome::Included,
            })
            .collect();
        let index = selected.iter().enumerate().map(|(i, f)| (f.path().to_owned(), i)).collect();
        Self { decisions, index }
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut FileDecision> {
        let i = *self.index.get(path)?;
        self.decisions.get_mut(i)
    }

    fn drop_file(&mut self, path: &str, reason: DropReason) {
        if let Some(decision) = self.get_mut(path) {
            decision.outcome = Outcome::Dropped(reason);
            decision.tokens = 0;
        }
    }
}

/// Content prioritization and token budget engine
pub struct Engine {
    config: EngineConfig,
    estimator: Box<dyn TokenEstimator>,
}

impl Engine {
    /// Create an engine; builds the configured estimator
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let estimator = config.estimator.build()?;
        Ok(Self { config, estimator })
    }

    /// Create an engine with a caller-provided estimator
    pub fn with_estimator(
        config: EngineConfig,
        estimator: Box<dyn TokenEstimator>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config, estimator })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Classify every entry of a tree
    pub fn classify_tree(&self, tree: &RepositoryTree) -> Vec<CategorizedFile> {
        FileClassifier::new(&tree.name, &self.config).classify_tree(tree)
    }

    /// Validate and classify a tree and choose the files to fetch
    pub fn plan(&self, tree: &RepositoryTree) -> Result<FetchPlan, EngineError> {
        validate_tree(tree)?;
        let classified = self.classify_tree(tree);
        let filtered = classified.iter().filter(|f| f.category == Category::Excluded).count();

        let mut by_category: BTreeMap<Category, Vec<&CategorizedFile>> = BTreeMap::new();
        for file in classified.iter().filter(|f| f.category != Category::Excluded) {
            by_category.entry(file.category).or_default().push(file);
        }

        let limits = &self.config.selection;
        let mut selected = Vec::new();
        for (category, mut files) in by_category {
            files.sort_by(|a, b| {
                (a.entry.depth(), a.path()).cmp(&(b.entry.depth(), b.path()))
            });
            let chosen: Vec<&CategorizedFile> = match category {
                Category::SourceSample => pick_source_samples(files, limits.requested(category)),
                _ => files.into_iter().take(limits.requested(category)).collect(),
            };
            selected.extend(chosen.into_iter().cloned());
        }

        log::info!(
            "Planned {} of {} entries for {} ({} filtered)",
            selected.len(),
            tree.entries.len(),
            tree.name,
            filtered
        );
        Ok(FetchPlan { repo_name: tree.name.clone(), classified, selected, filtered })
    }

    /// Build the assembled context from fetched content
    pub fn pack(&self, plan: &FetchPlan, lookup: &dyn ContentLookup) -> PackOutput {
        let mut ledger = Ledger::new(&plan.selected);

        // resolve fetched content
        let mut resolved: Vec<Resolved<'_>> = Vec::new();
        for file in &plan.selected {
            match lookup.content(file.path()) {
                None => ledger.drop_file(file.path(), DropReason::FetchFailed),
                Some(FetchedContent::Binary) => ledger.drop_file(file.path(), DropReason::Binary),
                Some(FetchedContent::Text(text)) if text.len() as u64 > self.config.size_ceiling => {
                    ledger.drop_file(file.path(), DropReason::Oversized)
                },
                Some(FetchedContent::Text(text)) => {
                    resolved.push(Resolved { file, text: Cow::Borrowed(text.as_str()), score: None })
                },
            }
        }

        // dependencies and facts
        let extractor = DependencyExtractor::new();
        let dependencies: Vec<DependencySet> = resolved
            .iter()
            .filter(|r| r.file.category == Category::PackageConfig)
            .filter_map(|r| extractor.extract(r.file.path(), &r.text))
            .collect();
        let facts = derive_facts(&plan.classified, &dependencies);
        let facts_tokens = self.estimator.estimate(&render_facts(&facts)) + 1;

        // rank entry points and keep the best
        let (candidates, mut resolved): (Vec<_>, Vec<_>) = resolved
            .into_iter()
            .partition(|r| r.file.category == Category::EntryPointCandidate);
        let ranked = EntryPointScorer::new(&plan.repo_name).rank(
            candidates
                .into_iter()
                .map(|r| (r.file.clone(), r.text.into_owned()))
                .collect(),
        );
        for (rank, scored) in ranked.into_iter().enumerate() {
            let Some(file) = plan.selected.iter().find(|f| f.path() == scored.file.path()) else {
                continue;
            };
            if let Some(decision) = ledger.get_mut(file.path()) {
                decision.score = Some(scored.score);
            }
            if rank >= self.config.selection.max_entry_points {
                log::debug!("Entry point {} not retained (score {})", file.path(), scored.score);
                ledger.drop_file(file.path(), DropReason::NotRetained);
                continue;
            }
            resolved.push(Resolved {
                file,
                text: Cow::Owned(scored.raw_content),
                score: Some(scored.score),
            });
        }
        resolved.sort_by_key(|r| r.file.category);

        // allocate
        let mut present: BTreeMap<Category, usize> = BTreeMap::new();
        for r in &resolved {
            *present.entry(r.file.category).or_default() += 1;
        }
        let reserved = self
            .config
            .reserved_tokens
            .saturating_add(facts_tokens)
            .min(self.config.max_tokens);
        let budget = BudgetAllocator::from_config(&self.config).allocate(
            self.config.max_tokens,
            reserved,
            &present,
        );

        // extract under per-file caps, then fit each category
        let deps_by_path: HashMap<&str, &DependencySet> =
            dependencies.iter().map(|d| (d.manifest.as_str(), d)).collect();
        let mut remaining: BTreeMap<Category, u32> = budget.per_category.clone();
        let mut extracted: Vec<ExtractedContent> = Vec::new();
        for r in &resolved {
            let category = r.file.category;
            let header = block_header(r.file.path(), category);
            let cap = budget
                .file_cap(category)
                .saturating_sub(self.estimator.estimate(&header) + 1);
            let text = self.reduce(r, deps_by_path.get(r.file.path()).copied(), cap);
            if text.is_empty() {
                let reason =
                    if cap == 0 { DropReason::BudgetExhausted } else { DropReason::NothingKept };
                ledger.drop_file(r.file.path(), reason);
                continue;
            }

            let block_tokens = self.estimator.estimate(&format!("{}\n{}\n", header, text));
            let left = remaining.entry(category).or_default();
            if block_tokens > *left {
                log::debug!(
                    "{} ({}) needs {} tokens, {} left in category",
                    r.file.path(),
                    category,
                    block_tokens,
                    left
                );
                ledger.drop_file(r.file.path(), DropReason::BudgetExhausted);
                continue;
            }
            *left -= block_tokens;

            if let Some(decision) = ledger.get_mut(r.file.path()) {
                decision.tokens = block_tokens;
            }
            log::debug!(
                "Included {} ({}, score {:?}, {} tokens)",
                r.file.path(),
                category,
                r.score,
                block_tokens
            );
            extracted.push(ExtractedContent {
                category,
                path: r.file.path().to_owned(),
                estimated_tokens: self.estimator.estimate(&text),
                text,
            });
        }

        // assemble under the hard ceiling
        let limit = self.config.max_tokens.saturating_sub(self.config.reserved_tokens);
        let assembly = ContextAssembler::new(self.estimator(), limit).assemble(&extracted, &facts);
        for path in &assembly.dropped {
            ledger.drop_file(path, DropReason::BudgetExhausted);
        }

        let report =
            SelectionReport { budget, decisions: ledger.decisions, filtered: plan.filtered };
        log::info!(
            "Packed {}: {} files included, {} dropped, {}/{} tokens",
            plan.repo_name,
            report.included().count(),
            report.dropped().count(),
            assembly.context.total_tokens_used,
            limit
        );
        PackOutput { context: assembly.context, report }
    }

    /// Plan and pack in one call
    pub fn run(
        &self,
        tree: &RepositoryTree,
        lookup: &dyn ContentLookup,
    ) -> Result<PackOutput, EngineError> {
        let plan = self.plan(tree)?;
        Ok(self.pack(&plan, lookup))
    }

    /// Category-specific reduction capped at `cap` tokens
    fn reduce(&self, r: &Resolved<'_>, deps: Option<&DependencySet>, cap: u32) -> String {
        let est = self.estimator();
        let reduced = match r.file.category {
            Category::Readme => return ReadmeTruncator::new().truncate(&r.text, cap, est),
            Category::PackageConfig => match deps {
                Some(set) => set.render_within(r.text.trim().len()),
                None => condense_config(&r.text),
            },
            Category::EntryPointCandidate | Category::SourceSample => {
                SignatureExtractor::new(self.config.fallback_chars)
                    .extract(r.file.path(), &r.text)
                    .text
            },
            Category::CiCdConfig => condense_config(&r.text),
            Category::Documentation => condense_docs(&r.text),
            Category::Excluded => String::new(),
        };
        truncate_to_tokens(&reduced, cap, est).to_owned()
    }
}

fn validate_tree(tree: &RepositoryTree) -> Result<(), EngineError> {
    let fail = |message: String| {
        log::warn!("Rejecting repository tree: {}", message);
        Err(EngineError::InsufficientInput(message))
    };

    if tree.name.trim().is_empty() {
        return fail("repository name is empty".to_owned());
    }
    let mut seen = HashSet::with_capacity(tree.entries.len());
    for entry in &tree.entries {
        if entry.path.trim().is_empty() {
            return fail("entry with an empty path".to_owned());
        }
        if !seen.insert(entry.path.as_str()) {
            return fail(format!("duplicate path {}", entry.path));
        }
    }
    Ok(())
}

/// Source samples: code files only, one per directory, tests last
fn pick_source_samples(files: Vec<&CategorizedFile>, limit: usize) -> Vec<&CategorizedFile> {
    let mut code: Vec<&CategorizedFile> = files
        .into_iter()
        .filter(|f| f.entry.extension().as_deref().and_then(language_for_extension).is_some())
        .collect();
    code.sort_by_key(|f| (is_test_file(f.path()), f.entry.stem() == "__init__"));

    let mut dirs = HashSet::new();
    code.into_iter()
        .filter(|f| dirs.insert(f.entry.parent().to_owned()))
        .take(limit)
        .collect()
}
