//! Reposum Engine - Content prioritization for repository summaries
//!
//! Given a repository listing and a token budget, this crate decides which
//! files are worth showing a language model, reduces each one to its most
//! informative parts, and assembles a single context blob that never exceeds
//! the budget. It covers:
//!
//! - Rule-ordered file classification (README, manifests, entry points, ...)
//! - Heuristic entry-point scoring
//! - Dependency extraction from package manifests
//! - Signature extraction from source files
//! - Section-aware README truncation
//! - Proportional token budget allocation
//! - Technology facts computed without the model
//!
//! # Example
//!
//! ```rust,ignore
//! use reposum_engine::{Engine, EngineConfig, FetchedContent, FileEntry, RepositoryTree};
//! use std::collections::BTreeMap;
//!
//! let tree = RepositoryTree::new("demo").with_entry(FileEntry::new("README.md", 120));
//! let engine = Engine::new(EngineConfig::default())?;
//! let plan = engine.plan(&tree)?;
//!
//! let mut contents = BTreeMap::new();
//! contents.insert("README.md".to_owned(), FetchedContent::Text("# Demo".to_owned()));
//! let output = engine.pack(&plan, &contents);
//! println!("{}", output.context.blob);
//! ```

pub mod assemble;
pub mod budget;
pub mod classifier;
pub mod config;
pub mod extract;
pub mod facts;
pub mod pipeline;
pub mod scoring;
pub mod tokenizer;
pub mod types;

pub use assemble::{render_facts, Assembly, ContextAssembler};
pub use budget::BudgetAllocator;
pub use classifier::FileClassifier;
pub use config::{ConfigError, EngineConfig, ExclusionRules, SelectionLimits, ShareTable};
pub use extract::{DependencyExtractor, DependencySet, ReadmeTruncator, SignatureExtractor};
pub use facts::{compact_layout, derive_facts};
pub use pipeline::{
    ContentLookup, DropReason, Engine, EngineError, FetchPlan, FetchedContent, FileDecision,
    Outcome, PackOutput, SelectionReport,
};
pub use scoring::EntryPointScorer;
pub use tokenizer::{
    BpeEstimator, CharRatioEstimator, EstimatorKind, TokenEstimator, TokenizerError,
};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default total token ceiling
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Default tokens held back for the prompt wrapper and response
pub const DEFAULT_RESERVED_TOKENS: u32 = 800;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_defaults_match_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.reserved_tokens, DEFAULT_RESERVED_TOKENS);
    }
}
