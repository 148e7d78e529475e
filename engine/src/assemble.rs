//! Context assembly
//!
//! Blocks are emitted README first, then the facts block, then manifests,
//! entry points, CI/CD, documentation and source samples. Each block is
//! headed by its path. A block that would push the running total past the
//! limit is dropped whole; the finished blob never exceeds the limit.

use crate::tokenizer::TokenEstimator;
use crate::types::{AssembledContext, Category, ExtractedContent, TechFacts};
use std::collections::BTreeSet;

/// Items listed per fact line before eliding
const MAX_FACT_ITEMS: usize = 8;

/// Assembled context plus the paths that did not fit
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub context: AssembledContext,
    /// Paths of blocks dropped for lack of budget
    pub dropped: Vec<String>,
}

/// Header line of one content block
pub fn block_header(path: &str, category: Category) -> String {
    format!("--- {} ({}) ---", path, category)
}

fn render_block(item: &ExtractedContent) -> String {
    format!("{}\n{}\n", block_header(&item.path, item.category), item.text)
}

fn fact_line(label: &str, items: &BTreeSet<String>, out: &mut String) {
    if items.is_empty() {
        return;
    }
    let shown: Vec<&str> = items.iter().take(MAX_FACT_ITEMS).map(String::as_str).collect();
    out.push_str(label);
    out.push_str(": ");
    out.push_str(&shown.join(", "));
    if items.len() > MAX_FACT_ITEMS {
        out.push_str(&format!(" (+{} more)", items.len() - MAX_FACT_ITEMS));
    }
    out.push('\n');
}

/// Render the pre-computed facts block
pub fn render_facts(facts: &TechFacts) -> String {
    let mut out = String::from("--- detected facts ---\n");
    fact_line("languages", &facts.languages, &mut out);
    fact_line("frameworks", &facts.frameworks, &mut out);
    fact_line("tools", &facts.tools, &mut out);
    if !facts.structure.is_empty() {
        out.push_str("structure: ");
        out.push_str(&facts.structure);
        out.push('\n');
    }
    if !facts.layout.is_empty() {
        out.push_str("layout:\n");
        for line in &facts.layout {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Orders blocks and enforces the hard token ceiling
pub struct ContextAssembler<'a> {
    estimator: &'a dyn TokenEstimator,
    limit: u32,
}

impl<'a> ContextAssembler<'a> {
    /// `limit` is `total - reserved`
    pub fn new(estimator: &'a dyn TokenEstimator, limit: u32) -> Self {
        Self { estimator, limit }
    }

    /// Assemble extracted content and facts into a single blob
    pub fn assemble(&self, extracted: &[ExtractedContent], facts: &TechFacts) -> Assembly {
        let mut ordered: Vec<&ExtractedContent> =
            extracted.iter().filter(|e| e.category != Category::Excluded).collect();
        ordered.sort_by_key(|e| e.category);

        let facts_block = render_facts(facts);
        let facts_at = ordered.iter().take_while(|e| e.category == Category::Readme).count();

        let mut candidates: Vec<(Option<&str>, String)> = Vec::with_capacity(ordered.len() + 1);
        for (idx, item) in ordered.iter().enumerate() {
            if idx == facts_at {
                candidates.push((None, facts_block.clone()));
            }
            candidates.push((Some(item.path.as_str()), render_block(item)));
        }
        if facts_at == ordered.len() {
            candidates.push((None, facts_block));
        }

        let mut dropped = Vec::new();
        let mut blocks: Vec<(Option<&str>, String)> = Vec::new();
        let mut running = 0u32;
        for (path, block) in candidates {
            let cost = self.estimator.estimate(&block) + u32::from(!blocks.is_empty());
            if running.saturating_add(cost) > self.limit {
                log::debug!("Dropping block {} ({} tokens): budget exhausted", path.unwrap_or("facts"), cost);
                if let Some(path) = path {
                    dropped.push(path.to_owned());
                }
                continue;
            }
            running += cost;
            blocks.push((path, block));
        }

        let mut blob = join_blocks(&blocks);
        let mut used = self.estimator.estimate(&blob);
        while used > self.limit {
            if let Some((Some(path), _)) = blocks.pop() {
                dropped.push(path.to_owned());
            }
            blob = join_blocks(&blocks);
            used = self.estimator.estimate(&blob);
        }

        Assembly {
            context: AssembledContext { blob, facts: facts.clone(), total_tokens_used: used },
            dropped,
        }
    }
}

fn join_blocks(blocks: &[(Option<&str>, String)]) -> String {
    blocks.iter().map(|(_, b)| b.as_str()).collect::<Vec<_>>().join("\n")
}
