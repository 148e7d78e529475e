//! Token budget allocation across content categories
//!
//! Every present category first gets its target share (`share × files ×
//! total`). When targets exceed what is available they are scaled down
//! proportionally; otherwise the residual goes to the elastic categories
//! (entry points, CI/CD, documentation, source samples) in proportion to
//! their targets, so the README and manifest caps stay fixed.

use crate::config::{EngineConfig, SelectionLimits, ShareTable};
use crate::types::{Category, TokenBudget};
use std::collections::BTreeMap;

/// Categories that absorb the residual budget
const ELASTIC: [Category; 4] = [
    Category::EntryPointCandidate,
    Category::CiCdConfig,
    Category::Documentation,
    Category::SourceSample,
];

/// Splits `total - reserved` tokens across present categories
#[derive(Debug, Clone, Copy)]
pub struct BudgetAllocator {
    shares: ShareTable,
    limits: SelectionLimits,
}

impl Default for BudgetAllocator {
    fn default() -> Self {
        Self { shares: ShareTable::default(), limits: SelectionLimits::default() }
    }
}

impl BudgetAllocator {
    pub fn new(shares: ShareTable, limits: SelectionLimits) -> Self {
        Self { shares, limits }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.shares, config.selection)
    }

    /// Allocate a budget for the given per-category file counts
    ///
    /// Counts above the category's keep limit are clamped; categories with
    /// a zero count (or `Excluded`) get nothing.
    pub fn allocate(
        &self,
        total: u32,
        reserved: u32,
        present: &BTreeMap<Category, usize>,
    ) -> TokenBudget {
        let available = u64::from(total.saturating_sub(reserved));
        let mut budget = TokenBudget { total, reserved, ..Default::default() };

        let counts: BTreeMap<Category, u64> = Category::SELECTABLE
            .iter()
            .filter_map(|&cat| {
                let n = present.get(&cat).copied().unwrap_or(0).min(self.limits.kept(cat));
                (n > 0).then_some((cat, n as u64))
            })
            .collect();
        if counts.is_empty() {
            return budget;
        }

        let demand: BTreeMap<Category, u64> = counts
            .iter()
            .map(|(&cat, &n)| (cat, u64::from(self.shares.share(cat)) * n * u64::from(total) / 1000))
            .collect();
        let total_demand: u64 = demand.values().sum();

        let mut alloc: BTreeMap<Category, u64> = if total_demand >= available {
            demand
                .iter()
                .map(|(&cat, &d)| (cat, if total_demand == 0 { 0 } else { d * available / total_demand }))
                .collect()
        } else {
            demand.clone()
        };

        let allocated: u64 = alloc.values().sum();
        let residual = available.saturating_sub(allocated);
        if residual > 0 {
            distribute_residual(&mut alloc, &demand, residual);
        }

        for (&cat, &tokens) in &alloc {
            let tokens = u32::try_from(tokens).unwrap_or(u32::MAX);
            let n = counts.get(&cat).copied().unwrap_or(1).max(1);
            budget.per_category.insert(cat, tokens);
            budget.per_file.insert(cat, u32::try_from(u64::from(tokens) / n).unwrap_or(u32::MAX));
        }

        log::debug!(
            "Allocated {} of {} available tokens across {} categories",
            budget.allocated(),
            available,
            budget.per_category.len()
        );
        budget
    }
}

fn distribute_residual(
    alloc: &mut BTreeMap<Category, u64>,
    demand: &BTreeMap<Category, u64>,
    residual: u64,
) {
    let mut receivers: Vec<Category> =
        ELASTIC.iter().copied().filter(|c| alloc.contains_key(c)).collect();
    if receivers.is_empty() {
        receivers = alloc.keys().copied().collect();
    }

    let weight: u64 = receivers.iter().map(|c| demand.get(c).copied().unwrap_or(0)).sum();
    for cat in &receivers {
        let extra = if weight == 0 {
            residual / receivers.len() as u64
        } else {
            residual * demand.get(cat).copied().unwrap_or(0) / weight
        };
        if let Some(tokens) = alloc.get_mut(cat) {
            *tokens += extra;
        }
    }
}
