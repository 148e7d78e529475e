//! End-to-end scenarios for the prioritization pipeline

use pretty_assertions::assert_eq;
use reposum_engine::{
    BudgetAllocator, Category, DependencyExtractor, DropReason, Engine, EngineConfig, EngineError,
    EstimatorKind, FetchedContent, FileEntry, Outcome, PackOutput, RepositoryTree,
    SignatureExtractor,
};
use std::collections::{BTreeMap, HashMap};

const README: &str = "\
# Demo Tool

A small tool that greets people from the command line.

## Badges

[![PyPI](https://img.shields.io/pypi/v/demo-tool.svg)](https://pypi.org/project/demo-tool)
Coverage reports are published on every push.

## Installation

Run `pip install demo-tool` to get started.

## Usage

Call `demo Alice` to greet Alice.

## License

MIT
";

const APP_PY: &str = r#""""Demo tool command line."""
import argparse


def greet(name):
    message = "Hello, " + name
    print(message)
    return message


def main():
    parser = argparse.ArgumentParser(description="Greet someone")
    parser.add_argument("name")
    args = parser.parse_args()
    greet(args.name)


if __name__ == "__main__":
    main()
"#;

fn package_json() -> String {
    let mut deps: Vec<String> =
        (1..50).map(|i| format!("    \"package-{:02}\": \"^{}.2.3\"", i, i)).collect();
    deps.push("    \"react\": \"^18.2.0\"".to_owned());
    format!(
        "{{\n  \"name\": \"demo-tool\",\n  \"version\": \"1.0.0\",\n  \"dependencies\": {{\n{}\n  }}\n}}\n",
        deps.join(",\n")
    )
}

fn demo_tree() -> RepositoryTree {
    RepositoryTree::new("demo-tool")
        .with_entry(FileEntry::new("README.md", README.len() as u64))
        .with_entry(FileEntry::new("package.json", 2_000))
        .with_entry(FileEntry::new("package-lock.json", 180_000))
        .with_entry(FileEntry::new("src/app.py", APP_PY.len() as u64))
}

fn demo_contents() -> HashMap<String, FetchedContent> {
    let mut contents = HashMap::new();
    contents.insert("README.md".to_owned(), FetchedContent::Text(README.to_owned()));
    contents.insert("package.json".to_owned(), FetchedContent::Text(package_json()));
    contents.insert("src/app.py".to_owned(), FetchedContent::Text(APP_PY.to_owned()));
    contents
}

fn run_demo(engine: &Engine) -> PackOutput {
    engine.run(&demo_tree(), &demo_contents()).unwrap()
}

#[test]
fn test_readme_sections_filtered() {
    let out = run_demo(&Engine::new(EngineConfig::default()).unwrap());
    let blob = &out.context.blob;

    assert!(blob.contains("## Installation"));
    assert!(blob.contains("## Usage"));
    assert!(!blob.contains("## Badges"));
    assert!(!blob.contains("shields.io"));
    assert!(!blob.contains("## License"));
}

#[test]
fn test_manifest_reduced_to_names_and_lockfile_excluded() {
    let out = run_demo(&Engine::new(EngineConfig::default()).unwrap());
    let blob = &out.context.blob;

    assert!(blob.contains("--- package.json (package-config) ---"));
    assert!(blob.contains("npm dependencies (50):"));
    assert!(blob.contains("package-01"));
    assert!(blob.contains("react"));
    assert!(!blob.contains("^18.2.0"));
    assert!(!blob.contains("package-lock.json"));
    assert!(out.report.decisions.iter().all(|d| d.path != "package-lock.json"));
    assert_eq!(out.report.filtered, 1);
    assert!(out.context.facts.frameworks.contains("React"));
}

#[test]
fn test_entry_point_scored_and_reduced_to_signatures() {
    let out = run_demo(&Engine::new(EngineConfig::default()).unwrap());
    let blob = &out.context.blob;

    let app = out.report.decisions.iter().find(|d| d.path == "src/app.py").unwrap();
    assert_eq!(app.category, Category::EntryPointCandidate);
    assert_eq!(app.outcome, Outcome::Included);
    // main guard + argument parser + canonical name
    assert_eq!(app.score, Some(50));
    assert!(app.score.unwrap() >= 45);

    assert!(blob.contains("--- src/app.py (entry-point) ---"));
    assert!(blob.contains("def greet(name):"));
    assert!(blob.contains("def main():"));
    assert!(!blob.contains("message = \"Hello, \" + name"));
    assert!(!blob.contains("parser.add_argument"));
    assert!(out.context.facts.languages.contains("Python"));
}

#[test]
fn test_block_order() {
    let out = run_demo(&Engine::new(EngineConfig::default()).unwrap());
    let blob = &out.context.blob;

    let readme = blob.find("--- README.md (readme) ---").unwrap();
    let facts = blob.find("--- detected facts ---").unwrap();
    let manifest = blob.find("--- package.json (package-config) ---").unwrap();
    let entry = blob.find("--- src/app.py (entry-point) ---").unwrap();
    assert!(readme < facts && facts < manifest && manifest < entry);
}

#[test]
fn test_deterministic_output() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let first = run_demo(&engine);
    let second = run_demo(&engine);

    assert_eq!(first.context.blob, second.context.blob);
    assert_eq!(
        serde_json::to_string(&first.report).unwrap(),
        serde_json::to_string(&second.report).unwrap()
    );
}

#[test]
fn test_budget_never_exceeded() {
    for estimator in [EstimatorKind::Chars, EstimatorKind::Cl100k] {
        for (max_tokens, reserved_tokens) in [(4000, 800), (600, 100), (200, 150), (50, 0)] {
            let config = EngineConfig { max_tokens, reserved_tokens, estimator, ..Default::default() };
            let engine = Engine::new(config).unwrap();
            let out = run_demo(&engine);

            let limit = max_tokens - reserved_tokens;
            assert!(
                out.context.total_tokens_used <= limit,
                "{} tokens over limit {} with {}",
                out.context.total_tokens_used,
                limit,
                engine.estimator().name()
            );
            assert_eq!(out.context.total_tokens_used, engine.estimator().estimate(&out.context.blob));
            assert!(out.report.budget.allocated() <= out.report.budget.available());
        }
    }
}

#[test]
fn test_oversized_entry_never_fetched_or_logged() {
    let tree = demo_tree().with_entry(FileEntry::new("data/dump.txt", 2 * 1024 * 1024));
    let engine = Engine::new(EngineConfig::default()).unwrap();

    let plan = engine.plan(&tree).unwrap();
    assert!(plan.paths().all(|p| p != "data/dump.txt"));
    let dump = plan.classified.iter().find(|f| f.path() == "data/dump.txt").unwrap();
    assert_eq!(dump.category, Category::Excluded);

    let out = engine.pack(&plan, &demo_contents());
    assert!(!out.context.blob.contains("dump.txt"));
    assert!(out.report.decisions.iter().all(|d| d.path != "data/dump.txt"));
}

#[test]
fn test_slack_flows_to_present_categories() {
    let present: BTreeMap<Category, usize> =
        [(Category::Readme, 1), (Category::SourceSample, 1)].into_iter().collect();
    let budget = BudgetAllocator::default().allocate(4000, 800, &present);

    assert_eq!(budget.category(Category::Readme), 600);
    assert_eq!(budget.category(Category::SourceSample), 2600);
    assert_eq!(budget.file_cap(Category::SourceSample), 2600);
    assert_eq!(budget.allocated(), 3200);
}

#[test]
fn test_failed_fetch_does_not_block_others() {
    let mut contents = demo_contents();
    contents.remove("package.json");

    let out = Engine::new(EngineConfig::default()).unwrap().run(&demo_tree(), &contents).unwrap();
    let manifest = out.report.decisions.iter().find(|d| d.path == "package.json").unwrap();
    assert_eq!(manifest.outcome, Outcome::Dropped(DropReason::FetchFailed));
    assert_eq!(manifest.tokens, 0);
    assert!(out.context.blob.contains("## Installation"));
    assert!(out.context.blob.contains("def main():"));
}

#[test]
fn test_malformed_manifest_is_evidence_only() {
    let mut contents = demo_contents();
    contents.insert("package.json".to_owned(), FetchedContent::Text("{ \"dependencies\": ".to_owned()));

    let out = Engine::new(EngineConfig::default()).unwrap().run(&demo_tree(), &contents).unwrap();
    assert!(out.context.blob.contains("npm manifest present"));
    assert!(out.context.facts.tools.contains("npm"));
}

#[test]
fn test_empty_tree_yields_minimal_context() {
    let out = Engine::new(EngineConfig::default())
        .unwrap()
        .run(&RepositoryTree::new("empty"), &HashMap::<String, FetchedContent>::new())
        .unwrap();
    assert!(out.context.blob.starts_with("--- detected facts ---"));
    assert!(out.context.facts.is_empty());
    assert!(out.report.decisions.is_empty());
}

#[test]
fn test_structurally_invalid_tree_is_an_error() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let tree = RepositoryTree::new("").with_entry(FileEntry::new("README.md", 10));
    let err = engine.plan(&tree).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientInput(_)));
    assert!(err.to_string().starts_with("Insufficient input"));
}

#[test]
fn test_invalid_config_rejected() {
    let config = EngineConfig { reserved_tokens: 5000, ..Default::default() };
    assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
}

const STOREFRONT_PACKAGE_JSON: &str = r#"{
  "name": "storefront",
  "version": "2.4.1",
  "description": "Server-rendered storefront with a product catalogue and checkout",
  "main": "dist/server.js",
  "license": "MIT",
  "repository": {
    "type": "git",
    "url": "https://github.com/acme/storefront.git"
  },
  "scripts": {
    "build": "tsc -p tsconfig.build.json && vite build",
    "dev": "concurrently \"tsc -w\" \"nodemon dist/server.js\"",
    "lint": "eslint --ext .ts,.tsx src tests",
    "test": "jest --coverage --runInBand",
    "start": "node dist/server.js",
    "migrate": "knex migrate:latest --knexfile config/knexfile.js"
  },
  "engines": {
    "node": ">=18.17.0"
  },
  "dependencies": {
    "express": "^4.18.2",
    "knex": "^3.1.0",
    "pg": "^8.11.3",
    "zod": "^3.22.4"
  },
  "devDependencies": {
    "jest": "^29.7.0",
    "typescript": "^5.3.3"
  },
  "jest": {
    "preset": "ts-jest",
    "testEnvironment": "node",
    "collectCoverageFrom": ["src/**/*.ts", "!src/**/*.d.ts"],
    "coverageThreshold": {
      "global": { "branches": 80, "functions": 80, "lines": 80 }
    }
  },
  "eslintConfig": {
    "root": true,
    "parser": "@typescript-eslint/parser",
    "extends": ["eslint:recommended", "prettier"]
  }
}
"#;

const ORDERS_PY: &str = r#"import logging
from decimal import Decimal

log = logging.getLogger(__name__)


class OrderBook:
    def __init__(self, store, tax_rate):
        self.store = store
        self.tax_rate = Decimal(tax_rate)
        self.pending = {}
        self.completed = []
        self.failures = 0

    def add(self, order_id, items):
        if order_id in self.pending:
            raise ValueError("duplicate order " + order_id)
        subtotal = sum(Decimal(i["price"]) * i["qty"] for i in items)
        total = subtotal + subtotal * self.tax_rate
        self.pending[order_id] = {"items": items, "total": total}
        log.info("queued %s for %s", order_id, total)
        return total

    def settle(self, order_id, payment):
        order = self.pending.pop(order_id, None)
        if order is None:
            self.failures += 1
            return False
        if payment.amount < order["total"]:
            self.pending[order_id] = order
            self.failures += 1
            return False
        self.store.save(order_id, order)
        self.completed.append(order_id)
        return True

    def report(self):
        lines = []
        for order_id in sorted(self.completed):
            lines.append("settled " + order_id)
        for order_id in sorted(self.pending):
            lines.append("pending " + order_id)
        lines.append("failures " + str(self.failures))
        return "\n".join(lines)
"#;

#[test]
fn test_extraction_reduces_representative_files() {
    let deps = DependencyExtractor::new().extract("package.json", STOREFRONT_PACKAGE_JSON).unwrap();
    let rendered = deps.render();
    assert_eq!(rendered, "npm dependencies (6): express, jest, knex, pg, typescript, zod");
    assert!(rendered.len() * 5 <= STOREFRONT_PACKAGE_JSON.len());

    let sigs = SignatureExtractor::default().extract("shop/orders.py", ORDERS_PY);
    assert_eq!(sigs.declarations, 5);
    assert!(sigs.text.contains("    def settle(self, order_id, payment):"));
    assert!(!sigs.text.contains("self.failures += 1"));
    assert!(sigs.text.len() * 10 <= ORDERS_PY.len() * 3);
}
