//! Entry-point candidate scoring
//!
//! Scores are additive over a fixed rule table. Every matching rule applies,
//! so adding a rule-matching feature never lowers a score.

use crate::classifier::{names_match, normalize_name};
use crate::types::{CategorizedFile, ScoredEntryPoint};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Canonical entry-point basenames rewarded by the scorer
pub const CANONICAL_STEMS: &[&str] = &["main", "app", "cli", "index"];

/// One weighted heuristic
pub struct ScoreRule {
    pub name: &'static str,
    pub weight: i32,
    applies: fn(&ScoreInput<'_>) -> bool,
}

/// Scoring rules, evaluated in full for every candidate
pub const SCORE_RULES: &[ScoreRule] = &[
    ScoreRule { name: "main-guard", weight: 25, applies: has_main_guard },
    ScoreRule { name: "arg-parser", weight: 15, applies: has_arg_parser },
    ScoreRule { name: "web-framework", weight: 15, applies: has_web_framework },
    ScoreRule { name: "repo-name", weight: 20, applies: stem_is_repo_name },
    ScoreRule { name: "canonical-name", weight: 10, applies: stem_is_canonical },
    ScoreRule { name: "test-path", weight: -20, applies: is_test_path },
];

/// Everything a rule may look at
pub struct ScoreInput<'a> {
    file: &'a CategorizedFile,
    content: &'a str,
    stem: String,
    repo_name: &'a str,
}

struct ContentPatterns {
    main_guard: Vec<Regex>,
    arg_parser: Vec<Regex>,
    web_framework: Vec<Regex>,
}

static PATTERNS: OnceLock<ContentPatterns> = OnceLock::new();

const MAIN_GUARD: &[&str] = &[
    r#"if\s+__name__\s*==\s*['"]__main__['"]"#,
    r"\bdef\s+main\s*\(\s*\)",
    r"\bfn\s+main\s*\(\s*\)",
    r"\bfunc\s+main\s*\(\s*\)",
    r"\bfun\s+main\s*\(",
    r"\bint\s+main\s*\(\s*(void)?\s*\)",
    r"public\s+static\s+void\s+main\s*\(",
    r"require\.main\s*===?\s*module",
];

const ARG_PARSER: &[&str] = &[
    r"\bimport\s+argparse\b|argparse\.ArgumentParser\(",
    r"\bimport\s+click\b|\bfrom\s+click\s+import\b|@click\.(command|group)",
    r"\bimport\s+typer\b|typer\.Typer\(",
    r"\boptparse\b|\bdocopt\b|\bfire\.Fire\(",
    r#"\bflag\.Parse\(\)|\bcobra\.Command\b|"github\.com/urfave/cli"#,
    r"\bclap::|#\[derive\([^)]*\bParser\b",
    r#"require\(\s*['"](commander|yargs|minimist|meow)['"]\s*\)"#,
    r#"\bfrom\s+['"](commander|yargs|minimist|meow)['"]"#,
    r"\bOptionParser\.new\b|\bThor\b",
];

const WEB_FRAMEWORK: &[&str] = &[
    r"\bFlask\s*\(\s*__name__",
    r"\bFastAPI\s*\(",
    r"\bexpress\s*\(\s*\)",
    r"\bcreateServer\s*\(",
    r"\bnew\s+Koa\s*\(|\bfastify\s*\(|\bnew\s+Hono\s*\(",
    r"\bhttp\.ListenAndServe\b|\bgin\.(Default|New)\s*\(|\becho\.New\s*\(",
    r"\buvicorn\.run\s*\(|\bget_wsgi_application\b|\bget_asgi_application\b",
    r"@SpringBootApplication|\bSpringApplication\.run\b",
    r"\baxum::Router\b|\bactix_web::|\brocket::build\s*\(",
    r"\bSinatra::Base\b|\bRails\.application\b",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn patterns() -> &'static ContentPatterns {
    PATTERNS.get_or_init(|| ContentPatterns {
        main_guard: compile(MAIN_GUARD),
        arg_parser: compile(ARG_PARSER),
        web_framework: compile(WEB_FRAMEWORK),
    })
}

fn any_match(regexes: &[Regex], content: &str) -> bool {
    regexes.iter().any(|re| re.is_match(content))
}

fn has_main_guard(input: &ScoreInput<'_>) -> bool {
    any_match(&patterns().main_guard, input.content)
}

fn has_arg_parser(input: &ScoreInput<'_>) -> bool {
    any_match(&patterns().arg_parser, input.content)
}

fn has_web_framework(input: &ScoreInput<'_>) -> bool {
    any_match(&patterns().web_framework, input.content)
}

fn stem_is_repo_name(input: &ScoreInput<'_>) -> bool {
    names_match(input.repo_name, &input.stem)
}

fn stem_is_canonical(input: &ScoreInput<'_>) -> bool {
    CANONICAL_STEMS.contains(&input.stem.as_str())
}

fn is_test_path(input: &ScoreInput<'_>) -> bool {
    is_test_file(&input.file.entry.path)
}

/// Whether a path looks like a test file (`test_*`, `*_test.*`, `tests/` …)
pub fn is_test_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let mut parts: Vec<&str> = lower.split('/').collect();
    let name = parts.pop().unwrap_or("");
    let stem = name.split('.').next().unwrap_or("");

    stem.starts_with("test_")
        || stem.ends_with("_test")
        || name.contains(".test.")
        || name.contains(".spec.")
        || parts.iter().any(|d| matches!(*d, "test" | "tests" | "__tests__" | "spec"))
}

/// Heuristic entry-point scorer
pub struct EntryPointScorer {
    repo_name: String,
}

impl EntryPointScorer {
    /// Create a scorer for one repository
    pub fn new(repo_name: &str) -> Self {
        Self { repo_name: normalize_name(repo_name) }
    }

    fn input<'a>(&'a self, file: &'a CategorizedFile, content: &'a str) -> ScoreInput<'a> {
        ScoreInput {
            file,
            content,
            stem: file.entry.stem().to_ascii_lowercase(),
            repo_name: &self.repo_name,
        }
    }

    /// Sum of the weights of every matching rule
    pub fn score(&self, file: &CategorizedFile, content: &str) -> i32 {
        let input = self.input(file, content);
        SCORE_RULES
            .iter()
            .filter(|rule| (rule.applies)(&input))
            .map(|rule| rule.weight)
            .sum()
    }

    /// Names of the rules that matched (for `--explain` style output)
    pub fn matched_rules(&self, file: &CategorizedFile, content: &str) -> Vec<&'static str> {
        let input = self.input(file, content);
        SCORE_RULES
            .iter()
            .filter(|rule| (rule.applies)(&input))
            .map(|rule| rule.name)
            .collect()
    }

    /// Score every candidate and order them best first
    ///
    /// Ties go to the shallower path, then to the lexicographically smaller one.
    pub fn rank(&self, candidates: Vec<(CategorizedFile, String)>) -> Vec<ScoredEntryPoint> {
        let mut scored: Vec<ScoredEntryPoint> = candidates
            .into_iter()
            .map(|(file, raw_content)| {
                let score = self.score(&file, &raw_content);
                log::debug!("Entry point {} scored {}", file.path(), score);
                ScoredEntryPoint { file, score, raw_content }
            })
            .collect();
        scored.sort_by(compare_scored);
        scored
    }
}

fn compare_scored(a: &ScoredEntryPoint, b: &ScoredEntryPoint) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.file.entry.depth().cmp(&b.file.entry.depth()))
        .then_with(|| a.file.path().cmp(b.file.path()))
}
