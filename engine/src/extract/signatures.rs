//! Declaration-only view of source files
//!
//! Lines are kept verbatim (indentation included) when they declare a
//! function, method, class or type, continue such a declaration's signature,
//! or are comments/attributes/docstrings directly attached to one. Bodies are
//! dropped. Output lines are a subset of input lines in source order.

use crate::tokenizer::head_slice;
use regex::Regex;
use std::sync::OnceLock;

/// Signature lines a declaration may span before it is cut off
const MAX_SIGNATURE_LINES: usize = 6;

/// Lines kept from a docstring following a declaration
const MAX_DOCSTRING_LINES: usize = 8;

/// Lines kept from a Python module docstring
const MAX_MODULE_DOC_LINES: usize = 10;

/// Words that start control flow rather than a declaration
const CONTROL_WORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "do", "switch", "case", "catch", "try", "return",
    "match", "loop", "unless", "until", "when", "new", "throw", "await", "yield", "with",
];

/// Languages with declaration rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    Python,
    JavaScript,
    Rust,
    Go,
    Jvm,
    Ruby,
    Php,
}

impl SourceLanguage {
    /// Language for a lowercase file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        let lang = match ext {
            "py" | "pyi" => Self::Python,
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "mts" | "cts" => Self::JavaScript,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" | "kt" | "kts" | "scala" => Self::Jvm,
            "rb" | "rake" => Self::Ruby,
            "php" => Self::Php,
            _ => return None,
        };
        Some(lang)
    }

    /// Detect from a path's extension
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(&ext.to_ascii_lowercase())
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// How a signature is recognised as complete
#[derive(Clone, Copy)]
enum Terminator {
    /// A `:` outside brackets (Python)
    Colon,
    /// Contains `{`, `;`, `=>` or `=`
    Brace,
    /// Always a single line
    Line,
}

struct LanguageRules {
    declarations: Vec<Regex>,
    /// Prefixes of comment, attribute and decorator lines attached above a declaration
    attached: &'static [&'static str],
    terminator: Terminator,
}

static RULES: OnceLock<Vec<LanguageRules>> = OnceLock::new();

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

const BLOCK_COMMENT: &[&str] = &["//", "/*", "*", "*/"];

fn rules(lang: SourceLanguage) -> &'static LanguageRules {
    let all = RULES.get_or_init(|| {
        vec![
            LanguageRules {
                declarations: compile(&[r"^(async\s+)?def\s+\w+\s*\(", r"^class\s+\w+"]),
                attached: &["#", "@"],
                terminator: Terminator::Colon,
            },
            LanguageRules {
                declarations: compile(&[
                    r"^(export\s+)?(default\s+)?(async\s+)?function\b",
                    r"^(export\s+)?(default\s+)?(abstract\s+)?class\s+\w+",
                    r"^(export\s+)?(declare\s+)?(interface|type|enum)\s+\w+",
                    r"^(export\s+)?(const|let|var)\s+\w+\s*(:[^=]*)?=\s*(async\s+)?(function\b|\([^)]*\)\s*(:\s*[^=]+)?=>|\w+\s*=>)",
                    r"^((public|private|protected|static|async|readonly|override|get|set)\s+)*\w+\s*(<[^>]*>)?\s*\([^)]*\)\s*(:\s*[^{]+)?\{\s*$",
                ]),
                attached: &["//", "/*", "*", "*/", "@"],
                terminator: Terminator::Brace,
            },
            LanguageRules {
                declarations: compile(&[
                    r#"^(pub(\([^)]*\))?\s+)?(const\s+)?(async\s+)?(unsafe\s+)?(extern\s+"[^"]*"\s+)?fn\s+\w+"#,
                    r"^(pub(\([^)]*\))?\s+)?(struct|enum|trait|union|type|mod)\s+\w+",
                    r"^(unsafe\s+)?impl\b",
                    r"^macro_rules!\s*\w+",
                ]),
                attached: &["///", "//", "/*", "*", "*/", "#["],
                terminator: Terminator::Brace,
            },
            LanguageRules {
                declarations: compile(&[r"^func\s+", r"^type\s+\w+"]),
                attached: BLOCK_COMMENT,
                terminator: Terminator::Brace,
            },
            LanguageRules {
                declarations: compile(&[
                    r"^((public|protected|private|static|final|abstract|sealed|open|data|inline|internal|override|case)\s+)*(class|interface|enum|record|object|trait|@interface)\s+\w+",
                    r"^((public|protected|private|internal|override|open|suspend|inline|abstract|operator)\s+)*fun\s+",
                    r"^((public|protected|private|static|final|abstract|synchronized|native|default)\s+)+[\w<>\[\],.? ]+\s+\w+\s*\(",
                    r"^(override\s+)?def\s+\w+",
                ]),
                attached: &["//", "/*", "*", "*/", "@"],
                terminator: Terminator::Brace,
            },
            LanguageRules {
                declarations: compile(&[r"^def\s+(self\.)?\w+[?!=]?", r"^(class|module)\s+[A-Z]\w*"]),
                attached: &["#"],
                terminator: Terminator::Line,
            },
            LanguageRules {
                declarations: compile(&[
                    r"^((public|protected|private|static|abstract|final)\s+)*function\s+&?\w+\s*\(",
                    r"^((abstract|final|readonly)\s+)*(class|interface|trait|enum)\s+\w+",
                ]),
                attached: &["//", "#", "/*", "*", "*/"],
                terminator: Terminator::Brace,
            },
        ]
    });
    &all[lang.index()]
}

/// Result of one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureOutput {
    pub text: String,
    /// Declarations recognised (zero means the head-slice fallback was used)
    pub declarations: usize,
}

impl SignatureOutput {
    /// Whether the raw head-slice fallback was used
    pub fn is_fallback(&self) -> bool {
        self.declarations == 0
    }
}

/// Signature extractor
#[derive(Debug, Clone, Copy)]
pub struct SignatureExtractor {
    fallback_chars: usize,
}

impl Default for SignatureExtractor {
    fn default() -> Self {
        Self { fallback_chars: 1500 }
    }
}

impl SignatureExtractor {
    /// Create an extractor with a custom fallback head-slice size
    pub fn new(fallback_chars: usize) -> Self {
        Self { fallback_chars }
    }

    /// Reduce a source file to its declarations; never fails
    pub fn extract(&self, path: &str, content: &str) -> SignatureOutput {
        let Some(lang) = SourceLanguage::from_path(path) else {
            return self.fallback(content);
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut keep = vec![false; lines.len()];
        let declarations = mark_declarations(lang, &lines, &mut keep);
        if declarations == 0 {
            return self.fallback(content);
        }
        mark_file_docs(lang, &lines, &mut keep);

        let text = lines
            .iter()
            .zip(&keep)
            .filter(|(_, kept)| **kept)
            .map(|(line, _)| *line)
            .collect::<Vec<_>>()
            .join("\n");
        SignatureOutput { text, declarations }
    }

    fn fallback(&self, content: &str) -> SignatureOutput {
        SignatureOutput { text: head_slice(content, self.fallback_chars).to_owned(), declarations: 0 }
    }
}

fn first_word(trimmed: &str) -> &str {
    trimmed
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("")
}

fn is_declaration(rules: &LanguageRules, trimmed: &str) -> bool {
    !CONTROL_WORDS.contains(&first_word(trimmed))
        && rules.declarations.iter().any(|re| re.is_match(trimmed))
}

/// Whether the signature is complete after `trimmed`
///
/// `depth` carries the bracket depth across the lines of one signature.
fn is_terminated(terminator: Terminator, trimmed: &str, depth: &mut u32) -> bool {
    match terminator {
        Terminator::Colon => has_top_level_colon(trimmed, depth),
        Terminator::Brace => {
            trimmed.contains('{')
                || trimmed.ends_with(';')
                || trimmed.ends_with('}')
                || trimmed.contains("=>")
                || trimmed.contains(" = ")
        },
        Terminator::Line => true,
    }
}

/// A `:` outside brackets, strings and comments ends a Python header
fn has_top_level_colon(line: &str, depth: &mut u32) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '#' => break,
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => *depth += 1,
            ')' | ']' | '}' => *depth = depth.saturating_sub(1),
            ':' if *depth == 0 => return true,
            _ => {},
        }
    }
    false
}

fn mark_declarations(lang: SourceLanguage, lines: &[&str], keep: &mut [bool]) -> usize {
    let rules = rules(lang);
    let mut count = 0;
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if !is_declaration(rules, trimmed) {
            i += 1;
            continue;
        }
        count += 1;
        mark_attached_above(rules, lines, i, keep);

        let mut depth = 0;
        let mut end = i;
        while !is_terminated(rules.terminator, lines[end].trim(), &mut depth)
            && end + 1 < lines.len()
            && end - i + 1 < MAX_SIGNATURE_LINES
        {
            let next = lines[end + 1].trim();
            if next.is_empty() || is_declaration(rules, next) {
                break;
            }
            end += 1;
        }
        keep[i..=end].iter_mut().for_each(|k| *k = true);

        if lang == SourceLanguage::Python {
            end = mark_docstring(lines, end + 1, MAX_DOCSTRING_LINES, keep).unwrap_or(end);
        }
        i = end + 1;
    }
    count
}

/// Keep the contiguous comment/attribute lines directly above a declaration
fn mark_attached_above(rules: &LanguageRules, lines: &[&str], decl: usize, keep: &mut [bool]) {
    let mut j = decl;
    while j > 0 {
        let above = lines[j - 1].trim();
        if above.is_empty() || !rules.attached.iter().any(|p| above.starts_with(p)) {
            break;
        }
        keep[j - 1] = true;
        j -= 1;
    }
}

/// Keep a triple-quoted docstring starting at `start`; returns its last line
fn mark_docstring(lines: &[&str], start: usize, max_lines: usize, keep: &mut [bool]) -> Option<usize> {
    let first = lines.get(start)?.trim();
    let body = first.trim_start_matches(['r', 'u', 'b', 'R', 'U', 'B']);
    let quote = ["\"\"\"", "'''"].into_iter().find(|q| body.starts_with(q))?;

    keep[start] = true;
    if body[3..].contains(quote) {
        return Some(start);
    }
    let last = (start + max_lines).min(lines.len());
    for (j, line) in lines.iter().enumerate().take(last).skip(start + 1) {
        keep[j] = true;
        if line.contains(quote) {
            return Some(j);
        }
    }
    Some(last.saturating_sub(1))
}

/// File-level documentation: Python module docstring, Rust `//!`, Go `package`
fn mark_file_docs(lang: SourceLanguage, lines: &[&str], keep: &mut [bool]) {
    match lang {
        SourceLanguage::Python => {
            let first_code = lines.iter().position(|line| {
                let t = line.trim();
                !t.is_empty() && !t.starts_with('#')
            });
            if let Some(start) = first_code {
                mark_docstring(lines, start, MAX_MODULE_DOC_LINES, keep);
            }
        },
        SourceLanguage::Rust => {
            for (j, line) in lines.iter().enumerate() {
                if line.trim_start().starts_with("//!") {
                    keep[j] = true;
                }
            }
        },
        SourceLanguage::Go => {
            if let Some(j) = lines.iter().position(|l| l.trim_start().starts_with("package ")) {
                keep[j] = true;
            }
        },
        _ => {},
    }
}

#[cfg(test)]
#[allow(clippy::str_to_string)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(path: &str, content: &str) -> String {
        SignatureExtractor::default().extract(path, content).text
    }

    #[test]
    fn test_all_rules_compile() {
        for lang in [
            SourceLanguage::Python,
            SourceLanguage::JavaScript,
            SourceLanguage::Rust,
            SourceLanguage::Go,
            SourceLanguage::Jvm,
            SourceLanguage::Ruby,
            SourceLanguage::Php,
        ] {
            assert!(!rules(lang).declarations.is_empty());
        }
        assert_eq!(rules(SourceLanguage::JavaScript).declarations.len(), 5);
        assert_eq!(rules(SourceLanguage::Jvm).declarations.len(), 4);
    }

    #[test]
    fn test_python_signatures_and_docstrings() {
        let content = r#""""Command line entry."""

import argparse


@dataclass
class Config:
    """Runtime settings."""
    name: str = "x"


def parse_args(
    argv,
):
    """Parse the command line.

    Returns a namespace.
    """
    parser = argparse.ArgumentParser()
    return parser.parse_args(argv)


if __name__ == "__main__":
    main()
"#;
        let expected = r#""""Command line entry."""
@dataclass
class Config:
    """Runtime settings."""
def parse_args(
    argv,
):
    """Parse the command line.

    Returns a namespace.
    """"#;
        assert_eq!(extract("src/app.py", content), expected);
    }

    #[test]
    fn test_python_one_line_and_multiline_headers() {
        let content = "class Error(Exception): pass\nSECRET_TABLE = {\n    'a': 1,\n    'b': 2,\n}\n\n\n\
                       def f(x): return x + 1\nVALUE = f(2)\n\n\n\
                       def g(\n    key: str,\n    default=None,\n) -> dict:\n    return {}\n";
        let output = SignatureExtractor::default().extract("errors.py", content);
        assert_eq!(output.declarations, 3);
        assert_eq!(
            output.text,
            "class Error(Exception): pass\ndef f(x): return x + 1\n\
             def g(\n    key: str,\n    default=None,\n) -> dict:"
        );
    }

    #[test]
    fn test_signature_continuation_stops_at_blank_line() {
        let content = "def broken(a,\n\nTABLE = [1, 2]\n";
        assert_eq!(extract("broken.py", content), "def broken(a,");
    }

    #[test]
    fn test_javascript() {
        let content = "import express from 'express';\n\n/**\n * Start the server.\n */\n\
                       export async function start(port) {\n  const app = express();\n  \
                       app.listen(port);\n}\n\nconst add = (a, b) => a + b;\n\n\
                       class Store {\n  get(key) {\n    if (key) {\n      return 1;\n    }\n  }\n}\n";
        let expected = "/**\n * Start the server.\n */\nexport async function start(port) {\n\
                        const add = (a, b) => a + b;\nclass Store {\n  get(key) {";
        assert_eq!(extract("index.js", content), expected);
    }

    #[test]
    fn test_rust_keeps_docs_and_attributes() {
        let content = "//! Crate docs\n\nuse std::fmt;\n\n/// A point\n#[derive(Debug)]\n\
                       pub struct Point {\n    x: i32,\n}\n\nimpl Point {\n    /// Origin\n    \
                       pub fn origin() -> Self {\n        Self { x: 0 }\n    }\n}\n\n\
                       fn helper<T>(value: T)\nwhere\n    T: fmt::Debug,\n{\n    println!(\"{:?}\", value);\n}\n";
        let expected = "//! Crate docs\n/// A point\n#[derive(Debug)]\npub struct Point {\n\
                        impl Point {\n    /// Origin\n    pub fn origin() -> Self {\n\
                        fn helper<T>(value: T)\nwhere\n    T: fmt::Debug,\n{";
        assert_eq!(extract("src/lib.rs", content), expected);
    }

    #[test]
    fn test_go() {
        let content = "package main\n\nimport \"fmt\"\n\n// Server handles requests.\n\
                       type Server struct {\n\tport int\n}\n\n// Run starts it.\n\
                       func (s *Server) Run() error {\n\tfmt.Println(s.port)\n\treturn nil\n}\n";
        let expected = "package main\n// Server handles requests.\ntype Server struct {\n\
                        // Run starts it.\nfunc (s *Server) Run() error {";
        assert_eq!(extract("cmd/server.go", content), expected);
    }

    #[test]
    fn test_java_ruby_php() {
        let java = "package a;\n\n@Service\npublic class Billing {\n    private int total;\n\n    \
                    public int charge(int amount) {\n        total += amount;\n        return total;\n    }\n}\n";
        assert_eq!(
            extract("src/Billing.java", java),
            "@Service\npublic class Billing {\n    public int charge(int amount) {"
        );

        let ruby = "# Models a user\nclass User\n  def name\n    @name\n  end\nend\n";
        assert_eq!(extract("app/user.rb", ruby), "# Models a user\nclass User\n  def name");

        let php = "<?php\n\nclass Cart\n{\n    public function add($item)\n    {\n        $this->items[] = $item;\n    }\n}\n";
        assert_eq!(
            extract("src/Cart.php", php),
            "class Cart\n{\n    public function add($item)\n    {"
        );
    }

    #[test]
    fn test_control_flow_is_not_a_declaration() {
        let content = "function run() {\n  if (ready) {\n    go();\n  }\n  for (x of xs) {\n  }\n}\n";
        assert_eq!(extract("run.js", content), "function run() {");
    }

    #[test]
    fn test_fallback_head_slice() {
        let extractor = SignatureExtractor::new(20);
        let content = "just some text\nwithout declarations\nat all\n";
        let output = extractor.extract("notes.py", content);
        assert!(output.is_fallback());
        assert_eq!(output.text, "just some text");

        let unknown = extractor.extract("style.css", "body { color: red; }\n");
        assert!(unknown.is_fallback());
    }

    #[test]
    fn test_output_is_reductive() {
        let body = "    x = compute()\n".repeat(40);
        let content = format!("def f(a, b):\n{}\ndef g():\n{}", body, body);
        let output = SignatureExtractor::default().extract("m.py", &content);
        assert_eq!(output.declarations, 2);
        assert!(output.text.len() * 10 < content.len() * 3);
    }
}
