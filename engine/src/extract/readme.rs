//! README section selection
//!
//! The README is split into sections at ATX (`## Usage`) and setext
//! headings. Sections about what the project is and how to use it are kept,
//! community and legal boilerplate is dropped, badges are always removed.
//! A leading H1 is the project title and always survives.
//! Sections are then taken in order until the budget runs out; the section
//! that overflows is cut at a sentence or line boundary.

use crate::tokenizer::{truncate_to_tokens, TokenEstimator};

/// Headings whose sections are worth keeping
const KEEP_KEYWORDS: &[&str] = &[
    "description", "about", "overview", "introduction", "intro", "what", "why",
    "installation", "install", "installing", "setup", "getting started", "quick start",
    "quickstart", "usage", "example", "examples", "how to", "features", "highlights",
    "requirements", "prerequisites", "dependencies", "configuration", "architecture",
];

/// Headings whose sections are dropped together with their subsections
///
/// A subsection with a keep keyword ends the dropped region.
const DROP_KEYWORDS: &[&str] = &[
    "badge", "badges", "contributing", "contribute", "contributors", "contribution",
    "license", "licence", "licensing", "changelog", "change log", "release notes",
    "acknowledgments", "acknowledgements", "credits", "thanks", "sponsors", "sponsor",
    "backers", "funding", "donate", "donation", "code of conduct", "security", "citation",
    "authors", "maintainers", "star history", "roadmap", "faq",
];

/// How a section is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Keep,
    Drop,
    /// No keyword matched; kept while budget remains
    Neutral,
}

/// A heading and the lines up to the next heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadmeSection {
    /// `None` for text before the first heading
    pub heading: Option<String>,
    /// 1-6, zero for the preamble
    pub level: u8,
    pub kind: SectionKind,
    /// Heading line(s) plus body, badge lines removed
    pub text: String,
}

/// Classify a heading by keyword (drop wins over keep)
pub fn classify_heading(heading: &str) -> SectionKind {
    let lower = heading.to_lowercase();
    if DROP_KEYWORDS.iter().any(|k| contains_word(&lower, k)) {
        SectionKind::Drop
    } else if KEEP_KEYWORDS.iter().any(|k| contains_word(&lower, k)) {
        SectionKind::Keep
    } else {
        SectionKind::Neutral
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Badge images, shields and CI status links
pub fn is_badge_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    lower.starts_with("[![")
        || (lower.starts_with("![") && lower.contains("badge"))
        || lower.contains("shields.io")
        || (lower.contains("badge") && lower.contains("http"))
}

fn atx_heading(line: &str) -> Option<(u8, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = line.trim_start();
    let hashes = rest.len() - rest.trim_start_matches('#').len();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let title = &rest[hashes..];
    if !title.is_empty() && !title.starts_with([' ', '\t']) {
        return None;
    }
    Some((hashes as u8, title.trim().trim_end_matches('#').trim()))
}

fn setext_level(line: &str) -> Option<u8> {
    let t = line.trim();
    if t.len() >= 3 && t.chars().all(|c| c == '=') {
        Some(1)
    } else if t.len() >= 3 && t.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

struct SectionBuilder<'a> {
    heading: Option<&'a str>,
    level: u8,
    lines: Vec<&'a str>,
}

impl SectionBuilder<'_> {
    fn finish(self) -> Option<ReadmeSection> {
        let text = self.lines.join("\n").trim_end().to_owned();
        if text.trim().is_empty() {
            return None;
        }
        let kind = match self.heading {
            Some(h) => classify_heading(h),
            None => SectionKind::Keep,
        };
        Some(ReadmeSection { heading: self.heading.map(str::to_owned), level: self.level, kind, text })
    }
}

/// Split a README into sections; empty when it has no headings
pub fn split_sections(text: &str) -> Vec<ReadmeSection> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections = Vec::new();
    let mut current = SectionBuilder { heading: None, level: 0, lines: Vec::new() };
    let mut saw_heading = false;
    let mut in_fence = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if is_fence(line) {
            in_fence = !in_fence;
        }

        let heading = if in_fence {
            None
        } else if let Some((level, title)) = atx_heading(line) {
            Some((level, title, 1))
        } else {
            let next_level = lines.get(i + 1).and_then(|next| setext_level(next));
            match next_level {
                Some(level) if !line.trim().is_empty() && !is_badge_line(line) => {
                    Some((level, line.trim(), 2))
                },
                _ => None,
            }
        };

        match heading {
            Some((level, title, consumed)) => {
                saw_heading = true;
                let previous = std::mem::replace(
                    &mut current,
                    SectionBuilder { heading: Some(title), level, lines: Vec::new() },
                );
                sections.extend(previous.finish());
                current.lines.extend(&lines[i..i + consumed]);
                i += consumed;
            },
            None => {
                if in_fence || !is_badge_line(line) {
                    current.lines.push(line);
                }
                i += 1;
            },
        }
    }
    sections.extend(current.finish());

    if saw_heading {
        sections
    } else {
        Vec::new()
    }
}

/// Heading-aware README truncator
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadmeTruncator;

impl ReadmeTruncator {
    pub fn new() -> Self {
        Self
    }

    /// Keep the valuable sections of a README within `budget` tokens
    pub fn truncate(&self, text: &str, budget: u32, estimator: &dyn TokenEstimator) -> String {
        let sections = split_sections(text);
        if sections.is_empty() {
            return truncate_to_tokens(text, budget, estimator).to_owned();
        }

        // a leading H1 names the project and is never dropped
        let title = sections
            .iter()
            .position(|s| s.heading.is_some())
            .filter(|&idx| sections[idx].level == 1);

        let mut kept = String::new();
        let mut drop_below: Option<u8> = None;

        for (idx, section) in sections.iter().enumerate() {
            let kind = if Some(idx) == title { SectionKind::Keep } else { section.kind };
            if let Some(level) = drop_below {
                if section.level > level && kind != SectionKind::Keep {
                    continue;
                }
                drop_below = None;
            }
            if kind == SectionKind::Drop {
                log::debug!("README: dropping section {:?}", section.heading);
                drop_below = Some(section.level);
                continue;
            }

            let candidate = join_section(&kept, &section.text);
            if estimator.estimate(&candidate) <= budget {
                kept = candidate;
                continue;
            }

            let used = estimator.estimate(&kept) + u32::from(!kept.is_empty());
            let remaining = budget.saturating_sub(used);
            let partial = truncate_to_tokens(&section.text, remaining, estimator);
            if !partial.is_empty() {
                kept = join_section(&kept, partial);
            }
            break;
        }

        // estimates are not strictly additive across the join
        truncate_to_tokens(&kept, budget, estimator).to_owned()
    }
}

fn join_section(acc: &str, section: &str) -> String {
    if acc.is_empty() {
        section.to_owned()
    } else {
        format!("{}\n\n{}", acc, section)
    }
}
