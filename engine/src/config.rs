//! Engine configuration
//!
//! Defaults are compiled in; anything else is layered on top with figment:
//! `.reposum.toml`, `.reposum.yaml`, an explicit config file, then
//! `REPOSUM_*` environment variables (`__` separates nested keys).

use crate::tokenizer::EstimatorKind;
use crate::types::Category;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for one engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total token ceiling for the assembled context
    pub max_tokens: u32,
    /// Tokens held back for the prompt wrapper and the model's reply
    pub reserved_tokens: u32,
    /// Files larger than this (bytes) are excluded outright
    pub size_ceiling: u64,
    /// Token estimator
    pub estimator: EstimatorKind,
    /// Head-slice size (chars) for sources without recognisable declarations
    pub fallback_chars: usize,
    /// Parallel fetches the content collaborator may run
    pub max_concurrent_fetches: usize,
    /// Per-file share of `max_tokens`, per category
    pub shares: ShareTable,
    /// How many files of each category are requested and kept
    pub selection: SelectionLimits,
    /// Exclusion patterns applied before any content is fetched
    pub exclude: ExclusionRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            reserved_tokens: 800,
            size_ceiling: 1024 * 1024,
            estimator: EstimatorKind::Chars,
            fallback_chars: 1500,
            max_concurrent_fetches: 5,
            shares: ShareTable::default(),
            selection: SelectionLimits::default(),
            exclude: ExclusionRules::default(),
        }
    }
}

/// Per-file token shares in permille of `max_tokens`
///
/// At the default 4000-token total: README 600, manifest 300,
/// entry point 200, everything else 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareTable {
    pub readme: u32,
    pub package_config: u32,
    pub entry_point: u32,
    pub ci_cd: u32,
    pub documentation: u32,
    pub source_sample: u32,
}

impl Default for ShareTable {
    fn default() -> Self {
        Self {
            readme: 150,
            package_config: 75,
            entry_point: 50,
            ci_cd: 25,
            documentation: 25,
            source_sample: 25,
        }
    }
}

impl ShareTable {
    /// Share for a category (zero for excluded files)
    pub fn share(&self, category: Category) -> u32 {
        match category {
            Category::Readme => self.readme,
            Category::PackageConfig => self.package_config,
            Category::EntryPointCandidate => self.entry_point,
            Category::CiCdConfig => self.ci_cd,
            Category::Documentation => self.documentation,
            Category::SourceSample => self.source_sample,
            Category::Excluded => 0,
        }
    }
}

/// Per-category file limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionLimits {
    /// Manifests requested
    pub max_manifests: usize,
    /// Entry-point candidates requested for scoring
    pub max_entry_fetch: usize,
    /// Entry points kept after scoring
    pub max_entry_points: usize,
    /// CI/CD files requested
    pub max_ci_configs: usize,
    /// Documentation files requested
    pub max_docs: usize,
    /// Source samples requested (one per directory)
    pub max_source_samples: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_manifests: 5,
            max_entry_fetch: 8,
            max_entry_points: 3,
            max_ci_configs: 3,
            max_docs: 2,
            max_source_samples: 3,
        }
    }
}

impl SelectionLimits {
    /// Files of a category that may end up in the context
    pub fn kept(&self, category: Category) -> usize {
        match category {
            Category::Readme => 1,
            Category::PackageConfig => self.max_manifests,
            Category::EntryPointCandidate => self.max_entry_points,
            Category::CiCdConfig => self.max_ci_configs,
            Category::Documentation => self.max_docs,
            Category::SourceSample => self.max_source_samples,
            Category::Excluded => 0,
        }
    }

    /// Files of a category requested from the fetch collaborator
    pub fn requested(&self, category: Category) -> usize {
        match category {
            Category::EntryPointCandidate => self.max_entry_fetch.max(self.max_entry_points),
            other => self.kept(other),
        }
    }
}

/// Exclusion patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionRules {
    /// Directory names that are never descended into
    pub dirs: Vec<String>,
    /// Lowercase filename suffixes (extensions, `.min.js`, `.lock` …)
    pub suffixes: Vec<String>,
    /// Exact filenames (lockfiles, license boilerplate, VCS metadata)
    pub file_names: Vec<String>,
    /// Extra glob patterns matched against the full path
    pub patterns: Vec<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            dirs: owned(DEFAULT_EXCLUDED_DIRS),
            suffixes: owned(DEFAULT_EXCLUDED_SUFFIXES),
            file_names: owned(DEFAULT_EXCLUDED_FILES),
            patterns: Vec::new(),
        }
    }
}

const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules", "bower_components", "jspm_packages",
    "__pycache__", "venv", ".venv", "env", "site-packages",
    ".eggs", ".tox", ".nox", ".mypy_cache", ".pytest_cache", ".ruff_cache",
    "dist", "build", "out", "target", "_build",
    ".idea", ".vscode", ".vs",
    ".git", ".svn", ".hg",
    "coverage", ".nyc_output", "htmlcov",
    ".cache", ".tmp", "tmp", "temp", ".gradle", ".mvn", ".next",
    "vendor", "third_party",
];

const DEFAULT_EXCLUDED_SUFFIXES: &[&str] = &[
    // Executables and object code
    ".exe", ".dll", ".so", ".dylib", ".a", ".lib", ".o", ".obj",
    ".pyc", ".pyo", ".class", ".jar", ".war", ".ear", ".wasm",
    // Archives
    ".zip", ".tar", ".gz", ".tgz", ".bz2", ".xz", ".rar", ".7z",
    // Images
    ".png", ".jpg", ".jpeg", ".gif", ".ico", ".icns", ".svg", ".webp", ".bmp", ".tif", ".tiff",
    ".psd",
    // Documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
    // Media
    ".mp3", ".mp4", ".wav", ".avi", ".mov", ".mkv", ".ogg", ".webm", ".flac",
    // Fonts
    ".woff", ".woff2", ".ttf", ".eot", ".otf",
    // Data
    ".sqlite", ".sqlite3", ".db", ".pickle", ".pkl", ".bin", ".dat", ".parquet",
    // Generated
    ".min.js", ".min.css", ".bundle.js", ".chunk.js", ".map",
    // Lockfiles
    ".lock", ".lockb",
];

const DEFAULT_EXCLUDED_FILES: &[&str] = &[
    "package-lock.json", "npm-shrinkwrap.json", "pnpm-lock.yaml", "go.sum",
    ".gitignore", ".gitattributes", ".gitmodules", ".editorconfig", ".npmignore",
    ".dockerignore", ".eslintignore", ".mailmap", ".ds_store",
    "license", "license.md", "license.txt", "licence", "licence.md", "copying",
    "codeowners", "security.md",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl EngineConfig {
    /// Load configuration for a repository directory
    ///
    /// `explicit` overrides the discovered dotfiles; its format follows the
    /// file extension.
    pub fn load(repo_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(repo_dir.join(".reposum.toml")))
            .merge(Yaml::file(repo_dir.join(".reposum.yaml")));

        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::Load(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => {
                    return Err(ConfigError::Load(format!(
                        "unsupported config format: {}",
                        path.display()
                    )))
                },
            };
        }

        let config: Self = figment
            .merge(Env::prefixed("REPOSUM_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        log::debug!(
            "Loaded config: max_tokens={} reserved={} estimator={:?}",
            config.max_tokens,
            config.reserved_tokens,
            config.estimator
        );
        Ok(config)
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_owned()));
        }
        if self.reserved_tokens >= self.max_tokens {
            return Err(ConfigError::Invalid(format!(
                "reserved_tokens ({}) must be below max_tokens ({})",
                self.reserved_tokens, self.max_tokens
            )));
        }
        if self.size_ceiling == 0 {
            return Err(ConfigError::Invalid("size_ceiling must be positive".to_owned()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be positive".to_owned(),
            ));
        }
        let share_sum: u64 = Category::SELECTABLE.iter().map(|&c| u64::from(self.shares.share(c))).sum();
        if share_sum > 1000 {
            return Err(ConfigError::Invalid(format!(
                "category shares sum to {} permille, above 1000",
                share_sum
            )));
        }
        for pattern in &self.exclude.patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("bad exclusion pattern {:?}: {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Render the default configuration (`toml`, `yaml` or `json`)
    pub fn generate_default(format: &str) -> String {
        let config = Self::default();
        match format {
            "yaml" | "yml" => serde_yaml::to_string(&config).unwrap_or_default(),
            "json" => serde_json::to_string_pretty(&config).unwrap_or_default(),
            _ => toml::to_string_pretty(&config).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::str_to_string)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.reserved_tokens, 800);
        assert_eq!(config.size_ceiling, 1_048_576);
        assert_eq!(config.max_concurrent_fetches, 5);
    }

    #[test]
    fn test_reserved_must_be_below_total() {
        let config = EngineConfig { reserved_tokens: 4000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_share_sum_limit() {
        let mut config = EngineConfig::default();
        config.shares.readme = 900;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_glob_rejected() {
        let mut config = EngineConfig::default();
        config.exclude.patterns.push("[unclosed".to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_dotfile() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".reposum.toml"),
            "max_tokens = 8000\n[selection]\nmax_docs = 4\n",
        )
        .unwrap();

        let config = EngineConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.max_tokens, 8000);
        assert_eq!(config.selection.max_docs, 4);
        // untouched keys keep their defaults
        assert_eq!(config.reserved_tokens, 800);
        assert_eq!(config.selection.max_manifests, 5);
    }

    #[test]
    fn test_explicit_yaml_overrides_dotfile() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".reposum.toml"), "max_tokens = 8000\n").unwrap();
        let explicit = dir.path().join("custom.yaml");
        fs::write(&explicit, "max_tokens: 6000\nestimator: chars\n").unwrap();

        let config = EngineConfig::load(dir.path(), Some(&explicit)).unwrap();
        assert_eq!(config.max_tokens, 6000);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let result = EngineConfig::load(dir.path(), Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_generate_default_formats() {
        let toml_text = EngineConfig::generate_default("toml");
        assert!(toml_text.contains("max_tokens = 4000"));

        let yaml_text = EngineConfig::generate_default("yaml");
        assert!(yaml_text.contains("max_tokens: 4000"));

        let json_text = EngineConfig::generate_default("json");
        let parsed: EngineConfig = serde_json::from_str(&json_text).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn test_limits_requested_vs_kept() {
        let limits = SelectionLimits::default();
        assert_eq!(limits.kept(Category::Readme), 1);
        assert_eq!(limits.requested(Category::EntryPointCandidate), 8);
        assert_eq!(limits.kept(Category::EntryPointCandidate), 3);
    }
}
