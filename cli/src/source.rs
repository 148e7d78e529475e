//! Local-filesystem repository source
//!
//! Walks a directory into a `RepositoryTree` and fetches the files the
//! engine plans to read. Performance notes:
//! - Walking uses the `ignore` crate (respects .gitignore, skips hidden files except CI configuration)
//! - Binary sniffing and fetching are parallelized with rayon
//! - Fetches run on a bounded pool; each one succeeds or fails on its own

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;
use reposum_engine::{FetchedContent, FileEntry, RepositoryTree};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Bytes inspected when deciding whether a file is binary
const SNIFF_BYTES: usize = 8 * 1024;

/// Hidden entries walked even without `include_hidden`
const CI_DOTFILES: &[&str] = &[".github", ".circleci", ".buildkite", ".gitlab-ci.yml", ".travis.yml"];

/// Options for walking a repository
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceOptions {
    /// Include hidden files (CI dotfiles are always walked)
    pub(crate) include_hidden: bool,
    /// Respect .gitignore files
    pub(crate) respect_gitignore: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self { include_hidden: false, respect_gitignore: true }
    }
}

/// A repository checked out on the local filesystem
pub(crate) struct LocalSource {
    root: PathBuf,
    options: SourceOptions,
}

impl LocalSource {
    pub(crate) fn new(root: &Path, options: SourceOptions) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Repository not found: {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Not a directory: {}", root.display());
        }
        Ok(Self { root, options })
    }

    /// Directory name, used when no explicit name is given
    pub(crate) fn repo_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".to_owned())
    }

    /// List every file below the root, sorted by path
    pub(crate) fn tree(&self, name: &str) -> Result<RepositoryTree> {
        let include_hidden = self.options.include_hidden;
        let files: Vec<PathBuf> = WalkBuilder::new(&self.root)
            .hidden(false)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                entry.depth() == 0
                    || !name.starts_with('.')
                    || (name != ".git" && (include_hidden || CI_DOTFILES.contains(&&*name)))
            })
            .git_ignore(self.options.respect_gitignore)
            .git_global(self.options.respect_gitignore)
            .git_exclude(self.options.respect_gitignore)
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {}", err);
                    None
                },
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .collect();

        let mut entries: Vec<FileEntry> =
            files.par_iter().filter_map(|path| self.describe(path)).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        log::info!("Scanned {} files under {}", entries.len(), self.root.display());
        Ok(RepositoryTree { name: name.to_owned(), entries })
    }

    fn describe(&self, path: &Path) -> Option<FileEntry> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let rel = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size = fs::metadata(path).map(|m| m.len()).ok()?;

        let mut head = Vec::with_capacity(SNIFF_BYTES.min(size as usize));
        let sniffed = File::open(path)
            .and_then(|f| f.take(SNIFF_BYTES as u64).read_to_end(&mut head))
            .is_ok();
        if !sniffed {
            log::warn!("Cannot read {}", path.display());
            return None;
        }

        Some(if is_binary(&head) { FileEntry::binary(rel, size) } else { FileEntry::new(rel, size) })
    }

    /// Fetch planned files on a pool of `max_concurrent` threads
    ///
    /// Failed reads are logged and left out of the returned map.
    pub(crate) fn fetch_all<'a>(
        &self,
        paths: impl Iterator<Item = &'a str>,
        max_concurrent: usize,
    ) -> Result<HashMap<String, FetchedContent>> {
        let paths: Vec<&str> = paths.collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent.max(1))
            .build()
            .context("Failed to build fetch pool")?;

        let contents: HashMap<String, FetchedContent> = pool.install(|| {
            paths
                .par_iter()
                .filter_map(|rel| self.fetch(rel).map(|content| ((*rel).to_owned(), content)))
                .collect()
        });
        log::debug!("Fetched {} of {} planned files", contents.len(), paths.len());
        Ok(contents)
    }

    fn fetch(&self, rel: &str) -> Option<FetchedContent> {
        let bytes = match fs::read(self.root.join(rel)) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("Failed to read {}: {}", rel, err);
                return None;
            },
        };
        if is_binary(&bytes) {
            return Some(FetchedContent::Binary);
        }
        Some(match String::from_utf8(bytes) {
            Ok(text) => FetchedContent::Text(text),
            Err(_) => FetchedContent::Binary,
        })
    }
}

/// NUL bytes or more than 10% control characters in the first 8 KiB
pub(crate) fn is_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    if head.is_empty() {
        return false;
    }
    if head.contains(&0) {
        return true;
    }
    let control = head
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0c))
        .count();
    control * 10 > head.len()
}
