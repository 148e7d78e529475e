//! Reposum CLI - Token-budgeted repository context for LLM summaries
//!
//! This CLI tool selects the most informative parts of a repository and
//! packs them into a single context blob that fits a token budget.

// CLI tools legitimately use print macros for user output
#![allow(clippy::print_stdout, clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use humansize::{format_size, BINARY};
use reposum_engine::{
    Category, Engine, EngineConfig, FileDecision, Outcome, PackOutput, RepositoryTree,
    SelectionReport,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod source;

use source::{LocalSource, SourceOptions};

/// Reposum - Token-budgeted repository context for LLMs
#[derive(Parser)]
#[command(
    name = "reposum",
    version,
    about = "Pack the most informative parts of a repository into a token budget",
    long_about = "Reposum classifies a repository's files, reduces manifests, sources and READMEs\nto their essentials, and assembles a context blob that never exceeds the token budget."
)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the context blob for a repository
    Pack {
        /// Path to repository (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Repository name used by entry-point heuristics (default: directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Total token ceiling
        #[arg(short = 't', long)]
        max_tokens: Option<u32>,

        /// Tokens held back for the prompt wrapper and response
        #[arg(short, long)]
        reserved: Option<u32>,

        /// Configuration file (toml, yaml or json)
        #[arg(short, long, env = "REPOSUM_CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the selection report to stderr
        #[arg(long)]
        explain: bool,

        /// Include hidden files
        #[arg(long)]
        hidden: bool,

        /// Don't respect .gitignore
        #[arg(long)]
        no_gitignore: bool,
    },

    /// Show the category of every file
    Classify {
        /// Path to repository (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Repository name used by entry-point heuristics (default: directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Configuration file (toml, yaml or json)
        #[arg(short, long, env = "REPOSUM_CONFIG")]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Include hidden files
        #[arg(long)]
        hidden: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Configuration format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ConfigFormat,

        /// Output path (default: .reposum.<format> in current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    /// The context blob as plain text
    Text,
    /// Context, facts and selection report as JSON
    Json,
}

#[derive(ValueEnum, Clone, Copy)]
enum ConfigFormat {
    /// TOML format
    Toml,
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Pack {
            path,
            name,
            max_tokens,
            reserved,
            config,
            format,
            output,
            explain,
            hidden,
            no_gitignore,
        } => {
            let options = SourceOptions { include_hidden: hidden, respect_gitignore: !no_gitignore };
            let overrides = BudgetOverrides { max_tokens, reserved };
            cmd_pack(&path, name, config.as_deref(), overrides, options, format, output, explain)
        },
        Commands::Classify { path, name, config, json, hidden } => {
            let options = SourceOptions { include_hidden: hidden, ..Default::default() };
            cmd_classify(&path, name, config.as_deref(), options, json)
        },
        Commands::Init { format, output, force } => cmd_init(format, output, force),
    }
}

/// Command-line budget settings that win over the config file
#[derive(Debug, Clone, Copy, Default)]
struct BudgetOverrides {
    max_tokens: Option<u32>,
    reserved: Option<u32>,
}

fn load_config(path: &Path, explicit: Option<&Path>, overrides: BudgetOverrides) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(path, explicit).context("Failed to load configuration")?;
    if let Some(max_tokens) = overrides.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(reserved) = overrides.reserved {
        config.reserved_tokens = reserved;
    }
    Ok(config)
}

fn scan(path: &Path, name: Option<String>, options: SourceOptions) -> Result<(LocalSource, RepositoryTree)> {
    let source = LocalSource::new(path, options)?;
    let name = name.unwrap_or_else(|| source.repo_name());
    let tree = source.tree(&name)?;
    Ok((source, tree))
}

fn cmd_pack(
    path: &Path,
    name: Option<String>,
    config: Option<&Path>,
    overrides: BudgetOverrides,
    options: SourceOptions,
    format: OutputFormat,
    output: Option<PathBuf>,
    explain: bool,
) -> Result<()> {
    let start = Instant::now();
    let config = load_config(path, config, overrides)?;
    let engine = Engine::new(config)?;

    let (source, tree) = scan(path, name, options)?;
    let plan = engine.plan(&tree)?;
    let contents = source.fetch_all(plan.paths(), engine.config().max_concurrent_fetches)?;
    let packed = engine.pack(&plan, &contents);

    let rendered = match format {
        OutputFormat::Text => format!("{}\n", packed.context.blob),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&packed)?;
            json.push('\n');
            json
        },
    };

    match &output {
        Some(file) => std::fs::write(file, &rendered)
            .with_context(|| format!("Failed to write output: {}", file.display()))?,
        None => std::io::stdout()
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?,
    }

    if explain {
        print_report(&packed, &tree);
    }
    log::info!("Packed {} in {:.2?}", tree.name, start.elapsed());
    if let Some(file) = output {
        eprintln!(
            "{} Wrote {} ({} tokens) to {}",
            "✓".green(),
            format_size(rendered.len() as u64, BINARY),
            packed.context.total_tokens_used,
            file.display()
        );
    }
    Ok(())
}

fn print_report(packed: &PackOutput, tree: &RepositoryTree) {
    let report: &SelectionReport = &packed.report;
    let budget = &report.budget;

    eprintln!();
    eprintln!("{}", "Selection Report".bold().underline());
    eprintln!(
        "  Scanned:   {} files ({})",
        tree.entries.len(),
        format_size(tree.total_bytes(), BINARY)
    );
    eprintln!("  Filtered:  {} files", report.filtered);
    eprintln!(
        "  Budget:    {} total, {} reserved, {} allocated",
        budget.total, budget.reserved, budget.allocated()
    );
    eprintln!("  Used:      {} tokens", packed.context.total_tokens_used);
    eprintln!();

    for category in Category::SELECTABLE {
        let decisions: Vec<&FileDecision> =
            report.decisions.iter().filter(|d| d.category == category).collect();
        if decisions.is_empty() {
            continue;
        }
        eprintln!(
            "  {} {}",
            category.name().cyan().bold(),
            format!("({} tokens, {} per file)", budget.category(category), budget.file_cap(category))
                .dimmed()
        );
        for decision in decisions {
            print_decision(decision);
        }
    }

    if !packed.context.facts.is_empty() {
        let facts = &packed.context.facts;
        eprintln!();
        eprintln!("  {}", "Detected".cyan().bold());
        for (label, items) in [
            ("languages", &facts.languages),
            ("frameworks", &facts.frameworks),
            ("tools", &facts.tools),
        ] {
            if !items.is_empty() {
                let list: Vec<&str> = items.iter().map(String::as_str).collect();
                eprintln!("    {:<11} {}", label, list.join(", "));
            }
        }
    }
}

fn print_decision(decision: &FileDecision) {
    let score = decision.score.map(|s| format!(" score {}", s)).unwrap_or_default();
    match decision.outcome {
        Outcome::Included => eprintln!(
            "    {} {} {}",
            "✓".green(),
            decision.path,
            format!("({} tokens{})", decision.tokens, score).dimmed()
        ),
        Outcome::Dropped(reason) => eprintln!(
            "    {} {} {}",
            "✗".red(),
            decision.path,
            format!("({}{})", reason.name(), score).dimmed()
        ),
    }
}

#[derive(Serialize)]
struct ClassifiedEntry<'a> {
    path: &'a str,
    category: Category,
    size_bytes: u64,
}

fn cmd_classify(
    path: &Path,
    name: Option<String>,
    config: Option<&Path>,
    options: SourceOptions,
    json: bool,
) -> Result<()> {
    let config = load_config(path, config, BudgetOverrides::default())?;
    let engine = Engine::new(config)?;
    let (_, tree) = scan(path, name, options)?;
    let classified = engine.classify_tree(&tree);

    if json {
        let entries: Vec<ClassifiedEntry<'_>> = classified
            .iter()
            .map(|f| ClassifiedEntry { path: f.path(), category: f.category, size_bytes: f.entry.size_bytes })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for file in &classified {
        *counts.entry(file.category).or_default() += 1;
        let label = format!("{:<15}", file.category.name());
        let label = if file.category == Category::Excluded { label.dimmed() } else { label.cyan() };
        println!("{} {}", label, file.path());
    }

    println!();
    let summary: Vec<String> = counts.iter().map(|(c, n)| format!("{} {}", n, c)).collect();
    println!("{} files: {}", classified.len(), summary.join(", "));
    Ok(())
}

fn cmd_init(format: ConfigFormat, output: Option<PathBuf>, force: bool) -> Result<()> {
    let ext = format.extension();
    let output_path = output.unwrap_or_else(|| PathBuf::from(format!(".reposum.{}", ext)));

    if output_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let config_content = EngineConfig::generate_default(ext);
    std::fs::write(&output_path, &config_content)
        .with_context(|| format!("Failed to write config file: {}", output_path.display()))?;

    println!("{} Created configuration file: {}", "✓".green(), output_path.display());
    println!();
    println!("Edit this file to tune budgets, shares and exclusion rules.");

    Ok(())
}
