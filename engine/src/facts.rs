//! Technology facts derived without the language model
//!
//! Languages come from file extensions, frameworks from dependency names,
//! tools from well-known file paths and manifest kinds.

use crate::extract::dependencies::{DependencySet, Ecosystem, ManifestKind};
use crate::types::{CategorizedFile, Category, TechFacts};
use std::collections::{BTreeSet, HashMap};

/// Language for a lowercase file extension
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext {
        "py" | "pyi" | "pyw" => "Python",
        "js" | "mjs" | "cjs" | "jsx" | "vue" | "svelte" => "JavaScript",
        "ts" | "mts" | "cts" | "tsx" => "TypeScript",
        "java" => "Java",
        "go" => "Go",
        "rs" => "Rust",
        "rb" | "rake" => "Ruby",
        "php" => "PHP",
        "cs" => "C#",
        "fs" => "F#",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "C++",
        "c" | "h" => "C",
        "swift" => "Swift",
        "kt" | "kts" => "Kotlin",
        "scala" => "Scala",
        "dart" => "Dart",
        "ex" | "exs" => "Elixir",
        "erl" => "Erlang",
        "clj" | "cljs" => "Clojure",
        "hs" => "Haskell",
        "lua" => "Lua",
        "r" => "R",
        "jl" => "Julia",
        "pl" | "pm" => "Perl",
        "zig" => "Zig",
        "nim" => "Nim",
        "sh" | "bash" | "zsh" => "Shell",
        _ => return None,
    };
    Some(lang)
}

/// Frameworks implied by the extension alone
fn framework_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jsx" | "tsx" => Some("React"),
        "vue" => Some("Vue.js"),
        "svelte" => Some("Svelte"),
        _ => None,
    }
}

/// `(pattern, framework)`; a trailing `*` makes the pattern a prefix match
type FrameworkTable = &'static [(&'static str, &'static str)];

const JS_FRAMEWORKS: FrameworkTable = &[
    ("react", "React"),
    ("react-dom", "React"),
    ("vue", "Vue.js"),
    ("@vue/*", "Vue.js"),
    ("@angular/*", "Angular"),
    ("next", "Next.js"),
    ("nuxt", "Nuxt.js"),
    ("express", "Express.js"),
    ("fastify", "Fastify"),
    ("koa", "Koa"),
    ("hono", "Hono"),
    ("@nestjs/*", "NestJS"),
    ("svelte", "Svelte"),
    ("@sveltejs/*", "Svelte"),
    ("gatsby", "Gatsby"),
    ("@remix-run/*", "Remix"),
    ("electron", "Electron"),
    ("jest", "Jest"),
    ("mocha", "Mocha"),
    ("vitest", "Vitest"),
    ("webpack", "Webpack"),
    ("vite", "Vite"),
    ("tailwindcss", "Tailwind CSS"),
    ("prisma", "Prisma"),
    ("@prisma/*", "Prisma"),
    ("mongoose", "Mongoose"),
    ("sequelize", "Sequelize"),
    ("typeorm", "TypeORM"),
];

const PYTHON_FRAMEWORKS: FrameworkTable = &[
    ("django", "Django"),
    ("djangorestframework", "Django REST Framework"),
    ("flask", "Flask"),
    ("fastapi", "FastAPI"),
    ("torch", "PyTorch"),
    ("pytorch", "PyTorch"),
    ("tensorflow", "TensorFlow"),
    ("pandas", "Pandas"),
    ("numpy", "NumPy"),
    ("langchain", "LangChain"),
    ("langchain-*", "LangChain"),
    ("langgraph", "LangGraph"),
    ("scikit-learn", "scikit-learn"),
    ("sklearn", "scikit-learn"),
    ("celery", "Celery"),
    ("sqlalchemy", "SQLAlchemy"),
    ("pytest", "pytest"),
    ("streamlit", "Streamlit"),
    ("gradio", "Gradio"),
    ("transformers", "Hugging Face Transformers"),
    ("openai", "OpenAI"),
    ("anthropic", "Anthropic"),
    ("pydantic", "Pydantic"),
    ("httpx", "HTTPX"),
    ("aiohttp", "aiohttp"),
    ("requests", "Requests"),
    ("beautifulsoup4", "BeautifulSoup"),
    ("bs4", "BeautifulSoup"),
    ("scrapy", "Scrapy"),
    ("selenium", "Selenium"),
    ("playwright", "Playwright"),
    ("click", "Click"),
    ("typer", "Typer"),
];

const RUST_FRAMEWORKS: FrameworkTable = &[
    ("actix-web", "Actix Web"),
    ("axum", "Axum"),
    ("rocket", "Rocket"),
    ("warp", "Warp"),
    ("tokio", "Tokio"),
    ("serde", "Serde"),
    ("diesel", "Diesel"),
    ("sqlx", "SQLx"),
    ("clap", "Clap"),
    ("tauri", "Tauri"),
    ("bevy", "Bevy"),
];

const GO_FRAMEWORKS: FrameworkTable = &[
    ("github.com/gin-gonic/gin", "Gin"),
    ("github.com/labstack/echo*", "Echo"),
    ("github.com/gofiber/fiber*", "Fiber"),
    ("github.com/gorilla/mux", "Gorilla Mux"),
    ("gorm.io/gorm", "GORM"),
    ("github.com/spf13/cobra", "Cobra"),
];

const JVM_FRAMEWORKS: FrameworkTable = &[
    ("org.springframework.boot:*", "Spring Boot"),
    ("org.springframework*", "Spring"),
    ("io.micronaut*", "Micronaut"),
    ("io.quarkus*", "Quarkus"),
    ("io.ktor*", "Ktor"),
    ("org.hibernate*", "Hibernate"),
    ("junit:*", "JUnit"),
    ("org.junit*", "JUnit"),
];

const RUBY_FRAMEWORKS: FrameworkTable = &[
    ("rails", "Ruby on Rails"),
    ("sinatra", "Sinatra"),
    ("rspec", "RSpec"),
    ("sidekiq", "Sidekiq"),
];

const PHP_FRAMEWORKS: FrameworkTable = &[
    ("laravel/framework", "Laravel"),
    ("symfony/*", "Symfony"),
    ("phpunit/phpunit", "PHPUnit"),
];

const ELIXIR_FRAMEWORKS: FrameworkTable = &[("phoenix", "Phoenix"), ("ecto", "Ecto"), ("ecto_sql", "Ecto")];

const DART_FRAMEWORKS: FrameworkTable = &[("flutter", "Flutter")];

const DOTNET_FRAMEWORKS: FrameworkTable = &[
    ("microsoft.aspnetcore*", "ASP.NET Core"),
    ("microsoft.entityframeworkcore*", "Entity Framework Core"),
    ("xunit", "xUnit"),
    ("nunit", "NUnit"),
];

fn framework_table(ecosystem: Ecosystem) -> FrameworkTable {
    match ecosystem {
        Ecosystem::JavaScript => JS_FRAMEWORKS,
        Ecosystem::Python => PYTHON_FRAMEWORKS,
        Ecosystem::Rust => RUST_FRAMEWORKS,
        Ecosystem::Go => GO_FRAMEWORKS,
        Ecosystem::Jvm => JVM_FRAMEWORKS,
        Ecosystem::Ruby => RUBY_FRAMEWORKS,
        Ecosystem::Php => PHP_FRAMEWORKS,
        Ecosystem::Elixir => ELIXIR_FRAMEWORKS,
        Ecosystem::Dart => DART_FRAMEWORKS,
        Ecosystem::DotNet => DOTNET_FRAMEWORKS,
    }
}

/// First framework whose pattern matches a dependency name
pub fn framework_for_dependency(ecosystem: Ecosystem, name: &str) -> Option<&'static str> {
    let name = name.to_ascii_lowercase();
    framework_table(ecosystem)
        .iter()
        .find(|(pattern, _)| match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == *pattern,
        })
        .map(|(_, framework)| *framework)
}

/// Path fragments that reveal a tool
const PATH_TOOLS: &[(&str, &str)] = &[
    (".github/workflows/", "GitHub Actions"),
    (".gitlab-ci.yml", "GitLab CI"),
    ("jenkinsfile", "Jenkins"),
    (".circleci/", "CircleCI"),
    (".travis.yml", "Travis CI"),
    ("azure-pipelines", "Azure Pipelines"),
    ("bitbucket-pipelines", "Bitbucket Pipelines"),
    (".buildkite/", "Buildkite"),
    ("docker-compose", "Docker Compose"),
    ("kubernetes/", "Kubernetes"),
    ("k8s/", "Kubernetes"),
    ("webpack.config", "Webpack"),
    ("vite.config", "Vite"),
    ("rollup.config", "Rollup"),
    ("tsconfig.json", "TypeScript"),
    ("babel.config", "Babel"),
    (".babelrc", "Babel"),
    (".eslintrc", "ESLint"),
    ("eslint.config", "ESLint"),
    (".prettierrc", "Prettier"),
    ("tox.ini", "tox"),
    ("noxfile.py", "nox"),
    (".pre-commit-config", "pre-commit"),
    ("renovate.json", "Renovate"),
    ("dependabot.yml", "Dependabot"),
];

/// Exact filenames that reveal a tool
const NAME_TOOLS: &[(&str, &str)] = &[
    ("makefile", "Make"),
    ("justfile", "just"),
    ("compose.yml", "Docker Compose"),
    ("compose.yaml", "Docker Compose"),
    ("chart.yaml", "Helm"),
    ("yarn.lock", "Yarn"),
    ("pnpm-lock.yaml", "pnpm"),
    ("bun.lockb", "Bun"),
    ("poetry.lock", "Poetry"),
    ("uv.lock", "uv"),
    ("pipfile.lock", "Pipenv"),
];

/// Top-level directory hints for the structure sentence
const STRUCTURE_HINTS: &[(&str, &str)] = &[
    ("src", "source code in `src/`"),
    ("lib", "library code in `lib/`"),
    ("app", "application code in `app/`"),
    ("tests", "tests in `tests/`"),
    ("test", "tests in `test/`"),
    ("spec", "specs in `spec/`"),
    ("docs", "documentation in `docs/`"),
    ("doc", "documentation in `doc/`"),
    ("examples", "examples in `examples/`"),
    ("scripts", "scripts in `scripts/`"),
    ("bin", "binaries/scripts in `bin/`"),
    ("cmd", "commands in `cmd/`"),
    ("pkg", "packages in `pkg/`"),
    ("internal", "internal packages in `internal/`"),
    ("api", "API code in `api/`"),
    ("web", "web assets in `web/`"),
    ("public", "public assets in `public/`"),
    ("static", "static files in `static/`"),
    ("templates", "templates in `templates/`"),
    ("migrations", "database migrations in `migrations/`"),
];

const MAX_STRUCTURE_ITEMS: usize = 5;

/// Top-level directories whose children are listed in the layout
const LAYOUT_KEY_DIRS: &[&str] = &["src", "lib", "app", "pkg", "cmd"];

const MAX_LAYOUT_TOP_ITEMS: usize = 20;
const MAX_LAYOUT_KEY_DIRS: usize = 10;

/// Trees larger than this get a file-count line
const LAYOUT_COUNT_THRESHOLD: usize = 30;

fn path_tools(path: &str, tools: &mut BTreeSet<String>) {
    let lower = path.to_ascii_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    let framed = format!("/{}", lower);

    for (fragment, tool) in PATH_TOOLS {
        let hit = if fragment.ends_with('/') {
            framed.contains(&format!("/{}", fragment))
        } else {
            lower.contains(fragment)
        };
        if hit {
            tools.insert((*tool).to_owned());
        }
    }
    for (file, tool) in NAME_TOOLS {
        if name == *file {
            tools.insert((*tool).to_owned());
        }
    }
    if name.starts_with("dockerfile") || name.ends_with(".dockerfile") {
        tools.insert("Docker".to_owned());
    }
    if name.ends_with(".tf") {
        tools.insert("Terraform".to_owned());
    }
    if framed.contains("/helm/") {
        tools.insert("Helm".to_owned());
    }
}

/// One-sentence description of the top-level layout
pub fn describe_structure<'a>(paths: impl Iterator<Item = &'a str>) -> String {
    let mut top_dirs = BTreeSet::new();
    let mut any = false;
    for path in paths {
        any = true;
        if let Some((dir, _)) = path.split_once('/') {
            top_dirs.insert(dir.to_owned());
        }
    }
    if !any {
        return "The repository is empty.".to_owned();
    }

    let hints: Vec<&str> = STRUCTURE_HINTS
        .iter()
        .filter(|(dir, _)| top_dirs.contains(*dir))
        .map(|(_, hint)| *hint)
        .take(MAX_STRUCTURE_ITEMS)
        .collect();
    if !hints.is_empty() {
        return format!("The project has {}.", hints.join(", "));
    }
    if !top_dirs.is_empty() {
        let dirs: Vec<String> =
            top_dirs.iter().take(MAX_STRUCTURE_ITEMS).map(|d| format!("`{}/`", d)).collect();
        return format!("Top-level directories include: {}.", dirs.join(", "));
    }
    "The project has a flat structure with files in the root directory.".to_owned()
}

/// Compact directory listing of a tree
///
/// Top-level files and directories (directories end in `/`), then the
/// subdirectories of `src/`, `lib/`, `app/`, `pkg/` and `cmd/` indented by
/// two spaces, then a file count for larger trees.
pub fn compact_layout<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut top = BTreeSet::new();
    let mut key_dirs = BTreeSet::new();
    let mut files = 0usize;

    for path in paths {
        files += 1;
        let mut parts = path.split('/');
        let first = parts.next().unwrap_or(path);
        match (parts.next(), parts.next()) {
            (None, _) => {
                top.insert(first.to_owned());
            },
            (Some(second), rest) => {
                top.insert(format!("{}/", first));
                if rest.is_some() && LAYOUT_KEY_DIRS.contains(&first) {
                    key_dirs.insert(format!("  {}/{}/", first, second));
                }
            },
        }
    }

    let mut lines: Vec<String> = top.into_iter().take(MAX_LAYOUT_TOP_ITEMS).collect();
    lines.extend(key_dirs.into_iter().take(MAX_LAYOUT_KEY_DIRS));
    if files > LAYOUT_COUNT_THRESHOLD {
        lines.push(format!("... ({} files total)", files));
    }
    lines
}

/// Derive languages, frameworks, tools and a structure sentence
///
/// `files` is the full classified tree; excluded entries only contribute
/// lockfile-based tool hints. `dependencies` holds the manifests that were
/// fetched and parsed.
pub fn derive_facts(files: &[CategorizedFile], dependencies: &[DependencySet]) -> TechFacts {
    let mut facts = TechFacts::default();
    let parsed_tools: HashMap<&str, &'static str> =
        dependencies.iter().map(|d| (d.manifest.as_str(), d.tool)).collect();

    for file in files {
        let path = file.path();
        if file.category == Category::Excluded {
            let name = file.entry.filename().to_ascii_lowercase();
            if let Some((_, tool)) = NAME_TOOLS.iter().find(|(n, _)| *n == name) {
                facts.tools.insert((*tool).to_owned());
            }
            continue;
        }

        if let Some(ext) = file.entry.extension() {
            if let Some(lang) = language_for_extension(&ext) {
                facts.languages.insert(lang.to_owned());
            }
            if let Some(framework) = framework_for_extension(&ext) {
                facts.frameworks.insert(framework.to_owned());
            }
        }
        path_tools(path, &mut facts.tools);

        if file.category == Category::PackageConfig {
            let tool = parsed_tools
                .get(path)
                .copied()
                .or_else(|| ManifestKind::from_path(path).map(ManifestKind::default_tool));
            if let Some(tool) = tool {
                facts.tools.insert(tool.to_owned());
            }
        }
    }

    for set in dependencies {
        let ecosystem = set.kind.ecosystem();
        for name in &set.names {
            if let Some(framework) = framework_for_dependency(ecosystem, name) {
                facts.frameworks.insert(framework.to_owned());
            }
        }
    }

    let listed = || files.iter().filter(|f| f.category != Category::Excluded).map(|f| f.path());
    facts.structure = describe_structure(listed());
    facts.layout = compact_layout(listed());
    facts
}

#[cfg(test)]
#[allow(clippy::str_to_string)]
mod tests {
    use super::*;
    use crate::extract::DependencyExtractor;
    use crate::types::FileEntry;

    fn file(path: &str, category: Category) -> CategorizedFile {
        CategorizedFile { entry: FileEntry::new(path, 10), category }
    }

    fn set(vec: &BTreeSet<String>) -> Vec<&str> {
        vec.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_languages_from_extensions() {
        let files = vec![
            file("src/app.py", Category::EntryPointCandidate),
            file("web/App.tsx", Category::SourceSample),
            file("node_modules/x/index.js", Category::Excluded),
        ];
        let facts = derive_facts(&files, &[]);
        assert_eq!(set(&facts.languages), vec!["Python", "TypeScript"]);
        assert_eq!(set(&facts.frameworks), vec!["React"]);
    }

    #[test]
    fn test_frameworks_from_dependencies() {
        let extractor = DependencyExtractor::new();
        let deps = vec![
            extractor
                .extract("package.json", r#"{"dependencies": {"express": "4", "@nestjs/core": "10", "lodash": "4"}}"#)
                .unwrap(),
            extractor.extract("requirements.txt", "fastapi\nuvicorn\n").unwrap(),
        ];
        let files = vec![
            file("package.json", Category::PackageConfig),
            file("requirements.txt", Category::PackageConfig),
        ];
        let facts = derive_facts(&files, &deps);
        assert_eq!(set(&facts.frameworks), vec!["Express.js", "FastAPI", "NestJS"]);
        assert!(facts.tools.contains("npm"));
        assert!(facts.tools.contains("pip"));
    }

    #[test]
    fn test_framework_prefix_patterns() {
        assert_eq!(
            framework_for_dependency(Ecosystem::Jvm, "org.springframework.boot:spring-boot-starter-web"),
            Some("Spring Boot")
        );
        assert_eq!(framework_for_dependency(Ecosystem::Go, "github.com/labstack/echo/v4"), Some("Echo"));
        assert_eq!(framework_for_dependency(Ecosystem::JavaScript, "react-router"), None);
        assert_eq!(framework_for_dependency(Ecosystem::Python, "Django"), Some("Django"));
    }

    #[test]
    fn test_tools_from_paths() {
        let files = vec![
            file(".github/workflows/ci.yml", Category::CiCdConfig),
            file("Dockerfile", Category::CiCdConfig),
            file("deploy/k8s/service.yaml", Category::SourceSample),
            file("infra/main.tf", Category::SourceSample),
            file("Makefile", Category::CiCdConfig),
            file("yarn.lock", Category::Excluded),
            file("Cargo.toml", Category::PackageConfig),
        ];
        let facts = derive_facts(&files, &[]);
        assert_eq!(
            set(&facts.tools),
            vec!["Cargo", "Docker", "GitHub Actions", "Kubernetes", "Make", "Terraform", "Yarn"]
        );
    }

    #[test]
    fn test_poetry_tool_from_parsed_manifest() {
        let deps = vec![DependencyExtractor::new()
            .extract("pyproject.toml", "[tool.poetry]\nname = \"x\"\n")
            .unwrap()];
        let facts = derive_facts(&[file("pyproject.toml", Category::PackageConfig)], &deps);
        assert_eq!(set(&facts.tools), vec!["Poetry"]);
    }

    #[test]
    fn test_structure_sentence() {
        assert_eq!(
            describe_structure(["src/main.rs", "tests/it.rs", "README.md"].into_iter()),
            "The project has source code in `src/`, tests in `tests/`."
        );
        assert_eq!(
            describe_structure(["alpha/x.py", "beta/y.py"].into_iter()),
            "Top-level directories include: `alpha/`, `beta/`."
        );
        assert_eq!(
            describe_structure(["main.go"].into_iter()),
            "The project has a flat structure with files in the root directory."
        );
        assert_eq!(describe_structure(std::iter::empty()), "The repository is empty.");
    }

    #[test]
    fn test_compact_layout() {
        let paths = ["README.md", "src/api/routes.py", "src/main.py", "tests/test_api.py", "docs/index.md"];
        assert_eq!(
            compact_layout(paths.into_iter()),
            vec!["README.md", "docs/", "src/", "tests/", "  src/api/"]
        );
        assert!(compact_layout(std::iter::empty()).is_empty());

        let many: Vec<String> = (0..31).map(|i| format!("pkg/m{}/mod.go", i)).collect();
        let layout = compact_layout(many.iter().map(String::as_str));
        assert_eq!(layout.first().map(String::as_str), Some("pkg/"));
        assert_eq!(layout.iter().filter(|l| l.starts_with("  pkg/")).count(), 10);
        assert_eq!(layout.last().map(String::as_str), Some("... (31 files total)"));
    }

    #[test]
    fn test_layout_skips_excluded_files() {
        let facts = derive_facts(
            &[
                file("src/app.py", Category::EntryPointCandidate),
                file("node_modules/x/index.js", Category::Excluded),
            ],
            &[],
        );
        assert_eq!(facts.layout, vec!["src/"]);
    }
}
