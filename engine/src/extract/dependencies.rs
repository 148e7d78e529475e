//! Dependency-name extraction from package manifests
//!
//! Structured manifests (JSON, TOML, YAML) are parsed properly; the rest go
//! through line or regex scanning. Only names survive: versions, extras,
//! markers and comments are discarded.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Recognised manifest formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestKind {
    PackageJson,
    ComposerJson,
    Pyproject,
    Requirements,
    Pipfile,
    SetupPy,
    SetupCfg,
    CargoToml,
    GoMod,
    PomXml,
    Gradle,
    Gemfile,
    MixExs,
    DotNetProject,
    Pubspec,
}

/// Language ecosystem a manifest belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    JavaScript,
    Php,
    Python,
    Rust,
    Go,
    Jvm,
    Ruby,
    Elixir,
    Dart,
    DotNet,
}

impl ManifestKind {
    /// Detect the manifest format from a path
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
        let kind = match name.as_str() {
            "package.json" => Self::PackageJson,
            "composer.json" => Self::ComposerJson,
            "pyproject.toml" => Self::Pyproject,
            "pipfile" => Self::Pipfile,
            "setup.py" => Self::SetupPy,
            "setup.cfg" => Self::SetupCfg,
            "cargo.toml" => Self::CargoToml,
            "go.mod" => Self::GoMod,
            "pom.xml" => Self::PomXml,
            "build.gradle" | "build.gradle.kts" => Self::Gradle,
            "gemfile" => Self::Gemfile,
            "mix.exs" => Self::MixExs,
            "pubspec.yaml" => Self::Pubspec,
            n if n.starts_with("requirements") && n.ends_with(".txt") => Self::Requirements,
            n if n.ends_with(".csproj") || n.ends_with(".fsproj") => Self::DotNetProject,
            _ => return None,
        };
        Some(kind)
    }

    /// Ecosystem of the manifest
    pub fn ecosystem(self) -> Ecosystem {
        match self {
            Self::PackageJson => Ecosystem::JavaScript,
            Self::ComposerJson => Ecosystem::Php,
            Self::Pyproject | Self::Requirements | Self::Pipfile | Self::SetupPy | Self::SetupCfg => {
                Ecosystem::Python
            },
            Self::CargoToml => Ecosystem::Rust,
            Self::GoMod => Ecosystem::Go,
            Self::PomXml | Self::Gradle => Ecosystem::Jvm,
            Self::Gemfile => Ecosystem::Ruby,
            Self::MixExs => Ecosystem::Elixir,
            Self::DotNetProject => Ecosystem::DotNet,
            Self::Pubspec => Ecosystem::Dart,
        }
    }

    /// Package manager implied by the manifest alone
    pub fn default_tool(self) -> &'static str {
        match self {
            Self::PackageJson => "npm",
            Self::ComposerJson => "Composer",
            Self::Pyproject | Self::Requirements => "pip",
            Self::Pipfile => "Pipenv",
            Self::SetupPy | Self::SetupCfg => "setuptools",
            Self::CargoToml => "Cargo",
            Self::GoMod => "Go modules",
            Self::PomXml => "Maven",
            Self::Gradle => "Gradle",
            Self::Gemfile => "Bundler",
            Self::MixExs => "Mix",
            Self::DotNetProject => "NuGet",
            Self::Pubspec => "pub",
        }
    }
}

/// Dependencies declared by one manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySet {
    /// Manifest path
    pub manifest: String,
    pub kind: ManifestKind,
    /// Package manager (Poetry, npm, Cargo …)
    pub tool: &'static str,
    /// Dependency names, sorted and deduplicated
    pub names: BTreeSet<String>,
    /// False when the manifest could not be parsed
    pub parsed: bool,
}

impl DependencySet {
    fn unparsed(manifest: &str, kind: ManifestKind) -> Self {
        Self {
            manifest: manifest.to_owned(),
            kind,
            tool: kind.default_tool(),
            names: BTreeSet::new(),
            parsed: false,
        }
    }

    /// Compact textual form used in the assembled context
    pub fn render(&self) -> String {
        if !self.parsed {
            return format!("{} manifest present", self.tool);
        }
        if self.names.is_empty() {
            return format!("{} manifest, no dependencies declared", self.tool);
        }
        format!("{} dependencies ({}): {}", self.tool, self.names.len(), self.names_list())
    }

    /// Rendered form no longer than `max_len` bytes where possible
    ///
    /// Drops the summary prefix for tiny manifests; the output never
    /// carries version constraints.
    pub fn render_within(&self, max_len: usize) -> String {
        let full = self.render();
        if full.len() <= max_len || !self.parsed || self.names.is_empty() {
            return full;
        }
        self.names_list()
    }

    fn names_list(&self) -> String {
        self.names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}

/// Manifest dependency extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyExtractor;

impl DependencyExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract dependency names; never fails
    ///
    /// Paths that are not a known manifest yield `None`.
    pub fn extract(&self, path: &str, content: &str) -> Option<DependencySet> {
        let kind = ManifestKind::from_path(path)?;
        let mut set = DependencySet::unparsed(path, kind);

        let parsed = match kind {
            ManifestKind::PackageJson => parse_package_json(content, &mut set.names),
            ManifestKind::ComposerJson => parse_composer_json(content, &mut set.names),
            ManifestKind::Pyproject => parse_pyproject(content, &mut set),
            ManifestKind::Pipfile => parse_pipfile(content, &mut set.names),
            ManifestKind::CargoToml => parse_cargo_toml(content, &mut set.names),
            ManifestKind::Pubspec => parse_pubspec(content, &mut set.names),
            ManifestKind::Requirements => {
                scan_requirements(content, &mut set.names);
                true
            },
            ManifestKind::SetupPy => {
                scan_setup_py(content, &mut set.names);
                true
            },
            ManifestKind::SetupCfg => {
                scan_setup_cfg(content, &mut set.names);
                true
            },
            ManifestKind::GoMod => {
                scan_go_mod(content, &mut set.names);
                true
            },
            ManifestKind::PomXml => {
                scan_pom(content, &mut set.names);
                true
            },
            ManifestKind::Gradle => {
                scan_captures(patterns().gradle.as_ref(), content, &mut set.names);
                true
            },
            ManifestKind::Gemfile => {
                scan_captures(patterns().gemfile.as_ref(), content, &mut set.names);
                true
            },
            ManifestKind::MixExs => {
                scan_captures(patterns().mix.as_ref(), content, &mut set.names);
                true
            },
            ManifestKind::DotNetProject => {
                scan_captures(patterns().package_reference.as_ref(), content, &mut set.names);
                true
            },
        };

        if !parsed {
            log::warn!("Unparseable manifest {}, keeping it as evidence only", path);
            set.names.clear();
        }
        set.parsed = parsed;
        Some(set)
    }
}

/// Name part of a PEP 508 requirement (`requests[socks]>=2.0; python_version<'3'`)
pub(crate) fn requirement_name(spec: &str) -> Option<&str> {
    let spec = spec.trim();
    let end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(spec.len());
    let name = spec[..end].trim_end_matches('.');
    (!name.is_empty()).then_some(name)
}

fn insert_keys<'a>(names: &mut BTreeSet<String>, keys: impl Iterator<Item = &'a String>) {
    names.extend(keys.cloned());
}

fn json_object_keys(value: &serde_json::Value, section: &str, names: &mut BTreeSet<String>) {
    if let Some(obj) = value.get(section).and_then(|v| v.as_object()) {
        insert_keys(names, obj.keys());
    }
}

fn parse_package_json(content: &str, names: &mut BTreeSet<String>) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return false;
    };
    if !value.is_object() {
        return false;
    }
    for section in ["dependencies", "devDependencies", "peerDependencies", "optionalDependencies"] {
        json_object_keys(&value, section, names);
    }
    true
}

fn parse_composer_json(content: &str, names: &mut BTreeSet<String>) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return false;
    };
    if !value.is_object() {
        return false;
    }
    for section in ["require", "require-dev"] {
        json_object_keys(&value, section, names);
    }
    names.retain(|n| n != "php" && !n.starts_with("ext-"));
    true
}

fn toml_table_keys(value: Option<&toml::Value>, names: &mut BTreeSet<String>) {
    if let Some(table) = value.and_then(|v| v.as_table()) {
        insert_keys(names, table.keys());
    }
}

fn toml_requirement_array(value: Option<&toml::Value>, names: &mut BTreeSet<String>) {
    if let Some(items) = value.and_then(|v| v.as_array()) {
        names.extend(
            items
                .iter()
                .filter_map(|item| item.as_str())
                .filter_map(requirement_name)
                .map(str::to_owned),
        );
    }
}

fn parse_pyproject(content: &str, set: &mut DependencySet) -> bool {
    let Ok(doc) = toml::from_str::<toml::Table>(content) else {
        return false;
    };

    let project = doc.get("project");
    toml_requirement_array(project.and_then(|p| p.get("dependencies")), &mut set.names);
    if let Some(optional) = project
        .and_then(|p| p.get("optional-dependencies"))
        .and_then(|o| o.as_table())
    {
        for group in optional.values() {
            toml_requirement_array(Some(group), &mut set.names);
        }
    }
    if let Some(groups) = doc.get("dependency-groups").and_then(|g| g.as_table()) {
        for group in groups.values() {
            toml_requirement_array(Some(group), &mut set.names);
        }
    }

    let tool = doc.get("tool");
    if let Some(poetry) = tool.and_then(|t| t.get("poetry")) {
        set.tool = "Poetry";
        toml_table_keys(poetry.get("dependencies"), &mut set.names);
        toml_table_keys(poetry.get("dev-dependencies"), &mut set.names);
        if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
            for group in groups.values() {
                toml_table_keys(group.get("dependencies"), &mut set.names);
            }
        }
        set.names.remove("python");
    } else if tool.and_then(|t| t.get("pdm")).is_some() {
        set.tool = "PDM";
    } else if tool.and_then(|t| t.get("hatch")).is_some() {
        set.tool = "Hatch";
    } else if tool.and_then(|t| t.get("uv")).is_some() {
        set.tool = "uv";
    }
    true
}

fn parse_pipfile(content: &str, names: &mut BTreeSet<String>) -> bool {
    let Ok(doc) = toml::from_str::<toml::Table>(content) else {
        return false;
    };
    toml_table_keys(doc.get("packages"), names);
    toml_table_keys(doc.get("dev-packages"), names);
    true
}

fn cargo_dependency_tables(table: &toml::Table, names: &mut BTreeSet<String>) {
    for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
        let Some(deps) = table.get(section).and_then(|v| v.as_table()) else {
            continue;
        };
        for (key, spec) in deps {
            // `alias = { package = "real-name" }`
            let name = spec.get("package").and_then(|p| p.as_str()).unwrap_or(key);
            names.insert(name.to_owned());
        }
    }
}

fn parse_cargo_toml(content: &str, names: &mut BTreeSet<String>) -> bool {
    let Ok(doc) = toml::from_str::<toml::Table>(content) else {
        return false;
    };
    cargo_dependency_tables(&doc, names);
    if let Some(workspace) = doc.get("workspace").and_then(|w| w.as_table()) {
        cargo_dependency_tables(workspace, names);
    }
    if let Some(targets) = doc.get("target").and_then(|t| t.as_table()) {
        for target in targets.values().filter_map(|t| t.as_table()) {
            cargo_dependency_tables(target, names);
        }
    }
    true
}

fn parse_pubspec(content: &str, names: &mut BTreeSet<String>) -> bool {
    let Ok(doc) = serde_yaml::from_str::<serde_yaml::Value>(content) else {
        return false;
    };
    if !doc.is_mapping() {
        return false;
    }
    for section in ["dependencies", "dev_dependencies"] {
        if let Some(map) = doc.get(section).and_then(|v| v.as_mapping()) {
            names.extend(map.keys().filter_map(|k| k.as_str()).map(str::to_owned));
        }
    }
    true
}

fn scan_requirements(content: &str, names: &mut BTreeSet<String>) {
    for line in content.lines() {
        let line = line.split(" #").next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(egg) = line.split("#egg=").nth(1) {
            if let Some(name) = requirement_name(egg) {
                names.insert(name.to_owned());
            }
            continue;
        }
        if line.starts_with('-') || (line.contains("://") && !line.contains(" @ ")) {
            continue;
        }
        if let Some(name) = requirement_name(line) {
            names.insert(name.to_owned());
        }
    }
}

fn scan_setup_py(content: &str, names: &mut BTreeSet<String>) {
    let p = patterns();
    let (Some(install_requires), Some(quoted_re)) = (&p.install_requires, &p.quoted) else {
        return;
    };
    for block in install_requires.captures_iter(content) {
        for quoted in quoted_re.captures_iter(&block[1]) {
            if let Some(name) = requirement_name(&quoted[1]) {
                names.insert(name.to_owned());
            }
        }
    }
}

fn scan_setup_cfg(content: &str, names: &mut BTreeSet<String>) {
    let mut in_requires = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if in_requires {
            if line.starts_with(|c: char| c.is_whitespace()) && !trimmed.is_empty() {
                if let Some(name) = requirement_name(trimmed) {
                    names.insert(name.to_owned());
                }
                continue;
            }
            in_requires = false;
        }
        if let Some(rest) = trimmed.strip_prefix("install_requires") {
            let value = rest.trim_start().trim_start_matches('=').trim();
            if let Some(name) = requirement_name(value) {
                names.insert(name.to_owned());
            }
            in_requires = true;
        }
    }
}

fn scan_go_mod(content: &str, names: &mut BTreeSet<String>) {
    let mut in_block = false;
    for line in content.lines() {
        let line = line.trim();
        if line.ends_with("// indirect") {
            continue;
        }
        let spec = if in_block {
            if line.starts_with(')') {
                in_block = false;
                continue;
            }
            line
        } else if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_block = true;
                continue;
            }
            rest
        } else {
            continue;
        };
        if let Some(module) = spec.split_whitespace().next().filter(|m| !m.starts_with("//")) {
            names.insert(module.to_owned());
        }
    }
}

fn scan_pom(content: &str, names: &mut BTreeSet<String>) {
    let p = patterns();
    let (Some(dependency), Some(group_re), Some(artifact_re)) =
        (&p.pom_dependency, &p.pom_group, &p.pom_artifact)
    else {
        return;
    };
    for dep in dependency.captures_iter(content) {
        let body = &dep[1];
        let group = group_re.captures(body).map(|c| c[1].trim().to_owned());
        let Some(artifact) = artifact_re.captures(body).map(|c| c[1].trim().to_owned()) else {
            continue;
        };
        names.insert(match group {
            Some(group) => format!("{}:{}", group, artifact),
            None => artifact,
        });
    }
}

fn scan_captures(regex: Option<&Regex>, content: &str, names: &mut BTreeSet<String>) {
    if let Some(regex) = regex {
        names.extend(regex.captures_iter(content).map(|c| c[1].to_owned()));
    }
}

struct ManifestPatterns {
    install_requires: Option<Regex>,
    quoted: Option<Regex>,
    pom_dependency: Option<Regex>,
    pom_group: Option<Regex>,
    pom_artifact: Option<Regex>,
    gradle: Option<Regex>,
    gemfile: Option<Regex>,
    mix: Option<Regex>,
    package_reference: Option<Regex>,
}

static PATTERNS: OnceLock<ManifestPatterns> = OnceLock::new();

fn patterns() -> &'static ManifestPatterns {
    PATTERNS.get_or_init(|| ManifestPatterns {
        install_requires: build_regex(r"(?s)install_requires\s*=\s*\[(.*?)\]"),
        quoted: build_regex(r#"['"]([^'"]+)['"]"#),
        pom_dependency: build_regex(r"(?s)<dependency>(.*?)</dependency>"),
        pom_group: build_regex(r"<groupId>([^<]+)</groupId>"),
        pom_artifact: build_regex(r"<artifactId>([^<]+)</artifactId>"),
        gradle: build_regex(
            r#"(?m)^\s*(?:implementation|api|compileOnly|runtimeOnly|testImplementation|testRuntimeOnly|kapt|ksp|annotationProcessor|compile|testCompile)\s*\(?\s*['"]([^'":\s]+:[^'":\s]+)"#,
        ),
        gemfile: build_regex(r#"(?m)^\s*gem\s+['"]([^'"]+)['"]"#),
        mix: build_regex(r"\{\s*:(\w+)\s*,"),
        package_reference: build_regex(r#"(?i)<PackageReference\s+Include="([^"]+)""#),
    })
}

fn build_regex(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| log::error!("Invalid built-in pattern {:?}: {}", pattern, e))
        .ok()
}
