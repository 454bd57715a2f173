//! Static knowledge about toolchains, frameworks and actions.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

/// Languages with a known setup action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// JavaScript and TypeScript on Node.js
    Node,
    Python,
    /// Java and Kotlin on the JVM
    Java,
    Go,
    Rust,
    Ruby,
    Php,
    /// C# and F#
    DotNet,
}

impl Language {
    /// Map an analyzer language name to a toolchain.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "javascript" | "typescript" | "js" | "ts" | "node" | "nodejs" | "node.js" => {
                Some(Self::Node)
            }
            "python" | "py" => Some(Self::Python),
            "java" | "kotlin" | "scala" => Some(Self::Java),
            "go" | "golang" => Some(Self::Go),
            "rust" => Some(Self::Rust),
            "ruby" => Some(Self::Ruby),
            "php" => Some(Self::Php),
            "c#" | "csharp" | "f#" | "fsharp" | "dotnet" | ".net" => Some(Self::DotNet),
            _ => None,
        }
    }

    /// Short identifier used in cache keys and job ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Python => "python",
            Self::Java => "java",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::DotNet => "dotnet",
        }
    }

    /// Name shown in step titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Node => "Node.js",
            Self::Python => "Python",
            Self::Java => "Java",
            Self::Go => "Go",
            Self::Rust => "Rust",
            Self::Ruby => "Ruby",
            Self::Php => "PHP",
            Self::DotNet => ".NET",
        }
    }

    /// Action that installs the toolchain.
    pub fn setup_action(&self) -> &'static str {
        match self {
            Self::Node => "actions/setup-node",
            Self::Python => "actions/setup-python",
            Self::Java => "actions/setup-java",
            Self::Go => "actions/setup-go",
            Self::Rust => "actions-rust-lang/setup-rust-toolchain",
            Self::Ruby => "ruby/setup-ruby",
            Self::Php => "shivammathur/setup-php",
            Self::DotNet => "actions/setup-dotnet",
        }
    }

    /// Input of the setup action that selects the version.
    pub fn version_input(&self) -> &'static str {
        match self {
            Self::Node => "node-version",
            Self::Python => "python-version",
            Self::Java => "java-version",
            Self::Go => "go-version",
            Self::Rust => "toolchain",
            Self::Ruby => "ruby-version",
            Self::Php => "php-version",
            Self::DotNet => "dotnet-version",
        }
    }

    /// Version used when the detection does not name one.
    pub fn default_version(&self) -> &'static str {
        match self {
            Self::Node => "20",
            Self::Python => "3.12",
            Self::Java => "21",
            Self::Go => "1.22",
            Self::Rust => "stable",
            Self::Ruby => "3.3",
            Self::Php => "8.3",
            Self::DotNet => "8.0.x",
        }
    }

    /// Versions covered by the aggressive build matrix.
    pub fn matrix_versions(&self) -> &'static [&'static str] {
        match self {
            Self::Node => &["18", "20", "22"],
            Self::Python => &["3.10", "3.11", "3.12"],
            Self::Java => &["17", "21"],
            Self::Go => &["1.21", "1.22"],
            Self::Rust => &["stable", "beta"],
            Self::Ruby => &["3.2", "3.3"],
            Self::Php => &["8.2", "8.3"],
            Self::DotNet => &["6.0.x", "8.0.x"],
        }
    }

    /// CodeQL language identifier, when CodeQL analyzes the language.
    pub fn codeql_language(&self) -> Option<&'static str> {
        match self {
            Self::Node => Some("javascript-typescript"),
            Self::Python => Some("python"),
            Self::Java => Some("java-kotlin"),
            Self::Go => Some("go"),
            Self::Ruby => Some("ruby"),
            Self::DotNet => Some("csharp"),
            Self::Rust | Self::Php => None,
        }
    }

    /// Package manager assumed when none was detected.
    pub fn default_package_manager(&self) -> PackageManager {
        match self {
            Self::Node => PackageManager::Npm,
            Self::Python => PackageManager::Pip,
            Self::Java => PackageManager::Maven,
            Self::Go => PackageManager::GoModules,
            Self::Rust => PackageManager::Cargo,
            Self::Ruby => PackageManager::Bundler,
            Self::Php => PackageManager::Composer,
            Self::DotNet => PackageManager::Nuget,
        }
    }

    /// Whether a detected language version can be fed to the setup action.
    pub(crate) fn accepts_detected_version(&self, language_name: &str) -> bool {
        // TypeScript and Kotlin versions are compiler versions, not runtimes.
        !matches!(language_name.trim().to_lowercase().as_str(), "typescript" | "ts" | "kotlin" | "scala")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Dependency managers with known commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Pip,
    Poetry,
    Pipenv,
    Cargo,
    GoModules,
    Maven,
    Gradle,
    Bundler,
    Composer,
    Nuget,
}

impl PackageManager {
    /// Map an analyzer package manager or build tool name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "npm" => Some(Self::Npm),
            "yarn" => Some(Self::Yarn),
            "pnpm" => Some(Self::Pnpm),
            "pip" | "pip3" => Some(Self::Pip),
            "poetry" => Some(Self::Poetry),
            "pipenv" => Some(Self::Pipenv),
            "cargo" => Some(Self::Cargo),
            "go" | "go modules" | "gomod" | "go-modules" => Some(Self::GoModules),
            "maven" | "mvn" => Some(Self::Maven),
            "gradle" => Some(Self::Gradle),
            "bundler" | "bundle" | "gem" => Some(Self::Bundler),
            "composer" => Some(Self::Composer),
            "nuget" | "dotnet" => Some(Self::Nuget),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Pip => "pip",
            Self::Poetry => "poetry",
            Self::Pipenv => "pipenv",
            Self::Cargo => "cargo",
            Self::GoModules => "go",
            Self::Maven => "maven",
            Self::Gradle => "gradle",
            Self::Bundler => "bundler",
            Self::Composer => "composer",
            Self::Nuget => "nuget",
        }
    }

    /// Language the manager belongs to.
    pub fn language(&self) -> Language {
        match self {
            Self::Npm | Self::Yarn | Self::Pnpm => Language::Node,
            Self::Pip | Self::Poetry | Self::Pipenv => Language::Python,
            Self::Cargo => Language::Rust,
            Self::GoModules => Language::Go,
            Self::Maven | Self::Gradle => Language::Java,
            Self::Bundler => Language::Ruby,
            Self::Composer => Language::Php,
            Self::Nuget => Language::DotNet,
        }
    }

    /// Glob hashed into the cache key.
    pub fn lock_file(&self) -> &'static str {
        match self {
            Self::Npm => "**/package-lock.json",
            Self::Yarn => "**/yarn.lock",
            Self::Pnpm => "**/pnpm-lock.yaml",
            Self::Pip => "**/requirements*.txt",
            Self::Poetry => "**/poetry.lock",
            Self::Pipenv => "**/Pipfile.lock",
            Self::Cargo => "**/Cargo.lock",
            Self::GoModules => "**/go.sum",
            Self::Maven => "**/pom.xml",
            Self::Gradle => "**/*.gradle*",
            Self::Bundler => "**/Gemfile.lock",
            Self::Composer => "**/composer.lock",
            Self::Nuget => "**/packages.lock.json",
        }
    }

    /// Directories restored by the dependency cache.
    pub fn cache_paths(&self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["~/.npm"],
            Self::Yarn => &["~/.cache/yarn"],
            Self::Pnpm => &["~/.local/share/pnpm/store"],
            Self::Pip => &["~/.cache/pip"],
            Self::Poetry => &["~/.cache/pypoetry"],
            Self::Pipenv => &["~/.cache/pipenv"],
            Self::Cargo => &["~/.cargo/registry", "~/.cargo/git", "target"],
            Self::GoModules => &["~/go/pkg/mod", "~/.cache/go-build"],
            Self::Maven => &["~/.m2/repository"],
            Self::Gradle => &["~/.gradle/caches", "~/.gradle/wrapper"],
            Self::Bundler => &["vendor/bundle"],
            Self::Composer => &["vendor"],
            Self::Nuget => &["~/.nuget/packages"],
        }
    }

    /// Command that makes the manager itself available after language setup.
    pub fn bootstrap_command(&self) -> Option<&'static str> {
        match self {
            Self::Pnpm => Some("corepack enable"),
            Self::Poetry => Some("pipx install poetry"),
            Self::Pipenv => Some("pip install pipenv"),
            _ => None,
        }
    }

    /// Reproducible dependency install.
    pub fn install_command(&self) -> &'static str {
        match self {
            Self::Npm => "npm ci",
            Self::Yarn => "yarn install --frozen-lockfile",
            Self::Pnpm => "pnpm install --frozen-lockfile",
            Self::Pip => {
                "python -m pip install --upgrade pip\nif [ -f requirements.txt ]; then pip install -r requirements.txt; fi"
            }
            Self::Poetry => "poetry install --no-interaction",
            Self::Pipenv => "pipenv install --deploy --dev",
            Self::Cargo => "cargo fetch --locked",
            Self::GoModules => "go mod download",
            Self::Maven => "mvn -B dependency:go-offline",
            Self::Gradle => "./gradlew dependencies",
            Self::Bundler => "bundle install --jobs 4 --retry 3",
            Self::Composer => "composer install --no-interaction --prefer-dist",
            Self::Nuget => "dotnet restore",
        }
    }

    /// Build command, when the ecosystem has a build phase.
    pub fn build_command(&self) -> Option<String> {
        match self {
            Self::Npm | Self::Yarn | Self::Pnpm => self.run_script("build"),
            Self::Pip | Self::Pipenv => Some("python -m compileall -q .".to_string()),
            Self::Poetry => Some("poetry build".to_string()),
            Self::Cargo => Some("cargo build --release --locked".to_string()),
            Self::GoModules => Some("go build -v -o bin/ ./...".to_string()),
            Self::Maven => Some("mvn -B package -DskipTests".to_string()),
            Self::Gradle => Some("./gradlew build -x test".to_string()),
            Self::Nuget => Some("dotnet publish --configuration Release --output out".to_string()),
            Self::Bundler | Self::Composer => None,
        }
    }

    /// Default test command.
    pub fn test_command(&self) -> String {
        match self {
            Self::Npm => "npm test".to_string(),
            Self::Yarn => "yarn test".to_string(),
            Self::Pnpm => "pnpm test".to_string(),
            Self::Pip => "python -m pytest".to_string(),
            Self::Poetry => "poetry run pytest".to_string(),
            Self::Pipenv => "pipenv run pytest".to_string(),
            Self::Cargo => "cargo test --locked".to_string(),
            Self::GoModules => "go test -race ./...".to_string(),
            Self::Maven => "mvn -B test".to_string(),
            Self::Gradle => "./gradlew test".to_string(),
            Self::Bundler => "bundle exec rake test".to_string(),
            Self::Composer => "vendor/bin/phpunit".to_string(),
            Self::Nuget => "dotnet test --no-restore".to_string(),
        }
    }

    /// Native dependency audit, when the ecosystem ships one.
    pub fn audit_command(&self) -> Option<&'static str> {
        match self {
            Self::Npm => Some("npm audit --audit-level=high"),
            Self::Yarn => Some("yarn audit --level high"),
            Self::Pnpm => Some("pnpm audit --audit-level high"),
            Self::Pip | Self::Poetry => Some("pip install pip-audit\npip-audit"),
            Self::Pipenv => Some("pipenv check"),
            Self::Cargo => Some("cargo install cargo-audit --locked\ncargo audit"),
            Self::GoModules => {
                Some("go install golang.org/x/vuln/cmd/govulncheck@latest\ngovulncheck ./...")
            }
            Self::Bundler => Some("gem install bundler-audit\nbundle-audit check --update"),
            Self::Composer => Some("composer audit"),
            Self::Nuget => Some("dotnet list package --vulnerable --include-transitive"),
            Self::Maven | Self::Gradle => None,
        }
    }

    /// Command that bumps dependencies within their constraints.
    pub fn update_command(&self) -> Option<&'static str> {
        match self {
            Self::Npm => Some("npm update"),
            Self::Yarn => Some("yarn upgrade"),
            Self::Pnpm => Some("pnpm update"),
            Self::Pip => Some("pip install pip-tools\npip-compile --upgrade"),
            Self::Poetry => Some("poetry update"),
            Self::Pipenv => Some("pipenv update"),
            Self::Cargo => Some("cargo update"),
            Self::GoModules => Some("go get -u ./...\ngo mod tidy"),
            Self::Maven => Some("mvn -B versions:use-latest-releases"),
            Self::Bundler => Some("bundle update"),
            Self::Composer => Some("composer update"),
            Self::Gradle | Self::Nuget => None,
        }
    }

    /// Benchmark command, when the ecosystem has a convention for one.
    pub fn bench_command(&self) -> Option<String> {
        match self {
            Self::Npm | Self::Yarn | Self::Pnpm => self.run_script("bench"),
            Self::Pip | Self::Poetry | Self::Pipenv => {
                Some(self.exec("pytest --benchmark-only --benchmark-json=benchmark.json"))
            }
            Self::Cargo => Some("cargo bench -- --output-format bencher | tee output.txt".to_string()),
            Self::GoModules => Some("go test -run=^$ -bench=. -benchmem ./... | tee benchmark.txt".to_string()),
            _ => None,
        }
    }

    /// Run a package script, for managers that have scripts.
    pub fn run_script(&self, script: &str) -> Option<String> {
        match self {
            Self::Npm => Some(format!("npm run {script} --if-present")),
            Self::Yarn => Some(format!("yarn run {script}")),
            Self::Pnpm => Some(format!("pnpm run --if-present {script}")),
            Self::Composer => Some(format!("composer run-script {script}")),
            _ => None,
        }
    }

    /// Run a tool installed as a project dependency.
    pub fn exec(&self, command: &str) -> String {
        match self {
            Self::Npm => format!("npx {command}"),
            Self::Yarn => format!("yarn {command}"),
            Self::Pnpm => format!("pnpm exec {command}"),
            Self::Poetry => format!("poetry run {command}"),
            Self::Pipenv => format!("pipenv run {command}"),
            Self::Bundler => format!("bundle exec {command}"),
            _ => command.to_string(),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a framework is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkKind {
    /// Compiles to static assets
    Static,
    /// Long-running server process
    Server,
    /// Server-rendered frontend
    Fullstack,
}

/// What the generators know about a framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkProfile {
    pub name: &'static str,
    pub language: Language,
    pub kind: FrameworkKind,
    /// Build output directory
    pub output_dir: Option<&'static str>,
    /// Database migration command
    pub migration: Option<&'static str>,
    /// Port the app listens on locally
    pub port: u16,
}

impl FrameworkProfile {
    /// Whether the framework produces static assets only.
    pub fn is_static(&self) -> bool {
        self.kind == FrameworkKind::Static
    }
}

const fn profile(
    name: &'static str,
    language: Language,
    kind: FrameworkKind,
    output_dir: Option<&'static str>,
    migration: Option<&'static str>,
    port: u16,
) -> FrameworkProfile {
    FrameworkProfile { name, language, kind, output_dir, migration, port }
}

static FRAMEWORKS: Lazy<HashMap<&'static str, FrameworkProfile>> = Lazy::new(|| {
    use FrameworkKind::{Fullstack, Server, Static};
    use Language::{DotNet, Go, Java, Node, Php, Python, Ruby, Rust};

    let profiles = [
        profile("react", Node, Static, Some("build"), None, 3000),
        profile("vue", Node, Static, Some("dist"), None, 5173),
        profile("angular", Node, Static, Some("dist"), None, 4200),
        profile("svelte", Node, Static, Some("build"), None, 5173),
        profile("gatsby", Node, Static, Some("public"), None, 9000),
        profile("astro", Node, Static, Some("dist"), None, 4321),
        profile("next", Node, Fullstack, Some(".next"), None, 3000),
        profile("nuxt", Node, Fullstack, Some(".output"), None, 3000),
        profile("remix", Node, Fullstack, Some("build"), None, 3000),
        profile("sveltekit", Node, Fullstack, Some("build"), None, 3000),
        profile("express", Node, Server, None, None, 3000),
        profile("nestjs", Node, Server, Some("dist"), None, 3000),
        profile("fastify", Node, Server, None, None, 3000),
        profile("django", Python, Server, None, Some("python manage.py migrate --noinput"), 8000),
        profile("flask", Python, Server, None, Some("flask db upgrade"), 5000),
        profile("fastapi", Python, Server, None, Some("alembic upgrade head"), 8000),
        profile("rails", Ruby, Fullstack, None, Some("bundle exec rails db:migrate"), 3000),
        profile("sinatra", Ruby, Server, None, None, 4567),
        profile("laravel", Php, Fullstack, None, Some("php artisan migrate --force"), 8000),
        profile("symfony", Php, Server, None, Some("php bin/console doctrine:migrations:migrate --no-interaction"), 8000),
        profile("spring", Java, Server, Some("target"), None, 8080),
        profile("quarkus", Java, Server, Some("target"), None, 8080),
        profile("gin", Go, Server, Some("bin"), None, 8080),
        profile("echo", Go, Server, Some("bin"), None, 8080),
        profile("fiber", Go, Server, Some("bin"), None, 3000),
        profile("actix", Rust, Server, Some("target/release"), None, 8080),
        profile("axum", Rust, Server, Some("target/release"), None, 3000),
        profile("rocket", Rust, Server, Some("target/release"), None, 8000),
        profile("aspnetcore", DotNet, Server, Some("out"), Some("dotnet ef database update"), 8080),
    ];

    profiles.into_iter().map(|p| (p.name, p)).collect()
});

fn normalize_framework(name: &str) -> String {
    let lowered: String = name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '-' | '_'))
        .collect();

    match lowered.as_str() {
        "nextjs" => "next".to_string(),
        "nuxtjs" => "nuxt".to_string(),
        "reactjs" => "react".to_string(),
        "vuejs" => "vue".to_string(),
        "expressjs" => "express".to_string(),
        "nest" => "nestjs".to_string(),
        "springboot" => "spring".to_string(),
        "rubyonrails" => "rails".to_string(),
        "actixweb" => "actix".to_string(),
        "aspnet" | "aspnetcore" => "aspnetcore".to_string(),
        "gingonic" => "gin".to_string(),
        other => other.to_string(),
    }
}

/// Look up a framework by analyzer name.
pub fn framework_profile(name: &str) -> Option<&'static FrameworkProfile> {
    FRAMEWORKS.get(normalize_framework(name).as_str())
}

/// Test command for a named testing framework.
pub fn testing_command(name: &str, package_manager: Option<PackageManager>) -> Option<String> {
    let exec = |cmd: &str| match package_manager {
        Some(pm) => pm.exec(cmd),
        None => cmd.to_string(),
    };

    let command = match name.trim().to_lowercase().as_str() {
        "jest" => exec("jest --ci --coverage"),
        "vitest" => exec("vitest run --coverage"),
        "mocha" => exec("mocha"),
        "jasmine" => exec("jasmine"),
        "karma" => exec("karma start --single-run"),
        "playwright" => format!("{}\n{}", exec("playwright install --with-deps"), exec("playwright test")),
        "cypress" => exec("cypress run"),
        "pytest" => exec("pytest --junitxml=test-results.xml"),
        "unittest" => "python -m unittest discover".to_string(),
        "rspec" => "bundle exec rspec".to_string(),
        "minitest" => "bundle exec rake test".to_string(),
        "phpunit" => "vendor/bin/phpunit".to_string(),
        "pest" => "vendor/bin/pest".to_string(),
        "go test" | "testing" | "gotest" => "go test -race ./...".to_string(),
        "cargo test" | "cargo-test" => "cargo test --locked".to_string(),
        "cargo-nextest" | "nextest" => "cargo nextest run --locked".to_string(),
        "junit" | "testng" => match package_manager {
            Some(PackageManager::Gradle) => "./gradlew test".to_string(),
            _ => "mvn -B test".to_string(),
        },
        "xunit" | "nunit" | "mstest" => "dotnet test --no-restore".to_string(),
        _ => return None,
    };

    Some(command)
}

/// An action reference `owner/repo@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionRef {
    pub name: String,
    pub version: String,
}

impl ActionRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }

    /// Parse `owner/repo@version`.
    pub fn parse(reference: &str) -> Option<Self> {
        let (name, version) = reference.rsplit_once('@')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(name, version))
    }

    /// Whether the reference names a fixed release or commit.
    pub fn is_pinned(&self) -> bool {
        is_pinned_version(&self.version)
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Whether a ref is a release tag or commit SHA rather than a moving branch.
pub fn is_pinned_version(version: &str) -> bool {
    let version = version.trim();
    if matches!(version.to_lowercase().as_str(), "main" | "master" | "latest" | "head" | "develop" | "dev") {
        return false;
    }
    let is_sha = version.len() == 40 && version.chars().all(|c| c.is_ascii_hexdigit());
    let is_tag = version.trim_start_matches('v').chars().next().is_some_and(|c| c.is_ascii_digit());
    is_sha || is_tag
}

static ACTION_VERSIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("actions/checkout", "v4"),
        ("actions/cache", "v4"),
        ("actions/upload-artifact", "v4"),
        ("actions/download-artifact", "v4"),
        ("actions/setup-node", "v4"),
        ("actions/setup-python", "v5"),
        ("actions/setup-java", "v4"),
        ("actions/setup-go", "v5"),
        ("actions/setup-dotnet", "v4"),
        ("actions/github-script", "v7"),
        ("actions/configure-pages", "v5"),
        ("actions/upload-pages-artifact", "v3"),
        ("actions/deploy-pages", "v4"),
        ("actions/dependency-review-action", "v4"),
        ("actions-rust-lang/setup-rust-toolchain", "v1"),
        ("ruby/setup-ruby", "v1"),
        ("shivammathur/setup-php", "v2"),
        ("github/codeql-action/init", "v3"),
        ("github/codeql-action/autobuild", "v3"),
        ("github/codeql-action/analyze", "v3"),
        ("github/codeql-action/upload-sarif", "v3"),
        ("aquasecurity/trivy-action", "0.28.0"),
        ("trufflesecurity/trufflehog", "v3.88.0"),
        ("docker/setup-buildx-action", "v3"),
        ("docker/login-action", "v3"),
        ("docker/metadata-action", "v5"),
        ("docker/build-push-action", "v6"),
        ("aws-actions/configure-aws-credentials", "v4"),
        ("google-github-actions/auth", "v2"),
        ("azure/login", "v2"),
        ("azure/setup-kubectl", "v4"),
        ("azure/k8s-set-context", "v4"),
        ("amondnet/vercel-action", "v25"),
        ("nwtgck/actions-netlify", "v3"),
        ("treosh/lighthouse-ci-action", "v12"),
        ("grafana/setup-k6-action", "v1"),
        ("grafana/run-k6-action", "v1"),
        ("cypress-io/github-action", "v6"),
        ("codecov/codecov-action", "v4"),
        ("peter-evans/create-pull-request", "v7"),
        ("benchmark-action/github-action-benchmark", "v1"),
        ("slackapi/slack-github-action", "v2"),
        ("dorny/paths-filter", "v3"),
    ])
});

/// Known release for an action, falling back to `v1`.
pub fn action_ref(name: &str) -> ActionRef {
    let version = ACTION_VERSIONS.get(name).copied().unwrap_or("v1");
    ActionRef::new(name, version)
}

/// Whether the catalog knows a release for the action.
pub fn is_known_action(name: &str) -> bool {
    ACTION_VERSIONS.contains_key(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_aliases() {
        assert_eq!(Language::from_name("TypeScript"), Some(Language::Node));
        assert_eq!(Language::from_name("golang"), Some(Language::Go));
        assert_eq!(Language::from_name("C#"), Some(Language::DotNet));
        assert_eq!(Language::from_name("cobol"), None);
    }

    #[test]
    fn test_every_language_has_setup_action_in_catalog() {
        for language in [
            Language::Node,
            Language::Python,
            Language::Java,
            Language::Go,
            Language::Rust,
            Language::Ruby,
            Language::Php,
            Language::DotNet,
        ] {
            assert!(is_known_action(language.setup_action()), "{language}");
            assert!(!language.matrix_versions().is_empty());
            assert_eq!(language.default_package_manager().language(), language);
        }
    }

    #[test]
    fn test_framework_lookup_normalizes_names() {
        assert_eq!(framework_profile("Next.js").unwrap().name, "next");
        assert_eq!(framework_profile("spring-boot").unwrap().name, "spring");
        assert_eq!(framework_profile("ASP.NET Core").unwrap().name, "aspnetcore");
        assert!(framework_profile("react").unwrap().is_static());
        assert!(framework_profile("unknown-thing").is_none());
    }

    #[test]
    fn test_migration_commands() {
        assert_eq!(
            framework_profile("django").unwrap().migration,
            Some("python manage.py migrate --noinput")
        );
        assert_eq!(
            framework_profile("rails").unwrap().migration,
            Some("bundle exec rails db:migrate")
        );
        assert!(framework_profile("react").unwrap().migration.is_none());
    }

    #[test]
    fn test_testing_command_uses_package_manager() {
        assert_eq!(
            testing_command("jest", Some(PackageManager::Pnpm)).unwrap(),
            "pnpm exec jest --ci --coverage"
        );
        assert_eq!(testing_command("pytest", None).unwrap(), "pytest --junitxml=test-results.xml");
        assert!(testing_command("made-up", None).is_none());
    }

    #[test]
    fn test_action_pinning() {
        assert!(action_ref("actions/checkout").is_pinned());
        assert!(action_ref("aquasecurity/trivy-action").is_pinned());
        assert!(!ActionRef::parse("some/action@main").unwrap().is_pinned());
        assert!(ActionRef::parse(&format!("a/b@{}", "f".repeat(40))).unwrap().is_pinned());
        assert_eq!(action_ref("unknown/action").to_string(), "unknown/action@v1");
        assert!(ActionRef::parse("no-version").is_none());
    }
}
