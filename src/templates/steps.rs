//! Reusable step builders.
//!
//! A [`Toolchain`] condenses the resolved detection into the handful of
//! facts step builders need. [`StepLibrary`] turns it into ordered steps:
//! checkout, setup, cache, install, build, test, audit, artifact upload.

use crate::detection::{ResolvedDetection, TestType};
use crate::error::GenerationWarning;
use crate::workflow::{MatrixAxis, Step};

use super::cache::{TemplateCache, TemplateKey};
use super::catalog::{self, FrameworkProfile, Language, PackageManager};

/// Toolchain derived from a resolved detection.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    /// Language with a known setup action
    pub language: Option<Language>,

    /// Runtime version for the setup action
    pub version: Option<String>,

    pub package_manager: Option<PackageManager>,

    /// Profile of the primary framework, when known
    pub framework: Option<&'static FrameworkProfile>,

    /// Primary framework name as detected
    pub framework_name: Option<String>,

    /// Unit test command from the detected testing framework
    pub unit_test_command: Option<String>,

    /// Problems met while deriving the toolchain
    pub warnings: Vec<GenerationWarning>,
}

impl Toolchain {
    /// Derive the toolchain. Never fails; gaps become warnings.
    pub fn from_detection(detection: &ResolvedDetection) -> Self {
        let mut warnings = Vec::new();

        let framework_name = detection.primary_framework().map(|f| f.name.clone());
        let framework = framework_name.as_deref().and_then(catalog::framework_profile);
        if let (Some(name), None) = (&framework_name, framework) {
            warnings.push(GenerationWarning::TemplateFallback {
                component: "templates".to_string(),
                reason: format!("no framework template for '{name}'"),
            });
        }

        let detected_pm = detection
            .package_manager
            .as_ref()
            .and_then(|pm| PackageManager::from_name(&pm.name))
            .or_else(|| {
                detection.build_tool.as_ref().and_then(|bt| PackageManager::from_name(&bt.name))
            });

        let declared_language = detection.primary_language.as_ref();
        let mut language = declared_language.and_then(|l| Language::from_name(&l.name));
        if let (Some(declared), None) = (declared_language, language) {
            warnings.push(GenerationWarning::TemplateFallback {
                component: "templates".to_string(),
                reason: format!("no setup template for language '{}'", declared.name),
            });
        }
        if language.is_none() {
            language = framework.map(|f| f.language).or(detected_pm.map(|pm| pm.language()));
        }

        let package_manager = match (language, detected_pm) {
            (Some(lang), Some(pm)) if pm.language() == lang => Some(pm),
            (Some(lang), _) => Some(lang.default_package_manager()),
            (None, _) => None,
        };

        let version = language.map(|lang| {
            declared_language
                .filter(|l| Language::from_name(&l.name) == Some(lang))
                .filter(|l| lang.accepts_detected_version(&l.name))
                .and_then(|l| l.version.as_deref())
                .filter(|v| v.chars().next().is_some_and(|c| c.is_ascii_digit()))
                .unwrap_or(lang.default_version())
                .to_string()
        });

        let unit_test_command = detection
            .testing_frameworks_of(TestType::Unit)
            .into_iter()
            .chain(detection.testing_frameworks_of(TestType::Integration))
            .find_map(|t| catalog::testing_command(&t.name, package_manager));

        if language.is_none() {
            warnings.push(GenerationWarning::TemplateFallback {
                component: "templates".to_string(),
                reason: "no supported language detected, using generic steps".to_string(),
            });
        }

        Self {
            language,
            version,
            package_manager,
            framework,
            framework_name,
            unit_test_command,
            warnings,
        }
    }

    /// Whether steps fall back to the generic template.
    pub fn is_generic(&self) -> bool {
        self.language.is_none()
    }

    /// Cache key language component.
    pub fn language_key(&self) -> &str {
        self.language.map_or("generic", |l| l.as_str())
    }

    /// Cache key framework component.
    pub fn framework_key(&self) -> &str {
        self.framework.map_or("", |f| f.name)
    }

    pub fn test_command(&self) -> String {
        if let Some(command) = &self.unit_test_command {
            return command.clone();
        }
        match self.package_manager {
            Some(pm) => pm.test_command(),
            None => "if [ -f Makefile ]; then make test; else echo \"No test command configured\"; fi"
                .to_string(),
        }
    }

    pub fn build_command(&self) -> Option<String> {
        match self.package_manager {
            Some(pm) => pm.build_command(),
            None => Some(
                "if [ -f Makefile ]; then make; else echo \"No build command configured\"; fi"
                    .to_string(),
            ),
        }
    }

    /// Directory or glob holding build output.
    pub fn artifact_path(&self) -> Option<&'static str> {
        if let Some(dir) = self.framework.and_then(|f| f.output_dir) {
            return Some(dir);
        }
        match self.package_manager? {
            PackageManager::Npm | PackageManager::Yarn | PackageManager::Pnpm => Some("dist"),
            PackageManager::Poetry => Some("dist"),
            PackageManager::Cargo => Some("target/release"),
            PackageManager::GoModules => Some("bin"),
            PackageManager::Maven => Some("target/*.jar"),
            PackageManager::Gradle => Some("build/libs"),
            PackageManager::Nuget => Some("out"),
            _ => None,
        }
    }

    /// Matrix axis over runtime versions.
    pub fn matrix_axis(&self) -> Option<(String, MatrixAxis)> {
        let language = self.language?;
        Some((language.version_input().to_string(), MatrixAxis::values(language.matrix_versions().iter().copied())))
    }
}

/// Step builders bound to a toolchain and the template cache.
#[derive(Debug, Clone, Copy)]
pub struct StepLibrary<'a> {
    toolchain: &'a Toolchain,
    cache: &'a TemplateCache,
}

impl<'a> StepLibrary<'a> {
    pub fn new(toolchain: &'a Toolchain, cache: &'a TemplateCache) -> Self {
        Self { toolchain, cache }
    }

    pub fn toolchain(&self) -> &'a Toolchain {
        self.toolchain
    }

    /// Resolved `owner/repo@version` for an action.
    pub fn action(&self, name: &str) -> String {
        let key = TemplateKey::new(self.toolchain.language_key(), self.toolchain.framework_key(), name);
        self.cache.resolve(key, || catalog::action_ref(name)).to_string()
    }

    pub fn checkout(&self) -> Step {
        Step::uses("Checkout", self.action("actions/checkout"))
    }

    /// Language setup. With `matrix`, the version comes from the matrix axis.
    pub fn setup(&self, matrix: bool) -> Vec<Step> {
        let Some(language) = self.toolchain.language else {
            return Vec::new();
        };

        let version = if matrix {
            format!("${{{{ matrix.{} }}}}", language.version_input())
        } else {
            self.toolchain.version.clone().unwrap_or_else(|| language.default_version().to_string())
        };

        let mut setup = Step::uses(format!("Set up {}", language.display_name()), self.action(language.setup_action()))
            .with(language.version_input(), version);
        match language {
            Language::Java => setup = setup.with("distribution", "temurin"),
            Language::Php => setup = setup.with("tools", "composer"),
            _ => {}
        }

        let mut steps = vec![setup];
        if let Some(bootstrap) = self.toolchain.package_manager.and_then(|pm| pm.bootstrap_command()) {
            steps.push(Step::run("Install package manager", bootstrap));
        }
        steps
    }

    /// Dependency cache keyed by the lockfile hash.
    pub fn dependency_cache(&self) -> Option<Step> {
        let pm = self.toolchain.package_manager?;
        let prefix = format!("${{{{ runner.os }}}}-{}-", pm.as_str());
        Some(
            Step::uses("Cache dependencies", self.action("actions/cache"))
                .with("path", pm.cache_paths().join("\n"))
                .with("key", format!("{prefix}${{{{ hashFiles('{}') }}}}", pm.lock_file()))
                .with("restore-keys", prefix),
        )
    }

    pub fn install(&self) -> Option<Step> {
        let pm = self.toolchain.package_manager?;
        Some(Step::run("Install dependencies", pm.install_command()))
    }

    pub fn build(&self) -> Option<Step> {
        self.toolchain.build_command().map(|cmd| Step::run("Build", cmd))
    }

    pub fn test(&self) -> Step {
        Step::run("Run tests", self.toolchain.test_command())
    }

    /// Dependency audit with the ecosystem tool, or a filesystem scan.
    pub fn audit(&self) -> Step {
        match self.toolchain.package_manager.and_then(|pm| pm.audit_command()) {
            Some(command) => Step::run("Audit dependencies", command),
            None => self.filesystem_scan(),
        }
    }

    /// Trivy filesystem scan.
    pub fn filesystem_scan(&self) -> Step {
        Step::uses("Scan dependencies", self.action("aquasecurity/trivy-action"))
            .with("scan-type", "fs")
            .with("scan-ref", ".")
            .with("severity", "HIGH,CRITICAL")
            .with("exit-code", "1")
    }

    pub fn upload_artifact(&self, name: &str) -> Option<Step> {
        let path = self.toolchain.artifact_path()?;
        Some(
            Step::uses("Upload build artifact", self.action("actions/upload-artifact"))
                .with("name", name)
                .with("path", path)
                .with("retention-days", "7"),
        )
    }

    pub fn download_artifact(&self, name: &str) -> Option<Step> {
        let path = self.toolchain.artifact_path()?;
        Some(
            Step::uses("Download build artifact", self.action("actions/download-artifact"))
                .with("name", name)
                .with("path", path.trim_end_matches("/*.jar")),
        )
    }

    /// Checkout, setup, optional cache and install.
    pub fn prepare(&self, cache: bool, matrix: bool) -> Vec<Step> {
        let mut steps = vec![self.checkout()];
        steps.extend(self.setup(matrix));
        if cache {
            steps.extend(self.dependency_cache());
        }
        steps.extend(self.install());
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{
        ConflictResolver, DetectionResult, FrameworkCategory, FrameworkDetection, LanguageDetection,
        PackageManagerDetection, TestingFrameworkDetection,
    };

    fn node_detection() -> ResolvedDetection {
        let detection = DetectionResult {
            frameworks: vec![FrameworkDetection {
                name: "react".to_string(),
                confidence: 0.9,
                category: FrameworkCategory::Frontend,
                ..Default::default()
            }],
            languages: vec![LanguageDetection {
                name: "TypeScript".to_string(),
                version: Some("5.3".to_string()),
                confidence: 0.9,
                primary: true,
            }],
            package_managers: vec![PackageManagerDetection {
                name: "pnpm".to_string(),
                lock_file: Some("pnpm-lock.yaml".to_string()),
                confidence: 0.9,
            }],
            testing_frameworks: vec![TestingFrameworkDetection {
                name: "vitest".to_string(),
                confidence: 0.8,
                ..Default::default()
            }],
            ..Default::default()
        };
        ConflictResolver::new().resolve(&detection).unwrap()
    }

    #[test]
    fn test_toolchain_from_node_detection() {
        let toolchain = Toolchain::from_detection(&node_detection());
        assert_eq!(toolchain.language, Some(Language::Node));
        assert_eq!(toolchain.package_manager, Some(PackageManager::Pnpm));
        // TypeScript's version is not a Node version.
        assert_eq!(toolchain.version.as_deref(), Some("20"));
        assert_eq!(toolchain.test_command(), "pnpm exec vitest run --coverage");
        assert_eq!(toolchain.artifact_path(), Some("build"));
        assert!(toolchain.warnings.is_empty());
    }

    #[test]
    fn test_toolchain_generic_fallback() {
        let resolved = ConflictResolver::new().resolve(&DetectionResult::default()).unwrap();
        let toolchain = Toolchain::from_detection(&resolved);
        assert!(toolchain.is_generic());
        assert!(toolchain.test_command().contains("make test"));
        assert!(toolchain
            .warnings
            .iter()
            .any(|w| matches!(w, GenerationWarning::TemplateFallback { .. })));
    }

    #[test]
    fn test_mismatched_package_manager_uses_language_default() {
        let detection = DetectionResult {
            languages: vec![LanguageDetection {
                name: "python".to_string(),
                version: Some("3.11".to_string()),
                confidence: 0.9,
                primary: true,
            }],
            package_managers: vec![PackageManagerDetection {
                name: "npm".to_string(),
                lock_file: None,
                confidence: 0.6,
            }],
            ..Default::default()
        };
        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        let toolchain = Toolchain::from_detection(&resolved);
        assert_eq!(toolchain.package_manager, Some(PackageManager::Pip));
        assert_eq!(toolchain.version.as_deref(), Some("3.11"));
    }

    #[test]
    fn test_prepare_orders_steps() {
        let toolchain = Toolchain::from_detection(&node_detection());
        let cache = TemplateCache::new();
        let steps = StepLibrary::new(&toolchain, &cache).prepare(true, false);
        let names: Vec<&str> = steps.iter().filter_map(|s| s.name.as_deref()).collect();
        assert_eq!(
            names,
            vec![
                "Checkout",
                "Set up Node.js",
                "Install package manager",
                "Cache dependencies",
                "Install dependencies"
            ]
        );
        let cache_step = &steps[3];
        assert!(cache_step.with["key"].contains("hashFiles('**/pnpm-lock.yaml')"));
    }

    #[test]
    fn test_matrix_setup_uses_expression() {
        let toolchain = Toolchain::from_detection(&node_detection());
        let cache = TemplateCache::new();
        let steps = StepLibrary::new(&toolchain, &cache).setup(true);
        assert_eq!(steps[0].with["node-version"], "${{ matrix.node-version }}");
        assert_eq!(toolchain.matrix_axis().unwrap().0, "node-version");
    }

    #[test]
    fn test_actions_resolve_through_cache() {
        let toolchain = Toolchain::from_detection(&node_detection());
        let cache = TemplateCache::new();
        let library = StepLibrary::new(&toolchain, &cache);
        assert_eq!(library.action("actions/checkout"), "actions/checkout@v4");
        assert_eq!(library.action("actions/checkout"), "actions/checkout@v4");
        assert_eq!(cache.stats().hits, 1);
    }
}
