//! Conflict resolution between competing detection candidates.
//!
//! Candidates are grouped by category; the highest confidence wins and ties
//! go to the candidate listed first. The resolved view is computed once per
//! generation call and shared by every generator of that call.

use tracing::debug;

use super::types::{
    BuildToolDetection, Candidate, DeploymentTargetDetection, DetectionResult, FrameworkCategory,
    FrameworkDetection, LanguageDetection, PackageManagerDetection, ProjectMetadata,
    TestType, TestingFrameworkDetection,
};
use crate::error::{GenerationResult, GenerationWarning};

/// Default minimum confidence for a candidate to count as relevant.
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.5;

/// Detection data after conflicts have been resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDetection {
    /// Project identity
    pub project: ProjectMetadata,

    /// Winning primary language
    pub primary_language: Option<LanguageDetection>,

    /// All detected languages in input order
    pub languages: Vec<LanguageDetection>,

    /// One winning framework per category, in order of first appearance
    pub frameworks: Vec<FrameworkDetection>,

    /// Winning build tool
    pub build_tool: Option<BuildToolDetection>,

    /// Winning package manager
    pub package_manager: Option<PackageManagerDetection>,

    /// Testing frameworks (several may coexist: unit + e2e)
    pub testing_frameworks: Vec<TestingFrameworkDetection>,

    /// Deployment targets ordered by descending confidence
    pub deployment_targets: Vec<DeploymentTargetDetection>,

    /// Conflict and low-confidence warnings
    pub warnings: Vec<GenerationWarning>,
}

impl ResolvedDetection {
    /// Winning framework of a category.
    pub fn framework(&self, category: FrameworkCategory) -> Option<&FrameworkDetection> {
        self.frameworks.iter().find(|f| f.category == category)
    }

    /// Framework that drives the build: fullstack, then backend, then
    /// frontend, then anything else.
    pub fn primary_framework(&self) -> Option<&FrameworkDetection> {
        [
            FrameworkCategory::Fullstack,
            FrameworkCategory::Backend,
            FrameworkCategory::Frontend,
        ]
        .iter()
        .find_map(|c| self.framework(*c))
        .or_else(|| {
            self.frameworks.iter().find(|f| f.category != FrameworkCategory::Testing)
        })
    }

    /// Whether a framework with the given name was selected.
    pub fn has_framework(&self, name: &str) -> bool {
        self.frameworks.iter().any(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Whether a testing framework with the given name was detected.
    pub fn has_testing_framework(&self, name: &str) -> bool {
        self.testing_frameworks.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Testing frameworks of a given level.
    pub fn testing_frameworks_of(&self, test_type: TestType) -> Vec<&TestingFrameworkDetection> {
        self.testing_frameworks.iter().filter(|t| t.test_type == test_type).collect()
    }

    /// Most confident deployment target.
    pub fn primary_deployment_target(&self) -> Option<&DeploymentTargetDetection> {
        self.deployment_targets.first()
    }

    /// Whether a deployment platform was detected.
    pub fn has_deployment_target(&self, platform: &str) -> bool {
        self.deployment_targets.iter().any(|d| d.platform.eq_ignore_ascii_case(platform))
    }

    /// Project name with a fallback for anonymous input.
    pub fn project_name(&self) -> &str {
        if self.project.name.trim().is_empty() {
            "project"
        } else {
            self.project.name.as_str()
        }
    }

    /// Whether there is nothing to build from.
    pub fn is_empty(&self) -> bool {
        self.primary_language.is_none() && self.frameworks.is_empty()
    }

    /// One-line summary used in workflow metadata.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        match &self.primary_language {
            Some(lang) => parts.push(lang.name.to_lowercase()),
            None => parts.push("unknown language".to_string()),
        }

        if !self.frameworks.is_empty() {
            parts.push(
                self.frameworks
                    .iter()
                    .map(|f| f.name.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        if let Some(pm) = &self.package_manager {
            parts.push(pm.name.to_lowercase());
        }

        if let Some(target) = self.primary_deployment_target() {
            parts.push(format!("-> {}", target.platform.to_lowercase()));
        }

        parts.join(" / ")
    }
}

/// Selects winners among competing candidates.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    min_relevance: f64,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self { min_relevance: DEFAULT_MIN_RELEVANCE }
    }
}

impl ConflictResolver {
    /// Create a resolver with the default relevance threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum confidence for a candidate to count as relevant.
    #[must_use]
    pub fn min_relevance(mut self, threshold: f64) -> Self {
        self.min_relevance = threshold.clamp(0.0, 1.0);
        self
    }

    /// Resolve a detection result. Fails only when the input violates its
    /// invariants.
    pub fn resolve(&self, detection: &DetectionResult) -> GenerationResult<ResolvedDetection> {
        detection.validate()?;

        let mut warnings = Vec::new();

        let primary_language = self.resolve_language(&detection.languages, &mut warnings);
        let frameworks = self.resolve_frameworks(&detection.frameworks, &mut warnings);

        let build_tools: Vec<&BuildToolDetection> = detection.build_tools.iter().collect();
        let build_tool = self.pick("build tool", &build_tools, &mut warnings).cloned();

        let package_managers: Vec<&PackageManagerDetection> =
            detection.package_managers.iter().collect();
        let package_manager = self.pick("package manager", &package_managers, &mut warnings).cloned();

        let mut deployment_targets = detection.deployment_targets.clone();
        // Stable sort keeps declaration order among equal confidences.
        deployment_targets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        if primary_language.is_none() {
            warnings.push(GenerationWarning::MissingData {
                field: "languages".to_string(),
                detail: "no language detected; generic build steps will be used".to_string(),
            });
        }
        if detection.frameworks.is_empty() {
            warnings.push(GenerationWarning::MissingData {
                field: "frameworks".to_string(),
                detail: "no framework detected".to_string(),
            });
        }

        debug!(
            language = primary_language.as_ref().map(|l| l.name.as_str()),
            frameworks = frameworks.len(),
            warnings = warnings.len(),
            "Resolved detection result"
        );

        Ok(ResolvedDetection {
            project: detection.project_metadata.clone(),
            primary_language,
            languages: detection.languages.clone(),
            frameworks,
            build_tool,
            package_manager,
            testing_frameworks: detection.testing_frameworks.clone(),
            deployment_targets,
            warnings,
        })
    }

    fn resolve_language(
        &self,
        languages: &[LanguageDetection],
        warnings: &mut Vec<GenerationWarning>,
    ) -> Option<LanguageDetection> {
        if let Some(primary) = languages.iter().find(|l| l.primary) {
            return Some(primary.clone());
        }
        let all: Vec<&LanguageDetection> = languages.iter().collect();
        self.pick("language", &all, warnings).cloned()
    }

    fn resolve_frameworks(
        &self,
        frameworks: &[FrameworkDetection],
        warnings: &mut Vec<GenerationWarning>,
    ) -> Vec<FrameworkDetection> {
        let mut categories: Vec<FrameworkCategory> = Vec::new();
        for framework in frameworks {
            if !categories.contains(&framework.category) {
                categories.push(framework.category);
            }
        }

        categories
            .into_iter()
            .filter_map(|category| {
                let group: Vec<&FrameworkDetection> =
                    frameworks.iter().filter(|f| f.category == category).collect();
                self.pick(category.label(), &group, warnings).cloned()
            })
            .collect()
    }

    /// Pick the winner of one category and record warnings about it.
    fn pick<'a, T: Candidate>(
        &self,
        category: &str,
        candidates: &[&'a T],
        warnings: &mut Vec<GenerationWarning>,
    ) -> Option<&'a T> {
        let (winner_index, winner) = select_winner(candidates)?;

        let rejected: Vec<String> = candidates
            .iter()
            .enumerate()
            .filter(|(i, c)| *i != winner_index && c.confidence() >= self.min_relevance)
            .map(|(_, c)| c.name().to_string())
            .collect();

        if !rejected.is_empty() && winner.confidence() >= self.min_relevance {
            warnings.push(GenerationWarning::Conflict {
                category: category.to_string(),
                selected: winner.name().to_string(),
                rejected,
            });
        }

        if winner.confidence() < self.min_relevance {
            warnings.push(GenerationWarning::LowConfidence {
                category: category.to_string(),
                name: winner.name().to_string(),
                confidence: winner.confidence(),
            });
        }

        Some(winner)
    }
}

/// Highest confidence wins; the first listed candidate wins ties.
fn select_winner<'a, T: Candidate>(candidates: &[&'a T]) -> Option<(usize, &'a T)> {
    let mut best: Option<(usize, &'a T)> = None;
    for (index, &candidate) in candidates.iter().enumerate() {
        match best {
            Some((_, current)) if candidate.confidence() <= current.confidence() => {}
            _ => best = Some((index, candidate)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framework(name: &str, confidence: f64, category: FrameworkCategory) -> FrameworkDetection {
        FrameworkDetection {
            name: name.to_string(),
            version: None,
            confidence,
            evidence: Vec::new(),
            category,
        }
    }

    fn language(name: &str, confidence: f64, primary: bool) -> LanguageDetection {
        LanguageDetection { name: name.to_string(), version: None, confidence, primary }
    }

    #[test]
    fn test_highest_confidence_wins_with_conflict_warning() {
        let detection = DetectionResult {
            frameworks: vec![
                framework("vue", 0.7, FrameworkCategory::Frontend),
                framework("react", 0.8, FrameworkCategory::Frontend),
            ],
            languages: vec![language("javascript", 0.9, true)],
            ..Default::default()
        };

        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        assert_eq!(resolved.frameworks.len(), 1);
        assert_eq!(resolved.frameworks[0].name, "react");
        assert!(resolved.warnings.iter().any(|w| matches!(
            w,
            GenerationWarning::Conflict { selected, rejected, .. }
                if selected == "react" && rejected == &vec!["vue".to_string()]
        )));
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let detection = DetectionResult {
            frameworks: vec![
                framework("svelte", 0.6, FrameworkCategory::Frontend),
                framework("vue", 0.6, FrameworkCategory::Frontend),
            ],
            ..Default::default()
        };

        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        assert_eq!(resolved.frameworks[0].name, "svelte");
    }

    #[test]
    fn test_categories_resolve_independently() {
        let detection = DetectionResult {
            frameworks: vec![
                framework("react", 0.9, FrameworkCategory::Frontend),
                framework("express", 0.85, FrameworkCategory::Backend),
            ],
            ..Default::default()
        };

        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        assert_eq!(resolved.frameworks.len(), 2);
        assert!(!resolved.warnings.iter().any(|w| w.kind() == "conflict"));
        assert_eq!(resolved.primary_framework().unwrap().name, "express");
    }

    #[test]
    fn test_irrelevant_candidates_do_not_conflict() {
        let detection = DetectionResult {
            frameworks: vec![
                framework("react", 0.9, FrameworkCategory::Frontend),
                framework("preact", 0.2, FrameworkCategory::Frontend),
            ],
            ..Default::default()
        };

        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        assert!(!resolved.warnings.iter().any(|w| w.kind() == "conflict"));
    }

    #[test]
    fn test_low_confidence_winner_is_flagged() {
        let detection = DetectionResult {
            languages: vec![language("ruby", 0.3, false)],
            ..Default::default()
        };

        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        assert_eq!(resolved.primary_language.unwrap().name, "ruby");
        assert!(resolved.warnings.iter().any(|w| w.kind() == "low-confidence"));
    }

    #[test]
    fn test_primary_flag_beats_confidence() {
        let detection = DetectionResult {
            languages: vec![language("javascript", 0.9, false), language("typescript", 0.6, true)],
            ..Default::default()
        };

        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        assert_eq!(resolved.primary_language.unwrap().name, "typescript");
    }

    #[test]
    fn test_empty_input_yields_warnings() {
        let resolved = ConflictResolver::new().resolve(&DetectionResult::default()).unwrap();
        assert!(resolved.is_empty());
        assert!(resolved.warnings.len() >= 2);
        assert_eq!(resolved.project_name(), "project");
    }

    #[test]
    fn test_deployment_targets_sorted_by_confidence() {
        let detection = DetectionResult {
            deployment_targets: vec![
                DeploymentTargetDetection {
                    platform: "netlify".to_string(),
                    target_type: None,
                    confidence: 0.4,
                },
                DeploymentTargetDetection {
                    platform: "docker".to_string(),
                    target_type: None,
                    confidence: 0.9,
                },
            ],
            ..Default::default()
        };

        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        assert_eq!(resolved.primary_deployment_target().unwrap().platform, "docker");
    }
}
