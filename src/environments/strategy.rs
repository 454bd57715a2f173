//! Strategy parameters, approval gates, promotions and rollback settings.
//!
//! Non-production environments get the permissive side of every knob:
//! more unavailable capacity, auto-promotion and shorter windows.

use crate::error::GenerationWarning;

use super::types::{
    ApprovalGate, BlueGreenParams, CanaryAnalysis, CanaryParams, CanaryStep, DeploymentStrategy,
    DeploymentStrategyConfig, EnvironmentConfig, EnvironmentType, PromotionPipeline,
    RollbackConfig, RollbackStrategy, RollingParams,
};

/// Approver groups for production; two distinct groups must sign off.
pub const PRODUCTION_APPROVERS: [&str; 2] = ["release-managers", "platform-leads"];

/// Parameters for the environment's requested strategy.
pub fn strategy_for(env: &EnvironmentConfig) -> DeploymentStrategyConfig {
    let production = env.is_production();
    match env.deployment_strategy {
        DeploymentStrategy::Rolling => {
            let (unavailable, surge, window) =
                if production { ("25%", "25%", 300) } else { ("50%", "50%", 60) };
            DeploymentStrategyConfig::Rolling(RollingParams {
                max_unavailable: unavailable.to_string(),
                max_surge: surge.to_string(),
                stabilization_window_seconds: window,
            })
        }
        DeploymentStrategy::BlueGreen => DeploymentStrategyConfig::BlueGreen(BlueGreenParams {
            pre_promotion_analysis: production,
            post_promotion_analysis: true,
            auto_promotion_enabled: !production,
            scale_down_delay_seconds: if production { 300 } else { 30 },
        }),
        DeploymentStrategy::Canary => {
            let (weights, pause, success, latency, interval): (&[u8], u32, f64, u32, u32) =
                if production {
                    (&[10, 25, 50, 100], 300, 0.99, 500, 60)
                } else {
                    (&[50, 100], 60, 0.95, 1000, 30)
                };
            DeploymentStrategyConfig::Canary(CanaryParams {
                steps: weights
                    .iter()
                    .map(|&weight| CanaryStep {
                        weight,
                        pause_seconds: if weight == 100 { 0 } else { pause },
                    })
                    .collect(),
                analysis: CanaryAnalysis {
                    success_rate_threshold: success,
                    max_latency_ms: latency,
                    interval_seconds: interval,
                },
            })
        }
    }
}

/// Approval gate for production and for environments that ask for one.
pub fn approval_gate_for(env: &EnvironmentConfig) -> Option<ApprovalGate> {
    if !env.requires_approval() {
        return None;
    }
    let (required, approvers): (u32, &[&str]) = match env.environment_type {
        EnvironmentType::Production => (2, &PRODUCTION_APPROVERS),
        EnvironmentType::Staging => (1, &["qa-team"]),
        EnvironmentType::Development => (1, &["team-leads"]),
    };
    Some(ApprovalGate {
        environment: env.name.clone(),
        required_approvals: required,
        approvers: approvers.iter().map(|a| a.to_string()).collect(),
    })
}

/// Rollback settings for a rollback-enabled environment.
pub fn rollback_for(env: &EnvironmentConfig) -> Option<RollbackConfig> {
    if !env.rollback_enabled {
        return None;
    }
    let mut triggers = vec![
        "health-check-failure".to_string(),
        "error-rate-threshold".to_string(),
        "manual".to_string(),
    ];
    if env.is_production() {
        triggers.push("latency-threshold".to_string());
    }
    let strategy = match env.deployment_strategy {
        DeploymentStrategy::BlueGreen => RollbackStrategy::Immediate,
        DeploymentStrategy::Rolling | DeploymentStrategy::Canary => RollbackStrategy::RedeployPrevious,
    };
    Some(RollbackConfig { environment: env.name.clone(), enabled: true, triggers, strategy })
}

/// Linear promotions between neighbouring environments.
///
/// A `promotionSource` naming another environment replaces the preceding
/// neighbour as the source. An unknown source is reported and ignored.
pub fn promotion_pipelines(
    envs: &[EnvironmentConfig],
) -> (Vec<PromotionPipeline>, Vec<GenerationWarning>) {
    let mut warnings = Vec::new();
    for env in envs {
        if let Some(source) = &env.promotion_source {
            let known = envs.iter().any(|e| e.name == *source && e.name != env.name);
            if !known {
                warnings.push(GenerationWarning::UnknownPromotionSource {
                    environment: env.name.clone(),
                    source: source.clone(),
                });
            }
        }
    }

    let pipelines = envs
        .windows(2)
        .map(|pair| {
            let (previous, target) = (&pair[0], &pair[1]);
            let source = target
                .promotion_source
                .as_ref()
                .and_then(|s| envs.iter().find(|e| e.name == *s && e.name != target.name))
                .unwrap_or(previous);
            promotion(source, target)
        })
        .collect();

    (pipelines, warnings)
}

fn promotion(source: &EnvironmentConfig, target: &EnvironmentConfig) -> PromotionPipeline {
    let mut conditions = vec![
        format!("deployment to {} succeeded", source.name),
        format!("health checks pass on {}", source.name),
    ];
    if target.requires_approval() {
        conditions.push(format!("approval granted for {}", target.name));
    }
    if target.is_production() {
        conditions.push("manual trigger".to_string());
    }
    PromotionPipeline {
        source_environment: source.name.clone(),
        target_environment: target.name.clone(),
        auto_promote: !target.requires_approval(),
        conditions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<EnvironmentConfig> {
        vec![
            EnvironmentConfig::new("dev", EnvironmentType::Development),
            EnvironmentConfig::new("staging", EnvironmentType::Staging).with_approval(),
            EnvironmentConfig::new("prod", EnvironmentType::Production),
        ]
    }

    #[test]
    fn test_production_rolling_is_conservative() {
        let dev = strategy_for(&EnvironmentConfig::new("dev", EnvironmentType::Development));
        let prod = strategy_for(&EnvironmentConfig::new("prod", EnvironmentType::Production));
        match (dev, prod) {
            (DeploymentStrategyConfig::Rolling(dev), DeploymentStrategyConfig::Rolling(prod)) => {
                assert_eq!(dev.max_unavailable, "50%");
                assert_eq!(prod.max_unavailable, "25%");
                assert!(dev.stabilization_window_seconds < prod.stabilization_window_seconds);
            }
            other => panic!("unexpected strategies: {other:?}"),
        }
    }

    #[test]
    fn test_canary_steps_end_at_full_traffic() {
        let env = EnvironmentConfig::new("prod", EnvironmentType::Production)
            .with_strategy(DeploymentStrategy::Canary);
        let DeploymentStrategyConfig::Canary(params) = strategy_for(&env) else {
            panic!("expected canary");
        };
        let weights: Vec<u8> = params.steps.iter().map(|s| s.weight).collect();
        assert_eq!(weights, vec![10, 25, 50, 100]);
        assert_eq!(params.steps.last().unwrap().pause_seconds, 0);
        assert!(params.analysis.success_rate_threshold > 0.98);
    }

    #[test]
    fn test_blue_green_auto_promotes_outside_production() {
        let staging = EnvironmentConfig::new("staging", EnvironmentType::Staging)
            .with_strategy(DeploymentStrategy::BlueGreen);
        let DeploymentStrategyConfig::BlueGreen(params) = strategy_for(&staging) else {
            panic!("expected blue-green");
        };
        assert!(params.auto_promotion_enabled);
        assert_eq!(params.scale_down_delay_seconds, 30);
    }

    #[test]
    fn test_production_is_gated_without_flag() {
        let prod = EnvironmentConfig::new("prod", EnvironmentType::Production);
        assert!(!prod.approval_required);
        let gate = approval_gate_for(&prod).unwrap();
        assert_eq!(gate.required_approvals, 2);
        assert_eq!(gate.approvers, PRODUCTION_APPROVERS.map(String::from).to_vec());

        let staging = EnvironmentConfig::new("staging", EnvironmentType::Staging);
        let into_prod = promotion(&staging, &prod);
        assert!(!into_prod.auto_promote);
        assert!(into_prod.conditions.contains(&"approval granted for prod".to_string()));
    }

    #[test]
    fn test_production_gate_needs_two_groups() {
        let prod = EnvironmentConfig::new("prod", EnvironmentType::Production).with_approval();
        let gate = approval_gate_for(&prod).unwrap();
        assert_eq!(gate.required_approvals, 2);
        assert_eq!(gate.approvers.len(), 2);
        assert_ne!(gate.approvers[0], gate.approvers[1]);

        let dev = EnvironmentConfig::new("dev", EnvironmentType::Development);
        assert!(approval_gate_for(&dev).is_none());
        assert_eq!(approval_gate_for(&dev.with_approval()).unwrap().required_approvals, 1);
    }

    #[test]
    fn test_promotions_never_auto_promote_production() {
        let (pipelines, warnings) = promotion_pipelines(&chain());
        assert!(warnings.is_empty());
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].source_environment, "dev");
        // Staging requires approval.
        assert!(!pipelines[0].auto_promote);
        assert_eq!(pipelines[1].target_environment, "prod");
        assert!(!pipelines[1].auto_promote);
    }

    #[test]
    fn test_promotion_source_override_and_unknown() {
        let mut envs = chain();
        envs[2].promotion_source = Some("dev".to_string());
        envs[1].promotion_source = Some("qa".to_string());
        let (pipelines, warnings) = promotion_pipelines(&envs);

        assert_eq!(pipelines[1].source_environment, "dev");
        assert_eq!(pipelines[0].source_environment, "dev");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind(), "unknown-promotion-source");
    }

    #[test]
    fn test_rollback_strategy_follows_deployment() {
        let bg = EnvironmentConfig::new("prod", EnvironmentType::Production)
            .with_strategy(DeploymentStrategy::BlueGreen)
            .with_rollback();
        let rollback = rollback_for(&bg).unwrap();
        assert_eq!(rollback.strategy, RollbackStrategy::Immediate);
        assert!(rollback.triggers.contains(&"latency-threshold".to_string()));

        let rolling = EnvironmentConfig::new("dev", EnvironmentType::Development).with_rollback();
        assert_eq!(rollback_for(&rolling).unwrap().strategy, RollbackStrategy::RedeployPrevious);
        assert!(rollback_for(&EnvironmentConfig::new("x", EnvironmentType::Staging)).is_none());
    }
}
