//! Multi-environment deployment.
//!
//! Turns an ordered list of [`EnvironmentConfig`]s into one deploy workflow
//! per environment, a promotion workflow chaining them and a shared
//! emergency rollback workflow, together with the approval gates, strategy
//! parameters, promotions and rollback settings those workflows encode.

mod generator;
pub mod secrets;
mod strategy;
mod types;

pub use generator::{MultiEnvironmentGenerator, PRODUCTION_SCHEDULE};
pub use strategy::{
    approval_gate_for, promotion_pipelines, rollback_for, strategy_for, PRODUCTION_APPROVERS,
};
pub use types::{
    ApprovalGate, BlueGreenParams, CanaryAnalysis, CanaryParams, CanaryStep, DeploymentStrategy,
    DeploymentStrategyConfig, EnvironmentConfig, EnvironmentType, MultiEnvResult,
    PromotionPipeline, RollbackConfig, RollbackStrategy, RollingParams, StrategyAssignment,
};

pub(crate) use types::slugify;
