//! Toolchain templates and step builders.

mod cache;
pub mod catalog;
mod steps;

pub use cache::{CacheStats, TemplateCache, TemplateKey};
pub use catalog::{ActionRef, FrameworkKind, FrameworkProfile, Language, PackageManager};
pub use steps::{StepLibrary, Toolchain};
