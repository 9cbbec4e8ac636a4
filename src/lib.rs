pub mod config;
pub mod dom;
pub mod engine;
pub mod rewrite;
pub mod settings;

pub use config::{EngineConfig, RewritePlan};
pub use engine::pipeline::{Orchestrator, PassStats, RewriteEngine};
