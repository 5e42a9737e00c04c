#![allow(dead_code)]

pub mod config;
pub mod coverage;
pub mod curriculum;
pub mod diagnostic;
pub mod grader;
pub mod scheduler;
pub mod strategy;
pub mod types;

pub use config::EngineConfig;
pub use curriculum::Curriculum;
#[allow(unused_imports)]
pub use types::*;
