use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::engine::config::EngineConfig;
use crate::engine::curriculum::Curriculum;
use crate::services::judge_provider::ContentGenerator;
use crate::services::path::GoalLocks;
use crate::store::CompetencyStore;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    store: Arc<CompetencyStore>,
    curriculum: Arc<Curriculum>,
    engine_config: EngineConfig,
    generator: Arc<ContentGenerator>,
    goal_locks: Arc<GoalLocks>,
}

impl AppState {
    pub fn new(
        store: Arc<CompetencyStore>,
        curriculum: Arc<Curriculum>,
        engine_config: EngineConfig,
        generator: Arc<ContentGenerator>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            store,
            curriculum,
            engine_config,
            generator,
            goal_locks: Arc::new(GoalLocks::new()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn store(&self) -> Arc<CompetencyStore> {
        Arc::clone(&self.store)
    }

    pub fn curriculum(&self) -> Arc<Curriculum> {
        Arc::clone(&self.curriculum)
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    pub fn generator(&self) -> Arc<ContentGenerator> {
        Arc::clone(&self.generator)
    }

    pub fn goal_locks(&self) -> Arc<GoalLocks> {
        Arc::clone(&self.goal_locks)
    }
}
