//! Goal and learning-path lifecycle.
//!
//! Goal creation is precondition-checked and written atomically with its
//! initial path. Performance signals run as a per-goal read-modify-write:
//! an in-process mutex serializes signals for the same goal, and the
//! (goal, date, order) unique index catches anything that still collides,
//! triggering a bounded re-scan.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex as SyncMutex;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::engine::config::EngineConfig;
use crate::engine::curriculum::Curriculum;
use crate::engine::scheduler::{build_path, plan_signal, PathDelta, ScheduleError};
use crate::engine::types::{LearningGoal, LearningPathNode, PerformanceSignal};
use crate::store::{CompetencyStore, StoreError};

/// Attempts at the signal read-modify-write before giving up.
const MAX_SIGNAL_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum PathError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("goal not found")]
    GoalNotFound,
    #[error("goal is no longer active")]
    GoalInactive,
    #[error("scheduling conflict persisted after {MAX_SIGNAL_ATTEMPTS} attempts, retry the signal")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-goal async mutexes, created on first use. Signals for different
/// goals proceed in parallel; signals for the same goal serialize.
#[derive(Default)]
pub struct GoalLocks {
    inner: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl GoalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_goal(&self, goal_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock();
        Arc::clone(
            map.entry(goal_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}

#[derive(Debug, Clone)]
pub struct CreateGoalInput {
    pub student_id: String,
    pub target_date: NaiveDate,
    pub topic_ids: Vec<String>,
}

/// Create a goal and its initial path. Horizon and topic validation happen
/// before anything is written; activation implicitly deactivates the
/// student's previous goal inside the same transaction.
pub async fn create_goal(
    store: &CompetencyStore,
    curriculum: &Curriculum,
    config: &EngineConfig,
    input: CreateGoalInput,
) -> Result<(LearningGoal, Vec<LearningPathNode>), PathError> {
    if input.student_id.trim().is_empty() {
        return Err(PathError::InvalidInput("studentId is required".into()));
    }

    let goal = LearningGoal {
        id: uuid::Uuid::new_v4().to_string(),
        student_id: input.student_id,
        target_date: input.target_date,
        topic_ids: input.topic_ids,
        active: true,
    };

    let today = Utc::now().date_naive();
    let mastery = store.topic_masteries(&goal.student_id, &goal.topic_ids).await?;
    let nodes = build_path(&goal, &mastery, curriculum, today, config)?;

    store.create_goal_with_path(&goal, &nodes).await?;
    info!(goal_id = %goal.id, nodes = nodes.len(), "learning path created");
    Ok((goal, nodes))
}

/// Apply one performance signal to an active goal and return the delta.
pub async fn apply_performance_signal(
    store: &CompetencyStore,
    locks: &GoalLocks,
    curriculum: &Curriculum,
    config: &EngineConfig,
    goal_id: &str,
    signal: PerformanceSignal,
) -> Result<PathDelta, PathError> {
    if signal.score > 100 {
        return Err(PathError::InvalidInput("score must be in [0, 100]".into()));
    }

    let lock = locks.for_goal(goal_id);
    let _guard = lock.lock().await;

    let goal = store.goal(goal_id).await?.ok_or(PathError::GoalNotFound)?;
    if !goal.active {
        return Err(PathError::GoalInactive);
    }
    if !goal.topic_ids.contains(&signal.topic_id) {
        return Err(PathError::InvalidInput(format!(
            "topic {} is not part of this goal",
            signal.topic_id
        )));
    }

    let today = Utc::now().date_naive();
    for attempt in 0..MAX_SIGNAL_ATTEMPTS {
        let nodes = store.nodes_for_goal(goal_id).await?;
        let delta = plan_signal(goal_id, &nodes, &signal, curriculum, today, config);

        match store.insert_nodes(&delta.inserted).await {
            Ok(()) => {
                for escalation in &delta.escalated {
                    store
                        .set_node_difficulty(&escalation.node_id, escalation.to)
                        .await?;
                }
                store
                    .upsert_topic_progress(&goal.student_id, &delta.progress)
                    .await?;
                if !delta.inserted.is_empty() {
                    info!(
                        goal_id,
                        inserted = delta.inserted.len(),
                        "reinforcement nodes scheduled"
                    );
                }
                return Ok(delta);
            }
            Err(StoreError::Conflict { .. }) => {
                // Another writer took the slot between our read and write;
                // re-scan against fresh nodes.
                warn!(goal_id, attempt, "node slot conflict, re-scanning");
                continue;
            }
            Err(other) => return Err(other.into()),
        }
    }
    Err(PathError::Conflict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::curriculum::CurriculumSpec;
    use crate::engine::types::{KnowledgeUnit, Subtopic, Topic};
    use chrono::Duration;

    fn curriculum() -> Curriculum {
        let subtopic = |id: &str, seq: i32| Subtopic {
            id: id.into(),
            topic_id: "alg".into(),
            name: id.into(),
            sequence: seq,
        };
        Curriculum::new(CurriculumSpec {
            topics: vec![Topic { id: "alg".into(), name: "Algebra".into(), sequence: 1 }],
            subtopics: vec![subtopic("lin", 1), subtopic("quad", 2)],
            units: vec![KnowledgeUnit {
                id: "u-t1".into(),
                code: "T1".into(),
                topic_id: "alg".into(),
                subtopic_id: "lin".into(),
                title: "T1".into(),
                is_foundational: false,
                prerequisites: vec![],
            }],
        })
        .unwrap()
    }

    fn input(days_out: i64) -> CreateGoalInput {
        CreateGoalInput {
            student_id: "student-1".into(),
            target_date: Utc::now().date_naive() + Duration::days(days_out),
            topic_ids: vec!["alg".into()],
        }
    }

    #[tokio::test]
    async fn short_horizon_creates_nothing() {
        let store = CompetencyStore::connect("sqlite::memory:").await.unwrap();
        let result = create_goal(&store, &curriculum(), &EngineConfig::default(), input(7)).await;
        assert!(matches!(
            result,
            Err(PathError::Schedule(ScheduleError::HorizonTooShort { .. }))
        ));
    }

    #[tokio::test]
    async fn new_goal_deactivates_previous_one() {
        let store = CompetencyStore::connect("sqlite::memory:").await.unwrap();
        let config = EngineConfig::default();
        let (first, _) = create_goal(&store, &curriculum(), &config, input(30))
            .await
            .unwrap();
        let (second, _) = create_goal(&store, &curriculum(), &config, input(40))
            .await
            .unwrap();

        assert!(!store.goal(&first.id).await.unwrap().unwrap().active);
        assert!(store.goal(&second.id).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn signal_for_foreign_topic_is_rejected() {
        let store = CompetencyStore::connect("sqlite::memory:").await.unwrap();
        let config = EngineConfig::default();
        let locks = GoalLocks::new();
        let (goal, _) = create_goal(&store, &curriculum(), &config, input(30))
            .await
            .unwrap();

        let result = apply_performance_signal(
            &store,
            &locks,
            &curriculum(),
            &config,
            &goal.id,
            PerformanceSignal {
                topic_id: "geo".into(),
                score: 50,
                weak_units: vec![],
            },
        )
        .await;
        assert!(matches!(result, Err(PathError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unknown_goal_is_not_found() {
        let store = CompetencyStore::connect("sqlite::memory:").await.unwrap();
        let result = apply_performance_signal(
            &store,
            &GoalLocks::new(),
            &curriculum(),
            &EngineConfig::default(),
            "missing",
            PerformanceSignal {
                topic_id: "alg".into(),
                score: 50,
                weak_units: vec![],
            },
        )
        .await;
        assert!(matches!(result, Err(PathError::GoalNotFound)));
    }
}
