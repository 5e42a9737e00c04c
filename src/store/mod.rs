//! Competency store.
//!
//! Sqlite-backed persistence for competency records, topic progress,
//! diagnostic profiles, mastery results, goals and path nodes. The access
//! patterns are deliberately narrow: point reads/upserts keyed by
//! (student, unit) / (student, topic), and ordered range reads of path
//! nodes by (goal, scheduled date, order index). A unique index on that
//! triple turns concurrent slot collisions into retryable conflicts.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::engine::diagnostic::CompetencyProfile;
use crate::engine::grader::MasteryResult;
use crate::engine::scheduler::TopicProgressUpdate;
use crate::engine::strategy::{next_failure_count, ExplanationStage};
use crate::engine::types::{
    Classification, CompetencyRecord, DifficultyTier, LearningGoal, LearningPathNode, NodeStatus,
};

const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("node slot conflict for goal {goal_id}")]
    Conflict { goal_id: String },
    #[error("json encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct CompetencyStore {
    pool: SqlitePool,
}

impl CompetencyStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);
        // Single connection: sqlite is single-writer, and it keeps an
        // in-memory database from being split across pool connections.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn from_env() -> Result<Self, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        Self::connect(&url).await
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let statements = [
            r#"CREATE TABLE IF NOT EXISTS "competency_records" (
                "studentId" TEXT NOT NULL,
                "unitId" TEXT NOT NULL,
                "score" INTEGER NOT NULL,
                "classification" TEXT NOT NULL,
                "attempts" INTEGER NOT NULL DEFAULT 0,
                "correct" INTEGER NOT NULL DEFAULT 0,
                "updatedAt" TEXT NOT NULL,
                PRIMARY KEY ("studentId", "unitId")
            )"#,
            r#"CREATE TABLE IF NOT EXISTS "topic_progress" (
                "studentId" TEXT NOT NULL,
                "topicId" TEXT NOT NULL,
                "score" INTEGER NOT NULL,
                "classification" TEXT NOT NULL,
                "updatedAt" TEXT NOT NULL,
                PRIMARY KEY ("studentId", "topicId")
            )"#,
            r#"CREATE TABLE IF NOT EXISTS "diagnostic_profiles" (
                "studentId" TEXT NOT NULL PRIMARY KEY,
                "profile" TEXT NOT NULL,
                "updatedAt" TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS "mastery_results" (
                "id" TEXT PRIMARY KEY,
                "studentId" TEXT NOT NULL,
                "overallScore" INTEGER NOT NULL,
                "result" TEXT NOT NULL,
                "createdAt" TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS "learning_goals" (
                "id" TEXT PRIMARY KEY,
                "studentId" TEXT NOT NULL,
                "targetDate" TEXT NOT NULL,
                "topicIds" TEXT NOT NULL,
                "active" INTEGER NOT NULL DEFAULT 1,
                "createdAt" TEXT NOT NULL,
                "updatedAt" TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS "learning_path_nodes" (
                "id" TEXT PRIMARY KEY,
                "goalId" TEXT NOT NULL,
                "topicId" TEXT NOT NULL,
                "subtopicId" TEXT NOT NULL,
                "scheduledDate" TEXT NOT NULL,
                "difficulty" TEXT NOT NULL,
                "status" TEXT NOT NULL,
                "orderIndex" INTEGER NOT NULL,
                "estimatedMinutes" INTEGER NOT NULL,
                "createdAt" TEXT NOT NULL,
                "updatedAt" TEXT NOT NULL
            )"#,
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "learning_path_nodes_goal_date_order"
                ON "learning_path_nodes" ("goalId", "scheduledDate", "orderIndex")"#,
            r#"CREATE INDEX IF NOT EXISTS "learning_goals_student_active"
                ON "learning_goals" ("studentId", "active")"#,
            r#"CREATE TABLE IF NOT EXISTS "strategy_stages" (
                "studentId" TEXT NOT NULL,
                "questionFamily" TEXT NOT NULL,
                "consecutiveFailures" INTEGER NOT NULL DEFAULT 0,
                "updatedAt" TEXT NOT NULL,
                PRIMARY KEY ("studentId", "questionFamily")
            )"#,
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ===== competency records =====

    pub async fn upsert_competency(&self, record: &CompetencyRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO "competency_records"
               ("studentId","unitId","score","classification","attempts","correct","updatedAt")
               VALUES (?,?,?,?,?,?,?)
               ON CONFLICT ("studentId","unitId") DO UPDATE SET
                 "score" = excluded."score",
                 "classification" = excluded."classification",
                 "attempts" = excluded."attempts",
                 "correct" = excluded."correct",
                 "updatedAt" = excluded."updatedAt""#,
        )
        .bind(&record.student_id)
        .bind(&record.unit_id)
        .bind(record.score as i64)
        .bind(record.classification.as_str())
        .bind(record.attempts)
        .bind(record.correct)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn competency(
        &self,
        student_id: &str,
        unit_id: &str,
    ) -> Result<Option<CompetencyRecord>, StoreError> {
        let row = sqlx::query(
            r#"SELECT "studentId","unitId","score","classification","attempts","correct"
               FROM "competency_records" WHERE "studentId" = ? AND "unitId" = ?"#,
        )
        .bind(student_id)
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| parse_competency_row(&r)))
    }

    // ===== topic progress =====

    pub async fn upsert_topic_progress(
        &self,
        student_id: &str,
        progress: &TopicProgressUpdate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO "topic_progress"
               ("studentId","topicId","score","classification","updatedAt")
               VALUES (?,?,?,?,?)
               ON CONFLICT ("studentId","topicId") DO UPDATE SET
                 "score" = excluded."score",
                 "classification" = excluded."classification",
                 "updatedAt" = excluded."updatedAt""#,
        )
        .bind(student_id)
        .bind(&progress.topic_id)
        .bind(progress.score as i64)
        .bind(progress.classification.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current mastery per topic, defaulting to zero for topics the student
    /// has no progress entry for.
    pub async fn topic_masteries(
        &self,
        student_id: &str,
        topic_ids: &[String],
    ) -> Result<HashMap<String, u32>, StoreError> {
        let mut out: HashMap<String, u32> = topic_ids.iter().map(|t| (t.clone(), 0)).collect();
        let rows = sqlx::query(
            r#"SELECT "topicId","score" FROM "topic_progress" WHERE "studentId" = ?"#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let topic_id: String = row.try_get("topicId").unwrap_or_default();
            if out.contains_key(&topic_id) {
                let score: i64 = row.try_get("score").unwrap_or(0);
                out.insert(topic_id, score.clamp(0, 100) as u32);
            }
        }
        Ok(out)
    }

    pub async fn topic_progress_score(
        &self,
        student_id: &str,
        topic_id: &str,
    ) -> Result<Option<u32>, StoreError> {
        let row = sqlx::query(
            r#"SELECT "score" FROM "topic_progress" WHERE "studentId" = ? AND "topicId" = ?"#,
        )
        .bind(student_id)
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.try_get::<i64, _>("score").unwrap_or(0).clamp(0, 100) as u32))
    }

    // ===== diagnostic profiles =====

    pub async fn upsert_diagnostic_profile(
        &self,
        student_id: &str,
        profile: &CompetencyProfile,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(profile)?;
        sqlx::query(
            r#"INSERT INTO "diagnostic_profiles" ("studentId","profile","updatedAt")
               VALUES (?,?,?)
               ON CONFLICT ("studentId") DO UPDATE SET
                 "profile" = excluded."profile",
                 "updatedAt" = excluded."updatedAt""#,
        )
        .bind(student_id)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn diagnostic_profile(
        &self,
        student_id: &str,
    ) -> Result<Option<CompetencyProfile>, StoreError> {
        let row = sqlx::query(
            r#"SELECT "profile" FROM "diagnostic_profiles" WHERE "studentId" = ?"#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => {
                let raw: String = r.try_get("profile").unwrap_or_default();
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    // ===== mastery results =====

    /// Persist one grading run as a single record. Grading is all-or-nothing:
    /// partial results never reach this call.
    pub async fn insert_mastery_result(
        &self,
        student_id: &str,
        result: &MasteryResult,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let payload = serde_json::to_string(result)?;
        sqlx::query(
            r#"INSERT INTO "mastery_results" ("id","studentId","overallScore","result","createdAt")
               VALUES (?,?,?,?,?)"#,
        )
        .bind(&id)
        .bind(student_id)
        .bind(result.overall_score as i64)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    // ===== goals and path nodes =====

    /// Create a goal and its initial path in one transaction, deactivating
    /// any previously active goal for the student. Nothing is written if any
    /// step fails.
    pub async fn create_goal_with_path(
        &self,
        goal: &LearningGoal,
        nodes: &[LearningPathNode],
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let topic_ids = serde_json::to_string(&goal.topic_ids)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"UPDATE "learning_goals" SET "active" = 0, "updatedAt" = ?
               WHERE "studentId" = ? AND "active" = 1"#,
        )
        .bind(&now)
        .bind(&goal.student_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO "learning_goals"
               ("id","studentId","targetDate","topicIds","active","createdAt","updatedAt")
               VALUES (?,?,?,?,1,?,?)"#,
        )
        .bind(&goal.id)
        .bind(&goal.student_id)
        .bind(goal.target_date)
        .bind(topic_ids)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for node in nodes {
            insert_node(&mut tx, node, &now).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn goal(&self, goal_id: &str) -> Result<Option<LearningGoal>, StoreError> {
        let row = sqlx::query(
            r#"SELECT "id","studentId","targetDate","topicIds","active"
               FROM "learning_goals" WHERE "id" = ?"#,
        )
        .bind(goal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| parse_goal_row(&r)))
    }

    /// Ordered range read: the goal's nodes by (scheduled date, order index).
    pub async fn nodes_for_goal(
        &self,
        goal_id: &str,
    ) -> Result<Vec<LearningPathNode>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT "id","goalId","topicId","subtopicId","scheduledDate","difficulty",
                      "status","orderIndex","estimatedMinutes"
               FROM "learning_path_nodes" WHERE "goalId" = ?
               ORDER BY "scheduledDate" ASC, "orderIndex" ASC"#,
        )
        .bind(goal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(parse_node_row).collect())
    }

    /// Insert reinforcement nodes for a signal. A unique-index collision on
    /// (goal, date, order) aborts the whole batch and surfaces as
    /// `StoreError::Conflict` so the caller can re-scan and retry.
    pub async fn insert_nodes(&self, nodes: &[LearningPathNode]) -> Result<(), StoreError> {
        if nodes.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        let goal_id = nodes[0].goal_id.clone();
        let mut tx = self.pool.begin().await?;
        for node in nodes {
            insert_node(&mut tx, node, &now).await.map_err(|err| match err {
                StoreError::Sql(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    StoreError::Conflict { goal_id: goal_id.clone() }
                }
                other => other,
            })?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Escalate a pending node's difficulty in place. Terminal nodes are
    /// excluded in the predicate, not just by caller discipline.
    pub async fn set_node_difficulty(
        &self,
        node_id: &str,
        difficulty: DifficultyTier,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE "learning_path_nodes"
               SET "difficulty" = ?, "updatedAt" = ?
               WHERE "id" = ? AND "status" = 'pending'"#,
        )
        .bind(difficulty.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(node_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_node_status(
        &self,
        node_id: &str,
        status: NodeStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE "learning_path_nodes"
               SET "status" = ?, "updatedAt" = ?
               WHERE "id" = ? AND "status" IN ('pending', 'in_progress')"#,
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(node_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== explanation-strategy counters =====

    /// Fold an attempt outcome into the (student, question family) counter
    /// and return the resulting explanation stage.
    pub async fn record_strategy_attempt(
        &self,
        student_id: &str,
        question_family: &str,
        is_correct: bool,
    ) -> Result<ExplanationStage, StoreError> {
        let row = sqlx::query(
            r#"SELECT "consecutiveFailures" FROM "strategy_stages"
               WHERE "studentId" = ? AND "questionFamily" = ?"#,
        )
        .bind(student_id)
        .bind(question_family)
        .fetch_optional(&self.pool)
        .await?;
        let current: i64 = row
            .map(|r| r.try_get("consecutiveFailures").unwrap_or(0))
            .unwrap_or(0);
        let next = next_failure_count(current, is_correct);

        sqlx::query(
            r#"INSERT INTO "strategy_stages"
               ("studentId","questionFamily","consecutiveFailures","updatedAt")
               VALUES (?,?,?,?)
               ON CONFLICT ("studentId","questionFamily") DO UPDATE SET
                 "consecutiveFailures" = excluded."consecutiveFailures",
                 "updatedAt" = excluded."updatedAt""#,
        )
        .bind(student_id)
        .bind(question_family)
        .bind(next)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(ExplanationStage::for_failure_count(next))
    }
}

async fn insert_node(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    node: &LearningPathNode,
    now: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO "learning_path_nodes"
           ("id","goalId","topicId","subtopicId","scheduledDate","difficulty",
            "status","orderIndex","estimatedMinutes","createdAt","updatedAt")
           VALUES (?,?,?,?,?,?,?,?,?,?,?)"#,
    )
    .bind(&node.id)
    .bind(&node.goal_id)
    .bind(&node.topic_id)
    .bind(&node.subtopic_id)
    .bind(node.scheduled_date)
    .bind(node.difficulty.as_str())
    .bind(node.status.as_str())
    .bind(node.order_index)
    .bind(node.estimated_minutes)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn parse_competency_row(row: &SqliteRow) -> CompetencyRecord {
    CompetencyRecord {
        student_id: row.try_get("studentId").unwrap_or_default(),
        unit_id: row.try_get("unitId").unwrap_or_default(),
        score: row.try_get::<i64, _>("score").unwrap_or(0).clamp(0, 100) as u32,
        classification: Classification::parse(
            &row.try_get::<String, _>("classification").unwrap_or_default(),
        ),
        attempts: row.try_get("attempts").unwrap_or(0),
        correct: row.try_get("correct").unwrap_or(0),
    }
}

fn parse_goal_row(row: &SqliteRow) -> LearningGoal {
    let topic_ids_raw: String = row.try_get("topicIds").unwrap_or_default();
    LearningGoal {
        id: row.try_get("id").unwrap_or_default(),
        student_id: row.try_get("studentId").unwrap_or_default(),
        target_date: row
            .try_get::<NaiveDate, _>("targetDate")
            .unwrap_or_else(|_| Utc::now().date_naive()),
        topic_ids: serde_json::from_str(&topic_ids_raw).unwrap_or_default(),
        active: row.try_get::<i64, _>("active").unwrap_or(0) == 1,
    }
}

fn parse_node_row(row: &SqliteRow) -> LearningPathNode {
    LearningPathNode {
        id: row.try_get("id").unwrap_or_default(),
        goal_id: row.try_get("goalId").unwrap_or_default(),
        topic_id: row.try_get("topicId").unwrap_or_default(),
        subtopic_id: row.try_get("subtopicId").unwrap_or_default(),
        scheduled_date: row
            .try_get::<NaiveDate, _>("scheduledDate")
            .unwrap_or_else(|_| Utc::now().date_naive()),
        difficulty: DifficultyTier::parse(
            &row.try_get::<String, _>("difficulty").unwrap_or_default(),
        ),
        status: NodeStatus::parse(&row.try_get::<String, _>("status").unwrap_or_default()),
        order_index: row.try_get("orderIndex").unwrap_or(0),
        estimated_minutes: row.try_get("estimatedMinutes").unwrap_or(0),
    }
}
