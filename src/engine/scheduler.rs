//! Learning-path scheduling.
//!
//! Builds the initial node sequence for a goal and computes incremental
//! updates when new performance signals arrive. Both operations work on an
//! in-memory snapshot of the goal's nodes; the service layer owns the
//! read-modify-write around them.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::config::EngineConfig;
use crate::engine::curriculum::Curriculum;
use crate::engine::types::{
    Classification, DifficultyTier, LearningGoal, LearningPathNode, NodeStatus,
    PerformanceSignal,
};

/// Minimum size of a scheduled activity.
const MIN_NODE_MINUTES: i64 = 15;
/// Estimated duration of an inserted reinforcement activity.
const REINFORCEMENT_MINUTES: i64 = 20;
/// Forward-scan bound when looking for a free reinforcement date.
const MAX_SLOT_SCAN_DAYS: i64 = 365;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("goal horizon is {days} days, minimum is {minimum}")]
    HorizonTooShort { days: i64, minimum: i64 },
    #[error("goal has no topics")]
    EmptyTopicSet,
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalatedNode {
    pub node_id: String,
    pub from: DifficultyTier,
    pub to: DifficultyTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgressUpdate {
    pub topic_id: String,
    pub score: u32,
    pub classification: Classification,
}

/// Outcome of applying one performance signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDelta {
    pub goal_id: String,
    pub inserted: Vec<LearningPathNode>,
    pub escalated: Vec<EscalatedNode>,
    pub progress: TopicProgressUpdate,
}

/// Build the initial path for a goal.
///
/// Topics are worked least-known first (ascending mastery, curriculum
/// sequence as tie-break). Daily density comes from the pacing function
/// `ceil(minutes_per_mastery_point * Σ(100 − mastery) / days)`: the larger
/// the remaining gap and the closer the deadline, the denser the schedule.
pub fn build_path(
    goal: &LearningGoal,
    mastery: &HashMap<String, u32>,
    curriculum: &Curriculum,
    today: NaiveDate,
    config: &EngineConfig,
) -> Result<Vec<LearningPathNode>, ScheduleError> {
    let days = (goal.target_date - today).num_days();
    if days < config.min_horizon_days {
        return Err(ScheduleError::HorizonTooShort {
            days,
            minimum: config.min_horizon_days,
        });
    }
    if goal.topic_ids.is_empty() {
        return Err(ScheduleError::EmptyTopicSet);
    }
    for topic_id in &goal.topic_ids {
        if curriculum.topic(topic_id).is_none() {
            return Err(ScheduleError::UnknownTopic(topic_id.clone()));
        }
    }

    let mut ordered: Vec<&String> = goal.topic_ids.iter().collect();
    ordered.sort_by_key(|topic_id| {
        (
            topic_mastery(mastery, topic_id),
            curriculum.topic_sequence(topic_id),
            (*topic_id).clone(),
        )
    });

    let total_gap: i64 = ordered
        .iter()
        .map(|topic_id| 100 - topic_mastery(mastery, topic_id) as i64)
        .sum();
    let minutes_per_day =
        (config.minutes_per_mastery_point * total_gap as f64 / days as f64).ceil() as i64;

    let mut nodes: Vec<LearningPathNode> = Vec::new();
    let mut day = today + Duration::days(1);
    let mut day_minutes = 0i64;
    let mut day_count = 0i64;

    for topic_id in ordered {
        let topic_gap = 100 - topic_mastery(mastery, topic_id) as i64;
        let subtopics = curriculum.subtopics_of_topic(topic_id);
        if subtopics.is_empty() {
            continue;
        }
        let per_subtopic = (config.minutes_per_mastery_point * topic_gap as f64
            / subtopics.len() as f64)
            .ceil() as i64;
        let estimated_minutes = per_subtopic.max(MIN_NODE_MINUTES);
        let start_tier = starting_tier(topic_mastery(mastery, topic_id));

        for (index, subtopic) in subtopics.iter().enumerate() {
            // Escalate one tier after each third of the topic's sequence,
            // never dropping back down.
            let steps = (index * 3) / subtopics.len();
            let difficulty = escalate(start_tier, steps);

            // Advance to the next day once the daily budget is spent, but
            // never past the eve of the deadline: overflow piles onto the
            // last day instead of spilling past the target.
            if day_count > 0
                && minutes_per_day > 0
                && day_minutes + estimated_minutes > minutes_per_day
                && day + Duration::days(1) < goal.target_date
            {
                day = day + Duration::days(1);
                day_minutes = 0;
                day_count = 0;
            }

            nodes.push(LearningPathNode {
                id: uuid::Uuid::new_v4().to_string(),
                goal_id: goal.id.clone(),
                topic_id: topic_id.clone(),
                subtopic_id: subtopic.id.clone(),
                scheduled_date: day,
                difficulty,
                status: NodeStatus::Pending,
                order_index: day_count,
                estimated_minutes,
            });
            day_minutes += estimated_minutes;
            day_count += 1;
        }
    }

    Ok(nodes)
}

/// Compute the delta one performance signal produces against the goal's
/// current nodes. Terminal nodes are never touched; re-applying the same
/// signal yields an empty delta beyond the progress upsert.
pub fn plan_signal(
    goal_id: &str,
    existing: &[LearningPathNode],
    signal: &PerformanceSignal,
    curriculum: &Curriculum,
    today: NaiveDate,
    config: &EngineConfig,
) -> PathDelta {
    let mut inserted: Vec<LearningPathNode> = Vec::new();
    let mut escalated: Vec<EscalatedNode> = Vec::new();

    if signal.score < config.weak_score_threshold {
        inserted = reinforcement_nodes(goal_id, existing, signal, curriculum, today, config);
    } else if signal.score >= config.advance_score_threshold {
        for node in existing {
            if node.topic_id == signal.topic_id
                && node.status == NodeStatus::Pending
                && node.difficulty == DifficultyTier::Easy
            {
                escalated.push(EscalatedNode {
                    node_id: node.id.clone(),
                    from: DifficultyTier::Easy,
                    to: DifficultyTier::Hard,
                });
            }
        }
    }

    PathDelta {
        goal_id: goal_id.to_string(),
        inserted,
        escalated,
        progress: TopicProgressUpdate {
            topic_id: signal.topic_id.clone(),
            score: signal.score.min(100),
            classification: Classification::from_percentage(signal.score.min(100)),
        },
    }
}

fn reinforcement_nodes(
    goal_id: &str,
    existing: &[LearningPathNode],
    signal: &PerformanceSignal,
    curriculum: &Curriculum,
    today: NaiveDate,
    config: &EngineConfig,
) -> Vec<LearningPathNode> {
    // One candidate per distinct subtopic among the weak units, first-seen
    // order, capped at the configured maximum.
    let mut seen_subtopics: HashSet<String> = HashSet::new();
    let mut candidates: Vec<(String, String)> = Vec::new();
    for unit_id in &signal.weak_units {
        let Some(unit) = curriculum.unit(unit_id) else {
            continue;
        };
        if seen_subtopics.insert(unit.subtopic_id.clone()) {
            candidates.push((unit.subtopic_id.clone(), unit.topic_id.clone()));
        }
        if candidates.len() == config.max_reinforcement_nodes {
            break;
        }
    }

    // A pending future reinforcement node for the subtopic means this signal
    // (or an identical one) already landed; skip it so node counts stabilize.
    candidates.retain(|(subtopic_id, _)| {
        !existing.iter().any(|n| {
            n.is_reinforcement()
                && n.subtopic_id == *subtopic_id
                && n.status == NodeStatus::Pending
                && n.scheduled_date > today
        })
    });
    if candidates.is_empty() {
        return Vec::new();
    }

    let date = next_open_reinforcement_date(existing, today);
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, (subtopic_id, topic_id))| LearningPathNode {
            id: uuid::Uuid::new_v4().to_string(),
            goal_id: goal_id.to_string(),
            topic_id,
            subtopic_id,
            scheduled_date: date,
            difficulty: DifficultyTier::Easy,
            status: NodeStatus::Pending,
            order_index: -1 - i as i64,
            estimated_minutes: REINFORCEMENT_MINUTES,
        })
        .collect()
}

/// Linear forward scan: the first date strictly after today that carries no
/// reinforcement node for this goal yet.
fn next_open_reinforcement_date(existing: &[LearningPathNode], today: NaiveDate) -> NaiveDate {
    let mut date = today + Duration::days(1);
    for _ in 0..MAX_SLOT_SCAN_DAYS {
        let occupied = existing
            .iter()
            .any(|n| n.scheduled_date == date && n.is_reinforcement());
        if !occupied {
            return date;
        }
        date = date + Duration::days(1);
    }
    date
}

fn topic_mastery(mastery: &HashMap<String, u32>, topic_id: &str) -> u32 {
    mastery.get(topic_id).copied().unwrap_or(0).min(100)
}

fn starting_tier(mastery: u32) -> DifficultyTier {
    if mastery < 50 {
        DifficultyTier::Easy
    } else if mastery < 80 {
        DifficultyTier::Medium
    } else {
        DifficultyTier::Hard
    }
}

fn escalate(tier: DifficultyTier, steps: usize) -> DifficultyTier {
    let mut out = tier;
    for _ in 0..steps {
        out = out.harder();
    }
    out
}
