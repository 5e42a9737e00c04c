#![allow(dead_code)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reserved order-index ceiling for reinforcement nodes. Anything below zero
/// sorts ahead of same-day regular nodes, which always start at zero.
pub const REINFORCEMENT_ORDER_CEILING: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum DifficultyTier {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }

    pub fn harder(&self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            _ => Self::Hard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum NodeStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "skipped" => Self::Skipped,
            _ => Self::Pending,
        }
    }

    /// Completed and skipped nodes are terminal: the scheduler must never
    /// mutate them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Strong,
    NeedsReview,
    Weak,
}

impl Classification {
    /// Grader boundaries: <50 weak, 50–79 needs-review, >=80 strong.
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage < 50 {
            Self::Weak
        } else if percentage < 80 {
            Self::NeedsReview
        } else {
            Self::Strong
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::NeedsReview => "needs_review",
            Self::Weak => "weak",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "strong" => Self::Strong,
            "weak" => Self::Weak,
            _ => Self::NeedsReview,
        }
    }
}

/// Integer percentage with half-up rounding, computed over integer counts so
/// identical inputs can never round differently.
pub fn percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (200 * correct + total) / (2 * total)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub sequence: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtopic {
    pub id: String,
    pub topic_id: String,
    pub name: String,
    pub sequence: i32,
}

/// Atomic citable fact/method/theorem. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeUnit {
    pub id: String,
    /// Short human-readable code, e.g. "T1", "M2".
    pub code: String,
    pub topic_id: String,
    pub subtopic_id: String,
    pub title: String,
    /// Foundational units are citable from every topic.
    #[serde(default)]
    pub is_foundational: bool,
    /// Unit ids that must be mastered before this one.
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionStep {
    pub index: i32,
    /// Every step cites exactly one knowledge unit.
    pub unit_id: String,
    pub unit_code: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub subtopic_id: String,
    pub difficulty: DifficultyTier,
    pub prompt: String,
    pub expected_answer: String,
    pub primary_unit: String,
    #[serde(default)]
    pub supporting_units: Vec<String>,
    #[serde(default)]
    pub steps: Vec<SolutionStep>,
    #[serde(default)]
    pub is_combination: bool,
}

impl Question {
    /// Distinct units this question cites: primary, supporting and per-step
    /// citations, deduplicated (a unit counts once per question).
    pub fn cited_units(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for id in std::iter::once(self.primary_unit.as_str())
            .chain(self.supporting_units.iter().map(|s| s.as_str()))
            .chain(self.steps.iter().map(|s| s.unit_id.as_str()))
        {
            if !id.is_empty() && !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

/// One judged diagnostic response. Write-once once the attempt is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    pub subtopic_id: String,
    pub is_correct: bool,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub misconception_tag: Option<String>,
}

/// Raw mastery-test submission, before judging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: String,
    #[serde(default)]
    pub answer_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyRecord {
    pub student_id: String,
    pub unit_id: String,
    /// Rolling mastery score in [0, 100].
    pub score: u32,
    pub classification: Classification,
    pub attempts: i64,
    pub correct: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningGoal {
    pub id: String,
    pub student_id: String,
    pub target_date: NaiveDate,
    pub topic_ids: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathNode {
    pub id: String,
    pub goal_id: String,
    pub topic_id: String,
    pub subtopic_id: String,
    pub scheduled_date: NaiveDate,
    pub difficulty: DifficultyTier,
    pub status: NodeStatus,
    /// Total order within a date; reinforcement nodes use the reserved
    /// negative range and therefore sort first.
    pub order_index: i64,
    pub estimated_minutes: i64,
}

impl LearningPathNode {
    pub fn is_reinforcement(&self) -> bool {
        self.order_index < REINFORCEMENT_ORDER_CEILING
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSignal {
    pub topic_id: String,
    /// Topic-level score in [0, 100].
    pub score: u32,
    #[serde(default)]
    pub weak_units: Vec<String>,
}
