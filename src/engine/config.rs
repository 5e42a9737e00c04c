use serde::{Deserialize, Serialize};

/// Heuristic pacing constant inherited from the product: three minutes of
/// scheduled work per point of missing mastery.
pub const DEFAULT_MINUTES_PER_MASTERY_POINT: f64 = 3.0;
/// Goals with a shorter horizon are rejected outright.
pub const DEFAULT_MIN_HORIZON_DAYS: i64 = 14;
/// Topic score below this inserts reinforcement work.
pub const DEFAULT_WEAK_SCORE_THRESHOLD: u32 = 60;
/// Topic score at or above this escalates pending easy nodes.
pub const DEFAULT_ADVANCE_SCORE_THRESHOLD: u32 = 80;
/// At most this many reinforcement nodes per performance signal.
pub const DEFAULT_MAX_REINFORCEMENT_NODES: usize = 3;
/// Concurrent in-flight judge calls while grading one submission.
pub const DEFAULT_JUDGE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub minutes_per_mastery_point: f64,
    pub min_horizon_days: i64,
    pub weak_score_threshold: u32,
    pub advance_score_threshold: u32,
    pub max_reinforcement_nodes: usize,
    pub judge_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minutes_per_mastery_point: DEFAULT_MINUTES_PER_MASTERY_POINT,
            min_horizon_days: DEFAULT_MIN_HORIZON_DAYS,
            weak_score_threshold: DEFAULT_WEAK_SCORE_THRESHOLD,
            advance_score_threshold: DEFAULT_ADVANCE_SCORE_THRESHOLD,
            max_reinforcement_nodes: DEFAULT_MAX_REINFORCEMENT_NODES,
            judge_concurrency: DEFAULT_JUDGE_CONCURRENCY,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            minutes_per_mastery_point: env_f64("TUTORA_MINUTES_PER_MASTERY_POINT")
                .unwrap_or(defaults.minutes_per_mastery_point),
            min_horizon_days: env_i64("TUTORA_MIN_HORIZON_DAYS")
                .unwrap_or(defaults.min_horizon_days),
            weak_score_threshold: env_u32("TUTORA_WEAK_SCORE_THRESHOLD")
                .unwrap_or(defaults.weak_score_threshold),
            advance_score_threshold: env_u32("TUTORA_ADVANCE_SCORE_THRESHOLD")
                .unwrap_or(defaults.advance_score_threshold),
            max_reinforcement_nodes: env_usize("TUTORA_MAX_REINFORCEMENT_NODES")
                .unwrap_or(defaults.max_reinforcement_nodes),
            judge_concurrency: env_usize("TUTORA_JUDGE_CONCURRENCY")
                .unwrap_or(defaults.judge_concurrency)
                .max(1),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_f64(key: &str) -> Option<f64> {
    env_string(key)?.parse().ok()
}

fn env_i64(key: &str) -> Option<i64> {
    env_string(key)?.parse().ok()
}

fn env_u32(key: &str) -> Option<u32> {
    env_string(key)?.parse().ok()
}

fn env_usize(key: &str) -> Option<usize> {
    env_string(key)?.parse().ok()
}
