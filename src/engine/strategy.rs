//! Explanation-strategy escalation.
//!
//! After repeated incorrect attempts on the same question family, the tutor
//! switches to a different teaching strategy. The stage is a pure function
//! of the consecutive-failure count, so it can be tested without any prompt
//! text involved.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ExplanationStage {
    #[default]
    FirstAttempt,
    SecondAttempt,
    Escalated,
}

impl ExplanationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstAttempt => "first_attempt",
            Self::SecondAttempt => "second_attempt",
            Self::Escalated => "escalated",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "second_attempt" => Self::SecondAttempt,
            "escalated" => Self::Escalated,
            _ => Self::FirstAttempt,
        }
    }

    /// Stage for a given number of consecutive failures on the family.
    pub fn for_failure_count(consecutive_failures: i64) -> Self {
        match consecutive_failures {
            i64::MIN..=0 => Self::FirstAttempt,
            1 => Self::SecondAttempt,
            _ => Self::Escalated,
        }
    }
}

/// Fold one attempt outcome into the consecutive-failure count. A correct
/// answer resets the family to the first stage.
pub fn next_failure_count(consecutive_failures: i64, is_correct: bool) -> i64 {
    if is_correct {
        0
    } else {
        consecutive_failures.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_by_failure_count() {
        assert_eq!(ExplanationStage::for_failure_count(0), ExplanationStage::FirstAttempt);
        assert_eq!(ExplanationStage::for_failure_count(1), ExplanationStage::SecondAttempt);
        assert_eq!(ExplanationStage::for_failure_count(2), ExplanationStage::Escalated);
        assert_eq!(ExplanationStage::for_failure_count(9), ExplanationStage::Escalated);
    }

    #[test]
    fn correct_answer_resets() {
        let mut count = 0;
        count = next_failure_count(count, false);
        count = next_failure_count(count, false);
        assert_eq!(ExplanationStage::for_failure_count(count), ExplanationStage::Escalated);

        count = next_failure_count(count, true);
        assert_eq!(count, 0);
        assert_eq!(ExplanationStage::for_failure_count(count), ExplanationStage::FirstAttempt);
    }
}
