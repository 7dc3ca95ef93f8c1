//! Question and answer records, plus the per-answer effect rows.

use serde::{Deserialize, Serialize};

use super::ids::{CandidateId, Pk};

fn default_one() -> f64 {
    1.0
}

/// A question posed to the player. Owns its answers via `Answer::question`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub pk: Pk,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub description: String,
    /// Relative chance of the question being drawn into a playthrough.
    #[serde(default = "default_one")]
    pub likelihood: f64,
}

/// One selectable answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub pk: Pk,
    pub question: Pk,
    #[serde(default)]
    pub description: String,
}

/// Post-answer feedback text shown for a specific candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub pk: Pk,
    pub answer: Pk,
    pub candidate: CandidateId,
    #[serde(default)]
    pub answer_feedback: String,
}

/// Global (nationwide) effect of an answer: the acting candidate shifts
/// the affected candidate's overall multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerScoreGlobal {
    pub pk: Pk,
    pub answer: Pk,
    pub candidate: CandidateId,
    pub affected_candidate: CandidateId,
    #[serde(default)]
    pub global_multiplier: f64,
}

/// Issue-stance effect of an answer on the player's positioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerScoreIssue {
    pub pk: Pk,
    pub answer: Pk,
    pub issue: Pk,
    #[serde(default)]
    pub issue_score: f64,
}

/// State-scoped effect of an answer on a candidate's standing there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerScoreState {
    pub pk: Pk,
    pub answer: Pk,
    pub state: Pk,
    pub candidate: CandidateId,
    pub affected_candidate: CandidateId,
    #[serde(default)]
    pub state_multiplier: f64,
}
