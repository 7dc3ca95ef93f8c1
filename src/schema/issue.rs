//! Issue records and the per-candidate issue positioning rows.

use serde::{Deserialize, Serialize};

use super::ids::{CandidateId, Pk};

/// Number of fixed stance slots every issue carries.
pub const STANCE_COUNT: usize = 7;

/// One ideological position on an issue's seven-point axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stance {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_stances() -> [Stance; STANCE_COUNT] {
    std::array::from_fn(|_| Stance::default())
}

/// A campaign issue with seven fixed stance slots.
///
/// Stores must keep at least one issue alive at all times; the store
/// enforces that on deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub pk: Pk,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_stances")]
    pub stances: [Stance; STANCE_COUNT],
}

/// A candidate's base stance on an issue, in -1..1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateIssueScore {
    pub pk: Pk,
    pub candidate: CandidateId,
    pub issue: Pk,
    #[serde(default)]
    pub issue_score: f64,
}

/// A running mate's stance on an issue, blended at reduced weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningMateIssueScore {
    pub pk: Pk,
    pub candidate: CandidateId,
    pub issue: Pk,
    #[serde(default)]
    pub issue_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_default_stances_are_empty() {
        let issue: Issue = serde_json::from_str(r#"{"pk": 1, "name": "Economy"}"#).unwrap();
        assert_eq!(issue.stances.len(), STANCE_COUNT);
        assert!(issue.stances.iter().all(|s| s.text.is_empty()));
    }

    #[test]
    fn issue_stances_round_trip() {
        let mut issue: Issue =
            serde_json::from_str(r#"{"pk": 1, "name": "Economy", "description": ""}"#).unwrap();
        issue.stances[0] = Stance {
            text: "Full laissez-faire".to_string(),
            description: Some("No intervention at all".to_string()),
        };
        let json = serde_json::to_string(&issue).unwrap();
        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, issue);
    }

    #[test]
    fn candidate_issue_score_parses() {
        let row: CandidateIssueScore =
            serde_json::from_str(r#"{"pk": 5, "candidate": 300, "issue": 1, "issue_score": -0.4}"#)
                .unwrap();
        assert_eq!(row.issue, Pk(1));
        assert!((row.issue_score + 0.4).abs() < f64::EPSILON);
    }
}
