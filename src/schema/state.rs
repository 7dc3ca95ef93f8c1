//! State records and their per-candidate / per-issue dependent rows.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::ids::{CandidateId, Pk};

fn default_one() -> f64 {
    1.0
}

/// Accepts `true`/`false` as well as the numeric 0/1 flags older
/// scenario codes use.
fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Num(f64),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Num(n) => Ok(n != 0.0),
        Flag::Text(s) => match s.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid flag: {:?}", other))),
        },
    }
}

/// A state (or other electoral unit) contested in the scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub pk: Pk,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub abbr: String,
    #[serde(default)]
    pub electoral_votes: u32,
    #[serde(default)]
    pub popular_votes: u64,
    /// Hour offset used for results-night ordering.
    #[serde(default)]
    pub poll_closing_time: i32,
    #[serde(default, deserialize_with = "de_flag")]
    pub winner_take_all_flag: bool,
    #[serde(default)]
    pub election: Option<Pk>,
    /// SVG path geometry for the map fragment; absent when the state
    /// is not drawn.
    #[serde(default)]
    pub map_path: Option<String>,
}

/// Baseline lean of a state toward a candidate, multiplied into the
/// simulated state standing before perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStateMultiplier {
    pub pk: Pk,
    pub candidate: CandidateId,
    pub state: Pk,
    #[serde(default = "default_one")]
    pub state_multiplier: f64,
}

/// How much a state cares about an issue, and where it stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateIssueScore {
    pub pk: Pk,
    pub state: Pk,
    pub issue: Pk,
    /// The state's lean on the issue axis, -1..1.
    #[serde(default)]
    pub state_issue_score: f64,
    /// Relative importance of the issue to this state's voters.
    #[serde(default = "default_one")]
    pub weight: f64,
}
