//! Typed scenario metadata.
//!
//! The persisted format carries one free-form metadata block alongside the
//! record sections. It is modeled here as an explicit struct with optional
//! feature configs rather than a loose dictionary, so each generated
//! fragment has a typed gate and typed inputs.

use serde::{Deserialize, Serialize};

use super::ids::Pk;

/// Scenario-wide metadata: display fields plus the optional feature
/// configurations that gate the emitter's generated fragments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioMeta {
    #[serde(default)]
    pub scenario_name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub banner: BannerConfig,
    #[serde(default)]
    pub map: Option<MapConfig>,
    #[serde(default)]
    pub endings: Option<EndingConfig>,
    #[serde(default)]
    pub branching: Option<BranchingConfig>,
    /// Opaque user code carried verbatim between its own delimiters.
    /// Excluded from the metadata block's own serialization so it is
    /// never double-encoded.
    #[serde(skip)]
    pub custom_code: String,
}

/// Candidate banner shown on the results screen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BannerConfig {
    #[serde(default)]
    pub candidate_last_name: String,
    #[serde(default)]
    pub running_mate_last_name: String,
    #[serde(default)]
    pub candidate_image: String,
    #[serde(default)]
    pub running_mate_image: String,
    #[serde(default)]
    pub candidate_color: String,
}

/// Viewport parameters for the generated map-rendering glue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default)]
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub x_offset: f64,
    #[serde(default)]
    pub y_offset: f64,
}

/// Custom-ending feature: an ordered rule list evaluated first match wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EndingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<EndingRule>,
}

/// Comparison operator in an ending guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
}

impl ComparisonOp {
    /// The operator as it appears in generated code.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
        }
    }
}

/// One guarded ending: `metric <op> threshold` selects text and an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingRule {
    pub metric: String,
    pub operator: ComparisonOp,
    pub threshold: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Branching-logic feature: tracked variables, grouped adjustments, and
/// answer-triggered jumps between questions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BranchingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub variables: Vec<BranchVariable>,
    #[serde(default)]
    pub adjustments: Vec<BranchAdjustment>,
    #[serde(default)]
    pub jumps: Vec<BranchJump>,
    #[serde(default)]
    pub no_match_target: Option<Pk>,
}

/// A tracked branching variable with its starting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchVariable {
    pub name: String,
    #[serde(default)]
    pub default: f64,
}

/// Increment/decrement of one variable, triggered by any of a set of
/// answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchAdjustment {
    pub variable: String,
    pub amount: f64,
    #[serde(default)]
    pub answers: Vec<Pk>,
}

/// Jump to a target question when any of the listed answers was picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchJump {
    #[serde(default)]
    pub answers: Vec<Pk>,
    pub target: Pk,
}
