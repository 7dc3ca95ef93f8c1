//! Scenario code export.
//!
//! Serializes a store and its metadata back into the persisted text
//! convention: one labeled dump per collection in fixed order, the
//! metadata block, the verbatim user-code fragment, and the generated
//! runtime fragments each gated by its feature config. Output is fully
//! deterministic so exports diff cleanly.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::codegen::{
    render_branching, render_ending_rules, render_map_glue, BranchingView, MapGlueView,
};
use crate::core::parser::{section_marker, CODE_END, CODE_START, META_MARKER};
use crate::core::store::EntityStore;
use crate::schema::metadata::ScenarioMeta;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which of the two wire encodings to write. Parsers accept both; the
/// bracket form is the readable default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeStyle {
    #[default]
    Bracket,
    Quoted,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    pub style: CodeStyle,
}

/// Escapes a payload for embedding in a single-quoted string literal.
fn escape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wraps serialized rows into Django-fixture envelopes, the row shape
/// existing scenario codes use.
fn envelope_rows<T: Serialize>(records: &[T], model: &str) -> Result<Vec<Value>, EmitError> {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut value = serde_json::to_value(record)?;
        let pk = value
            .as_object_mut()
            .and_then(|obj| obj.remove("pk"))
            .unwrap_or(Value::Null);
        rows.push(serde_json::json!({
            "model": format!("campaign_trail.{}", model),
            "pk": pk,
            "fields": value,
        }));
    }
    Ok(rows)
}

fn write_section(
    out: &mut String,
    marker: &str,
    rows: &[Value],
    style: CodeStyle,
) -> Result<(), EmitError> {
    match style {
        CodeStyle::Bracket => {
            let pretty = serde_json::to_string_pretty(&Value::Array(rows.to_vec()))?;
            out.push_str(marker);
            out.push_str(" = ");
            out.push_str(&pretty);
            out.push_str(";\n\n");
        }
        CodeStyle::Quoted => {
            let compact = serde_json::to_string(&Value::Array(rows.to_vec()))?;
            out.push_str(marker);
            out.push_str(" = JSON.parse('");
            out.push_str(&escape_js(&compact));
            out.push_str("');\n\n");
        }
    }
    Ok(())
}

/// Serializes the store and metadata into one scenario code string.
///
/// Round-trip contract: feeding the output back through
/// [`parse_scenario`](crate::core::parser::parse_scenario) yields a
/// semantically equivalent store; only ordering and whitespace are free,
/// and ids only move if the original import had to remap them.
pub fn emit_scenario(
    store: &EntityStore,
    meta: &ScenarioMeta,
    options: EmitOptions,
) -> Result<String, EmitError> {
    let mut out = String::new();
    let style = options.style;

    let sections: &[(&str, Vec<Value>)] = &[
        ("questions", envelope_rows(&store.questions, "question")?),
        ("answers", envelope_rows(&store.answers, "answer")?),
        ("states", envelope_rows(&store.states, "state")?),
        ("issues", envelope_rows(&store.issues, "issue")?),
        (
            "candidate_issue_score",
            envelope_rows(&store.candidate_issue_scores, "candidate_issue_score")?,
        ),
        (
            "running_mate_issue_score",
            envelope_rows(
                &store.running_mate_issue_scores,
                "running_mate_issue_score",
            )?,
        ),
        (
            "candidate_state_multiplier",
            envelope_rows(
                &store.candidate_state_multipliers,
                "candidate_state_multiplier",
            )?,
        ),
        (
            "state_issue_score",
            envelope_rows(&store.state_issue_scores, "state_issue_score")?,
        ),
        (
            "answer_score_global",
            envelope_rows(&store.answer_score_globals, "answer_score_global")?,
        ),
        (
            "answer_score_issue",
            envelope_rows(&store.answer_score_issues, "answer_score_issue")?,
        ),
        (
            "answer_score_state",
            envelope_rows(&store.answer_score_states, "answer_score_state")?,
        ),
        (
            "answer_feedback",
            envelope_rows(&store.answer_feedback, "answer_feedback")?,
        ),
    ];
    for (section, rows) in sections {
        write_section(&mut out, &section_marker(section), rows, style)?;
    }

    // Metadata block. `custom_code` is skipped by its serde attribute,
    // so the fragment below is never double-encoded.
    let meta_value = serde_json::to_value(meta)?;
    write_section(&mut out, META_MARKER, &[meta_value], style)?;

    if !meta.custom_code.is_empty() {
        out.push_str(CODE_START);
        out.push('\n');
        out.push_str(&meta.custom_code);
        out.push('\n');
        out.push_str(CODE_END);
        out.push_str("\n\n");
    }

    if let Some(map) = meta.map.as_ref().filter(|m| m.enabled) {
        out.push_str(&render_map_glue(&MapGlueView::from_store(store, map)));
        out.push('\n');
    }
    if let Some(endings) = meta.endings.as_ref().filter(|e| e.enabled) {
        out.push_str(&render_ending_rules(endings));
        out.push('\n');
    }
    if let Some(branching) = meta.branching.as_ref().filter(|b| b.enabled) {
        out.push_str(&render_branching(&BranchingView::from_store(
            store, branching,
        )));
        out.push('\n');
    }

    Ok(out)
}
