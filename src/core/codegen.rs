//! Generated runtime-logic fragments.
//!
//! The emitter can append three script fragments consumed by the
//! downstream game runtime. Each one is rendered from a typed view model
//! so the generation logic is testable without going through a full
//! export. This crate owns the fragments' content, never their execution.

use crate::core::store::EntityStore;
use crate::schema::ids::Pk;
use crate::schema::metadata::{BranchingConfig, EndingConfig, MapConfig};

/// Renders a string as a double-quoted JS literal.
fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Formats a threshold or default without trailing `.0` noise for
/// integral values.
fn js_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

// ---- map glue ----------------------------------------------------------

/// View model for the map fragment: viewport plus one (abbr, path) pair
/// per drawn state, in store order.
#[derive(Debug, Clone, PartialEq)]
pub struct MapGlueView {
    pub width: u32,
    pub height: u32,
    pub x_offset: f64,
    pub y_offset: f64,
    pub states: Vec<(String, String)>,
}

impl MapGlueView {
    pub fn from_store(store: &EntityStore, cfg: &MapConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            x_offset: cfg.x_offset,
            y_offset: cfg.y_offset,
            states: store
                .states
                .iter()
                .filter_map(|s| {
                    s.map_path
                        .as_ref()
                        .map(|path| (s.abbr.clone(), path.clone()))
                })
                .collect(),
        }
    }
}

/// Rendering script parameterized by per-state path geometry.
pub fn render_map_glue(view: &MapGlueView) -> String {
    let mut out = String::new();
    out.push_str("function loadScenarioMap() {\n");
    out.push_str(&format!(
        "  const viewBox = \"{} {} {} {}\";\n",
        js_number(view.x_offset),
        js_number(view.y_offset),
        view.width,
        view.height
    ));
    out.push_str("  const statePaths = {\n");
    for (abbr, path) in &view.states {
        out.push_str(&format!(
            "    {}: {},\n",
            js_string(abbr),
            js_string(path)
        ));
    }
    out.push_str("  };\n");
    out.push_str("  const svg = document.getElementById(\"map_container\");\n");
    out.push_str("  svg.setAttribute(\"viewBox\", viewBox);\n");
    out.push_str("  for (const abbr in statePaths) {\n");
    out.push_str("    const el = document.createElementNS(\"http://www.w3.org/2000/svg\", \"path\");\n");
    out.push_str("    el.setAttribute(\"d\", statePaths[abbr]);\n");
    out.push_str("    el.setAttribute(\"id\", abbr);\n");
    out.push_str("    svg.appendChild(el);\n");
    out.push_str("  }\n");
    out.push_str("}\n");
    out
}

// ---- ending rules ------------------------------------------------------

/// Guarded comparisons in persisted display order, first match wins.
pub fn render_ending_rules(cfg: &EndingConfig) -> String {
    let mut out = String::new();
    out.push_str("function determineEnding(metrics) {\n");
    for (i, rule) in cfg.rules.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "else if" };
        out.push_str(&format!(
            "  {} (metrics[{}] {} {}) {{\n",
            keyword,
            js_string(&rule.metric),
            rule.operator.symbol(),
            js_number(rule.threshold)
        ));
        out.push_str(&format!(
            "    return {{text: {}, image: {}}};\n",
            js_string(&rule.text),
            rule.image.as_deref().map_or_else(|| "null".to_string(), js_string)
        ));
        out.push_str("  }\n");
    }
    out.push_str("  return {text: \"\", image: null};\n");
    out.push_str("}\n");
    out
}

// ---- branching logic ---------------------------------------------------

/// View model for the branching fragment: question pk to display
/// position, plus the branching configuration itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchingView<'a> {
    pub question_positions: Vec<(Pk, usize)>,
    pub cfg: &'a BranchingConfig,
}

impl<'a> BranchingView<'a> {
    pub fn from_store(store: &EntityStore, cfg: &'a BranchingConfig) -> Self {
        Self {
            question_positions: store
                .questions
                .iter()
                .enumerate()
                .map(|(i, q)| (q.pk, i))
                .collect(),
            cfg,
        }
    }
}

fn answers_predicate(answers: &[Pk], var: &str) -> String {
    answers
        .iter()
        .map(|a| format!("{} == {}", var, a))
        .collect::<Vec<_>>()
        .join(" || ")
}

/// Renders the pk-to-position lookup, variable declarations, grouped
/// adjustment statements, and the jump chain with its terminal
/// no-match branch.
pub fn render_branching(view: &BranchingView<'_>) -> String {
    let mut out = String::new();

    out.push_str("var questionPositions = {\n");
    for (pk, pos) in &view.question_positions {
        out.push_str(&format!("  \"{}\": {},\n", pk, pos));
    }
    out.push_str("};\n\n");

    for var in &view.cfg.variables {
        out.push_str(&format!("var {} = {};\n", var.name, js_number(var.default)));
    }
    out.push('\n');

    out.push_str("function applyAnswerEffects(picked) {\n");
    // Adjustments sharing the same triggering-answer set collapse into
    // one guard.
    let mut groups: Vec<(Vec<Pk>, Vec<String>)> = Vec::new();
    for adj in &view.cfg.adjustments {
        let mut key = adj.answers.clone();
        key.sort_unstable();
        let op = if adj.amount >= 0.0 { "+=" } else { "-=" };
        let stmt = format!("{} {} {};", adj.variable, op, js_number(adj.amount.abs()));
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, stmts)) => stmts.push(stmt),
            None => groups.push((key, vec![stmt])),
        }
    }
    for (answers, stmts) in &groups {
        out.push_str(&format!(
            "  if ({}) {{\n",
            answers_predicate(answers, "picked")
        ));
        for stmt in stmts {
            out.push_str(&format!("    {}\n", stmt));
        }
        out.push_str("  }\n");
    }
    out.push_str("}\n\n");

    out.push_str("function nextQuestionPosition(picked) {\n");
    for (i, jump) in view.cfg.jumps.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "else if" };
        out.push_str(&format!(
            "  {} ({}) {{\n",
            keyword,
            answers_predicate(&jump.answers, "picked")
        ));
        out.push_str(&format!(
            "    return questionPositions[\"{}\"];\n",
            jump.target
        ));
        out.push_str("  }\n");
    }
    match view.cfg.no_match_target {
        Some(target) => out.push_str(&format!(
            "  return questionPositions[\"{}\"];\n",
            target
        )),
        None => out.push_str("  return -1;\n"),
    }
    out.push_str("}\n");
    out
}
