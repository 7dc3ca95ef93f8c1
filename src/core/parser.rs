//! Scenario code import.
//!
//! A scenario "code" is a text blob with one named section per record
//! collection plus one metadata block. Sections appear in either of two
//! equivalent encodings found in the wild: a bracket-delimited JSON array,
//! or the same array embedded in a single-quoted, backslash-escaped
//! string literal (`JSON.parse('...')`). Codes are frequently hand-edited
//! and re-pasted, so decoding is an ordered ladder of strategies that
//! degrades per section instead of failing the whole load.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::core::store::EntityStore;
use crate::schema::metadata::ScenarioMeta;

/// Variable prefix every section marker starts with.
const VAR_PREFIX: &str = "campaignTrail_temp.";
/// Metadata block marker, and the alternate used by older exports.
pub(crate) const META_MARKER: &str = "campaignTrail_temp.jet_data";
const META_LEGACY_MARKER: &str = "campaignTrail_temp.cyoa_data";
/// Delimiters of the opaque user-code fragment, carried verbatim.
pub(crate) const CODE_START: &str = "//#startcode";
pub(crate) const CODE_END: &str = "//#endcode";

/// Collection sections in persisted order.
pub(crate) const SECTIONS: &[&str] = &[
    "questions",
    "answers",
    "states",
    "issues",
    "candidate_issue_score",
    "running_mate_issue_score",
    "candidate_state_multiplier",
    "state_issue_score",
    "answer_score_global",
    "answer_score_issue",
    "answer_score_state",
    "answer_feedback",
];

/// Sections whose absence the user should hear about.
const REQUIRED_SECTIONS: &[&str] = &["questions", "states", "issues"];

/// Largest id honored from a source document (2^53).
const SAFE_INTEGER_MAX: f64 = 9_007_199_254_740_992.0;
/// A source id this far above the running maximum is treated as corrupt.
const PK_GAP_LIMIT: i64 = 100_000;
/// Individual duplicate warnings beyond this count collapse to a summary.
const DUPLICATE_LOG_LIMIT: usize = 10;

/// The full marker string for a collection section.
pub(crate) fn section_marker(section: &str) -> String {
    format!("{}{}_json", VAR_PREFIX, section)
}

/// Non-fatal conditions observed during import, surfaced to the caller
/// so the editor can show them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    #[error("required section is missing: {section}")]
    MissingSection { section: &'static str },
    #[error("section {section} could not be decoded and was left empty")]
    UndecodableSection { section: &'static str },
    #[error("duplicate pk {pk} in {section}")]
    DuplicatePk { section: &'static str, pk: i64 },
    #[error("{count} duplicate pks in {section} ({shown} reported individually)")]
    DuplicateSummary {
        section: &'static str,
        count: usize,
        shown: usize,
    },
    #[error("discarded untrustworthy pk {raw} in {section}")]
    DiscardedPk { section: &'static str, raw: String },
    #[error("skipped row in {section}: {detail}")]
    BadRow { section: &'static str, detail: String },
}

/// Result of an import: the populated store, the decoded metadata, and
/// every warning raised along the way. Import never fails outright.
#[derive(Debug)]
pub struct ParseOutcome {
    pub store: EntityStore,
    pub meta: ScenarioMeta,
    pub warnings: Vec<ParseWarning>,
}

/// The two known payload encodings, tried in order per section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// `= JSON.parse('...')`, backslash-escaped string literal.
    Quoted,
    /// `= [ ... ];`, plain bracket-delimited array.
    Bracket,
}

impl DecodeStrategy {
    fn other(self) -> Self {
        match self {
            Self::Quoted => Self::Bracket,
            Self::Bracket => Self::Quoted,
        }
    }
}

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("section marker not found")]
    MarkerNotFound,
    #[error("no payload after marker")]
    PayloadNotFound,
    #[error("JSON decode failed: {0}")]
    Json(String),
    #[error("payload is not an array")]
    NotAnArray,
}

/// Picks the per-section default encoding by scanning the whole document:
/// if the quoted form appears anywhere, it dominates.
pub fn detect_default_strategy(code: &str) -> DecodeStrategy {
    if code.contains("JSON.parse('") {
        DecodeStrategy::Quoted
    } else {
        DecodeStrategy::Bracket
    }
}

/// Decodes one section's payload, trying the default strategy first and
/// the other encoding second.
pub fn extract_section(
    code: &str,
    marker: &str,
    default: DecodeStrategy,
) -> Result<Vec<Value>, SectionError> {
    let pos = find_marker(code, marker).ok_or(SectionError::MarkerNotFound)?;
    let after = bound_payload(&code[pos..]);
    let first = decode_with(after, default);
    if first.is_ok() {
        return first;
    }
    decode_with(after, default.other()).or(first)
}

/// Truncates the post-marker text before the next section assignment so
/// one section's decode can never latch onto a later section's payload.
fn bound_payload(after: &str) -> &str {
    let mut end = after.len();
    if let Some(pos) = after.find(VAR_PREFIX) {
        end = end.min(pos);
    }
    // Bare legacy markers carry no shared prefix; bound on the next
    // `<name>_json =` assignment instead.
    let mut search = 0;
    while let Some(rel) = after[search..end].find("_json") {
        let abs = search + rel;
        let tail = after[abs + "_json".len()..].trim_start();
        if tail.starts_with('=') {
            end = abs;
            break;
        }
        search = abs + "_json".len();
    }
    &after[..end]
}

/// Finds a marker, falling back to the bare variable name older exports
/// used (no `campaignTrail_temp.` prefix).
fn find_marker(code: &str, marker: &str) -> Option<usize> {
    if let Some(pos) = code.find(marker) {
        return Some(pos + marker.len());
    }
    let bare = marker.strip_prefix(VAR_PREFIX)?;
    code.find(bare).map(|pos| pos + bare.len())
}

fn decode_with(after: &str, strategy: DecodeStrategy) -> Result<Vec<Value>, SectionError> {
    let value = match strategy {
        DecodeStrategy::Quoted => decode_quoted(after)?,
        DecodeStrategy::Bracket => decode_bracket(after)?,
    };
    value.as_array().cloned().ok_or(SectionError::NotAnArray)
}

/// Quoted-form decode: extract the single-quoted literal after
/// `JSON.parse('`, honoring escape sequences so an escaped quote never
/// terminates extraction early, then unescape and parse.
fn decode_quoted(after: &str) -> Result<Value, SectionError> {
    let open = after
        .find("JSON.parse('")
        .ok_or(SectionError::PayloadNotFound)?
        + "JSON.parse('".len();
    let body = &after[open..];

    let mut end = None;
    let mut escaped = false;
    for (i, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' => {
                end = Some(i);
                break;
            }
            _ => {}
        }
    }

    let primary = end
        .ok_or(SectionError::PayloadNotFound)
        .and_then(|end| parse_json(&unescape_js(&body[..end])));
    match primary {
        Ok(v) => Ok(v),
        // The literal may be truncated or mangled; retry against every
        // later occurrence of the terminating token.
        Err(first_err) => retry_spans(body, "')")
            .into_iter()
            .find_map(|span| parse_json(&unescape_js(&span)).ok())
            .ok_or(first_err),
    }
}

/// Bracket-form decode: depth-scan from the first `[` to its matching
/// `]` (string-aware), then parse the slice.
fn decode_bracket(after: &str) -> Result<Value, SectionError> {
    let start = after.find('[').ok_or(SectionError::PayloadNotFound)?;
    let body = &after[start..];

    let primary = matching_bracket(body)
        .ok_or(SectionError::PayloadNotFound)
        .and_then(|end| parse_json(&body[..=end]));
    match primary {
        Ok(v) => Ok(v),
        Err(first_err) => retry_spans(body, "]")
            .into_iter()
            .find_map(|span| parse_json(&span).ok())
            .ok_or(first_err),
    }
}

fn parse_json(text: &str) -> Result<Value, SectionError> {
    serde_json::from_str(text).map_err(|e| SectionError::Json(e.to_string()))
}

/// Candidate spans for the retry ladder: one per later occurrence of the
/// terminating token, in document order, each with quote and
/// trailing-comma artifacts stripped.
fn retry_spans(body: &str, terminator: &str) -> Vec<String> {
    body.match_indices(terminator)
        .map(|(idx, _)| cleanup_span(&body[..idx + 1]))
        .collect()
}

/// Strips one layer of stray quoting and trailing-comma artifacts from a
/// candidate span. Only used on the retry rungs; the primary rungs parse
/// exact spans.
fn cleanup_span(span: &str) -> String {
    let mut s = span.trim();
    if let Some(stripped) = s.strip_suffix(';') {
        s = stripped.trim_end();
    }
    if let Some(stripped) = s.strip_prefix('\'').or_else(|| s.strip_prefix('"')) {
        s = stripped;
    }
    if let Some(stripped) = s.strip_suffix('\'').or_else(|| s.strip_suffix('"')) {
        s = stripped;
    }
    s.replace(",]", "]").replace(",}", "}")
}

/// Matching `]` for a body starting at `[`, skipping brackets inside
/// double-quoted strings.
fn matching_bracket(body: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Undoes JavaScript string-literal escaping. Escapes JSON itself needs
/// (`\u....` and friends inside double-quoted strings) pass through
/// untouched.
fn unescape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// The opaque user-code fragment between its delimiters, verbatim.
fn extract_custom_code(code: &str) -> Option<String> {
    let start = code.find(CODE_START)? + CODE_START.len();
    let end = code[start..].find(CODE_END)? + start;
    Some(code[start..end].trim_matches('\n').to_string())
}

// ---- mojibake repair ---------------------------------------------------

/// UTF-8 text that went through a Latin-1 decode somewhere leaves these
/// signatures in free-text fields.
const MOJIBAKE_TABLE: &[(&str, &str)] = &[
    ("\u{e2}\u{20ac}\u{2122}", "\u{2019}"), // â€™ right single quote
    ("\u{e2}\u{20ac}\u{2dc}", "\u{2018}"),  // â€˜ left single quote
    ("\u{e2}\u{20ac}\u{153}", "\u{201c}"),  // â€œ left double quote
    ("\u{e2}\u{20ac}\u{9d}", "\u{201d}"),   // â€? right double quote
    ("\u{e2}\u{20ac}\u{201c}", "\u{2013}"), // â€“ en dash
    ("\u{e2}\u{20ac}\u{201d}", "\u{2014}"), // â€” em dash
    ("\u{e2}\u{20ac}\u{a6}", "\u{2026}"),   // â€¦ ellipsis
    ("\u{c3}\u{a9}", "\u{e9}"),             // Ã© e acute
    ("\u{c3}\u{a8}", "\u{e8}"),             // Ã¨ e grave
    ("\u{c3}\u{b1}", "\u{f1}"),             // Ã± n tilde
];

/// Corrects known mis-decoded punctuation sequences in a text field.
pub fn repair_mojibake(text: &str) -> String {
    if !text.contains('\u{e2}') && !text.contains('\u{c3}') {
        return text.to_string();
    }
    let mut fixed = text.to_string();
    for (bad, good) in MOJIBAKE_TABLE {
        if fixed.contains(bad) {
            fixed = fixed.replace(bad, good);
        }
    }
    fixed
}

fn repair_store_text(store: &mut EntityStore) {
    for q in &mut store.questions {
        q.description = repair_mojibake(&q.description);
    }
    for a in &mut store.answers {
        a.description = repair_mojibake(&a.description);
    }
    for f in &mut store.answer_feedback {
        f.answer_feedback = repair_mojibake(&f.answer_feedback);
    }
    for s in &mut store.states {
        s.name = repair_mojibake(&s.name);
    }
    for issue in &mut store.issues {
        issue.name = repair_mojibake(&issue.name);
        issue.description = repair_mojibake(&issue.description);
        for stance in &mut issue.stances {
            stance.text = repair_mojibake(&stance.text);
            if let Some(desc) = &stance.description {
                stance.description = Some(repair_mojibake(desc));
            }
        }
    }
}

// ---- record intake -----------------------------------------------------

/// How a section treats an incoming row whose id is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DuplicatePolicy {
    /// Re-key the incoming row to a fresh id. Safe for effect/score rows,
    /// whose pks nothing else references.
    Remap,
    /// Keep the id and flag it. Identity collections are FK targets
    /// elsewhere in the same document, so remapping would orphan rows.
    Flag,
}

struct Parser<'a> {
    code: &'a str,
    default_strategy: DecodeStrategy,
    warnings: Vec<ParseWarning>,
    max_seen: i64,
    used_pks: rustc_hash::FxHashSet<i64>,
}

impl<'a> Parser<'a> {
    fn new(code: &'a str) -> Self {
        Self {
            code,
            default_strategy: detect_default_strategy(code),
            warnings: Vec::new(),
            max_seen: 0,
            used_pks: rustc_hash::FxHashSet::default(),
        }
    }

    fn fresh_pk(&mut self) -> i64 {
        self.max_seen += 1;
        self.max_seen
    }

    /// Coerces a raw source pk to a trustworthy id, or replaces it.
    /// Non-finite, fractional, non-positive, beyond-2^53, and
    /// implausibly-far-ahead ids are all discarded; source ids cannot be
    /// trusted for global uniqueness.
    fn normalize_pk(&mut self, raw: Option<&Value>, section: &'static str) -> i64 {
        let coerced = match raw {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(v) = coerced {
            if v.is_finite() && v.fract() == 0.0 && v > 0.0 && v <= SAFE_INTEGER_MAX {
                let id = v as i64;
                if id <= self.max_seen + PK_GAP_LIMIT {
                    if id > self.max_seen {
                        self.max_seen = id;
                    }
                    return id;
                }
            }
        }
        let rendered = raw.map_or_else(|| "missing".to_string(), |v| v.to_string());
        log::warn!("{}: discarding untrustworthy pk {}", section, rendered);
        self.warnings.push(ParseWarning::DiscardedPk {
            section,
            raw: rendered,
        });
        self.fresh_pk()
    }

    fn intake<T: DeserializeOwned>(
        &mut self,
        section: &'static str,
        policy: DuplicatePolicy,
    ) -> Vec<T> {
        let marker = section_marker(section);
        let rows = match extract_section(self.code, &marker, self.default_strategy) {
            Ok(rows) => rows,
            Err(SectionError::MarkerNotFound) => {
                if REQUIRED_SECTIONS.contains(&section) {
                    log::warn!("required section {} is missing", section);
                    self.warnings.push(ParseWarning::MissingSection { section });
                }
                return Vec::new();
            }
            Err(err) => {
                log::warn!("section {} undecodable: {}", section, err);
                self.warnings
                    .push(ParseWarning::UndecodableSection { section });
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        let mut duplicates = 0usize;
        for row in rows {
            let Some(obj) = row.as_object() else {
                self.warnings.push(ParseWarning::BadRow {
                    section,
                    detail: "row is not an object".to_string(),
                });
                continue;
            };
            let mut id = self.normalize_pk(obj.get("pk"), section);
            if self.used_pks.contains(&id) {
                match policy {
                    DuplicatePolicy::Remap => id = self.fresh_pk(),
                    DuplicatePolicy::Flag => {
                        duplicates += 1;
                        if duplicates <= DUPLICATE_LOG_LIMIT {
                            log::warn!("duplicate pk {} in {}", id, section);
                            self.warnings
                                .push(ParseWarning::DuplicatePk { section, pk: id });
                        }
                    }
                }
            }
            self.used_pks.insert(id);

            // Rows may be Django-fixture envelopes or flat objects.
            let mut fields = match obj.get("fields") {
                Some(Value::Object(f)) => f.clone(),
                _ => {
                    let mut flat = obj.clone();
                    flat.remove("model");
                    flat
                }
            };
            fields.insert("pk".to_string(), Value::from(id));
            match serde_json::from_value::<T>(Value::Object(fields)) {
                Ok(record) => records.push(record),
                Err(err) => self.warnings.push(ParseWarning::BadRow {
                    section,
                    detail: err.to_string(),
                }),
            }
        }
        if duplicates > DUPLICATE_LOG_LIMIT {
            log::warn!(
                "{} duplicate pks in {} ({} reported individually)",
                duplicates,
                section,
                DUPLICATE_LOG_LIMIT
            );
            self.warnings.push(ParseWarning::DuplicateSummary {
                section,
                count: duplicates,
                shown: DUPLICATE_LOG_LIMIT,
            });
        }
        records
    }

    fn intake_meta(&mut self) -> ScenarioMeta {
        let rows = extract_section(self.code, META_MARKER, self.default_strategy)
            .or_else(|_| extract_section(self.code, META_LEGACY_MARKER, self.default_strategy));
        let mut meta = match rows {
            Ok(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| serde_json::from_value::<ScenarioMeta>(row).ok())
                .unwrap_or_default(),
            Err(_) => ScenarioMeta::default(),
        };
        if let Some(code) = extract_custom_code(self.code) {
            meta.custom_code = code;
        }
        meta
    }
}

/// Decodes a full scenario code into a store, metadata, and warnings.
/// Structural failures degrade to empty per-section results; this never
/// returns an error.
pub fn parse_scenario(code: &str) -> ParseOutcome {
    let mut p = Parser::new(code);
    let mut store = EntityStore::new();

    store.questions = p.intake("questions", DuplicatePolicy::Flag);
    store.answers = p.intake("answers", DuplicatePolicy::Flag);
    store.states = p.intake("states", DuplicatePolicy::Flag);
    store.issues = p.intake("issues", DuplicatePolicy::Flag);
    store.candidate_issue_scores = p.intake("candidate_issue_score", DuplicatePolicy::Remap);
    store.running_mate_issue_scores =
        p.intake("running_mate_issue_score", DuplicatePolicy::Remap);
    store.candidate_state_multipliers =
        p.intake("candidate_state_multiplier", DuplicatePolicy::Remap);
    store.state_issue_scores = p.intake("state_issue_score", DuplicatePolicy::Remap);
    store.answer_score_globals = p.intake("answer_score_global", DuplicatePolicy::Remap);
    store.answer_score_issues = p.intake("answer_score_issue", DuplicatePolicy::Remap);
    store.answer_score_states = p.intake("answer_score_state", DuplicatePolicy::Remap);
    store.answer_feedback = p.intake("answer_feedback", DuplicatePolicy::Remap);

    store.bump_pk_floor(p.max_seen);
    repair_store_text(&mut store);

    let meta = p.intake_meta();
    ParseOutcome {
        store,
        meta,
        warnings: p.warnings,
    }
}
