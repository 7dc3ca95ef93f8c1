/// Import/export integration tests — full scenario codes through the
/// parser, the store, and back out through the emitter.

use campaign_engine::core::emitter::{emit_scenario, CodeStyle, EmitOptions};
use campaign_engine::core::parser::{parse_scenario, ParseWarning};
use campaign_engine::core::store::EntityStore;
use campaign_engine::schema::ids::Pk;
use campaign_engine::schema::issue::{Issue, Stance};
use campaign_engine::schema::metadata::ScenarioMeta;
use campaign_engine::schema::question::{Answer, AnswerScoreGlobal, Question};

/// A small but fully populated scenario built through the public store
/// surface, the way an editor session would.
fn build_scenario() -> (EntityStore, ScenarioMeta) {
    let mut store = EntityStore::new();

    let issue = store.new_pk();
    store.issues.push(Issue {
        pk: issue,
        name: "Civil Rights".to_string(),
        description: "The defining question of the decade.".to_string(),
        stances: std::array::from_fn(|_| Stance::default()),
    });

    // States first: candidates only exist through their per-state
    // multiplier rows.
    store.create_new_state();
    store.create_new_state();
    let first = store.add_candidate();
    let second = store.add_candidate();

    let question = store.new_pk();
    store.questions.push(Question {
        pk: question,
        priority: 1,
        description: "How do you open the campaign?".to_string(),
        likelihood: 1.0,
    });
    for text in ["Run on unity.", "Run on law and order."] {
        let pk = store.new_pk();
        store.answers.push(Answer {
            pk,
            question,
            description: text.to_string(),
        });
    }
    let answer = store.answers[0].pk;
    let row = store.new_pk();
    store.answer_score_globals.push(AnswerScoreGlobal {
        pk: row,
        answer,
        candidate: first,
        affected_candidate: second,
        global_multiplier: -0.02,
    });

    let meta = ScenarioMeta {
        scenario_name: "Integration 1964".to_string(),
        summary: "Two candidates, two fresh states.".to_string(),
        ..Default::default()
    };
    (store, meta)
}

#[test]
fn bracket_export_reimports_losslessly() {
    let (store, meta) = build_scenario();
    let code = emit_scenario(&store, &meta, EmitOptions::default()).unwrap();
    let outcome = parse_scenario(&code);

    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert_eq!(outcome.store.questions, store.questions);
    assert_eq!(outcome.store.answers, store.answers);
    assert_eq!(outcome.store.states, store.states);
    assert_eq!(outcome.store.issues, store.issues);
    assert_eq!(
        outcome.store.candidate_state_multipliers,
        store.candidate_state_multipliers
    );
    assert_eq!(outcome.store.state_issue_scores, store.state_issue_scores);
    assert_eq!(outcome.store.answer_score_globals, store.answer_score_globals);
    assert_eq!(outcome.meta, meta);
}

#[test]
fn quoted_export_reimports_losslessly() {
    let (mut store, meta) = build_scenario();
    // Apostrophes and newlines are the usual escaping hazards.
    store.questions[0].description = "What's the\nopening move?".to_string();
    let code = emit_scenario(
        &store,
        &meta,
        EmitOptions {
            style: CodeStyle::Quoted,
        },
    )
    .unwrap();
    let outcome = parse_scenario(&code);

    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert_eq!(outcome.store.questions, store.questions);
    assert_eq!(outcome.store.answers, store.answers);
    assert_eq!(outcome.store.states, store.states);
}

#[test]
fn edit_cycle_survives_reexport() {
    let (store, meta) = build_scenario();
    let code = emit_scenario(&store, &meta, EmitOptions::default()).unwrap();
    let mut outcome = parse_scenario(&code);

    // A plausible editing session on the imported copy.
    let question = outcome.store.questions[0].pk;
    let cloned = outcome.store.clone_question(question).unwrap();
    let doomed = outcome.store.candidate_ids()[1];
    outcome.store.delete_candidate(doomed);
    outcome.store.reorder_questions(&[cloned, question]);

    let code = emit_scenario(&outcome.store, &outcome.meta, EmitOptions::default()).unwrap();
    let reimported = parse_scenario(&code);

    assert!(reimported.warnings.is_empty(), "{:?}", reimported.warnings);
    assert_eq!(reimported.store.questions.len(), 2);
    assert_eq!(reimported.store.questions[0].pk, cloned);
    assert!(!reimported.store.candidate_ids().contains(&doomed));
    // Cloned answers stay attached to the cloned question.
    assert_eq!(reimported.store.answers_for_question(cloned).count(), 2);
}

#[test]
fn fresh_pks_after_import_never_collide() {
    let (store, meta) = build_scenario();
    let code = emit_scenario(&store, &meta, EmitOptions::default()).unwrap();
    let mut outcome = parse_scenario(&code);

    let existing = outcome.store.all_pks();
    for _ in 0..50 {
        let pk = outcome.store.new_pk();
        assert!(!existing.contains(&pk.0));
    }
}

#[test]
fn hand_edited_legacy_code_imports_with_warnings() {
    // Bare markers, a corrupt giant pk, and a duplicate id, the way
    // pasted codes tend to arrive.
    let code = r#"
questions_json = [
  {"model": "campaign_trail.question", "pk": 9e20,
   "fields": {"priority": 1, "description": "Opening move?", "likelihood": 1.0}},
  {"model": "campaign_trail.question", "pk": 7,
   "fields": {"priority": 2, "description": "Second question", "likelihood": 1.0}},
  {"model": "campaign_trail.question", "pk": 7,
   "fields": {"priority": 3, "description": "Pasted twice", "likelihood": 1.0}}
];

states_json = [
  {"model": "campaign_trail.state", "pk": 1,
   "fields": {"name": "Ohio", "abbr": "OH", "electoral_votes": 23,
              "popular_votes": 3000000, "poll_closing_time": 30,
              "winner_take_all_flag": 1}}
];

issues_json = [
  {"model": "campaign_trail.issue", "pk": 1, "fields": {"name": "Economy"}}
];
"#;
    let outcome = parse_scenario(code);

    // The 9e20 id is discarded and replaced with a fresh one.
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, ParseWarning::DiscardedPk { section: "questions", .. })));
    // The duplicated id 7 in an identity collection is flagged, not remapped.
    assert!(outcome
        .warnings
        .contains(&ParseWarning::DuplicatePk { section: "questions", pk: 7 }));
    assert_eq!(outcome.store.questions.len(), 3);
    assert!(outcome.store.questions.iter().any(|q| q.pk == Pk(7)));
    assert!(outcome.store.questions.iter().all(|q| q.pk.0 < 1_000_000));

    // Numeric flag coerces to bool; missing optional sections stay empty.
    assert!(outcome.store.states[0].winner_take_all_flag);
    assert!(outcome.store.answers.is_empty());
    assert!(outcome.store.candidate_state_multipliers.is_empty());
}

#[test]
fn mixed_encoding_document_imports_every_section() {
    // One section quoted, the rest bracketed. The document-dominant
    // strategy picks quoted, then falls back per section.
    let code = r#"
campaignTrail_temp.questions_json = JSON.parse('[{"model": "campaign_trail.question", "pk": 1, "fields": {"priority": 1, "description": "It\'s time.", "likelihood": 1.0}}]');

campaignTrail_temp.states_json = [
  {"model": "campaign_trail.state", "pk": 2,
   "fields": {"name": "Nevada", "abbr": "NV", "electoral_votes": 4,
              "popular_votes": 400000, "poll_closing_time": 120,
              "winner_take_all_flag": false}}
];

campaignTrail_temp.issues_json = [
  {"model": "campaign_trail.issue", "pk": 3, "fields": {"name": "Economy"}}
];
"#;
    let outcome = parse_scenario(code);
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert_eq!(outcome.store.questions[0].description, "It's time.");
    assert_eq!(outcome.store.states[0].abbr, "NV");
    assert_eq!(outcome.store.issues[0].pk, Pk(3));
}

#[test]
fn delete_candidate_survives_round_trip_without_touching_answer_effects() {
    let (store, meta) = build_scenario();
    let code = emit_scenario(&store, &meta, EmitOptions::default()).unwrap();
    let mut outcome = parse_scenario(&code);

    let survivor = outcome.store.candidate_ids()[0];
    let doomed = outcome.store.candidate_ids()[1];
    let effects_before = outcome.store.answer_score_globals.len();
    outcome.store.delete_candidate(doomed);

    // State multipliers for the deleted candidate are gone, but
    // answer-scoped effect rows are kept as written.
    assert!(outcome
        .store
        .candidate_state_multipliers
        .iter()
        .all(|m| m.candidate != doomed));
    assert_eq!(outcome.store.answer_score_globals.len(), effects_before);
    assert_eq!(outcome.store.candidate_ids(), vec![survivor]);
}

#[test]
fn unknown_candidate_id_type_still_parses() {
    // String-typed ids show up in some hand-assembled codes.
    let code = r#"
questions_json = [];
states_json = [];
issues_json = [
  {"model": "campaign_trail.issue", "pk": "12", "fields": {"name": "Economy"}}
];
"#;
    let outcome = parse_scenario(code);
    assert_eq!(outcome.store.issues[0].pk, Pk(12));
    assert!(!outcome
        .warnings
        .iter()
        .any(|w| matches!(w, ParseWarning::BadRow { .. })));
}
