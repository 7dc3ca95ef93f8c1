//! The entity store: every scenario collection, the shared primary-key
//! allocator, and all cascade/clone integrity rules.
//!
//! Pks are unique across the whole store, not per collection. Collections
//! are plain vectors so insertion order doubles as display order; the
//! editor reorders questions by rewriting that order in place.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::schema::ids::{CandidateId, Pk};
use crate::schema::issue::{CandidateIssueScore, Issue, RunningMateIssueScore};
use crate::schema::question::{
    Answer, AnswerFeedback, AnswerScoreGlobal, AnswerScoreIssue, AnswerScoreState, Question,
};
use crate::schema::state::{CandidateStateMultiplier, State, StateIssueScore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("at least one issue is required; cannot delete the last one")]
    LastIssue,
    #[error("issue not found: {0}")]
    IssueNotFound(Pk),
    #[error("question not found: {0}")]
    QuestionNotFound(Pk),
}

/// Owns all scenario entities and enforces referential integrity
/// per mutation. There is no persistent constraint machinery; each
/// mutator leaves the graph consistent on its own.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    next_pk: i64,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub states: Vec<State>,
    pub issues: Vec<Issue>,
    pub candidate_issue_scores: Vec<CandidateIssueScore>,
    pub running_mate_issue_scores: Vec<RunningMateIssueScore>,
    pub candidate_state_multipliers: Vec<CandidateStateMultiplier>,
    pub state_issue_scores: Vec<StateIssueScore>,
    pub answer_score_globals: Vec<AnswerScoreGlobal>,
    pub answer_score_issues: Vec<AnswerScoreIssue>,
    pub answer_score_states: Vec<AnswerScoreState>,
    pub answer_feedback: Vec<AnswerFeedback>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next primary key from the single shared counter.
    /// Every creation path, including clones and import remaps, goes
    /// through here.
    pub fn new_pk(&mut self) -> Pk {
        self.next_pk += 1;
        Pk(self.next_pk)
    }

    /// Raises the allocator floor so future `new_pk` calls never collide
    /// with an id that entered the store from outside (import).
    pub fn bump_pk_floor(&mut self, pk: i64) {
        if pk > self.next_pk {
            self.next_pk = pk;
        }
    }

    // ---- lookups -------------------------------------------------------

    pub fn question(&self, pk: Pk) -> Option<&Question> {
        self.questions.iter().find(|q| q.pk == pk)
    }

    pub fn answer(&self, pk: Pk) -> Option<&Answer> {
        self.answers.iter().find(|a| a.pk == pk)
    }

    pub fn issue(&self, pk: Pk) -> Option<&Issue> {
        self.issues.iter().find(|i| i.pk == pk)
    }

    pub fn state(&self, pk: Pk) -> Option<&State> {
        self.states.iter().find(|s| s.pk == pk)
    }

    pub fn answers_for_question(&self, question: Pk) -> impl Iterator<Item = &Answer> {
        self.answers.iter().filter(move |a| a.question == question)
    }

    pub fn feedback_for_answer(&self, answer: Pk) -> impl Iterator<Item = &AnswerFeedback> {
        self.answer_feedback.iter().filter(move |f| f.answer == answer)
    }

    pub fn global_scores_for_answer(&self, answer: Pk) -> impl Iterator<Item = &AnswerScoreGlobal> {
        self.answer_score_globals
            .iter()
            .filter(move |s| s.answer == answer)
    }

    pub fn issue_scores_for_answer(&self, answer: Pk) -> impl Iterator<Item = &AnswerScoreIssue> {
        self.answer_score_issues
            .iter()
            .filter(move |s| s.answer == answer)
    }

    pub fn state_scores_for_answer(&self, answer: Pk) -> impl Iterator<Item = &AnswerScoreState> {
        self.answer_score_states
            .iter()
            .filter(move |s| s.answer == answer)
    }

    pub fn issue_score_for(&self, candidate: CandidateId, issue: Pk) -> Option<&CandidateIssueScore> {
        self.candidate_issue_scores
            .iter()
            .find(|s| s.candidate == candidate && s.issue == issue)
    }

    pub fn running_mate_score_for(
        &self,
        candidate: CandidateId,
        issue: Pk,
    ) -> Option<&RunningMateIssueScore> {
        self.running_mate_issue_scores
            .iter()
            .find(|s| s.candidate == candidate && s.issue == issue)
    }

    pub fn multiplier_for(
        &self,
        candidate: CandidateId,
        state: Pk,
    ) -> Option<&CandidateStateMultiplier> {
        self.candidate_state_multipliers
            .iter()
            .find(|m| m.candidate == candidate && m.state == state)
    }

    pub fn state_issue_score_for(&self, state: Pk, issue: Pk) -> Option<&StateIssueScore> {
        self.state_issue_scores
            .iter()
            .find(|s| s.state == state && s.issue == issue)
    }

    /// All candidate ids known to the scenario, ascending. Derived, never
    /// stored: a candidate exists exactly when a state multiplier names it.
    pub fn candidate_ids(&self) -> Vec<CandidateId> {
        let mut ids: Vec<CandidateId> = self
            .candidate_state_multipliers
            .iter()
            .map(|m| m.candidate)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    // ---- clones --------------------------------------------------------

    /// Deep-duplicates a question: the question itself, its answers, and
    /// every feedback/score row hanging off those answers, all with fresh
    /// pks and re-pointed FKs.
    pub fn clone_question(&mut self, source: Pk) -> Result<Pk, StoreError> {
        let mut question = self
            .question(source)
            .cloned()
            .ok_or(StoreError::QuestionNotFound(source))?;
        question.pk = self.new_pk();
        let new_question = question.pk;
        self.questions.push(question);

        let source_answers: Vec<Answer> =
            self.answers_for_question(source).cloned().collect();
        for mut answer in source_answers {
            let old_answer = answer.pk;
            answer.pk = self.new_pk();
            answer.question = new_question;
            let new_answer = answer.pk;
            self.answers.push(answer);
            self.clone_answer_dependents(old_answer, new_answer);
        }
        Ok(new_question)
    }

    fn clone_answer_dependents(&mut self, old_answer: Pk, new_answer: Pk) {
        let feedback: Vec<AnswerFeedback> =
            self.feedback_for_answer(old_answer).cloned().collect();
        for mut row in feedback {
            row.pk = self.new_pk();
            row.answer = new_answer;
            self.answer_feedback.push(row);
        }
        let globals: Vec<AnswerScoreGlobal> =
            self.global_scores_for_answer(old_answer).cloned().collect();
        for mut row in globals {
            row.pk = self.new_pk();
            row.answer = new_answer;
            self.answer_score_globals.push(row);
        }
        let issues: Vec<AnswerScoreIssue> =
            self.issue_scores_for_answer(old_answer).cloned().collect();
        for mut row in issues {
            row.pk = self.new_pk();
            row.answer = new_answer;
            self.answer_score_issues.push(row);
        }
        let states: Vec<AnswerScoreState> =
            self.state_scores_for_answer(old_answer).cloned().collect();
        for mut row in states {
            row.pk = self.new_pk();
            row.answer = new_answer;
            self.answer_score_states.push(row);
        }
    }

    /// Deep-duplicates an issue and every score row referencing it. The
    /// copy's name gets " (Copy)" appended, or "New issue" if the source
    /// name was blank.
    pub fn clone_issue(&mut self, source: Pk) -> Result<Pk, StoreError> {
        let mut issue = self
            .issue(source)
            .cloned()
            .ok_or(StoreError::IssueNotFound(source))?;
        issue.pk = self.new_pk();
        issue.name = if issue.name.trim().is_empty() {
            "New issue".to_string()
        } else {
            format!("{} (Copy)", issue.name)
        };
        let new_issue = issue.pk;
        self.issues.push(issue);

        let cand_scores: Vec<CandidateIssueScore> = self
            .candidate_issue_scores
            .iter()
            .filter(|s| s.issue == source)
            .cloned()
            .collect();
        for mut row in cand_scores {
            row.pk = self.new_pk();
            row.issue = new_issue;
            self.candidate_issue_scores.push(row);
        }
        let rm_scores: Vec<RunningMateIssueScore> = self
            .running_mate_issue_scores
            .iter()
            .filter(|s| s.issue == source)
            .cloned()
            .collect();
        for mut row in rm_scores {
            row.pk = self.new_pk();
            row.issue = new_issue;
            self.running_mate_issue_scores.push(row);
        }
        let state_scores: Vec<StateIssueScore> = self
            .state_issue_scores
            .iter()
            .filter(|s| s.issue == source)
            .cloned()
            .collect();
        for mut row in state_scores {
            row.pk = self.new_pk();
            row.issue = new_issue;
            self.state_issue_scores.push(row);
        }
        Ok(new_issue)
    }

    // ---- deletions -----------------------------------------------------

    /// Deletes an issue and cascades to every score row referencing it.
    /// Refuses to delete the last remaining issue.
    pub fn remove_issue(&mut self, pk: Pk) -> Result<(), StoreError> {
        if !self.issues.iter().any(|i| i.pk == pk) {
            return Err(StoreError::IssueNotFound(pk));
        }
        if self.issues.len() <= 1 {
            return Err(StoreError::LastIssue);
        }
        self.issues.retain(|i| i.pk != pk);
        self.candidate_issue_scores.retain(|s| s.issue != pk);
        self.running_mate_issue_scores.retain(|s| s.issue != pk);
        self.state_issue_scores.retain(|s| s.issue != pk);
        self.answer_score_issues.retain(|s| s.issue != pk);
        Ok(())
    }

    /// Deletes a state and every row referencing it. No-op when absent.
    pub fn delete_state(&mut self, pk: Pk) {
        self.states.retain(|s| s.pk != pk);
        self.answer_score_states.retain(|s| s.state != pk);
        self.state_issue_scores.retain(|s| s.state != pk);
        self.candidate_state_multipliers.retain(|m| m.state != pk);
    }

    /// Deletes a candidate id from the multiplier and issue-score
    /// collections. Answer-scoped effect rows naming the candidate are
    /// deliberately left alone; existing scenarios rely on those rows
    /// surviving candidate removal, so the asymmetry is preserved.
    /// No-op when absent.
    pub fn delete_candidate(&mut self, id: CandidateId) {
        self.candidate_state_multipliers.retain(|m| m.candidate != id);
        self.candidate_issue_scores.retain(|s| s.candidate != id);
    }

    /// Deletes a question, its answers, and everything hanging off those
    /// answers. No-op when absent.
    pub fn delete_question(&mut self, pk: Pk) {
        let owned: Vec<Pk> = self.answers_for_question(pk).map(|a| a.pk).collect();
        for answer in owned {
            self.delete_answer(answer);
        }
        self.questions.retain(|q| q.pk != pk);
    }

    /// Deletes an answer and its feedback/score rows. No-op when absent.
    pub fn delete_answer(&mut self, pk: Pk) {
        self.answers.retain(|a| a.pk != pk);
        self.answer_feedback.retain(|f| f.answer != pk);
        self.answer_score_globals.retain(|s| s.answer != pk);
        self.answer_score_issues.retain(|s| s.answer != pk);
        self.answer_score_states.retain(|s| s.answer != pk);
    }

    // ---- ordering ------------------------------------------------------

    /// Rewrites question iteration order to follow `order`. Unknown pks
    /// in the list are dropped with a warning; questions the list omits
    /// keep their relative order and move to the end. Membership never
    /// changes.
    pub fn reorder_questions(&mut self, order: &[Pk]) {
        let mut reordered = Vec::with_capacity(self.questions.len());
        let mut taken = FxHashSet::default();
        for &pk in order {
            if taken.contains(&pk) {
                continue;
            }
            match self.questions.iter().position(|q| q.pk == pk) {
                Some(idx) => {
                    taken.insert(pk);
                    reordered.push(self.questions[idx].clone());
                }
                None => log::warn!("reorder_questions: unknown question pk {}, dropped", pk),
            }
        }
        for q in &self.questions {
            if !taken.contains(&q.pk) {
                reordered.push(q.clone());
            }
        }
        self.questions = reordered;
    }

    // ---- synthesis -----------------------------------------------------

    /// Adds a new candidate id and one neutral state multiplier per
    /// existing state, which is what makes the id exist at all.
    pub fn add_candidate(&mut self) -> CandidateId {
        let id = CandidateId(
            self.candidate_ids().last().map_or(0, |c| c.0) + 1,
        );
        let state_pks: Vec<Pk> = self.states.iter().map(|s| s.pk).collect();
        for state in state_pks {
            let pk = self.new_pk();
            self.candidate_state_multipliers.push(CandidateStateMultiplier {
                pk,
                candidate: id,
                state,
                state_multiplier: 1.0,
            });
        }
        id
    }

    /// Adds a new state with defaults, one neutral multiplier per
    /// existing candidate, and one neutral issue score per existing issue.
    pub fn create_new_state(&mut self) -> Pk {
        let pk = self.new_pk();
        self.states.push(State {
            pk,
            name: "New state".to_string(),
            abbr: "NEW".to_string(),
            electoral_votes: 1,
            popular_votes: 100_000,
            poll_closing_time: 120,
            winner_take_all_flag: true,
            election: None,
            map_path: None,
        });
        for candidate in self.candidate_ids() {
            let row_pk = self.new_pk();
            self.candidate_state_multipliers.push(CandidateStateMultiplier {
                pk: row_pk,
                candidate,
                state: pk,
                state_multiplier: 1.0,
            });
        }
        let issue_pks: Vec<Pk> = self.issues.iter().map(|i| i.pk).collect();
        for issue in issue_pks {
            let row_pk = self.new_pk();
            self.state_issue_scores.push(StateIssueScore {
                pk: row_pk,
                state: pk,
                issue,
                state_issue_score: 0.0,
                weight: 1.0,
            });
        }
        pk
    }

    /// Every pk currently present, across all collections. Used by
    /// integrity checks and tests.
    pub fn all_pks(&self) -> Vec<i64> {
        let mut pks = Vec::new();
        pks.extend(self.questions.iter().map(|r| r.pk.0));
        pks.extend(self.answers.iter().map(|r| r.pk.0));
        pks.extend(self.states.iter().map(|r| r.pk.0));
        pks.extend(self.issues.iter().map(|r| r.pk.0));
        pks.extend(self.candidate_issue_scores.iter().map(|r| r.pk.0));
        pks.extend(self.running_mate_issue_scores.iter().map(|r| r.pk.0));
        pks.extend(self.candidate_state_multipliers.iter().map(|r| r.pk.0));
        pks.extend(self.state_issue_scores.iter().map(|r| r.pk.0));
        pks.extend(self.answer_score_globals.iter().map(|r| r.pk.0));
        pks.extend(self.answer_score_issues.iter().map(|r| r.pk.0));
        pks.extend(self.answer_score_states.iter().map(|r| r.pk.0));
        pks.extend(self.answer_feedback.iter().map(|r| r.pk.0));
        pks
    }
}
