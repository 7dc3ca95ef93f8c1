//! Deterministic election simulation.
//!
//! A pure pass over a store snapshot: player answers and runtime knobs
//! in, per-state vote shares, raw counts, and electoral allocation out.
//! All randomness flows through an explicit [`SimulationContext`] that
//! reseeds at every entry, so identical inputs always produce
//! bit-identical outputs. The simulation never fails; invalid numeric
//! intermediates fall back to neutral defaults.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::core::store::EntityStore;
use crate::schema::ids::{CandidateId, Pk};

/// Fixed module seed used when the caller does not supply one.
pub const DEFAULT_SEED: u64 = 270;

/// Standard deviation of every normal perturbation in the pipeline.
const NORMAL_SIGMA: f64 = 0.05;
/// Answer-driven global sums below this trigger the penalty clamp.
const GLOBAL_PENALTY_THRESHOLD: f64 = -0.8;
/// Multiplier substituted when the player's global sum falls through
/// the threshold.
const GLOBAL_PENALTY_FLOOR: f64 = 0.2;
/// Blend weight of a candidate's own base issue score.
const CANDIDATE_WEIGHT: f64 = 0.75;
/// Blend weight of the running mate's issue score.
const RUNNING_MATE_WEIGHT: f64 = 0.25;
/// Divisor applied to the answer-driven stance sum.
const ANSWER_IMPORTANCE: f64 = 1.5;
/// Baseline appeal contributed per issue before the distance penalty.
const VOTE_VARIABLE: f64 = 1.25;
/// Flat bonus on the player's multiplier in the running mate's home state.
const HOME_STATE_BOOST: f64 = 0.08;
/// Per-visit bonus factor on the player's multiplier.
const VISIT_BOOST: f64 = 0.05;
/// Lower bound used when scaling the per-visit bonus.
const VISIT_FLOOR: f64 = 0.1;
/// Leader's majority-bonus factor in non-flagged winner-take-all states.
const WTA_MAJORITY_FACTOR: f64 = 1.25;

/// How a state's electoral votes are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Flagged states go whole to the leader; unflagged states give the
    /// leader a rounded-up majority bonus and the rest to second place.
    WinnerTakeAll,
    /// Strict allocation by vote share, largest-remainder apportionment.
    Proportional,
}

/// Everything the simulation needs besides the store itself.
#[derive(Debug, Clone)]
pub struct SimulationInput<'a> {
    pub candidates: &'a [CandidateId],
    pub player: CandidateId,
    /// The player's chosen answer pks, in order given.
    pub answers: &'a [Pk],
    pub difficulty: f64,
    pub running_mate_home_state: Option<Pk>,
    /// One entry per campaign stop; repeat visits stack.
    pub visited_states: &'a [Pk],
    pub visit_multiplier: f64,
    pub mode: GameMode,
    /// Precomputed primary-election results that replace a state's
    /// simulated outcome wholesale.
    pub primary_overrides: &'a FxHashMap<Pk, StateResult>,
}

/// One candidate's line in a state result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate: CandidateId,
    pub share: f64,
    pub votes: u64,
    pub electoral_votes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResult {
    pub state: Pk,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub states: Vec<StateResult>,
}

/// Explicit seed plus generator state. Threading this through the entry
/// point keeps the simulator pure; callers wanting concurrent runs give
/// each its own context.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    seed: u64,
    rng: StdRng,
}

impl SimulationContext {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Restarts the generator from the stored seed. Called at every
    /// simulation entry.
    fn reseed(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn normal(&mut self, sigma: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * sigma
    }
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn signed_sq(x: f64) -> f64 {
    x * x.abs()
}

/// Step 2: one global multiplier per candidate.
fn global_multipliers(
    store: &EntityStore,
    input: &SimulationInput<'_>,
    answer_set: &FxHashSet<Pk>,
    ctx: &mut SimulationContext,
) -> FxHashMap<CandidateId, f64> {
    let mut out = FxHashMap::default();
    for &cand in input.candidates {
        let mut sum = 0.0;
        for row in &store.answer_score_globals {
            if answer_set.contains(&row.answer)
                && row.candidate == input.player
                && row.affected_candidate == cand
            {
                sum += row.global_multiplier;
            }
        }
        let mut mult = if cand == input.player && sum < GLOBAL_PENALTY_THRESHOLD {
            GLOBAL_PENALTY_FLOOR
        } else {
            1.0 + sum
        };
        mult += ctx.normal(NORMAL_SIGMA);
        if cand == input.player {
            mult *= input.difficulty;
        }
        if !mult.is_finite() {
            mult = 1.0;
        }
        out.insert(cand, mult);
    }
    out
}

/// Step 3: blended issue stances, one contribution per issue per
/// candidate.
fn issue_stances(
    store: &EntityStore,
    input: &SimulationInput<'_>,
    answer_set: &FxHashSet<Pk>,
) -> FxHashMap<(CandidateId, Pk), f64> {
    let mut out = FxHashMap::default();
    for &cand in input.candidates {
        let mut seen = FxHashSet::default();
        for issue in &store.issues {
            if !seen.insert(issue.pk) {
                continue;
            }
            let base = store
                .issue_score_for(cand, issue.pk)
                .map_or(0.0, |r| r.issue_score);
            let rm = store
                .running_mate_score_for(cand, issue.pk)
                .map_or(0.0, |r| r.issue_score);
            let mut answer_sum = 0.0;
            if cand == input.player {
                for row in &store.answer_score_issues {
                    if answer_set.contains(&row.answer) && row.issue == issue.pk {
                        answer_sum += row.issue_score;
                    }
                }
            }
            let stance =
                CANDIDATE_WEIGHT * base + RUNNING_MATE_WEIGHT * rm + answer_sum / ANSWER_IMPORTANCE;
            out.insert((cand, issue.pk), stance);
        }
    }
    out
}

/// Step 4: the per-candidate multiplier for one state. `None` means the
/// candidate has no multiplier row there and is skipped for this state.
fn state_multiplier(
    store: &EntityStore,
    input: &SimulationInput<'_>,
    answer_set: &FxHashSet<Pk>,
    global: &FxHashMap<CandidateId, f64>,
    cand: CandidateId,
    state: Pk,
    ctx: &mut SimulationContext,
) -> Option<f64> {
    let base = store.multiplier_for(cand, state)?.state_multiplier;
    let mut mult =
        base * global.get(&cand).copied().unwrap_or(1.0) * (1.0 + ctx.normal(NORMAL_SIGMA));
    for row in &store.answer_score_states {
        if answer_set.contains(&row.answer)
            && row.state == state
            && row.candidate == input.player
            && row.affected_candidate == cand
        {
            mult += row.state_multiplier;
        }
    }
    if cand == input.player {
        if input.running_mate_home_state == Some(state) {
            mult += HOME_STATE_BOOST;
        }
        let visits = input.visited_states.iter().filter(|v| **v == state).count();
        for _ in 0..visits {
            mult += VISIT_BOOST * input.visit_multiplier * mult.max(VISIT_FLOOR);
        }
    }
    if !mult.is_finite() {
        mult = 1.0;
    }
    Some(mult)
}

/// Step 5: raw appeal of one candidate in one state.
fn raw_appeal(
    store: &EntityStore,
    stances: &FxHashMap<(CandidateId, Pk), f64>,
    cand: CandidateId,
    state: Pk,
    multiplier: f64,
) -> f64 {
    let mut acc = 0.0;
    for issue in &store.issues {
        let (lean, weight) = store
            .state_issue_score_for(state, issue.pk)
            .map_or((0.0, 1.0), |r| (r.state_issue_score, r.weight));
        let stance = stances.get(&(cand, issue.pk)).copied().unwrap_or(0.0);
        acc += VOTE_VARIABLE - weight * (signed_sq(stance) - signed_sq(lean)).abs();
    }
    (acc * multiplier).max(0.0)
}

/// Step 8: electoral allocation. Mutates the `electoral_votes` field of
/// each entry; total allocation always equals `total_ev`.
fn allocate_ev(
    mode: GameMode,
    winner_take_all_flag: bool,
    total_ev: u32,
    entries: &mut [CandidateResult],
) {
    if entries.is_empty() || total_ev == 0 {
        return;
    }
    // Leader ordering: votes descending, candidate id ascending on ties.
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| {
        entries[b]
            .votes
            .cmp(&entries[a].votes)
            .then(entries[a].candidate.cmp(&entries[b].candidate))
    });

    match mode {
        GameMode::WinnerTakeAll => {
            let leader = order[0];
            if winner_take_all_flag || entries.len() == 1 {
                entries[leader].electoral_votes = total_ev;
                return;
            }
            let bonus =
                (WTA_MAJORITY_FACTOR * entries[leader].share * f64::from(total_ev)).ceil();
            let leader_ev = (bonus.max(0.0) as u32).min(total_ev);
            entries[leader].electoral_votes = leader_ev;
            entries[order[1]].electoral_votes = total_ev - leader_ev;
        }
        GameMode::Proportional => {
            // Largest-remainder apportionment; remainder ties break by
            // ascending candidate id.
            let share_sum: f64 = entries.iter().map(|e| e.share).sum();
            let count = entries.len();
            let mut assigned = 0u32;
            let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(count);
            for (i, entry) in entries.iter_mut().enumerate() {
                let share = if share_sum > 0.0 {
                    entry.share / share_sum
                } else {
                    1.0 / count as f64
                };
                let quota = share * f64::from(total_ev);
                let floor = quota.floor().max(0.0) as u32;
                entry.electoral_votes = floor;
                assigned += floor;
                remainders.push((i, quota - quota.floor()));
            }
            remainders.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(entries[a.0].candidate.cmp(&entries[b.0].candidate))
            });
            let mut leftover = total_ev.saturating_sub(assigned);
            for (i, _) in remainders {
                if leftover == 0 {
                    break;
                }
                entries[i].electoral_votes += 1;
                leftover -= 1;
            }
        }
    }
}

fn run(
    store: &EntityStore,
    input: &SimulationInput<'_>,
    ctx: &mut SimulationContext,
    noised: bool,
) -> SimulationOutput {
    ctx.reseed();
    let answer_set: FxHashSet<Pk> = input.answers.iter().copied().collect();

    let global = global_multipliers(store, input, &answer_set, ctx);
    let stances = issue_stances(store, input, &answer_set);

    let mut states = Vec::with_capacity(store.states.len());
    for state in &store.states {
        let mut appeals: Vec<(CandidateId, f64)> = Vec::with_capacity(input.candidates.len());
        for &cand in input.candidates {
            let Some(mult) =
                state_multiplier(store, input, &answer_set, &global, cand, state.pk, ctx)
            else {
                // No multiplier row to cross-reference; skip this
                // candidate for this state only.
                continue;
            };
            let mut appeal = raw_appeal(store, &stances, cand, state.pk, mult);
            if noised {
                appeal = (appeal * (1.0 + ctx.normal(NORMAL_SIGMA))).max(0.0);
            }
            appeals.push((cand, appeal));
        }

        // Step 6: normalize against the state's configured baseline.
        let jitter = ctx.rng.gen_range(0.95..=1.05);
        let total = (state.popular_votes as f64 * jitter).max(0.0);
        let appeal_sum: f64 = appeals.iter().map(|(_, a)| a).sum();
        let mut entries: Vec<CandidateResult> = appeals
            .iter()
            .map(|&(candidate, appeal)| {
                let share = if appeal_sum > 0.0 {
                    appeal / appeal_sum
                } else {
                    1.0 / appeals.len() as f64
                };
                CandidateResult {
                    candidate,
                    share,
                    votes: (share * total).floor().max(0.0) as u64,
                    electoral_votes: 0,
                }
            })
            .collect();

        // Step 7: a primary override replaces the whole state result.
        if let Some(precomputed) = input.primary_overrides.get(&state.pk) {
            states.push(precomputed.clone());
            continue;
        }

        allocate_ev(
            input.mode,
            state.winner_take_all_flag,
            state.electoral_votes,
            &mut entries,
        );
        states.push(StateResult {
            state: state.pk,
            total_votes: entries.iter().map(|e| e.votes).sum(),
            candidates: entries,
        });
    }
    SimulationOutput { states }
}

/// Runs the deterministic base pass.
pub fn simulate(
    store: &EntityStore,
    input: &SimulationInput<'_>,
    ctx: &mut SimulationContext,
) -> SimulationOutput {
    run(store, input, ctx, false)
}

/// Variant with one extra per-candidate perturbation, used for
/// uncertainty displays. Same shape as the base pass.
pub fn simulate_noised(
    store: &EntityStore,
    input: &SimulationInput<'_>,
    ctx: &mut SimulationContext,
) -> SimulationOutput {
    run(store, input, ctx, true)
}
